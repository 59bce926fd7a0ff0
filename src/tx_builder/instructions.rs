//! Instruction encoding, planning and ordering validation
//!
//! Every token creation envelope carries exactly five instructions, in order:
//! 1. memo (per-attempt uniqueness marker)
//! 2. system `create_account` for the mint
//! 3. token `initialize_mint`
//! 4. associated-account `create` (idempotent form)
//! 5. token `mint_to`
//!
//! Payloads are hand-encoded to the programs' fixed layouts. Nothing in this
//! module touches the network or a key: identical inputs always produce
//! identical bytes.

use crate::tx_builder::errors::TransactionBuilderError;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
    system_instruction, system_program,
};

/// SPL Token program
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// SPL Associated Token Account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// SPL Memo program (v2)
pub const MEMO_PROGRAM_ID: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Rent sysvar
pub const RENT_SYSVAR_ID: Pubkey = pubkey!("SysvarRent111111111111111111111111111111111");

/// Packed size of a mint account
pub const MINT_ACCOUNT_SIZE: u64 = 82;

/// Largest decimal count accepted for a mint
pub const MAX_MINT_DECIMALS: u8 = 9;

const INITIALIZE_MINT_TAG: u8 = 0;
const MINT_TO_TAG: u8 = 7;
const CREATE_IDEMPOTENT_TAG: u8 = 1;

/// Size of the initialize-mint payload with a freeze authority
pub const INITIALIZE_MINT_LEN: usize = 67;

/// Size of the initialize-mint payload without a freeze authority
pub const INITIALIZE_MINT_SHORT_LEN: usize = 35;

/// Size of the mint-to payload
pub const MINT_TO_LEN: usize = 9;

/// Which form of the associated-account create instruction to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaCreateMode {
    /// Fails if the account already exists
    Plain,
    /// Succeeds silently if the account already exists
    Idempotent,
}

/// Scale a user-facing supply to base units.
///
/// Computed in 128-bit integer arithmetic so no precision is lost at high
/// decimal counts; results above `u64::MAX` are rejected, never truncated.
pub fn mint_amount(total_supply: u64, decimals: u8) -> Result<u64, TransactionBuilderError> {
    if decimals > MAX_MINT_DECIMALS {
        return Err(TransactionBuilderError::InvalidDecimals(decimals));
    }

    let scaled = (total_supply as u128) * 10u128.pow(decimals as u32);
    u64::try_from(scaled).map_err(|_| TransactionBuilderError::AmountOverflow {
        total_supply,
        decimals,
    })
}

/// Encode the initialize-mint payload.
///
/// Layout: `[0, decimals, mint_authority(32), option_flag, freeze_authority(32)?]`.
pub fn encode_initialize_mint(
    decimals: u8,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
) -> Result<Vec<u8>, TransactionBuilderError> {
    if decimals > MAX_MINT_DECIMALS {
        return Err(TransactionBuilderError::InvalidDecimals(decimals));
    }

    let mut data = Vec::with_capacity(INITIALIZE_MINT_LEN);
    data.push(INITIALIZE_MINT_TAG);
    data.push(decimals);
    data.extend_from_slice(mint_authority.as_ref());
    match freeze_authority {
        Some(freeze) => {
            data.push(1);
            data.extend_from_slice(freeze.as_ref());
        }
        None => data.push(0),
    }
    Ok(data)
}

/// Encode the mint-to payload: `[7, amount (u64 LE)]`
pub fn encode_mint_to(amount: u64) -> [u8; MINT_TO_LEN] {
    let mut data = [0u8; MINT_TO_LEN];
    data[0] = MINT_TO_TAG;
    data[1..].copy_from_slice(&amount.to_le_bytes());
    data
}

/// Encode the associated-account create payload
pub fn encode_create_associated_account(mode: AtaCreateMode) -> Vec<u8> {
    match mode {
        AtaCreateMode::Plain => Vec::new(),
        AtaCreateMode::Idempotent => vec![CREATE_IDEMPOTENT_TAG],
    }
}

/// System `create_account` allocating a rent-exempt mint owned by the token program
pub fn create_mint_account_ix(payer: &Pubkey, mint: &Pubkey, rent_lamports: u64) -> Instruction {
    system_instruction::create_account(
        payer,
        mint,
        rent_lamports,
        MINT_ACCOUNT_SIZE,
        &TOKEN_PROGRAM_ID,
    )
}

pub fn initialize_mint_ix(
    mint: &Pubkey,
    decimals: u8,
    mint_authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
) -> Result<Instruction, TransactionBuilderError> {
    let data = encode_initialize_mint(decimals, mint_authority, freeze_authority)?;
    Ok(Instruction::new_with_bytes(
        TOKEN_PROGRAM_ID,
        &data,
        vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
        ],
    ))
}

pub fn create_associated_account_ix(
    payer: &Pubkey,
    associated_account: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    mode: AtaCreateMode,
) -> Instruction {
    Instruction::new_with_bytes(
        ASSOCIATED_TOKEN_PROGRAM_ID,
        &encode_create_associated_account(mode),
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*associated_account, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
    )
}

pub fn mint_to_ix(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction::new_with_bytes(
        TOKEN_PROGRAM_ID,
        &encode_mint_to(amount),
        vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
    )
}

/// Memo instruction with no signer accounts
pub fn memo_ix(memo: &str) -> Instruction {
    Instruction::new_with_bytes(MEMO_PROGRAM_ID, memo.as_bytes(), vec![])
}

/// Addresses a creation envelope is built around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCreationAccounts {
    /// Fee payer, mint authority, freeze authority and associated-account owner
    pub payer: Pubkey,
    pub mint: Pubkey,
    pub associated_account: Pubkey,
}

/// Ordered instruction list for one envelope
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    /// The ordered list of instructions for the transaction
    pub instructions: Vec<Instruction>,

    /// Base-unit amount minted into the associated account
    pub mint_amount: u64,
}

impl InstructionPlan {
    pub fn new(instructions: Vec<Instruction>, mint_amount: u64) -> Self {
        Self {
            instructions,
            mint_amount,
        }
    }
}

/// Plan the token creation instructions in their required order
///
/// The payer is used as mint authority, freeze authority and owner of the
/// associated account.
///
/// # Errors
///
/// Returns `TransactionBuilderError::InvalidDecimals` or
/// `TransactionBuilderError::AmountOverflow` when the supply cannot be encoded.
///
/// # Example
///
/// ```no_run
/// use solana_sdk::pubkey::Pubkey;
/// use token_forge::tx_builder::instructions::{
///     plan_token_creation_instructions, TokenCreationAccounts,
/// };
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let accounts = TokenCreationAccounts {
///     payer: Pubkey::new_unique(),
///     mint: Pubkey::new_unique(),
///     associated_account: Pubkey::new_unique(),
/// };
/// let plan = plan_token_creation_instructions(&accounts, 9, 1_000_000, 1_461_600, "memo")?;
/// assert_eq!(plan.instructions.len(), 5);
/// # Ok(())
/// # }
/// ```
pub fn plan_token_creation_instructions(
    accounts: &TokenCreationAccounts,
    decimals: u8,
    total_supply: u64,
    rent_lamports: u64,
    memo: &str,
) -> Result<InstructionPlan, TransactionBuilderError> {
    if memo.is_empty() {
        return Err(TransactionBuilderError::Configuration(
            "uniqueness memo must not be empty".to_string(),
        ));
    }

    let amount = mint_amount(total_supply, decimals)?;
    let payer = &accounts.payer;
    let mint = &accounts.mint;

    let instructions = vec![
        memo_ix(memo),
        create_mint_account_ix(payer, mint, rent_lamports),
        initialize_mint_ix(mint, decimals, payer, Some(payer))?,
        create_associated_account_ix(
            payer,
            &accounts.associated_account,
            payer,
            mint,
            AtaCreateMode::Idempotent,
        ),
        mint_to_ix(mint, &accounts.associated_account, payer, amount),
    ];

    Ok(InstructionPlan::new(instructions, amount))
}

/// Validate that instructions follow memo → create-account → initialize-mint
/// → create-associated-account → mint-to
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    const EXPECTED: [&str; 5] = [
        "memo",
        "create_account",
        "initialize_mint",
        "create_associated_account",
        "mint_to",
    ];

    if instructions.len() != EXPECTED.len() {
        return Err(TransactionBuilderError::invalid_order(format!(
            "expected {} instructions, got {}",
            EXPECTED.len(),
            instructions.len()
        )));
    }

    for (idx, (ix, expected)) in instructions.iter().zip(EXPECTED).enumerate() {
        let kind = classify_instruction(ix);
        if kind != Some(expected) {
            return Err(TransactionBuilderError::invalid_order(format!(
                "position {} should be {}, got program_id: {}",
                idx, expected, ix.program_id
            )));
        }
    }

    Ok(())
}

fn classify_instruction(ix: &Instruction) -> Option<&'static str> {
    if ix.program_id == MEMO_PROGRAM_ID {
        Some("memo")
    } else if ix.program_id == system_program::id() {
        // create_account is system instruction 0, u32 little-endian
        (ix.data.get(..4) == Some(&[0, 0, 0, 0][..])).then_some("create_account")
    } else if ix.program_id == TOKEN_PROGRAM_ID {
        match ix.data.first() {
            Some(&INITIALIZE_MINT_TAG) => Some("initialize_mint"),
            Some(&MINT_TO_TAG) => Some("mint_to"),
            _ => None,
        }
    } else if ix.program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
        Some("create_associated_account")
    } else {
        None
    }
}
