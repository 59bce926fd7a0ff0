//! Token-creation transaction builder
//!
//! Split into focused modules:
//! - **errors**: construction-time error taxonomy
//! - **instructions**: byte-exact instruction encoders and the creation plan
//! - **context**: per-attempt block reference, memo and trace span
//! - **builder**: assembles the unsigned envelope for one attempt
//! - **signing**: mint partial signature plus external counter-signature
//! - **output**: unsigned and signed envelopes
//!
//! ## Instruction order
//!
//! Every envelope carries exactly five instructions, executed atomically:
//! memo → create mint account → initialize mint → create associated account
//! (idempotent) → mint-to. `sanity_check_ix_order` enforces this before the
//! envelope leaves the builder.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use solana_sdk::pubkey::Pubkey;
//! use token_forge::rpc_manager::MockLedger;
//! use token_forge::tx_builder::{MintParameters, TransactionBuilder, TransactionBuilderError};
//!
//! # async fn example() -> Result<(), TransactionBuilderError> {
//! let builder = TransactionBuilder::new(Arc::new(MockLedger::new()));
//! let params = MintParameters {
//!     payer: Pubkey::new_unique(),
//!     decimals: 9,
//!     total_supply: 1_000_000,
//!     rent_lamports: 1_461_600,
//! };
//! let envelope = builder
//!     .build_envelope(&params, Pubkey::new_unique(), Pubkey::new_unique(), 0, None)
//!     .await?;
//! assert_eq!(envelope.tx.message.instructions.len(), 5);
//! # Ok(())
//! # }
//! ```

// Public API - Error types
pub mod errors;
pub use errors::TransactionBuilderError;

pub mod builder;
pub mod context;
pub mod instructions;
pub mod output;
pub mod signing;

// Re-export key types for convenience
pub use builder::{serialized_size, MintParameters, TransactionBuilder};
pub use context::{uniqueness_memo, BlockReference, ExecutionContext};
pub use instructions::{
    mint_amount, plan_token_creation_instructions, sanity_check_ix_order, InstructionPlan,
    TokenCreationAccounts,
};
pub use output::{SignedEnvelope, UnsignedEnvelope};
pub use signing::SigningCoordinator;
