//! Per-attempt execution context for envelope construction
//!
//! An `ExecutionContext` is created fresh for every submission attempt and
//! never reused: it carries the block reference fetched immediately before
//! signing, the uniqueness memo that keeps retried envelopes byte-distinct,
//! and the attempt's trace span.

use solana_sdk::hash::Hash;

use crate::observability::TraceContext;

/// Prefix of every uniqueness memo
pub const MEMO_PREFIX: &str = "token-forge";

const MEMO_SUFFIX_LEN: usize = 8;

/// Recent block reference a transaction must cite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    pub blockhash: Hash,
    /// Last block height at which a transaction citing `blockhash` is accepted
    pub last_valid_block_height: u64,
}

impl BlockReference {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
        }
    }
}

/// Execution context for building one envelope
pub struct ExecutionContext {
    /// Submission attempt ordinal this context belongs to
    pub attempt: u32,

    /// Block reference fetched for this attempt
    pub block: BlockReference,

    /// Uniqueness marker embedded as the first instruction
    pub memo: String,

    /// Trace span for this attempt
    pub trace_context: Option<TraceContext>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("attempt", &self.attempt)
            .field("blockhash", &self.block.blockhash)
            .field("last_valid_block_height", &self.block.last_valid_block_height)
            .field("memo", &self.memo)
            .field(
                "trace_context",
                &self
                    .trace_context
                    .as_ref()
                    .map(|ctx| format!("trace_id={}, span_id={}", ctx.trace_id(), ctx.span_id())),
            )
            .finish()
    }
}

impl ExecutionContext {
    /// Create a context with a freshly generated memo
    pub fn new(attempt: u32, block: BlockReference, trace_context: Option<TraceContext>) -> Self {
        Self {
            attempt,
            block,
            memo: uniqueness_memo(),
            trace_context,
        }
    }
}

/// Build a memo of the form `token-forge:<unix-millis>:<random suffix>`
pub fn uniqueness_memo() -> String {
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(MEMO_SUFFIX_LEN)
        .collect();
    format!(
        "{}:{}:{}",
        MEMO_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}
