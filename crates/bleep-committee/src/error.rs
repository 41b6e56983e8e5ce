// Committee Errors - Failure taxonomy for instruction batches
//
// SAFETY INVARIANTS:
// 1. Every error aborts the whole batch; no partial state is ever published
// 2. Rule engines never return an error for a no-op swap (empty instruction instead)

use thiserror::Error;

use crate::staker_store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitteeStateError {
    /// Wrong tuple arity, bad key encoding, mismatched list lengths
    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),

    /// Unknown shard, mismatched swap, fixed-prefix removal
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),

    #[error("staker lookup failed for {key}: {reason}")]
    StakerLookupFailure { key: String, reason: String },

    #[error("invalid committee config: {0}")]
    InvalidConfig(String),

    #[error("state hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("state encoding failed: {0}")]
    Encoding(String),

    #[error("no uncommitted state to commit")]
    NothingToCommit,

    #[error("staker store error: {0}")]
    Store(#[from] StoreError),
}

impl CommitteeStateError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        CommitteeStateError::MalformedInstruction(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        CommitteeStateError::PreconditionViolation(msg.into())
    }

    pub fn lookup(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CommitteeStateError::StakerLookupFailure {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommitteeStateError>;
