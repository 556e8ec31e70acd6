use thiserror::Error;

/// Errors returned by the public `Server` API.
///
/// Expected outcomes (missing key, redundant join, expired range) are never represented here —
/// they're folded into `Option`/`bool` return values instead. This type is reserved for conditions
/// a caller genuinely needs to branch on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed join pattern: {0}")]
    MalformedPattern(String),

    #[error("triecut invariant violated: key of length {key_len} routed under triecut {triecut}")]
    TriecutViolation { key_len: usize, triecut: usize },

    #[error("partition unavailable for range")]
    PartitionUnavailable,
}

pub type Result<T> = std::result::Result<T, EngineError>;
