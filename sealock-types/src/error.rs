//! Error taxonomy shared by every storage engine component.
//!
//! Each variant maps to a documented caller action (retry, no-retry,
//! surface-and-quarantine, ...); see the component contracts for details.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Malformed request: empty payload, bad chunk index, digest mismatch.
    /// Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown file, block, session or snapshot. Never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Session already finalized/aborted, or a ref-count update lost a race.
    /// Caller may refetch and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Finalize was attempted with chunks still missing.
    #[error("upload incomplete, missing chunks: {missing:?}")]
    Incomplete { missing: Vec<u32> },

    /// I/O timeout, cache unreachable, metadata store hiccup. Retried with
    /// bounded backoff inside the engine; surfaced only once retries exhaust.
    #[error("transient failure: {0}")]
    Transient(String),

    /// On-disk corruption or a stored block whose digest no longer matches
    /// its content. Surfaced immediately, block is quarantined.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Caller-supplied deadline was hit.
    #[error("cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
