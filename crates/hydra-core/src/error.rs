//! Error types for Hydra Core.

use thiserror::Error;

use crate::types::PostId;

/// Errors that can occur while building, reading or verifying posts.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("content too large: {size} bytes exceeds maximum of {max}")]
    ContentTooLarge { size: u64, max: u64 },

    #[error("content size mismatch: header says {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("content digest does not match header")]
    DigestMismatch,

    #[error("post identity mismatch: header says {expected}, computed {actual}")]
    IdentityMismatch { expected: PostId, actual: PostId },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
