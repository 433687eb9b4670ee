//! Error types for the Hydra node.

use hydra_core::CoreError;
use hydra_proto::{ProtoError, StatusCode};
use hydra_store::LedgerError;
use thiserror::Error;

/// Errors that can occur during server and client operations.
#[derive(Debug, Error)]
pub enum HydraError {
    /// Post error.
    #[error("post error: {0}")]
    Core(#[from] CoreError),

    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Protocol or transport error.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Local method name not recognised.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Content kind other than string, file or frame.
    #[error("unknown content kind: {0}")]
    UnknownContentKind(String),

    /// A local method was called without a required argument.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// A local method argument could not be parsed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The client has never connected.
    #[error("not connected")]
    NotConnected,

    /// A blocking call gave up before it could complete.
    #[error("interrupted")]
    Interrupted,

    /// The server or client actor has stopped.
    #[error("actor stopped")]
    Stopped,

    /// Peer answered with an error.
    #[error("peer error ({status:?}): {reason}")]
    Peer { status: StatusCode, reason: String },

    /// Stored settings are unusable.
    #[error("invalid setting {path}: {reason}")]
    Settings { path: String, reason: String },

    /// Settings file could not be parsed or written.
    #[error("settings format error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Hydra operations.
pub type Result<T> = std::result::Result<T, HydraError>;
