//! Error types for the protocol layer.

use thiserror::Error;

/// Errors that can occur while framing, transporting or serving messages.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A frame announced a body larger than the protocol allows.
    ///
    /// The stream is no longer in sync and must be closed.
    #[error("frame too large: {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame body was read but did not decode.
    ///
    /// The stream is still in sync; the peer can be told and the
    /// connection kept.
    #[error("malformed message: {0}")]
    Decode(String),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// A message violated protocol limits.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The endpoint string is not understood by the transport.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Something is already bound to the endpoint.
    #[error("endpoint already in use: {0}")]
    AddressInUse(String),

    /// Nothing is listening on the endpoint.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The listener or connection has been shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// Ledger operation failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] hydra_store::LedgerError),

    /// Post content could not be read or verified.
    #[error("post error: {0}")]
    Core(#[from] hydra_core::CoreError),

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),

    /// Socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;
