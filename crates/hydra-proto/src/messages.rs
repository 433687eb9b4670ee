//! Hydra protocol message types.
//!
//! Every request a client sends has exactly one reply. Replies are never
//! sent unsolicited.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use hydra_core::{PostHeader, PostId};

/// Unique identifier for a Hydra node.
///
/// Generated once per node and persisted in its settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random node ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr)?;
        Ok(Self(arr))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Message size limits.
pub mod limits {
    /// Max octets a single FetchChunk may request.
    pub const MAX_CHUNK_OCTETS: u64 = 1024 * 1024;
    /// Max encoded size of one frame body. Leaves room for a full chunk
    /// plus envelope.
    pub const MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;
    /// Max nickname length in HelloOk.
    pub const MAX_NICKNAME_LEN: usize = 256;
    /// Max reason length in Error.
    pub const MAX_REASON_LEN: usize = 1024;
}

/// Hydra protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HydraMessage {
    /// Open a session.
    Hello,

    /// Server identity.
    HelloOk {
        /// The server's persisted node identity.
        identity: NodeId,
        /// The server's nickname.
        nickname: String,
    },

    /// Report the range of posts the client already holds.
    Sync {
        /// Oldest post held, if any.
        oldest: Option<PostId>,
        /// Newest post held, if any.
        newest: Option<PostId>,
    },

    /// How many posts lie outside the client's range.
    SyncOk {
        /// Index of the client's oldest post, i.e. how many posts are older.
        /// `None` when the range was not found in the ledger.
        before: Option<u64>,
        /// Number of posts newer than the client's newest post.
        after: u64,
    },

    /// Fetch the post before the session's oldest cursor.
    FetchOlder,

    /// Fetch the post after the session's newest cursor.
    FetchNewer,

    /// Fetch the newest post in the ledger and move both cursors to it.
    FetchReset,

    /// Header of the fetched post. Content follows via FetchChunk.
    FetchOk(PostHeader),

    /// Read a range of the current post's content.
    FetchChunk {
        /// Byte offset into the content.
        offset: u64,
        /// Max bytes to return.
        octets: u64,
    },

    /// A range of the current post's content.
    FetchChunkOk {
        /// The bytes; shorter than requested at the end of the content.
        content: Bytes,
    },

    /// The requested post does not exist.
    NoSuchPost,

    /// Liveness check.
    Ping,

    /// Liveness reply.
    PingOk,

    /// Close the session.
    Goodbye,

    /// Session closed.
    GoodbyeOk,

    /// Request failed.
    Error {
        /// Status code for programmatic handling.
        status: StatusCode,
        /// Human-readable description.
        reason: String,
    },
}

impl HydraMessage {
    /// Protocol name of the message, for logs and error reasons.
    pub fn name(&self) -> &'static str {
        match self {
            HydraMessage::Hello => "HELLO",
            HydraMessage::HelloOk { .. } => "HELLO_OK",
            HydraMessage::Sync { .. } => "SYNC",
            HydraMessage::SyncOk { .. } => "SYNC_OK",
            HydraMessage::FetchOlder => "FETCH_OLDER",
            HydraMessage::FetchNewer => "FETCH_NEWER",
            HydraMessage::FetchReset => "FETCH_RESET",
            HydraMessage::FetchOk(_) => "FETCH_OK",
            HydraMessage::FetchChunk { .. } => "FETCH_CHUNK",
            HydraMessage::FetchChunkOk { .. } => "FETCH_CHUNK_OK",
            HydraMessage::NoSuchPost => "NO_SUCH_POST",
            HydraMessage::Ping => "PING",
            HydraMessage::PingOk => "PING_OK",
            HydraMessage::Goodbye => "GOODBYE",
            HydraMessage::GoodbyeOk => "GOODBYE_OK",
            HydraMessage::Error { .. } => "ERROR",
        }
    }

    /// Build an error reply.
    pub fn error(status: StatusCode, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.len() > limits::MAX_REASON_LEN {
            let mut end = limits::MAX_REASON_LEN;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }
        HydraMessage::Error { status, reason }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            HydraMessage::HelloOk { nickname, .. } => {
                if nickname.len() > limits::MAX_NICKNAME_LEN {
                    return Err("nickname too long");
                }
            }
            HydraMessage::FetchChunk { octets, .. } => {
                if *octets > limits::MAX_CHUNK_OCTETS {
                    return Err("chunk request too large");
                }
            }
            HydraMessage::FetchChunkOk { content } => {
                if content.len() as u64 > limits::MAX_CHUNK_OCTETS {
                    return Err("chunk too large");
                }
            }
            HydraMessage::Error { reason, .. } => {
                if reason.len() > limits::MAX_REASON_LEN {
                    return Err("error reason too long");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Status codes carried by error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum StatusCode {
    /// The request is not valid in the session's state, or malformed.
    CommandInvalid = 500,
    /// The server failed to carry out a valid request.
    InternalError = 501,
}

/// Log one protocol message at the level chosen by the instance.
pub fn trace_message(trace: bool, direction: &'static str, message: &HydraMessage) {
    if trace {
        tracing::info!(direction, message = message.name(), "hydra message");
    } else {
        tracing::debug!(direction, message = message.name(), "hydra message");
    }
}
