//! # Hydra Protocol
//!
//! Wire format, transports and the server-side session state machine.
//!
//! ## Overview
//!
//! A client opens a stream to a server, introduces itself, reports the
//! oldest and newest posts it already holds, and then pulls what it is
//! missing one post at a time. Post content is read in bounded chunks so a
//! large post never has to travel in a single frame.
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Server
//!   |-------- HELLO ------------------>|
//!   |<------- HELLO_OK ----------------|
//!   |-------- SYNC ------------------->|
//!   |<------- SYNC_OK -----------------|
//!   |-------- FETCH_NEWER ------------>|
//!   |<------- FETCH_OK ----------------|
//!   |-------- FETCH_CHUNK ------------>|
//!   |<------- FETCH_CHUNK_OK ----------|
//!   |               ...                |
//!   |-------- FETCH_NEWER ------------>|
//!   |<------- NO_SUCH_POST ------------|
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hydra_proto::{MemoryNetwork, NodeId, PeerInfo, Session, Transport};
//! use hydra_store::MemoryLedger;
//!
//! async fn example() -> hydra_proto::Result<()> {
//!     let network = MemoryNetwork::new();
//!     let transport = network.transport();
//!     let mut listener = transport.bind("inproc://hydra").await?;
//!
//!     let ledger = Arc::new(MemoryLedger::new());
//!     let local = Arc::new(PeerInfo {
//!         identity: NodeId::random(),
//!         nickname: "Anonymous".into(),
//!     });
//!     let (stream, _peer) = listener.accept().await?;
//!     Session::new(ledger, local).serve(stream).await
//! }
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;

pub use error::{ProtoError, Result};
pub use messages::{limits, trace_message, HydraMessage, NodeId, StatusCode};
pub use session::{PeerInfo, Session, SessionState};
pub use transport::{
    memory::MemoryNetwork, memory::MemoryTransport, tcp::TcpTransport, AsyncStream, BoxStream,
    Endpoint, Listener, Transport,
};
