//! # Hydra
//!
//! A node that shares an append-only ledger of posts with its peers.
//!
//! ## Overview
//!
//! - **Server**: owns a ledger, accepts connections and serves each peer
//!   through a protocol session. Local callers append posts through its
//!   method interface or its ingestion sink.
//! - **Client**: connects to a server, learns how its own range of posts
//!   relates to the server's, and fetches what it is missing, verifying each
//!   post against its identity.
//!
//! ## Key Concepts
//!
//! - **Post**: Immutable. Its identity is a hash of its header and content.
//! - **Ledger**: Posts in arrival order. Positions never change.
//! - **Range**: The oldest and newest post a client already holds.
//! - **Sink**: A channel that feeds posts into a server's ledger.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use hydra::{ClientConfig, ClientEvent, HydraClient, PostRequest, Server, ServerConfig, Settings};
//! use hydra::proto::MemoryNetwork;
//! use hydra::store::MemoryLedger;
//!
//! async fn example() -> hydra::Result<()> {
//!     let network = MemoryNetwork::new();
//!
//!     // Start a server
//!     let mut settings = Settings::in_memory();
//!     let server = Server::start(
//!         ServerConfig::default(),
//!         &mut settings,
//!         Arc::new(MemoryLedger::new()),
//!         Arc::new(network.transport()),
//!     )
//!     .await?;
//!     let handle = server.handle();
//!     handle.bind("inproc://hydra").await?;
//!     handle.post(PostRequest::text("hello", "first post")).await?;
//!
//!     // Sync a client from it
//!     let mut client = HydraClient::new(ClientConfig::default(), Arc::new(network.transport()));
//!     client.connect("inproc://hydra", Some(Duration::from_secs(5))).await?;
//!     client.sync().await?;
//!     while let Some(event) = client.events().recv().await {
//!         match event {
//!             ClientEvent::Post(post) => println!("{}", post.subject()),
//!             ClientEvent::Success { .. } | ClientEvent::Failed { .. } => break,
//!         }
//!     }
//!
//!     client.close().await?;
//!     server.shutdown().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hydra::core` - Posts and identities
//! - `hydra::store` - Ledger abstraction, in-memory and SQLite
//! - `hydra::proto` - Messages, framing, transports and sessions

pub mod client;
pub mod config;
pub mod error;
pub mod method;
pub mod server;
pub mod settings;

// Re-export component crates
pub use hydra_core as core;
pub use hydra_proto as proto;
pub use hydra_store as store;

// Re-export main types for convenience
pub use client::{ClientEvent, ClientHandle, ClientStatus, HydraClient};
pub use config::{ClientConfig, RetryConfig, ServerConfig};
pub use error::{HydraError, Result};
pub use method::{ContentArg, LocalMethod, MethodReply, PostRequest, PostSink};
pub use server::{Server, ServerHandle};
pub use settings::Settings;

pub use hydra_core::{Post, PostHeader, PostId};
pub use hydra_proto::{NodeId, StatusCode};
