//! # Hydra Core
//!
//! Primitives shared by every Hydra layer: posts, their content-addressed
//! identities, and bounded access to their content.
//!
//! This crate has no networking and no storage. The only I/O it performs is
//! reading file-backed post content.
//!
//! ## Key Types
//!
//! - [`Post`] - A single ledger entry (header plus content)
//! - [`PostId`] - Content-addressed identifier (Blake3)
//! - [`PostHeader`] - Everything about a post except its content bytes
//! - [`PostContent`] - Inline text, inline binary, or a file on disk
//!
//! ## Chunked Content
//!
//! Large content is never moved in one piece. [`Post::fetch`] returns a
//! bounded byte range, and [`Post::from_parts`] reassembles and verifies a
//! post received in chunks.

pub mod error;
pub mod hash;
pub mod post;
pub mod types;

pub use error::{CoreError, Result};
pub use hash::Blake3Hash;
pub use post::{Post, PostBuilder, PostContent, PostHeader, CONTENT_MAX_SIZE, DEFAULT_MIME_TYPE};
pub use types::PostId;
