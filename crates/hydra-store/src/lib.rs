//! # Hydra Store
//!
//! The ledger: an ordered, append-only collection of posts with an
//! identity → position index.
//!
//! ## Key Types
//!
//! - [`Ledger`] - The async trait every backend implements
//! - [`MemoryLedger`] - In-memory ledger for tests and ephemeral nodes
//! - [`SqliteLedger`] - Persistent ledger; posts survive restarts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hydra_core::Post;
//! use hydra_store::{Ledger, SqliteLedger};
//!
//! async fn example() {
//!     let ledger = SqliteLedger::open("hydra.db").unwrap();
//!     let post = Post::builder("hello").text("world").build().unwrap();
//!     let index = ledger.store(post).await.unwrap();
//!     assert_eq!(ledger.size().await.unwrap(), index + 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append only**: there is no update or delete.
//! - **Monotonic positions**: a post stored later never gets a lower index.
//! - **Idempotent stores**: storing a post whose identity is already present
//!   returns the existing index.
//! - **Soft misses**: fetching an out-of-range index returns `None`.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, Result};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::Ledger;
