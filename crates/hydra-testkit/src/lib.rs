//! # Hydra Testkit
//!
//! Testing utilities for Hydra.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Deterministic posts and pre-filled ledgers
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hydra_testkit::generators::{post_from_params, PostParams};
//!
//! proptest! {
//!     #[test]
//!     fn identity_is_deterministic(params: PostParams) {
//!         let a = post_from_params(&params);
//!         let b = post_from_params(&params);
//!         prop_assert_eq!(a.identity(), b.identity());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use hydra_testkit::fixtures::{thread, LedgerFixture};
//!
//! let posts = thread(3);
//! assert_eq!(posts[1].parent_id(), Some(posts[0].identity()));
//!
//! let fixture = LedgerFixture::with_thread(3);
//! assert_eq!(fixture.ids().len(), 3);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{binary_post, file_post, text_post, thread, LedgerFixture, BASE_TIMESTAMP};
pub use generators::{post_from_params, PostParams};
