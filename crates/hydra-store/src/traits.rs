//! Ledger trait: the abstract interface the protocol layers consume.

use std::sync::Arc;

use async_trait::async_trait;
use hydra_core::{Post, PostId};

use crate::error::Result;

/// The Ledger trait: an ordered, append-only, content-addressed post store.
///
/// Positions are 0-based and assigned in insertion order. Implementations
/// use interior locking: one writer appends while any number of readers
/// fetch, and readers must tolerate `size()` growing between calls.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append a post and return its position.
    ///
    /// The post is moved into the ledger. If a post with the same identity
    /// is already present, its existing position is returned instead.
    async fn store(&self, post: Post) -> Result<u64>;

    /// Get the post at a position, or `None` when out of range.
    async fn fetch(&self, index: u64) -> Result<Option<Post>>;

    /// Get the position of a post by identity.
    async fn index(&self, identity: &PostId) -> Result<Option<u64>>;

    /// Number of posts in the ledger.
    async fn size(&self) -> Result<u64>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn store(&self, post: Post) -> Result<u64> {
        (**self).store(post).await
    }

    async fn fetch(&self, index: u64) -> Result<Option<Post>> {
        (**self).fetch(index).await
    }

    async fn index(&self, identity: &PostId) -> Result<Option<u64>> {
        (**self).index(identity).await
    }

    async fn size(&self) -> Result<u64> {
        (**self).size().await
    }
}
