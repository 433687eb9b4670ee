//! In-memory implementation of the Ledger trait.
//!
//! Same semantics as SQLite, nothing persisted.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use hydra_core::{Post, PostId};

use crate::error::{LedgerError, Result};
use crate::traits::Ledger;

/// In-memory ledger.
///
/// All posts are lost when the ledger is dropped. Thread-safe via RwLock.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

#[derive(Default)]
struct MemoryLedgerInner {
    /// Posts in ledger order.
    posts: Vec<Post>,

    /// Identity index: identity -> position.
    positions: HashMap<PostId, u64>,
}

impl MemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner::default()),
        }
    }

    /// Create a ledger holding the given posts, in order.
    pub fn with_posts(posts: impl IntoIterator<Item = Post>) -> Self {
        let mut inner = MemoryLedgerInner::default();
        for post in posts {
            inner.append(post);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl MemoryLedgerInner {
    fn append(&mut self, post: Post) -> u64 {
        if let Some(&existing) = self.positions.get(post.identity()) {
            return existing;
        }
        let index = self.posts.len() as u64;
        self.positions.insert(*post.identity(), index);
        self.posts.push(post);
        index
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn store(&self, post: Post) -> Result<u64> {
        let mut inner = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(inner.append(post))
    }

    async fn fetch(&self, index: u64) -> Result<Option<Post>> {
        let inner = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| inner.posts.get(i))
            .cloned())
    }

    async fn index(&self, identity: &PostId) -> Result<Option<u64>> {
        let inner = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(inner.positions.get(identity).copied())
    }

    async fn size(&self) -> Result<u64> {
        let inner = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(inner.posts.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_post(n: u32) -> Post {
        Post::builder(format!("post {}", n))
            .timestamp(1_700_000_000_000 + n as i64)
            .text(format!("body {}", n))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_assigns_next_index() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.size().await.unwrap(), 0);

        for n in 0..5 {
            let index = ledger.store(make_post(n)).await.unwrap();
            assert_eq!(index, n as u64);
        }
        assert_eq!(ledger.size().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_fetch_by_index_of_identity() {
        let ledger = MemoryLedger::new();
        let post = make_post(7);
        let id = *post.identity();
        ledger.store(make_post(1)).await.unwrap();
        ledger.store(post).await.unwrap();

        let index = ledger.index(&id).await.unwrap().unwrap();
        assert_eq!(index, 1);
        let fetched = ledger.fetch(index).await.unwrap().unwrap();
        assert_eq!(fetched.identity(), &id);
    }

    #[tokio::test]
    async fn test_unknown_identity_and_out_of_range() {
        let ledger = MemoryLedger::with_posts([make_post(0)]);
        assert_eq!(ledger.index(&PostId::from_bytes([9; 32])).await.unwrap(), None);
        assert!(ledger.fetch(1).await.unwrap().is_none());
        assert!(ledger.fetch(u64::MAX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let ledger = MemoryLedger::new();
        let post = make_post(3);
        assert_eq!(ledger.store(post.clone()).await.unwrap(), 0);
        ledger.store(make_post(4)).await.unwrap();
        assert_eq!(ledger.store(post).await.unwrap(), 0);
        assert_eq!(ledger.size().await.unwrap(), 2);
    }

    proptest! {
        #[test]
        fn prop_index_follows_insertion_order(count in 1u32..40) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let ledger = MemoryLedger::new();
                let posts: Vec<Post> = (0..count).map(make_post).collect();
                for post in &posts {
                    ledger.store(post.clone()).await.unwrap();
                }
                let mut previous = None;
                for post in &posts {
                    let index = ledger.index(post.identity()).await.unwrap().unwrap();
                    if let Some(prev) = previous {
                        assert!(prev < index);
                    }
                    previous = Some(index);
                    let fetched = ledger.fetch(index).await.unwrap().unwrap();
                    assert_eq!(fetched.identity(), post.identity());
                }
            });
        }
    }
}
