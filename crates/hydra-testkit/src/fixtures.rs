//! Test fixtures and helpers.
//!
//! Every post built here has a fixed timestamp, so identities are stable
//! across runs.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use hydra_core::{Post, PostId};
use hydra_store::MemoryLedger;

/// Timestamp of the first fixture post (2025-01-14T16:00:00Z).
pub const BASE_TIMESTAMP: i64 = 1_736_870_400_000;

/// A text post with the default mime type.
pub fn text_post(subject: &str, body: &str, timestamp: i64) -> Post {
    Post::builder(subject)
        .timestamp(timestamp)
        .text(body)
        .build()
        .expect("fixture post")
}

/// A binary post of `size` patterned bytes.
pub fn binary_post(subject: &str, size: usize, timestamp: i64) -> Post {
    let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    Post::builder(subject)
        .timestamp(timestamp)
        .mime_type("application/octet-stream")
        .data(Bytes::from(content))
        .build()
        .expect("fixture post")
}

/// Write `content` to `dir/name` and build a post backed by that file.
pub fn file_post(dir: &Path, name: &str, content: &[u8]) -> Post {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture file");
    Post::builder(name)
        .timestamp(BASE_TIMESTAMP)
        .mime_type("application/octet-stream")
        .file(path)
        .build()
        .expect("fixture post")
}

/// A thread of `count` text posts, each replying to the one before.
///
/// Subjects are `post-0`, `post-1`, ...
pub fn thread(count: usize) -> Vec<Post> {
    let mut posts: Vec<Post> = Vec::with_capacity(count);
    for i in 0..count {
        let parent = posts.last().map(|p| *p.identity());
        let post = Post::builder(format!("post-{}", i))
            .timestamp(BASE_TIMESTAMP + i as i64)
            .parent_opt(parent)
            .text(format!("body of post {}", i))
            .build()
            .expect("fixture post");
        posts.push(post);
    }
    posts
}

/// A memory ledger pre-filled with posts, plus the posts themselves.
pub struct LedgerFixture {
    pub ledger: Arc<MemoryLedger>,
    pub posts: Vec<Post>,
}

impl LedgerFixture {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::with_posts(Vec::new())
    }

    /// A ledger holding `posts` in order.
    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::with_posts(posts.clone())),
            posts,
        }
    }

    /// A ledger holding a [`thread`] of `count` posts.
    pub fn with_thread(count: usize) -> Self {
        Self::with_posts(thread(count))
    }

    /// Identities of the fixture posts in ledger order.
    pub fn ids(&self) -> Vec<PostId> {
        self.posts.iter().map(|p| *p.identity()).collect()
    }
}

impl Default for LedgerFixture {
    fn default() -> Self {
        Self::new()
    }
}
