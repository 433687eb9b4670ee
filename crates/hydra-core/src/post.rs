//! Post: a single ledger entry.
//!
//! A post is a header (identity, subject, threading, mime type and a
//! description of the content) plus content that lives inline or in a file.
//! Posts are immutable once built.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::hash::Blake3Hash;
use crate::types::PostId;

/// Maximum content size of a single post (10 MiB).
///
/// Larger content needs chunked upload, which the protocol does not have.
pub const CONTENT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Mime type used when the builder is not given one.
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

const IDENTITY_DOMAIN: &[u8] = b"hydra-post-v0:";

/// Everything about a post except its content bytes.
///
/// This is what travels on the wire in reply to a fetch; the content follows
/// in separate chunk requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHeader {
    /// Content-addressed identity.
    pub identity: PostId,
    /// Free-form subject line.
    pub subject: String,
    /// Creation time (Unix ms).
    pub timestamp: i64,
    /// Post this one replies to, if any.
    pub parent_id: Option<PostId>,
    /// Content mime type.
    pub mime_type: String,
    /// Blake3 digest of the content bytes.
    pub digest: Blake3Hash,
    /// Content length in bytes.
    pub content_size: u64,
}

impl PostHeader {
    /// Recompute the identity from the other header fields.
    pub fn compute_identity(&self) -> PostId {
        derive_identity(
            &self.subject,
            self.timestamp,
            self.parent_id.as_ref(),
            &self.mime_type,
            &self.digest,
            self.content_size,
        )
    }
}

/// Length-prefixed fields under a domain tag, so adjacent strings can't alias.
fn derive_identity(
    subject: &str,
    timestamp: i64,
    parent_id: Option<&PostId>,
    mime_type: &str,
    digest: &Blake3Hash,
    content_size: u64,
) -> PostId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(IDENTITY_DOMAIN);
    hasher.update(&(subject.len() as u64).to_be_bytes());
    hasher.update(subject.as_bytes());
    hasher.update(&timestamp.to_be_bytes());
    match parent_id {
        Some(parent) => {
            hasher.update(&[1]);
            hasher.update(parent.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    hasher.update(&(mime_type.len() as u64).to_be_bytes());
    hasher.update(mime_type.as_bytes());
    hasher.update(digest.as_bytes());
    hasher.update(&content_size.to_be_bytes());
    PostId(*hasher.finalize().as_bytes())
}

/// Where a post's content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostContent {
    /// Inline UTF-8 text.
    Text(String),
    /// Inline binary blob.
    Data(Bytes),
    /// Content stored in a file, read on demand.
    File(PathBuf),
}

impl PostContent {
    /// The content-kind name used by the local method interface.
    pub fn kind(&self) -> &'static str {
        match self {
            PostContent::Text(_) => "string",
            PostContent::Data(_) => "frame",
            PostContent::File(_) => "file",
        }
    }
}

/// A single ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    header: PostHeader,
    content: PostContent,
}

impl Post {
    /// Start building a post with the given subject.
    pub fn builder(subject: impl Into<String>) -> PostBuilder {
        PostBuilder::new(subject)
    }

    /// Reassemble a post received over the wire.
    ///
    /// Checks the content against the header's size and digest, and the
    /// header against its identity.
    pub fn from_parts(header: PostHeader, content: Bytes) -> Result<Self> {
        let actual = content.len() as u64;
        check_size(actual)?;
        if actual != header.content_size {
            return Err(CoreError::SizeMismatch {
                expected: header.content_size,
                actual,
            });
        }
        if Blake3Hash::hash(&content) != header.digest {
            return Err(CoreError::DigestMismatch);
        }
        let computed = header.compute_identity();
        if computed != header.identity {
            return Err(CoreError::IdentityMismatch {
                expected: header.identity,
                actual: computed,
            });
        }
        Ok(Self {
            header,
            content: PostContent::Data(content),
        })
    }

    /// Rebuild a post from trusted storage without re-reading its content.
    pub fn restore(header: PostHeader, content: PostContent) -> Self {
        Self { header, content }
    }

    /// Get the post identity.
    pub fn identity(&self) -> &PostId {
        &self.header.identity
    }

    /// Get the header.
    pub fn header(&self) -> &PostHeader {
        &self.header
    }

    /// Get the content.
    pub fn content(&self) -> &PostContent {
        &self.content
    }

    /// Get the subject.
    pub fn subject(&self) -> &str {
        &self.header.subject
    }

    /// Get the parent post identity.
    pub fn parent_id(&self) -> Option<&PostId> {
        self.header.parent_id.as_ref()
    }

    /// Get the mime type.
    pub fn mime_type(&self) -> &str {
        &self.header.mime_type
    }

    /// Get the content size in bytes.
    pub fn content_size(&self) -> u64 {
        self.header.content_size
    }

    /// Check if reading the content touches the filesystem.
    pub fn is_file_backed(&self) -> bool {
        matches!(self.content, PostContent::File(_))
    }

    /// Fetch `octets` bytes of content starting at `offset`.
    ///
    /// The range is clamped to the end of the content; an offset at or past
    /// the end returns an empty chunk.
    pub fn fetch(&self, offset: u64, octets: u64) -> Result<Bytes> {
        let size = self.header.content_size;
        let start = offset.min(size);
        let end = start.saturating_add(octets).min(size);
        if start == end {
            return Ok(Bytes::new());
        }

        let range = start as usize..end as usize;
        match &self.content {
            PostContent::Text(text) => text
                .as_bytes()
                .get(range)
                .map(Bytes::copy_from_slice)
                .ok_or_else(|| self.short_content(text.len())),
            PostContent::Data(data) if data.len() >= range.end => Ok(data.slice(range)),
            PostContent::Data(data) => Err(self.short_content(data.len())),
            PostContent::File(path) => read_file_range(path, start, end - start),
        }
    }

    fn short_content(&self, actual: usize) -> CoreError {
        CoreError::SizeMismatch {
            expected: self.header.content_size,
            actual: actual as u64,
        }
    }

    /// Read the whole content.
    pub fn read_content(&self) -> Result<Bytes> {
        self.fetch(0, self.header.content_size)
    }
}

fn read_file_range(path: &Path, offset: u64, len: u64) -> Result<Bytes> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;
    Ok(Bytes::from(buf))
}

fn check_size(size: u64) -> Result<()> {
    if size > CONTENT_MAX_SIZE {
        return Err(CoreError::ContentTooLarge {
            size,
            max: CONTENT_MAX_SIZE,
        });
    }
    Ok(())
}

/// Builder for creating posts.
pub struct PostBuilder {
    subject: String,
    timestamp: Option<i64>,
    parent_id: Option<PostId>,
    mime_type: String,
    content: PostContent,
}

impl PostBuilder {
    /// Start building a post.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            timestamp: None,
            parent_id: None,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            content: PostContent::Text(String::new()),
        }
    }

    /// Set the timestamp. Defaults to the current time.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Set the parent post.
    pub fn parent(mut self, parent: PostId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Set the parent post, if any.
    pub fn parent_opt(mut self, parent: Option<PostId>) -> Self {
        self.parent_id = parent;
        self
    }

    /// Set the mime type.
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Use inline text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content = PostContent::Text(text.into());
        self
    }

    /// Use inline binary content.
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.content = PostContent::Data(data.into());
        self
    }

    /// Use file-backed content. The file is hashed when the post is built.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.content = PostContent::File(path.into());
        self
    }

    /// Build the post, digesting its content and deriving its identity.
    pub fn build(self) -> Result<Post> {
        let (digest, content_size) = match &self.content {
            PostContent::Text(text) => digest_inline(text.as_bytes())?,
            PostContent::Data(data) => digest_inline(data)?,
            PostContent::File(path) => digest_file(path)?,
        };
        let timestamp = self.timestamp.unwrap_or_else(now_millis);
        let identity = derive_identity(
            &self.subject,
            timestamp,
            self.parent_id.as_ref(),
            &self.mime_type,
            &digest,
            content_size,
        );

        Ok(Post {
            header: PostHeader {
                identity,
                subject: self.subject,
                timestamp,
                parent_id: self.parent_id,
                mime_type: self.mime_type,
                digest,
                content_size,
            },
            content: self.content,
        })
    }
}

fn digest_inline(bytes: &[u8]) -> Result<(Blake3Hash, u64)> {
    let size = bytes.len() as u64;
    check_size(size)?;
    Ok((Blake3Hash::hash(bytes), size))
}

fn digest_file(path: &Path) -> Result<(Blake3Hash, u64)> {
    let mut file = File::open(path)?;
    check_size(file.metadata()?.len())?;
    let mut hasher = blake3::Hasher::new();
    let size = std::io::copy(&mut file, &mut hasher)?;
    check_size(size)?;
    Ok((hasher.finalize().into(), size))
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn text_post(subject: &str, body: &str) -> Post {
        Post::builder(subject)
            .timestamp(1_700_000_000_000)
            .text(body)
            .build()
            .unwrap()
    }

    fn reassemble(post: &Post, chunk: u64) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < post.content_size() {
            let bytes = post.fetch(offset, chunk).unwrap();
            assert!(!bytes.is_empty());
            offset += bytes.len() as u64;
            out.extend_from_slice(&bytes);
        }
        out
    }

    #[test]
    fn test_identity_is_deterministic() {
        let a = text_post("hello", "world");
        let b = text_post("hello", "world");
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.header().compute_identity(), *a.identity());
    }

    #[test]
    fn test_identity_depends_on_content_and_parent() {
        let a = text_post("hello", "world");
        let b = text_post("hello", "world!");
        assert_ne!(a.identity(), b.identity());

        let reply = Post::builder("hello")
            .timestamp(1_700_000_000_000)
            .parent(*a.identity())
            .text("world")
            .build()
            .unwrap();
        assert_ne!(reply.identity(), a.identity());
        assert_eq!(reply.parent_id(), Some(a.identity()));
    }

    #[test]
    fn test_subject_and_mime_do_not_alias() {
        let a = Post::builder("ab")
            .timestamp(1)
            .mime_type("c")
            .build()
            .unwrap();
        let b = Post::builder("a")
            .timestamp(1)
            .mime_type("bc")
            .build()
            .unwrap();
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_fetch_clamps_to_content_end() {
        let post = text_post("s", "0123456789");
        assert_eq!(&post.fetch(0, 4).unwrap()[..], b"0123");
        assert_eq!(&post.fetch(8, 100).unwrap()[..], b"89");
        assert!(post.fetch(10, 5).unwrap().is_empty());
        assert!(post.fetch(u64::MAX, u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_short_inline_content_is_an_error() {
        let header = text_post("s", "0123456789").header().clone();
        let text = Post::restore(header.clone(), PostContent::Text("012".into()));
        assert!(matches!(
            text.fetch(0, 10),
            Err(CoreError::SizeMismatch { expected: 10, actual: 3 })
        ));
        assert_eq!(&text.fetch(0, 2).unwrap()[..], b"01");

        let data = Post::restore(header, PostContent::Data(Bytes::from_static(b"01")));
        assert!(matches!(
            data.fetch(1, 4),
            Err(CoreError::SizeMismatch { expected: 10, actual: 2 })
        ));
    }

    #[test]
    fn test_chunked_fetch_reassembles_binary() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let post = Post::builder("blob")
            .mime_type("application/octet-stream")
            .data(data.clone())
            .build()
            .unwrap();
        assert_eq!(post.content().kind(), "frame");
        assert_eq!(reassemble(&post, 333), data);
    }

    #[test]
    fn test_file_backed_post() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 7) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let post = Post::builder("file")
            .timestamp(5)
            .file(file.path())
            .build()
            .unwrap();
        assert!(post.is_file_backed());
        assert_eq!(post.content_size(), 5000);
        assert_eq!(reassemble(&post, 1024), data);

        // Same bytes inline give the same identity.
        let inline = Post::builder("file").timestamp(5).data(data).build().unwrap();
        assert_eq!(inline.identity(), post.identity());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Post::builder("gone").file("/nonexistent/hydra/post").build();
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[test]
    fn test_content_too_large() {
        let data = vec![0u8; (CONTENT_MAX_SIZE + 1) as usize];
        let result = Post::builder("big").data(data).build();
        assert!(matches!(result, Err(CoreError::ContentTooLarge { .. })));
    }

    #[test]
    fn test_from_parts_verifies() {
        let post = text_post("hello", "world");
        let content = post.read_content().unwrap();

        let rebuilt = Post::from_parts(post.header().clone(), content.clone()).unwrap();
        assert_eq!(rebuilt.identity(), post.identity());

        let tampered = Bytes::from_static(b"worle");
        assert!(matches!(
            Post::from_parts(post.header().clone(), tampered),
            Err(CoreError::DigestMismatch)
        ));

        let short = content.slice(0..3);
        assert!(matches!(
            Post::from_parts(post.header().clone(), short),
            Err(CoreError::SizeMismatch { expected: 5, actual: 3 })
        ));

        let mut header = post.header().clone();
        header.subject = "forged".into();
        assert!(matches!(
            Post::from_parts(header, content),
            Err(CoreError::IdentityMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_contiguous_chunks_reassemble(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            chunk in 1u64..512,
        ) {
            let post = Post::builder("p").data(data.clone()).build().unwrap();
            prop_assert_eq!(reassemble(&post, chunk), data);
        }
    }
}
