//! Server-side session state machine.
//!
//! One session per connection. The session tracks which slice of the ledger
//! the peer holds (the oldest and newest cursors) and the post whose content
//! is being transferred. Requests are handled strictly in order and each
//! gets exactly one reply.

use std::sync::Arc;

use hydra_core::{Post, PostId};
use hydra_store::Ledger;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec;
use crate::error::{ProtoError, Result};
use crate::messages::{limits, trace_message, HydraMessage, NodeId, StatusCode};

/// Identity a server presents in HelloOk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Persisted node identity.
    pub identity: NodeId,
    /// Human-readable nickname.
    pub nickname: String,
}

/// Session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for HELLO.
    Start,
    /// HELLO done; the peer's range is not known yet.
    IdentityExchanged,
    /// SYNC done, or the last fetch found nothing.
    RangeKnown,
    /// A post header was sent; its content can be read in chunks.
    ServingChunk,
    /// A ledger or content read failed. SYNC or FETCH_RESET recovers.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Older,
    Newer,
    Reset,
}

/// Per-connection protocol state.
pub struct Session<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    local: Arc<PeerInfo>,
    state: SessionState,
    oldest: Option<u64>,
    newest: Option<u64>,
    current_post: Option<Post>,
    closed: bool,
    trace_messages: bool,
}

impl<L: Ledger + ?Sized> Session<L> {
    /// Create a session reading from a shared ledger.
    pub fn new(ledger: Arc<L>, local: Arc<PeerInfo>) -> Self {
        Self {
            ledger,
            local,
            state: SessionState::Start,
            oldest: None,
            newest: None,
            current_post: None,
            closed: false,
            trace_messages: false,
        }
    }

    /// Log protocol traffic at info level instead of debug.
    pub fn with_trace_messages(mut self, trace: bool) -> Self {
        self.trace_messages = trace;
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Ledger index of the oldest post the peer holds.
    pub fn oldest(&self) -> Option<u64> {
        self.oldest
    }

    /// Ledger index of the newest post the peer holds.
    pub fn newest(&self) -> Option<u64> {
        self.newest
    }

    /// The post whose content is being served.
    pub fn current_post(&self) -> Option<&Post> {
        self.current_post.as_ref()
    }

    /// Check if the peer said goodbye.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handle one request and produce its reply.
    pub async fn handle(&mut self, request: HydraMessage) -> HydraMessage {
        use HydraMessage as M;
        use SessionState as S;

        let result = match (self.state, request) {
            (_, M::Ping) => Ok(M::PingOk),
            (_, M::Goodbye) => {
                self.closed = true;
                self.current_post = None;
                Ok(M::GoodbyeOk)
            }
            (S::Start, M::Hello) => {
                self.state = S::IdentityExchanged;
                Ok(M::HelloOk {
                    identity: self.local.identity,
                    nickname: self.local.nickname.clone(),
                })
            }
            (
                S::IdentityExchanged | S::RangeKnown | S::ServingChunk | S::Error,
                M::Sync { oldest, newest },
            ) => self.on_sync(oldest, newest).await,
            (S::RangeKnown | S::ServingChunk, M::FetchOlder) => self.on_fetch(Direction::Older).await,
            (S::RangeKnown | S::ServingChunk, M::FetchNewer) => self.on_fetch(Direction::Newer).await,
            (S::RangeKnown | S::ServingChunk | S::Error, M::FetchReset) => {
                self.on_fetch(Direction::Reset).await
            }
            (S::ServingChunk, M::FetchChunk { offset, octets }) => {
                self.on_fetch_chunk(offset, octets).await
            }
            (state, other) => Ok(HydraMessage::error(
                StatusCode::CommandInvalid,
                format!("{} is not valid in state {:?}", other.name(), state),
            )),
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "request failed");
                self.state = S::Error;
                self.current_post = None;
                HydraMessage::error(StatusCode::InternalError, e.to_string())
            }
        }
    }

    async fn on_sync(
        &mut self,
        oldest: Option<PostId>,
        newest: Option<PostId>,
    ) -> Result<HydraMessage> {
        let oldest = match oldest {
            Some(id) => self.ledger.index(&id).await?,
            None => None,
        };
        let newest = match newest {
            Some(id) => self.ledger.index(&id).await?,
            None => None,
        };
        let size = self.ledger.size().await?;

        self.state = SessionState::RangeKnown;
        self.current_post = None;

        let (before, after) = match (oldest, newest) {
            (Some(oldest), Some(newest)) => {
                self.oldest = Some(oldest);
                self.newest = Some(newest);
                (Some(oldest), size.saturating_sub(newest + 1))
            }
            _ => {
                self.oldest = None;
                self.newest = None;
                (None, size)
            }
        };
        tracing::debug!(?before, after, "range resolved");
        Ok(HydraMessage::SyncOk { before, after })
    }

    async fn on_fetch(&mut self, direction: Direction) -> Result<HydraMessage> {
        let size = self.ledger.size().await?;
        let target = match direction {
            Direction::Older => self.oldest.and_then(|oldest| oldest.checked_sub(1)),
            Direction::Newer => {
                let next = self.newest.map_or(0, |newest| newest + 1);
                (next < size).then_some(next)
            }
            Direction::Reset => size.checked_sub(1),
        };

        let post = match target {
            Some(index) => self.ledger.fetch(index).await?,
            None => None,
        };

        let (Some(index), Some(post)) = (target, post) else {
            if direction == Direction::Reset {
                self.oldest = None;
                self.newest = None;
            }
            self.current_post = None;
            self.state = SessionState::RangeKnown;
            return Ok(HydraMessage::NoSuchPost);
        };

        match direction {
            Direction::Older => self.oldest = Some(index),
            Direction::Newer => {
                self.newest = Some(index);
                if self.oldest.is_none() {
                    self.oldest = Some(index);
                }
            }
            Direction::Reset => {
                self.oldest = Some(index);
                self.newest = Some(index);
            }
        }

        let header = post.header().clone();
        self.current_post = Some(post);
        self.state = SessionState::ServingChunk;
        Ok(HydraMessage::FetchOk(header))
    }

    async fn on_fetch_chunk(&mut self, offset: u64, octets: u64) -> Result<HydraMessage> {
        if octets > limits::MAX_CHUNK_OCTETS {
            return Ok(HydraMessage::error(
                StatusCode::CommandInvalid,
                format!(
                    "chunk of {} octets exceeds maximum of {}",
                    octets,
                    limits::MAX_CHUNK_OCTETS
                ),
            ));
        }
        let Some(post) = self.current_post.as_ref() else {
            return Ok(HydraMessage::error(
                StatusCode::CommandInvalid,
                "no post is being served",
            ));
        };

        let content = if post.is_file_backed() {
            let post = post.clone();
            tokio::task::spawn_blocking(move || post.fetch(offset, octets))
                .await
                .map_err(|e| ProtoError::Task(format!("spawn_blocking failed: {}", e)))??
        } else {
            post.fetch(offset, octets)?
        };
        Ok(HydraMessage::FetchChunkOk { content })
    }

    /// Serve requests from a stream until the peer leaves.
    ///
    /// Malformed requests get a CommandInvalid reply and the connection
    /// stays up. Returns when the peer closes the stream or says goodbye.
    pub async fn serve<S>(mut self, mut stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let request = match codec::read_message(&mut stream).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    tracing::debug!("peer closed connection");
                    break;
                }
                Err(ProtoError::Decode(reason)) => {
                    tracing::warn!(%reason, "malformed request");
                    let reply = HydraMessage::error(StatusCode::CommandInvalid, reason);
                    codec::write_message(&mut stream, &reply).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            trace_message(self.trace_messages, "recv", &request);

            let reply = match request.validate_limits() {
                Ok(()) => self.handle(request).await,
                Err(reason) => HydraMessage::error(StatusCode::CommandInvalid, reason),
            };
            trace_message(self.trace_messages, "send", &reply);
            codec::write_message(&mut stream, &reply).await?;

            if self.closed {
                break;
            }
        }
        self.current_post = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use hydra_store::{LedgerError, MemoryLedger};
    use proptest::prelude::*;
    use std::io::Write;

    fn make_post(n: u32) -> Post {
        Post::builder(format!("post {}", n))
            .timestamp(1_700_000_000_000 + n as i64)
            .text(format!("body {}", n))
            .build()
            .unwrap()
    }

    fn local() -> Arc<PeerInfo> {
        Arc::new(PeerInfo {
            identity: NodeId::from_bytes([7; 32]),
            nickname: "server".into(),
        })
    }

    fn session_with(posts: Vec<Post>) -> Session<MemoryLedger> {
        Session::new(Arc::new(MemoryLedger::with_posts(posts)), local())
    }

    async fn hello<L: Ledger + ?Sized>(session: &mut Session<L>) {
        let reply = session.handle(HydraMessage::Hello).await;
        assert!(matches!(reply, HydraMessage::HelloOk { .. }));
    }

    fn fetched_id(reply: &HydraMessage) -> PostId {
        match reply {
            HydraMessage::FetchOk(header) => header.identity,
            other => panic!("expected FetchOk, got {:?}", other),
        }
    }

    fn is_invalid(reply: &HydraMessage) -> bool {
        matches!(
            reply,
            HydraMessage::Error {
                status: StatusCode::CommandInvalid,
                ..
            }
        )
    }

    #[tokio::test]
    async fn test_hello_reports_local_identity() {
        let mut session = session_with(vec![]);
        let reply = session.handle(HydraMessage::Hello).await;
        assert_eq!(
            reply,
            HydraMessage::HelloOk {
                identity: NodeId::from_bytes([7; 32]),
                nickname: "server".into(),
            }
        );
        assert_eq!(session.state(), SessionState::IdentityExchanged);

        // A second HELLO is out of order.
        assert!(is_invalid(&session.handle(HydraMessage::Hello).await));
        assert_eq!(session.state(), SessionState::IdentityExchanged);
    }

    #[tokio::test]
    async fn test_commands_invalid_before_hello() {
        let mut session = session_with(vec![make_post(0)]);
        for request in [
            HydraMessage::Sync {
                oldest: None,
                newest: None,
            },
            HydraMessage::FetchNewer,
            HydraMessage::FetchChunk {
                offset: 0,
                octets: 10,
            },
            HydraMessage::PingOk,
        ] {
            assert!(is_invalid(&session.handle(request).await));
            assert_eq!(session.state(), SessionState::Start);
        }
        assert_eq!(session.handle(HydraMessage::Ping).await, HydraMessage::PingOk);
    }

    #[tokio::test]
    async fn test_fetch_requires_range() {
        let mut session = session_with(vec![make_post(0)]);
        hello(&mut session).await;
        assert!(is_invalid(&session.handle(HydraMessage::FetchOlder).await));
        assert!(is_invalid(&session.handle(HydraMessage::FetchReset).await));
        assert_eq!(session.state(), SessionState::IdentityExchanged);
    }

    #[tokio::test]
    async fn test_sync_unknown_identities() {
        let posts: Vec<Post> = (0..4).map(make_post).collect();
        let mut session = session_with(posts);
        hello(&mut session).await;

        let reply = session
            .handle(HydraMessage::Sync {
                oldest: Some(PostId::from_bytes([1; 32])),
                newest: None,
            })
            .await;
        assert_eq!(
            reply,
            HydraMessage::SyncOk {
                before: None,
                after: 4
            }
        );
        assert_eq!(session.oldest(), None);
        assert_eq!(session.newest(), None);
        assert_eq!(session.state(), SessionState::RangeKnown);
    }

    #[tokio::test]
    async fn test_sync_single_post() {
        let post = make_post(0);
        let id = *post.identity();
        let mut session = session_with(vec![post]);
        hello(&mut session).await;

        let reply = session
            .handle(HydraMessage::Sync {
                oldest: Some(id),
                newest: Some(id),
            })
            .await;
        assert_eq!(
            reply,
            HydraMessage::SyncOk {
                before: Some(0),
                after: 0
            }
        );
        assert_eq!(session.handle(HydraMessage::FetchNewer).await, HydraMessage::NoSuchPost);
        assert_eq!(session.handle(HydraMessage::FetchOlder).await, HydraMessage::NoSuchPost);
    }

    #[tokio::test]
    async fn test_sync_middle_then_fetch_both_ways() {
        let posts: Vec<Post> = (0..3).map(make_post).collect();
        let ids: Vec<PostId> = posts.iter().map(|p| *p.identity()).collect();

        let mut session = session_with(posts.clone());
        hello(&mut session).await;
        let sync = HydraMessage::Sync {
            oldest: Some(ids[1]),
            newest: Some(ids[1]),
        };
        assert_eq!(
            session.handle(sync.clone()).await,
            HydraMessage::SyncOk {
                before: Some(1),
                after: 1
            }
        );
        assert_eq!(fetched_id(&session.handle(HydraMessage::FetchOlder).await), ids[0]);
        assert_eq!(session.state(), SessionState::ServingChunk);

        let mut session = session_with(posts);
        hello(&mut session).await;
        session.handle(sync).await;
        assert_eq!(fetched_id(&session.handle(HydraMessage::FetchNewer).await), ids[2]);
        assert_eq!(session.newest(), Some(2));
        assert_eq!(session.oldest(), Some(1));
    }

    #[tokio::test]
    async fn test_fetch_older_exhausts_without_corrupting_cursor() {
        let posts: Vec<Post> = (0..5).map(make_post).collect();
        let ids: Vec<PostId> = posts.iter().map(|p| *p.identity()).collect();
        let mut session = session_with(posts);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: Some(ids[4]),
                newest: Some(ids[4]),
            })
            .await;

        for expected in (0..4).rev() {
            let reply = session.handle(HydraMessage::FetchOlder).await;
            assert_eq!(fetched_id(&reply), ids[expected]);
            assert_eq!(session.oldest(), Some(expected as u64));
        }
        for _ in 0..3 {
            assert_eq!(session.handle(HydraMessage::FetchOlder).await, HydraMessage::NoSuchPost);
            assert_eq!(session.oldest(), Some(0));
            assert_eq!(session.state(), SessionState::RangeKnown);
            assert!(session.current_post().is_none());
        }
    }

    #[tokio::test]
    async fn test_fetch_newer_from_unknown_range_walks_ledger() {
        let posts: Vec<Post> = (0..3).map(make_post).collect();
        let ids: Vec<PostId> = posts.iter().map(|p| *p.identity()).collect();
        let mut session = session_with(posts);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(fetched_id(&session.handle(HydraMessage::FetchNewer).await), *id);
            assert_eq!(session.oldest(), Some(0));
            assert_eq!(session.newest(), Some(i as u64));
        }
        assert_eq!(session.handle(HydraMessage::FetchNewer).await, HydraMessage::NoSuchPost);
        assert_eq!(session.newest(), Some(2));
    }

    #[tokio::test]
    async fn test_fetch_reset() {
        let posts: Vec<Post> = (0..3).map(make_post).collect();
        let last = *posts[2].identity();
        let mut session = session_with(posts);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;

        assert_eq!(fetched_id(&session.handle(HydraMessage::FetchReset).await), last);
        assert_eq!(session.oldest(), Some(2));
        assert_eq!(session.newest(), Some(2));
    }

    #[tokio::test]
    async fn test_fetch_reset_empty_ledger() {
        let mut session = session_with(vec![]);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;
        assert_eq!(session.handle(HydraMessage::FetchReset).await, HydraMessage::NoSuchPost);
        assert_eq!(session.oldest(), None);
        assert_eq!(session.newest(), None);
        assert!(is_invalid(
            &session
                .handle(HydraMessage::FetchChunk {
                    offset: 0,
                    octets: 1
                })
                .await
        ));
    }

    #[tokio::test]
    async fn test_chunks_reassemble_content() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        let post = Post::builder("large")
            .mime_type("application/octet-stream")
            .data(data.clone())
            .build()
            .unwrap();
        let mut session = session_with(vec![post]);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;
        let header = match session.handle(HydraMessage::FetchNewer).await {
            HydraMessage::FetchOk(header) => header,
            other => panic!("expected FetchOk, got {:?}", other),
        };

        let mut received = Vec::new();
        while (received.len() as u64) < header.content_size {
            let reply = session
                .handle(HydraMessage::FetchChunk {
                    offset: received.len() as u64,
                    octets: 4096,
                })
                .await;
            match reply {
                HydraMessage::FetchChunkOk { content } => received.extend_from_slice(&content),
                other => panic!("expected FetchChunkOk, got {:?}", other),
            }
        }
        assert_eq!(received, data);
        let rebuilt = Post::from_parts(header, Bytes::from(received)).unwrap();
        assert_eq!(rebuilt.read_content().unwrap().len(), 50_000);

        let past_end = session
            .handle(HydraMessage::FetchChunk {
                offset: 60_000,
                octets: 10,
            })
            .await;
        assert_eq!(
            past_end,
            HydraMessage::FetchChunkOk {
                content: Bytes::new()
            }
        );
    }

    #[tokio::test]
    async fn test_oversized_chunk_request_is_invalid() {
        let mut session = session_with(vec![make_post(0)]);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;
        session.handle(HydraMessage::FetchNewer).await;
        let reply = session
            .handle(HydraMessage::FetchChunk {
                offset: 0,
                octets: limits::MAX_CHUNK_OCTETS + 1,
            })
            .await;
        assert!(is_invalid(&reply));
        assert_eq!(session.state(), SessionState::ServingChunk);
    }

    #[tokio::test]
    async fn test_file_backed_chunks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file backed content").unwrap();
        file.flush().unwrap();
        let post = Post::builder("file").file(file.path()).build().unwrap();

        let mut session = session_with(vec![post]);
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;
        session.handle(HydraMessage::FetchReset).await;
        let reply = session
            .handle(HydraMessage::FetchChunk {
                offset: 5,
                octets: 6,
            })
            .await;
        assert_eq!(
            reply,
            HydraMessage::FetchChunkOk {
                content: Bytes::from_static(b"backed")
            }
        );
    }

    /// Ledger whose reads fail while `failing` is set.
    struct FlakyLedger {
        inner: MemoryLedger,
        failing: AtomicBool,
    }

    impl FlakyLedger {
        fn check(&self) -> hydra_store::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(LedgerError::InvalidData("disk on fire".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Ledger for FlakyLedger {
        async fn store(&self, post: Post) -> hydra_store::Result<u64> {
            self.inner.store(post).await
        }
        async fn fetch(&self, index: u64) -> hydra_store::Result<Option<Post>> {
            self.check()?;
            self.inner.fetch(index).await
        }
        async fn index(&self, identity: &PostId) -> hydra_store::Result<Option<u64>> {
            self.check()?;
            self.inner.index(identity).await
        }
        async fn size(&self) -> hydra_store::Result<u64> {
            self.check()?;
            self.inner.size().await
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_enters_error_state() {
        let ledger = Arc::new(FlakyLedger {
            inner: MemoryLedger::with_posts((0..2).map(make_post)),
            failing: AtomicBool::new(false),
        });
        let mut session = Session::new(Arc::clone(&ledger), local());
        hello(&mut session).await;
        session
            .handle(HydraMessage::Sync {
                oldest: None,
                newest: None,
            })
            .await;

        ledger.failing.store(true, Ordering::SeqCst);
        let reply = session.handle(HydraMessage::FetchNewer).await;
        assert!(matches!(
            reply,
            HydraMessage::Error {
                status: StatusCode::InternalError,
                ..
            }
        ));
        assert_eq!(session.state(), SessionState::Error);
        assert!(is_invalid(&session.handle(HydraMessage::FetchNewer).await));

        ledger.failing.store(false, Ordering::SeqCst);
        assert!(matches!(
            session.handle(HydraMessage::FetchReset).await,
            HydraMessage::FetchOk(_)
        ));
        assert_eq!(session.state(), SessionState::ServingChunk);
    }

    /// Pull the newest post's content through FETCH_CHUNK requests of the
    /// given sizes, cycling through them.
    async fn fetch_in_chunks(session: &mut Session<MemoryLedger>, sizes: &[u64]) -> Vec<u8> {
        let sync = HydraMessage::Sync {
            oldest: None,
            newest: None,
        };
        assert!(matches!(session.handle(sync).await, HydraMessage::SyncOk { .. }));
        let size = match session.handle(HydraMessage::FetchNewer).await {
            HydraMessage::FetchOk(header) => header.content_size,
            other => panic!("expected FetchOk, got {:?}", other),
        };

        let mut content = Vec::new();
        for &octets in sizes.iter().cycle() {
            if content.len() as u64 >= size {
                break;
            }
            let request = HydraMessage::FetchChunk {
                offset: content.len() as u64,
                octets,
            };
            match session.handle(request).await {
                HydraMessage::FetchChunkOk { content: chunk } => {
                    assert!(!chunk.is_empty());
                    assert!(chunk.len() as u64 <= octets);
                    content.extend_from_slice(&chunk);
                }
                other => panic!("expected FetchChunkOk, got {:?}", other),
            }
        }
        content
    }

    proptest! {
        #[test]
        fn prop_chunks_reassemble_content(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            sizes in proptest::collection::vec(1u64..700, 1..8),
        ) {
            let post = Post::builder("blob")
                .mime_type("application/octet-stream")
                .data(data.clone())
                .build()
                .unwrap();
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let content = rt.block_on(async {
                let mut session = session_with(vec![post]);
                hello(&mut session).await;
                fetch_in_chunks(&mut session, &sizes).await
            });
            prop_assert_eq!(content, data);
        }
    }

    #[tokio::test]
    async fn test_serve_over_stream() {
        use tokio::io::AsyncWriteExt;

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let session = session_with(vec![make_post(0)]);
        let task = tokio::spawn(session.serve(server));

        // Garbage is answered and the connection survives.
        client.write_all(&2u32.to_be_bytes()).await.unwrap();
        client.write_all(&[0xFF, 0xFF]).await.unwrap();
        let reply = codec::read_message(&mut client).await.unwrap().unwrap();
        assert!(is_invalid(&reply));

        codec::write_message(&mut client, &HydraMessage::Hello).await.unwrap();
        let reply = codec::read_message(&mut client).await.unwrap().unwrap();
        assert!(matches!(reply, HydraMessage::HelloOk { .. }));

        codec::write_message(&mut client, &HydraMessage::Goodbye).await.unwrap();
        let reply = codec::read_message(&mut client).await.unwrap().unwrap();
        assert_eq!(reply, HydraMessage::GoodbyeOk);

        task.await.unwrap().unwrap();
        assert_eq!(codec::read_message(&mut client).await.unwrap(), None);
    }
}
