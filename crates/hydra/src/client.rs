//! Hydra client actor.
//!
//! The client talks to one server endpoint. Callers drive it through a
//! control handle ([`ClientHandle`]) and read what it receives from an event
//! channel ([`ClientEvent`]). Everything else happens inside one actor task:
//!
//! - connecting, with backoff, until the connect deadline; each attempt
//!   runs in its own task so control calls are answered meanwhile;
//! - HELLO, then SYNC with the range of posts already held;
//! - fetching every newer (and optionally older) post, header first and then
//!   content in chunks, verifying each post before delivering it;
//! - a PING heartbeat while idle;
//! - queueing events the owner has not read yet, and pausing fetches once
//!   a full channel's worth is queued;
//! - after the first successful connection, reconnecting forever and
//!   resuming an interrupted sync.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::io::WriteHalf;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use hydra_core::{Post, PostHeader, PostId, CONTENT_MAX_SIZE};
use hydra_proto::{codec, trace_message, BoxStream, HydraMessage, NodeId, ProtoError, Transport};

use crate::config::ClientConfig;
use crate::error::{HydraError, Result};
use crate::method::PostSink;

/// What the client reports on its event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A verified post.
    Post(Post),
    /// A sync finished.
    Success {
        /// Posts received by this sync.
        received: u64,
    },
    /// A sync was abandoned.
    Failed {
        /// Why.
        reason: String,
    },
}

/// Snapshot of the client's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    /// A session with the server is established.
    pub connected: bool,
    /// Endpoint the client connects to.
    pub endpoint: Option<String>,
    /// Server identity from the last HELLO.
    pub server: Option<NodeId>,
    /// Server nickname from the last HELLO.
    pub nickname: Option<String>,
    /// Oldest post held.
    pub oldest: Option<PostId>,
    /// Newest post held.
    pub newest: Option<PostId>,
    /// A sync is requested or running.
    pub syncing: bool,
    /// Last connection or sync failure.
    pub reason: Option<String>,
}

enum Command {
    Connect {
        endpoint: String,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<()>>,
    },
    Sync {
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<ClientStatus>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable control channel of a client.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
}

impl ClientHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| HydraError::Stopped)?;
        rx.await.map_err(|_| HydraError::Stopped)
    }

    /// Connect to a server endpoint.
    ///
    /// Retries with backoff until `timeout` elapses (`None` waits forever),
    /// then fails with [`HydraError::Interrupted`].
    pub async fn connect(&self, endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<()> {
        let endpoint = endpoint.into();
        self.request(|reply| Command::Connect {
            endpoint,
            timeout,
            reply,
        })
        .await?
    }

    /// Start a sync. Progress arrives as events.
    ///
    /// Fails with [`HydraError::NotConnected`] if the client has never
    /// connected. While reconnecting, the sync starts once the connection is
    /// back.
    pub async fn sync(&self) -> Result<()> {
        self.request(|reply| Command::Sync { reply }).await?
    }

    /// Current state.
    pub async fn status(&self) -> Result<ClientStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Say goodbye to the server and stop the actor.
    pub async fn close(&self) -> Result<()> {
        self.request(|reply| Command::Close { reply }).await
    }
}

/// A Hydra client: control handle plus event channel.
///
/// Must be created inside a tokio runtime. Dropping the client stops its
/// actor.
pub struct HydraClient {
    handle: ClientHandle,
    events: mpsc::Receiver<ClientEvent>,
    task: JoinHandle<()>,
}

impl HydraClient {
    /// Create a client.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::spawn(config, transport, None)
    }

    /// Create a client that also hands every received post to a sink.
    pub fn with_sink(config: ClientConfig, transport: Arc<dyn Transport>, sink: PostSink) -> Self {
        Self::spawn(config, transport, Some(sink))
    }

    fn spawn(config: ClientConfig, transport: Arc<dyn Transport>, sink: Option<PostSink>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let span = tracing::info_span!("hydra_client", name = %config.name);

        let actor = ClientActor {
            oldest: config.oldest,
            newest: config.newest,
            config,
            transport,
            commands: command_rx,
            events: event_tx,
            sink,
            outbox: VecDeque::new(),
            endpoint: None,
            dialing: None,
            link: None,
            phase: Phase::Idle,
            connected: false,
            ever_connected: false,
            attempt: 0,
            server: None,
            nickname: None,
            reason: None,
            sync: None,
            pending_connect: None,
            connect_deadline: None,
            retry_at: None,
            request_deadline: None,
            heartbeat_at: None,
        };
        let task = tokio::spawn(actor.run().instrument(span));

        Self {
            handle: ClientHandle {
                commands: command_tx,
            },
            events: event_rx,
            task,
        }
    }

    /// The control channel.
    pub fn actor(&self) -> &ClientHandle {
        &self.handle
    }

    /// The event channel.
    pub fn events(&mut self) -> &mut mpsc::Receiver<ClientEvent> {
        &mut self.events
    }

    /// See [`ClientHandle::connect`].
    pub async fn connect(&self, endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<()> {
        self.handle.connect(endpoint, timeout).await
    }

    /// See [`ClientHandle::sync`].
    pub async fn sync(&self) -> Result<()> {
        self.handle.sync().await
    }

    /// See [`ClientHandle::status`].
    pub async fn status(&self) -> Result<ClientStatus> {
        self.handle.status().await
    }

    /// Check if a session with the server is established.
    pub async fn connected(&self) -> bool {
        self.status().await.map(|s| s.connected).unwrap_or(false)
    }

    /// Server nickname, once connected.
    pub async fn nickname(&self) -> Option<String> {
        self.status().await.ok().and_then(|s| s.nickname)
    }

    /// Last connection or sync failure.
    pub async fn reason(&self) -> Option<String> {
        self.status().await.ok().and_then(|s| s.reason)
    }

    /// Say goodbye and stop.
    pub async fn close(self) -> Result<()> {
        self.handle.close().await
    }
}

impl Drop for HydraClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// An open connection: our write half plus frames from a reader task.
///
/// Framed reads are not cancel-safe, so they run in their own task and the
/// actor selects on the channel instead.
struct Link {
    writer: WriteHalf<BoxStream>,
    inbound: mpsc::Receiver<hydra_proto::Result<HydraMessage>>,
    reader: JoinHandle<()>,
}

impl Link {
    fn open(stream: BoxStream) -> Self {
        let (mut reader, writer) = tokio::io::split(stream);
        let (tx, inbound) = mpsc::channel(16);
        let reader = tokio::spawn(async move {
            loop {
                match codec::read_message(&mut reader).await {
                    Ok(Some(message)) => {
                        if let Err(reason) = message.validate_limits() {
                            let reason = format!("{}: {}", message.name(), reason);
                            let _ = tx.send(Err(ProtoError::InvalidMessage(reason))).await;
                            break;
                        }
                        if tx.send(Ok(message)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });
        Self {
            writer,
            inbound,
            reader,
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

type DialResult = std::result::Result<BoxStream, String>;

/// One connection attempt, running in its own task.
struct Dial {
    task: JoinHandle<DialResult>,
}

impl Dial {
    fn spawn(transport: Arc<dyn Transport>, endpoint: String, timeout: Duration) -> Self {
        let task = tokio::spawn(
            async move {
                match tokio::time::timeout(timeout, transport.connect(&endpoint)).await {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("connect timed out".to_string()),
                }
            }
            .in_current_span(),
        );
        Self { task }
    }
}

impl Drop for Dial {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Newer,
    Older,
}

/// Which reply the actor is waiting for.
enum Phase {
    Idle,
    Greeting,
    AwaitingSync,
    FetchingHeader(Direction),
    FetchingChunk {
        direction: Direction,
        header: PostHeader,
        content: BytesMut,
    },
    Pinging,
    /// Fetching paused until the owner reads queued events.
    Stalled,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Greeting => "greeting",
            Phase::AwaitingSync => "awaiting sync",
            Phase::FetchingHeader(_) => "fetching header",
            Phase::FetchingChunk { .. } => "fetching chunk",
            Phase::Pinging => "pinging",
            Phase::Stalled => "stalled",
        }
    }
}

#[derive(Debug, Default)]
struct SyncJob {
    newer: u64,
    older: u64,
    received: u64,
}

struct ClientActor {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<ClientEvent>,
    outbox: VecDeque<ClientEvent>,
    sink: Option<PostSink>,

    endpoint: Option<String>,
    dialing: Option<Dial>,
    link: Option<Link>,
    phase: Phase,
    connected: bool,
    ever_connected: bool,
    attempt: u32,
    server: Option<NodeId>,
    nickname: Option<String>,
    reason: Option<String>,

    oldest: Option<PostId>,
    newest: Option<PostId>,
    sync: Option<SyncJob>,

    pending_connect: Option<oneshot::Sender<Result<()>>>,
    connect_deadline: Option<Instant>,
    retry_at: Option<Instant>,
    request_deadline: Option<Instant>,
    heartbeat_at: Option<Instant>,
}

async fn next_inbound(link: &mut Option<Link>) -> Option<hydra_proto::Result<HydraMessage>> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_dial(dialing: &mut Option<Dial>) -> DialResult {
    match dialing {
        Some(dial) => match (&mut dial.task).await {
            Ok(result) => result,
            Err(e) => Err(format!("connect task failed: {}", e)),
        },
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.map_or(false, |d| d <= now)
}

impl ClientActor {
    async fn run(mut self) {
        loop {
            let wake = self.next_wake();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        self.close().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => {
                        self.close().await;
                        break;
                    }
                },

                dialed = next_dial(&mut self.dialing) => {
                    self.dialing = None;
                    self.on_dialed(dialed).await;
                }

                inbound = next_inbound(&mut self.link) => match inbound {
                    Some(Ok(message)) => self.on_message(message).await,
                    Some(Err(e)) => self.lose(e.to_string()),
                    None => self.lose("connection closed by server".into()),
                },

                permit = self.events.clone().reserve_owned(), if !self.outbox.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            if let Some(event) = self.outbox.pop_front() {
                                let _ = permit.send(event);
                            }
                        }
                        Err(_) => {
                            tracing::debug!(dropped = self.outbox.len(), "event receiver dropped");
                            self.outbox.clear();
                        }
                    }
                    self.resume().await;
                }

                _ = sleep_until(wake) => self.on_timer().await,
            }
        }
        tracing::debug!("client stopped");
    }

    fn next_wake(&self) -> Option<Instant> {
        [
            self.connect_deadline,
            self.retry_at,
            self.request_deadline,
            self.heartbeat_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                endpoint,
                timeout,
                reply,
            } => {
                if self.connected && self.endpoint.as_deref() == Some(endpoint.as_str()) {
                    let _ = reply.send(Ok(()));
                    return;
                }
                if let Some(previous) = self.pending_connect.take() {
                    let _ = previous.send(Err(HydraError::Interrupted));
                }
                self.disconnect();
                self.endpoint = Some(endpoint);
                self.attempt = 0;
                self.pending_connect = Some(reply);
                self.connect_deadline = timeout.map(|t| Instant::now() + t);
                self.dial();
            }
            Command::Sync { reply } => {
                if !self.ever_connected {
                    let _ = reply.send(Err(HydraError::NotConnected));
                    return;
                }
                if self.sync.is_none() {
                    self.sync = Some(SyncJob::default());
                }
                let _ = reply.send(Ok(()));
                self.settle().await;
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
        }
    }

    fn status(&self) -> ClientStatus {
        ClientStatus {
            connected: self.connected,
            endpoint: self.endpoint.clone(),
            server: self.server,
            nickname: self.nickname.clone(),
            oldest: self.oldest,
            newest: self.newest,
            syncing: self.sync.is_some(),
            reason: self.reason.clone(),
        }
    }

    async fn on_timer(&mut self) {
        let now = Instant::now();

        if expired(self.connect_deadline, now) {
            self.connect_deadline = None;
            if let Some(reply) = self.pending_connect.take() {
                let _ = reply.send(Err(HydraError::Interrupted));
            }
            if !self.ever_connected {
                tracing::info!("gave up connecting");
                self.disconnect();
                self.endpoint = None;
                return;
            }
        }

        if expired(self.request_deadline, now) {
            self.lose("request timed out".into());
            return;
        }

        if expired(self.retry_at, now) {
            self.retry_at = None;
            self.dial();
        }

        if expired(self.heartbeat_at, now) {
            self.heartbeat_at = None;
            if matches!(self.phase, Phase::Idle) && self.connected {
                self.send(HydraMessage::Ping, Phase::Pinging).await;
            }
        }
    }

    /// Start a connection attempt unless one is already running.
    fn dial(&mut self) {
        if self.dialing.is_some() {
            return;
        }
        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        tracing::debug!(%endpoint, attempt = self.attempt, "connecting");
        let transport = Arc::clone(&self.transport);
        self.dialing = Some(Dial::spawn(transport, endpoint, self.config.request_timeout));
    }

    async fn on_dialed(&mut self, dialed: DialResult) {
        match dialed {
            Ok(stream) => {
                self.link = Some(Link::open(stream));
                self.send(HydraMessage::Hello, Phase::Greeting).await;
            }
            Err(reason) => self.schedule_retry(reason),
        }
    }

    fn schedule_retry(&mut self, reason: String) {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.config.retry.delay_for_attempt(self.attempt);
        tracing::debug!(%reason, ?delay, attempt = self.attempt, "will retry");
        self.reason = Some(reason);
        self.retry_at = Some(Instant::now() + delay);
    }

    /// Drop the connection without scheduling a retry.
    fn disconnect(&mut self) {
        self.dialing = None;
        self.link = None;
        self.connected = false;
        self.phase = Phase::Idle;
        self.retry_at = None;
        self.request_deadline = None;
        self.heartbeat_at = None;
    }

    /// Drop the connection and retry if there is somewhere to retry to.
    ///
    /// A running sync stays requested and restarts after the next HELLO.
    fn lose(&mut self, reason: String) {
        if self.connected {
            tracing::warn!(%reason, "connection lost");
        }
        self.disconnect();
        if self.endpoint.is_some() {
            self.schedule_retry(reason);
        } else {
            self.reason = Some(reason);
        }
    }

    async fn send(&mut self, message: HydraMessage, next: Phase) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        trace_message(self.config.trace_messages, "send", &message);
        match codec::write_message(&mut link.writer, &message).await {
            Ok(()) => {
                self.phase = next;
                self.request_deadline = Some(Instant::now() + self.config.request_timeout);
                self.heartbeat_at = None;
            }
            Err(e) => self.lose(format!("send failed: {}", e)),
        }
    }

    /// Deliver an event, queueing it while the channel is full.
    fn emit(&mut self, event: ClientEvent) {
        if !self.outbox.is_empty() {
            self.outbox.push_back(event);
            return;
        }
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => self.outbox.push_back(event),
            Err(TrySendError::Closed(_)) => tracing::debug!("event receiver dropped"),
        }
    }

    fn backlogged(&self) -> bool {
        self.outbox.len() >= self.config.event_capacity.max(1)
    }

    /// Pick up a stalled sync once the owner has caught up.
    async fn resume(&mut self) {
        if matches!(self.phase, Phase::Stalled) && !self.backlogged() {
            self.phase = Phase::Idle;
            self.next_fetch().await;
        }
    }

    /// With nothing outstanding, start a requested sync or arm the heartbeat.
    async fn settle(&mut self) {
        if !matches!(self.phase, Phase::Idle) || !self.connected {
            return;
        }
        if self.sync.is_some() {
            let message = HydraMessage::Sync {
                oldest: self.oldest,
                newest: self.newest,
            };
            self.send(message, Phase::AwaitingSync).await;
        } else if !self.config.heartbeat.is_zero() {
            self.heartbeat_at = Some(Instant::now() + self.config.heartbeat);
        }
    }

    async fn on_message(&mut self, message: HydraMessage) {
        use HydraMessage as M;

        trace_message(self.config.trace_messages, "recv", &message);
        self.request_deadline = None;

        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match (phase, message) {
            (Phase::Greeting, M::HelloOk { identity, nickname }) => {
                tracing::info!(server = %identity, %nickname, "connected");
                self.connected = true;
                self.ever_connected = true;
                self.attempt = 0;
                self.reason = None;
                self.server = Some(identity);
                self.nickname = Some(nickname);
                self.connect_deadline = None;
                if let Some(reply) = self.pending_connect.take() {
                    let _ = reply.send(Ok(()));
                }
                self.settle().await;
            }

            (Phase::AwaitingSync, M::SyncOk { before, after }) => {
                tracing::debug!(?before, after, "sync status");
                if before.is_none() {
                    // The server does not know our range; it walks from the start.
                    self.oldest = None;
                    self.newest = None;
                }
                let fetch_older = self.config.fetch_older;
                if let Some(job) = self.sync.as_mut() {
                    job.newer = after;
                    job.older = if fetch_older { before.unwrap_or(0) } else { 0 };
                }
                self.next_fetch().await;
            }

            (Phase::FetchingHeader(direction), M::FetchOk(header)) => {
                if header.content_size > CONTENT_MAX_SIZE {
                    let reason = format!(
                        "post {} announces {} bytes of content",
                        header.identity, header.content_size
                    );
                    self.fail_sync(reason).await;
                    return;
                }
                let content = BytesMut::with_capacity(header.content_size as usize);
                self.continue_transfer(direction, header, content).await;
            }

            (Phase::FetchingHeader(direction), M::NoSuchPost) => {
                if let Some(job) = self.sync.as_mut() {
                    match direction {
                        Direction::Newer => job.newer = 0,
                        Direction::Older => job.older = 0,
                    }
                }
                self.next_fetch().await;
            }

            (
                Phase::FetchingChunk {
                    direction,
                    header,
                    mut content,
                },
                M::FetchChunkOk { content: chunk },
            ) => {
                if chunk.is_empty() {
                    self.fail_sync(format!("empty chunk for post {}", header.identity))
                        .await;
                    return;
                }
                content.extend_from_slice(&chunk);
                self.continue_transfer(direction, header, content).await;
            }

            (Phase::Pinging, M::PingOk) => self.settle().await,

            (
                Phase::AwaitingSync | Phase::FetchingHeader(_) | Phase::FetchingChunk { .. },
                M::Error { status, reason },
            ) => {
                self.fail_sync(HydraError::Peer { status, reason }.to_string())
                    .await;
            }

            (phase, message) => {
                self.lose(format!("unexpected {} while {}", message.name(), phase.name()));
            }
        }
    }

    async fn continue_transfer(&mut self, direction: Direction, header: PostHeader, content: BytesMut) {
        let offset = content.len() as u64;
        if offset >= header.content_size {
            self.complete_post(direction, header, content.freeze()).await;
            return;
        }
        let octets = self.config.chunk_size.min(header.content_size - offset);
        let next = Phase::FetchingChunk {
            direction,
            header,
            content,
        };
        self.send(HydraMessage::FetchChunk { offset, octets }, next).await;
    }

    async fn complete_post(&mut self, direction: Direction, header: PostHeader, content: Bytes) {
        let post = match Post::from_parts(header, content) {
            Ok(post) => post,
            Err(e) => {
                self.fail_sync(format!("invalid post: {}", e)).await;
                return;
            }
        };

        let id = *post.identity();
        match direction {
            Direction::Newer => {
                self.newest = Some(id);
                if self.oldest.is_none() {
                    self.oldest = Some(id);
                }
            }
            Direction::Older => self.oldest = Some(id),
        }
        if let Some(job) = self.sync.as_mut() {
            match direction {
                Direction::Newer => job.newer = job.newer.saturating_sub(1),
                Direction::Older => job.older = job.older.saturating_sub(1),
            }
            job.received += 1;
        }
        tracing::debug!(post = %id, ?direction, "post received");

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.send(post.clone()).await {
                tracing::warn!(post = %id, error = %e, "sink rejected post");
            }
        }
        self.emit(ClientEvent::Post(post));
        self.next_fetch().await;
    }

    async fn next_fetch(&mut self) {
        let Some(job) = &self.sync else {
            self.settle().await;
            return;
        };

        if (job.newer > 0 || job.older > 0) && self.backlogged() {
            tracing::debug!(queued = self.outbox.len(), "waiting for events to be read");
            self.phase = Phase::Stalled;
        } else if job.newer > 0 {
            let next = Phase::FetchingHeader(Direction::Newer);
            self.send(HydraMessage::FetchNewer, next).await;
        } else if job.older > 0 {
            let next = Phase::FetchingHeader(Direction::Older);
            self.send(HydraMessage::FetchOlder, next).await;
        } else {
            let received = job.received;
            self.sync = None;
            tracing::info!(received, "sync complete");
            self.emit(ClientEvent::Success { received });
            self.settle().await;
        }
    }

    async fn fail_sync(&mut self, reason: String) {
        self.phase = Phase::Idle;
        if self.sync.take().is_some() {
            tracing::warn!(%reason, "sync failed");
            self.reason = Some(reason.clone());
            self.emit(ClientEvent::Failed { reason });
        }
        self.settle().await;
    }

    async fn close(&mut self) {
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(HydraError::Interrupted));
        }
        if let (true, Some(mut link)) = (self.connected, self.link.take()) {
            trace_message(self.config.trace_messages, "send", &HydraMessage::Goodbye);
            if codec::write_message(&mut link.writer, &HydraMessage::Goodbye)
                .await
                .is_ok()
            {
                let farewell = async {
                    while let Some(Ok(message)) = link.inbound.recv().await {
                        if message == HydraMessage::GoodbyeOk {
                            break;
                        }
                    }
                };
                let _ = tokio::time::timeout(self.config.request_timeout, farewell).await;
            }
        }
        self.disconnect();
        self.endpoint = None;
        self.connect_deadline = None;
        while let Some(event) = self.outbox.pop_front() {
            if let Err(e) = self.events.try_send(event) {
                self.outbox.push_front(e.into_inner());
                break;
            }
        }
        if !self.outbox.is_empty() {
            tracing::debug!(dropped = self.outbox.len(), "unread events discarded");
        }
        tracing::info!("client closed");
    }
}
