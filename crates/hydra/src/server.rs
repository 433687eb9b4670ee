//! Hydra server actor.
//!
//! The server owns the ledger writer side. One actor task handles local
//! method calls and the ingestion channel; each bound endpoint gets an
//! accept loop task, and each accepted connection a [`Session`] task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

use hydra_core::{Post, PostId};
use hydra_proto::{Listener, NodeId, PeerInfo, ProtoError, Session, Transport};
use hydra_store::Ledger;

use crate::config::ServerConfig;
use crate::error::{HydraError, Result};
use crate::method::{LocalMethod, MethodReply, PostRequest, PostSink};
use crate::settings::{Settings, DEFAULT_NICKNAME, IDENTITY_PATH, NICKNAME_PATH};

/// Delay before accepting again after a failed accept.
const ACCEPT_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

enum Command {
    Bind {
        endpoint: String,
        reply: oneshot::Sender<Result<String>>,
    },
    Call {
        method: LocalMethod,
        reply: oneshot::Sender<Result<MethodReply>>,
    },
    Size {
        reply: oneshot::Sender<Result<u64>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A running server.
///
/// Dropping the server without calling [`shutdown`](Self::shutdown) aborts
/// the actor.
pub struct Server {
    handle: ServerHandle,
    task: JoinHandle<()>,
}

impl Server {
    /// Start a server over a ledger.
    ///
    /// Makes sure the settings hold a node identity, generating and saving
    /// one (with the default nickname) when missing.
    pub async fn start(
        config: ServerConfig,
        settings: &mut Settings,
        ledger: Arc<dyn Ledger>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let mut loaded = settings.clone();
        let (loaded, local) = tokio::task::spawn_blocking(move || {
            let local = ensure_identity(&mut loaded)?;
            Ok::<_, HydraError>((loaded, local))
        })
        .await
        .map_err(|e| ProtoError::Task(format!("identity bootstrap failed: {}", e)))??;
        *settings = loaded;
        let local = Arc::new(local);
        let span = tracing::info_span!("hydra_server", name = %config.name);
        span.in_scope(|| {
            tracing::info!(identity = %local.identity, nickname = %local.nickname, "server starting")
        });

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (sink_tx, sink_rx) = mpsc::channel(config.sink_capacity.max(1));

        let sink = PostSink::new(sink_tx);
        let handle = ServerHandle {
            commands: command_tx,
            sink: sink.clone(),
            local: Arc::clone(&local),
        };
        let actor = ServerActor {
            config,
            ledger,
            transport,
            local,
            commands: command_rx,
            sink,
            ingest: sink_rx,
            listeners: JoinSet::new(),
        };
        let task = tokio::spawn(actor.run().instrument(span));

        Ok(Self { handle, task })
    }

    /// Get a handle for talking to the server.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Stop the actor, every accept loop and every session.
    pub async fn shutdown(self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.handle.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read the node identity from settings, creating it on first start.
fn ensure_identity(settings: &mut Settings) -> Result<PeerInfo> {
    if settings.get(IDENTITY_PATH).is_none() {
        settings.put(IDENTITY_PATH, NodeId::random().to_hex());
        settings.put(NICKNAME_PATH, DEFAULT_NICKNAME);
        settings.save()?;
        tracing::info!("generated node identity");
    }

    let hex = settings.resolve(IDENTITY_PATH, "");
    let identity = NodeId::from_hex(&hex).map_err(|e| HydraError::Settings {
        path: IDENTITY_PATH.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PeerInfo {
        identity,
        nickname: settings.resolve(NICKNAME_PATH, DEFAULT_NICKNAME),
    })
}

/// Cloneable handle to a running server.
#[derive(Clone)]
pub struct ServerHandle {
    commands: mpsc::Sender<Command>,
    sink: PostSink,
    local: Arc<PeerInfo>,
}

impl ServerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| HydraError::Stopped)?;
        rx.await.map_err(|_| HydraError::Stopped)?
    }

    /// Start accepting connections on an endpoint.
    ///
    /// Returns the endpoint actually bound, e.g. with the OS-assigned port
    /// for `tcp://127.0.0.1:0`.
    pub async fn bind(&self, endpoint: impl Into<String>) -> Result<String> {
        let endpoint = endpoint.into();
        self.request(|reply| Command::Bind { endpoint, reply }).await
    }

    /// Call a local method.
    pub async fn call(&self, method: LocalMethod) -> Result<MethodReply> {
        self.request(|reply| Command::Call { method, reply }).await
    }

    /// Create a post and append it. Returns its identity.
    pub async fn post(&self, request: PostRequest) -> Result<PostId> {
        match self.call(LocalMethod::Post(request)).await? {
            MethodReply::Posted(id) => Ok(id),
            MethodReply::Sink(_) => Err(HydraError::InvalidArgument(
                "POST answered with a sink".into(),
            )),
        }
    }

    /// Handle to the ingestion channel.
    pub fn sink(&self) -> PostSink {
        self.sink.clone()
    }

    /// Number of posts in the ledger.
    pub async fn size(&self) -> Result<u64> {
        self.request(|reply| Command::Size { reply }).await
    }

    /// The server's node identity.
    pub fn identity(&self) -> NodeId {
        self.local.identity
    }

    /// The server's nickname.
    pub fn nickname(&self) -> &str {
        &self.local.nickname
    }
}

struct ServerActor {
    config: ServerConfig,
    ledger: Arc<dyn Ledger>,
    transport: Arc<dyn Transport>,
    local: Arc<PeerInfo>,
    commands: mpsc::Receiver<Command>,
    sink: PostSink,
    ingest: mpsc::Receiver<Post>,
    /// Accept loops; each owns its sessions.
    listeners: JoinSet<()>,
}

impl ServerActor {
    async fn run(mut self) {
        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => break,
                },

                Some(post) = self.ingest.recv() => self.store_ingested(post).await,

                Some(result) = self.listeners.join_next(), if !self.listeners.is_empty() => {
                    if let Err(e) = result {
                        if !e.is_cancelled() {
                            tracing::error!(error = %e, "accept loop failed");
                        }
                    }
                }
            }
        }

        self.listeners.shutdown().await;
        tracing::info!("server stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Bind { endpoint, reply } => {
                let _ = reply.send(self.bind(&endpoint).await);
            }
            Command::Call { method, reply } => {
                let _ = reply.send(self.call(method).await);
            }
            Command::Size { reply } => {
                let _ = reply.send(self.ledger.size().await.map_err(Into::into));
            }
            Command::Shutdown { .. } => {}
        }
    }

    async fn bind(&mut self, endpoint: &str) -> Result<String> {
        let listener = self.transport.bind(endpoint).await?;
        let bound = listener.local_endpoint();
        tracing::info!(endpoint = %bound, "listening");

        let span = tracing::info_span!("listener", endpoint = %bound);
        self.listeners.spawn(
            accept_loop(
                listener,
                Arc::clone(&self.ledger),
                Arc::clone(&self.local),
                self.config.trace_messages,
            )
            .instrument(span),
        );
        Ok(bound)
    }

    async fn call(&mut self, method: LocalMethod) -> Result<MethodReply> {
        match method {
            LocalMethod::Sink => Ok(MethodReply::Sink(self.sink.clone())),
            LocalMethod::Post(request) => {
                let post = tokio::task::spawn_blocking(move || request.build())
                    .await
                    .map_err(|e| HydraError::Proto(ProtoError::Task(e.to_string())))??;
                let id = *post.identity();
                let index = self.ledger.store(post).await?;
                tracing::debug!(post = %id, index, "post stored");
                Ok(MethodReply::Posted(id))
            }
        }
    }

    async fn store_ingested(&mut self, post: Post) {
        let id = *post.identity();
        match self.ledger.store(post).await {
            Ok(index) => tracing::debug!(post = %id, index, "post ingested"),
            Err(e) => tracing::warn!(post = %id, error = %e, "failed to store ingested post"),
        }
    }
}

async fn accept_loop(
    mut listener: Box<dyn Listener>,
    ledger: Arc<dyn Ledger>,
    local: Arc<PeerInfo>,
    trace_messages: bool,
) {
    // Dropped with the loop, which aborts every session.
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "peer connected");
                    let session = Session::new(Arc::clone(&ledger), Arc::clone(&local))
                        .with_trace_messages(trace_messages);
                    let span = tracing::info_span!("session", %peer);
                    sessions.spawn(
                        async move {
                            match session.serve(stream).await {
                                Ok(()) => tracing::info!("peer disconnected"),
                                Err(e) => tracing::warn!(error = %e, "session ended"),
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(ProtoError::ConnectionClosed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },

            Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
        }
    }
}
