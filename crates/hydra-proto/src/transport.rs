//! Transport abstraction for the Hydra protocol.
//!
//! A transport turns an endpoint string into byte streams. Framing happens
//! above it, in [`crate::codec`]. Two schemes are provided: `tcp://host:port`
//! and `inproc://name`.

use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ProtoError, Result};

/// A bidirectional byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Boxed stream handed out by transports.
pub type BoxStream = Box<dyn AsyncStream>;

/// A parsed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `inproc://name`
    Inproc(String),
}

impl Endpoint {
    /// Parse an endpoint string.
    pub fn parse(endpoint: &str) -> Result<Self> {
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            if !addr.is_empty() {
                return Ok(Endpoint::Tcp(addr.to_string()));
            }
        } else if let Some(name) = endpoint.strip_prefix("inproc://") {
            if !name.is_empty() {
                return Ok(Endpoint::Inproc(name.to_string()));
            }
        }
        Err(ProtoError::InvalidEndpoint(endpoint.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            Endpoint::Inproc(name) => write!(f, "inproc://{}", name),
        }
    }
}

/// Transport trait for binding and dialing endpoints.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start listening on an endpoint.
    async fn bind(&self, endpoint: &str) -> Result<Box<dyn Listener>>;

    /// Open a stream to a listening endpoint.
    async fn connect(&self, endpoint: &str) -> Result<BoxStream>;
}

/// A bound endpoint accepting connections.
///
/// Dropping the listener unbinds the endpoint.
#[async_trait]
pub trait Listener: Send {
    /// The endpoint actually bound, e.g. with the OS-assigned TCP port.
    fn local_endpoint(&self) -> String;

    /// Wait for the next connection.
    ///
    /// Returns the stream and a description of the peer. Cancel-safe.
    async fn accept(&mut self) -> Result<(BoxStream, String)>;
}

/// TCP transport.
pub mod tcp {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    /// Transport for `tcp://host:port` endpoints.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TcpTransport;

    impl TcpTransport {
        /// Create a TCP transport.
        pub fn new() -> Self {
            Self
        }
    }

    fn tcp_addr(endpoint: &str) -> Result<String> {
        match Endpoint::parse(endpoint)? {
            Endpoint::Tcp(addr) => Ok(addr),
            Endpoint::Inproc(_) => Err(ProtoError::InvalidEndpoint(endpoint.to_string())),
        }
    }

    struct TcpAcceptor {
        listener: TcpListener,
        local: String,
    }

    #[async_trait]
    impl Transport for TcpTransport {
        async fn bind(&self, endpoint: &str) -> Result<Box<dyn Listener>> {
            let addr = tcp_addr(endpoint)?;
            let listener = TcpListener::bind(&addr).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::AddrInUse {
                    ProtoError::AddressInUse(endpoint.to_string())
                } else {
                    ProtoError::Io(e)
                }
            })?;
            let local = Endpoint::Tcp(listener.local_addr()?.to_string()).to_string();
            tracing::debug!(endpoint = %local, "tcp listener bound");
            Ok(Box::new(TcpAcceptor { listener, local }))
        }

        async fn connect(&self, endpoint: &str) -> Result<BoxStream> {
            let addr = tcp_addr(endpoint)?;
            let stream = TcpStream::connect(&addr).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::ConnectionRefused {
                    ProtoError::ConnectionRefused(endpoint.to_string())
                } else {
                    ProtoError::Io(e)
                }
            })?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
    }

    #[async_trait]
    impl Listener for TcpAcceptor {
        fn local_endpoint(&self) -> String {
            self.local.clone()
        }

        async fn accept(&mut self) -> Result<(BoxStream, String)> {
            let (stream, peer) = self.listener.accept().await?;
            stream.set_nodelay(true)?;
            Ok((Box::new(stream), peer.to_string()))
        }
    }
}

/// A simple in-process transport.
///
/// Uses in-memory duplex pipes to connect peers that share a network.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio::sync::{mpsc, RwLock};

    /// Buffer size of each in-process pipe direction.
    const PIPE_CAPACITY: usize = 256 * 1024;

    /// Pending connections per bound name.
    const BACKLOG: usize = 64;

    /// Shared state for the in-process network.
    pub struct MemoryNetwork {
        /// Accept queues for each bound name.
        listeners: RwLock<HashMap<String, mpsc::Sender<(DuplexStream, String)>>>,
        /// Counter used to name dialing peers.
        next_peer: AtomicU64,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport connected to this network.
        pub fn transport(self: &Arc<Self>) -> MemoryTransport {
            MemoryTransport {
                network: Arc::clone(self),
            }
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                listeners: RwLock::new(HashMap::new()),
                next_peer: AtomicU64::new(1),
            }
        }
    }

    /// In-process transport implementation for `inproc://name` endpoints.
    #[derive(Clone)]
    pub struct MemoryTransport {
        network: Arc<MemoryNetwork>,
    }

    struct MemoryListener {
        name: String,
        incoming: mpsc::Receiver<(DuplexStream, String)>,
    }

    fn inproc_name(endpoint: &str) -> Result<String> {
        match Endpoint::parse(endpoint)? {
            Endpoint::Inproc(name) => Ok(name),
            Endpoint::Tcp(_) => Err(ProtoError::InvalidEndpoint(endpoint.to_string())),
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn bind(&self, endpoint: &str) -> Result<Box<dyn Listener>> {
            let name = inproc_name(endpoint)?;
            let mut listeners = self.network.listeners.write().await;
            // A closed sender means the previous listener was dropped.
            if let Some(existing) = listeners.get(&name) {
                if !existing.is_closed() {
                    return Err(ProtoError::AddressInUse(endpoint.to_string()));
                }
            }
            let (tx, rx) = mpsc::channel(BACKLOG);
            listeners.insert(name.clone(), tx);
            tracing::debug!(endpoint, "inproc listener bound");
            Ok(Box::new(MemoryListener { name, incoming: rx }))
        }

        async fn connect(&self, endpoint: &str) -> Result<BoxStream> {
            let name = inproc_name(endpoint)?;
            let sender = {
                let listeners = self.network.listeners.read().await;
                listeners.get(&name).cloned()
            };
            let Some(sender) = sender else {
                return Err(ProtoError::ConnectionRefused(endpoint.to_string()));
            };

            let peer = self.network.next_peer.fetch_add(1, Ordering::Relaxed);
            let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
            sender
                .send((remote, format!("inproc-peer-{}", peer)))
                .await
                .map_err(|_| ProtoError::ConnectionRefused(endpoint.to_string()))?;
            Ok(Box::new(local))
        }
    }

    #[async_trait]
    impl Listener for MemoryListener {
        fn local_endpoint(&self) -> String {
            Endpoint::Inproc(self.name.clone()).to_string()
        }

        async fn accept(&mut self) -> Result<(BoxStream, String)> {
            match self.incoming.recv().await {
                Some((stream, peer)) => Ok((Box::new(stream), peer)),
                None => Err(ProtoError::ConnectionClosed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::tcp::TcpTransport;
    use super::*;
    use crate::codec::{read_message, write_message};
    use crate::messages::HydraMessage;

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(
            Endpoint::parse("tcp://127.0.0.1:5670").unwrap(),
            Endpoint::Tcp("127.0.0.1:5670".into())
        );
        assert_eq!(
            Endpoint::parse("inproc://hydra").unwrap().to_string(),
            "inproc://hydra"
        );
        assert!(Endpoint::parse("udp://x").is_err());
        assert!(Endpoint::parse("tcp://").is_err());
    }

    async fn exchange(transport: &dyn Transport, listener: &mut Box<dyn Listener>) {
        let endpoint = listener.local_endpoint();
        let (client, accepted) = tokio::join!(transport.connect(&endpoint), listener.accept());
        let mut client = client.unwrap();
        let (mut server, _peer) = accepted.unwrap();

        write_message(&mut client, &HydraMessage::Ping).await.unwrap();
        assert_eq!(
            read_message(&mut server).await.unwrap(),
            Some(HydraMessage::Ping)
        );
        write_message(&mut server, &HydraMessage::PingOk).await.unwrap();
        assert_eq!(
            read_message(&mut client).await.unwrap(),
            Some(HydraMessage::PingOk)
        );
    }

    #[tokio::test]
    async fn test_memory_transport_connect_accept() {
        let network = MemoryNetwork::new();
        let transport = network.transport();
        let mut listener = transport.bind("inproc://test").await.unwrap();
        assert_eq!(listener.local_endpoint(), "inproc://test");
        exchange(&transport, &mut listener).await;
    }

    #[tokio::test]
    async fn test_memory_transport_rebind_after_drop() {
        let network = MemoryNetwork::new();
        let transport = network.transport();
        let listener = transport.bind("inproc://again").await.unwrap();

        assert!(matches!(
            transport.bind("inproc://again").await,
            Err(ProtoError::AddressInUse(_))
        ));

        drop(listener);
        assert!(matches!(
            transport.connect("inproc://again").await,
            Err(ProtoError::ConnectionRefused(_))
        ));
        let mut listener = transport.bind("inproc://again").await.unwrap();
        exchange(&transport, &mut listener).await;
    }

    #[tokio::test]
    async fn test_memory_transport_refuses_unknown_name() {
        let transport = MemoryNetwork::new().transport();
        assert!(matches!(
            transport.connect("inproc://nobody").await,
            Err(ProtoError::ConnectionRefused(_))
        ));
        assert!(matches!(
            transport.connect("tcp://127.0.0.1:1").await,
            Err(ProtoError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_tcp_transport_ephemeral_port() {
        let transport = TcpTransport::new();
        let mut listener = transport.bind("tcp://127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_endpoint();
        assert!(endpoint.starts_with("tcp://127.0.0.1:"));
        assert!(!endpoint.ends_with(":0"));
        exchange(&transport, &mut listener).await;
    }
}
