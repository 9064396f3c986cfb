//! TCP adapter.
//!
//! Stands in for an RFCOMM radio on machines without one: the host listens
//! on a socket address, clients dial paired peers by socket address. The
//! service record is not exchanged on the wire; both sides are expected to
//! be configured with matching endpoints.

use std::io;
use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;

use super::stream::StreamTransport;
use crate::core::constants::MAX_READ_CHUNK;
use crate::core::{Adapter, Connector, PeerAddress, ServiceListener, ServiceRecord, Transport};

/// A paired peer reachable over TCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpPeer {
    /// Hardware address used to select the peer.
    pub address: PeerAddress,
    /// Endpoint the peer listens on.
    pub endpoint: SocketAddr,
}

/// Adapter backed by TCP sockets.
#[derive(Debug)]
pub struct TcpAdapter {
    bind_addr: SocketAddr,
    paired: Vec<TcpPeer>,
    chunk_size: usize,
    enabled: AtomicBool,
    local_addr: StdMutex<Option<SocketAddr>>,
}

impl TcpAdapter {
    /// Create an adapter whose host role listens on `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            paired: Vec::new(),
            chunk_size: MAX_READ_CHUNK,
            enabled: AtomicBool::new(true),
            local_addr: StdMutex::new(None),
        }
    }

    /// Add paired peers.
    pub fn with_paired(mut self, peers: impl IntoIterator<Item = TcpPeer>) -> Self {
        self.paired.extend(peers);
        self
    }

    /// Set the per-read chunk cap of accepted and dialed transports.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable or disable the adapter.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Address of the most recent listening socket.
    ///
    /// Useful when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Adapter for TcpAdapter {
    type Peer = SocketAddr;

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn listen(
        &self,
        service: &ServiceRecord,
    ) -> io::Result<Box<dyn ServiceListener<SocketAddr>>> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local = listener.local_addr()?;
        *self
            .local_addr
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(local);
        tracing::debug!(%local, service = %service.name, "tcp service listening");

        Ok(Box::new(TcpServiceListener {
            listener,
            chunk_size: self.chunk_size,
            closed: CancellationToken::new(),
        }))
    }

    fn socket(
        &self,
        peer: &SocketAddr,
        _service: &ServiceRecord,
    ) -> io::Result<Box<dyn Connector>> {
        let socket = match peer {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        Ok(Box::new(TcpConnector {
            socket: StdMutex::new(Some(socket)),
            peer: *peer,
            chunk_size: self.chunk_size,
            closed: CancellationToken::new(),
        }))
    }

    fn paired_peers(&self) -> Vec<SocketAddr> {
        self.paired.iter().map(|p| p.endpoint).collect()
    }

    fn remote_peer(&self, address: &PeerAddress) -> Option<SocketAddr> {
        self.paired
            .iter()
            .find(|p| p.address == *address)
            .map(|p| p.endpoint)
    }
}

struct TcpServiceListener {
    listener: TcpListener,
    chunk_size: usize,
    closed: CancellationToken,
}

#[async_trait]
impl ServiceListener<SocketAddr> for TcpServiceListener {
    async fn accept(&self) -> io::Result<(Box<dyn Transport>, SocketAddr)> {
        let (stream, remote) = tokio::select! {
            biased;
            _ = self.closed.cancelled() => {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "listener closed"));
            }
            accepted = self.listener.accept() => accepted?,
        };
        stream.set_nodelay(true)?;
        Ok((
            Box::new(StreamTransport::with_chunk_size(stream, self.chunk_size)),
            remote,
        ))
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

struct TcpConnector {
    socket: StdMutex<Option<TcpSocket>>,
    peer: SocketAddr,
    chunk_size: usize,
    closed: CancellationToken,
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> io::Result<Box<dyn Transport>> {
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket already used"))?;

        let stream = tokio::select! {
            biased;
            _ = self.closed.cancelled() => {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "socket closed"));
            }
            connected = socket.connect(self.peer) => connected?,
        };
        stream.set_nodelay(true)?;
        Ok(Box::new(StreamTransport::with_chunk_size(stream, self.chunk_size)))
    }

    fn close(&self) {
        self.closed.cancel();
        self.socket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_listen_connect_roundtrip() {
        let host = TcpAdapter::new(loopback());
        let service = ServiceRecord::default();
        let listener = host.listen(&service).await.unwrap();
        let endpoint = host.local_addr().unwrap();

        let client = TcpAdapter::new(loopback());
        let connector = client.socket(&endpoint, &service).unwrap();
        let near = connector.connect().await.unwrap();
        let (far, _remote) = listener.accept().await.unwrap();

        near.write(b"over tcp").await.unwrap();
        let mut buf = [0u8; 32];
        let n = far.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"over tcp");
    }

    #[tokio::test]
    async fn test_remote_peer_lookup() {
        let address = PeerAddress::parse("00:11:22:33:44:55").unwrap();
        let endpoint: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let adapter = TcpAdapter::new(loopback()).with_paired([TcpPeer { address, endpoint }]);

        assert_eq!(adapter.remote_peer(&address), Some(endpoint));
        assert_eq!(adapter.paired_peers(), vec![endpoint]);
        assert!(
            adapter
                .remote_peer(&PeerAddress::parse("00:11:22:33:44:56").unwrap())
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_closed_listener_fails_accept() {
        let host = TcpAdapter::new(loopback());
        let listener = host.listen(&ServiceRecord::default()).await.unwrap();
        listener.close();
        assert!(listener.accept().await.is_err());
    }
}
