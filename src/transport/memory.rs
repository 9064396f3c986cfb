//! In-memory adapter network.
//!
//! Every [`MemoryAdapter`] created from the same [`MemoryNetwork`] can reach
//! the others: a host registers its service record, a client dials it by
//! address and the two ends get a pair of chunk-capped pipes. Failure
//! injection hooks make the lifecycle paths reachable from tests.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::stream::StreamTransport;
use crate::core::constants::MAX_READ_CHUNK;
use crate::core::{Adapter, Connector, PeerAddress, ServiceListener, ServiceRecord, Transport};

/// Pipe capacity between two memory peers.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Identity of a memory peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryPeer {
    /// Hardware address.
    pub address: PeerAddress,
    /// Display name.
    pub name: String,
}

impl MemoryPeer {
    /// Create a peer identity.
    pub fn new(address: PeerAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }
}

/// Transport handed out by the memory network.
pub type MemoryTransport = StreamTransport<DuplexStream>;

type Incoming = (Box<dyn Transport>, MemoryPeer);
type ServiceKey = (PeerAddress, Uuid);

#[derive(Debug)]
struct NetworkInner {
    chunk_size: usize,
    listeners: StdMutex<HashMap<ServiceKey, mpsc::UnboundedSender<Incoming>>>,
    peers: StdMutex<HashMap<PeerAddress, MemoryPeer>>,
}

/// Shared medium connecting memory adapters.
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    /// Create a network with the RFCOMM chunk cap.
    pub fn new() -> Self {
        Self::with_chunk_size(MAX_READ_CHUNK)
    }

    /// Create a network whose transports deliver at most `chunk_size` bytes
    /// per read.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                chunk_size,
                listeners: StdMutex::new(HashMap::new()),
                peers: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Create an adapter attached to this network.
    pub fn adapter(&self, address: PeerAddress, name: impl Into<String>) -> MemoryAdapter {
        let local = MemoryPeer::new(address, name);
        lock(&self.inner.peers).insert(address, local.clone());
        MemoryAdapter {
            network: self.clone(),
            local,
            enabled: AtomicBool::new(true),
            fail_listen: AtomicBool::new(false),
            fail_socket: AtomicBool::new(false),
            discovery_cancels: AtomicUsize::new(0),
            paired: StdMutex::new(Vec::new()),
        }
    }

    /// Look up a peer that has an adapter on this network.
    pub fn peer(&self, address: &PeerAddress) -> Option<MemoryPeer> {
        lock(&self.inner.peers).get(address).cloned()
    }

    /// Whether a host currently listens for `service` at `address`.
    pub fn is_listening(&self, address: &PeerAddress, service: Uuid) -> bool {
        lock(&self.inner.listeners)
            .get(&(*address, service))
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Connect `from` to the host listening for `service` at `to`.
    ///
    /// Returns the caller's end of the connection; the other end is queued
    /// on the host's listener.
    pub fn dial(
        &self,
        from: MemoryPeer,
        to: &PeerAddress,
        service: Uuid,
    ) -> io::Result<MemoryTransport> {
        let listeners = lock(&self.inner.listeners);
        let tx = listeners.get(&(*to, service)).ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, format!("no service at {}", to))
        })?;

        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        let far = StreamTransport::with_chunk_size(far, self.inner.chunk_size);
        tx.send((Box::new(far), from)).map_err(|_| {
            io::Error::new(io::ErrorKind::ConnectionRefused, format!("service at {} closed", to))
        })?;

        Ok(StreamTransport::with_chunk_size(near, self.inner.chunk_size))
    }

    fn register(&self, key: ServiceKey, tx: mpsc::UnboundedSender<Incoming>) {
        lock(&self.inner.listeners).insert(key, tx);
    }

    fn unregister(&self, key: &ServiceKey, tx: &mpsc::UnboundedSender<Incoming>) {
        let mut listeners = lock(&self.inner.listeners);
        if listeners.get(key).is_some_and(|current| current.same_channel(tx)) {
            listeners.remove(key);
        }
    }
}

fn lock<T>(m: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Adapter attached to a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryAdapter {
    network: MemoryNetwork,
    local: MemoryPeer,
    enabled: AtomicBool,
    fail_listen: AtomicBool,
    fail_socket: AtomicBool,
    discovery_cancels: AtomicUsize,
    paired: StdMutex<Vec<MemoryPeer>>,
}

impl MemoryAdapter {
    /// This adapter's own identity.
    pub fn local_peer(&self) -> &MemoryPeer {
        &self.local
    }

    /// The network this adapter is attached to.
    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    /// Enable or disable the adapter.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Make subsequent `listen` calls fail.
    pub fn fail_listen(&self, fail: bool) {
        self.fail_listen.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `socket` calls fail.
    pub fn fail_socket(&self, fail: bool) {
        self.fail_socket.store(fail, Ordering::SeqCst);
    }

    /// Record `peer` as paired.
    pub fn pair(&self, peer: MemoryPeer) {
        let mut paired = lock(&self.paired);
        if !paired.contains(&peer) {
            paired.push(peer);
        }
    }

    /// How many times discovery was cancelled.
    pub fn discovery_cancels(&self) -> usize {
        self.discovery_cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    type Peer = MemoryPeer;

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn listen(
        &self,
        service: &ServiceRecord,
    ) -> io::Result<Box<dyn ServiceListener<MemoryPeer>>> {
        if self.fail_listen.load(Ordering::SeqCst) || !self.is_enabled() {
            return Err(io::Error::other("listen refused by adapter"));
        }

        let key = (self.local.address, service.uuid);
        let (tx, rx) = mpsc::unbounded_channel();
        self.network.register(key, tx.clone());
        Ok(Box::new(MemoryListener {
            network: self.network.clone(),
            key,
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
        }))
    }

    fn socket(&self, peer: &MemoryPeer, service: &ServiceRecord) -> io::Result<Box<dyn Connector>> {
        if self.fail_socket.load(Ordering::SeqCst) || !self.is_enabled() {
            return Err(io::Error::other("socket refused by adapter"));
        }
        Ok(Box::new(MemoryConnector {
            network: self.network.clone(),
            from: self.local.clone(),
            to: peer.address,
            service: service.uuid,
            closed: CancellationToken::new(),
        }))
    }

    fn cancel_discovery(&self) {
        self.discovery_cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn paired_peers(&self) -> Vec<MemoryPeer> {
        lock(&self.paired).clone()
    }

    fn remote_peer(&self, address: &PeerAddress) -> Option<MemoryPeer> {
        self.network.peer(address)
    }
}

struct MemoryListener {
    network: MemoryNetwork,
    key: ServiceKey,
    tx: mpsc::UnboundedSender<Incoming>,
    rx: Mutex<mpsc::UnboundedReceiver<Incoming>>,
    closed: CancellationToken,
}

#[async_trait]
impl ServiceListener<MemoryPeer> for MemoryListener {
    async fn accept(&self) -> io::Result<(Box<dyn Transport>, MemoryPeer)> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => {
                Err(io::Error::new(io::ErrorKind::ConnectionAborted, "listener closed"))
            }
            incoming = rx.recv() => {
                incoming.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::ConnectionAborted, "listener closed")
                })
            }
        }
    }

    fn close(&self) {
        self.closed.cancel();
        self.network.unregister(&self.key, &self.tx);
    }
}

struct MemoryConnector {
    network: MemoryNetwork,
    from: MemoryPeer,
    to: PeerAddress,
    service: Uuid,
    closed: CancellationToken,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> io::Result<Box<dyn Transport>> {
        if self.closed.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "socket closed"));
        }
        let transport = self.network.dial(self.from.clone(), &self.to, self.service)?;
        Ok(Box::new(transport))
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> PeerAddress {
        PeerAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, last])
    }

    #[tokio::test]
    async fn test_dial_and_accept() {
        let network = MemoryNetwork::new();
        let host = network.adapter(addr(1), "host");
        let client = network.adapter(addr(2), "client");
        let service = ServiceRecord::default();

        let listener = host.listen(&service).await.unwrap();
        assert!(network.is_listening(&addr(1), service.uuid));

        let peer = client.remote_peer(&addr(1)).unwrap();
        let connector = client.socket(&peer, &service).unwrap();
        let near = connector.connect().await.unwrap();
        let (far, from) = listener.accept().await.unwrap();
        assert_eq!(from, *client.local_peer());

        near.write(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let n = far.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[tokio::test]
    async fn test_dial_without_listener_is_refused() {
        let network = MemoryNetwork::new();
        let client = network.adapter(addr(2), "client");
        let err = network
            .dial(client.local_peer().clone(), &addr(9), Uuid::nil())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_closed_listener_unregisters() {
        let network = MemoryNetwork::new();
        let host = network.adapter(addr(1), "host");
        let service = ServiceRecord::default();

        let listener = host.listen(&service).await.unwrap();
        listener.close();
        assert!(!network.is_listening(&addr(1), service.uuid));
        assert!(listener.accept().await.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let network = MemoryNetwork::new();
        let adapter = network.adapter(addr(1), "host");
        let service = ServiceRecord::default();

        adapter.fail_listen(true);
        assert!(adapter.listen(&service).await.is_err());

        adapter.fail_socket(true);
        assert!(adapter.socket(adapter.local_peer(), &service).is_err());

        assert!(adapter.remote_peer(&addr(7)).is_none());
    }
}
