//! Interfaces of the external collaborators.
//!
//! The link never touches a radio or a socket directly. It drives these
//! traits, which a platform layer implements on top of its RFCOMM stack (or,
//! for tests and demos, on top of TCP or in-memory pipes).

use std::fmt::Debug;
use std::io;

use async_trait::async_trait;

use super::address::PeerAddress;
use super::service::ServiceRecord;

/// An opaque duplex byte stream.
///
/// # Requirements
///
/// - `read` MUST return at most `buf.len()` bytes and MAY return fewer than
///   were written by the peer in one call (the chunk cap of the medium).
/// - `read` returns `Ok(0)` on end of stream.
/// - `close` MUST be idempotent and MUST wake a pending `read` with an error
///   or end of stream.
/// - `read` and `write` may be called concurrently from different tasks.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Read the next chunk into `buf`, returning the number of bytes read.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `bytes`.
    async fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Close the stream.
    fn close(&self);
}

/// A listening endpoint created for the host role.
#[async_trait]
pub trait ServiceListener<P>: Send + Sync + 'static {
    /// Wait for the next incoming peer.
    async fn accept(&self) -> io::Result<(Box<dyn Transport>, P)>;

    /// Stop listening; a pending `accept` fails.
    fn close(&self);
}

/// An unconnected socket created for the client role.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Perform a single connection attempt.
    async fn connect(&self) -> io::Result<Box<dyn Transport>>;

    /// Release the socket; a pending `connect` fails.
    fn close(&self);
}

/// The platform adapter: endpoint factory plus the discovery/pairing
/// collaborator.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Identity of a remote peer (device handle).
    type Peer: Clone + Debug + Send + Sync + 'static;

    /// Whether the platform has an adapter at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Whether the adapter is currently enabled.
    fn is_enabled(&self) -> bool;

    /// Open a listening endpoint advertising `service`.
    async fn listen(
        &self,
        service: &ServiceRecord,
    ) -> io::Result<Box<dyn ServiceListener<Self::Peer>>>;

    /// Create a socket that will dial `service` on `peer`.
    fn socket(&self, peer: &Self::Peer, service: &ServiceRecord) -> io::Result<Box<dyn Connector>>;

    /// Cancel any in-progress discovery; it slows connection attempts down.
    fn cancel_discovery(&self) {}

    /// Peers already paired with this adapter.
    fn paired_peers(&self) -> Vec<Self::Peer>;

    /// Map a hardware address to a peer, if the adapter can reach it.
    fn remote_peer(&self, address: &PeerAddress) -> Option<Self::Peer>;
}
