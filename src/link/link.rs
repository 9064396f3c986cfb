//! The connection coordinator.
//!
//! [`Link`] owns the connection state machine. Every transition and every
//! swap of the acceptor, initiator or session handle happens under one lock.
//! Worker tasks report back through an internal channel drained by a driver
//! task, which applies their reports under the same lock and drops reports
//! from tasks that have since been replaced.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::config::LinkConfig;
use super::dispatch::Dispatcher;
use super::signal::{Signal, TaskId};
use crate::client::Initiator;
use crate::core::{
    Adapter, LinkError, LinkEvent, LinkListener, LinkResult, PeerAddress, ServiceRecord, Transport,
};
use crate::server::Acceptor;
use crate::session::Session;
use crate::transport::{ConnectionState, Role};

/// Handles guarded by the coordinator lock.
struct Shared<P> {
    service: ServiceRecord,
    acceptor: Option<Acceptor<P>>,
    initiator: Option<Initiator>,
    session: Option<Arc<Session<P>>>,
    last_task: TaskId,
    shut_down: bool,
}

impl<P> Shared<P> {
    fn next_task(&mut self) -> TaskId {
        self.last_task += 1;
        self.last_task
    }
}

struct Inner<A: Adapter> {
    adapter: Arc<A>,
    read_buffer_size: usize,
    auto_relisten: bool,
    shared: Mutex<Shared<A::Peer>>,
    state: watch::Sender<ConnectionState>,
    events: Arc<Dispatcher<A::Peer>>,
    signals: mpsc::UnboundedSender<Signal<A::Peer>>,
    root: CancellationToken,
}

/// A single-peer link over an [`Adapter`].
///
/// At most one connection exists at a time. Starting either role tears down
/// whatever was running before. Outcomes are reported as [`LinkEvent`]s to
/// the registered [`LinkListener`]; none of the trigger methods fail at
/// runtime.
///
/// # Example
///
/// ```ignore
/// use rfcomm_link::prelude::*;
///
/// let link = Link::new(adapter, LinkConfig::default());
/// let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
/// link.set_listener(tx);
/// link.start_as_host().await;
///
/// while let Some(event) = events.recv().await {
///     if let LinkEvent::MessageReceived(bytes) = event {
///         link.write(&bytes).await;
///     }
/// }
/// ```
pub struct Link<A: Adapter> {
    inner: Arc<Inner<A>>,
}

impl<A: Adapter> Link<A> {
    /// Create a link over `adapter`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(adapter: A, config: LinkConfig) -> Self {
        let (signals, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let inner = Arc::new(Inner {
            adapter: Arc::new(adapter),
            read_buffer_size: config.read_buffer_size.max(1),
            auto_relisten: config.auto_relisten,
            shared: Mutex::new(Shared {
                service: config.service,
                acceptor: None,
                initiator: None,
                session: None,
                last_task: 0,
                shut_down: false,
            }),
            state,
            events: Arc::new(Dispatcher::new()),
            signals,
            root: CancellationToken::new(),
        });

        tokio::spawn(drive(inner.clone(), rx));
        Self { inner }
    }

    /// Listen for one incoming peer.
    pub async fn start_as_host(&self) {
        let mut shared = self.inner.shared.lock().await;
        self.inner.start_host(&mut shared).await;
    }

    /// Dial `peer`.
    pub async fn start_as_client(&self, peer: A::Peer) {
        let mut shared = self.inner.shared.lock().await;
        self.inner.start_client(&mut shared, peer).await;
    }

    /// Validate `address`, map it to a peer and dial it.
    ///
    /// Invalid or unknown addresses are rejected before any state change.
    pub async fn connect_to_address(&self, address: &str) -> LinkResult<()> {
        let address = PeerAddress::parse(address)?;
        let peer = self
            .map_peer(&address)
            .ok_or_else(|| LinkError::UnknownPeer(address.to_string()))?;
        if self.inner.root.is_cancelled() {
            return Err(LinkError::Shutdown);
        }
        self.start_as_client(peer).await;
        Ok(())
    }

    /// Send one message to the connected peer.
    ///
    /// Does nothing unless connected. Failures are reported as
    /// [`LinkEvent::WriteFailed`].
    pub async fn write(&self, payload: impl AsRef<[u8]>) {
        let payload = payload.as_ref();
        if payload.is_empty() {
            return;
        }

        // Only the handle is taken under the lock; the write itself must not
        // stall state transitions.
        let session = {
            let shared = self.inner.shared.lock().await;
            if self.inner.current() != ConnectionState::Connected {
                trace!(bytes = payload.len(), "not connected, write dropped");
                return;
            }
            shared.session.clone()
        };

        if let Some(session) = session {
            session.write(payload).await;
        }
    }

    /// Stop listening, dialing or the live session. Never listens again on
    /// its own.
    pub async fn disconnect(&self) {
        let mut shared = self.inner.shared.lock().await;
        let previous = self.inner.current();
        self.inner.stop(&mut shared).await;
        if previous != ConnectionState::Disconnected {
            info!(from = %previous, "disconnected");
            self.inner.events.emit(LinkEvent::Disconnected);
        }
    }

    /// Stop everything and cancel every task. Later triggers are ignored.
    pub async fn shutdown(&self) {
        let mut shared = self.inner.shared.lock().await;
        self.inner.stop(&mut shared).await;
        shared.shut_down = true;
        self.inner.root.cancel();
        info!("link shut down");
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.current()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Register the listener, replacing any previous one.
    pub fn set_listener<L: LinkListener<A::Peer>>(&self, listener: L) {
        self.inner.events.set(Arc::new(listener));
    }

    /// Unregister the listener. Later events are dropped.
    pub fn remove_listener(&self) {
        self.inner.events.clear();
    }

    /// The service record used by the next listen or dial.
    pub async fn service(&self) -> ServiceRecord {
        self.inner.shared.lock().await.service.clone()
    }

    /// Rename the service. Only allowed while disconnected.
    pub async fn set_service_name(&self, name: impl Into<String>) -> LinkResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(LinkError::Config("service name must not be empty".into()));
        }
        let mut shared = self.inner.shared.lock().await;
        self.inner.ensure_idle()?;
        shared.service.name = name;
        Ok(())
    }

    /// Change the service identifier. Only allowed while disconnected.
    pub async fn set_service_uuid(&self, uuid: Uuid) -> LinkResult<()> {
        let mut shared = self.inner.shared.lock().await;
        self.inner.ensure_idle()?;
        shared.service.uuid = uuid;
        Ok(())
    }

    /// Whether the platform has an adapter at all.
    pub fn is_supported(&self) -> bool {
        self.inner.adapter.is_supported()
    }

    /// Whether the adapter is switched on.
    pub fn is_enabled(&self) -> bool {
        self.inner.adapter.is_enabled()
    }

    /// Peers the adapter is paired with.
    pub fn paired_peers(&self) -> Vec<A::Peer> {
        self.inner.adapter.paired_peers()
    }

    /// Look up the peer at `address`.
    pub fn map_peer(&self, address: &PeerAddress) -> Option<A::Peer> {
        self.inner.adapter.remote_peer(address)
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &A {
        &self.inner.adapter
    }
}

impl<A: Adapter> Drop for Link<A> {
    fn drop(&mut self) {
        self.inner.root.cancel();
    }
}

impl<A: Adapter> fmt::Debug for Link<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<A: Adapter> Inner<A> {
    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(from = %previous, to = %next, "unexpected state transition");
        }
        debug!(from = %previous, to = %next, "state changed");
    }

    fn ensure_idle(&self) -> LinkResult<()> {
        match self.current() {
            ConnectionState::Disconnected => Ok(()),
            state => Err(LinkError::Config(format!(
                "service record can only change while disconnected (currently {})",
                state
            ))),
        }
    }

    /// Cancel the acceptor, initiator and session, in that order.
    async fn teardown(&self, shared: &mut Shared<A::Peer>) {
        if let Some(acceptor) = shared.acceptor.take() {
            acceptor.stop().await;
        }
        if let Some(initiator) = shared.initiator.take() {
            initiator.cancel();
        }
        if let Some(session) = shared.session.take() {
            session.cancel();
        }
    }

    async fn stop(&self, shared: &mut Shared<A::Peer>) {
        self.teardown(shared).await;
        self.set_state(ConnectionState::Disconnected);
    }

    fn refuse_after_shutdown(&self, shared: &Shared<A::Peer>) -> bool {
        if shared.shut_down {
            warn!("link is shut down, ignoring start");
        }
        shared.shut_down
    }

    async fn start_host(&self, shared: &mut Shared<A::Peer>) {
        self.teardown(shared).await;
        if self.refuse_after_shutdown(shared) {
            return;
        }

        match self.adapter.listen(&shared.service).await {
            Ok(listener) => {
                let id = shared.next_task();
                self.set_state(ConnectionState::Connecting);
                info!(acceptor = id, service = %shared.service.name, "listening");
                self.events.emit(LinkEvent::Connecting);
                shared.acceptor = Some(Acceptor::spawn(
                    id,
                    listener,
                    self.root.child_token(),
                    self.signals.clone(),
                ));
            }
            Err(e) => {
                warn!(service = %shared.service.name, error = %e, "listen failed");
                self.set_state(ConnectionState::Disconnected);
                self.events.emit(LinkEvent::ConnectingFailed);
            }
        }
    }

    async fn start_client(&self, shared: &mut Shared<A::Peer>, peer: A::Peer) {
        self.teardown(shared).await;
        if self.refuse_after_shutdown(shared) {
            return;
        }

        match self.adapter.socket(&peer, &shared.service) {
            Ok(connector) => {
                let id = shared.next_task();
                self.set_state(ConnectionState::Connecting);
                info!(initiator = id, ?peer, "connecting");
                self.events.emit(LinkEvent::Connecting);
                shared.initiator = Some(Initiator::spawn(
                    id,
                    self.adapter.clone(),
                    connector,
                    peer,
                    self.root.child_token(),
                    self.signals.clone(),
                ));
            }
            Err(e) => {
                warn!(?peer, error = %e, "socket creation failed");
                self.set_state(ConnectionState::Disconnected);
                self.events.emit(LinkEvent::ConnectingFailed);
            }
        }
    }

    /// Replace whatever is running with a session on `transport`.
    async fn promote(
        &self,
        shared: &mut Shared<A::Peer>,
        transport: Box<dyn Transport>,
        peer: A::Peer,
        role: Role,
    ) {
        self.teardown(shared).await;

        let id = shared.next_task();
        self.set_state(ConnectionState::Connected);
        info!(session = id, %role, ?peer, "connected");
        self.events.emit(LinkEvent::Connected(peer));
        shared.session = Some(Session::spawn(
            id,
            role,
            transport,
            self.root.child_token(),
            self.read_buffer_size,
            self.events.clone(),
            self.signals.clone(),
        ));
    }

    async fn handle(&self, shared: &mut Shared<A::Peer>, signal: Signal<A::Peer>) {
        let task = signal.task();
        let connecting = self.current() == ConnectionState::Connecting;
        let is_acceptor = shared.acceptor.as_ref().is_some_and(|a| a.id() == task);
        let is_initiator = shared.initiator.as_ref().is_some_and(|i| i.id() == task);

        match signal {
            Signal::Accepted {
                transport, peer, ..
            } => {
                if is_acceptor && connecting {
                    self.promote(shared, transport, peer, Role::Host).await;
                } else {
                    warn!(acceptor = task, ?peer, "closing late connection");
                    transport.close();
                }
            }
            Signal::AcceptFailed { .. } => {
                if let Some(acceptor) = shared.acceptor.take_if(|_| is_acceptor) {
                    acceptor.stop().await;
                    self.set_state(ConnectionState::Disconnected);
                    self.events.emit(LinkEvent::ConnectingFailed);
                }
            }
            Signal::Dialed {
                transport, peer, ..
            } => {
                if is_initiator && connecting {
                    shared.initiator = None;
                    self.promote(shared, transport, peer, Role::Client).await;
                } else {
                    warn!(initiator = task, ?peer, "closing stale connection");
                    transport.close();
                }
            }
            Signal::DialFailed { .. } => {
                if is_initiator {
                    shared.initiator = None;
                    self.set_state(ConnectionState::Disconnected);
                    self.events.emit(LinkEvent::ConnectingFailed);
                }
            }
            Signal::Lost { role, .. } => {
                let is_session = shared.session.as_ref().is_some_and(|s| s.id() == task);
                if !is_session {
                    trace!(session = task, "ignoring loss of stale session");
                    return;
                }
                if let Some(session) = shared.session.take() {
                    session.cancel();
                }
                self.set_state(ConnectionState::Disconnected);
                info!(session = task, %role, "connection lost");
                self.events.emit(LinkEvent::Disconnected);

                if role.is_host() && self.auto_relisten && self.adapter.is_enabled() {
                    self.start_host(shared).await;
                }
            }
        }
    }
}

async fn drive<A: Adapter>(
    inner: Arc<Inner<A>>,
    mut signals: mpsc::UnboundedReceiver<Signal<A::Peer>>,
) {
    loop {
        let signal = tokio::select! {
            biased;
            _ = inner.root.cancelled() => break,
            signal = signals.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };
        let mut shared = inner.shared.lock().await;
        inner.handle(&mut shared, signal).await;
    }
    debug!("link driver stopped");
}
