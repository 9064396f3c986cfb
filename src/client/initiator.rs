//! Connect task.
//!
//! One attempt per initiator. There is no retry: a failed attempt is
//! reported and the caller decides whether to start another.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{Adapter, Connector};
use crate::link::signal::{Signal, TaskId};

/// Handle to a running connect attempt.
pub(crate) struct Initiator {
    id: TaskId,
    token: CancellationToken,
    connector: Arc<dyn Connector>,
}

impl Initiator {
    /// Start dialing `peer` through `connector`.
    pub(crate) fn spawn<A: Adapter>(
        id: TaskId,
        adapter: Arc<A>,
        connector: Box<dyn Connector>,
        peer: A::Peer,
        token: CancellationToken,
        signals: mpsc::UnboundedSender<Signal<A::Peer>>,
    ) -> Self {
        let connector: Arc<dyn Connector> = Arc::from(connector);
        tokio::spawn(dial(
            id,
            adapter,
            connector.clone(),
            peer,
            token.clone(),
            signals,
        ));
        Self {
            id,
            token,
            connector,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Abort the attempt. Idempotent.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
        self.connector.close();
    }
}

async fn dial<A: Adapter>(
    id: TaskId,
    adapter: Arc<A>,
    connector: Arc<dyn Connector>,
    peer: A::Peer,
    token: CancellationToken,
    signals: mpsc::UnboundedSender<Signal<A::Peer>>,
) {
    // Discovery slows the connect down considerably on real radios.
    adapter.cancel_discovery();
    debug!(initiator = id, ?peer, "dialing");

    let connected = tokio::select! {
        biased;
        _ = token.cancelled() => {
            connector.close();
            return;
        }
        connected = connector.connect() => connected,
    };

    match connected {
        Ok(transport) => {
            if token.is_cancelled() {
                transport.close();
                return;
            }
            info!(initiator = id, ?peer, "connected");
            let _ = signals.send(Signal::Dialed {
                task: id,
                transport,
                peer,
            });
        }
        Err(e) => {
            connector.close();
            if token.is_cancelled() {
                return;
            }
            warn!(initiator = id, ?peer, error = %e, "connect failed");
            let _ = signals.send(Signal::DialFailed { task: id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::time::timeout;

    use crate::core::{PeerAddress, ServiceRecord};
    use crate::transport::{MemoryAdapter, MemoryNetwork, MemoryPeer};

    fn addr(last: u8) -> PeerAddress {
        PeerAddress::new([0x10, 0x20, 0x30, 0x40, 0x50, last])
    }

    fn start(
        adapter: &Arc<MemoryAdapter>,
        peer: MemoryPeer,
    ) -> (Initiator, mpsc::UnboundedReceiver<Signal<MemoryPeer>>) {
        let connector = adapter.socket(&peer, &ServiceRecord::default()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let initiator = Initiator::spawn(
            11,
            adapter.clone(),
            connector,
            peer,
            CancellationToken::new(),
            tx,
        );
        (initiator, rx)
    }

    #[tokio::test]
    async fn test_dial_success() {
        let network = MemoryNetwork::new();
        let host = network.adapter(addr(1), "host");
        let listener = host.listen(&ServiceRecord::default()).await.unwrap();
        let client = Arc::new(network.adapter(addr(2), "client"));

        let (initiator, mut rx) = start(&client, host.local_peer().clone());
        assert_eq!(initiator.id(), 11);

        let signal = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        match signal {
            Signal::Dialed { task, peer, .. } => {
                assert_eq!(task, 11);
                assert_eq!(peer, *host.local_peer());
            }
            _ => panic!("expected a dialed signal"),
        }
        assert_eq!(client.discovery_cancels(), 1);

        let (_far, from) = listener.accept().await.unwrap();
        assert_eq!(from, *client.local_peer());
    }

    #[tokio::test]
    async fn test_dial_failure_is_reported_once() {
        let network = MemoryNetwork::new();
        let client = Arc::new(network.adapter(addr(2), "client"));
        let nobody = MemoryPeer::new(addr(9), "nobody");

        let (_initiator, mut rx) = start(&client, nobody);

        let signal = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(signal, Signal::DialFailed { task: 11 }));
        assert!(rx.recv().await.is_none());
    }
}
