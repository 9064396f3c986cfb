//! Accept loop task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::ServiceListener;
use crate::link::signal::{Signal, TaskId};

/// Handle to a running accept loop.
pub(crate) struct Acceptor<P> {
    id: TaskId,
    token: CancellationToken,
    listener: Arc<dyn ServiceListener<P>>,
    task: JoinHandle<()>,
}

impl<P> Acceptor<P>
where
    P: std::fmt::Debug + Send + Sync + 'static,
{
    /// Start accepting on `listener`.
    ///
    /// Every accepted connection is reported; the coordinator decides whether
    /// to promote or discard it.
    pub(crate) fn spawn(
        id: TaskId,
        listener: Box<dyn ServiceListener<P>>,
        token: CancellationToken,
        signals: mpsc::UnboundedSender<Signal<P>>,
    ) -> Self {
        let listener: Arc<dyn ServiceListener<P>> = Arc::from(listener);
        let task = tokio::spawn(accept_loop(id, listener.clone(), token.clone(), signals));
        Self {
            id,
            token,
            listener,
            task,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Close the listening endpoint and wait for the loop to exit.
    ///
    /// Waiting guarantees the endpoint is released before a new one is opened
    /// for the same service.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        self.listener.close();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(acceptor = self.id, "accept loop panicked");
            }
        }
    }
}

async fn accept_loop<P>(
    id: TaskId,
    listener: Arc<dyn ServiceListener<P>>,
    token: CancellationToken,
    signals: mpsc::UnboundedSender<Signal<P>>,
) where
    P: std::fmt::Debug + Send + Sync + 'static,
{
    debug!(acceptor = id, "accepting");
    loop {
        let accepted = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((transport, peer)) => {
                debug!(acceptor = id, ?peer, "incoming connection");
                if signals
                    .send(Signal::Accepted {
                        task: id,
                        transport,
                        peer,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                if !token.is_cancelled() {
                    warn!(acceptor = id, error = %e, "accept failed");
                    let _ = signals.send(Signal::AcceptFailed { task: id });
                }
                break;
            }
        }
    }
    listener.close();
    debug!(acceptor = id, "accept loop finished");
}
