//! Connected session.
//!
//! Owns the one live [`Transport`] of the link. A spawned read loop turns
//! incoming chunks into messages with the [`FrameDecoder`]; the write path
//! frames outbound payloads and reports the transmitted bytes.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::core::{LinkEvent, Transport};
use crate::link::dispatch::Dispatcher;
use crate::link::signal::{Signal, TaskId};
use crate::transport::{FrameDecoder, Role, encode};

/// The live connection.
pub(crate) struct Session<P> {
    id: TaskId,
    role: Role,
    transport: Arc<dyn Transport>,
    token: CancellationToken,
    events: Arc<Dispatcher<P>>,
    /// Keeps the header and payload of one message adjacent on the wire.
    write_lock: Mutex<()>,
}

impl<P: Send + Sync + 'static> Session<P> {
    /// Take ownership of `transport` and start the read loop.
    pub(crate) fn spawn(
        id: TaskId,
        role: Role,
        transport: Box<dyn Transport>,
        token: CancellationToken,
        read_buffer_size: usize,
        events: Arc<Dispatcher<P>>,
        signals: mpsc::UnboundedSender<Signal<P>>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            id,
            role,
            transport: Arc::from(transport),
            token,
            events,
            write_lock: Mutex::new(()),
        });
        tokio::spawn(session.clone().read_loop(read_buffer_size, signals));
        session
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Frame and send `payload`.
    ///
    /// Failures are logged and reported as [`LinkEvent::WriteFailed`]; the
    /// session stays up.
    pub(crate) async fn write(&self, payload: &[u8]) {
        if payload.is_empty() {
            return;
        }

        let frame = match encode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session = self.id, error = %e, "refusing to send message");
                self.events.emit(LinkEvent::WriteFailed {
                    reason: e.to_string(),
                });
                return;
            }
        };

        let _guard = self.write_lock.lock().await;
        for buf in frame.buffers() {
            if let Err(e) = self.transport.write(buf).await {
                warn!(session = self.id, error = %e, "write failed");
                self.events.emit(LinkEvent::WriteFailed {
                    reason: e.to_string(),
                });
                return;
            }
        }

        trace!(session = self.id, bytes = frame.wire_len(), "message sent");
        self.events.emit(LinkEvent::MessageSent(frame.to_bytes()));
    }

    /// Stop the read loop and close the transport. Idempotent.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
        self.transport.close();
    }

    async fn read_loop(
        self: Arc<Self>,
        read_buffer_size: usize,
        signals: mpsc::UnboundedSender<Signal<P>>,
    ) {
        let mut buf = vec![0u8; read_buffer_size.max(1)];
        let mut decoder = FrameDecoder::new();

        let reason = loop {
            let read = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(session = self.id, "read loop cancelled");
                    self.transport.close();
                    return;
                }
                read = self.transport.read(&mut buf) => read,
            };

            match read {
                Ok(0) => break "end of stream".to_string(),
                Ok(n) => {
                    for message in decoder.push(&buf[..n]) {
                        trace!(session = self.id, bytes = message.len(), "message received");
                        self.events.emit(LinkEvent::MessageReceived(message));
                    }
                }
                Err(e) => break e.to_string(),
            }
        };

        self.transport.close();
        if self.token.is_cancelled() {
            return;
        }
        debug!(session = self.id, role = %self.role, %reason, "connection lost");
        let _ = signals.send(Signal::Lost {
            task: self.id,
            role: self.role,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    use crate::core::constants::MAX_PAYLOAD_SIZE;
    use crate::transport::StreamTransport;

    struct Harness {
        session: Arc<Session<u8>>,
        remote: DuplexStream,
        events: mpsc::UnboundedReceiver<LinkEvent<u8>>,
        signals: mpsc::UnboundedReceiver<Signal<u8>>,
    }

    fn harness(role: Role) -> Harness {
        harness_over(role, |local| Box::new(StreamTransport::new(local)))
    }

    fn harness_over(role: Role, wrap: impl FnOnce(DuplexStream) -> Box<dyn Transport>) -> Harness {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let dispatcher = Arc::new(Dispatcher::new());
        let (event_tx, events) = mpsc::unbounded_channel();
        dispatcher.set(Arc::new(event_tx));
        let (signal_tx, signals) = mpsc::unbounded_channel();

        let session = Session::spawn(
            7,
            role,
            wrap(local),
            CancellationToken::new(),
            1024,
            dispatcher,
            signal_tx,
        );
        Harness {
            session,
            remote,
            events,
            signals,
        }
    }

    /// Reads pass through; every write fails.
    struct BrokenWrites(StreamTransport<DuplexStream>);

    #[async_trait::async_trait]
    impl Transport for BrokenWrites {
        async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf).await
        }

        async fn write(&self, _bytes: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "write side broken",
            ))
        }

        fn close(&self) {
            self.0.close();
        }
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_receives_short_message() {
        let mut h = harness(Role::Host);
        h.remote.write_all(b"hello").await.unwrap();
        assert_eq!(
            next(&mut h.events).await,
            LinkEvent::MessageReceived(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn test_reassembles_large_message() {
        let mut h = harness(Role::Host);
        let payload: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        h.remote
            .write_all(&encode(&payload).unwrap().to_bytes())
            .await
            .unwrap();

        assert_eq!(next(&mut h.events).await, LinkEvent::MessageReceived(payload));
    }

    #[tokio::test]
    async fn test_write_reports_wire_bytes() {
        let mut h = harness(Role::Client);
        h.session.write(&[9u8; 2000]).await;

        let sent = match next(&mut h.events).await {
            LinkEvent::MessageSent(bytes) => bytes,
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(sent.len(), 2018);
        assert_eq!(&sent[..18], b"BU_MSG_SIZE0002000");

        let mut wire = vec![0u8; 2018];
        h.remote.read_exact(&mut wire).await.unwrap();
        assert_eq!(wire, sent);
    }

    #[tokio::test]
    async fn test_empty_write_is_noop() {
        let mut h = harness(Role::Client);
        h.session.write(b"").await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_oversized_write_fails_softly() {
        let mut h = harness(Role::Client);
        h.session.write(&vec![0u8; MAX_PAYLOAD_SIZE]).await;
        assert!(matches!(
            next(&mut h.events).await,
            LinkEvent::WriteFailed { .. }
        ));

        h.session.write(b"still up").await;
        assert_eq!(
            next(&mut h.events).await,
            LinkEvent::MessageSent(b"still up".to_vec())
        );
    }

    #[tokio::test]
    async fn test_transport_write_error_keeps_session() {
        let mut h = harness_over(Role::Client, |local| {
            Box::new(BrokenWrites(StreamTransport::new(local)))
        });

        h.session.write(b"x").await;
        match next(&mut h.events).await {
            LinkEvent::WriteFailed { reason } => assert!(reason.contains("write side broken")),
            other => panic!("unexpected event {:?}", other),
        }

        let lost = timeout(Duration::from_millis(100), h.signals.recv()).await;
        assert!(lost.is_err(), "write failure must not end the session");

        h.remote.write_all(b"ping").await.unwrap();
        assert_eq!(
            next(&mut h.events).await,
            LinkEvent::MessageReceived(b"ping".to_vec())
        );
    }

    #[tokio::test]
    async fn test_peer_close_reports_lost() {
        let mut h = harness(Role::Host);
        drop(h.remote);

        match next(&mut h.signals).await {
            Signal::Lost { task, role } => {
                assert_eq!(task, 7);
                assert_eq!(role, Role::Host);
            }
            _ => panic!("expected a lost signal"),
        }
    }

    #[tokio::test]
    async fn test_cancel_is_silent() {
        let mut h = harness(Role::Host);
        h.session.cancel();
        h.session.cancel();

        let lost = timeout(Duration::from_millis(100), h.signals.recv()).await;
        assert!(!matches!(lost, Ok(Some(_))));
        assert_eq!(h.session.id(), 7);
    }
}
