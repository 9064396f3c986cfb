//! Lifecycle and data events delivered to the registered listener.

use tokio::sync::mpsc;

/// One notification from the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent<P> {
    /// An established connection ended.
    Disconnected,
    /// Listening (host) or dialing (client) has started.
    Connecting,
    /// The listening or dialing attempt failed.
    ConnectingFailed,
    /// A peer is connected.
    Connected(P),
    /// A complete message arrived.
    MessageReceived(Vec<u8>),
    /// A message was written; carries the bytes as transmitted, size header
    /// included when one was sent.
    MessageSent(Vec<u8>),
    /// A write did not reach the transport. The connection stays up.
    WriteFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl<P> LinkEvent<P> {
    /// Short name of the event kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ConnectingFailed => "connecting-failed",
            Self::Connected(_) => "connected",
            Self::MessageReceived(_) => "message-received",
            Self::MessageSent(_) => "message-sent",
            Self::WriteFailed { .. } => "write-failed",
        }
    }
}

/// Receiver of link events.
///
/// Events are delivered from whichever task observed them, so implementations
/// must be thread-safe; hand off to a channel when single-threaded handling
/// is needed.
pub trait LinkListener<P>: Send + Sync + 'static {
    /// Handle one event.
    fn on_event(&self, event: LinkEvent<P>);
}

impl<P: Send + 'static> LinkListener<P> for mpsc::UnboundedSender<LinkEvent<P>> {
    fn on_event(&self, event: LinkEvent<P>) {
        // A dropped receiver just means nobody is interested any more.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener() {
        let (tx, mut rx) = mpsc::unbounded_channel::<LinkEvent<u8>>();
        tx.on_event(LinkEvent::Connected(7));
        tx.on_event(LinkEvent::MessageReceived(b"hi".to_vec()));

        assert_eq!(rx.try_recv().unwrap(), LinkEvent::Connected(7));
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkEvent::MessageReceived(b"hi".to_vec())
        );
    }

    #[test]
    fn test_closed_channel_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel::<LinkEvent<u8>>();
        drop(rx);
        tx.on_event(LinkEvent::Disconnected);
    }

    #[test]
    fn test_kind() {
        assert_eq!(LinkEvent::<()>::Connecting.kind(), "connecting");
        assert_eq!(
            LinkEvent::<()>::WriteFailed { reason: "x".into() }.kind(),
            "write-failed"
        );
    }
}
