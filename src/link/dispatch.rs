//! Listener registration and event fan-out.

use std::sync::{Arc, RwLock};

use crate::core::{LinkEvent, LinkListener};

/// Holds the single registered listener.
///
/// Events are delivered on the calling task. The listener is cloned out of
/// the lock before the callback runs, so a listener may replace itself.
pub(crate) struct Dispatcher<P> {
    listener: RwLock<Option<Arc<dyn LinkListener<P>>>>,
}

impl<P: 'static> Dispatcher<P> {
    pub(crate) fn new() -> Self {
        Self {
            listener: RwLock::new(None),
        }
    }

    pub(crate) fn set(&self, listener: Arc<dyn LinkListener<P>>) {
        *self
            .listener
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(listener);
    }

    pub(crate) fn clear(&self) {
        self.listener
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    pub(crate) fn emit(&self, event: LinkEvent<P>) {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match listener {
            Some(listener) => listener.on_event(event),
            None => tracing::trace!(kind = event.kind(), "no listener, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_emit_without_listener() {
        let dispatcher = Dispatcher::<u8>::new();
        dispatcher.emit(LinkEvent::Connecting);
    }

    #[test]
    fn test_replace_and_clear() {
        let dispatcher = Dispatcher::<u8>::new();
        let (first_tx, mut first) = mpsc::unbounded_channel();
        let (second_tx, mut second) = mpsc::unbounded_channel();

        dispatcher.set(Arc::new(first_tx));
        dispatcher.emit(LinkEvent::Connecting);
        dispatcher.set(Arc::new(second_tx));
        dispatcher.emit(LinkEvent::Connected(3));
        dispatcher.clear();
        dispatcher.emit(LinkEvent::Disconnected);

        assert_eq!(first.try_recv().unwrap(), LinkEvent::Connecting);
        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), LinkEvent::Connected(3));
        assert!(second.try_recv().is_err());
    }
}
