use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use ticklane_scheduler::Disposable;

use crate::subscription::Subscription;

/// Push sequence of events fed by a bus subscription.
///
/// Dropping the stream unsubscribes.
pub struct EventStream<E> {
    rx: UnboundedReceiver<E>,
    subscription: Arc<Subscription>,
}

impl<E> EventStream<E> {
    pub(crate) fn new(rx: UnboundedReceiver<E>, subscription: Subscription) -> Self {
        Self {
            rx,
            subscription: Arc::new(subscription),
        }
    }

    /// Wait for the next event. Returns `None` once unsubscribed and drained.
    pub async fn next(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Take an already delivered event without waiting.
    pub fn try_next(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Shared handle to the underlying subscription, e.g. for an owner's
    /// composite disposable.
    pub fn subscription(&self) -> Arc<Subscription> {
        Arc::clone(&self.subscription)
    }
}

impl<E> Drop for EventStream<E> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}
