use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use tracing::debug;

use ticklane_scheduler::Disposable;

use crate::bus::Registry;

/// Registration of one subscriber. Disposing it unregisters that subscriber.
///
/// Dropping a `Subscription` leaves the subscriber registered.
pub struct Subscription {
    registry: Weak<Registry>,
    kind: TypeId,
    id: u64,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(registry: Weak<Registry>, kind: TypeId, id: u64) -> Self {
        Self {
            registry,
            kind,
            id,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.kind, self.id) {
                debug!(id = self.id, "unsubscribed");
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
