use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use ticklane_scheduler::{CallbackFault, FaultSink};

use crate::event::Event;
use crate::priority::{EventPriority, SubscribeOptions};
use crate::stream::EventStream;
use crate::subscription::Subscription;

/// Subscriber closure with the concrete event type erased.
pub(crate) type ErasedHandler = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

pub(crate) struct Entry {
    id: u64,
    priority: EventPriority,
    ignore_cancelled: bool,
    handler: ErasedHandler,
}

pub(crate) struct Registry {
    /// Subscribers per event type, kept sorted by (priority, id).
    handlers: Mutex<HashMap<TypeId, Vec<Entry>>>,
    next_id: AtomicU64,
    faults: Arc<dyn FaultSink>,
}

impl Registry {
    fn handlers(&self) -> MutexGuard<'_, HashMap<TypeId, Vec<Entry>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove one subscriber. Returns whether it was still registered.
    pub(crate) fn remove(&self, kind: TypeId, id: u64) -> bool {
        let mut handlers = self.handlers();
        let Some(entries) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }
}

/// Registry mapping event type to its subscribers.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Create a bus that reports panicking subscribers to `faults`.
    pub fn new(faults: Arc<dyn FaultSink>) -> Self {
        Self {
            registry: Arc::new(Registry {
                handlers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                faults,
            }),
        }
    }

    /// Register `handler` for events of type `E`.
    pub fn subscribe<E, F>(&self, options: SubscribeOptions, handler: F) -> Subscription
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = TypeId::of::<E>();
        let erased: ErasedHandler = Arc::new(move |event: &mut dyn Any| {
            if let Some(event) = event.downcast_mut::<E>() {
                handler(event);
            }
        });

        let mut handlers = self.registry.handlers();
        let entries = handlers.entry(kind).or_default();
        // Ids grow monotonically, so inserting after every entry of equal or
        // lower priority keeps registration order within a priority.
        let at = entries.partition_point(|e| e.priority <= options.priority);
        entries.insert(
            at,
            Entry {
                id,
                priority: options.priority,
                ignore_cancelled: options.ignore_cancelled,
                handler: erased,
            },
        );
        drop(handlers);

        debug!(event = type_name::<E>(), id, priority = ?options.priority, "subscribed");
        Subscription::new(Arc::downgrade(&self.registry), kind, id)
    }

    /// Bridge events of type `E` into an async push sequence.
    pub fn observe<E>(&self, options: SubscribeOptions) -> EventStream<E>
    where
        E: Event + Clone,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(options, move |event: &mut E| {
            // A closed receiver means the stream is being torn down.
            let _ = tx.send(event.clone());
        });
        EventStream::new(rx, subscription)
    }

    /// Deliver `event` to its subscribers in priority order.
    ///
    /// Returns how many subscribers were invoked. A panicking subscriber is
    /// reported to the fault sink and the remaining subscribers still run.
    pub fn dispatch<E: Event>(&self, event: &mut E) -> usize {
        let snapshot: Vec<(bool, ErasedHandler)> = self
            .registry
            .handlers()
            .get(&TypeId::of::<E>())
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.ignore_cancelled, Arc::clone(&e.handler)))
                    .collect()
            })
            .unwrap_or_default();

        let mut invoked = 0;
        for (ignore_cancelled, handler) in snapshot {
            if ignore_cancelled && event.is_cancelled() {
                continue;
            }
            invoked += 1;
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *event)));
            if let Err(payload) = result {
                self.registry
                    .faults
                    .report(CallbackFault::from_origin(type_name::<E>(), &*payload));
            }
        }
        invoked
    }

    /// Number of subscribers currently registered for `E`.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.registry
            .handlers()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.registry.handlers().len())
            .finish()
    }
}
