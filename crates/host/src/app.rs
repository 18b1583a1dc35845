use std::sync::Arc;

use tracing::info;

use ticklane_events::{Event, EventBus, EventStream, SubscribeOptions, Subscription};
use ticklane_scheduler::{
    CompositeDisposable, Disposable, FaultSink, HostTaskRunner, LoggingFaultSink, Scheduler,
    TickConverter,
};

use crate::config::TicklaneConfig;
use crate::error::TicklaneError;
use crate::runner::TickHost;

/// Explicitly owned runtime context: one host, both schedulers, the event
/// bus and the fault sink, plus everything started through it.
///
/// Torn down by [`shutdown`](Application::shutdown) or on drop.
pub struct Application {
    owner: Arc<str>,
    host: Arc<TickHost>,
    confined: Scheduler,
    free_threaded: Scheduler,
    events: EventBus,
    faults: Arc<dyn FaultSink>,
    tracked: CompositeDisposable,
}

impl Application {
    /// Start with faults logged through `tracing`.
    pub fn start(config: &TicklaneConfig) -> Result<Self, TicklaneError> {
        Self::start_with_faults(config, Arc::new(LoggingFaultSink))
    }

    pub fn start_with_faults(
        config: &TicklaneConfig,
        faults: Arc<dyn FaultSink>,
    ) -> Result<Self, TicklaneError> {
        config.validate()?;
        let converter = TickConverter::new(config.host.tick_millis)?;
        let host = TickHost::start(&config.host, Arc::clone(&faults))?;

        let owner: Arc<str> = Arc::from(config.owner.as_str());
        let runner: Arc<dyn HostTaskRunner> = host.clone();
        let confined =
            Scheduler::confined(Arc::clone(&runner), Arc::clone(&owner)).with_converter(converter);
        let free_threaded =
            Scheduler::free_threaded(runner, Arc::clone(&owner)).with_converter(converter);
        let events = EventBus::new(Arc::clone(&faults));

        info!("Application '{}' started", owner);
        Ok(Self {
            owner,
            host,
            confined,
            free_threaded,
            events,
            faults,
            tracked: CompositeDisposable::new(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Scheduler whose callbacks run on the tick thread.
    pub fn confined(&self) -> &Scheduler {
        &self.confined
    }

    /// Scheduler whose callbacks run on the worker pool.
    pub fn free_threaded(&self) -> &Scheduler {
        &self.free_threaded
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn host(&self) -> &Arc<TickHost> {
        &self.host
    }

    pub fn faults(&self) -> &Arc<dyn FaultSink> {
        &self.faults
    }

    /// Dispose `item` when the application shuts down. After shutdown the
    /// item is disposed immediately.
    pub fn track<D: Disposable + 'static>(&self, item: D) {
        if let Err(item) = self.tracked.add(Box::new(item)) {
            item.dispose();
        }
    }

    /// Subscribe to `E` for the lifetime of the application.
    pub fn subscribe<E, F>(&self, options: SubscribeOptions, handler: F) -> Arc<Subscription>
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let subscription = Arc::new(self.events.subscribe(options, handler));
        self.track(Arc::clone(&subscription));
        subscription
    }

    /// Stream of `E` events, unsubscribed at shutdown at the latest.
    pub fn observe<E>(&self, options: SubscribeOptions) -> EventStream<E>
    where
        E: Event + Clone,
    {
        let stream = self.events.observe(options);
        self.track(stream.subscription());
        stream
    }

    pub fn is_shut_down(&self) -> bool {
        self.tracked.is_disposed()
    }

    /// Dispose everything tracked, then stop the host. Idempotent.
    pub fn shutdown(&self) {
        if self.tracked.is_disposed() {
            return;
        }
        info!("Application '{}' shutting down", self.owner);
        self.tracked.dispose();
        self.host.shutdown();
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("owner", &self.owner)
            .field("host", &self.host)
            .field("tracked", &self.tracked.len())
            .finish()
    }
}
