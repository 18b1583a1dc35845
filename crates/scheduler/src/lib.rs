//! Scheduler adapter that bridges reactive code onto a tick-driven host.
//!
//! A [`Scheduler`] is bound to one [`SchedulerPolicy`] (confined to the
//! host's tick thread, or free-threaded on the host's pool). Each call to
//! [`Scheduler::new_worker`] hands out a [`Worker`] that tracks every
//! [`TaskHandle`] it creates so the whole group can be cancelled at once.

pub mod disposable;
pub mod error;
pub mod facade;
pub mod fault;
pub mod handle;
pub mod host;
pub mod policy;
pub mod testing;
pub mod tick;
pub mod worker;

pub use disposable::{CompositeDisposable, Disposable};
pub use error::{SchedulerError, SchedulerResult};
pub use facade::Scheduler;
pub use fault::{CallbackFault, FaultSink, LoggingFaultSink};
pub use handle::TaskHandle;
pub use host::{HostError, HostTaskRunner, OnceCallback, RepeatingCallback, TaskRef};
pub use policy::{ExecutionContext, SchedulerPolicy};
pub use tick::{to_ticks, Tick, TickConverter, TimeUnit, DEFAULT_TICK_MILLIS};
pub use worker::Worker;
