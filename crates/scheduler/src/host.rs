use std::fmt;

use thiserror::Error;

use crate::tick::Tick;

/// Callback executed once by the host.
pub type OnceCallback = Box<dyn FnOnce() + Send + 'static>;

/// Callback executed on every period of a repeating host task.
pub type RepeatingCallback = Box<dyn FnMut() + Send + 'static>;

/// Opaque identifier the host hands out for each accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskRef(u64);

impl TaskRef {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Reasons a host refuses a new task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host is shutting down")]
    ShuttingDown,

    #[error("{0}")]
    Rejected(String),
}

/// The tick-driven task runner owned by the host process.
///
/// "Confined" entry points run the callback on the host's single tick
/// thread; the `off_confined_thread` variants run it on a host-managed
/// worker thread. Delays and periods are in ticks. Implementations must be
/// safe to call from any thread.
pub trait HostTaskRunner: Send + Sync {
    /// Run on the tick thread at the next tick boundary.
    fn run_now(&self, callback: OnceCallback) -> Result<TaskRef, HostError>;

    /// Run on the tick thread once `delay` ticks have elapsed.
    fn run_after(&self, callback: OnceCallback, delay: Tick) -> Result<TaskRef, HostError>;

    /// Run on a worker thread as soon as one is available.
    fn run_now_off_confined_thread(&self, callback: OnceCallback) -> Result<TaskRef, HostError>;

    /// Run on a worker thread once `delay` ticks have elapsed.
    fn run_after_off_confined_thread(
        &self,
        callback: OnceCallback,
        delay: Tick,
    ) -> Result<TaskRef, HostError>;

    /// Run every `period` ticks, first after `delay` ticks, on the tick
    /// thread when `confined` is true and on a worker thread otherwise.
    fn run_periodic(
        &self,
        callback: RepeatingCallback,
        delay: Tick,
        period: Tick,
        confined: bool,
    ) -> Result<TaskRef, HostError>;

    /// Remove the task from future execution. Does not interrupt an
    /// invocation already in progress.
    fn cancel(&self, task: TaskRef);

    /// Whether an invocation of the task is executing right now.
    fn is_running(&self, task: TaskRef) -> bool;
}
