use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::disposable::{CompositeDisposable, Disposable};
use crate::error::{SchedulerError, SchedulerResult};
use crate::handle::TaskHandle;
use crate::host::TaskRef;
use crate::policy::{ExecutionContext, SchedulerPolicy};
use crate::tick::{TickConverter, TimeUnit};

#[cfg(test)]
mod tests;

/// One logical unit of scheduling work.
///
/// Every handle created through a worker is tracked, so [`dispose`] cancels
/// everything the worker started. Dropping a worker does *not* cancel its
/// tasks; call [`dispose`] on teardown.
///
/// Handles stay tracked after their task finishes, so a long-lived worker
/// grows by one handle per submission until it is disposed. Short-lived
/// workers per unit of work keep this bounded.
///
/// [`dispose`]: Worker::dispose
pub struct Worker {
    policy: Arc<SchedulerPolicy>,
    converter: TickConverter,
    tasks: CompositeDisposable<TaskHandle>,
}

impl Worker {
    pub(crate) fn new(policy: Arc<SchedulerPolicy>, converter: TickConverter) -> Self {
        Self {
            policy,
            converter,
            tasks: CompositeDisposable::new(),
        }
    }

    pub fn context(&self) -> ExecutionContext {
        self.policy.context()
    }

    /// Run `callback` at the earliest opportunity.
    pub fn schedule_now<F>(&self, callback: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_active()?;
        let task = self.policy.submit_now(Box::new(callback))?;
        self.track(task)
    }

    /// Run `callback` once after `delay`, rounded to the nearest tick.
    pub fn schedule_after<F>(&self, callback: F, delay: u64, unit: TimeUnit) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_active()?;
        let delay = self.converter.to_ticks(delay, unit);
        let task = self.policy.submit_after(Box::new(callback), delay)?;
        self.track(task)
    }

    /// Run `callback` every `period`, first after `initial_delay`.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        callback: F,
        initial_delay: u64,
        period: u64,
        unit: TimeUnit,
    ) -> SchedulerResult<TaskHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.ensure_active()?;
        let delay = self.converter.to_ticks(initial_delay, unit);
        let period = self.converter.to_ticks(period, unit);
        let task = self.policy.submit_periodic(Box::new(callback), delay, period)?;
        self.track(task)
    }

    /// Cancel every tracked task and reject further scheduling. Idempotent.
    pub fn dispose(&self) {
        if self.tasks.is_disposed() {
            return;
        }
        debug!(
            owner = %self.policy.owner(),
            context = %self.policy.context(),
            tracked = self.tasks.len(),
            "disposing worker"
        );
        self.tasks.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.tasks.is_disposed()
    }

    /// Number of handles currently tracked (0 once disposed).
    pub fn tracked(&self) -> usize {
        self.tasks.len()
    }

    fn ensure_active(&self) -> SchedulerResult<()> {
        if self.tasks.is_disposed() {
            return Err(SchedulerError::Disposed);
        }
        Ok(())
    }

    // The host accepted the task; if dispose() won the race in the meantime
    // the task is cancelled here so it is never left untracked and running.
    fn track(&self, task: TaskRef) -> SchedulerResult<TaskHandle> {
        let handle = TaskHandle::new(task, self.policy.context(), Arc::clone(self.policy.host()));
        match self.tasks.add(handle.clone()) {
            Ok(()) => Ok(handle),
            Err(rejected) => {
                warn!(%task, "worker disposed during submission, cancelling task");
                rejected.cancel();
                Err(SchedulerError::Disposed)
            }
        }
    }
}

impl Disposable for Worker {
    fn dispose(&self) {
        Worker::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        Worker::is_disposed(self)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("context", &self.policy.context())
            .field("tracked", &self.tasks.len())
            .field("disposed", &self.tasks.is_disposed())
            .finish()
    }
}
