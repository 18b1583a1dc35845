use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::disposable::Disposable;
use crate::host::{HostTaskRunner, TaskRef};
use crate::policy::ExecutionContext;

/// Cancellation handle for one host-scheduled task.
///
/// Clones share the same state. Cancellation is asynchronous: an invocation
/// the host already started runs to completion, so [`is_cancelled`] only
/// turns true once the host reports the task is no longer running.
///
/// [`is_cancelled`]: TaskHandle::is_cancelled
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    task: TaskRef,
    context: ExecutionContext,
    host: Arc<dyn HostTaskRunner>,
    cancelled: AtomicBool,
}

impl TaskHandle {
    pub(crate) fn new(task: TaskRef, context: ExecutionContext, host: Arc<dyn HostTaskRunner>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                task,
                context,
                host,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub fn task_ref(&self) -> TaskRef {
        self.inner.task
    }

    pub fn context(&self) -> ExecutionContext {
        self.inner.context
    }

    /// Tell the host to drop the task. Only the first call reaches the host.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(task = %self.inner.task, context = %self.inner.context, "cancelling task");
        self.inner.host.cancel(self.inner.task);
    }

    /// True once cancelled and the host confirms no invocation is in flight.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire) && !self.inner.host.is_running(self.inner.task)
    }

    /// Whether `cancel` has been called, regardless of in-flight work.
    pub fn cancel_requested(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Disposable for TaskHandle {
    fn dispose(&self) {
        self.cancel();
    }

    fn is_disposed(&self) -> bool {
        self.is_cancelled()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &self.inner.task)
            .field("context", &self.inner.context)
            .field("cancelled", &self.cancel_requested())
            .finish()
    }
}
