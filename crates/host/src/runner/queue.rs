use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use ticklane_scheduler::{ExecutionContext, OnceCallback, RepeatingCallback, TaskRef, Tick};

pub(super) enum TaskBody {
    /// Emptied by the single invocation.
    Once(Mutex<Option<OnceCallback>>),
    /// Held locked for the duration of an invocation; a failed `try_lock`
    /// means the previous period is still running.
    Repeating {
        period: Tick,
        callback: Mutex<RepeatingCallback>,
    },
}

/// One task known to the host, shared between the registry, the queue and
/// any in-flight invocation.
pub(super) struct TaskRecord {
    pub(super) id: TaskRef,
    pub(super) context: ExecutionContext,
    pub(super) body: TaskBody,
    cancelled: AtomicBool,
}

impl TaskRecord {
    pub(super) fn once(id: TaskRef, context: ExecutionContext, callback: OnceCallback) -> Self {
        Self {
            id,
            context,
            body: TaskBody::Once(Mutex::new(Some(callback))),
            cancelled: AtomicBool::new(false),
        }
    }

    /// A period of zero is treated as one tick.
    pub(super) fn repeating(
        id: TaskRef,
        context: ExecutionContext,
        callback: RepeatingCallback,
        period: Tick,
    ) -> Self {
        Self {
            id,
            context,
            body: TaskBody::Repeating {
                period: period.max(1),
                callback: Mutex::new(callback),
            },
            cancelled: AtomicBool::new(false),
        }
    }

    pub(super) fn period(&self) -> Option<Tick> {
        match &self.body {
            TaskBody::Once(_) => None,
            TaskBody::Repeating { period, .. } => Some(*period),
        }
    }

    pub(super) fn is_confined(&self) -> bool {
        self.context == ExecutionContext::Confined
    }

    /// Mark cancelled. Returns whether it already was.
    pub(super) fn cancel(&self) -> bool {
        self.cancelled.swap(true, AtomicOrdering::SeqCst)
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }
}

/// Entry in the run queue.
pub(super) struct QueueEntry {
    pub(super) due: Tick,
    /// Submission order, breaks ties within a tick.
    pub(super) seq: u64,
    pub(super) task: Arc<TaskRecord>,
}

// Reverse ordering for min-heap (earliest due, then earliest seq)
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}
