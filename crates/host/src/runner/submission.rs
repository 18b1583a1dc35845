use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use ticklane_scheduler::{
    ExecutionContext, HostError, HostTaskRunner, OnceCallback, RepeatingCallback, TaskRef, Tick,
};

use super::core::TickHost;
use super::queue::{QueueEntry, TaskRecord};

impl TickHost {
    fn allocate(&self) -> TaskRef {
        TaskRef::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue `record` to run `delay` ticks after the current one.
    fn enqueue(&self, record: TaskRecord, delay: Tick) -> Result<TaskRef, HostError> {
        let id = record.id;
        let record = Arc::new(record);
        let mut state = self.state();
        if state.shutting_down {
            return Err(HostError::ShuttingDown);
        }
        self.tasks().insert(id, Arc::clone(&record));
        let due = state.current_tick.saturating_add(delay);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueueEntry {
            due,
            seq,
            task: record,
        });
        drop(state);

        debug!(task = %id, due, "queued");
        Ok(id)
    }

    /// Hand `record` straight to the worker pool.
    fn dispatch_now(&self, record: TaskRecord) -> Result<TaskRef, HostError> {
        let id = record.id;
        let record = Arc::new(record);
        {
            let state = self.state();
            if state.shutting_down {
                return Err(HostError::ShuttingDown);
            }
            self.tasks().insert(id, Arc::clone(&record));
        }
        debug!(task = %id, "dispatched off the tick thread");
        self.dispatch_to_pool(record);
        Ok(id)
    }
}

impl HostTaskRunner for TickHost {
    fn run_now(&self, callback: OnceCallback) -> Result<TaskRef, HostError> {
        let record = TaskRecord::once(self.allocate(), ExecutionContext::Confined, callback);
        self.enqueue(record, 0)
    }

    fn run_after(&self, callback: OnceCallback, delay: Tick) -> Result<TaskRef, HostError> {
        let record = TaskRecord::once(self.allocate(), ExecutionContext::Confined, callback);
        self.enqueue(record, delay)
    }

    fn run_now_off_confined_thread(&self, callback: OnceCallback) -> Result<TaskRef, HostError> {
        let record = TaskRecord::once(self.allocate(), ExecutionContext::FreeThreaded, callback);
        self.dispatch_now(record)
    }

    fn run_after_off_confined_thread(
        &self,
        callback: OnceCallback,
        delay: Tick,
    ) -> Result<TaskRef, HostError> {
        let record = TaskRecord::once(self.allocate(), ExecutionContext::FreeThreaded, callback);
        self.enqueue(record, delay)
    }

    fn run_periodic(
        &self,
        callback: RepeatingCallback,
        delay: Tick,
        period: Tick,
        confined: bool,
    ) -> Result<TaskRef, HostError> {
        let context = if confined {
            ExecutionContext::Confined
        } else {
            ExecutionContext::FreeThreaded
        };
        let record = TaskRecord::repeating(self.allocate(), context, callback, period);
        self.enqueue(record, delay)
    }

    fn cancel(&self, task: TaskRef) {
        let removed = self.tasks().remove(&task);
        if let Some(record) = removed {
            if !record.cancel() {
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(%task, "cancelled");
            }
        }
    }

    fn is_running(&self, task: TaskRef) -> bool {
        self.running().contains(&task)
    }
}
