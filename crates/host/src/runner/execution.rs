use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, TryLockError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use ticklane_scheduler::{CallbackFault, RepeatingCallback, Tick};

use super::core::TickHost;
use super::queue::{QueueEntry, TaskBody, TaskRecord};

/// Body of the tick thread. Exits once the host is shutting down or dropped.
pub(super) fn run_loop(host: Weak<TickHost>, tick: Duration) {
    let mut deadline = Instant::now() + tick;
    loop {
        let Some(host) = host.upgrade() else {
            break;
        };
        if !host.wait_until(deadline) {
            break;
        }
        host.run_tick();

        deadline += tick;
        let now = Instant::now();
        if deadline <= now {
            debug!(
                "Tick overran by {}ms, resynchronising",
                (now - deadline).as_millis()
            );
            deadline = now + tick;
        }
    }
    debug!("Tick loop exited");
}

impl TickHost {
    /// Sleep until `deadline`. Returns `false` if shutdown began first.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state();
        loop {
            if state.shutting_down {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _) = self
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Advance one tick and run everything due.
    pub(super) fn run_tick(&self) {
        let (tick, due) = {
            let mut state = self.state();
            if state.shutting_down {
                return;
            }
            state.current_tick += 1;
            let tick = state.current_tick;
            let mut due = Vec::new();
            while state.queue.peek().is_some_and(|e| e.due <= tick) {
                if let Some(entry) = state.queue.pop() {
                    due.push(entry.task);
                }
            }
            (tick, due)
        };

        for task in due {
            if task.is_cancelled() {
                self.forget(&task);
                continue;
            }
            if task.is_confined() {
                self.invoke(&task);
                if let Some(period) = task.period() {
                    self.requeue(task, tick.saturating_add(period));
                }
            } else {
                // Off-thread repeats are re-armed on dispatch; an invocation
                // still running when the next one is due makes that one skip.
                if let Some(period) = task.period() {
                    self.requeue(Arc::clone(&task), tick.saturating_add(period));
                }
                self.dispatch_to_pool(task);
            }
        }
    }

    pub(super) fn requeue(&self, task: Arc<TaskRecord>, due: Tick) {
        let mut state = self.state();
        if state.shutting_down || task.is_cancelled() {
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueueEntry { due, seq, task });
    }

    pub(super) fn dispatch_to_pool(&self, task: Arc<TaskRecord>) {
        let Some(host) = self.this.upgrade() else {
            return;
        };
        self.pool.spawn(move || host.invoke(&task));
    }

    /// Run one invocation of `task` on the calling thread.
    pub(super) fn invoke(&self, task: &TaskRecord) {
        match &task.body {
            TaskBody::Once(slot) => {
                let callback = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(callback) = callback {
                    self.guarded(task, callback);
                }
                self.forget(task);
            }
            TaskBody::Repeating { callback, .. } => {
                let mut guard = match callback.try_lock() {
                    Ok(guard) => guard,
                    Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                    Err(TryLockError::WouldBlock) => {
                        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                        warn!("{} still running, skipping this period", task.id);
                        return;
                    }
                };
                let callback: &mut RepeatingCallback = &mut guard;
                self.guarded(task, callback);
            }
        }
    }

    /// Call `callback` with the task marked running, reporting a panic to
    /// the fault sink instead of unwinding into the host.
    fn guarded(&self, task: &TaskRecord, callback: impl FnOnce()) {
        // Marked running before the cancel check so a concurrent cancel
        // either wins or observes the invocation in flight.
        self.running().insert(task.id);
        if task.is_cancelled() || self.is_shutting_down() {
            self.running().remove(&task.id);
            return;
        }

        debug!(task = %task.id, context = %task.context, "invoking");
        let result = panic::catch_unwind(AssertUnwindSafe(callback));
        self.running().remove(&task.id);
        self.counters.executed.fetch_add(1, Ordering::Relaxed);

        if let Err(payload) = result {
            self.counters.faults.fetch_add(1, Ordering::Relaxed);
            self.faults
                .report(CallbackFault::from_task(task.id, task.context, &*payload));
        }
    }

    /// Drop a finished or cancelled task from the registry.
    pub(super) fn forget(&self, task: &TaskRecord) {
        let removed = self.tasks().remove(&task.id);
        drop(removed);
    }
}
