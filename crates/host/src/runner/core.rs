use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use ticklane_scheduler::{FaultSink, TaskRef, Tick};

use crate::config::HostConfig;
use crate::error::TicklaneError;
use crate::stats::HostStats;

use super::execution::run_loop;
use super::queue::{QueueEntry, TaskRecord};

/// Reference host: one named tick thread for confined work and a `rayon`
/// pool for everything else.
///
/// Every tick the loop advances `current_tick` and runs every queued task
/// whose due tick has been reached, in (due, submission) order. Confined
/// tasks run inline on the tick thread; off-thread tasks are handed to the
/// pool.
pub struct TickHost {
    pub(super) config: HostConfig,
    pub(super) state: Mutex<HostState>,
    /// Wakes the tick loop early on shutdown.
    pub(super) wake: Condvar,
    /// Tasks that are neither cancelled nor finished.
    pub(super) tasks: Mutex<HashMap<TaskRef, Arc<TaskRecord>>>,
    /// Tasks with an invocation in flight.
    pub(super) running: Mutex<HashSet<TaskRef>>,
    pub(super) pool: rayon::ThreadPool,
    pub(super) faults: Arc<dyn FaultSink>,
    pub(super) counters: Counters,
    pub(super) next_id: AtomicU64,
    pub(super) tick_thread: Mutex<Option<JoinHandle<()>>>,
    pub(super) this: Weak<TickHost>,
}

pub(super) struct HostState {
    pub(super) current_tick: Tick,
    pub(super) queue: BinaryHeap<QueueEntry>,
    pub(super) next_seq: u64,
    pub(super) shutting_down: bool,
}

#[derive(Default)]
pub(super) struct Counters {
    pub(super) executed: AtomicU64,
    pub(super) faults: AtomicU64,
    pub(super) cancelled: AtomicU64,
    pub(super) skipped: AtomicU64,
}

impl TickHost {
    /// Validate `config`, build the worker pool and spawn the tick thread.
    pub fn start(config: &HostConfig, faults: Arc<dyn FaultSink>) -> Result<Arc<Self>, TicklaneError> {
        config.validate()?;

        let workers = config.resolved_worker_threads();
        let prefix = config.thread_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{prefix}-worker-{i}"))
            .build()?;

        let host = Arc::new_cyclic(|this| Self {
            config: config.clone(),
            state: Mutex::new(HostState {
                current_tick: 0,
                queue: BinaryHeap::new(),
                next_seq: 0,
                shutting_down: false,
            }),
            wake: Condvar::new(),
            tasks: Mutex::new(HashMap::new()),
            running: Mutex::new(HashSet::new()),
            pool,
            faults,
            counters: Counters::default(),
            next_id: AtomicU64::new(1),
            tick_thread: Mutex::new(None),
            this: this.clone(),
        });

        let weak = Arc::downgrade(&host);
        let tick = config.tick_duration();
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_loop(weak, tick))
            .map_err(TicklaneError::Spawn)?;
        *host.tick_thread() = Some(handle);

        info!(
            "Tick host started: thread '{}', {}ms ticks, {} workers",
            config.thread_name, config.tick_millis, workers
        );
        Ok(host)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Number of ticks elapsed since start.
    pub fn current_tick(&self) -> Tick {
        self.state().current_tick
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    /// Whether the caller is running on the confined tick thread.
    pub fn is_tick_thread(&self) -> bool {
        self.tick_thread()
            .as_ref()
            .is_some_and(|h| h.thread().id() == thread::current().id())
    }

    /// Snapshot of queue and execution counters.
    pub fn stats(&self) -> HostStats {
        let (current_tick, queued) = {
            let state = self.state();
            (state.current_tick, state.queue.len())
        };
        HostStats {
            current_tick,
            queued,
            live_tasks: self.tasks().len(),
            running: self.running().len(),
            executed: self.counters.executed.load(Ordering::Relaxed),
            faults: self.counters.faults.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Reject further submissions, stop the tick thread and drop queued work.
    ///
    /// Invocations already running finish; queued work never starts.
    /// Idempotent.
    pub fn shutdown(&self) {
        let dropped = {
            let mut state = self.state();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
            std::mem::take(&mut state.queue)
        };
        self.wake.notify_all();
        info!("Tick host shutdown requested, dropping {} queued entries", dropped.len());
        drop(dropped);

        self.join_tick_thread();

        let forgotten = std::mem::take(&mut *self.tasks());
        drop(forgotten);
        info!("Tick host stopped");
    }

    fn join_tick_thread(&self) {
        let Some(handle) = self.tick_thread().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            debug!("shutdown requested from the tick thread; loop exits after this tick");
            return;
        }

        let timeout = self.config.shutdown_timeout();
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    "Tick thread did not stop within {}ms, detaching",
                    timeout.as_millis()
                );
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            error!("Tick thread panicked");
        }
    }

    pub(super) fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn tasks(&self) -> MutexGuard<'_, HashMap<TaskRef, Arc<TaskRecord>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn running(&self) -> MutexGuard<'_, HashSet<TaskRef>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick_thread(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.tick_thread.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TickHost {
    fn drop(&mut self) {
        // The tick thread only holds a weak reference and exits on its next wake.
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .shutting_down = true;
        self.wake.notify_all();
    }
}

impl std::fmt::Debug for TickHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHost")
            .field("thread_name", &self.config.thread_name)
            .field("tick_millis", &self.config.tick_millis)
            .field("stats", &self.stats())
            .finish()
    }
}
