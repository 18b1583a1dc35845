//! Deterministic host double with manual tick advance.
//!
//! [`ManualHost`] never runs anything on its own. Each call to
//! [`ManualHost::advance`] moves the clock forward and executes due tasks
//! inline on the calling thread, in (due tick, submission) order. Off-thread
//! entry points are recorded as such but also run inline, which keeps tests
//! race-free while still letting them observe which host call was made.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::host::{HostError, HostTaskRunner, OnceCallback, RepeatingCallback, TaskRef};
use crate::tick::Tick;

/// Host entry point a submission went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEntry {
    RunNow,
    RunAfter,
    RunNowOffConfinedThread,
    RunAfterOffConfinedThread,
    RunPeriodic { confined: bool },
}

impl HostEntry {
    pub fn is_confined(&self) -> bool {
        match self {
            HostEntry::RunNow | HostEntry::RunAfter => true,
            HostEntry::RunNowOffConfinedThread | HostEntry::RunAfterOffConfinedThread => false,
            HostEntry::RunPeriodic { confined } => *confined,
        }
    }
}

/// One accepted submission, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub task: TaskRef,
    pub entry: HostEntry,
    pub delay: Tick,
    pub period: Option<Tick>,
}

enum Body {
    Once(OnceCallback),
    Repeating { period: Tick, callback: RepeatingCallback },
}

struct Pending {
    task: TaskRef,
    due: Tick,
    seq: u64,
    body: Body,
}

#[derive(Default)]
struct State {
    current_tick: Tick,
    next_id: u64,
    next_seq: u64,
    queue: Vec<Pending>,
    cancelled: HashSet<TaskRef>,
    cancel_counts: HashMap<TaskRef, usize>,
    submissions: Vec<Submission>,
    executions: Vec<TaskRef>,
    shutting_down: bool,
}

/// Host test double driven by explicit [`advance`](ManualHost::advance) calls.
#[derive(Default)]
pub struct ManualHost {
    state: Mutex<State>,
    running: Mutex<HashSet<TaskRef>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every further submission fail with [`HostError::ShuttingDown`].
    pub fn set_shutting_down(&self, shutting_down: bool) {
        self.state().shutting_down = shutting_down;
    }

    pub fn current_tick(&self) -> Tick {
        self.state().current_tick
    }

    /// Tasks still queued (cancelled ones excluded).
    pub fn pending(&self) -> usize {
        let state = self.state();
        state
            .queue
            .iter()
            .filter(|p| !state.cancelled.contains(&p.task))
            .count()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Task refs in the order their invocations completed (periodic tasks repeat).
    pub fn executions(&self) -> Vec<TaskRef> {
        self.state().executions.clone()
    }

    /// How many times `cancel` reached the host for `task`.
    pub fn cancel_count(&self, task: TaskRef) -> usize {
        self.state().cancel_counts.get(&task).copied().unwrap_or(0)
    }

    pub fn total_cancels(&self) -> usize {
        self.state().cancel_counts.values().sum()
    }

    /// Advance the clock by `ticks`, running due tasks after each step.
    ///
    /// A panicking callback unwinds out of this call once the host has
    /// cleared its running flag and put the rest of that tick's batch back
    /// in the queue.
    pub fn advance(&self, ticks: Tick) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Run whatever is already due at the current tick without advancing.
    pub fn run_pending(&self) {
        let tick = self.current_tick();
        self.run_due(tick);
    }

    fn step(&self) {
        let tick = {
            let mut state = self.state();
            state.current_tick += 1;
            state.current_tick
        };
        self.run_due(tick);
    }

    fn run_due(&self, tick: Tick) {
        let mut due = {
            let mut state = self.state();
            let (due, later): (Vec<_>, Vec<_>) = state.queue.drain(..).partition(|p| p.due <= tick);
            state.queue = later;
            due
        };
        due.sort_by_key(|p| (p.due, p.seq));

        let mut due = due.into_iter();
        while let Some(pending) = due.next() {
            if self.state().cancelled.contains(&pending.task) {
                continue;
            }
            let task = pending.task;
            self.set_running(task, true);
            let (outcome, requeue) = match pending.body {
                Body::Once(callback) => (panic::catch_unwind(AssertUnwindSafe(callback)), None),
                Body::Repeating { period, mut callback } => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback()));
                    (outcome, Some((period, callback)))
                }
            };
            self.set_running(task, false);

            let mut state = self.state();
            state.executions.push(task);
            if let Some((period, callback)) = requeue {
                if !state.cancelled.contains(&task) {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.queue.push(Pending {
                        task,
                        due: tick.saturating_add(period.max(1)),
                        seq,
                        body: Body::Repeating { period, callback },
                    });
                }
            }
            if let Err(payload) = outcome {
                // The rest of the batch stays queued for the next advance.
                state.queue.extend(due);
                drop(state);
                panic::resume_unwind(payload);
            }
        }
    }

    fn submit(&self, entry: HostEntry, body: Body, delay: Tick) -> Result<TaskRef, HostError> {
        let mut state = self.state();
        if state.shutting_down {
            return Err(HostError::ShuttingDown);
        }
        state.next_id += 1;
        let task = TaskRef::new(state.next_id);
        let seq = state.next_seq;
        state.next_seq += 1;
        let period = match &body {
            Body::Repeating { period, .. } => Some(*period),
            Body::Once(_) => None,
        };
        state.submissions.push(Submission {
            task,
            entry,
            delay,
            period,
        });
        let due = state.current_tick.saturating_add(delay);
        state.queue.push(Pending { task, due, seq, body });
        Ok(task)
    }

    fn set_running(&self, task: TaskRef, running: bool) {
        let mut set = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running {
            set.insert(task);
        } else {
            set.remove(&task);
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostTaskRunner for ManualHost {
    fn run_now(&self, callback: OnceCallback) -> Result<TaskRef, HostError> {
        self.submit(HostEntry::RunNow, Body::Once(callback), 0)
    }

    fn run_after(&self, callback: OnceCallback, delay: Tick) -> Result<TaskRef, HostError> {
        self.submit(HostEntry::RunAfter, Body::Once(callback), delay)
    }

    fn run_now_off_confined_thread(&self, callback: OnceCallback) -> Result<TaskRef, HostError> {
        self.submit(HostEntry::RunNowOffConfinedThread, Body::Once(callback), 0)
    }

    fn run_after_off_confined_thread(
        &self,
        callback: OnceCallback,
        delay: Tick,
    ) -> Result<TaskRef, HostError> {
        self.submit(HostEntry::RunAfterOffConfinedThread, Body::Once(callback), delay)
    }

    fn run_periodic(
        &self,
        callback: RepeatingCallback,
        delay: Tick,
        period: Tick,
        confined: bool,
    ) -> Result<TaskRef, HostError> {
        self.submit(
            HostEntry::RunPeriodic { confined },
            Body::Repeating { period, callback },
            delay,
        )
    }

    fn cancel(&self, task: TaskRef) {
        let mut state = self.state();
        state.cancelled.insert(task);
        *state.cancel_counts.entry(task).or_default() += 1;
    }

    fn is_running(&self, task: TaskRef) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&task)
    }
}
