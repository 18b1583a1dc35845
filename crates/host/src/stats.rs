use std::fmt;

use serde::Serialize;

use ticklane_scheduler::Tick;

/// Point-in-time counters exposed by a [`TickHost`](crate::TickHost).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    /// Ticks elapsed since the host started.
    pub current_tick: Tick,
    /// Entries waiting in the run queue, including periodic re-arms.
    pub queued: usize,
    /// Tasks neither finished nor cancelled.
    pub live_tasks: usize,
    /// Invocations in flight right now.
    pub running: usize,
    /// Invocations completed, faulted ones included.
    pub executed: u64,
    /// Invocations that panicked.
    pub faults: u64,
    /// Tasks cancelled through the host.
    pub cancelled: u64,
    /// Periodic invocations skipped because the previous one overran.
    pub skipped: u64,
}

impl fmt::Display for HostStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {} | queued {} | live {} | running {} | executed {} | faults {} | cancelled {} | skipped {}",
            self.current_tick,
            self.queued,
            self.live_tasks,
            self.running,
            self.executed,
            self.faults,
            self.cancelled,
            self.skipped
        )
    }
}
