use std::sync::Arc;

use tracing::debug;

use crate::host::HostTaskRunner;
use crate::policy::{ExecutionContext, SchedulerPolicy};
use crate::tick::TickConverter;
use crate::worker::Worker;

/// Public entry point: hands out [`Worker`]s bound to one policy.
///
/// The policy is fixed at construction. Switching context means building
/// another `Scheduler`; there is no process-wide default.
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: Arc<SchedulerPolicy>,
    converter: TickConverter,
}

impl Scheduler {
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            converter: TickConverter::default(),
        }
    }

    /// Scheduler whose callbacks run on the host's tick thread.
    pub fn confined(host: Arc<dyn HostTaskRunner>, owner: impl Into<Arc<str>>) -> Self {
        Self::new(SchedulerPolicy::confined(host, owner))
    }

    /// Scheduler whose callbacks run on the host's worker threads.
    pub fn free_threaded(host: Arc<dyn HostTaskRunner>, owner: impl Into<Arc<str>>) -> Self {
        Self::new(SchedulerPolicy::free_threaded(host, owner))
    }

    /// Use a non-default tick length for delay conversion.
    pub fn with_converter(mut self, converter: TickConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.policy.context()
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }

    pub fn converter(&self) -> TickConverter {
        self.converter
    }

    /// Create a fresh, empty worker. Workers are never shared or reused.
    pub fn new_worker(&self) -> Worker {
        debug!(owner = %self.policy.owner(), context = %self.policy.context(), "creating worker");
        Worker::new(Arc::clone(&self.policy), self.converter)
    }
}
