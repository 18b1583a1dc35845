use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchedulerError;
use crate::host::{HostTaskRunner, OnceCallback, RepeatingCallback, TaskRef};
use crate::tick::Tick;

/// Which host thread a policy runs callbacks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// The host's single tick thread. Callbacks run one at a time.
    Confined,
    /// A host-managed worker thread. Callbacks may run concurrently.
    FreeThreaded,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Confined => f.write_str("confined"),
            ExecutionContext::FreeThreaded => f.write_str("free-threaded"),
        }
    }
}

/// Translates the three submission shapes into host calls for one
/// execution context. Immutable after construction.
pub struct SchedulerPolicy {
    context: ExecutionContext,
    host: Arc<dyn HostTaskRunner>,
    owner: Arc<str>,
}

impl SchedulerPolicy {
    pub fn new(
        context: ExecutionContext,
        host: Arc<dyn HostTaskRunner>,
        owner: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            context,
            host,
            owner: owner.into(),
        }
    }

    pub fn confined(host: Arc<dyn HostTaskRunner>, owner: impl Into<Arc<str>>) -> Self {
        Self::new(ExecutionContext::Confined, host, owner)
    }

    pub fn free_threaded(host: Arc<dyn HostTaskRunner>, owner: impl Into<Arc<str>>) -> Self {
        Self::new(ExecutionContext::FreeThreaded, host, owner)
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn host(&self) -> &Arc<dyn HostTaskRunner> {
        &self.host
    }

    /// Run `callback` at the earliest opportunity in this context.
    pub fn submit_now(&self, callback: OnceCallback) -> Result<TaskRef, SchedulerError> {
        let task = match self.context {
            ExecutionContext::Confined => self.host.run_now(callback),
            ExecutionContext::FreeThreaded => self.host.run_now_off_confined_thread(callback),
        }?;
        debug!(owner = %self.owner, context = %self.context, %task, "submitted immediate task");
        Ok(task)
    }

    /// Run `callback` once after `delay` ticks.
    pub fn submit_after(&self, callback: OnceCallback, delay: Tick) -> Result<TaskRef, SchedulerError> {
        let task = match self.context {
            ExecutionContext::Confined => self.host.run_after(callback, delay),
            ExecutionContext::FreeThreaded => {
                self.host.run_after_off_confined_thread(callback, delay)
            }
        }?;
        debug!(owner = %self.owner, context = %self.context, %task, delay, "submitted delayed task");
        Ok(task)
    }

    /// Run `callback` every `period` ticks, first after `delay` ticks.
    pub fn submit_periodic(
        &self,
        callback: RepeatingCallback,
        delay: Tick,
        period: Tick,
    ) -> Result<TaskRef, SchedulerError> {
        let confined = match self.context {
            ExecutionContext::Confined => true,
            ExecutionContext::FreeThreaded => false,
        };
        let task = self.host.run_periodic(callback, delay, period, confined)?;
        debug!(
            owner = %self.owner,
            context = %self.context,
            %task,
            delay,
            period,
            "submitted periodic task"
        );
        Ok(task)
    }
}

impl fmt::Debug for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerPolicy")
            .field("context", &self.context)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
