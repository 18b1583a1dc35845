//! Reporting of panics that escape scheduled callbacks.
//!
//! The adapter itself never catches a callback panic. Hosts (and the event
//! registry) catch them at the invocation boundary and forward them to the
//! one [`FaultSink`] the owning application installs, so a fault neither
//! vanishes nor takes down the tick loop.

use std::any::Any;
use std::fmt;

use tracing::error;

use crate::host::TaskRef;
use crate::policy::ExecutionContext;

/// A panic raised by a scheduled callback or event subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFault {
    /// Host task, if the fault came from a scheduled callback.
    pub task: Option<TaskRef>,
    /// Where the callback ran, if known.
    pub context: Option<ExecutionContext>,
    /// Free-form origin label (e.g. an event type name).
    pub origin: String,
    /// Panic payload rendered as text.
    pub message: String,
}

impl CallbackFault {
    pub fn from_task(task: TaskRef, context: ExecutionContext, payload: &(dyn Any + Send)) -> Self {
        Self {
            task: Some(task),
            context: Some(context),
            origin: task.to_string(),
            message: panic_message(payload),
        }
    }

    pub fn from_origin(origin: impl Into<String>, payload: &(dyn Any + Send)) -> Self {
        Self {
            task: None,
            context: None,
            origin: origin.into(),
            message: panic_message(payload),
        }
    }
}

impl fmt::Display for CallbackFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback fault in {}: {}", self.origin, self.message)
    }
}

/// Process-wide receiver of callback faults.
pub trait FaultSink: Send + Sync {
    fn report(&self, fault: CallbackFault);
}

/// Default sink: logs each fault at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFaultSink;

impl FaultSink for LoggingFaultSink {
    fn report(&self, fault: CallbackFault) {
        error!(
            origin = %fault.origin,
            context = ?fault.context,
            "Unhandled exception in scheduled callback: {}",
            fault.message
        );
    }
}

/// Render a panic payload (`&str` or `String`) as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
