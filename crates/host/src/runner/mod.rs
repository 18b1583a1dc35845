//! Tick-loop host runner.
//!
//! Split into focused submodules:
//! - `core`: TickHost struct, startup, accessors and shutdown
//! - `queue`: task records and the (due, seq) min-heap entry
//! - `execution`: tick loop, dispatch and guarded invocation
//! - `submission`: the `HostTaskRunner` entry points

mod core;
mod execution;
mod queue;
mod submission;

pub use self::core::TickHost;
