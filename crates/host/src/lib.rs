//! Reference tick-loop host and application bootstrap.
//!
//! [`TickHost`] implements [`HostTaskRunner`](ticklane_scheduler::HostTaskRunner)
//! with a dedicated tick thread for confined work and a `rayon` pool for
//! everything else. [`Application`] wires a host, both schedulers, the event
//! bus and the fault sink into one explicitly owned context.

pub mod app;
pub mod config;
pub mod error;
pub mod runner;
pub mod stats;

pub use app::Application;
pub use config::{load_dotenv, HostConfig, TicklaneConfig};
pub use error::TicklaneError;
pub use runner::TickHost;
pub use stats::HostStats;
