//! Host configuration, parsed from `ticklane.toml` with environment overrides.

mod loading;
mod types;
mod validation;


pub use loading::load_dotenv;
pub use types::{HostConfig, TicklaneConfig};
