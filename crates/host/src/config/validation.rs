use crate::error::TicklaneError;

use super::types::{HostConfig, TicklaneConfig};

impl TicklaneConfig {
    /// Validate the config.
    pub fn validate(&self) -> Result<(), TicklaneError> {
        if self.owner.trim().is_empty() {
            return Err(TicklaneError::Config("owner must not be empty".into()));
        }
        self.host.validate()
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), TicklaneError> {
        if self.tick_millis == 0 {
            return Err(TicklaneError::Config(
                "host.tick_millis must be greater than 0".into(),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(TicklaneError::Config(
                "host.thread_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
