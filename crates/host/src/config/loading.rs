use std::path::Path;

use tracing::{debug, info};

use crate::error::TicklaneError;

use super::types::TicklaneConfig;

/// Load a `.env` file from the working directory or its parents, if any.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => debug!(error = %e, "ignoring unreadable .env"),
    }
}

impl TicklaneConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, TicklaneError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TicklaneError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults with environment overrides applied and validated.
    pub fn from_env() -> Result<Self, TicklaneError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        info!(
            owner = %self.owner,
            tick_millis = self.host.tick_millis,
            worker_threads = self.host.resolved_worker_threads(),
            thread_name = %self.host.thread_name,
            shutdown_timeout_ms = self.host.shutdown_timeout_ms,
            "ticklane configuration"
        );
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `TICKLANE_SECTION_KEY` overrides `section.key`.
    /// - `TICKLANE_OWNER` -> `owner`
    /// - `TICKLANE_HOST_TICK_MILLIS` -> `host.tick_millis`
    /// - `TICKLANE_HOST_WORKER_THREADS` -> `host.worker_threads`
    /// - `TICKLANE_HOST_THREAD_NAME` -> `host.thread_name`
    /// - `TICKLANE_HOST_SHUTDOWN_TIMEOUT_MS` -> `host.shutdown_timeout_ms`
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparsable numbers are ignored.
    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TICKLANE_OWNER") {
            self.owner = v;
        }
        if let Some(v) = lookup("TICKLANE_HOST_TICK_MILLIS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.host.tick_millis = ms;
            }
        }
        if let Some(v) = lookup("TICKLANE_HOST_WORKER_THREADS") {
            if let Ok(n) = v.parse::<usize>() {
                self.host.worker_threads = n;
            }
        }
        if let Some(v) = lookup("TICKLANE_HOST_THREAD_NAME") {
            self.host.thread_name = v;
        }
        if let Some(v) = lookup("TICKLANE_HOST_SHUTDOWN_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.host.shutdown_timeout_ms = ms;
            }
        }
    }
}
