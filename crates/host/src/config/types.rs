use std::time::Duration;

use serde::{Deserialize, Serialize};

use ticklane_scheduler::DEFAULT_TICK_MILLIS;

// ── Top-level config ────────────────────────────────────────────────

/// Full configuration for a ticklane host process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicklaneConfig {
    /// Name of the component that owns the schedulers, used in logs.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Tick loop and worker pool settings.
    #[serde(default)]
    pub host: HostConfig,
}

fn default_owner() -> String {
    "ticklane".into()
}

impl Default for TicklaneConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            host: HostConfig::default(),
        }
    }
}

// ── Host section ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Length of one tick in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Size of the off-thread worker pool. `0` uses available parallelism.
    #[serde(default)]
    pub worker_threads: usize,

    /// Name given to the confined tick thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// How long `shutdown` waits for the tick thread to exit.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_tick_millis() -> u64 {
    DEFAULT_TICK_MILLIS
}

fn default_thread_name() -> String {
    "ticklane-main".into()
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            worker_threads: 0,
            thread_name: default_thread_name(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl HostConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Worker pool size with `0` resolved against the machine.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
