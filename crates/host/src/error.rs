use thiserror::Error;

/// Errors raised while configuring or starting a host.
#[derive(Debug, Error)]
pub enum TicklaneError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn tick thread: {0}")]
    Spawn(std::io::Error),

    #[error(transparent)]
    Scheduler(#[from] ticklane_scheduler::SchedulerError),
}
