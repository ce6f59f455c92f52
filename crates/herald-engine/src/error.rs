//! Error types for the reference host binary.
//!
//! [`HostError`] covers every startup failure `main` can hit before the
//! delivery loop is running.

/// Top-level error for the reference host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: herald_core::config::ConfigError,
    },

    /// The scheduler task could not be started.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: herald_core::scheduler::SchedulerError,
    },
}
