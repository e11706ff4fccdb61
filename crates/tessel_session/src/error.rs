//! # Session Error Types
//!
//! All errors that can occur while setting up or driving a render session.
//! Per-tile stint failures are NOT session errors: they are reported in the
//! session summary so the caller can decide what to do with the tile.

use tessel_core::StintError;
use thiserror::Error;

/// Errors that can occur in the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Reading the configuration file failed.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for a session.
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Event table or span construction was rejected by the core.
    #[error(transparent)]
    Stint(#[from] StintError),

    /// The worker pool stopped accepting work or lost a worker.
    #[error("worker pool: {0}")]
    WorkerPool(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
