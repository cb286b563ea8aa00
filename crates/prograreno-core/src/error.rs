//! Error types for contained process operations

use std::io;
use thiserror::Error;

/// Result type for contained process operations
pub type Result<T> = std::result::Result<T, ContainError>;

/// Errors that can occur while configuring, starting or stopping a contained process
#[derive(Error, Debug)]
pub enum ContainError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Syscall error: {0}")]
    Syscall(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Construction inputs were rejected (empty arguments, unresolvable paths)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The isolation runtime reported a failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Starting the contained process failed; nothing was left running
    #[error("Failed to start contained process: {0}")]
    Invocation(String),

    /// Deleting the execution context failed; local state was still cleared
    #[error("Failed to tear down contained process: {0}")]
    Teardown(String),

    /// Streams were accessed while the contained process is stopped
    #[error("Contained process not running")]
    NotRunning,
}

impl ContainError {
    /// Wrap an error raised while starting into an [`ContainError::Invocation`]
    pub fn invocation(stage: &str, err: impl std::fmt::Display) -> Self {
        ContainError::Invocation(format!("{}: {}", stage, err))
    }

    /// Wrap an error raised while stopping into a [`ContainError::Teardown`]
    pub fn teardown(stage: &str, err: impl std::fmt::Display) -> Self {
        ContainError::Teardown(format!("{}: {}", stage, err))
    }
}
