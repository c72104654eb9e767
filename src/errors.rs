//! Lead Election Error Hierarchy
//!
//! Defines the error types for the lead election core and the failover
//! driver, categorized by the collaborator that produced them.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration loaded but failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Mutual-exclusion primitive failures
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Shared registry (blackboard) failures
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Lead election state machine failures
    #[error(transparent)]
    Election(#[from] ElectionError),

    /// Fault-injection driver failures
    #[error(transparent)]
    Failover(#[from] FailoverError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock service was never connected or cannot be reached
    #[error("Lock service unavailable: {0}")]
    Unavailable(String),

    /// Unlock requested by an owner that does not hold the lock
    #[error("Lock is not held by {owner}")]
    NotHeld { owner: String },

    /// Lock file I/O failures
    #[error("Lock file error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Backing store I/O failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Backing store holds something that is not a registry document
    #[error("Registry document corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),

    /// A value could not be interpreted as the expected type
    #[error("Invalid value for key {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// Blocking registry task panicked or was cancelled
    #[error("Registry task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    /// Illegal lead state transitions
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),

    /// The standby promotion task ended with an error
    #[error("Promotion waiter failed: {0}")]
    WaiterFailed(String),
}

#[derive(Debug, thiserror::Error)]
#[doc(hidden)]
pub enum StateTransitionError {
    #[error("Invalid state transition from {from} to {to}.")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Elector already started in state {0}.")]
    AlreadyStarted(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    /// Start hook reported a non-zero exit code
    #[error("Launching {role} failed with exit code {exit_code}")]
    LaunchFailed { role: String, exit_code: i32 },

    /// Config fragment or log inspection I/O failures
    #[error("Error occurred at path: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
