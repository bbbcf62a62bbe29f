//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A controller was registered after the runtime started.
    #[error("Cannot register controller '{0}': runtime already started")]
    AlreadyStarted(String),

    /// Stage or metadata tables were requested after the runtime started.
    #[error("Registration tables are frozen once the runtime has started")]
    Frozen,

    /// A runtime on an external client was started again after a stop.
    #[error("Runtime on an external client cannot be restarted: its listeners cannot be detached")]
    NotRestartable,

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
