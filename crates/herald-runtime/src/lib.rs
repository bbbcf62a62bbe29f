//! Herald Runtime - application shell for the Herald event framework.
//!
//! This crate provides:
//! - Runtime orchestration (`HeraldRuntime`): controller registration,
//!   one-time handler exploration at startup, graceful shutdown
//! - Layered configuration (`ConfigLoader`) over defaults, files,
//!   `HERALD_*` environment variables and programmatic overrides
//! - Logging configuration (`LoggingBuilder`)
//!
//! ```ignore
//! use std::sync::Arc;
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::new();
//!     runtime.register_controller(Arc::new(Greeter))?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, DispatchConfig, HeraldConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, RuntimeBuilder};
