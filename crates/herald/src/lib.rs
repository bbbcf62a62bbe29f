//! # Herald
//!
//! Decorator-style event dispatch for Rust.
//!
//! ## Overview
//!
//! Application objects (controllers) declare which of their methods handle
//! which client events. At startup every declared method is subscribed to
//! its event exactly once; each occurrence then runs through a fixed chain
//! of pluggable stages before reaching the handler.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌────────────┐   ┌────────┐   ┌───────┐   ┌────────────┐   ┌─────────┐
//! │ Client │──▶│ Middleware │──▶│ Guards │──▶│ Pipes │──▶│ Collectors │──▶│ Handler │
//! └────────┘   └────────────┘   └────────┘   └───────┘   └────────────┘   └─────────┘
//!                    │               │            │             │              │
//!                    └───────────────┴────────────┴─────────────┴──────────────┘
//!                                                │ failure
//!                                                ▼
//!                                       Exception filters
//! ```
//!
//! - **Runtime**: registration, startup exploration, configuration, logging
//! - **Explorer**: binds controller methods to client events
//! - **Stages**: global, per-controller and per-method chains
//! - **Handlers**: controller methods receiving the transformed value, the
//!   raw event arguments and the collected context
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Controller for Greeter {
//!     fn name(&self) -> &str { "Greeter" }
//!     fn methods(&self) -> &[&'static str] { &["on_ready"] }
//!     fn declarations(&self) -> &[HandlerDeclaration] {
//!         &[HandlerDeclaration::once("on_ready", "ready")]
//!     }
//!     async fn invoke(&self, method: &str, _args: HandlerArgs) -> Result<(), BoxError> {
//!         match method {
//!             "on_ready" => Ok(()),
//!             _ => Err(HandlerError::unknown_method(self.name(), method).into()),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::new();
//!     runtime.register_controller(Arc::new(Greeter))?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[derive(Dto)]` (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
#[cfg(feature = "macros")]
pub use herald_macros as macros;
pub use herald_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    pub use async_trait::async_trait;

    // Runtime - main entry point
    pub use herald_runtime::{HeraldConfig, HeraldRuntime, RuntimeError};

    // Controllers and handler metadata
    pub use herald_core::{
        BoxError, Descriptor, Dto, EventArgs, HandlerDeclaration, HandlerError, StageError,
        Subscription, SubscriptionMode, event_args,
    };
    pub use herald_framework::{Controller, ExecutionContext, HandlerArgs, InvocationContext};

    // Stages
    pub use herald_framework::{
        CatchFilter, Collector, ExceptionFilter, Guard, GuardDecision, LoggingFilter, Middleware,
        MiddlewareOptions, Pipe, PipeContext, Propagation, Scope, StageRegistry,
        TracingMiddleware, TransformPipe, ValidationPipe, collector_fn, guard_fn, middleware_fn,
        pipe_fn,
    };

    #[cfg(feature = "macros")]
    pub use herald_macros::Dto;
}
