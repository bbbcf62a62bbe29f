//! # Herald Framework
//!
//! The dispatch pipeline of the Herald event framework.
//!
//! This layer provides:
//! - [`EventExplorer`], which subscribes controller methods to client events
//! - The stage contracts and their chains (middleware, guards, pipes,
//!   collectors, exception filters) and the [`StageRegistry`] resolving them
//! - The [`Controller`] contract and the per-dispatch contexts
//! - [`LocalEventSource`], an in-process client
//!
//! The framework is built on the contracts of `herald-core` and knows nothing
//! about configuration or process lifecycle; those belong to the runtime.

pub mod client;
pub mod context;
pub mod controller;
pub mod explorer;
pub mod stage;

#[cfg(test)]
pub(crate) mod testing;

pub use client::LocalEventSource;
pub use context::{ExecutionContext, HandlerArgs, InvocationContext};
pub use controller::Controller;
pub use explorer::EventExplorer;
pub use stage::{
    CatchFilter, Collector, CollectorChain, ExceptionFilter, FilterChain, Guard, GuardChain,
    GuardDecision, LoggingFilter, Middleware, MiddlewareChain, MiddlewareOptions, Pipe,
    PipeChain, PipeContext, Propagation, ResolvedStages, Scope, StageRegistry,
    TracingMiddleware, TransformPipe, ValidationPipe, collector_fn, guard_fn, middleware_fn,
    pipe_fn,
};
