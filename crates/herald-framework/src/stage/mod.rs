//! The dispatch stages.
//!
//! Each event occurrence runs through the stages of its subscription in a
//! fixed order:
//!
//! ```text
//! middleware → guards → pipes → collectors → handler
//!      └──────────── on failure ────────────┘→ filters
//! ```
//!
//! Stages are registered in a [`StageRegistry`] and resolved into
//! [`ResolvedStages`] once per subscription.

pub mod collector;
pub mod filter;
pub mod guard;
pub mod middleware;
pub mod pipe;
pub mod registry;

pub use collector::{Collector, CollectorChain, CollectorFn, collector_fn};
pub use filter::{CatchFilter, ExceptionFilter, FilterChain, LoggingFilter, Propagation};
pub use guard::{Guard, GuardChain, GuardDecision, GuardFn, guard_fn};
pub use middleware::{
    Middleware, MiddlewareChain, MiddlewareFn, MiddlewareOptions, TracingMiddleware,
    middleware_fn,
};
pub use pipe::{Pipe, PipeChain, PipeContext, PipeFn, TransformPipe, ValidationPipe, pipe_fn};
pub use registry::{ResolvedStages, Scope, StageRegistry};
