//! Middleware stage.
//!
//! Middleware runs first, before any gating logic, over the event name and
//! its raw arguments. It can observe or record anything it likes, but its
//! only influence on the dispatch is failing: an error skips the rest of the
//! chain and goes to the exception filters.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use herald_core::{BoxError, EventArgs};

/// A pre-processing step run before guards.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, event: &str, args: &EventArgs) -> Result<(), BoxError>;
}

/// Restricts a middleware to a subset of events.
///
/// An empty `allow_events` list means every event is allowed. `deny_events`
/// always wins over `allow_events`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareOptions {
    pub allow_events: Vec<String>,
    pub deny_events: Vec<String>,
}

impl MiddlewareOptions {
    /// Options applying the middleware to every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds events to the allow list.
    pub fn allow<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_events.extend(events.into_iter().map(Into::into));
        self
    }

    /// Adds events to the deny list.
    pub fn deny<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny_events.extend(events.into_iter().map(Into::into));
        self
    }

    /// Returns `true` if the middleware should run for `event`.
    pub fn applies_to(&self, event: &str) -> bool {
        if self.deny_events.iter().any(|e| e == event) {
            return false;
        }
        self.allow_events.is_empty() || self.allow_events.iter().any(|e| e == event)
    }
}

/// The ordered middleware of one subscription.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middleware }
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Runs every middleware in order, stopping at the first failure.
    pub async fn apply(&self, event: &str, args: &EventArgs) -> Result<(), BoxError> {
        for middleware in &self.middleware {
            middleware.handle(event, args).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middleware.len())
            .finish()
    }
}

// =============================================================================
// Built-in middleware
// =============================================================================

/// Logs every event passing through at `TRACE` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(&self, event: &str, args: &EventArgs) -> Result<(), BoxError> {
        trace!(event, arg_count = args.len(), "Event received");
        Ok(())
    }
}

/// Middleware built from an async closure. See [`middleware_fn`].
pub struct MiddlewareFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(String, EventArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn handle(&self, event: &str, args: &EventArgs) -> Result<(), BoxError> {
        (self.0)(event.to_string(), args.clone()).await
    }
}

/// Wraps an async closure taking the event name and arguments as middleware.
///
/// ```rust,ignore
/// registry.use_middleware(middleware_fn(|event, args| async move {
///     if args.is_empty() {
///         return Err(format!("event '{event}' carried no arguments").into());
///     }
///     Ok(())
/// }));
/// ```
pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn<F>
where
    F: Fn(String, EventArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    MiddlewareFn(f)
}
