//! Exception filter stage.
//!
//! Every failure raised inside a dispatch is caught once, stored in the
//! [`InvocationContext`] and offered to the filter chain, which decides
//! whether the failure propagates to the event source or ends the dispatch
//! cleanly.

use std::error::Error as StdError;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::context::InvocationContext;
use herald_core::StageError;

/// What happens to a failure after a filter caught it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The failure reaches the event source.
    Rethrow,
    /// The dispatch ends without an error.
    Swallow,
}

impl Propagation {
    pub fn propagates(self) -> bool {
        matches!(self, Self::Rethrow)
    }
}

/// Intercepts failures raised by a dispatch chain.
#[async_trait]
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Returns `true` if this filter handles `exception`.
    fn catches(&self, _exception: &StageError) -> bool {
        true
    }

    async fn catch(&self, exception: &StageError, ctx: &InvocationContext) -> Propagation;
}

/// The ordered filters of one subscription.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ExceptionFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn ExceptionFilter>>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Decides whether the exception stored in `ctx` propagates.
    ///
    /// The first filter that catches the exception decides. An exception no
    /// filter catches propagates; a context without an exception does not.
    pub async fn apply(&self, ctx: &InvocationContext) -> bool {
        let Some(exception) = ctx.exception() else {
            return false;
        };

        match self.filters.iter().find(|f| f.catches(exception)) {
            Some(filter) => {
                let outcome = filter.catch(exception, ctx).await;
                debug!(stage = exception.stage(), ?outcome, "Exception filtered");
                outcome.propagates()
            }
            None => {
                debug!(stage = exception.stage(), "No filter caught exception");
                true
            }
        }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.filters.len())
            .finish()
    }
}

// =============================================================================
// Built-in filters
// =============================================================================

/// Logs every failure at `ERROR` level and swallows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFilter;

#[async_trait]
impl ExceptionFilter for LoggingFilter {
    async fn catch(&self, exception: &StageError, ctx: &InvocationContext) -> Propagation {
        error!(
            event = ctx.event(),
            owner = ctx.owner(),
            method = ctx.method_name(),
            stage = exception.stage(),
            error = %exception.inner(),
            "Unhandled dispatch failure"
        );
        Propagation::Swallow
    }
}

/// Catches failures whose original error is of type `E`.
///
/// ```rust,ignore
/// registry.use_filter(
///     Scope::global(),
///     CatchFilter::new(|err: &ValidationError, _ctx| {
///         warn!(%err, "Rejected malformed payload");
///         Propagation::Swallow
///     }),
/// );
/// ```
pub struct CatchFilter<E, F> {
    f: F,
    _error: PhantomData<fn(&E)>,
}

impl<E, F> CatchFilter<E, F>
where
    E: StdError + 'static,
    F: Fn(&E, &InvocationContext) -> Propagation + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _error: PhantomData,
        }
    }
}

#[async_trait]
impl<E, F> ExceptionFilter for CatchFilter<E, F>
where
    E: StdError + 'static,
    F: Fn(&E, &InvocationContext) -> Propagation + Send + Sync + 'static,
{
    fn catches(&self, exception: &StageError) -> bool {
        exception.is::<E>()
    }

    async fn catch(&self, exception: &StageError, ctx: &InvocationContext) -> Propagation {
        match exception.downcast_ref::<E>() {
            Some(err) => (self.f)(err, ctx),
            None => Propagation::Rethrow,
        }
    }
}
