//! Guard stage.
//!
//! Guards decide whether a dispatch proceeds to the handler. A rejection is a
//! normal outcome, expressed as [`GuardDecision::Deny`], and ends the dispatch
//! silently: the handler is not called and no exception filter runs. Only a
//! guard that *fails* (returns `Err`) is treated as an exception.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::context::InvocationContext;
use herald_core::BoxError;

/// The outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny,
}

impl GuardDecision {
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_deny(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Logical AND of two decisions.
    pub fn and(self, other: Self) -> Self {
        if self.is_allow() && other.is_allow() {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl From<bool> for GuardDecision {
    fn from(allow: bool) -> Self {
        if allow { Self::Allow } else { Self::Deny }
    }
}

/// A predicate gating handler execution.
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    async fn can_activate(&self, ctx: &InvocationContext) -> Result<GuardDecision, BoxError>;
}

/// The ordered guards of one subscription.
#[derive(Clone, Default)]
pub struct GuardChain {
    guards: Vec<Arc<dyn Guard>>,
}

impl GuardChain {
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { guards }
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Evaluates every guard in order and combines the results with AND.
    ///
    /// All guards run even after one has denied; a failing guard aborts the
    /// evaluation with its error. An empty chain allows.
    pub async fn apply(&self, ctx: &InvocationContext) -> Result<GuardDecision, BoxError> {
        let mut decision = GuardDecision::Allow;
        for (index, guard) in self.guards.iter().enumerate() {
            let current = guard.can_activate(ctx).await?;
            trace!(guard_index = index, decision = ?current, "Guard evaluated");
            decision = decision.and(current);
        }
        Ok(decision)
    }
}

impl std::fmt::Debug for GuardChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardChain")
            .field("len", &self.guards.len())
            .finish()
    }
}

/// Guard built from a synchronous predicate. See [`guard_fn`].
pub struct GuardFn<F>(F);

#[async_trait]
impl<F> Guard for GuardFn<F>
where
    F: Fn(&InvocationContext) -> bool + Send + Sync + 'static,
{
    async fn can_activate(&self, ctx: &InvocationContext) -> Result<GuardDecision, BoxError> {
        Ok((self.0)(ctx).into())
    }
}

/// Wraps a synchronous predicate over the invocation context as a guard.
///
/// ```rust,ignore
/// registry.use_guard(Scope::global(), guard_fn(|ctx| {
///     ctx.event_args()
///         .first()
///         .and_then(|msg| msg["author"]["bot"].as_bool())
///         != Some(true)
/// }));
/// ```
pub fn guard_fn<F>(f: F) -> GuardFn<F>
where
    F: Fn(&InvocationContext) -> bool + Send + Sync + 'static,
{
    GuardFn(f)
}
