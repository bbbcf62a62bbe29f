//! Pipe stage.
//!
//! Pipes turn the raw event arguments into the handler's primary argument.
//! The chain is seeded with the raw arguments as a JSON array; each pipe
//! receives the previous pipe's output, and the last output becomes the
//! transformed value. Pipes see the handler's [`Descriptor`] (when it has
//! one) as the coercion target.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::context::InvocationContext;
use herald_core::{BoxError, Descriptor};

/// What a pipe can see besides the value it transforms.
#[derive(Debug, Clone, Copy)]
pub struct PipeContext<'a> {
    pub invocation: &'a InvocationContext,
    pub descriptor: Option<&'a Descriptor>,
}

/// An argument transformation step.
#[async_trait]
pub trait Pipe: Send + Sync + 'static {
    async fn transform(&self, value: Value, ctx: &PipeContext<'_>) -> Result<Value, BoxError>;
}

/// The ordered pipes of one subscription.
#[derive(Clone, Default)]
pub struct PipeChain {
    pipes: Vec<Arc<dyn Pipe>>,
}

impl PipeChain {
    pub fn new(pipes: Vec<Arc<dyn Pipe>>) -> Self {
        Self { pipes }
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Threads the raw arguments through every pipe in order.
    pub async fn apply(
        &self,
        invocation: &InvocationContext,
        descriptor: Option<&Descriptor>,
    ) -> Result<Value, BoxError> {
        let ctx = PipeContext {
            invocation,
            descriptor,
        };
        let mut value = invocation.event_args().to_value();
        for pipe in &self.pipes {
            value = pipe.transform(value, &ctx).await?;
        }
        Ok(value)
    }
}

impl std::fmt::Debug for PipeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeChain")
            .field("len", &self.pipes.len())
            .finish()
    }
}

// =============================================================================
// Built-in pipes
// =============================================================================

/// Shapes the value into the descriptor's object, coercing option kinds.
///
/// Passes the value through untouched when the handler has no descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformPipe;

#[async_trait]
impl Pipe for TransformPipe {
    async fn transform(&self, value: Value, ctx: &PipeContext<'_>) -> Result<Value, BoxError> {
        match ctx.descriptor {
            Some(descriptor) => {
                trace!(type_name = descriptor.type_name(), "Shaping event arguments");
                Ok(descriptor.coerce(&value))
            }
            None => Ok(value),
        }
    }
}

/// Checks the value against the descriptor, failing with a
/// [`ValidationError`](herald_core::ValidationError).
///
/// Passes the value through untouched when it is valid or when the handler
/// has no descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPipe;

#[async_trait]
impl Pipe for ValidationPipe {
    async fn transform(&self, value: Value, ctx: &PipeContext<'_>) -> Result<Value, BoxError> {
        if let Some(descriptor) = ctx.descriptor {
            descriptor.validate(&value)?;
        }
        Ok(value)
    }
}

/// Pipe built from a synchronous closure. See [`pipe_fn`].
pub struct PipeFn<F>(F);

#[async_trait]
impl<F> Pipe for PipeFn<F>
where
    F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
{
    async fn transform(&self, value: Value, _ctx: &PipeContext<'_>) -> Result<Value, BoxError> {
        (self.0)(value)
    }
}

/// Wraps a synchronous value transformation as a pipe.
pub fn pipe_fn<F>(f: F) -> PipeFn<F>
where
    F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
{
    PipeFn(f)
}
