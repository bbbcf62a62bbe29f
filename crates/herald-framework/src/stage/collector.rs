//! Collector stage.
//!
//! Collectors gather extra named values for the handler. Each collector's
//! result is stored in the [`ExecutionContext`](crate::ExecutionContext)
//! under the collector's name; a later collector with the same name
//! overwrites an earlier one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::context::InvocationContext;
use herald_core::BoxError;

/// Produces one named value for the execution context.
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Key under which the collected value is stored.
    fn name(&self) -> &str;

    async fn collect(&self, ctx: &InvocationContext) -> Result<Value, BoxError>;
}

/// The ordered collectors of one subscription.
#[derive(Clone, Default)]
pub struct CollectorChain {
    collectors: Vec<Arc<dyn Collector>>,
}

impl CollectorChain {
    pub fn new(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self { collectors }
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Runs every collector in order, stopping at the first failure.
    pub async fn apply(&self, ctx: &InvocationContext) -> Result<HashMap<String, Value>, BoxError> {
        let mut collected = HashMap::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            let value = collector.collect(ctx).await?;
            trace!(collector = collector.name(), "Collected value");
            collected.insert(collector.name().to_string(), value);
        }
        Ok(collected)
    }
}

impl std::fmt::Debug for CollectorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.collectors.iter().map(|c| c.name()).collect();
        f.debug_struct("CollectorChain")
            .field("collectors", &names)
            .finish()
    }
}

/// Collector built from a synchronous closure. See [`collector_fn`].
pub struct CollectorFn<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> Collector for CollectorFn<F>
where
    F: Fn(&InvocationContext) -> Value + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, ctx: &InvocationContext) -> Result<Value, BoxError> {
        Ok((self.f)(ctx))
    }
}

/// Wraps a synchronous closure as a collector named `name`.
pub fn collector_fn<F>(name: impl Into<String>, f: F) -> CollectorFn<F>
where
    F: Fn(&InvocationContext) -> Value + Send + Sync + 'static,
{
    CollectorFn {
        name: name.into(),
        f,
    }
}
