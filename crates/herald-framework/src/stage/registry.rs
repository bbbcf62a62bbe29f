//! Stage registry.
//!
//! Stages are registered once at startup and resolved into chains once per
//! subscription. Guards, pipes, collectors and filters can target every
//! handler, every handler of one controller, or a single handler method;
//! middleware is always global and narrowed per event with
//! [`MiddlewareOptions`].
//!
//! Resolution order:
//!
//! | Stage                        | Order                   |
//! |------------------------------|-------------------------|
//! | middleware                   | registration order      |
//! | guards, pipes, collectors    | global → owner → method |
//! | filters                      | method → owner → global |
//!
//! A handler-level filter therefore sees a failure before any global filter.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::collector::{Collector, CollectorChain};
use super::filter::{ExceptionFilter, FilterChain};
use super::guard::{Guard, GuardChain};
use super::middleware::{Middleware, MiddlewareChain, MiddlewareOptions};
use super::pipe::{Pipe, PipeChain};
use herald_core::HandlerKey;

/// Where a stage applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every handler.
    Global,
    /// Every handler of the named controller.
    Owner(String),
    /// A single handler method.
    Method(HandlerKey),
}

impl Scope {
    pub fn global() -> Self {
        Self::Global
    }

    pub fn owner(owner: impl Into<String>) -> Self {
        Self::Owner(owner.into())
    }

    pub fn method(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Method(HandlerKey::new(owner, method))
    }
}

// =============================================================================
// Scoped storage
// =============================================================================

struct Scoped<T: ?Sized> {
    global: Vec<Arc<T>>,
    owners: HashMap<String, Vec<Arc<T>>>,
    methods: HashMap<HandlerKey, Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for Scoped<T> {
    fn default() -> Self {
        Self {
            global: Vec::new(),
            owners: HashMap::new(),
            methods: HashMap::new(),
        }
    }
}

impl<T: ?Sized> Scoped<T> {
    fn push(&mut self, scope: Scope, stage: Arc<T>) {
        match scope {
            Scope::Global => self.global.push(stage),
            Scope::Owner(owner) => self.owners.entry(owner).or_default().push(stage),
            Scope::Method(key) => self.methods.entry(key).or_default().push(stage),
        }
    }

    fn levels(&self, key: &HandlerKey) -> [&[Arc<T>]; 3] {
        let owner = self.owners.get(&key.owner).map_or(&[][..], Vec::as_slice);
        let method = self.methods.get(key).map_or(&[][..], Vec::as_slice);
        [self.global.as_slice(), owner, method]
    }

    /// Global → owner → method.
    fn broad_first(&self, key: &HandlerKey) -> Vec<Arc<T>> {
        self.levels(key).into_iter().flatten().cloned().collect()
    }

    /// Method → owner → global.
    fn narrow_first(&self, key: &HandlerKey) -> Vec<Arc<T>> {
        self.levels(key).into_iter().rev().flatten().cloned().collect()
    }

    fn len(&self) -> usize {
        self.global.len()
            + self.owners.values().map(Vec::len).sum::<usize>()
            + self.methods.values().map(Vec::len).sum::<usize>()
    }
}

// =============================================================================
// StageRegistry
// =============================================================================

/// The chains of one subscription, resolved once when it is bound.
#[derive(Debug, Clone, Default)]
pub struct ResolvedStages {
    pub middleware: MiddlewareChain,
    pub guards: GuardChain,
    pub pipes: PipeChain,
    pub collectors: CollectorChain,
    pub filters: FilterChain,
}

/// Registration table for every stage kind.
///
/// Populated at startup and read-only once subscriptions are bound.
#[derive(Default)]
pub struct StageRegistry {
    middleware: Vec<(Arc<dyn Middleware>, MiddlewareOptions)>,
    guards: Scoped<dyn Guard>,
    pipes: Scoped<dyn Pipe>,
    collectors: Scoped<dyn Collector>,
    filters: Scoped<dyn ExceptionFilter>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a middleware for every event.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.use_middleware_with(middleware, MiddlewareOptions::all())
    }

    /// Registers a middleware restricted by `options`.
    pub fn use_middleware_with(
        &mut self,
        middleware: impl Middleware,
        options: MiddlewareOptions,
    ) -> &mut Self {
        self.middleware.push((Arc::new(middleware), options));
        self
    }

    pub fn use_guard(&mut self, scope: Scope, guard: impl Guard) -> &mut Self {
        self.guards.push(scope, Arc::new(guard));
        self
    }

    pub fn use_pipe(&mut self, scope: Scope, pipe: impl Pipe) -> &mut Self {
        self.pipes.push(scope, Arc::new(pipe));
        self
    }

    pub fn use_collector(&mut self, scope: Scope, collector: impl Collector) -> &mut Self {
        self.collectors.push(scope, Arc::new(collector));
        self
    }

    pub fn use_filter(&mut self, scope: Scope, filter: impl ExceptionFilter) -> &mut Self {
        self.filters.push(scope, Arc::new(filter));
        self
    }

    /// Resolves the chains applying to `owner.method` bound to `event`.
    pub fn resolve(&self, owner: &str, method: &str, event: &str) -> ResolvedStages {
        let key = HandlerKey::new(owner, method);

        let middleware = self
            .middleware
            .iter()
            .filter(|(_, options)| options.applies_to(event))
            .map(|(middleware, _)| Arc::clone(middleware))
            .collect();

        let resolved = ResolvedStages {
            middleware: MiddlewareChain::new(middleware),
            guards: GuardChain::new(self.guards.broad_first(&key)),
            pipes: PipeChain::new(self.pipes.broad_first(&key)),
            collectors: CollectorChain::new(self.collectors.broad_first(&key)),
            filters: FilterChain::new(self.filters.narrow_first(&key)),
        };

        trace!(
            owner,
            method,
            event,
            middleware = resolved.middleware.len(),
            guards = resolved.guards.len(),
            pipes = resolved.pipes.len(),
            collectors = resolved.collectors.len(),
            filters = resolved.filters.len(),
            "Resolved stages"
        );

        resolved
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("middleware_count", &self.middleware.len())
            .field("guard_count", &self.guards.len())
            .field("pipe_count", &self.pipes.len())
            .field("collector_count", &self.collectors.len())
            .field("filter_count", &self.filters.len())
            .finish()
    }
}
