//! Event explorer: binds controller methods to client events.
//!
//! At startup the explorer looks up every controller method in the metadata
//! provider. A method with metadata is subscribed to its event exactly once;
//! everything the dispatch needs (descriptor, resolved stage chains) is
//! computed at that moment and captured by the callback.
//!
//! Each occurrence of the event then runs through the chain:
//!
//! 1. middleware over the event name and raw arguments
//! 2. guards; a denial ends the dispatch silently
//! 3. pipes, producing the transformed value
//! 4. collectors, filling a fresh [`ExecutionContext`]
//! 5. the handler
//!
//! A failure in any step is tagged with its stage, stored in the
//! [`InvocationContext`] and offered to the exception filters once.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{Instrument, Level, debug, info, span};

use crate::context::{ExecutionContext, HandlerArgs, InvocationContext};
use crate::controller::Controller;
use crate::stage::{ResolvedStages, StageRegistry};
use herald_core::{
    Descriptor, DispatchResult, EventArgs, EventCallback, EventSource, MetadataProvider,
    StageError, Subscription, SubscriptionMode,
};

/// Explores controllers and subscribes their handlers to the client.
pub struct EventExplorer {
    metadata: Arc<dyn MetadataProvider>,
    client: Arc<dyn EventSource>,
    stages: Arc<StageRegistry>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl EventExplorer {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        client: Arc<dyn EventSource>,
        stages: Arc<StageRegistry>,
    ) -> Self {
        Self {
            metadata,
            client,
            stages,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes `instance.method_name` to its declared event.
    ///
    /// Continuous metadata takes precedence over one-shot metadata. Returns
    /// `None`, without touching the client, when the method declares neither.
    ///
    /// Calling this twice for the same method binds it twice.
    pub fn explore(
        &self,
        instance: &Arc<dyn Controller>,
        method_name: &str,
    ) -> Option<Subscription> {
        let owner = instance.name();
        let (metadata, mode) = match self.metadata.on_event_metadata(owner, method_name) {
            Some(metadata) => (metadata, SubscriptionMode::Continuous),
            None => (
                self.metadata.once_event_metadata(owner, method_name)?,
                SubscriptionMode::OneShot,
            ),
        };

        let binding = Arc::new(Binding {
            instance: Arc::clone(instance),
            method_name: Arc::from(method_name),
            event: Arc::from(metadata.event.as_str()),
            descriptor: instance.descriptor(method_name),
            stages: self.stages.resolve(owner, method_name, &metadata.event),
        });

        info!(owner, method = method_name, "Subscribe to event({mode}): {}", metadata.event);

        let callback: EventCallback = Arc::new(move |args: EventArgs| {
            let binding = Arc::clone(&binding);
            async move { binding.dispatch(args).await }.boxed()
        });
        self.client.subscribe(&metadata.event, mode, callback);

        let subscription = Subscription::new(owner, method_name, metadata.event, mode);
        self.subscriptions.lock().push(subscription.clone());
        Some(subscription)
    }

    /// Explores every method `instance` lists.
    pub fn explore_all(&self, instance: &Arc<dyn Controller>) -> Vec<Subscription> {
        let subscriptions: Vec<_> = instance
            .methods()
            .iter()
            .filter_map(|method| self.explore(instance, method))
            .collect();

        debug!(
            owner = instance.name(),
            methods = instance.methods().len(),
            subscribed = subscriptions.len(),
            "Explored controller"
        );
        subscriptions
    }

    /// Returns every subscription created so far, in creation order.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().clone()
    }
}

impl std::fmt::Debug for EventExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventExplorer")
            .field("subscription_count", &self.subscriptions.lock().len())
            .field("stages", &self.stages)
            .finish()
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Everything one subscription needs at dispatch time.
struct Binding {
    instance: Arc<dyn Controller>,
    method_name: Arc<str>,
    event: Arc<str>,
    descriptor: Option<Descriptor>,
    stages: ResolvedStages,
}

impl Binding {
    async fn dispatch(&self, args: EventArgs) -> DispatchResult {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            event = %self.event,
            owner = self.instance.name(),
            method = %self.method_name,
        );

        async move {
            let mut ctx = InvocationContext::new(
                Arc::clone(&self.instance),
                Arc::clone(&self.method_name),
                Arc::clone(&self.event),
                args,
            );

            let Err(exception) = self.run(&ctx).await else {
                return Ok(());
            };

            debug!(stage = exception.stage(), error = %exception, "Dispatch failed");
            ctx.set_exception(exception);
            let propagate = self.stages.filters.apply(&ctx).await;

            match ctx.take_exception() {
                Some(exception) if propagate => Err(exception),
                _ => Ok(()),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, ctx: &InvocationContext) -> Result<(), StageError> {
        let stages = &self.stages;

        stages
            .middleware
            .apply(&self.event, ctx.event_args())
            .await
            .map_err(StageError::Middleware)?;

        let decision = stages.guards.apply(ctx).await.map_err(StageError::Guard)?;
        if decision.is_deny() {
            debug!("Guard denied dispatch");
            return Ok(());
        }

        // Collectors run whatever the pipes produced; a pipe failure still
        // wins over a collector failure.
        let piped = stages.pipes.apply(ctx, self.descriptor.as_ref()).await;
        let collected = stages.collectors.apply(ctx).await;
        let transformed = piped.map_err(StageError::Pipe)?;
        let collectors = collected.map_err(StageError::Collector)?;

        let args = HandlerArgs::new(
            self.descriptor.as_ref().map(|_| transformed),
            ctx.event_args().clone(),
            ExecutionContext::new(collectors),
        );

        self.instance
            .invoke(&self.method_name, args)
            .await
            .map_err(StageError::Handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{
        CatchFilter, Collector, ExceptionFilter, Guard, GuardDecision, Propagation, Scope,
        TransformPipe, ValidationPipe, collector_fn, guard_fn,
    };
    use crate::testing::counting_guard;
    use crate::LocalEventSource;
    use async_trait::async_trait;
    use herald_core::{
        BoxError, HandlerDeclaration, HandlerError, MetadataTable, OptionDescriptor, OptionKind,
        ValidationError, event_args,
    };
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Records every subscribe call and keeps the callbacks.
    #[derive(Default)]
    struct RecordingSource {
        calls: Mutex<Vec<(String, SubscriptionMode, EventCallback)>>,
    }

    impl RecordingSource {
        fn count(&self) -> usize {
            self.calls.lock().len()
        }

        fn callback(&self, index: usize) -> EventCallback {
            Arc::clone(&self.calls.lock()[index].2)
        }
    }

    impl EventSource for RecordingSource {
        fn subscribe(&self, event: &str, mode: SubscriptionMode, callback: EventCallback) {
            self.calls.lock().push((event.to_string(), mode, callback));
        }
    }

    /// A controller recording every call it receives.
    #[derive(Default)]
    struct Dice {
        calls: Mutex<Vec<(String, HandlerArgs)>>,
        fail: bool,
    }

    #[async_trait]
    impl Controller for Dice {
        fn name(&self) -> &str {
            "Dice"
        }

        fn methods(&self) -> &[&'static str] {
            &["roll", "on_ready", "helper"]
        }

        fn declarations(&self) -> &[HandlerDeclaration] {
            const DECLARATIONS: &[HandlerDeclaration] = &[
                HandlerDeclaration::on("roll", "roll"),
                HandlerDeclaration::once("on_ready", "ready"),
            ];
            DECLARATIONS
        }

        fn descriptor(&self, method: &str) -> Option<Descriptor> {
            (method == "roll").then(|| {
                Descriptor::new("Roll").option(
                    OptionDescriptor::new("sides", OptionKind::Integer)
                        .name("d")
                        .required(true),
                )
            })
        }

        async fn invoke(&self, method: &str, args: HandlerArgs) -> Result<(), BoxError> {
            match method {
                "roll" | "on_ready" => {
                    self.calls.lock().push((method.to_string(), args));
                    if self.fail {
                        return Err("dice fell off the table".into());
                    }
                    Ok(())
                }
                _ => Err(HandlerError::unknown_method(self.name(), method).into()),
            }
        }
    }

    impl Dice {
        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    struct CountingFilter {
        calls: Arc<AtomicUsize>,
        outcome: Propagation,
    }

    #[async_trait]
    impl ExceptionFilter for CountingFilter {
        async fn catch(&self, exception: &StageError, ctx: &InvocationContext) -> Propagation {
            assert_eq!(ctx.exception().map(StageError::stage), Some(exception.stage()));
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }
    }

    fn counting_filter(outcome: Propagation) -> (CountingFilter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let filter = CountingFilter {
            calls: Arc::clone(&calls),
            outcome,
        };
        (filter, calls)
    }

    /// What a filter saw when it was handed a failure.
    #[derive(Debug, Clone, PartialEq)]
    struct Caught {
        stage: &'static str,
        message: String,
        owner: String,
        method: String,
        event: String,
        args: EventArgs,
    }

    #[derive(Default)]
    struct RecordingFilter {
        caught: Mutex<Vec<Caught>>,
    }

    #[async_trait]
    impl ExceptionFilter for Arc<RecordingFilter> {
        async fn catch(&self, exception: &StageError, ctx: &InvocationContext) -> Propagation {
            self.caught.lock().push(Caught {
                stage: exception.stage(),
                message: exception.inner().to_string(),
                owner: ctx.owner().to_string(),
                method: ctx.method_name().to_string(),
                event: ctx.event().to_string(),
                args: ctx.event_args().clone(),
            });
            Propagation::Swallow
        }
    }

    struct BrokenGuard;

    #[async_trait]
    impl Guard for BrokenGuard {
        async fn can_activate(&self, _ctx: &InvocationContext) -> Result<GuardDecision, BoxError> {
            Err("permission store offline".into())
        }
    }

    struct BrokenCollector;

    #[async_trait]
    impl Collector for BrokenCollector {
        fn name(&self) -> &str {
            "member"
        }

        async fn collect(&self, _ctx: &InvocationContext) -> Result<Value, BoxError> {
            Err("member lookup timed out".into())
        }
    }

    fn metadata_for(controller: &dyn Controller) -> Arc<MetadataTable> {
        let mut table = MetadataTable::new();
        table.declare(controller.name(), controller.declarations());
        Arc::new(table)
    }

    struct Harness {
        dice: Arc<Dice>,
        source: Arc<LocalEventSource>,
        explorer: EventExplorer,
    }

    fn harness(dice: Dice, stages: StageRegistry) -> Harness {
        let dice = Arc::new(dice);
        let source = Arc::new(LocalEventSource::new());
        let explorer = EventExplorer::new(
            metadata_for(dice.as_ref()),
            Arc::clone(&source) as Arc<dyn EventSource>,
            Arc::new(stages),
        );
        let instance: Arc<dyn Controller> = Arc::clone(&dice) as Arc<dyn Controller>;
        explorer.explore_all(&instance);
        Harness {
            dice,
            source,
            explorer,
        }
    }

    // =========================================================================
    // Exploration
    // =========================================================================

    #[test]
    fn test_no_metadata_means_no_subscription() {
        let source = Arc::new(RecordingSource::default());
        let explorer = EventExplorer::new(
            Arc::new(MetadataTable::new()),
            Arc::clone(&source) as Arc<dyn EventSource>,
            Arc::new(StageRegistry::new()),
        );

        let dice: Arc<dyn Controller> = Arc::new(Dice::default());
        assert!(explorer.explore(&dice, "roll").is_none());
        assert!(explorer.explore_all(&dice).is_empty());
        assert_eq!(source.count(), 0);
        assert!(explorer.subscriptions().is_empty());
    }

    #[test]
    fn test_continuous_wins_over_one_shot() {
        let mut table = MetadataTable::new();
        table.once("Dice", "roll", "roll").on("Dice", "roll", "roll");

        let source = Arc::new(RecordingSource::default());
        let explorer = EventExplorer::new(
            Arc::new(table),
            Arc::clone(&source) as Arc<dyn EventSource>,
            Arc::new(StageRegistry::new()),
        );

        let dice: Arc<dyn Controller> = Arc::new(Dice::default());
        let subscription = explorer.explore(&dice, "roll").unwrap();

        assert_eq!(
            subscription,
            Subscription::new("Dice", "roll", "roll", SubscriptionMode::Continuous)
        );
        assert_eq!(source.count(), 1);
        assert_eq!(source.calls.lock()[0].1, SubscriptionMode::Continuous);
    }

    #[test]
    fn test_explore_all_skips_undeclared_methods() {
        let h = harness(Dice::default(), StageRegistry::new());
        let subscriptions = h.explorer.subscriptions();

        assert_eq!(
            subscriptions,
            vec![
                Subscription::new("Dice", "roll", "roll", SubscriptionMode::Continuous),
                Subscription::new("Dice", "on_ready", "ready", SubscriptionMode::OneShot),
            ]
        );
        assert_eq!(h.source.listener_count("roll"), 1);
        assert_eq!(h.source.listener_count("ready"), 1);
    }

    #[tokio::test]
    async fn test_instances_sharing_a_name_share_metadata() {
        let mut table = MetadataTable::new();
        table.on("Dice", "roll", "roll");

        let source = Arc::new(LocalEventSource::new());
        let explorer = EventExplorer::new(
            Arc::new(table),
            Arc::clone(&source) as Arc<dyn EventSource>,
            Arc::new(StageRegistry::new()),
        );

        let first = Arc::new(Dice::default());
        let second = Arc::new(Dice::default());
        for dice in [&first, &second] {
            let instance: Arc<dyn Controller> = Arc::clone(dice) as Arc<dyn Controller>;
            assert_eq!(explorer.explore_all(&instance).len(), 1);
        }
        assert_eq!(source.listener_count("roll"), 2);

        source.emit_and_wait("roll", event_args![{"d": 6}]).await;
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[tokio::test]
    async fn test_one_shot_without_stages_passes_raw_args() {
        let h = harness(Dice::default(), StageRegistry::new());

        h.source.emit_and_wait("ready", event_args!["first"]).await;
        h.source.emit_and_wait("ready", event_args!["second"]).await;

        let calls = h.dice.calls.lock();
        assert_eq!(calls.len(), 1);
        let (method, args) = &calls[0];
        assert_eq!(method, "on_ready");
        assert_eq!(args.transformed, None);
        assert_eq!(args.raw, event_args!["first"]);
        assert!(args.context.collectors.is_empty());
    }

    #[tokio::test]
    async fn test_every_occurrence_reaches_continuous_handler() {
        let h = harness(Dice::default(), StageRegistry::new());

        for _ in 0..2 {
            let results = h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;
            tokio_test::assert_ok!(&results[0]);
        }

        let calls = h.dice.calls.lock();
        assert_eq!(calls.len(), 2);
        for (_, args) in calls.iter() {
            assert_eq!(args.raw, event_args![{"d": 6}]);
            assert!(args.context.collectors.is_empty());
        }
    }

    #[tokio::test]
    async fn test_descriptor_prepends_transformed_value() {
        let mut stages = StageRegistry::new();
        stages.use_pipe(Scope::global(), TransformPipe);
        let h = harness(Dice::default(), stages);

        h.source
            .emit_and_wait("roll", event_args![{"d": "20", "extra": true}, "tail"])
            .await;

        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Roll {
            sides: u32,
        }

        let calls = h.dice.calls.lock();
        let (_, args) = &calls[0];
        assert_eq!(args.transformed, Some(json!({"sides": 20})));
        assert_eq!(args.transformed_as::<Roll>().unwrap().unwrap(), Roll { sides: 20 });
        // The raw arguments are all still passed after the transformed value.
        assert_eq!(
            args.positional(),
            vec![json!({"sides": 20}), json!({"d": "20", "extra": true}), json!("tail")]
        );
    }

    #[tokio::test]
    async fn test_denied_guard_skips_handler_and_filters() {
        let (guard, guard_calls) = counting_guard(false);
        let (filter, filter_calls) = counting_filter(Propagation::Rethrow);
        let mut stages = StageRegistry::new();
        stages
            .use_guard(Scope::global(), guard)
            .use_filter(Scope::global(), filter);
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;

        assert!(results[0].is_ok());
        assert_eq!(guard_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.dice.call_count(), 0);
        assert_eq!(filter_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_propagates_to_caller() {
        let (filter, filter_calls) = counting_filter(Propagation::Rethrow);
        let mut stages = StageRegistry::new();
        stages
            .use_pipe(Scope::global(), TransformPipe)
            .use_pipe(Scope::global(), ValidationPipe)
            .use_filter(Scope::global(), filter);
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args![{}]).await;

        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, StageError::Pipe(_)));
        let validation = err.downcast_ref::<ValidationError>().unwrap();
        assert_eq!(validation.type_name, "Roll");
        assert_eq!(filter_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.dice.call_count(), 0);
    }

    #[tokio::test]
    async fn test_swallowed_handler_failure_is_not_observable() {
        let (filter, filter_calls) = counting_filter(Propagation::Swallow);
        let mut stages = StageRegistry::new();
        stages.use_filter(Scope::owner("Dice"), filter);
        let h = harness(
            Dice {
                fail: true,
                ..Dice::default()
            },
            stages,
        );

        let results = h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;

        assert!(results[0].is_ok());
        assert_eq!(h.dice.call_count(), 1);
        assert_eq!(filter_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uncaught_handler_failure_propagates() {
        let h = harness(
            Dice {
                fail: true,
                ..Dice::default()
            },
            StageRegistry::new(),
        );

        let results = h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;
        let err = results[0].as_ref().unwrap_err();
        assert_eq!(err.stage(), "handler");
        assert_eq!(err.inner().to_string(), "dice fell off the table");
    }

    #[tokio::test]
    async fn test_collectors_fill_context_before_handler() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut stages = StageRegistry::new();
        stages
            .use_collector(
                Scope::global(),
                collector_fn("event", |ctx| json!(ctx.event())),
            )
            .use_collector(
                Scope::method("Dice", "roll"),
                collector_fn("runs", move |_| {
                    json!(counter.fetch_add(1, Ordering::SeqCst) + 1)
                }),
            );
        let h = harness(Dice::default(), stages);

        h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let calls = h.dice.calls.lock();
        let context = &calls[0].1.context;
        assert_eq!(context.collector("event"), Some(&json!("roll")));
        assert_eq!(context.collector_as::<u32>("runs").unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_collectors_run_even_when_pipe_fails() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut stages = StageRegistry::new();
        stages
            .use_pipe(Scope::global(), ValidationPipe)
            .use_collector(
                Scope::global(),
                collector_fn("runs", move |_| {
                    json!(counter.fetch_add(1, Ordering::SeqCst))
                }),
            )
            .use_filter(
                Scope::global(),
                CatchFilter::new(|_: &ValidationError, _: &InvocationContext| {
                    Propagation::Swallow
                }),
            );
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args!["no payload"]).await;

        assert!(results[0].is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(h.dice.call_count(), 0);
    }

    #[tokio::test]
    async fn test_guard_failure_reaches_filter_once() {
        let recorder = Arc::new(RecordingFilter::default());
        let mut stages = StageRegistry::new();
        stages
            .use_guard(Scope::global(), BrokenGuard)
            .use_filter(Scope::method("Dice", "roll"), Arc::clone(&recorder));
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args![{"d": 6}, "tail"]).await;

        assert!(results[0].is_ok());
        assert_eq!(h.dice.call_count(), 0);
        assert_eq!(
            *recorder.caught.lock(),
            vec![Caught {
                stage: "guard",
                message: "permission store offline".to_string(),
                owner: "Dice".to_string(),
                method: "roll".to_string(),
                event: "roll".to_string(),
                args: event_args![{"d": 6}, "tail"],
            }]
        );
    }

    #[tokio::test]
    async fn test_guard_failure_without_filter_propagates() {
        let mut stages = StageRegistry::new();
        stages.use_guard(Scope::owner("Dice"), BrokenGuard);
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;

        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, StageError::Guard(_)));
        assert_eq!(err.to_string(), "guard failed: permission store offline");
        assert_eq!(h.dice.call_count(), 0);
    }

    #[tokio::test]
    async fn test_collector_failure_reaches_filter_once() {
        let (filter, filter_calls) = counting_filter(Propagation::Rethrow);
        let recorder = Arc::new(RecordingFilter::default());
        let mut stages = StageRegistry::new();
        stages
            .use_pipe(Scope::global(), TransformPipe)
            .use_collector(Scope::method("Dice", "roll"), BrokenCollector)
            .use_filter(Scope::method("Dice", "roll"), filter)
            .use_filter(Scope::global(), Arc::clone(&recorder));
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args![{"d": "8"}]).await;

        // The first matching filter decides; later ones never see the failure.
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, StageError::Collector(_)));
        assert_eq!(err.inner().to_string(), "member lookup timed out");
        assert_eq!(filter_calls.load(Ordering::SeqCst), 1);
        assert!(recorder.caught.lock().is_empty());
        assert_eq!(h.dice.call_count(), 0);
    }

    #[tokio::test]
    async fn test_collector_failure_context_matches_event() {
        let recorder = Arc::new(RecordingFilter::default());
        let mut stages = StageRegistry::new();
        stages
            .use_collector(Scope::global(), BrokenCollector)
            .use_filter(Scope::owner("Dice"), Arc::clone(&recorder));
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("ready", event_args!["boot"]).await;

        assert!(results[0].is_ok());
        assert_eq!(h.dice.call_count(), 0);
        let caught = recorder.caught.lock();
        assert_eq!(caught.len(), 1);
        assert_eq!(caught[0].stage, "collector");
        assert_eq!(caught[0].message, "member lookup timed out");
        assert_eq!(caught[0].method, "on_ready");
        assert_eq!(caught[0].event, "ready");
        assert_eq!(caught[0].args, event_args!["boot"]);
    }

    #[tokio::test]
    async fn test_middleware_failure_skips_guards() {
        let (guard, guard_calls) = counting_guard(true);
        let mut stages = StageRegistry::new();
        stages
            .use_middleware(crate::stage::middleware_fn(|_, _| async {
                Err::<(), BoxError>("rate limited".into())
            }))
            .use_guard(Scope::global(), guard);
        let h = harness(Dice::default(), stages);

        let results = h.source.emit_and_wait("roll", event_args![{"d": 6}]).await;

        assert!(matches!(results[0], Err(StageError::Middleware(_))));
        assert_eq!(guard_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.dice.call_count(), 0);
    }

    #[tokio::test]
    async fn test_one_shot_delivered_once_under_concurrent_emits() {
        let h = harness(Dice::default(), StageRegistry::new());

        let delivered = h.source.emit("ready", EventArgs::empty())
            + h.source.emit("ready", EventArgs::empty());
        assert_eq!(delivered, 1);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(h.dice.call_count(), 1);
    }

    #[tokio::test]
    async fn test_guard_reads_raw_args() {
        let mut stages = StageRegistry::new();
        stages.use_guard(
            Scope::method("Dice", "roll"),
            guard_fn(|ctx| {
                ctx.event_args().first().and_then(|v| v.get("d")) != Some(&Value::Null)
            }),
        );

        let source = Arc::new(RecordingSource::default());
        let dice = Arc::new(Dice::default());
        let explorer = EventExplorer::new(
            metadata_for(dice.as_ref()),
            Arc::clone(&source) as Arc<dyn EventSource>,
            Arc::new(stages),
        );
        let instance: Arc<dyn Controller> = Arc::clone(&dice) as Arc<dyn Controller>;
        explorer.explore(&instance, "roll").unwrap();

        let callback = source.callback(0);
        callback(event_args![{"d": null}]).await.unwrap();
        callback(event_args![{"d": 4}]).await.unwrap();

        assert_eq!(dice.call_count(), 1);
    }
}
