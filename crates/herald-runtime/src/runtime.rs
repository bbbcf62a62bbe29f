//! Application lifecycle: registration, startup exploration and shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! // Auto-loads herald.toml from the current directory
//! let runtime = HeraldRuntime::new();
//!
//! // Custom configuration path
//! let runtime = HeraldRuntime::builder()
//!     .config_file("config/herald.toml")
//!     .build()?;
//!
//! runtime.register_controller(Arc::new(Greeter))?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, HeraldConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use herald_core::{EventSource, MetadataTable, Subscription};
use herald_framework::{
    Controller, EventExplorer, LocalEventSource, LoggingFilter, Scope, StageRegistry,
    TracingMiddleware,
};

/// The Herald application shell.
///
/// Controllers, handler metadata and stages are registered first. The first
/// [`start`] freezes the registration tables; every start subscribes each
/// declared handler to the client exactly once, and [`stop`] retires those
/// subscriptions.
///
/// A runtime on the built-in client can be started again after a stop. With
/// an external client the listeners cannot be detached, so a second start is
/// rejected with [`RuntimeError::NotRestartable`].
///
/// [`start`]: Self::start
/// [`stop`]: Self::stop
pub struct HeraldRuntime {
    config: HeraldConfig,
    client: Arc<dyn EventSource>,
    /// Set when the client is the built-in [`LocalEventSource`].
    local: Option<Arc<LocalEventSource>>,
    controllers: RwLock<Vec<Arc<dyn Controller>>>,
    metadata: RwLock<MetadataTable>,
    stages: RwLock<StageRegistry>,
    /// Set by the first `start`; its presence closes registration.
    frozen: RwLock<Option<FrozenTables>>,
    /// Rebuilt by every `start` and dropped by `stop`.
    explorer: RwLock<Option<Arc<EventExplorer>>>,
    running: Mutex<bool>,
    shutdown: Mutex<CancellationToken>,
}

type FrozenTables = (Arc<MetadataTable>, Arc<StageRegistry>);

impl HeraldRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory, falling back to defaults.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                HeraldConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime driven by an in-process [`LocalEventSource`].
    ///
    /// Initializes logging from `config.logging` unless a subscriber is
    /// already installed.
    pub fn from_config(config: &HeraldConfig) -> Self {
        let local = Arc::new(LocalEventSource::new());
        let client: Arc<dyn EventSource> = local.clone();
        Self::assemble(config, client, Some(local))
    }

    /// Creates a runtime delivering events from an external client.
    pub fn with_client(config: &HeraldConfig, client: Arc<dyn EventSource>) -> Self {
        Self::assemble(config, client, None)
    }

    fn assemble(
        config: &HeraldConfig,
        client: Arc<dyn EventSource>,
        local: Option<Arc<LocalEventSource>>,
    ) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            local_client = local.is_some(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            client,
            local,
            controllers: RwLock::new(Vec::new()),
            metadata: RwLock::new(MetadataTable::new()),
            stages: RwLock::new(StageRegistry::new()),
            frozen: RwLock::new(None),
            explorer: RwLock::new(None),
            running: Mutex::new(false),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// The built-in client, when the runtime was not given an external one.
    ///
    /// Use it to raise events from within the application.
    pub fn local_client(&self) -> Option<&Arc<LocalEventSource>> {
        self.local.as_ref()
    }

    /// A token cancelled when the runtime stops.
    ///
    /// Starting a stopped runtime installs a fresh token, so fetch it again
    /// after a restart.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    fn is_frozen(&self) -> bool {
        self.frozen.read().is_some()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a controller, copying its declarations into the metadata
    /// table.
    pub fn register_controller(&self, controller: Arc<dyn Controller>) -> RuntimeResult<()> {
        if self.is_frozen() {
            return Err(RuntimeError::AlreadyStarted(controller.name().to_string()));
        }

        let declarations = controller.declarations();
        if !declarations.is_empty() {
            self.metadata
                .write()
                .declare(controller.name(), declarations);
        }

        debug!(
            owner = controller.name(),
            methods = controller.methods().len(),
            declarations = declarations.len(),
            "Registered controller"
        );
        self.controllers.write().push(controller);
        Ok(())
    }

    /// Edits the handler metadata table before startup.
    pub fn configure_metadata<R>(
        &self,
        f: impl FnOnce(&mut MetadataTable) -> R,
    ) -> RuntimeResult<R> {
        if self.is_frozen() {
            return Err(RuntimeError::Frozen);
        }
        Ok(f(&mut self.metadata.write()))
    }

    /// Edits the stage registry before startup.
    ///
    /// ```rust,ignore
    /// runtime.configure_stages(|stages| {
    ///     stages
    ///         .use_guard(Scope::global(), guard_fn(|_| true))
    ///         .use_filter(Scope::owner("Greeter"), LoggingFilter);
    /// })?;
    /// ```
    pub fn configure_stages<R>(
        &self,
        f: impl FnOnce(&mut StageRegistry) -> R,
    ) -> RuntimeResult<R> {
        if self.is_frozen() {
            return Err(RuntimeError::Frozen);
        }
        Ok(f(&mut self.stages.write()))
    }

    /// Returns the subscriptions of the current run, in creation order.
    ///
    /// Empty before the first start and after a stop.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.explorer
            .read()
            .as_ref()
            .map(|explorer| explorer.subscriptions())
            .unwrap_or_default()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Freezes the metadata table and stage registry on first use and
    /// returns the frozen copies afterwards.
    fn freeze(&self) -> FrozenTables {
        let mut frozen = self.frozen.write();
        if let Some((metadata, stages)) = frozen.as_ref() {
            return (Arc::clone(metadata), Arc::clone(stages));
        }

        let mut stages = std::mem::take(&mut *self.stages.write());
        if self.config.dispatch.trace_events {
            stages.use_middleware(TracingMiddleware);
        }
        if self.config.dispatch.log_unhandled {
            stages.use_filter(Scope::global(), LoggingFilter);
        }
        debug!(stages = ?stages, "Stage registry frozen");

        let tables = (Arc::new(self.metadata.read().clone()), Arc::new(stages));
        *frozen = Some((Arc::clone(&tables.0), Arc::clone(&tables.1)));
        tables
    }

    /// Builds a fresh explorer and binds every registered controller.
    fn bind(&self) -> Arc<EventExplorer> {
        let (metadata, stages) = self.freeze();
        let explorer = Arc::new(EventExplorer::new(metadata, Arc::clone(&self.client), stages));

        for controller in self.controllers.read().iter() {
            explorer.explore_all(controller);
        }
        explorer
    }

    /// Starts the runtime, subscribing every declared handler.
    ///
    /// Starting a running runtime is a no-op. Starting a stopped one binds
    /// the handlers again and installs a fresh shutdown token.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.lock();
            if *running {
                warn!("Runtime is already running");
                return Ok(());
            }
            if self.local.is_none() && self.is_frozen() {
                return Err(RuntimeError::NotRestartable);
            }
            *running = true;
        }

        info!("Starting Herald runtime");

        {
            let mut shutdown = self.shutdown.lock();
            if shutdown.is_cancelled() {
                *shutdown = CancellationToken::new();
            }
        }

        let bound = self.bind();
        info!(
            controllers = self.controllers.read().len(),
            subscriptions = bound.subscriptions().len(),
            "Handlers subscribed"
        );
        *self.explorer.write() = Some(bound);

        info!("Runtime started");
        Ok(())
    }

    /// Stops the runtime.
    ///
    /// Detaches every listener of the built-in client, retires the current
    /// subscriptions and cancels the shutdown token.
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.lock();
            if !*running {
                warn!("Runtime is not running");
                return Ok(());
            }
            *running = false;
        }

        info!("Stopping Herald runtime");

        if let Some(local) = &self.local {
            local.clear();
        }
        self.explorer.write().take();
        self.shutdown.lock().cancel();

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs the runtime until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;

        info!("Herald runtime is now running. Press Ctrl+C to stop.");

        let waited = self.wait_for_shutdown().await;
        self.stop().await?;
        waited
    }

    /// Runs the runtime until `shutdown` completes or [`stop`](Self::stop)
    /// is called.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        let token = self.shutdown_token();

        tokio::select! {
            () = shutdown => {}
            () = token.cancelled() => {}
        }

        self.stop().await
    }

    /// Waits for Ctrl+C, SIGTERM or a cancelled shutdown token.
    async fn wait_for_shutdown(&self) -> RuntimeResult<()> {
        let token = self.shutdown_token();

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

            tokio::select! {
                result = signal::ctrl_c() => {
                    result?;
                    info!("Received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
                () = token.cancelled() => {}
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = signal::ctrl_c() => {
                    result?;
                    info!("Received Ctrl+C, shutting down");
                }
                () = token.cancelled() => {}
            }
        }

        Ok(())
    }
}

impl Default for HeraldRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("controller_count", &self.controllers.read().len())
            .field("metadata_count", &self.metadata.read().len())
            .field("local_client", &self.local.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `HeraldRuntime` with custom configuration.
///
/// ```rust,ignore
/// let runtime = HeraldRuntime::builder()
///     .config_file("config/herald.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    client: Option<Arc<dyn EventSource>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            client: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Delivers events from `client` instead of the built-in local source.
    pub fn client(mut self, client: Arc<dyn EventSource>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = self.config_loader.load()?;
        Ok(match self.client {
            Some(client) => HeraldRuntime::with_client(&config, client),
            None => HeraldRuntime::from_config(&config),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("external_client", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::DispatchConfig;
    use herald_core::{
        BoxError, EventArgs, EventCallback, HandlerDeclaration, HandlerError, StageError,
        SubscriptionMode, event_args,
    };
    use herald_framework::{HandlerArgs, guard_fn};

    const DECLARATIONS: &[HandlerDeclaration] = &[
        HandlerDeclaration::on("greet", "message"),
        HandlerDeclaration::once("on_ready", "ready"),
        HandlerDeclaration::on("explode", "explode"),
    ];

    #[derive(Default)]
    struct Greeter {
        greeted: AtomicUsize,
        ready: AtomicUsize,
    }

    #[async_trait]
    impl Controller for Greeter {
        fn name(&self) -> &str {
            "Greeter"
        }

        fn methods(&self) -> &[&'static str] {
            &["greet", "on_ready", "explode", "helper"]
        }

        fn declarations(&self) -> &[HandlerDeclaration] {
            DECLARATIONS
        }

        async fn invoke(&self, method: &str, _args: HandlerArgs) -> Result<(), BoxError> {
            match method {
                "greet" => {
                    self.greeted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                "on_ready" => {
                    self.ready.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                "explode" => Err("kaboom".into()),
                _ => Err(HandlerError::unknown_method(self.name(), method).into()),
            }
        }
    }

    fn runtime_with(dispatch: DispatchConfig) -> HeraldRuntime {
        HeraldRuntime::from_config(&HeraldConfig {
            dispatch,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_start_subscribes_declared_handlers() {
        let runtime = runtime_with(DispatchConfig::default());
        let greeter = Arc::new(Greeter::default());
        runtime.register_controller(greeter.clone()).unwrap();

        assert!(runtime.subscriptions().is_empty());
        runtime.start().await.unwrap();

        let subscriptions = runtime.subscriptions();
        assert_eq!(subscriptions.len(), 3);
        assert_eq!(subscriptions[1].mode, SubscriptionMode::OneShot);

        let local = runtime.local_client().unwrap();
        let results = local
            .emit_and_wait("message", event_args![{"content": "hi"}])
            .await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(greeter.greeted.load(Ordering::SeqCst), 1);

        local.emit_and_wait("ready", EventArgs::empty()).await;
        local.emit_and_wait("ready", EventArgs::empty()).await;
        assert_eq!(greeter.ready.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registration_is_frozen_after_start() {
        let runtime = runtime_with(DispatchConfig::default());
        runtime.start().await.unwrap();

        let err = runtime
            .register_controller(Arc::new(Greeter::default()))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyStarted(ref name) if name == "Greeter"));
        assert!(matches!(
            runtime.configure_stages(|_| ()),
            Err(RuntimeError::Frozen)
        ));
        assert!(matches!(
            runtime.configure_metadata(|_| ()),
            Err(RuntimeError::Frozen)
        ));
    }

    #[tokio::test]
    async fn test_start_twice_binds_once() {
        let runtime = runtime_with(DispatchConfig::default());
        runtime.register_controller(Arc::new(Greeter::default())).unwrap();

        runtime.start().await.unwrap();
        runtime.start().await.unwrap();
        assert_eq!(runtime.subscriptions().len(), 3);
        assert_eq!(runtime.local_client().unwrap().listener_count("message"), 1);
    }

    #[tokio::test]
    async fn test_stop_then_start_rebinds_handlers() {
        let runtime = runtime_with(DispatchConfig::default());
        let greeter = Arc::new(Greeter::default());
        runtime.register_controller(greeter.clone()).unwrap();
        runtime
            .configure_stages(|stages| {
                stages.use_guard(
                    Scope::method("Greeter", "greet"),
                    guard_fn(|ctx| !ctx.event_args().is_empty()),
                );
            })
            .unwrap();
        let local = Arc::clone(runtime.local_client().unwrap());

        runtime.start().await.unwrap();
        local.emit_and_wait("ready", EventArgs::empty()).await;
        let first_token = runtime.shutdown_token();

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.subscriptions().is_empty());
        assert_eq!(local.listener_count("message"), 0);
        assert!(first_token.is_cancelled());
        assert!(matches!(
            runtime.configure_stages(|_| ()),
            Err(RuntimeError::Frozen)
        ));

        local.emit_and_wait("message", event_args!["lost"]).await;
        assert_eq!(greeter.greeted.load(Ordering::SeqCst), 0);

        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        assert_eq!(runtime.subscriptions().len(), 3);
        assert_eq!(local.listener_count("message"), 1);
        assert!(!runtime.shutdown_token().is_cancelled());

        // The frozen guard still applies after the restart.
        local.emit_and_wait("message", EventArgs::empty()).await;
        let results = local.emit_and_wait("message", event_args!["hi"]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(greeter.greeted.load(Ordering::SeqCst), 1);

        local.emit_and_wait("ready", EventArgs::empty()).await;
        assert_eq!(greeter.ready.load(Ordering::SeqCst), 2);

        runtime.run_until(async {}).await.unwrap();
        assert!(!runtime.is_running());
        assert!(runtime.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_configured_stages_apply() {
        let runtime = runtime_with(DispatchConfig::default());
        let greeter = Arc::new(Greeter::default());
        runtime.register_controller(greeter.clone()).unwrap();
        runtime
            .configure_stages(|stages| {
                stages.use_guard(
                    Scope::method("Greeter", "greet"),
                    guard_fn(|ctx| !ctx.event_args().is_empty()),
                );
            })
            .unwrap();
        runtime.start().await.unwrap();

        let local = runtime.local_client().unwrap();
        local.emit_and_wait("message", EventArgs::empty()).await;
        assert_eq!(greeter.greeted.load(Ordering::SeqCst), 0);

        local.emit_and_wait("message", event_args!["hi"]).await;
        assert_eq!(greeter.greeted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metadata_without_declarations() {
        struct Plain;

        #[async_trait]
        impl Controller for Plain {
            fn name(&self) -> &str {
                "Plain"
            }

            fn methods(&self) -> &[&'static str] {
                &["tick"]
            }

            async fn invoke(&self, _method: &str, _args: HandlerArgs) -> Result<(), BoxError> {
                Ok(())
            }
        }

        let runtime = runtime_with(DispatchConfig::default());
        runtime.register_controller(Arc::new(Plain)).unwrap();
        runtime
            .configure_metadata(|table| {
                table.on("Plain", "tick", "tick");
            })
            .unwrap();
        runtime.start().await.unwrap();

        let subscriptions = runtime.subscriptions();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].event, "tick");
    }

    #[tokio::test]
    async fn test_unhandled_failure_propagates_by_default() {
        let runtime = runtime_with(DispatchConfig::default());
        runtime.register_controller(Arc::new(Greeter::default())).unwrap();
        runtime.start().await.unwrap();

        let results = runtime
            .local_client()
            .unwrap()
            .emit_and_wait("explode", EventArgs::empty())
            .await;
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, StageError::Handler(_)));
        assert_eq!(err.to_string(), "handler failed: kaboom");
    }

    #[tokio::test]
    async fn test_log_unhandled_swallows_failures() {
        let runtime = runtime_with(DispatchConfig {
            log_unhandled: true,
            trace_events: true,
        });
        runtime.register_controller(Arc::new(Greeter::default())).unwrap();
        runtime.start().await.unwrap();

        let results = runtime
            .local_client()
            .unwrap()
            .emit_and_wait("explode", EventArgs::empty())
            .await;
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn test_external_client() {
        #[derive(Default)]
        struct Recording(parking_lot::Mutex<Vec<(String, SubscriptionMode)>>);

        impl EventSource for Recording {
            fn subscribe(&self, event: &str, mode: SubscriptionMode, _callback: EventCallback) {
                self.0.lock().push((event.to_string(), mode));
            }
        }

        let client = Arc::new(Recording::default());
        let runtime = HeraldRuntime::with_client(&HeraldConfig::default(), client.clone());
        runtime.register_controller(Arc::new(Greeter::default())).unwrap();
        runtime.start().await.unwrap();

        assert!(runtime.local_client().is_none());
        assert_eq!(
            *client.0.lock(),
            vec![
                ("message".to_string(), SubscriptionMode::Continuous),
                ("ready".to_string(), SubscriptionMode::OneShot),
                ("explode".to_string(), SubscriptionMode::Continuous),
            ]
        );

        runtime.stop().await.unwrap();
        assert!(matches!(
            runtime.start().await,
            Err(RuntimeError::NotRestartable)
        ));
        assert!(!runtime.is_running());
        assert!(runtime.subscriptions().is_empty());
        assert_eq!(client.0.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_run_until_stops_on_token() {
        let runtime = Arc::new(runtime_with(DispatchConfig::default()));
        let token = runtime.shutdown_token();

        let running = Arc::clone(&runtime);
        let task = tokio::spawn(async move {
            running
                .run_until(tokio::time::sleep(Duration::from_secs(30)))
                .await
        });

        while !runtime.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        runtime.stop().await.unwrap();
        assert!(token.is_cancelled());

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_until_future() {
        let runtime = runtime_with(DispatchConfig::default());
        runtime.run_until(async {}).await.unwrap();
        assert!(!runtime.is_running());
    }
}
