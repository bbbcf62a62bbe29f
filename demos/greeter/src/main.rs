//! Greeter Example
//!
//! A single controller wired through every stage of the Herald pipeline,
//! driven by the built-in local event source.
//!
//! ```text
//! ready          ──▶ Greeter::on_ready   (once)
//! messageCreate  ──▶ Greeter::greet      (on, GreetOptions descriptor)
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package greeter -- --name ada --times 2
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use clap::Parser;
use herald::core::ValidationError;
use herald::prelude::*;
use herald::runtime::RuntimeBuilder;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Greets whoever posts a message")]
struct Args {
    /// Configuration file (defaults to herald.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name carried by the demo message
    #[arg(short, long, default_value = "ada")]
    name: String,

    /// How many times to greet
    #[arg(short, long, default_value_t = 1)]
    times: u32,
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug, Dto, Deserialize)]
#[dto(name = "Greet", crate = "herald::core")]
struct GreetOptions {
    #[option(description = "Who to greet", required)]
    name: String,
    #[option(name = "times", description = "How many times")]
    repeat: Option<u32>,
}

const HANDLERS: &[HandlerDeclaration] = &[
    HandlerDeclaration::once("on_ready", "ready"),
    HandlerDeclaration::on("greet", "messageCreate"),
];

#[derive(Default)]
struct Greeter {
    greetings: AtomicUsize,
}

impl Greeter {
    fn greet(&self, args: &HandlerArgs) -> Result<(), BoxError> {
        let options: GreetOptions = args
            .transformed_as::<GreetOptions>()
            .transpose()?
            .ok_or_else(|| HandlerError::InvalidArguments("missing greeting payload".into()))?;
        let channel = args
            .context
            .collector("channel")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        for _ in 0..options.repeat.unwrap_or(1) {
            info!(channel, "Hello, {}!", options.name);
            self.greetings.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl Controller for Greeter {
    fn name(&self) -> &str {
        "Greeter"
    }

    fn methods(&self) -> &[&'static str] {
        &["on_ready", "greet"]
    }

    fn declarations(&self) -> &[HandlerDeclaration] {
        HANDLERS
    }

    fn descriptor(&self, method: &str) -> Option<Descriptor> {
        (method == "greet").then(GreetOptions::descriptor)
    }

    async fn invoke(&self, method: &str, args: HandlerArgs) -> Result<(), BoxError> {
        match method {
            "on_ready" => {
                info!("Greeter is ready");
                Ok(())
            }
            "greet" => self.greet(&args),
            _ => Err(HandlerError::unknown_method(self.name(), method).into()),
        }
    }
}

// ============================================================================
// Stages
// ============================================================================

fn configure(stages: &mut StageRegistry) {
    stages
        .use_middleware_with(
            middleware_fn(|event, args| async move {
                info!(event = %event, args = args.len(), "Incoming event");
                Ok(())
            }),
            MiddlewareOptions::all().deny(["ready"]),
        )
        .use_guard(
            Scope::owner("Greeter"),
            guard_fn(|ctx| {
                let from_bot = ctx
                    .event_args()
                    .first()
                    .and_then(|message| message.pointer("/author/bot"))
                    .and_then(Value::as_bool);
                from_bot != Some(true)
            }),
        )
        .use_pipe(Scope::global(), TransformPipe)
        .use_pipe(Scope::global(), ValidationPipe)
        .use_collector(
            Scope::method("Greeter", "greet"),
            collector_fn("channel", |ctx| {
                ctx.event_args()
                    .first()
                    .and_then(|message| message.get("channel").cloned())
                    .unwrap_or(Value::Null)
            }),
        )
        .use_filter(
            Scope::global(),
            CatchFilter::new(|err: &ValidationError, ctx: &InvocationContext| {
                warn!(event = ctx.event(), %err, "Rejected malformed message");
                Propagation::Swallow
            }),
        );
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = RuntimeBuilder::new();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;

    let greeter = Arc::new(Greeter::default());
    runtime.register_controller(greeter.clone())?;
    runtime.configure_stages(configure)?;
    runtime.start().await?;

    for subscription in runtime.subscriptions() {
        info!(
            "{}.{} <- {} ({})",
            subscription.owner, subscription.method, subscription.event, subscription.mode
        );
    }

    let client = runtime
        .local_client()
        .ok_or_else(|| anyhow::anyhow!("runtime has no local event source"))?;

    client.emit_and_wait("ready", EventArgs::empty()).await;
    // One-shot: this second delivery finds no listener.
    client.emit_and_wait("ready", EventArgs::empty()).await;

    let messages = [
        json!({"name": args.name, "times": args.times, "channel": "general"}),
        json!({"name": "bot", "channel": "general", "author": {"bot": true}}),
        json!({"times": "many", "channel": "general"}),
    ];
    for message in messages {
        for result in client
            .emit_and_wait("messageCreate", EventArgs::new([message]))
            .await
        {
            if let Err(e) = result {
                warn!(stage = e.stage(), error = %e, "Dispatch failed");
            }
        }
    }

    info!(
        greetings = greeter.greetings.load(Ordering::SeqCst),
        "Done"
    );
    runtime.stop().await?;
    Ok(())
}
