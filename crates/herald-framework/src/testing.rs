//! Fixtures shared by the framework's unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::context::{HandlerArgs, InvocationContext};
use crate::controller::Controller;
use crate::stage::{Guard, guard_fn};
use herald_core::{BoxError, EventArgs, StageError};

/// A controller with a single no-op handler.
pub(crate) struct Sample;

#[async_trait]
impl Controller for Sample {
    fn name(&self) -> &str {
        "Sample"
    }

    fn methods(&self) -> &[&'static str] {
        &["sample"]
    }

    async fn invoke(&self, _method: &str, _args: HandlerArgs) -> Result<(), BoxError> {
        Ok(())
    }
}

pub(crate) fn context_for(event: &str, args: EventArgs) -> InvocationContext {
    InvocationContext::new(Arc::new(Sample), Arc::from("sample"), Arc::from(event), args)
}

pub(crate) fn failing_context(event: &str, exception: StageError) -> InvocationContext {
    let mut ctx = context_for(event, EventArgs::empty());
    ctx.set_exception(exception);
    ctx
}

/// A guard answering `allow` and counting how often it was asked.
pub(crate) fn counting_guard(allow: bool) -> (impl Guard, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let guard = guard_fn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        allow
    });
    (guard, calls)
}
