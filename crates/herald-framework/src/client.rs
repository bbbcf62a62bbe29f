//! In-process event source.
//!
//! [`LocalEventSource`] is the client used when the application raises events
//! itself, and by the runtime when no external client is configured. Every
//! delivery runs as its own tokio task, so overlapping occurrences of an event
//! are processed concurrently.

use std::collections::HashMap;

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, error};

use herald_core::{
    DispatchResult, EventArgs, EventCallback, EventSource, StageError, SubscriptionMode,
};

struct Listener {
    mode: SubscriptionMode,
    callback: EventCallback,
}

/// An event source driven by [`emit`](Self::emit) calls.
///
/// One-shot listeners are detached before their first delivery starts, so
/// they are delivered at most once even when the event is emitted
/// concurrently.
#[derive(Default)]
pub struct LocalEventSource {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl LocalEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of listeners attached to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Detaches every listener.
    pub fn clear(&self) {
        let mut listeners = self.listeners.write();
        let count: usize = listeners.values().map(Vec::len).sum();
        listeners.clear();
        debug!(count, "Cleared event listeners");
    }

    /// Returns the callbacks due for one occurrence of `event`, retiring the
    /// one-shot listeners among them.
    fn take_due(&self, event: &str) -> Vec<EventCallback> {
        let mut listeners = self.listeners.write();
        let Some(attached) = listeners.get_mut(event) else {
            return Vec::new();
        };

        let due = attached.iter().map(|l| l.callback.clone()).collect();
        attached.retain(|l| l.mode == SubscriptionMode::Continuous);
        if attached.is_empty() {
            listeners.remove(event);
        }
        due
    }

    /// Delivers one occurrence of `event` without waiting for the listeners.
    ///
    /// Each listener runs in its own task; failures propagated by a listener
    /// are logged. Returns the number of listeners the event was delivered to.
    ///
    /// Must be called from within a tokio runtime.
    pub fn emit(&self, event: &str, args: EventArgs) -> usize {
        let due = self.take_due(event);
        let count = due.len();

        for callback in due {
            let args = args.clone();
            let event = event.to_string();
            tokio::spawn(async move {
                if let Err(e) = callback(args).await {
                    error!(event = %event, stage = e.stage(), error = %e, "Event listener failed");
                }
            });
        }

        count
    }

    /// Delivers one occurrence of `event` and waits for every listener.
    ///
    /// Returns each listener's outcome in attachment order. A listener task
    /// that panicked is reported as a handler failure.
    pub async fn emit_and_wait(&self, event: &str, args: EventArgs) -> Vec<DispatchResult> {
        let handles: Vec<_> = self
            .take_due(event)
            .into_iter()
            .map(|callback| tokio::spawn(callback(args.clone())))
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| Err(StageError::Handler(Box::new(e)))))
            .collect()
    }
}

impl EventSource for LocalEventSource {
    fn subscribe(&self, event: &str, mode: SubscriptionMode, callback: EventCallback) {
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Listener { mode, callback });
    }
}

impl std::fmt::Debug for LocalEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("LocalEventSource")
            .field("event_count", &listeners.len())
            .field(
                "listener_count",
                &listeners.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use herald_core::event_args;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(calls: &Arc<AtomicUsize>) -> EventCallback {
        let calls = Arc::clone(calls);
        Arc::new(move |_args: EventArgs| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, StageError>(()) }.boxed()
        })
    }

    #[tokio::test]
    async fn test_continuous_listener_sees_every_occurrence() {
        let source = LocalEventSource::new();
        let calls = Arc::new(AtomicUsize::new(0));
        source.subscribe("tick", SubscriptionMode::Continuous, counting(&calls));

        source.emit_and_wait("tick", EventArgs::empty()).await;
        source.emit_and_wait("tick", EventArgs::empty()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.listener_count("tick"), 1);
    }

    #[tokio::test]
    async fn test_one_shot_listener_delivered_at_most_once() {
        let source = LocalEventSource::new();
        let calls = Arc::new(AtomicUsize::new(0));
        source.subscribe("ready", SubscriptionMode::OneShot, counting(&calls));

        assert_eq!(source.emit_and_wait("ready", EventArgs::empty()).await.len(), 1);
        assert!(source.emit_and_wait("ready", EventArgs::empty()).await.is_empty());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.listener_count("ready"), 0);
    }

    #[tokio::test]
    async fn test_emit_passes_args_and_reports_failures() {
        let source = LocalEventSource::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        source.subscribe(
            "messageCreate",
            SubscriptionMode::Continuous,
            Arc::new(move |args: EventArgs| {
                sink.lock().push(args.clone());
                async { Err::<(), _>(StageError::Handler("nope".into())) }.boxed()
            }),
        );

        let results = source
            .emit_and_wait("messageCreate", event_args!["hello", 1])
            .await;

        assert!(matches!(results.as_slice(), [Err(StageError::Handler(_))]));
        assert_eq!(*seen.lock(), vec![event_args!["hello", 1]]);
    }

    #[tokio::test]
    async fn test_emit_without_listeners_and_clear() {
        let source = LocalEventSource::new();
        assert_eq!(source.emit("nobody", EventArgs::empty()), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        source.subscribe("a", SubscriptionMode::Continuous, counting(&calls));
        source.subscribe("b", SubscriptionMode::OneShot, counting(&calls));
        source.clear();

        assert_eq!(source.listener_count("a"), 0);
        assert_eq!(source.listener_count("b"), 0);
    }
}
