//! Client event source contract.
//!
//! The external real-time client owns connection management and event
//! delivery. Herald only needs to attach callbacks to named events; the
//! client decides when and how concurrently they run, retires one-shot
//! subscriptions after their first delivery, and applies its own policy to
//! callbacks that fail.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::DispatchResult;
use crate::event::EventArgs;
use crate::subscription::SubscriptionMode;

/// The callback registered for one subscription.
///
/// Each call processes one event occurrence end to end. A returned error is a
/// failure that the exception filters chose to propagate.
pub type EventCallback = Arc<dyn Fn(EventArgs) -> BoxFuture<'static, DispatchResult> + Send + Sync>;

/// An external source of named events.
pub trait EventSource: Send + Sync {
    /// Attaches `callback` to `event`.
    ///
    /// For [`SubscriptionMode::OneShot`] the source must deliver at most one
    /// occurrence to the callback.
    fn subscribe(&self, event: &str, mode: SubscriptionMode, callback: EventCallback);
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    fn subscribe(&self, event: &str, mode: SubscriptionMode, callback: EventCallback) {
        (**self).subscribe(event, mode, callback);
    }
}
