//! Subscriptions binding handler methods to client events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How long a subscription stays attached to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// Every occurrence of the event is delivered (client `on`).
    Continuous,
    /// At most one occurrence is delivered (client `once`).
    OneShot,
}

impl SubscriptionMode {
    /// Returns the client-side verb for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "on",
            Self::OneShot => "once",
        }
    }
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The binding between one handler method and one client event.
///
/// Created exactly once per `(owner, method)` pair that declares event
/// metadata, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Subscription {
    /// Name of the controller owning the handler.
    pub owner: String,
    /// The handler method.
    pub method: String,
    /// The client event the handler is bound to.
    pub event: String,
    /// Delivery mode.
    pub mode: SubscriptionMode,
}

impl Subscription {
    pub fn new(
        owner: impl Into<String>,
        method: impl Into<String>,
        event: impl Into<String>,
        mode: SubscriptionMode,
    ) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
            event: event.into(),
            mode,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} -> {}({})",
            self.owner, self.method, self.mode, self.event
        )
    }
}
