//! Handler metadata registry.
//!
//! Handler declarations are collected once at startup into a
//! [`MetadataTable`], keyed by `(owner, method)`. The dispatch orchestrator
//! only ever reads it through the [`MetadataProvider`] contract, so other
//! storage strategies can be plugged in without touching the pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_core::MetadataTable;
//!
//! let mut table = MetadataTable::new();
//! table
//!     .on("Greeter", "on_message", "messageCreate")
//!     .once("Greeter", "on_ready", "ready");
//! ```

use std::collections::HashMap;

use tracing::warn;

use crate::subscription::SubscriptionMode;

/// Identifies a handler method: the owning controller name and the method name.
///
/// The owner is a controller name, so every instance reporting that name
/// resolves to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub owner: String,
    pub method: String,
}

impl HandlerKey {
    pub fn new(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
        }
    }
}

/// Metadata attached to an event handler declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    /// The client event name.
    pub event: String,
}

impl EventMetadata {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
        }
    }
}

/// Read-only lookup of handler metadata.
///
/// Implementations must be pure: the same `(owner, method)` always yields the
/// same answer once the application has started.
pub trait MetadataProvider: Send + Sync {
    /// Returns the continuous (`on`) metadata of a method, if declared.
    fn on_event_metadata(&self, owner: &str, method: &str) -> Option<EventMetadata>;

    /// Returns the one-shot (`once`) metadata of a method, if declared.
    fn once_event_metadata(&self, owner: &str, method: &str) -> Option<EventMetadata>;
}

/// A static handler declaration, usually written next to a controller.
///
/// ```rust,ignore
/// const HANDLERS: &[HandlerDeclaration] = &[
///     HandlerDeclaration::on("on_message", "messageCreate"),
///     HandlerDeclaration::once("on_ready", "ready"),
/// ];
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerDeclaration {
    /// The handler method name.
    pub method: &'static str,
    /// The client event name.
    pub event: &'static str,
    /// Requested delivery mode.
    pub mode: SubscriptionMode,
}

impl HandlerDeclaration {
    /// Declares a continuous handler.
    pub const fn on(method: &'static str, event: &'static str) -> Self {
        Self {
            method,
            event,
            mode: SubscriptionMode::Continuous,
        }
    }

    /// Declares a one-shot handler.
    pub const fn once(method: &'static str, event: &'static str) -> Self {
        Self {
            method,
            event,
            mode: SubscriptionMode::OneShot,
        }
    }
}

/// The explicit registration table built at startup.
///
/// Continuous and one-shot metadata are stored separately, exactly like two
/// distinct decorators would be; a method may carry both, in which case the
/// orchestrator's lookup precedence decides.
#[derive(Debug, Default, Clone)]
pub struct MetadataTable {
    on: HashMap<HandlerKey, EventMetadata>,
    once: HashMap<HandlerKey, EventMetadata>,
}

impl MetadataTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `owner::method` as a continuous handler of `event`.
    pub fn on(
        &mut self,
        owner: impl Into<String>,
        method: impl Into<String>,
        event: impl Into<String>,
    ) -> &mut Self {
        let key = HandlerKey::new(owner, method);
        let metadata = EventMetadata::new(event);
        if let Some(prev) = self.on.insert(key.clone(), metadata) {
            warn!(
                owner = %key.owner,
                method = %key.method,
                previous = %prev.event,
                "Continuous handler metadata declared twice, last declaration wins"
            );
        }
        self
    }

    /// Declares `owner::method` as a one-shot handler of `event`.
    pub fn once(
        &mut self,
        owner: impl Into<String>,
        method: impl Into<String>,
        event: impl Into<String>,
    ) -> &mut Self {
        let key = HandlerKey::new(owner, method);
        let metadata = EventMetadata::new(event);
        if let Some(prev) = self.once.insert(key.clone(), metadata) {
            warn!(
                owner = %key.owner,
                method = %key.method,
                previous = %prev.event,
                "One-shot handler metadata declared twice, last declaration wins"
            );
        }
        self
    }

    /// Records a batch of static declarations for one owner.
    pub fn declare(&mut self, owner: &str, declarations: &[HandlerDeclaration]) -> &mut Self {
        for decl in declarations {
            match decl.mode {
                SubscriptionMode::Continuous => self.on(owner, decl.method, decl.event),
                SubscriptionMode::OneShot => self.once(owner, decl.method, decl.event),
            };
        }
        self
    }

    /// Returns the number of declared entries across both modes.
    pub fn len(&self) -> usize {
        self.on.len() + self.once.len()
    }

    /// Returns `true` if nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.on.is_empty() && self.once.is_empty()
    }
}

impl MetadataProvider for MetadataTable {
    fn on_event_metadata(&self, owner: &str, method: &str) -> Option<EventMetadata> {
        self.on.get(&HandlerKey::new(owner, method)).cloned()
    }

    fn once_event_metadata(&self, owner: &str, method: &str) -> Option<EventMetadata> {
        self.once.get(&HandlerKey::new(owner, method)).cloned()
    }
}
