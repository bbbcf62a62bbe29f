//! Per-dispatch contexts.
//!
//! Every event occurrence gets its own set of contexts; nothing here is shared
//! between two dispatches:
//!
//! - [`InvocationContext`]: what is being dispatched, i.e. the owning controller,
//!   the handler method, the event and its raw arguments. Stages receive it by
//!   reference. When the chain fails, the failure is stored in it before the
//!   exception filters run.
//!
//! - [`ExecutionContext`]: the named values produced by the collector stage,
//!   handed to the handler as its trailing argument.
//!
//! - [`HandlerArgs`]: the assembled argument list of one handler call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::controller::Controller;
use herald_core::{EventArgs, StageError};

// =============================================================================
// InvocationContext
// =============================================================================

/// Describes the dispatch currently running through the chain.
pub struct InvocationContext {
    instance: Arc<dyn Controller>,
    method_name: Arc<str>,
    event: Arc<str>,
    event_args: EventArgs,
    exception: Option<StageError>,
}

impl InvocationContext {
    pub(crate) fn new(
        instance: Arc<dyn Controller>,
        method_name: Arc<str>,
        event: Arc<str>,
        event_args: EventArgs,
    ) -> Self {
        Self {
            instance,
            method_name,
            event,
            event_args,
            exception: None,
        }
    }

    /// Returns the controller owning the handler.
    pub fn instance(&self) -> &Arc<dyn Controller> {
        &self.instance
    }

    /// Returns the owning controller's name.
    pub fn owner(&self) -> &str {
        self.instance.name()
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns the raw arguments exactly as delivered by the client.
    pub fn event_args(&self) -> &EventArgs {
        &self.event_args
    }

    /// Returns the failure being filtered, if the chain failed.
    pub fn exception(&self) -> Option<&StageError> {
        self.exception.as_ref()
    }

    pub(crate) fn set_exception(&mut self, exception: StageError) {
        self.exception = Some(exception);
    }

    pub(crate) fn take_exception(&mut self) -> Option<StageError> {
        self.exception.take()
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("owner", &self.owner())
            .field("method_name", &self.method_name)
            .field("event", &self.event)
            .field("event_args", &self.event_args)
            .field("exception", &self.exception)
            .finish()
    }
}

// =============================================================================
// ExecutionContext
// =============================================================================

/// Values gathered by the collector stage for one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    /// Collected values keyed by collector name.
    pub collectors: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(collectors: HashMap<String, Value>) -> Self {
        Self { collectors }
    }

    /// Returns the value produced by the collector named `name`.
    pub fn collector(&self, name: &str) -> Option<&Value> {
        self.collectors.get(name)
    }

    /// Deserializes the value produced by the collector named `name`.
    pub fn collector_as<T: DeserializeOwned>(&self, name: &str) -> Option<serde_json::Result<T>> {
        self.collectors
            .get(name)
            .map(|value| serde_json::from_value(value.clone()))
    }
}

// =============================================================================
// HandlerArgs
// =============================================================================

/// The arguments of one handler call.
///
/// When the handler declared a descriptor the call receives the transformed
/// value **followed by all raw arguments**, then the execution context. The
/// raw arguments are not replaced by the transformed value. Without a
/// descriptor only the raw arguments and the execution context are passed.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerArgs {
    /// Output of the pipe chain; `Some` only when a descriptor exists.
    pub transformed: Option<Value>,
    /// The raw event arguments.
    pub raw: EventArgs,
    /// Trailing execution context.
    pub context: ExecutionContext,
}

impl HandlerArgs {
    pub fn new(transformed: Option<Value>, raw: EventArgs, context: ExecutionContext) -> Self {
        Self {
            transformed,
            raw,
            context,
        }
    }

    /// Returns the positional arguments in call order, without the trailing
    /// execution context.
    pub fn positional(&self) -> Vec<Value> {
        self.transformed
            .iter()
            .cloned()
            .chain(self.raw.iter().cloned())
            .collect()
    }

    /// Deserializes the transformed value into the handler's argument type.
    pub fn transformed_as<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.transformed
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_with_transformed_keeps_raw() {
        let args = HandlerArgs::new(
            Some(json!({"name": "ada"})),
            EventArgs::new([json!({"name": "ada", "extra": 1}), json!(2)]),
            ExecutionContext::default(),
        );

        // The transformed value is prepended; raw arguments are all still there.
        assert_eq!(
            args.positional(),
            vec![json!({"name": "ada"}), json!({"name": "ada", "extra": 1}), json!(2)]
        );
    }

    #[test]
    fn test_positional_without_transformed() {
        let args = HandlerArgs::new(None, EventArgs::new([json!(1)]), ExecutionContext::default());
        assert_eq!(args.positional(), vec![json!(1)]);
        assert!(args.transformed_as::<Value>().is_none());
    }

    #[test]
    fn test_collector_lookup() {
        let ctx = ExecutionContext::new(HashMap::from([("count".to_string(), json!(3))]));
        assert_eq!(ctx.collector("count"), Some(&json!(3)));
        assert_eq!(ctx.collector_as::<u8>("count").unwrap().unwrap(), 3);
        assert!(ctx.collector("missing").is_none());
    }
}
