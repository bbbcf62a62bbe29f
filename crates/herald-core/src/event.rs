//! Raw event arguments as delivered by a client.
//!
//! Clients raise events with a variable number of positional arguments.
//! Herald keeps them as JSON values so that pipes can reshape them against a
//! handler's [`Descriptor`](crate::Descriptor) without knowing the concrete
//! client types.

use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// The positional arguments of one event occurrence.
///
/// Cloning is cheap: the values are shared behind an `Arc` and never mutated
/// after delivery.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventArgs(Arc<[Value]>);

impl EventArgs {
    /// Creates event arguments from any sequence of values.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self(values.into_iter().collect())
    }

    /// An argument list with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the argument at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserializes the argument at `index` into `T`.
    ///
    /// Returns `None` when the index is out of range.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Option<serde_json::Result<T>> {
        self.0
            .get(index)
            .map(|value| serde_json::from_value(value.clone()))
    }

    /// Returns the arguments as a JSON array.
    ///
    /// This is the seed value handed to the first pipe of a chain.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.to_vec())
    }
}

impl Deref for EventArgs {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Value>> for EventArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into())
    }
}

impl FromIterator<Value> for EventArgs {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds [`EventArgs`] from a list of `serde_json::json!`-style expressions.
///
/// ```rust,ignore
/// let args = event_args![{"content": "hi"}, 42];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! event_args {
    () => {
        $crate::EventArgs::empty()
    };
    ($($value:tt),+ $(,)?) => {
        $crate::EventArgs::new([$($crate::serde_json::json!($value)),+])
    };
}
