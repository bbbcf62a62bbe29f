//! Structural descriptors of handler arguments.
//!
//! A [`Descriptor`] is the type hint a handler declares for its primary
//! argument: the list of options it expects, their wire names, kinds and
//! constraints. It is built once when the handler is subscribed and shared,
//! unmodified, by every later dispatch as the coercion target of the pipe
//! stage.
//!
//! Descriptors are usually derived:
//!
//! ```rust,ignore
//! use herald_macros::Dto;
//!
//! #[derive(Dto, serde::Deserialize)]
//! struct Greeting {
//!     #[option(description = "Who to greet", required)]
//!     name: String,
//!     #[option(name = "times", kind = "integer")]
//!     repeat: Option<i64>,
//! }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ValidationError, Violation};

/// The value kind an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
}

impl OptionKind {
    /// Parses a kind from its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "integer" | "int" => Self::Integer,
            "number" | "float" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "user" => Self::User,
            "channel" => Self::Channel,
            "role" => Self::Role,
            "mentionable" => Self::Mentionable,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Mentionable => "mentionable",
        }
    }

    /// Returns `true` if `value` already has this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            // Entities are referenced by snowflake, either bare or as an object with an `id`.
            Self::User | Self::Channel | Self::Role | Self::Mentionable => match value {
                Value::String(s) => is_snowflake(s),
                Value::Number(n) => n.is_u64(),
                Value::Object(map) => map.contains_key("id"),
                _ => false,
            },
        }
    }

    /// Converts `value` towards this kind where a lossless conversion exists.
    ///
    /// Values that cannot be converted are returned unchanged so that a later
    /// validation step can report them.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (Self::String, Value::Number(n)) => Value::String(n.to_string()),
            (Self::String, Value::Bool(b)) => Value::String(b.to_string()),
            (Self::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => Value::String(s),
            },
            // Whole floats only, and only inside the i64 range; `as` would saturate.
            (Self::Integer, Value::Number(n)) => match n.as_f64() {
                Some(f)
                    if n.is_f64()
                        && f.fract() == 0.0
                        && f >= i64::MIN as f64
                        && f < i64::MAX as f64 =>
                {
                    Value::from(f as i64)
                }
                _ => Value::Number(n),
            },
            (Self::Number, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::String(s)),
                Err(_) => Value::String(s),
            },
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (Self::User | Self::Channel | Self::Role | Self::Mentionable, Value::Number(n))
                if n.is_u64() =>
            {
                Value::String(n.to_string())
            }
            (_, value) => value,
        }
    }
}

fn is_snowflake(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// A fixed choice offered for an option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: Value,
}

/// One option of a [`Descriptor`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionDescriptor {
    /// The field name on the handler's argument type.
    pub property: String,
    /// The name the option carries on the wire.
    pub name: String,
    pub description: String,
    pub required: bool,
    pub kind: OptionKind,
    /// Allowed values; empty means unrestricted.
    pub choices: Vec<OptionChoice>,
    /// Allowed channel types for [`OptionKind::Channel`] options.
    pub channel_types: Vec<String>,
}

impl OptionDescriptor {
    /// Creates an optional option whose wire name equals its property name.
    pub fn new(property: impl Into<String>, kind: OptionKind) -> Self {
        let property = property.into();
        Self {
            name: property.clone(),
            property,
            description: String::new(),
            required: false,
            kind,
            choices: Vec::new(),
            channel_types: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.choices.push(OptionChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn channel_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Reads this option out of a payload object, by wire name first and then
    /// by property name.
    fn lookup<'a>(&self, source: &'a Map<String, Value>) -> Option<&'a Value> {
        source
            .get(&self.name)
            .or_else(|| source.get(&self.property))
            .filter(|v| !v.is_null())
    }

    fn check(&self, value: &Value, violations: &mut Vec<Violation>) {
        if !self.kind.matches(value) {
            violations.push(Violation::new(
                &self.name,
                format!("expected {}, got {}", self.kind.as_str(), type_of(value)),
            ));
            return;
        }

        if !self.choices.is_empty() && !self.choices.iter().any(|c| &c.value == value) {
            let allowed: Vec<String> = self.choices.iter().map(|c| c.value.to_string()).collect();
            violations.push(Violation::new(
                &self.name,
                format!("must be one of [{}]", allowed.join(", ")),
            ));
        }

        // A restricted channel must carry its `type`; bare snowflakes cannot be checked.
        if self.kind == OptionKind::Channel && !self.channel_types.is_empty() {
            match value.get("type").and_then(Value::as_str) {
                Some(channel_type) if self.channel_types.iter().any(|t| t == channel_type) => {}
                Some(channel_type) => violations.push(Violation::new(
                    &self.name,
                    format!("channel type '{channel_type}' is not allowed"),
                )),
                None => violations.push(Violation::new(
                    &self.name,
                    format!(
                        "channel type is missing, expected one of [{}]",
                        self.channel_types.join(", ")
                    ),
                )),
            }
        }
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The structural type hint of a handler's primary argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    type_name: String,
    options: Vec<OptionDescriptor>,
}

impl Descriptor {
    /// Creates a descriptor with no options.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            options: Vec::new(),
        }
    }

    /// Adds an option (builder pattern).
    pub fn option(mut self, option: OptionDescriptor) -> Self {
        self.options.push(option);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn options(&self) -> &[OptionDescriptor] {
        &self.options
    }

    /// Finds an option by its wire name.
    pub fn find(&self, name: &str) -> Option<&OptionDescriptor> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Locates the payload object inside a pipe value.
    ///
    /// A bare object is its own payload. For the raw argument array the
    /// first object argument is used.
    pub fn payload<'a>(&self, value: &'a Value) -> Option<&'a Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            Value::Array(items) => items.iter().find_map(Value::as_object),
            _ => None,
        }
    }

    /// Shapes `value` into an object keyed by property names, coercing every
    /// present option to its declared kind.
    ///
    /// Options missing from the payload are left out of the result.
    pub fn coerce(&self, value: &Value) -> Value {
        let mut shaped = Map::new();
        if let Some(source) = self.payload(value) {
            for option in &self.options {
                if let Some(v) = option.lookup(source) {
                    shaped.insert(option.property.clone(), option.kind.coerce(v.clone()));
                }
            }
        }
        Value::Object(shaped)
    }

    /// Checks `value` against every option, collecting all violations.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let empty = Map::new();
        let source = self.payload(value).unwrap_or(&empty);
        let mut violations = Vec::new();

        for option in &self.options {
            match option.lookup(source) {
                Some(v) => option.check(v, &mut violations),
                None if option.required => {
                    violations.push(Violation::new(&option.name, "is required"));
                }
                None => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                type_name: self.type_name.clone(),
                violations,
            })
        }
    }
}

/// Types that describe their own shape as a [`Descriptor`].
///
/// Implemented by `#[derive(Dto)]`.
pub trait Dto {
    fn descriptor() -> Descriptor;
}
