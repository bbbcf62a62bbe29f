//! Unified error types for the Herald core.
//!
//! User-supplied stages and handlers fail with a [`BoxError`]. The dispatch
//! pipeline tags every such failure with the stage it came from by wrapping it
//! in a [`StageError`], so that exception filters can inspect both the origin
//! and the original error.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error type returned by stages and handlers.
pub type BoxError = Box<dyn StdError + Send + Sync>;

// =============================================================================
// Stage Errors
// =============================================================================

/// A failure raised somewhere inside a dispatch chain.
///
/// The variant records which stage raised the error; the payload is the
/// original error, reachable through [`StageError::inner`] or
/// [`StageError::downcast_ref`].
#[derive(Debug, Error)]
pub enum StageError {
    /// A middleware failed; the rest of the chain was skipped.
    #[error("middleware failed: {0}")]
    Middleware(#[source] BoxError),

    /// A guard failed while deciding whether the dispatch may proceed.
    #[error("guard failed: {0}")]
    Guard(#[source] BoxError),

    /// A pipe failed while transforming the event arguments.
    #[error("pipe failed: {0}")]
    Pipe(#[source] BoxError),

    /// A collector failed while building the execution context.
    #[error("collector failed: {0}")]
    Collector(#[source] BoxError),

    /// The handler itself failed.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl StageError {
    /// Returns the name of the stage that raised this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Middleware(_) => "middleware",
            Self::Guard(_) => "guard",
            Self::Pipe(_) => "pipe",
            Self::Collector(_) => "collector",
            Self::Handler(_) => "handler",
        }
    }

    /// Returns the original error raised by the stage.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            Self::Middleware(e)
            | Self::Guard(e)
            | Self::Pipe(e)
            | Self::Collector(e)
            | Self::Handler(e) => e.as_ref(),
        }
    }

    /// Consumes the wrapper and returns the original error.
    pub fn into_inner(self) -> BoxError {
        match self {
            Self::Middleware(e)
            | Self::Guard(e)
            | Self::Pipe(e)
            | Self::Collector(e)
            | Self::Handler(e) => e,
        }
    }

    /// Attempts to view the original error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner().downcast_ref::<E>()
    }

    /// Returns `true` if the original error is of type `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner().is::<E>()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A single rule broken by an event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The option (wire name) that failed validation.
    pub option: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Violation {
    pub fn new(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.option, self.message)
    }
}

/// Raised when event arguments do not satisfy a handler's descriptor.
#[derive(Debug, Clone, Error)]
#[error("validation failed for '{type_name}': {}", display_violations(.violations))]
pub struct ValidationError {
    /// The descriptor's type name.
    pub type_name: String,
    /// Every violation found, in option order.
    pub violations: Vec<Violation>,
}

fn display_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors raised by the controller plumbing rather than by user code.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The controller does not expose the requested method.
    #[error("controller '{owner}' has no handler method '{method}'")]
    UnknownMethod {
        /// The controller name.
        owner: String,
        /// The requested method name.
        method: String,
    },

    /// The handler received arguments it could not interpret.
    #[error("invalid handler arguments: {0}")]
    InvalidArguments(String),
}

impl HandlerError {
    /// Creates an unknown-method error.
    pub fn unknown_method(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            owner: owner.into(),
            method: method.into(),
        }
    }
}

/// Result type for dispatch callbacks.
pub type DispatchResult = Result<(), StageError>;
