//! Controller contract.
//!
//! A controller is an application object whose methods handle events. Rust
//! has no runtime reflection, so a controller lists its handler methods
//! explicitly and dispatches calls by method name.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_framework::{Controller, HandlerArgs};
//! use herald_core::{BoxError, HandlerDeclaration, HandlerError};
//!
//! struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl Controller for Greeter {
//!     fn name(&self) -> &str {
//!         "Greeter"
//!     }
//!
//!     fn methods(&self) -> &[&'static str] {
//!         &["on_ready"]
//!     }
//!
//!     fn declarations(&self) -> &[HandlerDeclaration] {
//!         &[HandlerDeclaration::once("on_ready", "ready")]
//!     }
//!
//!     async fn invoke(&self, method: &str, args: HandlerArgs) -> Result<(), BoxError> {
//!         match method {
//!             "on_ready" => Ok(()),
//!             _ => Err(HandlerError::unknown_method(self.name(), method).into()),
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::context::HandlerArgs;
use herald_core::{BoxError, Descriptor, HandlerDeclaration};

/// An object owning event handler methods.
///
/// The controller's mutable state is shared by every concurrent invocation of
/// every one of its handlers; synchronizing it is up to the implementation.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Stable identity of this controller, used as the metadata owner key.
    ///
    /// Metadata is keyed by name, not by instance: two controllers returning
    /// the same name share every handler declaration, stage scope and filter
    /// scope, and each of them is bound when explored.
    fn name(&self) -> &str;

    /// Every method that may be explored as an event handler.
    fn methods(&self) -> &[&'static str];

    /// Handler declarations carried by the controller itself.
    ///
    /// The runtime copies them into its metadata table when the controller is
    /// registered.
    fn declarations(&self) -> &[HandlerDeclaration] {
        &[]
    }

    /// The descriptor of `method`'s primary argument, if it declares one.
    ///
    /// Called once per method when it is subscribed.
    fn descriptor(&self, _method: &str) -> Option<Descriptor> {
        None
    }

    /// Calls the handler `method` with the assembled arguments.
    async fn invoke(&self, method: &str, args: HandlerArgs) -> Result<(), BoxError>;
}
