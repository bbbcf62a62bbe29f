//! # Herald Core
//!
//! Core contracts of the Herald event dispatch framework.
//!
//! Herald binds methods of application controllers to the events raised by an
//! external real-time client. This crate holds the pieces every other layer
//! agrees on:
//!
//! - **Events**: positional event arguments ([`EventArgs`])
//! - **Subscriptions**: delivery modes and bindings ([`SubscriptionMode`], [`Subscription`])
//! - **Metadata**: the handler declaration table ([`MetadataProvider`], [`MetadataTable`])
//! - **Descriptors**: structural argument hints ([`Descriptor`], [`Dto`])
//! - **Client**: the event source contract ([`EventSource`], [`EventCallback`])
//! - **Errors**: the stage failure taxonomy ([`StageError`], [`ValidationError`])
//!
//! ```text
//! ┌──────────────┐  subscribe   ┌─────────────────┐
//! │ EventSource  │◀─────────────│  EventExplorer  │◀── MetadataProvider
//! │   (client)   │──callback───▶│ (orchestrator)  │
//! └──────────────┘              └─────────────────┘
//! ```

pub mod client;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod metadata;
pub mod subscription;

pub use client::{EventCallback, EventSource};
pub use descriptor::{Descriptor, Dto, OptionChoice, OptionDescriptor, OptionKind};
pub use error::{
    BoxError, DispatchResult, HandlerError, StageError, ValidationError, Violation,
};
pub use event::EventArgs;
pub use metadata::{
    EventMetadata, HandlerDeclaration, HandlerKey, MetadataProvider, MetadataTable,
};
pub use subscription::{Subscription, SubscriptionMode};

#[doc(hidden)]
pub use serde_json;
