//! Procedural macros for the Herald event framework.
//!
//! This crate provides:
//!
//! - `#[derive(Dto)]` - Generates a `herald_core::Dto` implementation
//!   describing a handler argument type
//!
//! # Dto Derive Macro
//!
//! ```rust,ignore
//! use herald_macros::Dto;
//!
//! #[derive(Dto, serde::Deserialize)]
//! #[dto(name = "Roll")]
//! pub struct RollOptions {
//!     #[option(name = "d", description = "Number of sides", required)]
//!     pub sides: u32,
//!     #[option(choices("fair", "loaded"))]
//!     pub mode: Option<String>,
//! }
//! ```

mod dto;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `herald_core::Dto` for a struct with named fields.
///
/// # Struct attributes `#[dto(...)]`
///
/// - `name = "..."` - Descriptor type name (default: the struct name)
/// - `crate = "..."` - Path to the core crate (default: `::herald_core`);
///   use `crate = "herald::core"` when depending on the `herald` facade only
///
/// # Field attributes `#[option(...)]`
///
/// - `name = "..."` - Wire name (default: the field name)
/// - `description = "..."` - Human-readable description
/// - `required` - The option must be present; not allowed on `Option<T>`
/// - `kind = "..."` - Option kind (`string`, `integer`, `number`, `boolean`,
///   `user`, `channel`, `role`, `mentionable`); inferred from the field type
///   when omitted
/// - `choices(...)` - Allowed literal values
/// - `channel_types(...)` - Allowed channel types for `channel` options
#[proc_macro_derive(Dto, attributes(dto, option))]
pub fn derive_dto(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match dto::derive_dto(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
