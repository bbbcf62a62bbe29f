//! Dto derive macro implementation.
//!
//! `#[derive(Dto)]` generates `impl Dto` whose `descriptor()` lists one
//! `OptionDescriptor` per named field, in declaration order.
//!
//! # Struct-level attributes `#[dto(...)]`
//!
//! | Key | Example | Description |
//! |-----|---------|-------------|
//! | `name` | `"Roll"` | Descriptor type name (default: struct name) |
//! | `crate` | `"herald::core"` | Path of the core crate (default: `::herald_core`) |
//!
//! # Field-level attributes `#[option(...)]`
//!
//! | Key | Example | Description |
//! |-----|---------|-------------|
//! | `name` | `"d"` | Wire name (default: field name) |
//! | `description` | `"Sides"` | Description |
//! | `required` | | Option must be present |
//! | `kind` | `"integer"` | Option kind (default: inferred from the type) |
//! | `choices` | `("a", "b")` | Allowed literal values |
//! | `channel_types` | `("text")` | Allowed channel types |

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, Lit, LitStr, Path,
    PathArguments, Token, Type, spanned::Spanned,
};

// ============================================================================
// Attribute structures
// ============================================================================

/// `#[dto(...)]` on the struct.
struct DtoAttrs {
    name: Option<String>,
    krate: Option<Path>,
}

/// `#[option(...)]` on a field.
#[derive(Default)]
struct OptionAttrs {
    name: Option<String>,
    description: Option<String>,
    required: bool,
    kind: Option<LitStr>,
    choices: Vec<Lit>,
    channel_types: Vec<LitStr>,
}

const KINDS: &[(&str, &str)] = &[
    ("string", "String"),
    ("integer", "Integer"),
    ("number", "Number"),
    ("boolean", "Boolean"),
    ("user", "User"),
    ("channel", "Channel"),
    ("role", "Role"),
    ("mentionable", "Mentionable"),
];

// ============================================================================
// Entry point
// ============================================================================

pub fn derive_dto(input: &DeriveInput) -> syn::Result<TokenStream> {
    let attrs = parse_dto_attrs(&input.attrs)?;
    let ident = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Dto can only be derived for structs with named fields",
                ));
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Dto can only be derived for structs",
            ));
        }
    };

    let krate = attrs
        .krate
        .map(|path| quote!(#path))
        .unwrap_or_else(|| quote!(::herald_core));
    let type_name = attrs.name.unwrap_or_else(|| ident.to_string());

    let options = fields
        .iter()
        .map(|field| {
            let Some(field_ident) = field.ident.as_ref() else {
                return Err(syn::Error::new(field.span(), "expected a named field"));
            };
            let option = parse_option_attrs(&field.attrs)?;
            generate_option(&krate, field_ident, &field.ty, option)
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::Dto for #ident #ty_generics #where_clause {
            fn descriptor() -> #krate::Descriptor {
                #krate::Descriptor::new(#type_name)
                    #(.option(#options))*
            }
        }
    })
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_dto_attrs(attrs: &[Attribute]) -> syn::Result<DtoAttrs> {
    let mut result = DtoAttrs {
        name: None,
        krate: None,
    };

    for attr in attrs {
        if !attr.path().is_ident("dto") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("crate") {
                result.krate = Some(meta.value()?.parse::<LitStr>()?.parse::<Path>()?);
            } else {
                return Err(meta.error("unknown dto attribute, expected `name` or `crate`"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_option_attrs(attrs: &[Attribute]) -> syn::Result<OptionAttrs> {
    let mut result = OptionAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("option") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("description") {
                result.description = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("required") {
                result.required = true;
            } else if meta.path.is_ident("kind") {
                result.kind = Some(meta.value()?.parse::<LitStr>()?);
            } else if meta.path.is_ident("choices") {
                let content;
                syn::parenthesized!(content in meta.input);
                let lits = Punctuated::<Lit, Token![,]>::parse_terminated(&content)?;
                result.choices.extend(lits);
            } else if meta.path.is_ident("channel_types") {
                let content;
                syn::parenthesized!(content in meta.input);
                let lits = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                result.channel_types.extend(lits);
            } else {
                return Err(meta.error("unknown option attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

// ============================================================================
// Code generation
// ============================================================================

fn generate_option(
    krate: &TokenStream,
    field: &Ident,
    ty: &Type,
    attrs: OptionAttrs,
) -> syn::Result<TokenStream> {
    let property = field.to_string().trim_start_matches("r#").to_string();
    let optional = option_inner(ty);

    if attrs.required && optional.is_some() {
        return Err(syn::Error::new(
            field.span(),
            "`Option<T>` fields cannot be marked `required`",
        ));
    }

    let kind = match &attrs.kind {
        Some(lit) => kind_variant(&lit.value()).ok_or_else(|| {
            syn::Error::new(
                lit.span(),
                format!(
                    "unknown option kind '{}', expected one of: {}",
                    lit.value(),
                    KINDS.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ")
                ),
            )
        })?,
        None => infer_kind(optional.unwrap_or(ty)).ok_or_else(|| {
            syn::Error::new(
                ty.span(),
                "cannot infer the option kind of this type, add `#[option(kind = \"...\")]`",
            )
        })?,
    };
    let kind = Ident::new(kind, Span::call_site());

    let name = attrs.name.map(|name| quote!(.name(#name)));
    let description = attrs
        .description
        .map(|description| quote!(.description(#description)));
    let required = attrs.required.then(|| quote!(.required(true)));
    let choices = attrs.choices.iter().map(|lit| {
        let label = choice_label(lit);
        quote!(.choice(#label, #lit))
    });
    let channel_types = (!attrs.channel_types.is_empty()).then(|| {
        let types = &attrs.channel_types;
        quote!(.channel_types([#(#types),*]))
    });

    Ok(quote! {
        #krate::OptionDescriptor::new(#property, #krate::OptionKind::#kind)
            #name
            #description
            #required
            #(#choices)*
            #channel_types
    })
}

fn kind_variant(name: &str) -> Option<&'static str> {
    let name = name.to_ascii_lowercase();
    KINDS.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
}

/// Returns `T` for `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn infer_kind(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::Reference(reference) => infer_kind(&reference.elem),
        Type::Path(path) => {
            let ident = path.path.segments.last()?.ident.to_string();
            match ident.as_str() {
                "String" | "str" => Some("String"),
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32"
                | "u64" | "u128" | "usize" => Some("Integer"),
                "f32" | "f64" => Some("Number"),
                "bool" => Some("Boolean"),
                _ => None,
            }
        }
        _ => None,
    }
}

fn choice_label(lit: &Lit) -> String {
    match lit {
        Lit::Str(s) => s.value(),
        Lit::Int(i) => i.base10_digits().to_string(),
        Lit::Float(f) => f.base10_digits().to_string(),
        Lit::Bool(b) => b.value.to_string(),
        other => quote!(#other).to_string(),
    }
}
