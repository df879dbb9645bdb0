//! Procedural macros for the docstate project.
//!
//! This crate provides `#[derive(DomainObject)]`, re-exported by the `docstate` crate.

#[allow(unused_extern_crates)]
extern crate self as docstate_macros;

mod domain_object;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Implements `DomainObject` for a struct with named fields.
///
/// - `#[domain(core)]` marks the `ObjectCore` field (required, exactly one)
/// - `#[domain(skip)]` excludes a field from the property list
/// - `#[domain(collection = "...")]` on the struct overrides the collection name
///
/// Every other field must implement `RawProperty`; properties are exported in
/// declaration order.
///
/// ```ignore
/// #[derive(DomainObject)]
/// #[domain(collection = "posts")]
/// pub struct Post {
///     #[domain(core)]
///     core: ObjectCore,
///     title: Property<String>,
///     comments: HasMany<Comment>,
/// }
/// ```
#[proc_macro_derive(DomainObject, attributes(domain))]
pub fn derive_domain_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    domain_object::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
