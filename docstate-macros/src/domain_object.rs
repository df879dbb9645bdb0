use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr};

#[derive(Default)]
struct FieldOptions {
    core: bool,
    skip: bool,
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(input, "DomainObject can only be derived for structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(input, "DomainObject requires named fields"));
    };

    let mut core: Option<&Ident> = None;
    let mut properties = Vec::new();

    for field in &fields.named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let options = field_options(&field.attrs)?;

        if options.core {
            if core.is_some() {
                return Err(syn::Error::new_spanned(field, "only one field can be marked #[domain(core)]"));
            }
            core = Some(ident);
        } else if !options.skip {
            properties.push(ident);
        }
    }

    let Some(core) = core else {
        return Err(syn::Error::new_spanned(input, "DomainObject needs a field marked #[domain(core)]"));
    };

    let collection = collection_name(&input.attrs)?.map(|collection| {
        quote! {
            fn collection_name() -> ::std::string::String {
                ::std::string::String::from(#collection)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::docstate::object::DomainObject for #name #ty_generics #where_clause {
            fn core(&self) -> &::docstate::object::ObjectCore {
                &self.#core
            }

            fn core_mut(&mut self) -> &mut ::docstate::object::ObjectCore {
                &mut self.#core
            }

            fn properties(&self) -> ::std::vec::Vec<&dyn ::docstate::property::RawProperty> {
                ::std::vec![#(&self.#properties),*]
            }

            fn properties_mut(&mut self) -> ::std::vec::Vec<&mut dyn ::docstate::property::RawProperty> {
                ::std::vec![#(&mut self.#properties),*]
            }

            #collection
        }
    })
}

fn field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("domain") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("core") {
                options.core = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `core` or `skip`"))
            }
        })?;
    }

    Ok(options)
}

fn collection_name(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut collection = None;

    for attr in attrs {
        if !attr.path().is_ident("domain") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                collection = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection)
}
