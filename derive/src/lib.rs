//! Derive macro for the `Externalize` trait.
//!
//! Structs get a `Describe` impl listing their fields in declaration order
//! and an `Externalize` impl pointing at it. Unit-only enums get a name
//! table so constants are written by name.
//!
//! # Container Attributes
//!
//! - `#[externalize(factory = path)]`: construct with `path()`, a
//!   `fn() -> Result<Self, E>`; the default is `Default::default`
//! - `#[externalize(no_factory)]`: no construction strategy; resolving the
//!   type fails with `MissingConstructor`
//! - `#[externalize(opaque)]`: write the value as one serde/postcard blob
//!
//! # Field Attributes
//!
//! - `#[externalize(skip)]`: never written; keeps the factory value
//! - `#[externalize(parent)]`: the field plays the base-class role; its
//!   fields are written after all own fields
//!
//! # Variant Attributes
//!
//! - `#[externalize(rename = "...")]`: wire name of the constant
//!
//! ```ignore
//! use fieldwire::Externalize;
//!
//! #[derive(Default, Externalize)]
//! struct Entity {
//!     id: u64,
//! }
//!
//! #[derive(Default, Externalize)]
//! struct Account {
//!     owner: String,
//!     #[externalize(skip)]
//!     session: Option<std::time::Instant>,
//!     #[externalize(parent)]
//!     entity: Entity,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields, Index, LitStr,
    Member, Path,
};

#[derive(Default)]
struct ContainerAttrs {
    factory: Option<Path>,
    no_factory: bool,
    opaque: bool,
}

fn container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut parsed = ContainerAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("externalize") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("factory") {
                parsed.factory = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("no_factory") {
                parsed.no_factory = true;
                Ok(())
            } else if meta.path.is_ident("opaque") {
                parsed.opaque = true;
                Ok(())
            } else {
                Err(meta.error("unknown externalize container attribute"))
            }
        })?;
    }
    if parsed.factory.is_some() && parsed.no_factory {
        return Err(syn::Error::new_spanned(
            &attrs[0],
            "`factory` and `no_factory` are mutually exclusive",
        ));
    }
    Ok(parsed)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldRole {
    Serialized,
    Skip,
    Parent,
}

fn field_role(attrs: &[Attribute]) -> syn::Result<FieldRole> {
    let mut role = FieldRole::Serialized;
    for attr in attrs {
        if !attr.path().is_ident("externalize") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                role = FieldRole::Skip;
                Ok(())
            } else if meta.path.is_ident("parent") {
                role = FieldRole::Parent;
                Ok(())
            } else {
                Err(meta.error("unknown externalize field attribute"))
            }
        })?;
    }
    Ok(role)
}

fn variant_name(attrs: &[Attribute], default: String) -> syn::Result<String> {
    let mut name = default;
    for attr in attrs {
        if !attr.path().is_ident("externalize") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                name = lit.value();
                Ok(())
            } else {
                Err(meta.error("unknown externalize variant attribute"))
            }
        })?;
    }
    Ok(name)
}

/// Derive macro for `Externalize`.
///
/// See the crate documentation for the accepted attributes.
#[proc_macro_derive(Externalize, attributes(externalize))]
pub fn derive_externalize(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let attrs = container_attrs(&input.attrs)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Add Externalize bounds for all generic type parameters
    let mut where_clause = where_clause
        .cloned()
        .unwrap_or_else(|| syn::parse_quote!(where));
    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::fieldwire::codec::Externalize));
        }
    }
    // The default factory goes through `Default`, which generic structs only
    // have when their parameters do
    let default_factory = attrs.factory.is_none() && !attrs.no_factory && !attrs.opaque;
    if default_factory && matches!(input.data, Data::Struct(_)) {
        where_clause
            .predicates
            .push(syn::parse_quote!(Self: ::core::default::Default));
    }

    if attrs.opaque {
        return Ok(quote! {
            impl #impl_generics ::fieldwire::codec::Externalize for #name #ty_generics #where_clause {
                fn shape() -> ::fieldwire::codec::Shape<Self> {
                    ::fieldwire::opaque::opaque_shape::<Self>()
                }
            }
        });
    }

    match &input.data {
        Data::Struct(data) => {
            let describe = describe_struct(data, &attrs)?;
            Ok(quote! {
                impl #impl_generics ::fieldwire::schema::Describe for #name #ty_generics #where_clause {
                    fn describe() -> ::fieldwire::schema::ClassDescriptor<Self> {
                        #describe
                    }
                }

                impl #impl_generics ::fieldwire::codec::Externalize for #name #ty_generics #where_clause {
                    fn shape() -> ::fieldwire::codec::Shape<Self> {
                        ::fieldwire::codec::Shape::Class(
                            <Self as ::fieldwire::schema::Describe>::describe,
                        )
                    }
                }
            })
        }
        Data::Enum(data) => {
            if attrs.factory.is_some() || attrs.no_factory {
                return Err(syn::Error::new_spanned(
                    name,
                    "enumerations are decoded by name and take no factory",
                ));
            }
            let table = enum_table(input, data)?;
            Ok(quote! {
                impl #impl_generics ::fieldwire::codec::Externalize for #name #ty_generics #where_clause {
                    fn shape() -> ::fieldwire::codec::Shape<Self> {
                        ::fieldwire::codec::Shape::Enum(#table)
                    }
                }
            })
        }
        Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "Externalize cannot be derived for unions",
        )),
    }
}

fn describe_struct(data: &DataStruct, attrs: &ContainerAttrs) -> syn::Result<TokenStream2> {
    let factory = if attrs.no_factory {
        quote! {}
    } else if let Some(path) = &attrs.factory {
        quote! {
            .factory(|| #path().map_err(::core::convert::Into::into))
        }
    } else {
        quote! {
            .factory(|| ::core::result::Result::Ok(<Self as ::core::default::Default>::default()))
        }
    };

    let mut fields = Vec::new();
    let mut parent: Option<TokenStream2> = None;

    let members: Vec<(Member, String, &syn::Field)> = match &data.fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|field| {
                let ident = field.ident.clone()?;
                let wire_name = ident.to_string();
                Some((Member::Named(ident), wire_name, field))
            })
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(index, field)| (Member::Unnamed(Index::from(index)), index.to_string(), field))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    for (member, wire_name, field) in members {
        let ty = &field.ty;
        match field_role(&field.attrs)? {
            FieldRole::Serialized => fields.push(quote! {
                .field(::fieldwire::schema::FieldDescriptor::<Self>::new::<#ty>(
                    #wire_name,
                    |v| &v.#member,
                    |v| &mut v.#member,
                ))
            }),
            FieldRole::Skip => fields.push(quote! {
                .field(::fieldwire::schema::FieldDescriptor::<Self>::transient::<#ty>(#wire_name))
            }),
            FieldRole::Parent => {
                if parent.is_some() {
                    return Err(syn::Error::new_spanned(
                        field,
                        "only one field can be marked `parent`",
                    ));
                }
                parent = Some(quote! {
                    .parent::<#ty>(|v| &v.#member, |v| &mut v.#member)
                });
            }
        }
    }

    Ok(quote! {
        ::fieldwire::schema::ClassDescriptor::<Self>::new()
            #factory
            #(#fields)*
            #parent
    })
}

fn enum_table(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "Externalize cannot be derived for an enum without variants",
        ));
    }

    let mut idents = Vec::new();
    let mut names = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "only unit variants are written by name; use #[externalize(opaque)] for data-carrying enums",
            ));
        }
        let wire_name = variant_name(&variant.attrs, variant.ident.to_string())?;
        if names.contains(&wire_name) {
            return Err(syn::Error::new_spanned(variant, "duplicate constant name"));
        }
        idents.push(&variant.ident);
        names.push(wire_name);
    }

    Ok(quote! {
        ::fieldwire::lang::EnumTable::new(
            ::core::any::type_name::<Self>(),
            &[#(#names),*],
            |v| match v {
                #(Self::#idents => #names,)*
            },
            |name| match name {
                #(#names => ::core::option::Option::Some(Self::#idents),)*
                _ => ::core::option::Option::None,
            },
        )
    })
}
