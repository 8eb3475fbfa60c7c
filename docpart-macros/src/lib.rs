//! Procedural macros for docpart.
//!
//! `#[derive(Document)]` implements `docpart::document::Document` for a struct with named
//! fields. The container attribute configures it:
//!
//! ```ignore
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "shipments", partition_key = "carrier")]
//! pub struct Shipment {
//!     #[serde(rename = "_id")]
//!     pub id: bson::Uuid,
//!     pub version: i32,
//!     pub carrier: String,
//! }
//! ```
//!
//! | key             | default     | meaning                                              |
//! |-----------------|-------------|------------------------------------------------------|
//! | `id`            | `"id"`      | field holding the identifier, its type becomes `Id`  |
//! | `version`       | `"version"` | `i32` field holding the schema version               |
//! | `collection`    | type name   | declared collection base name                        |
//! | `partition_key` | none        | string field holding the partition key               |
//! | `crate`         | `::docpart` | path the generated impl refers to                    |
//!
//! Stores look documents up by `_id`, so the id field must serialize under that name: either
//! the field is called `_id` or it carries `#[serde(rename = "_id")]`. Anything else is a
//! compile error.

#[allow(unused_extern_crates)]
extern crate self as docpart_macros;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    Data, DeriveInput, Expr, ExprLit, Field, Fields, Ident, Lit, LitStr, Meta, MetaNameValue, Path,
    Result, Token, parse_macro_input, punctuated::Punctuated,
};

const ID_FIELD: &str = "_id";

/// Derives `Document` for a struct with named fields.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    expand_document(&ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct DocumentAttrs {
    id: String,
    version: String,
    collection: Option<String>,
    partition_key: Option<String>,
    krate: Path,
}

impl Default for DocumentAttrs {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            version: "version".to_string(),
            collection: None,
            partition_key: None,
            krate: syn::parse_quote!(::docpart),
        }
    }
}

fn parse_attrs(ast: &DeriveInput) -> Result<DocumentAttrs> {
    let mut attrs = DocumentAttrs::default();

    for attr in &ast.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let value: LitStr = meta.value()?.parse()?;

            if meta.path.is_ident("id") {
                attrs.id = value.value();
            } else if meta.path.is_ident("version") {
                attrs.version = value.value();
            } else if meta.path.is_ident("collection") {
                if value.value().trim().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }
                attrs.collection = Some(value.value());
            } else if meta.path.is_ident("partition_key") {
                attrs.partition_key = Some(value.value());
            } else if meta.path.is_ident("crate") {
                attrs.krate = value.parse()?;
            } else {
                return Err(meta.error("unknown document attribute"));
            }

            Ok(())
        })?;
    }

    Ok(attrs)
}

fn is_id_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Lit(ExprLit { lit: Lit::Str(value), .. }) if value.value() == ID_FIELD)
}

/// Whether serde writes `field` under `_id`, by its own name or through `rename`.
fn serialized_as_id(field: &Field) -> Result<bool> {
    if field.ident.as_ref().is_some_and(|ident| ident == ID_FIELD) {
        return Ok(true);
    }

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let metas = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;

        for meta in metas.iter().filter(|meta| meta.path().is_ident("rename")) {
            match meta {
                Meta::NameValue(rename) if is_id_literal(&rename.value) => return Ok(true),
                Meta::List(list) => {
                    // rename(serialize = "..", deserialize = "..") needs `_id` both ways.
                    let sides = list.parse_args_with(Punctuated::<MetaNameValue, Token![,]>::parse_terminated)?;
                    let renamed = |direction: &str| {
                        sides
                            .iter()
                            .any(|side| side.path.is_ident(direction) && is_id_literal(&side.value))
                    };

                    if renamed("serialize") && renamed("deserialize") {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(false)
}

fn expand_document(ast: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &ast.data else {
        return Err(syn::Error::new_spanned(ast, "Document can only be derived for structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(ast, "Document requires named fields"));
    };

    let attrs = parse_attrs(ast)?;
    let find_field = |name: &str| {
        fields
            .named
            .iter()
            .find(|field| field.ident.as_ref().is_some_and(|ident| ident == name))
            .ok_or_else(|| syn::Error::new_spanned(ast, format!("Field {name} not found in struct")))
    };

    let id_field = find_field(attrs.id.as_str())?;
    if !serialized_as_id(id_field)? {
        return Err(syn::Error::new_spanned(
            id_field,
            "the id field must serialize as `_id`, add #[serde(rename = \"_id\")]",
        ));
    }
    let id_ident = &id_field.ident;
    let id_type = &id_field.ty;
    let version_ident = &find_field(attrs.version.as_str())?.ident;

    let name = &ast.ident;
    let krate = &attrs.krate;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let collection_code = attrs.collection.map(|collection| {
        quote! {
            fn declared_collection() -> Option<&'static str> {
                Some(#collection)
            }
        }
    });

    let partition_code = match &attrs.partition_key {
        Some(field) => {
            find_field(field.as_str())?;
            let field = Ident::new(field, Span::call_site());

            quote! {
                const PARTITIONED: bool = true;

                fn partition_key(&self) -> Option<&str> {
                    Some(::core::convert::AsRef::<str>::as_ref(&self.#field))
                }
            }
        }
        None => quote! {},
    };

    Ok(quote! {
        impl #impl_generics #krate::document::Document for #name #ty_generics #where_clause {
            type Id = #id_type;

            #partition_code

            fn id(&self) -> &Self::Id {
                &self.#id_ident
            }

            fn set_id(&mut self, id: Self::Id) {
                self.#id_ident = id;
            }

            fn version(&self) -> i32 {
                self.#version_ident
            }

            #collection_code
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: DeriveInput) -> Result<String> {
        expand_document(&input).map(|tokens| tokens.to_string())
    }

    #[test]
    fn renamed_id_fields_expand() {
        let tokens = expand(parse_quote! {
            #[document(collection = "orders", partition_key = "tenant")]
            struct Order {
                #[serde(default, rename = "_id")]
                id: u64,
                version: i32,
                tenant: String,
            }
        })
        .unwrap();

        assert!(tokens.contains("type Id = u64"));
        assert!(tokens.contains("const PARTITIONED : bool = true"));
        assert!(tokens.contains("Some (\"orders\")"));
    }

    #[test]
    fn id_may_be_named_or_renamed_per_direction() {
        assert!(expand(parse_quote! {
            #[document(id = "_id")]
            struct Plain { _id: String, version: i32 }
        })
        .is_ok());
        assert!(expand(parse_quote! {
            struct Plain {
                #[serde(rename(serialize = "_id", deserialize = "_id"))]
                id: String,
                version: i32,
            }
        })
        .is_ok());
    }

    #[test]
    fn id_fields_not_stored_as_underscore_id_are_rejected() {
        let err = expand(parse_quote! {
            struct Plain {
                id: String,
                version: i32,
                name: String,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("_id"));

        let err = expand(parse_quote! {
            struct Plain {
                #[serde(rename(serialize = "_id"), skip_serializing_if = "String::is_empty")]
                id: String,
                version: i32,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("_id"));
    }
}
