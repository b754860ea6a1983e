#![forbid(unsafe_code)]

extern crate proc_macro;

mod derive_entity;
mod derive_record;

mod attr {
    pub mod attr_util;
}

use proc_macro::TokenStream;
use quote::quote;

/// Implement `records::Record` for a struct with named fields.
///
/// Field names follow `#[serde(rename = "..")]`; fields marked
/// `#[serde(skip)]` are not part of the record.
#[proc_macro_derive(Record)]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let record_struct = syn::parse_macro_input!(input as derive_record::RecordStruct);

    let ident = &record_struct.item.ident;
    let (impl_generics, ty_generics, where_clause) = record_struct.item.generics.split_for_impl();
    let field_names = &record_struct.field_names;

    let tokens = quote! {
        impl #impl_generics ::records::Record for #ident #ty_generics #where_clause {
            const FIELDS: &'static [&'static str] = &[#(#field_names),*];
        }
    };

    TokenStream::from(tokens)
}

/// Implement `records::Entity`. The table name is given with
/// `#[entity("name")]` and defaults to the lowercased type name.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let entity_struct = syn::parse_macro_input!(input as derive_entity::EntityStruct);

    let ident = &entity_struct.ident;
    let (impl_generics, ty_generics, where_clause) = entity_struct.generics.split_for_impl();
    let table_name = &entity_struct.table_name;

    let tokens = quote! {
        impl #impl_generics ::records::Entity for #ident #ty_generics #where_clause {
            fn table() -> &'static str {
                #table_name
            }
        }
    };

    TokenStream::from(tokens)
}
