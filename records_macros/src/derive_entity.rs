use syn::parse::ParseStream;
use syn::spanned::Spanned;

use crate::attr::attr_util;

pub struct EntityStruct {
    pub ident: syn::Ident,
    pub generics: syn::Generics,
    pub table_name: syn::LitStr,
}

impl syn::parse::Parse for EntityStruct {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let item: syn::DeriveInput = input.parse()?;

        let mut table_name = None;
        for attr in &item.attrs {
            if !attr_util::attr_has_simple_ident(attr, "entity") {
                continue;
            }
            if table_name.is_some() {
                return Err(syn::Error::new(attr.span(), "Duplicate #[entity] attribute"));
            }
            table_name = Some(attr.parse_args::<syn::LitStr>()?);
        }

        let table_name = table_name.unwrap_or_else(|| {
            syn::LitStr::new(&item.ident.to_string().to_lowercase(), item.ident.span())
        });

        if table_name.value().is_empty() {
            return Err(syn::Error::new(table_name.span(), "Expected a table name"));
        }

        Ok(Self {
            ident: item.ident,
            generics: item.generics,
            table_name,
        })
    }
}
