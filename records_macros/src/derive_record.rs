use syn::parse::ParseStream;
use syn::spanned::Spanned;

use crate::attr::attr_util;

/// A struct with named fields, and the names its records are built from.
pub struct RecordStruct {
    pub item: syn::ItemStruct,
    pub field_names: Vec<syn::LitStr>,
}

impl syn::parse::Parse for RecordStruct {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let item: syn::ItemStruct = input.parse()?;

        for nested in attr_util::serde_items(&item.attrs)? {
            if let syn::NestedMeta::Meta(meta) = &nested {
                if attr_util::name_value_str(meta, "rename_all").is_some() {
                    return Err(syn::Error::new(
                        meta.span(),
                        "rename_all is not supported, rename fields one by one",
                    ));
                }
            }
        }

        let fields = match &item.fields {
            syn::Fields::Named(fields_named) => &fields_named.named,
            _ => {
                return Err(syn::Error::new(
                    item.fields.span(),
                    "Record can only be derived for structs with named fields",
                ))
            }
        };

        let mut field_names = vec![];
        for field in fields {
            if let Some(name) = field_name(field)? {
                field_names.push(name);
            }
        }

        Ok(Self { item, field_names })
    }
}

/// The key a field is deserialized from, or `None` for skipped fields.
fn field_name(field: &syn::Field) -> syn::Result<Option<syn::LitStr>> {
    let ident = match &field.ident {
        Some(ident) => ident,
        None => return Err(syn::Error::new(field.span(), "Expected a named field")),
    };

    let mut name = syn::LitStr::new(&ident.to_string(), ident.span());

    for nested in attr_util::serde_items(&field.attrs)? {
        let meta = match &nested {
            syn::NestedMeta::Meta(meta) => meta,
            syn::NestedMeta::Lit(lit) => {
                return Err(syn::Error::new(lit.span(), "Unexpected literal"))
            }
        };

        match meta {
            syn::Meta::Path(path)
                if attr_util::path_is(path, "skip")
                    || attr_util::path_is(path, "skip_deserializing") =>
            {
                return Ok(None);
            }
            syn::Meta::Path(path) if attr_util::path_is(path, "flatten") => {
                return Err(syn::Error::new(path.span(), "flatten is not supported"));
            }
            syn::Meta::NameValue(_) => {
                if let Some(rename) = attr_util::name_value_str(meta, "rename") {
                    name = rename;
                }
            }
            syn::Meta::List(list) if attr_util::path_is(&list.path, "rename") => {
                for nested in &list.nested {
                    if let syn::NestedMeta::Meta(inner) = nested {
                        if let Some(rename) = attr_util::name_value_str(inner, "deserialize") {
                            name = rename;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(Some(name))
}
