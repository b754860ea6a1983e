use syn::spanned::Spanned;

pub fn attr_has_simple_ident(attr: &syn::Attribute, name: &str) -> bool {
    let path = &attr.path;
    if path.leading_colon.is_some() || path.segments.len() != 1 {
        return false;
    }

    match path.segments.last() {
        Some(segment) => segment.ident == name,
        None => false,
    }
}

pub fn path_is(path: &syn::Path, name: &str) -> bool {
    path.get_ident().map_or(false, |ident| ident == name)
}

/// The nested items of every `#[serde(..)]` attribute.
pub fn serde_items(attrs: &[syn::Attribute]) -> syn::Result<Vec<syn::NestedMeta>> {
    let mut items = vec![];
    for attr in attrs {
        if !attr_has_simple_ident(attr, "serde") {
            continue;
        }
        match attr.parse_meta()? {
            syn::Meta::List(list) => items.extend(list.nested),
            other => return Err(syn::Error::new(other.span(), "Expected #[serde(..)]")),
        }
    }
    Ok(items)
}

/// The string literal of a `name = "value"` item.
pub fn name_value_str(meta: &syn::Meta, name: &str) -> Option<syn::LitStr> {
    match meta {
        syn::Meta::NameValue(name_value) if path_is(&name_value.path, name) => {
            match &name_value.lit {
                syn::Lit::Str(lit) => Some(lit.clone()),
                _ => None,
            }
        }
        _ => None,
    }
}
