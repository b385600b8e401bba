//! Derive macro generating schema metadata for gemsql models.
//!
//! This crate provides the `#[derive(Model)]` macro, which implements
//! `gemsql_core::Model` for a struct with named fields.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Lit, LitStr,
    PathArguments, Type,
};

/// Derives `gemsql_core::Model` for a struct.
///
/// # Attributes
///
/// - `#[model(table = "table_name")]` - Overrides the table name (optional,
///   defaults to the pluralized snake_case of the struct name)
///
/// # Field Attributes
///
/// - `#[gem("primaryKey;size:100")]` - Field annotations. The
///   attribute may be repeated; its values are joined with `;`.
/// - `#[gem("embedded")]` - Flattens the field's columns into this table. The
///   field's type must derive `Model` as well.
///
/// `Option<T>` fields are optional (nullable). The column kind is taken from
/// the Rust type: integers, floats, `bool`, `String`/`&str`, `Vec<u8>`, and
/// date-time types (`DateTime`, `NaiveDateTime`, `SystemTime`, ...). Other
/// types map to `FieldKind::Other`.
#[proc_macro_derive(Model, attributes(model, gem))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_model_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();
    let table_name = match get_table_name(&input.attrs)? {
        Some(name) => quote! { Some(#name) },
        None => quote! { None },
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Model derive only supports structs",
            ));
        }
    };

    let mut field_entries: Vec<TokenStream2> = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.to_string().trim_start_matches("r#").to_string();
        let tag = get_tag(&field.attrs)?;
        let (inner, optional) = unwrap_option(&field.ty);
        let kind = if has_embedded(&tag) {
            let nested = type_label(inner);
            quote! {
                ::gemsql_core::FieldKind::Struct {
                    name: #nested.to_string(),
                    fields: <#inner as ::gemsql_core::Model>::fields(),
                }
            }
        } else {
            field_kind(inner)
        };

        field_entries.push(quote! {
            ::gemsql_core::FieldMeta {
                name: #name.to_string(),
                kind: #kind,
                optional: #optional,
                tag: #tag.to_string(),
                anonymous: false,
            }
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::gemsql_core::Model for #struct_name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const TABLE_NAME: Option<&'static str> = #table_name;

            fn fields() -> ::std::vec::Vec<::gemsql_core::FieldMeta> {
                ::std::vec![#(#field_entries),*]
            }
        }
    })
}

fn get_table_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut table_name = None;
    for attr in attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            table_name = Some(s.value());
                            return Ok(());
                        }
                    }
                    return Err(meta.error("expected a string literal"));
                }
                Err(meta.error("unsupported model attribute"))
            })?;
        }
    }
    Ok(table_name)
}

/// Joins every `#[gem("...")]` value on a field with `;`.
fn get_tag(attrs: &[Attribute]) -> syn::Result<String> {
    let mut parts = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("gem") {
            let value: LitStr = attr.parse_args()?;
            let value = value.value();
            if !value.trim().is_empty() {
                parts.push(value);
            }
        }
    }
    Ok(parts.join(";"))
}

fn has_embedded(tag: &str) -> bool {
    tag.split(';').any(|segment| {
        let key = segment.split(':').next().unwrap_or_default();
        key.trim().eq_ignore_ascii_case("embedded")
    })
}

/// Strips an outer `Option<...>`, reporting whether it was present.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Some((ident, Some(arg))) = last_segment(ty) {
        if ident == "Option" {
            return (arg, true);
        }
    }
    (ty, false)
}

/// Last path segment of a type and its first generic type argument.
fn last_segment(ty: &Type) -> Option<(String, Option<&Type>)> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let arg = match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|a| match a {
            GenericArgument::Type(t) => Some(t),
            _ => None,
        }),
        _ => None,
    };
    Some((segment.ident.to_string(), arg))
}

fn type_label(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

fn field_kind(ty: &Type) -> TokenStream2 {
    if let Type::Reference(reference) = ty {
        return field_kind(&reference.elem);
    }
    let variant = match last_segment(ty) {
        Some((ident, arg)) => match ident.as_str() {
            "bool" => quote!(Bool),
            "i8" => quote!(I8),
            "i16" => quote!(I16),
            "i32" => quote!(I32),
            "i64" => quote!(I64),
            "isize" => quote!(Int),
            "u8" => quote!(U8),
            "u16" => quote!(U16),
            "u32" => quote!(U32),
            "u64" => quote!(U64),
            "usize" => quote!(Uint),
            "f32" => quote!(F32),
            "f64" => quote!(F64),
            "String" | "str" => quote!(String),
            "Vec" if arg.is_some_and(|a| type_label(a) == "u8") => quote!(Bytes),
            "DateTime" | "NaiveDateTime" | "NaiveDate" | "SystemTime" | "OffsetDateTime"
            | "PrimitiveDateTime" | "Timestamp" => quote!(Timestamp),
            _ => return other(ty),
        },
        None => return other(ty),
    };
    quote! { ::gemsql_core::FieldKind::#variant }
}

fn other(ty: &Type) -> TokenStream2 {
    let label = type_label(ty);
    quote! { ::gemsql_core::FieldKind::Other(#label.to_string()) }
}
