//! Procedural macros for capability input types.
//!
//! `#[derive(InputType)]` produces the type descriptor a capability needs for
//! schema synthesis, so capability authors never hand-write schemas.
//!
//! Supported shapes:
//! - structs with named fields become records; doc comments become
//!   descriptions; `Option<T>` fields and fields marked `#[serde(default)]`
//!   are optional; `#[serde(skip)]` / `#[serde(skip_deserializing)]` fields
//!   are left out; `#[serde(rename)]` and a container-level
//!   `#[serde(rename_all)]` are recorded as the field's wire name;
//! - newtype structs describe as their inner type;
//! - unit structs describe as unit;
//! - enums whose variants are all unit become string enums, with variant
//!   names renamed the way serde renames them.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::ext::IdentExt;
use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, Fields, GenericParam, Lit, LitStr, Meta,
    MetaNameValue, Token, parse_macro_input, parse_quote,
};

/// Derives `umcp_primitives::InputType`.
#[proc_macro_derive(InputType, attributes(serde))]
pub fn derive_input_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    for param in &mut input.generics.params {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(::umcp_primitives::InputType));
        }
    }

    let ident = &input.ident;
    let name = ident.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let rename_all = container_rename_rule(&input.attrs)?;

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => {
                let mut record = quote! {
                    ::umcp_primitives::RecordDescriptor::new(#name)
                };
                if let Some(doc) = doc_string(&input.attrs) {
                    record = quote! { #record.with_description(#doc) };
                }
                for field in &named.named {
                    let flags = serde_flags(&field.attrs)?;
                    if flags.skip {
                        continue;
                    }
                    let field_name = field
                        .ident
                        .as_ref()
                        .map(|ident| ident.unraw().to_string())
                        .unwrap_or_default();
                    let ty = &field.ty;
                    let mut descriptor = quote! {
                        ::umcp_primitives::FieldDescriptor::new(
                            #field_name,
                            <#ty as ::umcp_primitives::InputType>::describe(),
                        )
                    };
                    let wire_name = flags
                        .rename
                        .or_else(|| rename_all.map(|rule| rule.field(&field_name)));
                    if let Some(wire_name) = wire_name {
                        descriptor = quote! { #descriptor.renamed(#wire_name) };
                    }
                    if flags.default {
                        descriptor = quote! { #descriptor.required(false) };
                    }
                    if let Some(doc) = doc_string(&field.attrs) {
                        descriptor = quote! { #descriptor.with_description(#doc) };
                    }
                    record = quote! { #record.with_field(#descriptor) };
                }
                quote! { ::umcp_primitives::TypeDescriptor::Record(#record) }
            }
            Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
                let ty = &unnamed.unnamed[0].ty;
                quote! { <#ty as ::umcp_primitives::InputType>::describe() }
            }
            Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new(
                    unnamed.span(),
                    "InputType cannot be derived for tuple structs with more than one field",
                ));
            }
            Fields::Unit => quote! { ::umcp_primitives::TypeDescriptor::Unit },
        },
        Data::Enum(data) => {
            let mut variants = Vec::with_capacity(data.variants.len());
            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(syn::Error::new(
                        variant.span(),
                        "InputType can only be derived for enums with unit variants",
                    ));
                }
                let flags = serde_flags(&variant.attrs)?;
                if flags.skip {
                    continue;
                }
                let source = variant.ident.unraw().to_string();
                variants.push(
                    flags
                        .rename
                        .or_else(|| rename_all.map(|rule| rule.variant(&source)))
                        .unwrap_or(source),
                );
            }
            quote! {
                ::umcp_primitives::TypeDescriptor::Enum {
                    name: ::std::string::String::from(#name),
                    variants: ::std::vec![#(::std::string::String::from(#variants)),*],
                }
            }
        }
        Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span(),
                "InputType cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::umcp_primitives::InputType for #ident #ty_generics #where_clause {
            fn describe() -> ::umcp_primitives::TypeDescriptor {
                #body
            }
        }
    })
}

/// Joins `///` lines into a single description.
fn doc_string(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(lit) => match &lit.lit {
                    Lit::Str(s) => Some(s.value().trim().to_owned()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

#[derive(Default)]
struct SerdeFlags {
    skip: bool,
    default: bool,
    rename: Option<String>,
}

fn serde_metas(attrs: &[Attribute]) -> syn::Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        metas.extend(attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?);
    }
    Ok(metas)
}

fn serde_flags(attrs: &[Attribute]) -> syn::Result<SerdeFlags> {
    let mut flags = SerdeFlags::default();
    for meta in serde_metas(attrs)? {
        let path = meta.path();
        if path.is_ident("skip") || path.is_ident("skip_deserializing") {
            flags.skip = true;
        } else if path.is_ident("default") {
            flags.default = true;
        } else if path.is_ident("rename") {
            if let Some(name) = deserialize_str(&meta)? {
                flags.rename = Some(name.value());
            }
        }
    }
    Ok(flags)
}

fn container_rename_rule(attrs: &[Attribute]) -> syn::Result<Option<RenameRule>> {
    let mut rule = None;
    for meta in serde_metas(attrs)? {
        if meta.path().is_ident("rename_all") {
            if let Some(name) = deserialize_str(&meta)? {
                rule = Some(RenameRule::parse(&name)?);
            }
        }
    }
    Ok(rule)
}

/// Reads `key = "..."` or the `deserialize` half of `key(deserialize = "...")`.
fn deserialize_str(meta: &Meta) -> syn::Result<Option<LitStr>> {
    match meta {
        Meta::NameValue(nv) => lit_str(&nv.value).map(Some),
        Meta::List(list) => {
            let nested =
                list.parse_args_with(Punctuated::<MetaNameValue, Token![,]>::parse_terminated)?;
            nested
                .iter()
                .find(|nv| nv.path.is_ident("deserialize"))
                .map(|nv| lit_str(&nv.value))
                .transpose()
        }
        Meta::Path(path) => Err(syn::Error::new(path.span(), "expected a string value")),
    }
}

fn lit_str(expr: &Expr) -> syn::Result<LitStr> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(lit), ..
        }) => Ok(lit.clone()),
        other => Err(syn::Error::new(other.span(), "expected a string literal")),
    }
}

/// Serde's `rename_all` rules.
#[derive(Clone, Copy)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("unknown rename rule `{other}`"),
                ));
            }
        })
    }

    /// Applies the rule to a snake_case field name.
    fn field(self, field: &str) -> String {
        match self {
            Self::Lower | Self::Snake => field.to_owned(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Pascal => {
                let mut out = String::with_capacity(field.len());
                let mut capitalize = true;
                for c in field.chars() {
                    if c == '_' {
                        capitalize = true;
                    } else if capitalize {
                        out.push(c.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        out.push(c);
                    }
                }
                out
            }
            Self::Camel => lower_first(&Self::Pascal.field(field)),
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }

    /// Applies the rule to a PascalCase variant name.
    fn variant(self, variant: &str) -> String {
        match self {
            Self::Pascal => variant.to_owned(),
            Self::Lower => variant.to_ascii_lowercase(),
            Self::Upper => variant.to_ascii_uppercase(),
            Self::Camel => lower_first(variant),
            Self::Snake => {
                let mut out = String::with_capacity(variant.len() + 4);
                for (i, c) in variant.char_indices() {
                    if i > 0 && c.is_uppercase() {
                        out.push('_');
                    }
                    out.push(c.to_ascii_lowercase());
                }
                out
            }
            Self::ScreamingSnake => Self::Snake.variant(variant).to_ascii_uppercase(),
            Self::Kebab => Self::Snake.variant(variant).replace('_', "-"),
            Self::ScreamingKebab => Self::ScreamingSnake.variant(variant).replace('_', "-"),
        }
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_lowercase().to_string() + chars.as_str()
    })
}
