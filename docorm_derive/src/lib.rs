use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, LitBool, LitInt, LitStr, PathArguments, Type,
    parse_macro_input, spanned::Spanned,
};

/// Derives `docorm::entity::Record`, describing the struct's serialized shape.
///
/// Field attributes under `#[orm(...)]`:
/// - `id`: the identity field
/// - `index` or `index(ascending = false, unique, ttl = 3600)`
/// - `index_text`
/// - `transient`: never persisted; needs `#[serde(skip)]` as well, since the
///   stored document is the serde form of the struct
///
/// `#[serde(...)]` attributes are honored for field names (`rename`,
/// `rename_all`) and for which side of the accessor pair exists (`skip`,
/// `skip_serializing`, `skip_deserializing`).
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct IndexOptions {
    ascending: bool,
    unique: bool,
    ttl: u64,
}

#[derive(Default)]
struct OrmFieldOptions {
    identity: bool,
    index: Option<IndexOptions>,
    index_text: bool,
    transient: bool,
}

struct SerdeFieldOptions {
    rename: Option<String>,
    skip: bool,
    skip_serializing: bool,
    skip_deserializing: bool,
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Record does not support generic structs",
        ));
    }

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record can only be derived for structs",
            ));
        }
    };

    let fields = match data_struct.fields {
        Fields::Named(fields) => fields.named.into_iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Record requires named fields",
            ));
        }
    };

    let rename_all = parse_serde_rename_all(&input.attrs)?;

    let mut field_exprs = Vec::new();
    for field in &fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "Record requires named fields"))?;
        let orm = parse_orm_field_options(&field.attrs)?;
        let serde = parse_serde_field_options(&field.attrs)?;

        let serde_skipped = serde.skip || (serde.skip_serializing && serde.skip_deserializing);
        if orm.transient && !serde_skipped {
            return Err(syn::Error::new(
                field.span(),
                "#[orm(transient)] requires #[serde(skip)], otherwise the field is still stored",
            ));
        }

        // Transient fields never reach the store, so their type is not described.
        if orm.transient || serde_skipped {
            if orm.identity || orm.index.is_some() || orm.index_text {
                return Err(syn::Error::new(
                    field.span(),
                    "a transient field cannot be the identity or carry an index",
                ));
            }
            continue;
        }

        let raw_name = ident.unraw().to_string();
        let name = match serde.rename {
            Some(name) => name,
            None => apply_rename_all(&raw_name, rename_all.as_deref()),
        };
        let shape = shape_of(&field.ty)?;
        let visibility = match &field.vis {
            syn::Visibility::Public(_) => quote!(::docorm::core::Visibility::Public),
            syn::Visibility::Restricted(_) => quote!(::docorm::core::Visibility::Restricted),
            syn::Visibility::Inherited => quote!(::docorm::core::Visibility::Private),
        };
        let readable = !serde.skip_serializing;
        let writable = !serde.skip_deserializing;

        let mut expr = quote! {
            ::docorm::core::FieldSchema::new(#name, #shape)
                .visibility(#visibility)
                .accessors(#readable, #writable)
        };
        if orm.identity {
            expr = quote!(#expr.identity());
        }
        if let Some(index) = orm.index {
            let ascending = index.ascending;
            let unique = index.unique;
            let ttl = index.ttl;
            expr = quote! {
                #expr.index(::docorm::core::IndexAttr {
                    ascending: #ascending,
                    unique: #unique,
                    ttl_expire_after_seconds: #ttl,
                })
            };
        }
        if orm.index_text {
            expr = quote!(#expr.index_text());
        }
        field_exprs.push(expr);
    }

    let record_name = struct_name.unraw().to_string();
    Ok(quote! {
        impl ::docorm::entity::Record for #struct_name {
            fn record_schema() -> ::docorm::core::RecordSchema {
                ::docorm::core::RecordSchema::new(#record_name)
                    .type_path(::std::any::type_name::<Self>())
                    #(.field(#field_exprs))*
            }
        }
    })
}

fn shape_of(ty: &Type) -> syn::Result<TokenStream2> {
    match ty {
        Type::Paren(inner) => shape_of(&inner.elem),
        Type::Group(inner) => shape_of(&inner.elem),
        Type::Array(array) => {
            let element = shape_of(&array.elem)?;
            Ok(quote!(::docorm::core::Shape::array(#element)))
        }
        Type::Path(type_path) if type_path.qself.is_none() => {
            let segment = type_path
                .path
                .segments
                .last()
                .ok_or_else(|| syn::Error::new(ty.span(), "empty type path"))?;
            let name = segment.ident.to_string();

            if let Some(kind) = base_kind(&name) {
                return Ok(quote!(::docorm::core::Shape::base(::docorm::core::BaseKind::#kind)));
            }

            match name.as_str() {
                "DateTime" | "NaiveDateTime" | "NaiveDate" | "SystemTime" => {
                    Ok(quote!(::docorm::core::Shape::Date))
                }
                "Box" => shape_of(single_arg(ty, &segment.arguments)?),
                "Option" => {
                    let inner = shape_of(single_arg(ty, &segment.arguments)?)?;
                    Ok(quote!(::docorm::core::Shape::optional(#inner)))
                }
                "Vec" => {
                    let element = shape_of(single_arg(ty, &segment.arguments)?)?;
                    Ok(quote!(::docorm::core::Shape::list(#element)))
                }
                "HashSet" => {
                    let element = shape_of(single_arg(ty, &segment.arguments)?)?;
                    Ok(quote!(::docorm::core::Shape::set(#element)))
                }
                "HashMap" => {
                    let args = type_args(&segment.arguments);
                    if args.len() < 2 {
                        return Err(syn::Error::new(ty.span(), "HashMap needs key and value types"));
                    }
                    let key = shape_of(args[0])?;
                    let value = shape_of(args[1])?;
                    Ok(quote!(::docorm::core::Shape::map(#key, #value)))
                }
                "VecDeque" | "LinkedList" | "BinaryHeap" => specialized(&name, quote!(List), &segment.arguments),
                "BTreeSet" | "IndexSet" => specialized(&name, quote!(Set), &segment.arguments),
                "BTreeMap" | "IndexMap" => specialized(&name, quote!(Map), &segment.arguments),
                _ => Ok(quote! {
                    ::docorm::core::Shape::record(<#ty as ::docorm::entity::Record>::record_schema)
                }),
            }
        }
        _ => Err(syn::Error::new(
            ty.span(),
            "unsupported field type for Record; use an owned type",
        )),
    }
}

fn base_kind(name: &str) -> Option<TokenStream2> {
    let kind = match name {
        "bool" => quote!(Bool),
        "i8" => quote!(I8),
        "i16" => quote!(I16),
        "i32" => quote!(I32),
        "i64" | "isize" => quote!(I64),
        "u8" => quote!(U8),
        "u16" => quote!(U16),
        "u32" => quote!(U32),
        "u64" | "usize" => quote!(U64),
        "f32" => quote!(F32),
        "f64" => quote!(F64),
        "char" => quote!(Char),
        "String" => quote!(Text),
        _ => return None,
    };
    Some(kind)
}

fn specialized(name: &str, kind: TokenStream2, arguments: &PathArguments) -> syn::Result<TokenStream2> {
    let params = type_args(arguments)
        .into_iter()
        .map(shape_of)
        .collect::<syn::Result<Vec<_>>>()?;
    Ok(quote! {
        ::docorm::core::Shape::specialized(
            #name,
            ::docorm::core::ContainerKind::#kind,
            vec![#(#params),*],
        )
    })
}

fn type_args(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn single_arg<'a>(ty: &Type, arguments: &'a PathArguments) -> syn::Result<&'a Type> {
    type_args(arguments)
        .first()
        .copied()
        .ok_or_else(|| syn::Error::new(ty.span(), "expected a type argument"))
}

fn parse_orm_field_options(attrs: &[syn::Attribute]) -> syn::Result<OrmFieldOptions> {
    let mut options = OrmFieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                options.identity = true;
                return Ok(());
            }

            if meta.path.is_ident("index_text") {
                options.index_text = true;
                return Ok(());
            }

            if meta.path.is_ident("transient") {
                options.transient = true;
                return Ok(());
            }

            if meta.path.is_ident("index") {
                let mut index = IndexOptions {
                    ascending: true,
                    ..Default::default()
                };
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|inner| {
                        if inner.path.is_ident("unique") {
                            index.unique = true;
                            return Ok(());
                        }
                        if inner.path.is_ident("descending") {
                            index.ascending = false;
                            return Ok(());
                        }
                        if inner.path.is_ident("ascending") {
                            let lit: LitBool = inner.value()?.parse()?;
                            index.ascending = lit.value;
                            return Ok(());
                        }
                        if inner.path.is_ident("ttl") {
                            let lit: LitInt = inner.value()?.parse()?;
                            index.ttl = lit.base10_parse::<u64>()?;
                            return Ok(());
                        }
                        Err(inner.error(
                            "Unsupported index option. Supported: ascending = <bool>, descending, unique, ttl = <seconds>",
                        ))
                    })?;
                }
                options.index = Some(index);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[orm(...)] option. Supported: id, index, index(...), index_text, transient",
            ))
        })?;
    }

    Ok(options)
}

fn parse_serde_field_options(attrs: &[syn::Attribute]) -> syn::Result<SerdeFieldOptions> {
    let mut options = SerdeFieldOptions {
        rename: None,
        skip: false,
        skip_serializing: false,
        skip_deserializing: false,
    };

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }
            if meta.path.is_ident("skip_serializing") {
                options.skip_serializing = true;
                return Ok(());
            }
            if meta.path.is_ident("skip_deserializing") {
                options.skip_deserializing = true;
                return Ok(());
            }
            if meta.path.is_ident("flatten") {
                return Err(meta.error("Record does not support #[serde(flatten)]"));
            }
            if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                let lit: LitStr = meta.value()?.parse()?;
                options.rename = Some(lit.value());
                return Ok(());
            }
            skip_serde_option(&meta)
        })?;
    }

    Ok(options)
}

fn parse_serde_rename_all(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut rename_all = None;

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") && meta.input.peek(syn::Token![=]) {
                let lit: LitStr = meta.value()?.parse()?;
                rename_all = Some(lit.value());
                return Ok(());
            }
            skip_serde_option(&meta)
        })?;
    }

    Ok(rename_all)
}

/// Consumes a serde option this derive does not interpret.
fn skip_serde_option(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

fn apply_rename_all(field: &str, rule: Option<&str>) -> String {
    let words = field.split('_').filter(|word| !word.is_empty()).collect::<Vec<_>>();
    let capitalize = |word: &str| {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    };

    match rule {
        Some("lowercase") => field.to_lowercase(),
        Some("UPPERCASE") => field.to_uppercase(),
        Some("PascalCase") => words.iter().map(|word| capitalize(word)).collect(),
        Some("camelCase") => words
            .iter()
            .enumerate()
            .map(|(i, word)| if i == 0 { word.to_string() } else { capitalize(word) })
            .collect(),
        Some("SCREAMING_SNAKE_CASE") => field.to_uppercase(),
        Some("kebab-case") => words.join("-"),
        Some("SCREAMING-KEBAB-CASE") => words.join("-").to_uppercase(),
        _ => field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_without_serde_skip_is_rejected() {
        let input: DeriveInput = syn::parse_quote! {
            struct Session {
                #[orm(id)]
                id: i64,
                #[orm(transient)]
                token: String,
            }
        };
        let err = expand_record(input).unwrap_err();
        assert!(err.to_string().contains("#[serde(skip)]"));
    }

    #[test]
    fn transient_with_serde_skip_is_left_out() {
        let input: DeriveInput = syn::parse_quote! {
            struct Session {
                #[orm(id)]
                id: i64,
                #[orm(transient)]
                #[serde(skip)]
                token: String,
            }
        };
        let tokens = expand_record(input).unwrap().to_string();
        assert!(tokens.contains("\"id\""));
        assert!(!tokens.contains("\"token\""));
    }

    #[test]
    fn both_skip_sides_count_as_transient() {
        let input: DeriveInput = syn::parse_quote! {
            struct Session {
                #[orm(id)]
                id: i64,
                #[orm(transient)]
                #[serde(skip_serializing, skip_deserializing)]
                token: String,
            }
        };
        assert!(expand_record(input).is_ok());
    }

    #[test]
    fn schema_carries_full_type_path() {
        let input: DeriveInput = syn::parse_quote! {
            struct Item {
                #[orm(id)]
                id: i64,
            }
        };
        let tokens = expand_record(input).unwrap().to_string();
        assert!(tokens.contains("type_name"));
    }
}
