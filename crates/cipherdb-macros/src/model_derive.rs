//! Implementation of the Model derive macro.
//!
//! Reflects each named field of a struct into a `FieldInfo` entry at compile
//! time, driven by `#[cipherdb(...)]` attributes.

use std::sync::OnceLock;

use proc_macro2::TokenStream;
use quote::{ToTokens, format_ident, quote};
use regex::Regex;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, LitStr, Result, Type};

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name.
    pub name: Ident,
    /// Table name (struct name unless overridden).
    pub table_name: String,
    /// Every named field, including skipped ones.
    pub fields: Vec<FieldDef>,
}

/// Parsed column attributes for a single field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    pub ty: Type,
    /// Column name (field name unless aliased).
    pub column: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub not_null: bool,
    /// Transient: not persisted, filled with `Default::default()` on load.
    pub skip: bool,
    pub default: Option<String>,
    pub check: Option<String>,
    /// `table.column`
    pub references: Option<String>,
    pub on_delete: Option<Ident>,
    pub on_update: Option<Ident>,
    pub sql_type: Option<String>,
}

const IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const REFERENCE: &str = r"^[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*$";

fn pattern_matches(pattern: &str, lit: &LitStr) -> Result<bool> {
    static CACHE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let compiled = CACHE.get_or_init(|| {
        [IDENTIFIER, REFERENCE]
            .into_iter()
            .filter_map(|p| Regex::new(p).ok().map(|re| (p, re)))
            .collect()
    });
    compiled
        .iter()
        .find(|(p, _)| *p == pattern)
        .map(|(_, re)| re.is_match(&lit.value()))
        .ok_or_else(|| Error::new_spanned(lit, format!("invalid validation pattern {pattern}")))
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .map(parse_field)
                .collect::<Result<Vec<_>>>()?,
            Fields::Unnamed(_) => {
                return Err(Error::new_spanned(
                    &data.fields,
                    "Model requires a struct with named fields",
                ));
            }
            Fields::Unit => Vec::new(),
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    let table_name = parse_table_name(input)?;

    let mut primary_keys = fields.iter().filter(|f| f.primary_key);
    if let (Some(_), Some(second)) = (primary_keys.next(), primary_keys.next()) {
        return Err(Error::new_spanned(
            &second.name,
            "a model can declare at most one primary_key field",
        ));
    }

    Ok(ModelDef {
        name: input.ident.clone(),
        table_name,
        fields,
    })
}

fn parse_table_name(input: &DeriveInput) -> Result<String> {
    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("cipherdb") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                check_identifier(&lit, "table name")?;
                table = Some(lit.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(meta.error(format!(
                    "unknown cipherdb struct attribute `{attr_name}`. Valid attributes are: table"
                )))
            }
        })?;
    }
    Ok(table.unwrap_or_else(|| input.ident.to_string()))
}

fn check_identifier(lit: &LitStr, what: &str) -> Result<()> {
    if pattern_matches(IDENTIFIER, lit)? {
        Ok(())
    } else {
        Err(Error::new_spanned(
            lit,
            format!("{what} must be a plain identifier ([A-Za-z_][A-Za-z0-9_]*)"),
        ))
    }
}

fn parse_action(lit: &LitStr) -> Result<Ident> {
    let variant = match lit.value().trim().to_uppercase().as_str() {
        "NO ACTION" | "NO_ACTION" => "NoAction",
        "RESTRICT" => "Restrict",
        "CASCADE" => "Cascade",
        "SET NULL" | "SET_NULL" => "SetNull",
        "SET DEFAULT" | "SET_DEFAULT" => "SetDefault",
        _ => {
            return Err(Error::new_spanned(
                lit,
                "expected one of: NO ACTION, RESTRICT, CASCADE, SET NULL, SET DEFAULT",
            ));
        }
    };
    Ok(Ident::new(variant, lit.span()))
}

/// Parse a single field and its `#[cipherdb(...)]` attributes.
fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut def = FieldDef {
        column: name.to_string(),
        name,
        ty: field.ty.clone(),
        primary_key: false,
        auto_increment: false,
        unique: false,
        not_null: false,
        skip: false,
        default: None,
        check: None,
        references: None,
        on_delete: None,
        on_update: None,
        sql_type: None,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("cipherdb") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                def.primary_key = true;
            } else if path.is_ident("auto_increment") {
                def.auto_increment = true;
            } else if path.is_ident("unique") {
                def.unique = true;
            } else if path.is_ident("not_null") {
                def.not_null = true;
            } else if path.is_ident("skip") {
                def.skip = true;
            } else if path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                check_identifier(&lit, "column name")?;
                def.column = lit.value();
            } else if path.is_ident("default") {
                let lit: LitStr = meta.value()?.parse()?;
                def.default = Some(lit.value());
            } else if path.is_ident("check") {
                let lit: LitStr = meta.value()?.parse()?;
                def.check = Some(lit.value());
            } else if path.is_ident("references") {
                let lit: LitStr = meta.value()?.parse()?;
                if !pattern_matches(REFERENCE, &lit)? {
                    return Err(Error::new_spanned(
                        &lit,
                        "references must have the form \"table.column\"",
                    ));
                }
                def.references = Some(lit.value());
            } else if path.is_ident("on_delete") {
                let lit: LitStr = meta.value()?.parse()?;
                def.on_delete = Some(parse_action(&lit)?);
            } else if path.is_ident("on_update") {
                let lit: LitStr = meta.value()?.parse()?;
                def.on_update = Some(parse_action(&lit)?);
            } else if path.is_ident("sql_type") {
                let lit: LitStr = meta.value()?.parse()?;
                def.sql_type = Some(lit.value());
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown cipherdb attribute `{attr_name}`. \
                         Valid attributes are: primary_key, auto_increment, unique, not_null, \
                         skip, column, default, check, references, on_delete, on_update, sql_type"
                    ),
                ));
            }

            Ok(())
        })?;
    }

    if def.auto_increment && !def.primary_key {
        return Err(Error::new_spanned(
            &def.name,
            "auto_increment requires primary_key on the same field",
        ));
    }
    if def.skip && (def.primary_key || def.references.is_some()) {
        return Err(Error::new_spanned(
            &def.name,
            "a skipped field cannot be a primary key or foreign key",
        ));
    }
    if (def.on_delete.is_some() || def.on_update.is_some()) && def.references.is_none() {
        return Err(Error::new_spanned(
            &def.name,
            "on_delete/on_update require references = \"table.column\"",
        ));
    }

    Ok(def)
}

fn opt_str(value: Option<&String>) -> TokenStream {
    match value {
        Some(s) => quote! { ::core::option::Option::Some(#s) },
        None => quote! { ::core::option::Option::None },
    }
}

fn opt_action(value: Option<&Ident>) -> TokenStream {
    match value {
        Some(variant) => {
            quote! { ::core::option::Option::Some(::cipherdb::__core::ReferentialAction::#variant) }
        }
        None => quote! { ::core::option::Option::None },
    }
}

fn field_info(field: &FieldDef) -> TokenStream {
    let name = field.name.to_string();
    let column = &field.column;
    let ty = &field.ty;
    let primary_key = field.primary_key;
    let auto_increment = field.auto_increment;
    let unique = field.unique;
    let not_null = field.not_null;
    let default = opt_str(field.default.as_ref());
    let check = opt_str(field.check.as_ref());
    let references = opt_str(field.references.as_ref());
    let sql_type = opt_str(field.sql_type.as_ref());
    let on_delete = opt_action(field.on_delete.as_ref());
    let on_update = opt_action(field.on_update.as_ref());

    quote! {
        ::cipherdb::__core::FieldInfo::new(
            #name,
            #column,
            <#ty as ::cipherdb::__core::HasSqlType>::SQL_TYPE,
        )
        .nullable(<#ty as ::cipherdb::__core::HasSqlType>::NULLABLE)
        .primary_key(#primary_key)
        .auto_increment(#auto_increment)
        .unique(#unique)
        .not_null(#not_null)
        .default_opt(#default)
        .check_opt(#check)
        .foreign_key_opt(#references)
        .on_delete_opt(#on_delete)
        .on_update_opt(#on_update)
        .sql_type_override_opt(#sql_type)
    }
}

/// Generate the Model trait implementation.
pub fn generate_model_impl(def: &ModelDef) -> TokenStream {
    let name = &def.name;
    let table_name = &def.table_name;

    let persisted: Vec<&FieldDef> = def.fields.iter().filter(|f| !f.skip).collect();
    let field_count = persisted.len();
    let field_infos = persisted.iter().map(|f| field_info(f));
    let statics_ident = format_ident!("__CIPHERDB_FIELDS");

    let to_row_entries = persisted.iter().map(|f| {
        let ident = &f.name;
        let column = &f.column;
        quote! { (#column, ::cipherdb::__core::ToValue::to_value(&self.#ident)) }
    });

    let from_row_entries = def.fields.iter().map(|f| {
        let ident = &f.name;
        let ty = &f.ty;
        let column = &f.column;
        if f.skip {
            quote! { #ident: ::core::default::Default::default() }
        } else {
            quote! { #ident: row.get_field::<#ty>(#column)? }
        }
    });

    let primary_key = persisted.iter().find(|f| f.primary_key);

    let (pk_value, set_pk) = match primary_key {
        Some(pk) => {
            let ident = &pk.name;
            let ty = &pk.ty;
            (
                quote! {
                    ::core::option::Option::Some(::cipherdb::__core::ToValue::to_value(&self.#ident))
                },
                quote! {
                    self.#ident = <#ty as ::cipherdb::__core::FromValue>::from_value(value)?;
                    ::core::result::Result::Ok(())
                },
            )
        }
        None => {
            let message = format!("{table_name} has no primary key");
            (
                quote! { ::core::option::Option::None },
                quote! {
                    let _ = value;
                    ::core::result::Result::Err(::cipherdb::__core::Error::model(#message))
                },
            )
        }
    };

    quote! {
        impl ::cipherdb::__core::Model for #name {
            const TABLE_NAME: &'static str = #table_name;

            fn fields() -> &'static [::cipherdb::__core::FieldInfo] {
                static #statics_ident: [::cipherdb::__core::FieldInfo; #field_count] = [
                    #(#field_infos),*
                ];
                &#statics_ident
            }

            fn to_row(&self) -> ::std::vec::Vec<(&'static str, ::cipherdb::__core::Value)> {
                ::std::vec![#(#to_row_entries),*]
            }

            fn from_row(row: &::cipherdb::__core::Row) -> ::cipherdb::__core::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#from_row_entries),*
                })
            }

            fn primary_key_value(&self) -> ::core::option::Option<::cipherdb::__core::Value> {
                #pk_value
            }

            fn set_primary_key_value(
                &mut self,
                value: &::cipherdb::__core::Value,
            ) -> ::cipherdb::__core::Result<()> {
                #set_pk
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn parse(input: DeriveInput) -> Result<ModelDef> {
        parse_model(&input)
    }

    #[test]
    fn test_parse_product() {
        let def = parse(parse_quote! {
            #[cipherdb(table = "products")]
            struct Product {
                #[cipherdb(primary_key, auto_increment)]
                product_id: i64,
                #[cipherdb(column = "prod_name", not_null, default = "'unnamed'")]
                name: String,
                #[cipherdb(check = "price >= 0")]
                price: f64,
                #[cipherdb(skip)]
                dirty: bool,
            }
        })
        .unwrap();

        assert_eq!(def.table_name, "products");
        assert_eq!(def.fields.len(), 4);
        assert!(def.fields[0].primary_key && def.fields[0].auto_increment);
        assert_eq!(def.fields[1].column, "prod_name");
        assert_eq!(def.fields[1].default.as_deref(), Some("'unnamed'"));
        assert_eq!(def.fields[2].check.as_deref(), Some("price >= 0"));
        assert!(def.fields[3].skip);
    }

    #[test]
    fn test_table_defaults_to_struct_name() {
        let def = parse(parse_quote! {
            struct User {
                #[cipherdb(primary_key)]
                user_id: i64,
            }
        })
        .unwrap();
        assert_eq!(def.table_name, "User");
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let err = parse(parse_quote! {
            struct Bad {
                #[cipherdb(primary_key)]
                a: i64,
                #[cipherdb(primary_key)]
                b: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("at most one primary_key"));
    }

    #[test]
    fn test_auto_increment_without_primary_key_rejected() {
        let err = parse(parse_quote! {
            struct Bad {
                #[cipherdb(auto_increment)]
                a: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("requires primary_key"));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let err = parse(parse_quote! {
            struct Bad {
                #[cipherdb(indexed)]
                a: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("unknown cipherdb attribute `indexed`"));
    }

    #[test]
    fn test_malformed_reference_rejected() {
        let err = parse(parse_quote! {
            struct Bad {
                #[cipherdb(references = "users")]
                owner: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("table.column"));
    }

    #[test]
    fn test_referential_action_parsed() {
        let def = parse(parse_quote! {
            struct Order {
                #[cipherdb(references = "User.user_id", on_delete = "cascade", on_update = "SET NULL")]
                owner: i64,
            }
        })
        .unwrap();
        assert_eq!(def.fields[0].on_delete.as_ref().unwrap(), "Cascade");
        assert_eq!(def.fields[0].on_update.as_ref().unwrap(), "SetNull");

        let err = parse(parse_quote! {
            struct Order {
                #[cipherdb(references = "User.user_id", on_delete = "explode")]
                owner: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("CASCADE"));
    }

    #[test]
    fn test_tuple_struct_and_enum_rejected() {
        assert!(parse(parse_quote! { struct Pair(i64, i64); }).is_err());
        assert!(parse(parse_quote! { enum Kind { A, B } }).is_err());
    }

    #[test]
    fn test_invalid_column_alias_rejected() {
        let err = parse(parse_quote! {
            struct Bad {
                #[cipherdb(column = "drop table")]
                a: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("plain identifier"));
    }

    #[test]
    fn test_generated_impl_skips_transient_fields() {
        let def = parse(parse_quote! {
            struct Note {
                #[cipherdb(primary_key, auto_increment)]
                id: i64,
                body: String,
                #[cipherdb(skip)]
                cached_len: usize,
            }
        })
        .unwrap();
        let code = generate_model_impl(&def).to_string();
        assert!(code.contains("FieldInfo ; 2usize"));
        assert!(code.contains("cached_len : :: core :: default :: Default :: default ()"));
        assert!(!code.contains("\"cached_len\" ,"));
    }
}
