//! Procedural macros for cipherdb.
//!
//! `#[derive(Model)]` reflects a struct's named fields into column metadata
//! and implements `cipherdb_core::Model` for it.
//!
//! ```ignore
//! use cipherdb::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! #[cipherdb(table = "Product")]
//! struct Product {
//!     #[cipherdb(primary_key, auto_increment)]
//!     product_id: i64,
//!     #[cipherdb(column = "prod_name", not_null)]
//!     name: String,
//!     #[cipherdb(default = "0", check = "price >= 0")]
//!     price: f64,
//!     #[cipherdb(skip)]
//!     selected: bool,
//! }
//! ```
//!
//! Field attributes: `primary_key`, `auto_increment`, `unique`, `not_null`,
//! `skip`, `column = ".."`, `default = ".."`, `check = ".."`,
//! `references = "table.column"`, `on_delete = ".."`, `on_update = ".."`,
//! `sql_type = ".."`.
//!
//! Generated code names `::cipherdb::__core`, so the derive is meant to be
//! used through the `cipherdb` crate.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model_derive;

/// Derive `cipherdb_core::Model` for a struct with named fields.
#[proc_macro_derive(Model, attributes(cipherdb))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match model_derive::parse_model(&input) {
        Ok(def) => model_derive::generate_model_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
