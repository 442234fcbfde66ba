//! SQL identifier quoting.

/// Quote an identifier for SQLite, doubling any embedded `"`.
///
/// ```
/// use cipherdb_core::quote_ident;
/// assert_eq!(quote_ident("user"), "\"user\"");
/// assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
/// ```
#[must_use]
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
