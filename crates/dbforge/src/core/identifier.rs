//! Identifier validation, quoting and parameter-name sanitizing.
//!
//! Identifiers cannot be bound as statement parameters, so every table or
//! column name that the engine interpolates into generated DDL/DML goes through
//! [`quote`] (or [`quote_qualified`] for `schema.table` names). Clause fragments
//! given to the fluent builder (`select`, `where_raw`, `order_by`, ...) are
//! caller-authored SQL and are passed through untouched.

use crate::error::{DbError, Result};

/// Maximum identifier length accepted by any supported backend.
/// - PostgreSQL: 63 bytes
/// - MySQL: 64 characters
/// - SQL Server: 128 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Quoting convention of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `` `name` `` (MySQL)
    Backtick,
    /// `"name"` (PostgreSQL)
    DoubleQuote,
    /// `[name]` (SQL Server, dblib)
    Bracket,
}

/// Validate an identifier.
///
/// Rejects empty names, names containing NUL and names longer than
/// [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(DbError::Config(format!(
            "Identifier contains a null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a single identifier, escaping the closing quote character.
pub fn quote(name: &str, style: QuoteStyle) -> Result<String> {
    validate_identifier(name)?;
    Ok(match style {
        QuoteStyle::Backtick => format!("`{}`", name.replace('`', "``")),
        QuoteStyle::DoubleQuote => format!("\"{}\"", name.replace('"', "\"\"")),
        QuoteStyle::Bracket => format!("[{}]", name.replace(']', "]]")),
    })
}

/// Quote a possibly dotted name (`schema.table`, `table.column`) part by part.
pub fn quote_qualified(name: &str, style: QuoteStyle) -> Result<String> {
    validate_identifier(name)?;
    let parts = name
        .split('.')
        .map(|part| quote(part, style))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("."))
}

/// Split `schema.table` into its parts; unqualified names have no schema.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

/// Base of a generated parameter name: the column with everything outside
/// `[A-Za-z0-9_]` turned into `_` (so `u.age` becomes `u_age`).
pub fn param_base(column: &str) -> String {
    let base: String = column
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if base.is_empty() {
        "p".to_string()
    } else {
        base
    }
}

/// Escape a value for inclusion in a single-quoted SQL string literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
