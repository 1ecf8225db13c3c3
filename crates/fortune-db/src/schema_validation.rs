//! Table name validation to prevent SQL injection and ensure valid PostgreSQL identifiers.

use fortune_core::{Error, Result};

/// Validate a PostgreSQL table name for safety and correctness.
///
/// The share table name comes from configuration and is interpolated into
/// SQL, so it must:
/// - Not be empty
/// - Not exceed 63 characters (PostgreSQL identifier limit)
/// - Contain only ASCII alphanumeric characters and underscores
/// - Not start with a digit
/// - Not be a SQL keyword (basic check)
///
/// # Examples
///
/// ```
/// use fortune_db::validate_table_name;
///
/// assert!(validate_table_name("share_records").is_ok());
/// assert!(validate_table_name("123invalid").is_err());
/// assert!(validate_table_name("").is_err());
/// ```
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("Table name cannot be empty".to_string()));
    }

    if name.len() > 63 {
        return Err(Error::InvalidInput(format!(
            "Table name exceeds 63 character limit: {} characters",
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::InvalidInput(format!(
                "Table name must start with a letter or underscore, found: '{}'",
                first
            )));
        }
    }

    if let Some(ch) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::InvalidInput(format!(
            "Table name contains invalid character: '{}'. Only alphanumeric and underscore allowed",
            ch
        )));
    }

    const RESERVED_KEYWORDS: &[&str] = &[
        "select", "insert", "update", "delete", "drop", "create", "alter", "grant", "revoke",
        "truncate", "table", "user",
    ];

    if RESERVED_KEYWORDS.contains(&name.to_lowercase().as_str()) {
        return Err(Error::InvalidInput(format!(
            "Table name '{}' is a reserved SQL keyword",
            name
        )));
    }

    Ok(())
}
