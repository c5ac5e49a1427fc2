//! SQL identifier quoting and validation.
//!
//! Reflections name columns as plain strings. Before those names reach SQL
//! they are checked with [`is_valid_identifier`]; rendering always quotes them
//! with [`quote_ident`].

use regex::Regex;
use std::sync::OnceLock;

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use grouped_scope_core::quote_ident;
///
/// assert_eq!(quote_ident("reports"), "\"reports\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

/// Check that a name is a plain SQL identifier (letters, digits, underscore,
/// not starting with a digit).
///
/// # Examples
///
/// ```
/// use grouped_scope_core::is_valid_identifier;
///
/// assert!(is_valid_identifier("employee_id"));
/// assert!(!is_valid_identifier("1st"));
/// assert!(!is_valid_identifier("id; DROP TABLE reports"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_some_and(|re| re.is_match(name))
}
