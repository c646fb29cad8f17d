//! SQL identifier quoting and sanitization utilities.

use std::sync::OnceLock;

use regex::Regex;

/// How a backend quotes identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// ANSI `"name"`
    Double,
    /// MySQL `` `name` ``
    Backtick,
}

impl QuoteStyle {
    /// Quote an identifier in this style.
    pub fn quote(self, name: &str) -> String {
        match self {
            QuoteStyle::Double => quote_ident(name),
            QuoteStyle::Backtick => quote_ident_mysql(name),
        }
    }

    /// Quote a `table.column` reference.
    pub fn quote_qualified(self, table: &str, column: &str) -> String {
        format!("{}.{}", self.quote(table), self.quote(column))
    }
}

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use qlio_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL identifier using MySQL backtick quoting.
///
/// ```
/// use qlio_core::quote_ident_mysql;
///
/// assert_eq!(quote_ident_mysql("user`name"), "`user``name`");
/// ```
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Sanitize a SQL identifier by removing non-alphanumeric/underscore characters.
///
/// Use this when quoting is not possible (e.g., PRAGMA arguments).
#[inline]
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn plain_identifier() -> Option<&'static Regex> {
    static PLAIN: OnceLock<Option<Regex>> = OnceLock::new();
    PLAIN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

/// Does `name` need no quoting to be read back as the same identifier?
pub fn is_plain_identifier(name: &str) -> bool {
    plain_identifier().is_some_and(|re| re.is_match(name))
}

/// Strip one layer of identifier quoting (`"x"`, `` `x` ``, `[x]`) if present.
pub fn unquote_ident(name: &str) -> String {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) if trimmed.len() >= 2 => {
            trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
        }
        (Some('`'), Some('`')) if trimmed.len() >= 2 => {
            trimmed[1..trimmed.len() - 1].replace("``", "`")
        }
        (Some('['), Some(']')) => trimmed[1..trimmed.len() - 1].to_string(),
        _ => trimmed.to_string(),
    }
}
