//! Parameter bindings and placeholder emission.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// How a backend spells a bound parameter inside SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamStyle {
    /// `:name`
    Named,
    /// `%(name)s`
    PyFormat,
    /// `$1`, `$2`, ...
    Numeric,
    /// `?`
    QMark,
    /// `?1`, `?2`, ...
    NumberedQMark,
}

impl ParamStyle {
    /// Resolve a driver-reported style name.
    ///
    /// An unknown style means the driver and the dialect disagree about the
    /// wire format, so it is rejected outright rather than guessed at.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "named" => Ok(ParamStyle::Named),
            "pyformat" => Ok(ParamStyle::PyFormat),
            "numeric" => Ok(ParamStyle::Numeric),
            "qmark" => Ok(ParamStyle::QMark),
            "numbered" => Ok(ParamStyle::NumberedQMark),
            other => Err(Error::Unsupported(crate::error::UnsupportedError {
                operation: format!("parameter style '{other}'"),
                dialect: None,
            })),
        }
    }

    /// Emit the placeholder for the parameter `name` bound at 1-based `position`.
    pub fn emit(self, name: &str, position: usize) -> String {
        match self {
            ParamStyle::Named => format!(":{name}"),
            ParamStyle::PyFormat => format!("%({name})s"),
            ParamStyle::Numeric => format!("${position}"),
            ParamStyle::QMark => "?".to_string(),
            ParamStyle::NumberedQMark => format!("?{position}"),
        }
    }

    /// Does the placeholder carry the parameter name?
    pub const fn is_named(self) -> bool {
        matches!(self, ParamStyle::Named | ParamStyle::PyFormat)
    }
}

/// An ordered set of named parameter bindings.
///
/// Names are unique within one statement. Positional backends consume
/// [`Params::values`], which follows placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Create an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under a generated `param_<n>` name and return the name.
    pub fn push(&mut self, value: Value) -> String {
        let name = format!("param_{}", self.entries.len());
        self.entries.push((name.clone(), value));
        name
    }

    /// Bind `value` under an explicit name.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Values in binding order.
    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Iterate over `(name, value)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A generated `(sql, params)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A statement with no bindings.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Params::new())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_each_style() {
        assert_eq!(ParamStyle::Named.emit("table_name", 1), ":table_name");
        assert_eq!(ParamStyle::PyFormat.emit("table_name", 1), "%(table_name)s");
        assert_eq!(ParamStyle::Numeric.emit("param_2", 3), "$3");
        assert_eq!(ParamStyle::QMark.emit("x", 9), "?");
        assert_eq!(ParamStyle::NumberedQMark.emit("x", 2), "?2");
    }

    #[test]
    fn unknown_style_is_rejected() {
        assert_eq!(ParamStyle::from_name("pyformat").unwrap(), ParamStyle::PyFormat);
        let err = ParamStyle::from_name("format").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn push_generates_sequential_names() {
        let mut params = Params::new();
        assert_eq!(params.push(Value::BigInt(1)), "param_0");
        assert_eq!(params.push(Value::Text("a".into())), "param_1");
        assert_eq!(params.get("param_1"), Some(&Value::Text("a".into())));
        assert_eq!(params.values(), vec![Value::BigInt(1), Value::Text("a".into())]);
    }
}
