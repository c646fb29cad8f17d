//! Canonical semantic column types.

use crate::value::Value;

/// The semantic type set every backend-native type name maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Boolean,
    Text,
    /// Bounded character data; `None` when the backend reports no length.
    String(Option<u32>),
    Timestamp,
}

impl SqlType {
    /// Get the SQL type name used in generated DDL.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::String(Some(len)) => format!("VARCHAR({})", len),
            SqlType::String(None) => "VARCHAR".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    /// The declarative spelling used in schema dumps, e.g. `String(64)`.
    pub fn schema_name(&self) -> String {
        match self {
            SqlType::SmallInt => "SmallInt()".to_string(),
            SqlType::Integer => "Integer()".to_string(),
            SqlType::BigInt => "BigInt()".to_string(),
            SqlType::Real => "Real()".to_string(),
            SqlType::Boolean => "Boolean()".to_string(),
            SqlType::Text => "Text()".to_string(),
            SqlType::String(Some(len)) => format!("String({})", len),
            SqlType::String(None) => "String()".to_string(),
            SqlType::Timestamp => "Timestamp()".to_string(),
        }
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Text | SqlType::String(_))
    }

    /// Does a value of this shape belong in a column of this type?
    ///
    /// NULL and DEFAULT are accepted everywhere; nullability is checked elsewhere.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null | Value::Default) => true,
            (t, Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_)) if t.is_integer() => true,
            (SqlType::Real, Value::Real(_) | Value::Double(_)) => true,
            (SqlType::Boolean, Value::Bool(_)) => true,
            (t, Value::Text(_)) if t.is_text() => true,
            (SqlType::Timestamp, Value::Timestamp(_) | Value::Text(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_for_ddl_and_dump() {
        assert_eq!(SqlType::String(Some(32)).sql_name(), "VARCHAR(32)");
        assert_eq!(SqlType::String(Some(32)).schema_name(), "String(32)");
        assert_eq!(SqlType::Timestamp.sql_name(), "TIMESTAMP");
    }

    #[test]
    fn accepts_matching_values() {
        assert!(SqlType::BigInt.accepts(&Value::Int(3)));
        assert!(SqlType::Text.accepts(&Value::Null));
        assert!(!SqlType::Boolean.accepts(&Value::Text("yes".into())));
        assert!(SqlType::Real.accepts(&Value::Double(1.5)));
    }
}
