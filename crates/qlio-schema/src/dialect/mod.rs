//! Dialect capability descriptors.
//!
//! A [`Dialect`] is an immutable value describing everything that differs
//! between backends: capability flags, placeholder syntax, identifier
//! quoting, the last-insert-id expression, index naming conventions, and
//! the catalog queries and row transforms used for reflection. Query
//! generation and session orchestration branch on the flags only.
//!
//! # Supported Dialects
//!
//! - PostgreSQL (`$n` placeholders, `RETURNING`, `ILIKE`)
//! - MySQL (`%(name)s` placeholders, `LAST_INSERT_ID()`)
//! - SQLite (`:name` placeholders, single-table column reflection)

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlCatalog;
pub use postgres::PostgresCatalog;
pub use sqlite::SqliteCatalog;

use std::fmt;

use qlio_core::{
    Error, ParamStyle, Params, QuoteStyle, Result, Row, SchemaErrorKind, SqlType, Statement, Value,
};

use crate::column::{Column, ColumnDefault};
use crate::index::Index;

/// Name of the bound parameter carrying the reflection table filter.
pub const TABLE_NAME_PARAM: &str = "table_name";

/// Backend-specific catalog access: reflection SQL and row transforms.
///
/// Implementations are stateless; the owning [`Dialect`] supplies the
/// placeholder for the table filter.
pub trait Catalog: Send + Sync + fmt::Debug {
    /// Columns query. `filter` is the placeholder text when filtering by table.
    ///
    /// `table` is the raw table name, for backends that cannot bind it.
    fn column_sql(&self, table: Option<&str>, filter: Option<&str>) -> Result<String>;

    /// Indexes query, ordered so rows of one index are adjacent in key order.
    fn index_sql(&self, filter: Option<&str>) -> String;

    /// Whether the columns query takes the table name as a bound parameter.
    fn binds_column_filter(&self) -> bool {
        true
    }

    /// Map one catalog row to a column.
    fn transform_column(&self, row: &Row, table: Option<&str>) -> Result<Column>;

    /// Key grouping consecutive index rows: `(table, index)`.
    fn index_group_key(&self, row: &Row) -> (String, String);

    /// Build an index from one group of rows, or `None` to skip it.
    fn transform_index(&self, rows: &[Row]) -> Option<Index>;

    fn primary_key_index_name(&self, table: &str) -> String;

    fn unique_index_name(&self, table: &str, column: &str) -> String;

    /// Column type and constraint text for an auto-increment column.
    fn serial_column_sql(&self, column: &Column) -> String;
}

/// Per-backend capability descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    name: &'static str,
    /// Named checkpoints inside a transaction.
    has_checkpoints: bool,
    /// Native auto-increment column declarations.
    has_serial: bool,
    /// `INSERT ... RETURNING`.
    has_returns: bool,
    /// `INSERT INTO t DEFAULT VALUES`.
    has_default: bool,
    /// Case-insensitive `ILIKE`.
    has_ilike: bool,
    /// `TRUNCATE TABLE`.
    has_truncate: bool,
    /// Expression yielding the last generated key on this connection.
    last_value_expression: &'static str,
    param_style: ParamStyle,
    quote_style: QuoteStyle,
    catalog: &'static dyn Catalog,
}

impl Dialect {
    pub const fn postgres() -> Self {
        Self {
            name: "postgresql",
            has_checkpoints: true,
            has_serial: true,
            has_returns: true,
            has_default: true,
            has_ilike: true,
            has_truncate: true,
            last_value_expression: "LASTVAL()",
            param_style: ParamStyle::Numeric,
            quote_style: QuoteStyle::Double,
            catalog: &PostgresCatalog,
        }
    }

    pub const fn mysql() -> Self {
        Self {
            name: "mysql",
            has_checkpoints: true,
            has_serial: true,
            has_returns: false,
            has_default: true,
            has_ilike: false,
            has_truncate: true,
            last_value_expression: "LAST_INSERT_ID()",
            param_style: ParamStyle::PyFormat,
            quote_style: QuoteStyle::Backtick,
            catalog: &MysqlCatalog,
        }
    }

    pub const fn sqlite() -> Self {
        Self {
            name: "sqlite",
            has_checkpoints: true,
            has_serial: false,
            has_returns: false,
            has_default: false,
            has_ilike: false,
            has_truncate: false,
            last_value_expression: "last_insert_rowid()",
            param_style: ParamStyle::Named,
            quote_style: QuoteStyle::Double,
            catalog: &SqliteCatalog,
        }
    }

    /// Resolve a dialect by backend name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::postgres()),
            "mysql" => Ok(Self::mysql()),
            "sqlite" | "sqlite3" => Ok(Self::sqlite()),
            other => Err(Error::config(format!("unknown dialect '{other}'"))),
        }
    }

    /// Override the placeholder style, e.g. when the driver dictates one.
    #[must_use]
    pub const fn with_param_style(mut self, style: ParamStyle) -> Self {
        self.param_style = style;
        self
    }

    /// Same backend with named checkpoints switched on or off.
    #[must_use]
    pub const fn with_checkpoints(mut self, enabled: bool) -> Self {
        self.has_checkpoints = enabled;
        self
    }

    #[must_use]
    pub const fn with_serial(mut self, enabled: bool) -> Self {
        self.has_serial = enabled;
        self
    }

    /// Same backend with `RETURNING` switched on or off.
    #[must_use]
    pub const fn with_returns(mut self, enabled: bool) -> Self {
        self.has_returns = enabled;
        self
    }

    #[must_use]
    pub const fn with_default(mut self, enabled: bool) -> Self {
        self.has_default = enabled;
        self
    }

    #[must_use]
    pub const fn with_ilike(mut self, enabled: bool) -> Self {
        self.has_ilike = enabled;
        self
    }

    #[must_use]
    pub const fn with_truncate(mut self, enabled: bool) -> Self {
        self.has_truncate = enabled;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub const fn has_checkpoints(&self) -> bool {
        self.has_checkpoints
    }

    pub const fn has_serial(&self) -> bool {
        self.has_serial
    }

    pub const fn has_returns(&self) -> bool {
        self.has_returns
    }

    pub const fn has_default(&self) -> bool {
        self.has_default
    }

    pub const fn has_ilike(&self) -> bool {
        self.has_ilike
    }

    pub const fn has_truncate(&self) -> bool {
        self.has_truncate
    }

    /// Expression yielding the last generated key on this connection.
    pub const fn last_value_expression(&self) -> &'static str {
        self.last_value_expression
    }

    pub fn param_style(&self) -> ParamStyle {
        self.param_style
    }

    pub fn quote_style(&self) -> QuoteStyle {
        self.quote_style
    }

    pub fn catalog(&self) -> &'static dyn Catalog {
        self.catalog
    }

    /// Placeholder for parameter `name` bound at 1-based `position`.
    pub fn emit_param(&self, name: &str, position: usize) -> String {
        self.param_style.emit(name, position)
    }

    /// Quote an identifier for this backend.
    pub fn quote(&self, ident: &str) -> String {
        self.quote_style.quote(ident)
    }

    /// Name the backend gives a table's primary key index.
    pub fn primary_key_index_name(&self, table: &str) -> String {
        self.catalog.primary_key_index_name(table)
    }

    /// Name the backend gives the index behind a column's UNIQUE constraint.
    pub fn unique_index_name(&self, table: &str, column: &str) -> String {
        self.catalog.unique_index_name(table, column)
    }

    fn table_filter(&self, table: Option<&str>) -> (Option<String>, Params) {
        let mut params = Params::new();
        match table {
            Some(name) => {
                params.bind(TABLE_NAME_PARAM, Value::Text(name.to_string()));
                (Some(self.emit_param(TABLE_NAME_PARAM, 1)), params)
            }
            None => (None, params),
        }
    }

    /// Column reflection query, for one table or the whole schema.
    pub fn get_column_sql(&self, table: Option<&str>) -> Result<Statement> {
        if self.catalog.binds_column_filter() {
            let (filter, params) = self.table_filter(table);
            let sql = self.catalog.column_sql(table, filter.as_deref())?;
            Ok(Statement::new(sql, params))
        } else {
            Ok(Statement::raw(self.catalog.column_sql(table, None)?))
        }
    }

    /// Index reflection query, for one table or the whole schema.
    pub fn get_index_sql(&self, table: Option<&str>) -> Statement {
        let (filter, params) = self.table_filter(table);
        Statement::new(self.catalog.index_sql(filter.as_deref()), params)
    }

    /// Lazily map catalog rows to columns.
    ///
    /// `table` names the reflected table for backends whose rows omit it.
    pub fn transform_rows_to_columns<'a>(
        &self,
        rows: &'a [Row],
        table: Option<&'a str>,
    ) -> impl Iterator<Item = Result<Column>> + use<'a> {
        let catalog = self.catalog;
        rows.iter().map(move |row| catalog.transform_column(row, table))
    }

    /// Lazily group catalog rows into indexes.
    ///
    /// Consecutive rows sharing `(table, index)` form one index, with columns
    /// in row order.
    pub fn transform_rows_to_indexes<'a>(
        &self,
        rows: &'a [Row],
    ) -> impl Iterator<Item = Index> + use<'a> {
        let catalog = self.catalog;
        rows.chunk_by(move |a, b| catalog.index_group_key(a) == catalog.index_group_key(b))
            .filter_map(move |group| catalog.transform_index(group))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for Dialect {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.param_style == other.param_style
    }
}

// ============================================================================
// Shared catalog helpers
// ============================================================================

/// A catalog type name split into base name and length, e.g. `VARCHAR(255)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSqlType {
    /// Lowercased base type name (e.g., `varchar`, `integer`)
    pub base_type: String,
    /// Length for character types
    pub length: Option<u32>,
    /// Whether the type is unsigned (MySQL)
    pub unsigned: bool,
}

impl ParsedSqlType {
    /// Parse a catalog type string.
    ///
    /// - `VARCHAR(255)` -> base_type: "varchar", length: 255
    /// - `INT UNSIGNED` -> base_type: "int", unsigned: true
    /// - `DECIMAL(10,2)` -> base_type: "decimal", no length
    pub fn parse(type_str: &str) -> Self {
        let type_str = type_str.trim().to_ascii_lowercase();
        let (type_str, unsigned) = match type_str.strip_suffix(" unsigned") {
            Some(rest) => (rest.to_string(), true),
            None => (type_str, false),
        };

        match (type_str.find('('), type_str.rfind(')')) {
            (Some(open), Some(close)) if close > open => {
                let params = &type_str[open + 1..close];
                let length = if params.contains(',') {
                    None
                } else {
                    params.trim().parse().ok()
                };
                Self {
                    base_type: type_str[..open].trim().to_string(),
                    length,
                    unsigned,
                }
            }
            _ => Self {
                base_type: type_str,
                length: None,
                unsigned,
            },
        }
    }
}

pub(crate) fn unknown_type(type_name: &str) -> Error {
    Error::schema(
        SchemaErrorKind::UnknownType,
        format!("Cannot parse type {type_name}"),
    )
}

/// Text field; catalogs report names as text, some drivers as bytes.
pub(crate) fn text(row: &Row, field: &str) -> Option<String> {
    match row.get_by_name(field)? {
        Value::Text(s) => Some(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        Value::Null => None,
        other => Some(other.to_sql_literal()),
    }
}

/// Integer field, tolerating numeric text.
pub(crate) fn int(row: &Row, field: &str) -> Option<i64> {
    match row.get_by_name(field)? {
        Value::Text(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

/// Boolean field, tolerating integer flags and `YES`/`t`-style text.
pub(crate) fn flag(row: &Row, field: &str) -> bool {
    match row.get_by_name(field) {
        Some(Value::Text(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "y" | "t" | "true" | "1"
        ),
        Some(other) => other.as_bool().unwrap_or(false),
        None => false,
    }
}

pub(crate) fn required_text(row: &Row, field: &str) -> Result<String> {
    text(row, field).ok_or_else(|| {
        Error::schema(
            SchemaErrorKind::Invalid,
            format!("catalog row is missing '{field}'"),
        )
    })
}

/// Interpret a reflected default expression.
///
/// Absent, `NULL` and sequence defaults mean no client default; literals
/// become values; anything else is kept as a backend expression.
pub(crate) fn parse_default(raw: Option<&str>, sql_type: SqlType) -> ColumnDefault {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ColumnDefault::None;
    };
    if raw.eq_ignore_ascii_case("null") || raw.starts_with("nextval(") {
        return ColumnDefault::None;
    }

    // Strip a trailing `::type` cast outside the literal.
    let literal = match raw.rfind("::") {
        Some(pos) if raw[..pos].ends_with('\'') => &raw[..pos],
        _ => raw,
    };
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        let inner = literal[1..literal.len() - 1].replace("''", "'");
        return ColumnDefault::Value(coerce_literal(inner, sql_type));
    }

    if let Ok(n) = literal.parse::<i64>() {
        return ColumnDefault::Value(match sql_type {
            SqlType::Boolean => Value::Bool(n != 0),
            _ => Value::BigInt(n),
        });
    }
    if let Ok(f) = literal.parse::<f64>() {
        return ColumnDefault::Value(Value::Double(f));
    }
    match literal.to_ascii_lowercase().as_str() {
        "true" => ColumnDefault::Value(Value::Bool(true)),
        "false" => ColumnDefault::Value(Value::Bool(false)),
        _ => ColumnDefault::Expression(raw.to_string()),
    }
}

/// A quoted literal on a numeric column still denotes a number.
fn coerce_literal(inner: String, sql_type: SqlType) -> Value {
    if sql_type.is_integer() {
        if let Ok(n) = inner.parse::<i64>() {
            return Value::BigInt(n);
        }
    }
    if sql_type == SqlType::Real {
        if let Ok(f) = inner.parse::<f64>() {
            return Value::Double(f);
        }
    }
    if sql_type == SqlType::Boolean {
        match inner.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => return Value::Bool(true),
            "f" | "false" | "0" => return Value::Bool(false),
            _ => {}
        }
    }
    Value::Text(inner)
}
