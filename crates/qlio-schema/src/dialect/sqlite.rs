//! SQLite catalog access.
//!
//! Columns come from `PRAGMA table_info`, which only covers one table at a
//! time. Indexes come from `sqlite_master`, which stores the `CREATE INDEX`
//! text rather than per-column rows, so the column list is parsed out of it.

use std::sync::OnceLock;

use qlio_core::{Error, Result, Row, SqlType, quote_ident, unquote_ident};
use regex::Regex;

use super::{Catalog, ParsedSqlType, flag, int, parse_default, required_text, text, unknown_type};
use crate::column::Column;
use crate::index::Index;

/// Catalog queries and transforms for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCatalog;

fn column_list() -> Option<&'static Regex> {
    static COLUMN_LIST: OnceLock<Option<Regex>> = OnceLock::new();
    COLUMN_LIST
        .get_or_init(|| {
            Regex::new(r#"(?is)\bON\s+(?:"(?:[^"]|"")*"|`[^`]*`|\[[^\]]*\]|[^\s(]+)\s*\(([^)]*)\)"#)
                .ok()
        })
        .as_ref()
}

fn map_type(declared: &str) -> Result<SqlType> {
    let parsed = ParsedSqlType::parse(declared);
    let sql_type = match parsed.base_type.as_str() {
        "integer" | "int" | "mediumint" => SqlType::Integer,
        "smallint" | "int2" => SqlType::SmallInt,
        "bigint" | "int8" => SqlType::BigInt,
        "tinyint" | "boolean" | "bool" => SqlType::Boolean,
        "text" | "clob" => SqlType::Text,
        "varchar" | "char" | "character" | "nvarchar" | "nchar" | "varying character" => {
            SqlType::String(parsed.length)
        }
        "real" | "float" | "double" | "double precision" => SqlType::Real,
        "timestamp" | "datetime" => SqlType::Timestamp,
        _ => return Err(unknown_type(declared)),
    };
    Ok(sql_type)
}

/// Column names from the list following `ON <table>` in a `CREATE INDEX`
/// statement. A partial index's `WHERE` clause is not part of it.
fn index_columns(sql: &str) -> Option<Vec<String>> {
    let captures = column_list()?.captures(sql)?;
    let list = captures.get(1)?.as_str();
    let columns: Vec<String> = list
        .split(',')
        .map(unquote_ident)
        .filter(|c| !c.is_empty())
        .collect();
    (!columns.is_empty()).then_some(columns)
}

impl Catalog for SqliteCatalog {
    fn column_sql(&self, table: Option<&str>, _filter: Option<&str>) -> Result<String> {
        match table {
            Some(table) => Ok(format!("PRAGMA table_info({})", quote_ident(table))),
            None => Err(Error::unsupported("whole-schema column reflection", "sqlite")),
        }
    }

    fn index_sql(&self, filter: Option<&str>) -> String {
        let mut sql = "SELECT * FROM sqlite_master WHERE type='index'".to_string();
        if let Some(p) = filter {
            sql.push_str(&format!(" AND tbl_name={p}"));
        }
        sql
    }

    fn binds_column_filter(&self) -> bool {
        false
    }

    fn transform_column(&self, row: &Row, table: Option<&str>) -> Result<Column> {
        let name = required_text(row, "name")?;
        let declared = required_text(row, "type")?;
        let sql_type = map_type(&declared)?;
        let pk = int(row, "pk").unwrap_or(0);

        let mut column = Column::new(name, sql_type)
            .nullable(!flag(row, "notnull"))
            .with_default(parse_default(text(row, "dflt_value").as_deref(), sql_type));
        if pk > 0 {
            column = column.primary_key();
        }
        // INTEGER PRIMARY KEY aliases the rowid.
        if pk == 1 && sql_type == SqlType::Integer {
            column = column.auto_increment();
        }
        if let Some(table) = table {
            column = column.with_table_name(table);
        }
        Ok(column)
    }

    fn index_group_key(&self, row: &Row) -> (String, String) {
        (
            text(row, "tbl_name").unwrap_or_default(),
            text(row, "name").unwrap_or_default(),
        )
    }

    fn transform_index(&self, rows: &[Row]) -> Option<Index> {
        let row = rows.first()?;
        let name = text(row, "name")?;
        let Some(sql) = text(row, "sql") else {
            tracing::debug!(index = %name, "Skipping index without stored DDL");
            return None;
        };
        let Some(columns) = index_columns(&sql) else {
            tracing::warn!(index = %name, sql = %sql, "Skipping index with unparsable DDL");
            return None;
        };
        let unique = sql
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("CREATE UNIQUE INDEX");
        Some(Index::reflected(name, text(row, "tbl_name")?, columns, unique))
    }

    fn primary_key_index_name(&self, _table: &str) -> String {
        String::new()
    }

    fn unique_index_name(&self, _table: &str, _column: &str) -> String {
        String::new()
    }

    fn serial_column_sql(&self, column: &Column) -> String {
        column.sql_type().sql_name()
    }
}
