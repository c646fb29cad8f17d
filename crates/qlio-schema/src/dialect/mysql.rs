//! MySQL catalog access through `information_schema`.

use qlio_core::{Result, Row, SqlType, Value};

use super::{Catalog, ParsedSqlType, flag, int, parse_default, required_text, text, unknown_type};
use crate::column::{Column, ColumnDefault};
use crate::index::Index;

/// Catalog queries and transforms for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlCatalog;

const CURRENT_SCHEMA: &str = "table_schema IN (SELECT database() FROM dual)";

fn map_type(data_type: &str, length: Option<i64>) -> Result<SqlType> {
    let parsed = ParsedSqlType::parse(data_type);
    let base = parsed.base_type.as_str();
    // Order matters: `smallint`/`bigint`/`tinyint` before the `int` prefix.
    let sql_type = match base {
        "smallint" => SqlType::SmallInt,
        "bigint" => SqlType::BigInt,
        "tinyint" | "bool" | "boolean" => SqlType::Boolean,
        b if b.starts_with("int") || b == "mediumint" => SqlType::Integer,
        b if b.ends_with("text") => SqlType::Text,
        "varchar" | "char" => SqlType::String(
            length
                .and_then(|l| u32::try_from(l).ok())
                .or(parsed.length),
        ),
        "float" | "double" | "real" => SqlType::Real,
        "timestamp" | "datetime" => SqlType::Timestamp,
        _ => return Err(unknown_type(data_type)),
    };
    Ok(sql_type)
}

/// MySQL reports text defaults unquoted; a bare word on a text column is
/// a literal unless it is a function call or `CURRENT_TIMESTAMP`.
fn mysql_default(raw: Option<&str>, sql_type: SqlType) -> ColumnDefault {
    match raw {
        Some(raw)
            if sql_type.is_text()
                && !raw.eq_ignore_ascii_case("null")
                && !raw.starts_with('\'')
                && !raw.contains('(')
                && !raw.to_ascii_uppercase().starts_with("CURRENT_") =>
        {
            ColumnDefault::Value(Value::Text(raw.to_string()))
        }
        _ => parse_default(raw, sql_type),
    }
}

impl Catalog for MysqlCatalog {
    fn column_sql(&self, _table: Option<&str>, filter: Option<&str>) -> Result<String> {
        let mut sql = format!("SELECT * FROM information_schema.columns WHERE {CURRENT_SCHEMA}");
        if let Some(p) = filter {
            sql.push_str(&format!(" AND table_name={p}"));
        }
        sql.push_str(" ORDER BY TABLE_NAME, ORDINAL_POSITION");
        Ok(sql)
    }

    fn index_sql(&self, filter: Option<&str>) -> String {
        let mut sql =
            format!("SELECT * FROM information_schema.statistics WHERE {CURRENT_SCHEMA}");
        if let Some(p) = filter {
            sql.push_str(&format!(" AND table_name={p}"));
        }
        sql.push_str(" ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX");
        sql
    }

    fn transform_column(&self, row: &Row, table: Option<&str>) -> Result<Column> {
        let name = required_text(row, "COLUMN_NAME")?;
        let data_type = required_text(row, "DATA_TYPE")?;
        let sql_type = map_type(&data_type, int(row, "CHARACTER_MAXIMUM_LENGTH"))?;
        let default = mysql_default(text(row, "COLUMN_DEFAULT").as_deref(), sql_type);

        let mut column = Column::new(name, sql_type)
            .nullable(flag(row, "IS_NULLABLE"))
            .with_default(default);
        if text(row, "COLUMN_KEY").as_deref() == Some("PRI") {
            column = column.primary_key();
        }
        if text(row, "EXTRA").is_some_and(|e| e.contains("auto_increment")) {
            column = column.auto_increment();
        }
        if let Some(table_name) = text(row, "TABLE_NAME").or_else(|| table.map(str::to_string)) {
            column = column.with_table_name(table_name);
        }
        Ok(column)
    }

    fn index_group_key(&self, row: &Row) -> (String, String) {
        (
            text(row, "TABLE_NAME").unwrap_or_default(),
            text(row, "INDEX_NAME").unwrap_or_default(),
        )
    }

    fn transform_index(&self, rows: &[Row]) -> Option<Index> {
        let first = rows.first()?;
        let name = text(first, "INDEX_NAME")?;
        let table_name = text(first, "TABLE_NAME")?;
        let columns: Vec<String> = rows.iter().filter_map(|r| text(r, "COLUMN_NAME")).collect();
        Some(Index::reflected(
            name,
            table_name,
            columns,
            !flag(first, "NON_UNIQUE"),
        ))
    }

    fn primary_key_index_name(&self, _table: &str) -> String {
        "PRIMARY".to_string()
    }

    fn unique_index_name(&self, _table: &str, column: &str) -> String {
        column.to_string()
    }

    fn serial_column_sql(&self, column: &Column) -> String {
        format!("{} AUTO_INCREMENT", column.sql_type().sql_name())
    }
}
