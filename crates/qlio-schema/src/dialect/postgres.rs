//! PostgreSQL catalog access.
//!
//! Columns come from `information_schema.columns` joined with the primary
//! key constraint; indexes from `pg_index`, unnesting `indkey` so each key
//! column yields one row in key order.

use qlio_core::{Result, Row, SqlType};

use super::{Catalog, ParsedSqlType, flag, int, parse_default, required_text, text, unknown_type};
use crate::column::{Column, ColumnDefault};
use crate::index::Index;

/// Catalog queries and transforms for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresCatalog;

const COLUMN_SQL: &str = "SELECT c.table_name, c.column_name, c.data_type, \
c.character_maximum_length, c.is_nullable, c.column_default, \
(pk.column_name IS NOT NULL) AS is_primary_key \
FROM information_schema.columns c \
LEFT JOIN (\
SELECT kcu.table_schema, kcu.table_name, kcu.column_name \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
WHERE tc.constraint_type = 'PRIMARY KEY'\
) pk ON pk.table_schema = c.table_schema AND pk.table_name = c.table_name \
AND pk.column_name = c.column_name \
WHERE c.table_schema = 'public'";

const INDEX_SQL: &str = "SELECT i.relname AS index_name, t.relname AS table_name, \
a.attname AS column_name, ix.indisunique AS is_unique \
FROM pg_index ix \
JOIN pg_class t ON t.oid = ix.indrelid \
JOIN pg_class i ON i.oid = ix.indexrelid \
JOIN pg_namespace n ON n.oid = t.relnamespace \
CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
WHERE n.nspname = 'public'";

fn map_type(data_type: &str, length: Option<i64>) -> Result<SqlType> {
    let parsed = ParsedSqlType::parse(data_type);
    let length = length
        .and_then(|l| u32::try_from(l).ok())
        .or(parsed.length);
    let sql_type = match parsed.base_type.as_str() {
        "smallint" | "int2" => SqlType::SmallInt,
        "integer" | "int" | "int4" => SqlType::Integer,
        "bigint" | "int8" => SqlType::BigInt,
        "text" => SqlType::Text,
        "character varying" | "varchar" | "character" | "char" => SqlType::String(length),
        "boolean" | "bool" => SqlType::Boolean,
        "real" | "double precision" | "float4" | "float8" => SqlType::Real,
        t if t.starts_with("timestamp") => SqlType::Timestamp,
        _ => return Err(unknown_type(data_type)),
    };
    Ok(sql_type)
}

impl Catalog for PostgresCatalog {
    fn column_sql(&self, _table: Option<&str>, filter: Option<&str>) -> Result<String> {
        let mut sql = COLUMN_SQL.to_string();
        if let Some(p) = filter {
            sql.push_str(&format!(" AND c.table_name = {p}"));
        }
        sql.push_str(" ORDER BY c.table_name, c.ordinal_position");
        Ok(sql)
    }

    fn index_sql(&self, filter: Option<&str>) -> String {
        let mut sql = INDEX_SQL.to_string();
        if let Some(p) = filter {
            sql.push_str(&format!(" AND t.relname = {p}"));
        }
        sql.push_str(" ORDER BY t.relname, i.relname, k.ord");
        sql
    }

    fn transform_column(&self, row: &Row, table: Option<&str>) -> Result<Column> {
        let name = required_text(row, "column_name")?;
        let data_type = required_text(row, "data_type")?;
        let sql_type = map_type(&data_type, int(row, "character_maximum_length"))?;
        let raw_default = text(row, "column_default");

        let auto_increment = raw_default
            .as_deref()
            .is_some_and(|d| d.starts_with("nextval("));
        let default = if auto_increment {
            ColumnDefault::None
        } else {
            parse_default(raw_default.as_deref(), sql_type)
        };

        let mut column = Column::new(name, sql_type)
            .nullable(flag(row, "is_nullable"))
            .with_default(default);
        if flag(row, "is_primary_key") {
            column = column.primary_key();
        }
        if auto_increment {
            column = column.auto_increment();
        }
        if let Some(table_name) = text(row, "table_name").or_else(|| table.map(str::to_string)) {
            column = column.with_table_name(table_name);
        }
        Ok(column)
    }

    fn index_group_key(&self, row: &Row) -> (String, String) {
        (
            text(row, "table_name").unwrap_or_default(),
            text(row, "index_name").unwrap_or_default(),
        )
    }

    fn transform_index(&self, rows: &[Row]) -> Option<Index> {
        let first = rows.first()?;
        let name = text(first, "index_name")?;
        let table_name = text(first, "table_name")?;
        let columns: Vec<String> = rows.iter().filter_map(|r| text(r, "column_name")).collect();
        Some(Index::reflected(
            name,
            table_name,
            columns,
            flag(first, "is_unique"),
        ))
    }

    fn primary_key_index_name(&self, table: &str) -> String {
        format!("{table}_pkey")
    }

    fn unique_index_name(&self, table: &str, column: &str) -> String {
        format!("{table}_{column}_key")
    }

    fn serial_column_sql(&self, column: &Column) -> String {
        match column.sql_type() {
            SqlType::SmallInt => "SMALLSERIAL".to_string(),
            SqlType::BigInt => "BIGSERIAL".to_string(),
            _ => "SERIAL".to_string(),
        }
    }
}
