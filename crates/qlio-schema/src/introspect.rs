//! Reflection of live catalog metadata into the schema model.
//!
//! The [`Introspector`] issues the dialect's catalog queries through any
//! [`Executor`] and hands the raw rows to the dialect's transforms.

use asupersync::{Cx, Outcome};
use qlio_core::{Error, Executor, ResultSet, Row, SchemaErrorKind, Statement};

use crate::column::Column;
use crate::dialect::Dialect;
use crate::index::Index;
use crate::table::Table;

/// Reflects columns, indexes and whole tables for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Introspector {
    dialect: Dialect,
}

impl Introspector {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn fetch_rows<E: Executor>(
        &self,
        cx: &Cx,
        exec: &mut E,
        stmt: &Statement,
    ) -> Outcome<Vec<Row>, Error> {
        let mut cursor = match exec.cursor(cx, &stmt.sql, &stmt.params).await {
            Outcome::Ok(cursor) => cursor,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let rows = match cursor.fetch_all(cx).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match cursor.close(cx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        tracing::debug!(sql = %stmt.sql, rows = rows.len(), "Fetched catalog rows");
        Outcome::Ok(rows)
    }

    /// Reflect the columns of one table, or of the whole schema.
    ///
    /// An unrecognized column type fails the whole call.
    #[tracing::instrument(level = "debug", skip(self, cx, exec), fields(dialect = %self.dialect))]
    pub async fn columns<E: Executor>(
        &self,
        cx: &Cx,
        exec: &mut E,
        table: Option<&str>,
    ) -> Outcome<Vec<Column>, Error> {
        let stmt = match self.dialect.get_column_sql(table) {
            Ok(stmt) => stmt,
            Err(e) => return Outcome::Err(e),
        };
        let rows = match self.fetch_rows(cx, exec, &stmt).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match self
            .dialect
            .transform_rows_to_columns(&rows, table)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(columns) => Outcome::Ok(columns),
            Err(e) => Outcome::Err(e),
        }
    }

    /// Reflect the indexes of one table, or of the whole schema.
    #[tracing::instrument(level = "debug", skip(self, cx, exec), fields(dialect = %self.dialect))]
    pub async fn indexes<E: Executor>(
        &self,
        cx: &Cx,
        exec: &mut E,
        table: Option<&str>,
    ) -> Outcome<Vec<Index>, Error> {
        let stmt = self.dialect.get_index_sql(table);
        match self.fetch_rows(cx, exec, &stmt).await {
            Outcome::Ok(rows) => Outcome::Ok(self.dialect.transform_rows_to_indexes(&rows).collect()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Reflect one table into a detached [`Table`].
    ///
    /// The primary key index is implied by the columns and dropped; a
    /// single-column unique index carrying the backend's unique-constraint
    /// name becomes the column's `unique` flag instead.
    #[tracing::instrument(level = "debug", skip(self, cx, exec), fields(dialect = %self.dialect))]
    pub async fn table<E: Executor>(
        &self,
        cx: &Cx,
        exec: &mut E,
        name: &str,
    ) -> Outcome<Table, Error> {
        let mut columns = match self.columns(cx, exec, Some(name)).await {
            Outcome::Ok(columns) => columns,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        if columns.is_empty() {
            return Outcome::Err(Error::schema(
                SchemaErrorKind::TableNotFound,
                format!("table '{name}' not found"),
            ));
        }
        let indexes = match self.indexes(cx, exec, Some(name)).await {
            Outcome::Ok(indexes) => indexes,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let pk_index = self.dialect.primary_key_index_name(name);
        let mut table_indexes = Vec::new();
        for index in indexes {
            if !pk_index.is_empty() && index.name() == pk_index {
                continue;
            }
            if index.is_unique() && index.columns().len() == 1 {
                let column_name = index.columns()[0].name();
                let constraint = self.dialect.unique_index_name(name, column_name);
                if !constraint.is_empty() && index.name() == constraint {
                    if let Some(column) = columns.iter_mut().find(|c| c.name() == column_name) {
                        column.set_unique(true);
                        continue;
                    }
                }
            }
            table_indexes.push(index);
        }

        let mut table = columns
            .into_iter()
            .fold(Table::new(name), Table::with_column);
        table = table_indexes.into_iter().fold(table, Table::with_index);
        if let Err(e) = table.attach(None) {
            return Outcome::Err(e);
        }
        tracing::debug!(
            table = %name,
            columns = table.columns().len(),
            indexes = table.indexes().len(),
            "Reflected table"
        );
        Outcome::Ok(table)
    }
}
