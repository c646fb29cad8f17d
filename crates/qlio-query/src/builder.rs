//! Query builders for INSERT, UPDATE, DELETE and TRUNCATE operations.
//!
//! Row builders own the rows they write so a session can reconcile each row
//! right after its statement runs. Statement generation never mutates rows:
//! calling `generate_sql` twice yields identical statements.

use std::sync::Arc;

use crate::expr::{Expr, bind};
use qlio_core::{Error, Params, Result, SchemaErrorKind, Statement, Value};
use qlio_schema::{Dialect, Table, TableRow};

/// WHERE predicate matching a row by its primary key's previous values.
fn primary_key_filter(
    dialect: &Dialect,
    table: &Table,
    row: &TableRow,
    params: &mut Params,
) -> Result<String> {
    let keys = row.primary_key_values();
    if keys.is_empty() {
        return Err(Error::schema(
            SchemaErrorKind::MissingPrimaryKey,
            format!("table '{}' has no primary key", table.name()),
        ));
    }

    let predicate = keys
        .into_iter()
        .filter_map(|(id, value)| {
            let column = Expr::col(table.column_by_id(id)?.name());
            Some(if value.is_null() {
                column.is_null()
            } else {
                column.eq(value)
            })
        })
        .reduce(Expr::and)
        .ok_or_else(|| {
            Error::schema(
                SchemaErrorKind::MissingPrimaryKey,
                format!("table '{}' has no primary key", table.name()),
            )
        })?;
    Ok(predicate.build(dialect, params))
}

fn check_row_table(table: &Table, row: &TableRow) -> Result<()> {
    if row.table().name() == table.name() {
        return Ok(());
    }
    Err(Error::schema(
        SchemaErrorKind::Invalid,
        format!(
            "row of table '{}' cannot be written through table '{}'",
            row.table().name(),
            table.name()
        ),
    ))
}

/// INSERT query builder.
#[derive(Debug, Clone)]
pub struct Insert {
    dialect: Dialect,
    table: Arc<Table>,
    rows: Vec<TableRow>,
}

impl Insert {
    /// Create a new INSERT builder for `table`.
    pub fn new(dialect: Dialect, table: Arc<Table>) -> Self {
        Self {
            dialect,
            table,
            rows: Vec::new(),
        }
    }

    /// Add rows to insert.
    pub fn rows(mut self, rows: impl IntoIterator<Item = TableRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn add_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn records(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn records_mut(&mut self) -> &mut [TableRow] {
        &mut self.rows
    }

    pub fn into_records(self) -> Vec<TableRow> {
        self.rows
    }

    /// Build the INSERT for one row.
    ///
    /// Unset columns are omitted so the backend applies its own defaults.
    /// On dialects without the `DEFAULT` keyword, columns holding
    /// [`Value::Default`] are omitted too.
    /// A row with nothing set becomes `DEFAULT VALUES`, or on dialects
    /// without that form, an insert of NULL into the auto-increment column
    /// (the first column when there is none).
    pub fn row_statement(&self, row: &TableRow) -> Result<Statement> {
        check_row_table(&self.table, row)?;
        let mut params = Params::new();
        let table_name = self.dialect.quote(self.table.name());

        let (columns, values): (Vec<_>, Vec<_>) = self
            .table
            .columns_with_ids()
            .filter_map(|(id, column)| {
                row.get_column_value(id)
                    .filter(|value| self.dialect.has_default() || !value.is_default())
                    .map(|value| (self.dialect.quote(column.name()), value.clone()))
            })
            .unzip();

        let mut sql = if columns.is_empty() {
            if self.dialect.has_default() {
                format!("INSERT INTO {table_name} DEFAULT VALUES")
            } else {
                let fallback = self
                    .table
                    .auto_increment_columns()
                    .first()
                    .and_then(|id| self.table.column_by_id(*id))
                    .or_else(|| self.table.columns().first())
                    .ok_or_else(|| {
                        Error::schema(
                            SchemaErrorKind::Invalid,
                            format!("table '{}' has no columns", self.table.name()),
                        )
                    })?;
                format!(
                    "INSERT INTO {table_name} ({}) VALUES (NULL)",
                    self.dialect.quote(fallback.name())
                )
            }
        } else {
            let placeholders: Vec<_> = values
                .into_iter()
                .map(|value| bind(&self.dialect, &mut params, value))
                .collect();
            format!(
                "INSERT INTO {table_name} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if self.dialect.has_returns() {
            sql.push_str(" RETURNING *");
        }
        Ok(Statement::new(sql, params))
    }

    /// One statement per row, in row order.
    pub fn generate_sql(&self) -> impl Iterator<Item = Result<Statement>> + '_ {
        self.rows.iter().map(|row| self.row_statement(row))
    }
}

/// UPDATE query builder.
///
/// Each row is written as a diff: only changed columns are SET, and a row
/// with no changes produces no statement at all.
#[derive(Debug, Clone)]
pub struct Update {
    dialect: Dialect,
    table: Arc<Table>,
    rows: Vec<TableRow>,
}

impl Update {
    /// Create a new UPDATE builder for `table`.
    pub fn new(dialect: Dialect, table: Arc<Table>) -> Self {
        Self {
            dialect,
            table,
            rows: Vec::new(),
        }
    }

    /// Add rows to update.
    pub fn rows(mut self, rows: impl IntoIterator<Item = TableRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn add_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn records(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn records_mut(&mut self) -> &mut [TableRow] {
        &mut self.rows
    }

    pub fn into_records(self) -> Vec<TableRow> {
        self.rows
    }

    /// Build the UPDATE for one row, `None` when the row is unchanged.
    ///
    /// Changes to [`Value::Default`] are skipped on dialects without the
    /// `DEFAULT` keyword.
    pub fn row_statement(&self, row: &TableRow) -> Result<Option<Statement>> {
        check_row_table(&self.table, row)?;
        let changed: Vec<_> = row
            .changed_columns()
            .into_iter()
            .filter(|id| {
                self.dialect.has_default()
                    || !row.get_column_value(*id).is_some_and(Value::is_default)
            })
            .collect();
        if changed.is_empty() {
            tracing::trace!(table = %self.table.name(), "Row unchanged, no UPDATE");
            return Ok(None);
        }

        let mut params = Params::new();
        let assignments: Vec<_> = changed
            .into_iter()
            .filter_map(|id| {
                let column = self.table.column_by_id(id)?;
                let value = row.get_column_value(id).cloned().unwrap_or(Value::Null);
                let placeholder = bind(&self.dialect, &mut params, value);
                Some(format!("{} = {placeholder}", self.dialect.quote(column.name())))
            })
            .collect();
        let predicate = primary_key_filter(&self.dialect, &self.table, row, &mut params)?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {predicate}",
            self.dialect.quote(self.table.name()),
            assignments.join(", ")
        );
        Ok(Some(Statement::new(sql, params)))
    }

    /// One entry per row, in row order; unchanged rows yield `None`.
    pub fn generate_sql(&self) -> impl Iterator<Item = Result<Option<Statement>>> + '_ {
        self.rows.iter().map(|row| self.row_statement(row))
    }
}

/// DELETE query builder, one statement per row.
#[derive(Debug, Clone)]
pub struct Delete {
    dialect: Dialect,
    table: Arc<Table>,
    rows: Vec<TableRow>,
}

impl Delete {
    /// Create a new DELETE builder for `table`.
    pub fn new(dialect: Dialect, table: Arc<Table>) -> Self {
        Self {
            dialect,
            table,
            rows: Vec::new(),
        }
    }

    /// Add rows to delete.
    pub fn rows(mut self, rows: impl IntoIterator<Item = TableRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn add_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn records(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn records_mut(&mut self) -> &mut [TableRow] {
        &mut self.rows
    }

    pub fn into_records(self) -> Vec<TableRow> {
        self.rows
    }

    /// Build the DELETE for one row.
    pub fn row_statement(&self, row: &TableRow) -> Result<Statement> {
        check_row_table(&self.table, row)?;
        let mut params = Params::new();
        let predicate = primary_key_filter(&self.dialect, &self.table, row, &mut params)?;
        let sql = format!(
            "DELETE FROM {} WHERE {predicate}",
            self.dialect.quote(self.table.name())
        );
        Ok(Statement::new(sql, params))
    }

    /// One statement per row, in row order.
    pub fn generate_sql(&self) -> impl Iterator<Item = Result<Statement>> + '_ {
        self.rows.iter().map(|row| self.row_statement(row))
    }
}

/// Removes every row of a table.
#[derive(Debug, Clone)]
pub struct Truncate {
    dialect: Dialect,
    table: Arc<Table>,
}

impl Truncate {
    pub fn new(dialect: Dialect, table: Arc<Table>) -> Self {
        Self { dialect, table }
    }

    /// `TRUNCATE TABLE`, or a bare `DELETE FROM` where truncation is missing.
    pub fn generate_sql(&self) -> Statement {
        let table_name = self.dialect.quote(self.table.name());
        if self.dialect.has_truncate() {
            Statement::raw(format!("TRUNCATE TABLE {table_name}"))
        } else {
            Statement::raw(format!("DELETE FROM {table_name}"))
        }
    }
}
