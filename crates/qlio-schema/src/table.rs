//! Tables and the metadata arena that owns them.
//!
//! A [`Table`] owns its columns and indexes by value. Back-references go the
//! other way as plain identifiers: each column and index records the
//! owning [`TableId`] (once registered) and table name, so there are no
//! reference cycles. [`Metadata::register`] finalizes a table exactly once.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use qlio_core::{Error, Result, SchemaErrorKind};

use crate::column::{Column, ColumnDefault, ColumnId};
use crate::dialect::Dialect;
use crate::index::Index;

/// Stable identifier of a table registered in a [`Metadata`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

impl TableId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// A table definition: ordered columns plus indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    id: Option<TableId>,
    name: String,
    columns: Vec<Column>,
    indexes: Vec<Index>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Append a column; declaration order is preserved everywhere.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arena id, once registered.
    pub fn id(&self) -> Option<TableId> {
        self.id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .map(ColumnId)
    }

    pub fn column_by_id(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id.0)
    }

    /// Columns with their ids, in declaration order.
    pub fn columns_with_ids(&self) -> impl Iterator<Item = (ColumnId, &Column)> {
        self.columns.iter().enumerate().map(|(i, c)| (ColumnId(i), c))
    }

    /// Primary key columns in declaration order.
    pub fn primary_key(&self) -> Vec<ColumnId> {
        self.columns_with_ids()
            .filter(|(_, c)| c.is_primary_key())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn auto_increment_columns(&self) -> Vec<ColumnId> {
        self.columns_with_ids()
            .filter(|(_, c)| c.is_auto_increment())
            .map(|(id, _)| id)
            .collect()
    }

    /// Bind columns and indexes to this table.
    ///
    /// Stamps `id` and the table name on every column and index, prefixes
    /// declared index names with `<table>_`, and resolves index column names
    /// to column ids. Fails on duplicate column names and on columns or
    /// indexes that already name a different table.
    pub fn attach(&mut self, id: Option<TableId>) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(Error::schema(
                    SchemaErrorKind::Duplicate,
                    format!("column '{}' declared twice on '{}'", column.name(), self.name),
                ));
            }
            if let Some(other) = column.table_name().filter(|t| *t != self.name) {
                return Err(Error::schema(
                    SchemaErrorKind::Invalid,
                    format!(
                        "column '{}' belongs to '{}', not '{}'",
                        column.name(),
                        other,
                        self.name
                    ),
                ));
            }
        }
        if let Some(index) = self
            .indexes
            .iter()
            .find(|i| i.table_name().is_some_and(|t| t != self.name))
        {
            return Err(Error::schema(
                SchemaErrorKind::Invalid,
                format!("index '{}' does not belong to '{}'", index.name(), self.name),
            ));
        }

        let positions: HashMap<String, ColumnId> = self
            .columns_with_ids()
            .map(|(id, c)| (c.name().to_string(), id))
            .collect();
        for column in &mut self.columns {
            column.bind(id, &self.name);
        }
        for index in &mut self.indexes {
            index.bind(id, &self.name, |name| positions.get(name).copied());
        }
        self.id = id;
        tracing::debug!(table = %self.name, columns = self.columns.len(), indexes = self.indexes.len(), "Attached table");
        Ok(())
    }

    /// `CREATE TABLE` DDL for this dialect, columns in declaration order.
    pub fn create_sql(&self, dialect: &Dialect) -> String {
        let pk_count = self.columns.iter().filter(|c| c.is_primary_key()).count();
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| column_definition(c, dialect, pk_count > 1))
            .collect();
        if pk_count > 1 {
            let pk: Vec<String> = self
                .columns
                .iter()
                .filter(|c| c.is_primary_key())
                .map(|c| dialect.quote(c.name()))
                .collect();
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        format!(
            "CREATE TABLE {} ({})",
            dialect.quote(&self.name),
            parts.join(", ")
        )
    }

    /// `CREATE INDEX` DDL for every index, in declaration order.
    pub fn index_sql(&self) -> Result<Vec<String>> {
        self.indexes.iter().map(Index::get_ddl_sql).collect()
    }

    /// Declarative source for the whole table: columns, then indexes.
    pub fn generate_schema(&self) -> String {
        let mut out = format!("class {}(Table):\n", self.name);
        out.push_str(&format!("    __tablename__ = \"{}\"\n", self.name));
        for column in &self.columns {
            out.push_str("    ");
            out.push_str(&column.generate_schema());
            out.push('\n');
        }
        for index in &self.indexes {
            out.push_str("    ");
            out.push_str(&index.generate_schema());
            out.push('\n');
        }
        out
    }
}

fn column_definition(column: &Column, dialect: &Dialect, composite_pk: bool) -> String {
    let sql_type = if column.is_auto_increment() && dialect.has_serial() {
        dialect.catalog().serial_column_sql(column)
    } else {
        column.sql_type().sql_name()
    };
    let mut def = format!("{} {}", dialect.quote(column.name()), sql_type);
    if column.is_primary_key() && !composite_pk {
        def.push_str(" PRIMARY KEY");
    } else if !column.is_nullable() {
        def.push_str(" NOT NULL");
    }
    if column.is_unique() {
        def.push_str(" UNIQUE");
    }
    if let ColumnDefault::Value(v) = column.default() {
        def.push_str(" DEFAULT ");
        def.push_str(&v.to_sql_literal());
    }
    def
}

/// Arena of registered tables, addressed by [`TableId`] or name.
#[derive(Debug, Default, Clone)]
pub struct Metadata {
    tables: Vec<Arc<Table>>,
    by_name: HashMap<String, TableId>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach and store a table, returning its id.
    pub fn register(&mut self, mut table: Table) -> Result<TableId> {
        if self.by_name.contains_key(table.name()) {
            return Err(Error::schema(
                SchemaErrorKind::Duplicate,
                format!("table '{}' is already registered", table.name()),
            ));
        }
        let id = TableId(self.tables.len());
        table.attach(Some(id))?;
        self.by_name.insert(table.name().to_string(), id);
        self.tables.push(Arc::new(table));
        Ok(id)
    }

    pub fn get(&self, id: TableId) -> Option<&Arc<Table>> {
        self.tables.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Table>> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// Look up a table, failing with `TableNotFound`.
    pub fn table(&self, name: &str) -> Result<&Arc<Table>> {
        self.by_name(name).ok_or_else(|| {
            Error::schema(
                SchemaErrorKind::TableNotFound,
                format!("table '{name}' is not registered"),
            )
        })
    }

    /// Registered tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
