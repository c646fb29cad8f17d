//! Materialized table rows with change history.

use std::sync::Arc;

use qlio_core::{Error, Result, Row, SchemaErrorKind, TypeError, Value};

use crate::column::ColumnId;
use crate::table::Table;

/// One record of a table.
///
/// Each column slot holds a current value and the previous (last
/// reconciled) value; a column is changed when the two differ. An unset
/// slot is `None`, which is distinct from an explicit `Value::Null`.
#[derive(Debug, Clone)]
pub struct TableRow {
    table: Arc<Table>,
    values: Vec<Option<Value>>,
    previous: Vec<Option<Value>>,
    existed: bool,
    deleted: bool,
}

impl TableRow {
    /// A fresh row with every column unset, destined for insert.
    pub fn new(table: Arc<Table>) -> Self {
        let width = table.columns().len();
        Self {
            table,
            values: vec![None; width],
            previous: vec![None; width],
            existed: false,
            deleted: false,
        }
    }

    /// A row loaded from a result set. Result columns the table does not
    /// declare are ignored.
    pub fn from_row(table: Arc<Table>, row: &Row) -> Self {
        let mut table_row = Self::new(table);
        for (name, value) in row.iter() {
            if let Some(id) = table_row.table.column_id(name) {
                table_row.store_column_value(id, value.clone(), false);
            }
        }
        table_row.existed = true;
        table_row
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Has this row been inserted or loaded from the backend?
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    fn resolve(&self, name: &str) -> Result<ColumnId> {
        self.table.column_id(name).ok_or_else(|| {
            Error::schema(
                SchemaErrorKind::ColumnNotFound,
                format!("table '{}' has no column '{}'", self.table.name(), name),
            )
        })
    }

    /// Assign a value as a user change.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let id = self.resolve(name)?;
        let value = value.into();
        let column = &self.table.columns()[id.index()];
        if !column.sql_type().accepts(&value) {
            return Err(Error::Type(TypeError {
                expected: "a value matching the column type",
                actual: value.type_name().to_string(),
                column: Some(name.to_string()),
            }));
        }
        self.store_column_value(id, value, true);
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Current value, `None` when unset.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.table
            .column_id(name)
            .and_then(|id| self.get_column_value(id))
    }

    pub fn get_column_value(&self, id: ColumnId) -> Option<&Value> {
        self.values.get(id.index()).and_then(Option::as_ref)
    }

    /// Previous (last reconciled) value, `None` when unset.
    pub fn get_previous_value(&self, id: ColumnId) -> Option<&Value> {
        self.previous.get(id.index()).and_then(Option::as_ref)
    }

    pub fn is_set(&self, id: ColumnId) -> bool {
        self.get_column_value(id).is_some()
    }

    /// Store a value. Without history tracking the previous value moves too,
    /// so backend-computed state never shows up as a change.
    pub fn store_column_value(&mut self, id: ColumnId, value: Value, track_history: bool) {
        let Some(slot) = self.values.get_mut(id.index()) else {
            return;
        };
        if !track_history {
            if let Some(prev) = self.previous.get_mut(id.index()) {
                *prev = Some(value.clone());
            }
        }
        *slot = Some(value);
    }

    /// Columns whose current value differs from the previous one, in
    /// declaration order.
    pub fn changed_columns(&self) -> Vec<ColumnId> {
        self.values
            .iter()
            .zip(&self.previous)
            .enumerate()
            .filter(|(_, (current, previous))| current != previous)
            .map(|(i, _)| ColumnId(i))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.values.iter().zip(&self.previous).any(|(c, p)| c != p)
    }

    /// Values locating this row: each primary key column's previous value,
    /// falling back to the current one.
    pub fn primary_key_values(&self) -> Vec<(ColumnId, Value)> {
        self.table
            .primary_key()
            .into_iter()
            .map(|id| {
                let value = self
                    .get_previous_value(id)
                    .or_else(|| self.get_column_value(id))
                    .cloned()
                    .unwrap_or(Value::Null);
                (id, value)
            })
            .collect()
    }

    /// Make the current values the new baseline.
    pub fn reset_history(&mut self) {
        self.previous.clone_from(&self.values);
    }

    /// Reconcile after an insert.
    pub fn mark_inserted(&mut self) {
        self.existed = true;
        self.deleted = false;
    }

    /// Reconcile after a delete.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Current values as `(name, value)` pairs, unset columns skipped.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.table
            .columns()
            .iter()
            .zip(&self.values)
            .filter_map(|(c, v)| v.as_ref().map(|v| (c.name(), v)))
    }
}
