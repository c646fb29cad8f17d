//! SELECT query builder.

use std::sync::Arc;

use crate::clause::OrderBy;
use crate::expr::Expr;
use qlio_core::{Params, Statement};
use qlio_schema::{Dialect, Table};

/// A SELECT query over one table.
///
/// The projection defaults to the table's columns in declaration order, so
/// the generated SQL is stable for a fixed schema.
#[derive(Debug, Clone)]
pub struct Select {
    dialect: Dialect,
    table: Arc<Table>,
    /// Columns to select (empty = all table columns)
    columns: Vec<String>,
    /// WHERE predicate, AND-combined across `filter` calls
    where_clause: Option<Expr>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
}

impl Select {
    /// Create a new SELECT query for `table`.
    pub fn new(dialect: Dialect, table: Arc<Table>) -> Self {
        Self {
            dialect,
            table,
            columns: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Select specific columns.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|&s| s.to_string()).collect();
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Add an OR WHERE condition.
    pub fn or_filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.or(expr),
            None => expr,
        });
        self
    }

    /// Add ORDER BY clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Make this a DISTINCT query.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Build the SQL and its bound parameters.
    pub fn generate_sql(&self) -> Statement {
        let mut params = Params::new();
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        let projection: Vec<String> = if self.columns.is_empty() {
            self.table
                .columns()
                .iter()
                .map(|c| self.dialect.quote(c.name()))
                .collect()
        } else {
            self.columns.iter().map(|c| self.dialect.quote(c)).collect()
        };
        sql.push_str(&projection.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&self.dialect.quote(self.table.name()));

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.build(&self.dialect, &mut params));
        }

        if !self.order_by.is_empty() {
            let terms: Vec<_> = self
                .order_by
                .iter()
                .map(|o| o.build(&self.dialect, &mut params))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        if let Some(n) = self.offset {
            sql.push_str(&format!(" OFFSET {n}"));
        }

        Statement::new(sql, params)
    }
}
