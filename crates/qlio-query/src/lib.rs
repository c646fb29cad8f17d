//! Dialect-correct SQL generation for qlio.
//!
//! `qlio-query` is the **query construction layer**. It turns a table from
//! `qlio-schema` plus a predicate tree or a batch of rows into SQL text and
//! parameter bindings for one [`Dialect`](qlio_schema::Dialect).
//!
//! # Role In The Architecture
//!
//! - **Expression DSL**: `Expr` builds WHERE clauses; literals are always bound.
//! - **Select**: one statement per query.
//! - **Insert / Update / Delete**: one statement per row, so failures are
//!   reported per row and each row can be reconciled as soon as it is written.
//! - **Truncate**: capability-dependent table wipe.
//!
//! Builders are pure. Execution and reconciliation live in `qlio-session`.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod select;

pub use builder::{Delete, Insert, Truncate, Update};
pub use clause::{NullsOrder, OrderBy, OrderDirection};
pub use expr::{BinaryOp, Expr};
pub use select::Select;

use std::sync::Arc;

use qlio_schema::{Dialect, Table};

/// Create a SELECT query over `table`.
pub fn select(dialect: Dialect, table: Arc<Table>) -> Select {
    Select::new(dialect, table)
}

/// Create an INSERT builder for `table`.
pub fn insert(dialect: Dialect, table: Arc<Table>) -> Insert {
    Insert::new(dialect, table)
}

/// Create an UPDATE builder for `table`.
pub fn update(dialect: Dialect, table: Arc<Table>) -> Update {
    Update::new(dialect, table)
}

/// Create a DELETE builder for `table`.
pub fn delete(dialect: Dialect, table: Arc<Table>) -> Delete {
    Delete::new(dialect, table)
}
