//! qlio - a dialect-aware ORM core.
//!
//! qlio describes tables at runtime, reflects them from live catalogs,
//! generates dialect-correct SQL, and orchestrates sessions that reconcile
//! rows with what the backend actually wrote:
//!
//! - One capability descriptor per backend (PostgreSQL, MySQL, SQLite)
//! - Table, column and index model with reflection and DDL generation
//! - Select / insert / update / delete / truncate builders
//! - Sessions over one transaction with a strict lifecycle
//! - A connection pool that plugs in as a connector
//!
//! # Quick Start
//!
//! ```ignore
//! use qlio::prelude::*;
//!
//! let users = Arc::new(
//!     Table::new("users")
//!         .with_column(Column::new("id", SqlType::Integer).primary_key().auto_increment())
//!         .with_column(Column::new("name", SqlType::Text).not_null()),
//! );
//!
//! let db = Database::connect("sqlite:///var/data/app.db", connector)?;
//!
//! let outcome = db
//!     .session(&cx, async |session| {
//!         // Insert; the generated id is read back into the row
//!         let row = TableRow::new(users.clone()).with("name", "alice")?;
//!         let mut row = session.insert_now(&cx, row).await?;
//!
//!         // Update only what changed
//!         row.set("name", "alicia")?;
//!         let row = session.update_now(&cx, row).await?;
//!
//!         // Query
//!         let select = session
//!             .select(&users)
//!             .filter(Expr::col("name").like("ali%"))
//!             .order_by(OrderBy::asc("id"));
//!         session.run_select_query(&cx, &select).await?.all(&cx).await
//!     })
//!     .await;
//! ```
//!
//! Drivers are external: they implement [`Connector`] and [`Transaction`]
//! (or [`ManageConnection`] behind the pool).

pub mod database;

pub use database::{Database, PARAM_STYLE_PARAM};

pub use qlio_core::{
    // asupersync re-exports
    Budget,
    Cx,
    Outcome,
    RegionId,
    TaskId,
    // Core types
    BufferedResultSet,
    Connector,
    ContractErrorKind,
    Dsn,
    Error,
    Executor,
    ManagedTransaction,
    ParamStyle,
    Params,
    PoolErrorKind,
    QueryErrorKind,
    Result,
    ResultSet,
    Row,
    SchemaErrorKind,
    SqlType,
    Statement,
    Transaction,
    Value,
};

pub use qlio_schema::{
    Column, ColumnDefault, ColumnId, Dialect, Index, IndexColumn, Introspector, Metadata, Table,
    TableId, TableRow, create_all, drop_table,
};

pub use qlio_query::{
    BinaryOp, Delete, Expr, Insert, NullsOrder, OrderBy, OrderDirection, Select, Truncate, Update,
    delete, insert, select, update,
};

pub use qlio_session::{Session, SessionState, TableRowStream, run_scoped};

pub use qlio_pool::{
    ManageConnection, Pool, PoolConfig, PoolStats, PooledConnection, PooledConnector,
    PooledTransaction,
};

/// Everything needed for everyday use.
///
/// ```ignore
/// use qlio::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        // asupersync
        Cx,
        Outcome,
        // Binding
        Database,
        Dialect,
        Dsn,
        Error,
        // Schema
        Column,
        ColumnDefault,
        Index,
        Metadata,
        Table,
        TableRow,
        // Values
        Row,
        SqlType,
        Value,
        // Queries
        Expr,
        OrderBy,
        Select,
        // Sessions
        Session,
        SessionState,
        // Pooling
        Pool,
        PoolConfig,
    };
}
