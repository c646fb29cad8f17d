//! Core types and traits for qlio.
//!
//! This crate provides the foundations shared by every other qlio crate:
//!
//! - `Error` taxonomy separating caller bugs, unsupported operations,
//!   schema translation failures, integrity violations and backend errors
//! - `Value`, `Row` and `Params` for data crossing the backend boundary
//! - `Executor`, `Transaction` and `Connector`, the traits backend drivers implement
//! - `Dsn` connection configuration
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Budget, Cx, Outcome, RegionId, TaskId};

pub mod config;
pub mod connection;
pub mod error;
pub mod identifiers;
pub mod params;
pub mod row;
pub mod types;
pub mod value;

pub use config::Dsn;
pub use connection::{
    BufferedResultSet, Connector, Executor, ManagedTransaction, ResultSet, Transaction,
    TransactionState,
};
pub use error::{
    ConnectionError, ConnectionErrorKind, ContractError, ContractErrorKind, Error, PoolError,
    PoolErrorKind, QueryError, QueryErrorKind, Result, SchemaError, SchemaErrorKind, TypeError,
    UnsupportedError,
};
pub use identifiers::{
    QuoteStyle, is_plain_identifier, quote_ident, quote_ident_mysql, sanitize_identifier,
    unquote_ident,
};
pub use params::{ParamStyle, Params, Statement};
pub use row::Row;
pub use types::SqlType;
pub use value::Value;
