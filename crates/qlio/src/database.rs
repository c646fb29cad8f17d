//! Binding a dialect to a connector.
//!
//! A [`Database`] is the entry point applications hold on to: it knows which
//! backend it talks to (the [`Dialect`]) and how to get transactions from it
//! (the [`Connector`]). Sessions are created from it, either manually or as
//! scoped units of work.
//!
//! # Example
//!
//! ```rust,ignore
//! use qlio::prelude::*;
//!
//! let db = Database::connect("postgresql://app@db.local/app", connector)?;
//!
//! let alice = db
//!     .session(&cx, async |session| {
//!         let row = TableRow::new(users.clone()).with("name", "alice")?;
//!         session.insert_now(&cx, row).await
//!     })
//!     .await;
//! ```

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use qlio_core::{Connector, Dsn, Error, ParamStyle, Result};
use qlio_pool::{ManageConnection, Pool, PoolConfig, PooledConnector};
use qlio_schema::{Dialect, Table};
use qlio_session::{Session, run_scoped};

/// DSN parameter that overrides the dialect's placeholder style.
pub const PARAM_STYLE_PARAM: &str = "paramstyle";

/// A dialect bound to a connector.
#[derive(Debug, Clone)]
pub struct Database<C: Connector> {
    connector: C,
    dialect: Dialect,
}

impl<C: Connector> Database<C> {
    pub fn new(dialect: Dialect, connector: C) -> Self {
        Self { connector, dialect }
    }

    /// Bind `connector` to the dialect named by a DSN string.
    pub fn connect(dsn: &str, connector: C) -> Result<Self> {
        Self::from_dsn(&Dsn::parse(dsn)?, connector)
    }

    /// Bind `connector` to the dialect named by `dsn`.
    ///
    /// A `paramstyle` query parameter overrides the dialect's default
    /// placeholder style.
    pub fn from_dsn(dsn: &Dsn, connector: C) -> Result<Self> {
        let mut dialect = Dialect::from_name(dsn.dialect_name()?)?;
        if let Some(style) = dsn.param(PARAM_STYLE_PARAM) {
            dialect = dialect.with_param_style(ParamStyle::from_name(style)?);
        }
        tracing::debug!(
            dialect = %dialect,
            host = dsn.host.as_deref().unwrap_or(""),
            database = dsn.database.as_deref().unwrap_or(""),
            "Bound database"
        );
        Ok(Self::new(dialect, connector))
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// A new, unstarted session. The caller drives its lifecycle.
    pub fn get_session(&self) -> Session<'_, C> {
        Session::new(&self.connector, self.dialect)
    }

    /// Run `f` as a scoped unit of work: committed and closed on success,
    /// rolled back and closed with an error otherwise.
    pub async fn session<T, F>(&self, cx: &Cx, f: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(&mut Session<'_, C>) -> Outcome<T, Error>,
    {
        run_scoped(cx, &self.connector, self.dialect, f).await
    }

    /// Reflect one table from the live catalog in its own short session.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn reflect_table(&self, cx: &Cx, name: &str) -> Outcome<Table, Error> {
        let mut session = self.get_session();
        match session.start(cx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        let reflected = session.reflect_table(cx, name).await;
        let closed = match &reflected {
            Outcome::Ok(_) => session.close(cx).await,
            _ => session.close_with_error(cx).await,
        };
        match (reflected, closed) {
            (Outcome::Ok(table), Outcome::Ok(())) => Outcome::Ok(table),
            (Outcome::Ok(_), Outcome::Err(e)) => Outcome::Err(e),
            (Outcome::Ok(_), Outcome::Cancelled(r)) => Outcome::Cancelled(r),
            (Outcome::Ok(_), Outcome::Panicked(p)) => Outcome::Panicked(p),
            (failed, closed) => {
                if let Outcome::Err(e) = closed {
                    tracing::warn!(error = %e, "Close failed after reflection error");
                }
                failed
            }
        }
    }
}

impl<M: ManageConnection> Database<PooledConnector<M>> {
    /// Bind a connection pool built from `manager` to the dialect named by `dsn`.
    pub fn pooled(dsn: &str, manager: M, config: PoolConfig) -> Result<Self> {
        let pool = Arc::new(Pool::new(manager, config));
        Self::connect(dsn, PooledConnector::new(pool))
    }

    pub fn pool(&self) -> &Arc<Pool<M>> {
        self.connector.pool()
    }
}
