//! Connection pooling for qlio using asupersync.
//!
//! [`Pool`] keeps a bounded set of backend connections produced by a
//! [`ManageConnection`] implementation. [`PooledConnector`] adapts a pool to
//! the [`Connector`] boundary: each [`PooledTransaction`] takes a connection
//! on `begin` and gives it back on `close`, or terminates it when closed with
//! an error so a connection left mid-transaction never re-enters the pool.
//!
//! The pool never waits: acquiring from a pool at capacity fails with
//! [`PoolErrorKind::Exhausted`]. Timeouts are the driver's concern.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use asupersync::{Cx, Outcome};
use qlio_core::{
    ConnectionError, ConnectionErrorKind, Connector, Error, Executor, Params, PoolError,
    PoolErrorKind, Transaction, quote_ident,
};
use serde::{Deserialize, Serialize};

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Minimum number of connections opened by [`Pool::warm_up`]
    pub min_connections: usize,
    /// Maximum number of connections allowed
    pub max_connections: usize,
    /// Test idle connections before giving them out
    pub test_on_checkout: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            test_on_checkout: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given max connections.
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Default::default()
        }
    }

    /// Set minimum connections.
    pub fn min_connections(mut self, n: usize) -> Self {
        self.min_connections = n;
        self
    }

    /// Enable/disable test on checkout.
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of connections (active + idle)
    pub total_connections: usize,
    /// Number of idle connections
    pub idle_connections: usize,
    /// Number of connections handed out
    pub active_connections: usize,
}

/// Opens and checks backend connections for a [`Pool`].
pub trait ManageConnection: Send + Sync + 'static {
    /// The driver connection type.
    type Connection: Executor;

    /// Open a new connection.
    fn connect(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Connection, Error>> + Send;

    /// Check that an idle connection is still usable.
    fn is_valid(
        &self,
        cx: &Cx,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let _ = (cx, conn);
        async { Outcome::Ok(()) }
    }
}

#[derive(Debug)]
struct PoolState<C> {
    idle: VecDeque<C>,
    active: usize,
    closed: bool,
}

impl<C> PoolState<C> {
    fn total(&self) -> usize {
        self.idle.len() + self.active
    }
}

/// A bounded connection pool.
pub struct Pool<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Connection>>,
}

/// Where a checked-out connection came from.
enum Checkout<C> {
    Idle(C),
    /// A slot was reserved; a new connection must be opened.
    Open,
}

impl<M: ManageConnection> Pool<M> {
    /// Create a new connection pool. No connections are opened yet.
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            manager,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: 0,
                closed: false,
            }),
        }
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<M::Connection>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            total_connections: state.total(),
            idle_connections: state.idle.len(),
            active_connections: state.active,
        }
    }

    /// Check if the pool is at capacity.
    pub fn at_capacity(&self) -> bool {
        self.lock().total() >= self.config.max_connections
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn checkout(&self) -> Result<Checkout<M::Connection>, Error> {
        let mut state = self.lock();
        if state.closed {
            return Err(pool_error(PoolErrorKind::Closed, "pool is closed"));
        }
        if let Some(conn) = state.idle.pop_front() {
            state.active += 1;
            return Ok(Checkout::Idle(conn));
        }
        if state.total() >= self.config.max_connections {
            return Err(pool_error(
                PoolErrorKind::Exhausted,
                format!(
                    "all {} connections are in use",
                    self.config.max_connections
                ),
            ));
        }
        state.active += 1;
        Ok(Checkout::Open)
    }

    fn forget_active(&self) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
    }

    /// Take a connection, reusing an idle one when possible.
    pub async fn acquire(&self, cx: &Cx) -> Outcome<PooledConnection<M::Connection>, Error> {
        loop {
            let checkout = match self.checkout() {
                Ok(checkout) => checkout,
                Err(e) => return Outcome::Err(e),
            };
            let mut conn = match checkout {
                Checkout::Idle(conn) => conn,
                Checkout::Open => match self.manager.connect(cx).await {
                    Outcome::Ok(conn) => {
                        tracing::debug!(stats = ?self.stats(), "Opened pooled connection");
                        return Outcome::Ok(PooledConnection::new(conn));
                    }
                    other => {
                        self.forget_active();
                        return other.map(PooledConnection::new);
                    }
                },
            };

            if !self.config.test_on_checkout {
                tracing::debug!("Reusing idle connection");
                return Outcome::Ok(PooledConnection::new(conn));
            }
            match self.manager.is_valid(cx, &mut conn).await {
                Outcome::Ok(()) => {
                    tracing::debug!("Reusing idle connection");
                    return Outcome::Ok(PooledConnection::new(conn));
                }
                Outcome::Err(e) => {
                    tracing::debug!(error = %e, "Discarding broken idle connection");
                    self.forget_active();
                }
                Outcome::Cancelled(r) => {
                    self.forget_active();
                    return Outcome::Cancelled(r);
                }
                Outcome::Panicked(p) => {
                    self.forget_active();
                    return Outcome::Panicked(p);
                }
            }
        }
    }

    /// Return a healthy connection to the idle set.
    pub fn release(&self, conn: PooledConnection<M::Connection>) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
        if state.closed {
            tracing::debug!("Pool closed, dropping released connection");
            return;
        }
        state.idle.push_back(conn.into_inner());
        tracing::debug!(idle = state.idle.len(), active = state.active, "Released connection");
    }

    /// Drop a connection that must not be reused.
    pub fn terminate(&self, conn: PooledConnection<M::Connection>) {
        drop(conn);
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
        tracing::debug!(idle = state.idle.len(), active = state.active, "Terminated connection");
    }

    /// Open connections until `min_connections` are idle or in use.
    pub async fn warm_up(&self, cx: &Cx) -> Outcome<(), Error> {
        loop {
            let total = self.lock().total();
            if total >= self.config.min_connections {
                return Outcome::Ok(());
            }
            match self.acquire(cx).await {
                Outcome::Ok(conn) => self.release(conn),
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
    }

    /// Refuse further acquires and drop idle connections. Connections
    /// still handed out are dropped when they come back.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.idle.len();
        state.idle.clear();
        tracing::debug!(dropped, active = state.active, "Closed pool");
    }
}

impl<M: ManageConnection> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

fn pool_error(kind: PoolErrorKind, message: impl Into<String>) -> Error {
    Error::Pool(PoolError {
        kind,
        message: message.into(),
    })
}

/// A connection borrowed from the pool.
///
/// Hand it back with [`Pool::release`] or [`Pool::terminate`]; dropping it
/// leaks its slot. [`PooledTransaction`] does this on every path, drop
/// included.
#[derive(Debug)]
pub struct PooledConnection<C> {
    conn: C,
}

impl<C> PooledConnection<C> {
    fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Get the inner connection.
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C> std::ops::Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C> std::ops::DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// A [`Connector`] handing out transactions backed by pooled connections.
pub struct PooledConnector<M: ManageConnection> {
    pool: Arc<Pool<M>>,
}

impl<M: ManageConnection> PooledConnector<M> {
    pub fn new(pool: Arc<Pool<M>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<Pool<M>> {
        &self.pool
    }
}

impl<M: ManageConnection> std::fmt::Debug for PooledConnector<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnector")
            .field("pool", &self.pool)
            .finish()
    }
}

impl<M: ManageConnection> Clone for PooledConnector<M> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<M: ManageConnection> Connector for PooledConnector<M> {
    type Tx = PooledTransaction<M>;

    fn transaction(&self) -> PooledTransaction<M> {
        PooledTransaction {
            pool: Arc::clone(&self.pool),
            conn: None,
        }
    }
}

/// A transaction over one pooled connection, driven with plain SQL
/// (`BEGIN`, `COMMIT`, `ROLLBACK`, `SAVEPOINT`).
pub struct PooledTransaction<M: ManageConnection> {
    pool: Arc<Pool<M>>,
    conn: Option<PooledConnection<M::Connection>>,
}

impl<M: ManageConnection> std::fmt::Debug for PooledTransaction<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTransaction")
            .field("connected", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: ManageConnection> PooledTransaction<M> {
    /// Is a connection currently held?
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&mut M::Connection, Error> {
        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Closed,
                message: "transaction holds no connection".to_string(),
                source: None,
            })),
        }
    }

    async fn run(&mut self, cx: &Cx, sql: &str) -> Outcome<(), Error> {
        let conn = match self.connection() {
            Ok(conn) => conn,
            Err(e) => return Outcome::Err(e),
        };
        conn.execute(cx, sql, &Params::new()).await.map(|_| ())
    }
}

impl<M: ManageConnection> Executor for PooledTransaction<M> {
    type Cursor = <M::Connection as Executor>::Cursor;

    async fn execute(&mut self, cx: &Cx, sql: &str, params: &Params) -> Outcome<u64, Error> {
        match self.connection() {
            Ok(conn) => conn.execute(cx, sql, params).await,
            Err(e) => Outcome::Err(e),
        }
    }

    async fn cursor(&mut self, cx: &Cx, sql: &str, params: &Params) -> Outcome<Self::Cursor, Error> {
        match self.connection() {
            Ok(conn) => conn.cursor(cx, sql, params).await,
            Err(e) => Outcome::Err(e),
        }
    }
}

impl<M: ManageConnection> Transaction for PooledTransaction<M> {
    async fn begin(&mut self, cx: &Cx) -> Outcome<(), Error> {
        let conn = match self.pool.acquire(cx).await {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        self.conn = Some(conn);
        match self.run(cx, "BEGIN").await {
            Outcome::Ok(()) => Outcome::Ok(()),
            other => {
                if let Some(conn) = self.conn.take() {
                    self.pool.terminate(conn);
                }
                other
            }
        }
    }

    async fn commit(&mut self, cx: &Cx) -> Outcome<(), Error> {
        self.run(cx, "COMMIT").await
    }

    async fn rollback(&mut self, cx: &Cx, checkpoint: Option<&str>) -> Outcome<(), Error> {
        match checkpoint {
            Some(name) => {
                let sql = format!("ROLLBACK TO SAVEPOINT {}", quote_ident(name));
                self.run(cx, &sql).await
            }
            None => self.run(cx, "ROLLBACK").await,
        }
    }

    async fn checkpoint(&mut self, cx: &Cx, name: &str) -> Outcome<(), Error> {
        let sql = format!("SAVEPOINT {}", quote_ident(name));
        self.run(cx, &sql).await
    }

    /// Give the connection back. A clean close first rolls back whatever is
    /// still open (a no-op after `COMMIT`); if that fails, or the close
    /// carries an error, the connection is terminated instead of reused.
    async fn close(&mut self, cx: &Cx, has_error: bool) -> Outcome<(), Error> {
        if self.conn.is_none() {
            return Outcome::Ok(());
        }
        if has_error {
            if let Some(conn) = self.conn.take() {
                self.pool.terminate(conn);
            }
            return Outcome::Ok(());
        }
        let rolled_back = self.run(cx, "ROLLBACK").await;
        if let Some(conn) = self.conn.take() {
            match &rolled_back {
                Outcome::Ok(()) => self.pool.release(conn),
                _ => {
                    tracing::warn!("Rollback before release failed, terminating connection");
                    self.pool.terminate(conn);
                }
            }
        }
        rolled_back
    }
}

impl<M: ManageConnection> Drop for PooledTransaction<M> {
    /// A transaction dropped while holding a connection (never closed, or
    /// its future cancelled) may be mid-transaction: free the slot without
    /// reusing the connection.
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("Pooled transaction dropped without close");
            self.pool.terminate(conn);
        }
    }
}
