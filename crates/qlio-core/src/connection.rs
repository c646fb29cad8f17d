//! The connector boundary.
//!
//! Backend drivers implement three traits:
//!
//! - [`ResultSet`] - a cursor over key-value rows
//! - [`Executor`] - statement execution and cursor creation
//! - [`Transaction`] - one backend connection for the lifetime of one transaction
//!
//! [`Connector`] hands out unstarted transactions. [`ManagedTransaction`]
//! wraps any driver transaction and enforces the `unstarted → active →
//! released` lifecycle so drivers do not have to.
//!
//! All operations integrate with asupersync's structured concurrency via `Cx`.

use std::collections::VecDeque;
use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::{ContractErrorKind, Error};
use crate::params::Params;
use crate::row::Row;

/// A cursor over the rows produced by one statement.
pub trait ResultSet: Send {
    /// Fetch the next row, or `None` once exhausted.
    fn fetch_row(&mut self, cx: &Cx) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send;

    /// Fetch up to `n` rows.
    fn fetch_many(
        &mut self,
        cx: &Cx,
        n: usize,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move {
            let mut rows = Vec::with_capacity(n);
            while rows.len() < n {
                match self.fetch_row(cx).await {
                    Outcome::Ok(Some(row)) => rows.push(row),
                    Outcome::Ok(None) => break,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
            Outcome::Ok(rows)
        }
    }

    /// Fetch every remaining row.
    fn fetch_all(&mut self, cx: &Cx) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move {
            let mut rows = Vec::new();
            loop {
                match self.fetch_row(cx).await {
                    Outcome::Ok(Some(row)) => rows.push(row),
                    Outcome::Ok(None) => return Outcome::Ok(rows),
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }
    }

    /// Release any backend resources held by the cursor.
    fn close(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        let _ = cx;
        async { Outcome::Ok(()) }
    }
}

/// A result set materialized in memory.
///
/// Drivers whose protocol returns complete result sets can hand this out
/// as their cursor type.
#[derive(Debug, Default, Clone)]
pub struct BufferedResultSet {
    rows: VecDeque<Row>,
    closed: bool,
}

impl BufferedResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            closed: false,
        }
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ResultSet for BufferedResultSet {
    async fn fetch_row(&mut self, _cx: &Cx) -> Outcome<Option<Row>, Error> {
        if self.closed {
            return Outcome::Err(Error::Connection(crate::error::ConnectionError {
                kind: crate::error::ConnectionErrorKind::Closed,
                message: "fetch from a closed cursor".to_string(),
                source: None,
            }));
        }
        Outcome::Ok(self.rows.pop_front())
    }

    async fn close(&mut self, _cx: &Cx) -> Outcome<(), Error> {
        self.rows.clear();
        self.closed = true;
        Outcome::Ok(())
    }
}

/// Something that can run statements.
pub trait Executor: Send {
    /// The cursor type returned by [`cursor`](Executor::cursor).
    type Cursor: ResultSet;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &Params,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Execute a statement and return a cursor over its rows.
    fn cursor(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &Params,
    ) -> impl Future<Output = Outcome<Self::Cursor, Error>> + Send;
}

/// One backend transaction, owning exactly one backend connection.
///
/// `begin` acquires the connection and opens the transaction; `close`
/// gives it back. With `has_error` set the connection must be terminated
/// instead of returned, so a connection left mid-transaction never
/// re-enters the pool.
pub trait Transaction: Executor {
    /// Acquire a connection and begin the transaction.
    fn begin(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Commit. The transaction stays usable for further statements.
    fn commit(&mut self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back everything, or only back to `checkpoint` when given.
    fn rollback(
        &mut self,
        cx: &Cx,
        checkpoint: Option<&str>,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Create a named checkpoint to roll back to.
    fn checkpoint(&mut self, cx: &Cx, name: &str)
    -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Release the connection.
    fn close(&mut self, cx: &Cx, has_error: bool)
    -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// Source of transactions for one database.
pub trait Connector: Send + Sync {
    /// The driver's transaction type.
    type Tx: Transaction;

    /// Create a new, unstarted transaction.
    fn transaction(&self) -> Self::Tx;
}

/// Lifecycle of a [`ManagedTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Unstarted,
    Active,
    /// Terminal.
    Released,
}

/// A driver transaction with its lifecycle enforced.
///
/// Beginning twice, closing twice, or running statements while not active
/// fails with a contract violation before reaching the driver.
#[derive(Debug)]
pub struct ManagedTransaction<T> {
    inner: T,
    state: TransactionState,
}

impl<T: Transaction> ManagedTransaction<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            state: TransactionState::Unstarted,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Access the wrapped driver transaction.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn ensure_active(&self, operation: &str) -> Result<(), Error> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Unstarted => Err(Error::contract(
                ContractErrorKind::TransactionState,
                format!("cannot {operation}: transaction has not been started"),
            )),
            TransactionState::Released => Err(Error::contract(
                ContractErrorKind::TransactionState,
                format!("cannot {operation}: transaction has already been released"),
            )),
        }
    }
}

impl<T: Transaction> Executor for ManagedTransaction<T> {
    type Cursor = T::Cursor;

    async fn execute(&mut self, cx: &Cx, sql: &str, params: &Params) -> Outcome<u64, Error> {
        if let Err(e) = self.ensure_active("execute") {
            return Outcome::Err(e);
        }
        tracing::debug!(sql = %sql, params = params.len(), "Executing statement");
        self.inner.execute(cx, sql, params).await
    }

    async fn cursor(&mut self, cx: &Cx, sql: &str, params: &Params) -> Outcome<T::Cursor, Error> {
        if let Err(e) = self.ensure_active("open cursor") {
            return Outcome::Err(e);
        }
        tracing::debug!(sql = %sql, params = params.len(), "Opening cursor");
        self.inner.cursor(cx, sql, params).await
    }
}

impl<T: Transaction> Transaction for ManagedTransaction<T> {
    async fn begin(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state != TransactionState::Unstarted {
            return Outcome::Err(Error::contract(
                ContractErrorKind::TransactionState,
                "transaction has already been started",
            ));
        }
        match self.inner.begin(cx).await {
            Outcome::Ok(()) => {
                self.state = TransactionState::Active;
                Outcome::Ok(())
            }
            other => other,
        }
    }

    async fn commit(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if let Err(e) = self.ensure_active("commit") {
            return Outcome::Err(e);
        }
        self.inner.commit(cx).await
    }

    async fn rollback(&mut self, cx: &Cx, checkpoint: Option<&str>) -> Outcome<(), Error> {
        if let Err(e) = self.ensure_active("roll back") {
            return Outcome::Err(e);
        }
        self.inner.rollback(cx, checkpoint).await
    }

    async fn checkpoint(&mut self, cx: &Cx, name: &str) -> Outcome<(), Error> {
        if let Err(e) = self.ensure_active("create checkpoint") {
            return Outcome::Err(e);
        }
        self.inner.checkpoint(cx, name).await
    }

    async fn close(&mut self, cx: &Cx, has_error: bool) -> Outcome<(), Error> {
        if let Err(e) = self.ensure_active("close") {
            return Outcome::Err(e);
        }
        // The connection is gone after close whatever the driver reports.
        self.state = TransactionState::Released;
        self.inner.close(cx, has_error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use asupersync::runtime::RuntimeBuilder;
    use std::sync::{Arc, Mutex};

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[derive(Default)]
    struct Calls {
        log: Vec<String>,
    }

    struct RecordingTx {
        calls: Arc<Mutex<Calls>>,
    }

    impl RecordingTx {
        fn record(&self, entry: impl Into<String>) {
            self.calls.lock().expect("lock poisoned").log.push(entry.into());
        }
    }

    impl Executor for RecordingTx {
        type Cursor = BufferedResultSet;

        async fn execute(&mut self, _cx: &Cx, sql: &str, _params: &Params) -> Outcome<u64, Error> {
            self.record(sql);
            Outcome::Ok(1)
        }

        async fn cursor(
            &mut self,
            _cx: &Cx,
            sql: &str,
            _params: &Params,
        ) -> Outcome<BufferedResultSet, Error> {
            self.record(sql);
            Outcome::Ok(BufferedResultSet::new(vec![
                Row::from_pairs([("n", Value::BigInt(1))]),
                Row::from_pairs([("n", Value::BigInt(2))]),
                Row::from_pairs([("n", Value::BigInt(3))]),
            ]))
        }
    }

    impl Transaction for RecordingTx {
        async fn begin(&mut self, _cx: &Cx) -> Outcome<(), Error> {
            self.record("BEGIN");
            Outcome::Ok(())
        }

        async fn commit(&mut self, _cx: &Cx) -> Outcome<(), Error> {
            self.record("COMMIT");
            Outcome::Ok(())
        }

        async fn rollback(&mut self, _cx: &Cx, checkpoint: Option<&str>) -> Outcome<(), Error> {
            match checkpoint {
                Some(name) => self.record(format!("ROLLBACK TO {name}")),
                None => self.record("ROLLBACK"),
            }
            Outcome::Ok(())
        }

        async fn checkpoint(&mut self, _cx: &Cx, name: &str) -> Outcome<(), Error> {
            self.record(format!("SAVEPOINT {name}"));
            Outcome::Ok(())
        }

        async fn close(&mut self, _cx: &Cx, has_error: bool) -> Outcome<(), Error> {
            self.record(format!("CLOSE {has_error}"));
            Outcome::Ok(())
        }
    }

    fn managed() -> (ManagedTransaction<RecordingTx>, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let tx = ManagedTransaction::new(RecordingTx {
            calls: Arc::clone(&calls),
        });
        (tx, calls)
    }

    #[test]
    fn lifecycle_runs_in_order() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let (mut tx, calls) = managed();
            assert_eq!(tx.state(), TransactionState::Unstarted);
            unwrap_outcome(tx.begin(&cx).await);
            assert_eq!(tx.state(), TransactionState::Active);
            unwrap_outcome(tx.execute(&cx, "DELETE FROM t", &Params::new()).await);
            unwrap_outcome(tx.checkpoint(&cx, "sp1").await);
            unwrap_outcome(tx.rollback(&cx, Some("sp1")).await);
            unwrap_outcome(tx.commit(&cx).await);
            unwrap_outcome(tx.close(&cx, false).await);
            assert_eq!(tx.state(), TransactionState::Released);

            let log = calls.lock().expect("lock poisoned").log.clone();
            assert_eq!(
                log,
                vec![
                    "BEGIN",
                    "DELETE FROM t",
                    "SAVEPOINT sp1",
                    "ROLLBACK TO sp1",
                    "COMMIT",
                    "CLOSE false"
                ]
            );
        });
    }

    #[test]
    fn double_begin_and_double_close_are_contract_violations() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let (mut tx, calls) = managed();
            unwrap_outcome(tx.begin(&cx).await);
            match tx.begin(&cx).await {
                Outcome::Err(e) => assert!(e.is_contract_violation()),
                other => panic!("expected contract violation, got {other:?}"),
            }
            unwrap_outcome(tx.close(&cx, true).await);
            match tx.close(&cx, false).await {
                Outcome::Err(e) => assert!(e.is_contract_violation()),
                other => panic!("expected contract violation, got {other:?}"),
            }
            match tx.begin(&cx).await {
                Outcome::Err(e) => assert!(e.is_contract_violation()),
                other => panic!("expected contract violation, got {other:?}"),
            }
            let log = calls.lock().expect("lock poisoned").log.clone();
            assert_eq!(log, vec!["BEGIN", "CLOSE true"]);
        });
    }

    #[test]
    fn statements_require_active_transaction() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let (mut tx, calls) = managed();
            match tx.execute(&cx, "SELECT 1", &Params::new()).await {
                Outcome::Err(Error::Contract(c)) => {
                    assert_eq!(c.kind, ContractErrorKind::TransactionState);
                }
                other => panic!("expected contract violation, got {other:?}"),
            }
            assert!(calls.lock().expect("lock poisoned").log.is_empty());
        });
    }

    #[test]
    fn buffered_result_set_fetch_variants() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let (mut tx, _calls) = managed();
            unwrap_outcome(tx.begin(&cx).await);
            let mut cursor = unwrap_outcome(tx.cursor(&cx, "SELECT n", &Params::new()).await);
            let first = unwrap_outcome(cursor.fetch_row(&cx).await).expect("first row");
            assert_eq!(first.get_by_name("n"), Some(&Value::BigInt(1)));
            let many = unwrap_outcome(cursor.fetch_many(&cx, 5).await);
            assert_eq!(many.len(), 2);
            assert!(unwrap_outcome(cursor.fetch_all(&cx).await).is_empty());
            unwrap_outcome(cursor.close(&cx).await);
            assert!(cursor.is_closed());
            assert!(matches!(cursor.fetch_row(&cx).await, Outcome::Err(_)));
        });
    }
}
