//! Session orchestration for qlio.
//!
//! `qlio-session` is the **orchestration layer**. A [`Session`] owns one
//! transaction for its whole ready lifetime, drives the query builders from
//! `qlio-query`, and reconciles rows after every write: keys generated by the
//! backend, client-side defaults, change history and lifecycle flags.
//!
//! # Lifecycle
//!
//! `NotReady → Ready → Closed`. Every data-access call outside `Ready` fails
//! with a contract violation. `commit` keeps the session ready; `close` does
//! not commit.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(&connector, Dialect::postgres());
//! session.start(&cx).await?;
//!
//! let row = TableRow::new(users.clone()).with("name", "alice")?;
//! let row = session.insert_now(&cx, row).await?;
//!
//! session.commit(&cx).await?;
//! session.close(&cx).await?;
//! ```

pub mod scope;
pub mod stream;

pub use scope::run_scoped;
pub use stream::TableRowStream;

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use qlio_core::{
    Connector, ContractErrorKind, Error, Executor, ManagedTransaction, Params, ResultSet, Row,
    Statement, Transaction, Value,
};
use qlio_query::{Delete, Insert, Select, Truncate, Update};
use qlio_schema::{ColumnDefault, Dialect, Introspector, Table, TableRow};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotReady,
    Ready,
    /// Terminal.
    Closed,
}

/// A unit of work over one transaction.
///
/// Not safe for concurrent use: every operation takes `&mut self`.
pub struct Session<'db, C: Connector> {
    connector: &'db C,
    dialect: Dialect,
    state: SessionState,
    transaction: Option<ManagedTransaction<C::Tx>>,
}

impl<C: Connector> std::fmt::Debug for Session<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn deleted_row(table: &Table) -> Error {
    Error::contract(
        ContractErrorKind::DeletedRow,
        format!("row of table '{}' has already been deleted", table.name()),
    )
}

impl<'db, C: Connector> Session<'db, C> {
    /// Create a session. Nothing is acquired until [`start`](Self::start).
    pub fn new(connector: &'db C, dialect: Dialect) -> Self {
        Self {
            connector,
            dialect,
            state: SessionState::NotReady,
            transaction: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn transaction(&mut self) -> Result<&mut ManagedTransaction<C::Tx>, Error> {
        match (self.state, self.transaction.as_mut()) {
            (SessionState::Ready, Some(tx)) => Ok(tx),
            _ => Err(Error::contract(
                ContractErrorKind::SessionState,
                "Session is not ready or closed",
            )),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Acquire a transaction and begin it.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(dialect = %self.dialect))]
    pub async fn start(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.state != SessionState::NotReady {
            return Outcome::Err(Error::contract(
                ContractErrorKind::SessionState,
                "Session has already been started",
            ));
        }
        let mut tx = ManagedTransaction::new(self.connector.transaction());
        match tx.begin(cx).await {
            Outcome::Ok(()) => {
                self.transaction = Some(tx);
                self.state = SessionState::Ready;
                tracing::info!("Session started");
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Commit. The session stays ready for further work.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn commit(&mut self, cx: &Cx) -> Outcome<(), Error> {
        let tx = match self.transaction() {
            Ok(tx) => tx,
            Err(e) => return Outcome::Err(e),
        };
        match tx.commit(cx).await {
            Outcome::Ok(()) => {
                tracing::info!("Session committed");
                Outcome::Ok(())
            }
            other => other,
        }
    }

    /// Roll back, to `checkpoint` when given and the dialect supports
    /// checkpoints. On other dialects the checkpoint is ignored and the whole
    /// transaction is rolled back.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn rollback(&mut self, cx: &Cx, checkpoint: Option<&str>) -> Outcome<(), Error> {
        let has_checkpoints = self.dialect.has_checkpoints();
        let tx = match self.transaction() {
            Ok(tx) => tx,
            Err(e) => return Outcome::Err(e),
        };
        let checkpoint = match checkpoint {
            Some(name) if !has_checkpoints => {
                tracing::warn!(checkpoint = %name, "Dialect has no checkpoints, rolling back fully");
                None
            }
            other => other,
        };
        tx.rollback(cx, checkpoint).await
    }

    /// Create a named checkpoint.
    pub async fn checkpoint(&mut self, cx: &Cx, name: &str) -> Outcome<(), Error> {
        if !self.dialect.has_checkpoints() {
            return Outcome::Err(Error::unsupported("checkpoints", self.dialect.name()));
        }
        let tx = match self.transaction() {
            Ok(tx) => tx,
            Err(e) => return Outcome::Err(e),
        };
        tx.checkpoint(cx, name).await
    }

    /// Release the transaction without committing.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn close(&mut self, cx: &Cx) -> Outcome<(), Error> {
        self.close_inner(cx, false).await
    }

    /// Release the transaction after a failure. The underlying connection
    /// is terminated rather than reused.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn close_with_error(&mut self, cx: &Cx) -> Outcome<(), Error> {
        self.close_inner(cx, true).await
    }

    async fn close_inner(&mut self, cx: &Cx, has_error: bool) -> Outcome<(), Error> {
        if let Err(e) = self.transaction() {
            return Outcome::Err(e);
        }
        self.state = SessionState::Closed;
        let Some(mut tx) = self.transaction.take() else {
            return Outcome::Ok(());
        };
        let outcome = tx.close(cx, has_error).await;
        tracing::info!(has_error, "Session closed");
        outcome
    }

    // ========================================================================
    // Low-level access
    // ========================================================================

    /// Run a statement and return its first row.
    pub async fn fetch(&mut self, cx: &Cx, sql: &str, params: &Params) -> Outcome<Option<Row>, Error> {
        let mut cursor = match self.cursor(cx, sql, params).await {
            Outcome::Ok(cursor) => cursor,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let row = match cursor.fetch_row(cx).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match cursor.close(cx).await {
            Outcome::Ok(()) => Outcome::Ok(row),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run a statement for its effect.
    pub async fn execute(&mut self, cx: &Cx, sql: &str, params: &Params) -> Outcome<u64, Error> {
        let tx = match self.transaction() {
            Ok(tx) => tx,
            Err(e) => return Outcome::Err(e),
        };
        tx.execute(cx, sql, params).await
    }

    /// Run a statement and return a cursor over its rows.
    pub async fn cursor(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: &Params,
    ) -> Outcome<<C::Tx as Executor>::Cursor, Error> {
        let tx = match self.transaction() {
            Ok(tx) => tx,
            Err(e) => return Outcome::Err(e),
        };
        tx.cursor(cx, sql, params).await
    }

    async fn execute_statement(&mut self, cx: &Cx, stmt: &Statement) -> Outcome<u64, Error> {
        self.execute(cx, &stmt.sql, &stmt.params).await
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// A SELECT over `table` in this session's dialect.
    pub fn select(&self, table: &Arc<Table>) -> Select {
        Select::new(self.dialect, Arc::clone(table))
    }

    /// An INSERT into `table` in this session's dialect.
    pub fn insert(&self, table: &Arc<Table>) -> Insert {
        Insert::new(self.dialect, Arc::clone(table))
    }

    pub fn update(&self, table: &Arc<Table>) -> Update {
        Update::new(self.dialect, Arc::clone(table))
    }

    pub fn delete(&self, table: &Arc<Table>) -> Delete {
        Delete::new(self.dialect, Arc::clone(table))
    }

    // ========================================================================
    // Query execution and reconciliation
    // ========================================================================

    /// Run a SELECT and stream its rows.
    pub async fn run_select_query(
        &mut self,
        cx: &Cx,
        select: &Select,
    ) -> Outcome<TableRowStream<<C::Tx as Executor>::Cursor>, Error> {
        let stmt = select.generate_sql();
        match self.cursor(cx, &stmt.sql, &stmt.params).await {
            Outcome::Ok(cursor) => Outcome::Ok(TableRowStream::new(cursor, Arc::clone(select.table()))),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Insert every row of `insert`, reconciling each one as it is written.
    ///
    /// With RETURNING, returned columns are copied into the row. Without it,
    /// the single auto-increment column (if any) is read back through the
    /// dialect's last-value expression and unset columns receive their
    /// client-side defaults. Neither path records history. A failure leaves
    /// earlier rows written.
    pub async fn run_insert_query(&mut self, cx: &Cx, insert: &mut Insert) -> Outcome<(), Error> {
        let table = Arc::clone(insert.table());
        let auto_increment = table.auto_increment_columns();
        if !self.dialect.has_returns() && auto_increment.len() > 1 {
            return Outcome::Err(Error::unsupported(
                format!(
                    "insert into '{}' with {} auto-increment columns",
                    table.name(),
                    auto_increment.len()
                ),
                self.dialect.name(),
            ));
        }

        for index in 0..insert.records().len() {
            let stmt = {
                let row = &insert.records()[index];
                if row.deleted() {
                    return Outcome::Err(deleted_row(&table));
                }
                match insert.row_statement(row) {
                    Ok(stmt) => stmt,
                    Err(e) => return Outcome::Err(e),
                }
            };
            let returned = match self.fetch(cx, &stmt.sql, &stmt.params).await {
                Outcome::Ok(row) => row,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            };

            if self.dialect.has_returns() {
                let row = &mut insert.records_mut()[index];
                if let Some(returned) = returned {
                    for (name, value) in returned.iter() {
                        if let Some(id) = table.column_id(name) {
                            row.store_column_value(id, value.clone(), false);
                        }
                    }
                }
                tracing::debug!(table = %table.name(), "Reconciled inserted row from RETURNING");
            } else {
                if let Some(&id) = auto_increment.first() {
                    let lastval = Statement::raw(format!(
                        "SELECT {}",
                        self.dialect.last_value_expression()
                    ));
                    let value = match self.fetch(cx, &lastval.sql, &lastval.params).await {
                        Outcome::Ok(row) => row.and_then(|r| r.first().cloned()),
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    };
                    if let Some(value) = value {
                        tracing::debug!(table = %table.name(), key = ?value, "Read back generated key");
                        insert.records_mut()[index].store_column_value(id, value, false);
                    }
                }

                let row = &mut insert.records_mut()[index];
                let mut applied = 0usize;
                for (id, column) in table.columns_with_ids() {
                    let unset = matches!(row.get_column_value(id), None | Some(Value::Default));
                    if let (true, ColumnDefault::Value(default)) = (unset, column.default()) {
                        row.store_column_value(id, default.clone(), false);
                        applied += 1;
                    }
                }
                tracing::debug!(table = %table.name(), defaults = applied, "Applied client-side defaults");
            }

            insert.records_mut()[index].mark_inserted();
        }
        Outcome::Ok(())
    }

    /// Update every changed row of `update`. Unchanged rows issue nothing.
    pub async fn run_update_query(&mut self, cx: &Cx, update: &mut Update) -> Outcome<(), Error> {
        for index in 0..update.records().len() {
            let stmt = {
                let row = &update.records()[index];
                if row.deleted() {
                    return Outcome::Err(deleted_row(update.table()));
                }
                match update.row_statement(row) {
                    Ok(Some(stmt)) => stmt,
                    Ok(None) => {
                        tracing::debug!(table = %update.table().name(), "Skipping unchanged row");
                        continue;
                    }
                    Err(e) => return Outcome::Err(e),
                }
            };
            match self.execute_statement(cx, &stmt).await {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
            update.records_mut()[index].reset_history();
        }
        Outcome::Ok(())
    }

    /// Delete every row of `delete` and mark each one deleted.
    pub async fn run_delete_query(&mut self, cx: &Cx, delete: &mut Delete) -> Outcome<(), Error> {
        for index in 0..delete.records().len() {
            let stmt = {
                let row = &delete.records()[index];
                if row.deleted() {
                    return Outcome::Err(deleted_row(delete.table()));
                }
                match delete.row_statement(row) {
                    Ok(stmt) => stmt,
                    Err(e) => return Outcome::Err(e),
                }
            };
            match self.execute_statement(cx, &stmt).await {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
            delete.records_mut()[index].mark_deleted();
        }
        Outcome::Ok(())
    }

    // ========================================================================
    // Row operations
    // ========================================================================

    /// Insert one row now and return it reconciled.
    #[tracing::instrument(level = "debug", skip(self, cx, row), fields(table = %row.table().name()))]
    pub async fn insert_now(&mut self, cx: &Cx, row: TableRow) -> Outcome<TableRow, Error> {
        let mut insert = self.insert(row.table()).rows([row]);
        match self.run_insert_query(cx, &mut insert).await {
            Outcome::Ok(()) => single(insert.into_records()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Write one row's changes now and return it with a fresh baseline.
    #[tracing::instrument(level = "debug", skip(self, cx, row), fields(table = %row.table().name()))]
    pub async fn update_now(&mut self, cx: &Cx, row: TableRow) -> Outcome<TableRow, Error> {
        let mut update = self.update(row.table()).rows([row]);
        match self.run_update_query(cx, &mut update).await {
            Outcome::Ok(()) => single(update.into_records()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Delete one row now and return it marked deleted.
    #[tracing::instrument(level = "debug", skip(self, cx, row), fields(table = %row.table().name()))]
    pub async fn delete_now(&mut self, cx: &Cx, row: TableRow) -> Outcome<TableRow, Error> {
        let mut delete = self.delete(row.table()).rows([row]);
        match self.run_delete_query(cx, &mut delete).await {
            Outcome::Ok(()) => single(delete.into_records()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Update the row if it already exists, insert it otherwise.
    pub async fn add(&mut self, cx: &Cx, row: TableRow) -> Outcome<TableRow, Error> {
        if row.existed() {
            self.update_now(cx, row).await
        } else {
            self.insert_now(cx, row).await
        }
    }

    /// Write a row known by primary key as an update, even if it was never
    /// loaded through this session.
    pub async fn merge(&mut self, cx: &Cx, row: TableRow) -> Outcome<TableRow, Error> {
        self.update_now(cx, row).await
    }

    /// Remove every row of `table`.
    pub async fn truncate(&mut self, cx: &Cx, table: &Arc<Table>) -> Outcome<u64, Error> {
        let stmt = Truncate::new(self.dialect, Arc::clone(table)).generate_sql();
        self.execute_statement(cx, &stmt).await
    }

    /// Reflect `name` from the live catalog into a detached table.
    pub async fn reflect_table(&mut self, cx: &Cx, name: &str) -> Outcome<Table, Error> {
        let introspector = Introspector::new(self.dialect);
        let tx = match self.transaction() {
            Ok(tx) => tx,
            Err(e) => return Outcome::Err(e),
        };
        introspector.table(cx, tx, name).await
    }
}

/// The only row of a single-row builder.
fn single(mut rows: Vec<TableRow>) -> Outcome<TableRow, Error> {
    match rows.pop() {
        Some(row) => Outcome::Ok(row),
        None => Outcome::Err(Error::Custom("single-row builder lost its row".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use qlio_core::{BufferedResultSet, SchemaErrorKind, SqlType};
    use qlio_schema::Column;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
        match outcome {
            Outcome::Err(e) => e,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[derive(Default)]
    struct Backend {
        log: Vec<String>,
        results: VecDeque<Vec<Row>>,
        fail_commit: bool,
    }

    #[derive(Clone, Default)]
    struct MockConnector {
        backend: Arc<Mutex<Backend>>,
    }

    impl MockConnector {
        fn queue(&self, rows: Vec<Row>) {
            self.backend.lock().expect("lock poisoned").results.push_back(rows);
        }

        fn log(&self) -> Vec<String> {
            self.backend.lock().expect("lock poisoned").log.clone()
        }
    }

    struct MockTx {
        backend: Arc<Mutex<Backend>>,
    }

    impl MockTx {
        fn record(&self, entry: impl Into<String>) {
            self.backend.lock().expect("lock poisoned").log.push(entry.into());
        }
    }

    impl Executor for MockTx {
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
            let mut backend = self.backend.lock().expect("lock poisoned");
            backend.log.push(sql.to_string());
            let rows = backend.results.pop_front().unwrap_or_default();
            Outcome::Ok(BufferedResultSet::new(rows))
        }
    }

    impl Transaction for MockTx {
        async fn begin(&mut self, _cx: &Cx) -> Outcome<(), Error> {
            self.record("BEGIN");
            Outcome::Ok(())
        }

        async fn commit(&mut self, _cx: &Cx) -> Outcome<(), Error> {
            self.record("COMMIT");
            if self.backend.lock().expect("lock poisoned").fail_commit {
                return Outcome::Err(Error::query(
                    "deferred constraint failed",
                    None,
                    Some("23503".to_string()),
                ));
            }
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

    impl Connector for MockConnector {
        type Tx = MockTx;

        fn transaction(&self) -> MockTx {
            MockTx {
                backend: Arc::clone(&self.backend),
            }
        }
    }

    fn users() -> Arc<Table> {
        Arc::new(
            Table::new("users")
                .with_column(Column::new("id", SqlType::Integer).primary_key().auto_increment())
                .with_column(Column::new("name", SqlType::Text).not_null())
                .with_column(Column::new("active", SqlType::Boolean).default_value(true)),
        )
    }

    fn new_user(table: &Arc<Table>, name: &str) -> TableRow {
        TableRow::new(Arc::clone(table)).with("name", name).unwrap()
    }

    fn loaded_user(table: &Arc<Table>, id: i64, name: &str) -> TableRow {
        TableRow::from_row(
            Arc::clone(table),
            &Row::from_pairs([
                ("id", Value::BigInt(id)),
                ("name", Value::Text(name.into())),
                ("active", Value::Bool(true)),
            ]),
        )
    }

    #[test]
    fn test_state_machine_guards() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let mut session = Session::new(&connector, Dialect::postgres());
            assert_eq!(session.state(), SessionState::NotReady);

            assert!(expect_err(session.commit(&cx).await).is_contract_violation());
            assert!(expect_err(session.rollback(&cx, None).await).is_contract_violation());
            assert!(expect_err(session.fetch(&cx, "SELECT 1", &Params::new()).await)
                .is_contract_violation());
            assert!(expect_err(session.close(&cx).await).is_contract_violation());
            assert!(connector.log().is_empty());

            unwrap_outcome(session.start(&cx).await);
            assert!(session.is_ready());
            match session.start(&cx).await {
                Outcome::Err(Error::Contract(e)) => {
                    assert_eq!(e.kind, ContractErrorKind::SessionState);
                }
                other => panic!("expected contract violation, got {other:?}"),
            }

            unwrap_outcome(session.commit(&cx).await);
            assert!(session.is_ready());
            unwrap_outcome(session.close(&cx).await);
            assert_eq!(session.state(), SessionState::Closed);

            assert!(expect_err(session.commit(&cx).await).is_contract_violation());
            assert!(expect_err(session.execute(&cx, "SELECT 1", &Params::new()).await)
                .is_contract_violation());
            assert!(expect_err(session.close(&cx).await).is_contract_violation());
            assert!(expect_err(session.start(&cx).await).is_contract_violation());

            assert_eq!(connector.log(), vec!["BEGIN", "COMMIT", "CLOSE false"]);
        });
    }

    #[test]
    fn test_close_does_not_commit() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let mut session = Session::new(&connector, Dialect::mysql());
            unwrap_outcome(session.start(&cx).await);
            unwrap_outcome(session.execute(&cx, "DELETE FROM t", &Params::new()).await);
            unwrap_outcome(session.close_with_error(&cx).await);
            assert_eq!(
                connector.log(),
                vec!["BEGIN", "DELETE FROM t", "CLOSE true"]
            );
        });
    }

    #[test]
    fn test_insert_with_returning_reconciles_without_history() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            connector.queue(vec![Row::from_pairs([
                ("id", Value::Int(1)),
                ("name", Value::Text("alice".into())),
                ("active", Value::Bool(true)),
            ])]);
            let table = users();
            let mut session = Session::new(&connector, Dialect::postgres());
            unwrap_outcome(session.start(&cx).await);

            let row = unwrap_outcome(session.insert_now(&cx, new_user(&table, "alice")).await);
            assert_eq!(row.get("id"), Some(&Value::Int(1)));
            assert_eq!(row.get("active"), Some(&Value::Bool(true)));
            assert!(row.existed());
            assert!(!row.deleted());
            assert!(!row.has_changes());

            assert_eq!(
                connector.log(),
                vec![
                    "BEGIN",
                    "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING *",
                ]
            );
        });
    }

    #[test]
    fn test_insert_without_returning_reads_last_value_and_defaults() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            connector.queue(Vec::new());
            connector.queue(vec![Row::from_pairs([("last_insert_rowid()", Value::Int(1))])]);
            let table = users();
            let mut session = Session::new(&connector, Dialect::sqlite());
            unwrap_outcome(session.start(&cx).await);

            let row = unwrap_outcome(session.insert_now(&cx, new_user(&table, "alice")).await);
            assert_eq!(row.get("id"), Some(&Value::Int(1)));
            assert_eq!(row.get("active"), Some(&Value::Bool(true)));
            assert!(row.existed());
            assert!(!row.deleted());
            assert_eq!(row.changed_columns(), vec![table.column_id("name").unwrap()]);

            assert_eq!(
                connector.log(),
                vec![
                    "BEGIN",
                    "INSERT INTO \"users\" (\"name\") VALUES (:param_0)",
                    "SELECT last_insert_rowid()",
                ]
            );
        });
    }

    #[test]
    fn test_default_marker_becomes_client_default_without_keyword() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            connector.queue(Vec::new());
            connector.queue(vec![Row::from_pairs([("last_insert_rowid()", Value::Int(2))])]);
            let table = users();
            let mut session = Session::new(&connector, Dialect::sqlite());
            unwrap_outcome(session.start(&cx).await);

            let row = new_user(&table, "bob").with("active", Value::Default).unwrap();
            let row = unwrap_outcome(session.insert_now(&cx, row).await);
            assert_eq!(row.get("active"), Some(&Value::Bool(true)));
            assert_eq!(
                connector.log()[1],
                "INSERT INTO \"users\" (\"name\") VALUES (:param_0)"
            );
        });
    }

    #[test]
    fn test_insert_rejects_multiple_auto_increment_without_returning() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let table = Arc::new(
                Table::new("pairs")
                    .with_column(Column::new("a", SqlType::Integer).primary_key().auto_increment())
                    .with_column(Column::new("b", SqlType::Integer).auto_increment()),
            );
            let connector = MockConnector::default();
            let mut session = Session::new(&connector, Dialect::mysql());
            unwrap_outcome(session.start(&cx).await);

            let row = TableRow::new(Arc::clone(&table));
            assert!(expect_err(session.insert_now(&cx, row).await).is_unsupported());
            assert_eq!(connector.log(), vec!["BEGIN"]);
        });
    }

    #[test]
    fn test_update_skips_unchanged_rows() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let table = users();
            let mut session = Session::new(&connector, Dialect::postgres());
            unwrap_outcome(session.start(&cx).await);

            let row = unwrap_outcome(session.update_now(&cx, loaded_user(&table, 3, "bob")).await);
            assert_eq!(connector.log(), vec!["BEGIN"]);

            let mut row = row;
            row.set("name", "robert").unwrap();
            let row = unwrap_outcome(session.add(&cx, row).await);
            assert!(!row.has_changes());
            assert_eq!(
                connector.log(),
                vec![
                    "BEGIN",
                    "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2",
                ]
            );
        });
    }

    #[test]
    fn test_deleted_rows_cannot_be_written() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let table = users();
            let mut session = Session::new(&connector, Dialect::sqlite());
            unwrap_outcome(session.start(&cx).await);

            let row = unwrap_outcome(session.delete_now(&cx, loaded_user(&table, 4, "eve")).await);
            assert!(row.deleted());

            match session.delete_now(&cx, row.clone()).await {
                Outcome::Err(Error::Contract(e)) => {
                    assert_eq!(e.kind, ContractErrorKind::DeletedRow);
                }
                other => panic!("expected deleted row violation, got {other:?}"),
            }
            assert!(expect_err(session.merge(&cx, row.clone()).await).is_contract_violation());
            assert!(expect_err(session.insert_now(&cx, row).await).is_contract_violation());

            assert_eq!(
                connector.log(),
                vec!["BEGIN", "DELETE FROM \"users\" WHERE \"id\" = :param_0"]
            );
        });
    }

    #[test]
    fn test_update_without_primary_key_fails() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let table = Arc::new(Table::new("logs").with_column(Column::new("line", SqlType::Text)));
            let connector = MockConnector::default();
            let mut session = Session::new(&connector, Dialect::postgres());
            unwrap_outcome(session.start(&cx).await);

            let row = TableRow::new(Arc::clone(&table)).with("line", "boot").unwrap();
            match session.merge(&cx, row).await {
                Outcome::Err(Error::Schema(e)) => {
                    assert_eq!(e.kind, SchemaErrorKind::MissingPrimaryKey);
                }
                other => panic!("expected missing primary key, got {other:?}"),
            }
        });
    }

    #[test]
    fn test_checkpoints_follow_capability() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let mut session = Session::new(&connector, Dialect::postgres());
            unwrap_outcome(session.start(&cx).await);
            unwrap_outcome(session.checkpoint(&cx, "sp1").await);
            unwrap_outcome(session.rollback(&cx, Some("sp1")).await);

            let without = Dialect::sqlite().with_checkpoints(false);
            let other = MockConnector::default();
            let mut plain = Session::new(&other, without);
            unwrap_outcome(plain.start(&cx).await);
            assert!(expect_err(plain.checkpoint(&cx, "sp1").await).is_unsupported());
            unwrap_outcome(plain.rollback(&cx, Some("sp1")).await);

            assert_eq!(connector.log(), vec!["BEGIN", "SAVEPOINT sp1", "ROLLBACK TO sp1"]);
            assert_eq!(other.log(), vec!["BEGIN", "ROLLBACK"]);
        });
    }

    #[test]
    fn test_select_streams_table_rows() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            connector.queue(vec![
                Row::from_pairs([("id", Value::Int(1)), ("name", Value::Text("a".into()))]),
                Row::from_pairs([("id", Value::Int(2)), ("name", Value::Text("b".into()))]),
            ]);
            let table = users();
            let mut session = Session::new(&connector, Dialect::postgres());
            unwrap_outcome(session.start(&cx).await);

            let select = session
                .select(&table)
                .filter(qlio_query::Expr::col("id").gt(0));
            let stream = unwrap_outcome(session.run_select_query(&cx, &select).await);
            let rows = unwrap_outcome(stream.all(&cx).await);
            assert_eq!(rows.len(), 2);
            assert!(rows.iter().all(|r| r.existed() && !r.has_changes()));
            assert_eq!(rows[1].get("name"), Some(&Value::Text("b".into())));

            assert_eq!(
                connector.log()[1],
                "SELECT \"id\", \"name\", \"active\" FROM \"users\" WHERE \"id\" > $1"
            );
        });
    }

    #[test]
    fn test_truncate_uses_capability() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let mut session = Session::new(&connector, Dialect::sqlite());
            unwrap_outcome(session.start(&cx).await);
            unwrap_outcome(session.truncate(&cx, &users()).await);
            assert_eq!(connector.log(), vec!["BEGIN", "DELETE FROM \"users\""]);
        });
    }

    #[test]
    fn test_scoped_session_commits_on_success() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let value = unwrap_outcome(
                run_scoped(&cx, &connector, Dialect::postgres(), async |session| {
                    session.execute(&cx, "UPDATE t SET x = 1", &Params::new()).await
                })
                .await,
            );
            assert_eq!(value, 1);
            assert_eq!(
                connector.log(),
                vec!["BEGIN", "UPDATE t SET x = 1", "COMMIT", "CLOSE false"]
            );
        });
    }

    #[test]
    fn test_scoped_session_rolls_back_on_failure() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            let outcome: Outcome<(), Error> =
                run_scoped(&cx, &connector, Dialect::postgres(), async |_session| {
                    Outcome::Err(Error::Custom("boom".to_string()))
                })
                .await;
            match outcome {
                Outcome::Err(Error::Custom(msg)) => assert_eq!(msg, "boom"),
                other => panic!("expected original error, got {other:?}"),
            }
            assert_eq!(connector.log(), vec!["BEGIN", "ROLLBACK", "CLOSE true"]);
        });
    }

    #[test]
    fn test_scoped_session_rolls_back_failed_commit() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let connector = MockConnector::default();
            connector.backend.lock().expect("lock poisoned").fail_commit = true;
            let outcome: Outcome<(), Error> =
                run_scoped(&cx, &connector, Dialect::postgres(), async |_session| Outcome::Ok(()))
                    .await;
            assert!(expect_err(outcome).is_integrity_violation());
            assert_eq!(
                connector.log(),
                vec!["BEGIN", "COMMIT", "ROLLBACK", "CLOSE true"]
            );
        });
    }
}
