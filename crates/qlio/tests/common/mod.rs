//! Scripted in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use qlio::{BufferedResultSet, Connector, Cx, Error, Executor, Outcome, Params, Row, Transaction};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Ok(_) => panic!("expected an error"),
        Outcome::Err(e) => e,
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Default)]
struct Script {
    /// Statements and lifecycle calls, in order.
    log: Vec<String>,
    /// Parameters of every statement, in order.
    params: Vec<(String, Params)>,
    /// Result rows handed to successive `cursor` calls.
    results: VecDeque<Vec<Row>>,
}

/// A connector whose transactions record everything they are asked to do
/// and answer queries from scripted rows.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next unanswered `cursor` call.
    pub fn respond(&self, rows: Vec<Row>) -> &Self {
        self.script
            .lock()
            .expect("script lock")
            .results
            .push_back(rows);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.script.lock().expect("script lock").log.clone()
    }

    /// Statements only, without lifecycle entries.
    pub fn statements(&self) -> Vec<(String, Params)> {
        self.script.lock().expect("script lock").params.clone()
    }

    pub fn clear(&self) {
        let mut script = self.script.lock().expect("script lock");
        script.log.clear();
        script.params.clear();
    }
}

pub struct ScriptedTx {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTx {
    fn record(&self, entry: impl Into<String>) {
        self.script.lock().expect("script lock").log.push(entry.into());
    }

    fn record_statement(&self, sql: &str, params: &Params) -> Option<Vec<Row>> {
        let mut script = self.script.lock().expect("script lock");
        script.log.push(sql.to_string());
        script.params.push((sql.to_string(), params.clone()));
        script.results.pop_front()
    }
}

impl Executor for ScriptedTx {
    type Cursor = BufferedResultSet;

    async fn execute(&mut self, _cx: &Cx, sql: &str, params: &Params) -> Outcome<u64, Error> {
        self.record_statement(sql, params);
        Outcome::Ok(1)
    }

    async fn cursor(
        &mut self,
        _cx: &Cx,
        sql: &str,
        params: &Params,
    ) -> Outcome<BufferedResultSet, Error> {
        let rows = self.record_statement(sql, params).unwrap_or_default();
        Outcome::Ok(BufferedResultSet::new(rows))
    }
}

impl Transaction for ScriptedTx {
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

impl Connector for ScriptedConnector {
    type Tx = ScriptedTx;

    fn transaction(&self) -> ScriptedTx {
        ScriptedTx {
            script: Arc::clone(&self.script),
        }
    }
}
