//! Streaming SELECT results as table rows.

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use qlio_core::{Error, ResultSet};
use qlio_schema::{Table, TableRow};

/// Rows of one SELECT, materialized into [`TableRow`]s as they are fetched.
///
/// Every row comes back with `existed` set and no pending changes.
#[derive(Debug)]
pub struct TableRowStream<R> {
    cursor: R,
    table: Arc<Table>,
    closed: bool,
}

impl<R: ResultSet> TableRowStream<R> {
    pub(crate) fn new(cursor: R, table: Arc<Table>) -> Self {
        Self {
            cursor,
            table,
            closed: false,
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Fetch the next row, `None` once exhausted.
    pub async fn next(&mut self, cx: &Cx) -> Outcome<Option<TableRow>, Error> {
        if self.closed {
            return Outcome::Ok(None);
        }
        match self.cursor.fetch_row(cx).await {
            Outcome::Ok(Some(row)) => {
                Outcome::Ok(Some(TableRow::from_row(Arc::clone(&self.table), &row)))
            }
            Outcome::Ok(None) => Outcome::Ok(None),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Fetch the first row and close the cursor.
    pub async fn first(mut self, cx: &Cx) -> Outcome<Option<TableRow>, Error> {
        let row = match self.next(cx).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match self.close(cx).await {
            Outcome::Ok(()) => Outcome::Ok(row),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Fetch every remaining row and close the cursor.
    pub async fn all(mut self, cx: &Cx) -> Outcome<Vec<TableRow>, Error> {
        let mut rows = Vec::new();
        loop {
            match self.next(cx).await {
                Outcome::Ok(Some(row)) => rows.push(row),
                Outcome::Ok(None) => break,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        match self.close(cx).await {
            Outcome::Ok(()) => Outcome::Ok(rows),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Release the cursor. Closing twice is a no-op.
    pub async fn close(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.closed {
            return Outcome::Ok(());
        }
        self.closed = true;
        self.cursor.close(cx).await
    }
}
