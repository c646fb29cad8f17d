//! Dialects and the schema model for qlio.
//!
//! This crate provides:
//! - `Dialect` capability descriptors for PostgreSQL, MySQL and SQLite
//! - Table, column and index definitions with DDL generation
//! - `Metadata`, the arena tables are registered into
//! - `TableRow`, a record with change history
//! - Catalog reflection through the `Introspector`

pub mod column;
pub mod dialect;
pub mod index;
pub mod introspect;
pub mod row;
pub mod table;

pub use column::{Column, ColumnDefault, ColumnId};
pub use dialect::{Catalog, Dialect, ParsedSqlType, TABLE_NAME_PARAM};
pub use index::{Index, IndexColumn};
pub use introspect::Introspector;
pub use row::TableRow;
pub use table::{Metadata, Table, TableId};

use asupersync::{Cx, Outcome};
use qlio_core::{Error, Executor, Params};

/// Create every registered table and its indexes, in registration order.
pub async fn create_all<E: Executor>(
    cx: &Cx,
    exec: &mut E,
    metadata: &Metadata,
    dialect: &Dialect,
) -> Outcome<(), Error> {
    let params = Params::new();
    for table in metadata.tables() {
        let mut statements = vec![table.create_sql(dialect)];
        match table.index_sql() {
            Ok(indexes) => statements.extend(indexes),
            Err(e) => return Outcome::Err(e),
        }
        for sql in &statements {
            match exec.execute(cx, sql, &params).await {
                Outcome::Ok(_) => continue,
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        tracing::debug!(table = %table.name(), statements = statements.len(), "Created table");
    }
    Outcome::Ok(())
}

/// Drop a table.
pub async fn drop_table<E: Executor>(
    cx: &Cx,
    exec: &mut E,
    dialect: &Dialect,
    table_name: &str,
    if_exists: bool,
) -> Outcome<(), Error> {
    let sql = drop_table_sql(dialect, table_name, if_exists);
    exec.execute(cx, &sql, &Params::new()).await.map(|_| ())
}

/// Generate DROP TABLE SQL (for testing/inspection).
///
/// This is the same SQL that `drop_table` would execute.
pub fn drop_table_sql(dialect: &Dialect, table_name: &str, if_exists: bool) -> String {
    if if_exists {
        format!("DROP TABLE IF EXISTS {}", dialect.quote(table_name))
    } else {
        format!("DROP TABLE {}", dialect.quote(table_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use qlio_core::{BufferedResultSet, SqlType};

    #[test]
    fn test_drop_table_sql_quotes_per_dialect() {
        let sql = drop_table_sql(&Dialect::postgres(), "order", true);
        assert_eq!(sql, "DROP TABLE IF EXISTS \"order\"");

        let sql = drop_table_sql(&Dialect::mysql(), "order", false);
        assert_eq!(sql, "DROP TABLE `order`");
    }

    #[test]
    fn test_drop_table_sql_injection_attempt_neutralized() {
        let malicious = "users\"; DROP TABLE secrets; --";
        let sql = drop_table_sql(&Dialect::sqlite(), malicious, true);
        assert_eq!(
            sql,
            "DROP TABLE IF EXISTS \"users\"\"; DROP TABLE secrets; --\""
        );
        assert_eq!(sql.matches('"').count(), 4);
    }

    struct Recorder {
        statements: Vec<String>,
    }

    impl Executor for Recorder {
        type Cursor = BufferedResultSet;

        async fn execute(&mut self, _cx: &Cx, sql: &str, _params: &Params) -> Outcome<u64, Error> {
            self.statements.push(sql.to_string());
            Outcome::Ok(0)
        }

        async fn cursor(
            &mut self,
            _cx: &Cx,
            _sql: &str,
            _params: &Params,
        ) -> Outcome<BufferedResultSet, Error> {
            Outcome::Ok(BufferedResultSet::default())
        }
    }

    #[test]
    fn test_create_all_emits_tables_then_indexes() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        let mut metadata = Metadata::new();
        metadata
            .register(
                Table::new("users")
                    .with_column(Column::new("id", SqlType::Integer).primary_key())
                    .with_column(Column::new("name", SqlType::Text))
                    .with_index(Index::new("by_name", ["name"])),
            )
            .unwrap();

        rt.block_on(async {
            let mut recorder = Recorder {
                statements: Vec::new(),
            };
            match create_all(&cx, &mut recorder, &metadata, &Dialect::sqlite()).await {
                Outcome::Ok(()) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert_eq!(
                recorder.statements,
                vec![
                    "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY, \"name\" TEXT)",
                    "CREATE INDEX users_by_name ON users (name)",
                ]
            );
        });
    }
}
