mod common;

use asupersync::runtime::RuntimeBuilder;
use common::{ScriptedConnector, expect_err, unwrap_outcome};
use qlio::prelude::*;
use qlio::{ContractErrorKind, Params};

fn users() -> Arc<Table> {
    Arc::new(
        Table::new("users")
            .with_column(Column::new("id", SqlType::Integer).primary_key().auto_increment())
            .with_column(Column::new("name", SqlType::Text)),
    )
}

fn accounts() -> Arc<Table> {
    Arc::new(
        Table::new("accounts")
            .with_column(Column::new("id", SqlType::Integer).primary_key().auto_increment())
            .with_column(Column::new("owner", SqlType::Text).not_null())
            .with_column(Column::new("active", SqlType::Boolean).default_value(true))
            .with_column(Column::new("balance", SqlType::BigInt).default_value(0_i64)),
    )
}

#[test]
fn insert_without_returning_reads_back_generated_key() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let connector = ScriptedConnector::new();
        connector
            .respond(Vec::new())
            .respond(vec![Row::from_pairs([("lastval", Value::BigInt(42))])]);

        let dialect = Dialect::postgres().with_returns(false);
        let db = Database::new(dialect, connector.clone());

        let users = users();
        let row = TableRow::new(Arc::clone(&users)).with("name", "alice").unwrap();
        let cx_ref = &cx;
        let row = unwrap_outcome(
            db.session(&cx, async move |session| session.insert_now(cx_ref, row).await)
                .await,
        );

        assert_eq!(row.get("id"), Some(&Value::BigInt(42)));
        assert!(row.existed());
        assert!(!row.deleted());
        assert_eq!(
            connector.log(),
            vec![
                "BEGIN",
                "INSERT INTO \"users\" (\"name\") VALUES ($1)",
                "SELECT LASTVAL()",
                "COMMIT",
                "CLOSE false",
            ]
        );
    });
}

#[test]
fn returning_and_fallback_reconcile_identically() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let accounts = accounts();

        let returning = ScriptedConnector::new();
        returning.respond(vec![Row::from_pairs([
            ("id", Value::Int(7)),
            ("owner", Value::Text("ada".into())),
            ("active", Value::Bool(true)),
            ("balance", Value::BigInt(0)),
        ])]);
        let fallback = ScriptedConnector::new();
        fallback
            .respond(Vec::new())
            .respond(vec![Row::from_pairs([("last_insert_rowid()", Value::Int(7))])]);

        let mut reconciled = Vec::new();
        for (dialect, connector) in [
            (Dialect::postgres(), returning.clone()),
            (Dialect::sqlite(), fallback.clone()),
        ] {
            let db = Database::new(dialect, connector);
            let mut session = db.get_session();
            unwrap_outcome(session.start(&cx).await);
            let row = TableRow::new(Arc::clone(&accounts)).with("owner", "ada").unwrap();
            reconciled.push(unwrap_outcome(session.insert_now(&cx, row).await));
            unwrap_outcome(session.commit(&cx).await);
            unwrap_outcome(session.close(&cx).await);
        }

        let (pg, lite) = (&reconciled[0], &reconciled[1]);
        for column in ["id", "active", "balance"] {
            assert_eq!(pg.get(column), lite.get(column), "column {column}");
        }
        assert_eq!(lite.get("id"), Some(&Value::Int(7)));
        assert_eq!(lite.get("active"), Some(&Value::Bool(true)));
        assert!(pg.existed() && lite.existed());

        assert_eq!(
            returning.statements()[0].0,
            "INSERT INTO \"accounts\" (\"owner\") VALUES ($1) RETURNING *"
        );
        assert_eq!(
            fallback.statements()[1].0,
            "SELECT last_insert_rowid()"
        );
    });
}

#[test]
fn update_without_changes_issues_nothing() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let connector = ScriptedConnector::new();
        connector.respond(vec![
            Row::from_pairs([("id", Value::Int(1)), ("name", Value::Text("bob".into()))]),
            Row::from_pairs([("id", Value::Int(2)), ("name", Value::Text("eve".into()))]),
        ]);
        let db = Database::new(Dialect::mysql(), connector.clone());
        let users = users();

        let mut session = db.get_session();
        unwrap_outcome(session.start(&cx).await);
        let select = session.select(&users);
        let stream = unwrap_outcome(session.run_select_query(&cx, &select).await);
        let rows = unwrap_outcome(stream.all(&cx).await);
        assert_eq!(rows.len(), 2);

        let mut update = session.update(&users).rows(rows);
        unwrap_outcome(session.run_update_query(&cx, &mut update).await);
        unwrap_outcome(session.commit(&cx).await);
        unwrap_outcome(session.close(&cx).await);

        let statements = connector.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].0, "SELECT `id`, `name` FROM `users`");
    });
}

#[test]
fn update_writes_only_changed_columns() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let connector = ScriptedConnector::new();
        connector.respond(vec![Row::from_pairs([
            ("id", Value::Int(5)),
            ("owner", Value::Text("ada".into())),
            ("active", Value::Bool(true)),
            ("balance", Value::BigInt(10)),
        ])]);
        let db = Database::new(Dialect::sqlite(), connector.clone());
        let accounts = accounts();

        let mut session = db.get_session();
        unwrap_outcome(session.start(&cx).await);
        let select = session
            .select(&accounts)
            .filter(Expr::col("id").eq(5));
        let stream = unwrap_outcome(session.run_select_query(&cx, &select).await);
        let mut row = unwrap_outcome(stream.first(&cx).await).expect("one row");

        row.set("balance", 25_i64).unwrap();
        let row = unwrap_outcome(session.add(&cx, row).await);
        assert!(!row.has_changes());
        unwrap_outcome(session.close(&cx).await);

        let statements = connector.statements();
        assert_eq!(
            statements[1].0,
            "UPDATE \"accounts\" SET \"balance\" = :param_0 WHERE \"id\" = :param_1"
        );
        assert_eq!(statements[1].1.get("param_0"), Some(&Value::BigInt(25)));
        assert_eq!(statements[1].1.get("param_1"), Some(&Value::Int(5)));
    });
}

#[test]
fn scoped_session_failure_rolls_back_and_propagates() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let connector = ScriptedConnector::new();
        let db = Database::new(Dialect::postgres(), connector.clone());

        let outcome: Outcome<(), Error> = db
            .session(&cx, async |session| {
                if let Outcome::Err(e) = session
                    .execute(&cx, "INSERT INTO users (name) VALUES ('x')", &Params::new())
                    .await
                {
                    return Outcome::Err(e);
                }
                Outcome::Err(Error::query(
                    "duplicate key value violates unique constraint",
                    None,
                    Some("23505".to_string()),
                ))
            })
            .await;

        let err = expect_err(outcome);
        assert!(err.is_integrity_violation());
        assert_eq!(
            connector.log(),
            vec![
                "BEGIN",
                "INSERT INTO users (name) VALUES ('x')",
                "ROLLBACK",
                "CLOSE true",
            ]
        );
    });
}

#[test]
fn scoped_session_closed_by_body_is_left_alone() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let connector = ScriptedConnector::new();
        let db = Database::new(Dialect::sqlite(), connector.clone());

        let outcome = db
            .session(&cx, async |session| {
                if let Outcome::Err(e) = session.commit(&cx).await {
                    return Outcome::Err(e);
                }
                session.close(&cx).await
            })
            .await;

        unwrap_outcome(outcome);
        assert_eq!(connector.log(), vec!["BEGIN", "COMMIT", "CLOSE false"]);
    });
}

#[test]
fn session_state_machine_is_enforced() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let connector = ScriptedConnector::new();
        let db = Database::new(Dialect::postgres(), connector.clone());
        let users = users();
        let params = Params::new();

        let mut session = db.get_session();
        assert_eq!(session.state(), SessionState::NotReady);
        assert!(expect_err(session.commit(&cx).await).is_contract_violation());
        assert!(expect_err(session.rollback(&cx, None).await).is_contract_violation());
        assert!(expect_err(session.fetch(&cx, "SELECT 1", &params).await).is_contract_violation());
        assert!(expect_err(session.close(&cx).await).is_contract_violation());

        unwrap_outcome(session.start(&cx).await);
        assert!(expect_err(session.start(&cx).await).is_contract_violation());

        let row = TableRow::from_row(
            Arc::clone(&users),
            &Row::from_pairs([("id", Value::Int(9)), ("name", Value::Text("mallory".into()))]),
        );
        let row = unwrap_outcome(session.delete_now(&cx, row).await);
        match session.delete_now(&cx, row).await {
            Outcome::Err(Error::Contract(e)) => assert_eq!(e.kind, ContractErrorKind::DeletedRow),
            _ => panic!("deleting a deleted row must fail"),
        }

        unwrap_outcome(session.close(&cx).await);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(expect_err(session.commit(&cx).await).is_contract_violation());
        assert!(expect_err(session.rollback(&cx, None).await).is_contract_violation());
        assert!(expect_err(session.fetch(&cx, "SELECT 1", &params).await).is_contract_violation());
        assert!(expect_err(session.close(&cx).await).is_contract_violation());

        assert_eq!(
            connector.log(),
            vec![
                "BEGIN",
                "DELETE FROM \"users\" WHERE \"id\" = $1",
                "CLOSE false",
            ]
        );
    });
}
