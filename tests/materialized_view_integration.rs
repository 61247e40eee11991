//! CREATE MATERIALIZED VIEW through a session.


use query_test_support::{MODES, chars, query, sample_db, session};
use tributary::datum::{Type, Value};
use tributary::executor::ExecutorError;
use tributary::session::QueryResult;
use tributary::sql::{BinaryOperator, CreateMaterializedViewStmt, Expr, SelectStmt, Statement};

fn create_view(name: &str, query: SelectStmt) -> Statement {
    Statement::CreateMaterializedView(Box::new(CreateMaterializedViewStmt {
        name: name.to_string(),
        query,
    }))
}

#[test]
fn test_view_holds_query_result() {
    let db = sample_db();
    for (i, mode) in MODES.into_iter().enumerate() {
        let mut session = session(&db, mode);
        let name = format!("dept_totals_{}", i);
        let defining = SelectStmt::from_table("t")
            .column(Expr::column("dept"))
            .column_as(Expr::function("SUM", vec![Expr::column("amount")]), "total")
            .group_by(Expr::column("dept"));
        match session.execute(&create_view(&name, defining)).unwrap() {
            QueryResult::Command { tag } => assert_eq!(tag, "CREATE MATERIALIZED VIEW"),
            other => panic!("expected command, got {:?}", other),
        }

        let table = db.find_table(&name).unwrap();
        let fields: Vec<(&str, Type, usize)> = table
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.attr_type, f.len))
            .collect();
        assert_eq!(fields, vec![("dept", Type::Chars, 8), ("total", Type::Bigint, 8)]);
        assert_eq!(table.record_count(), 2);

        let rows = query(
            &mut session,
            SelectStmt::from_table(&name)
                .wildcard()
                .order_by(Expr::column("dept"), true),
        );
        assert_eq!(
            rows,
            vec![
                vec![chars("eng"), Value::Bigint(30)],
                vec![chars("sales"), Value::Bigint(5)],
            ]
        );
        assert_eq!(db.tx_manager().active_count(), 0);
    }
}

#[test]
fn test_view_column_names() {
    let db = sample_db();
    let mut session = session(&db, MODES[0]);
    let defining = SelectStmt::from_table("t")
        .column_as(Expr::column("id"), "A")
        .column_as(Expr::column("dept"), "a")
        .column_as(Expr::column("amount"), "1x");
    session.execute(&create_view("mv", defining)).unwrap();

    let table = db.find_table("mv").unwrap();
    let names: Vec<&str> = table.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "a_2", "c_1x"]);
    assert_eq!(table.field_display_names(), vec!["A", "a", "1x"]);
}

#[test]
fn test_failed_population_rolls_back() {
    let db = sample_db();
    for (i, mode) in MODES.into_iter().enumerate() {
        let mut session = session(&db, mode);
        let name = format!("broken_{}", i);
        let defining = SelectStmt::from_table("t").column(Expr::binary(
            Expr::column("amount"),
            BinaryOperator::Div,
            Expr::binary(Expr::column("id"), BinaryOperator::Sub, Expr::Integer(3)),
        ));
        let err = session.execute(&create_view(&name, defining)).unwrap_err();
        assert!(matches!(err, ExecutorError::DivisionByZero));

        // The table stays behind, empty.
        let table = db.find_table(&name).unwrap();
        assert_eq!(table.record_count(), 0);
        assert_eq!(db.tx_manager().active_count(), 0);
    }
}

#[test]
fn test_duplicate_view_name() {
    let db = sample_db();
    let mut session = session(&db, MODES[0]);
    let defining = SelectStmt::from_table("t").wildcard();
    let err = session.execute(&create_view("t", defining)).unwrap_err();
    assert!(matches!(err, ExecutorError::Catalog(_)));
}

#[test]
fn test_view_in_explicit_transaction() {
    let db = sample_db();
    for (i, mode) in MODES.into_iter().enumerate() {
        let mut session = session(&db, mode);
        let name = format!("pending_{}", i);
        session.begin().unwrap();
        session
            .execute(&create_view(&name, SelectStmt::from_table("t").wildcard()))
            .unwrap();

        let table = db.find_table(&name).unwrap();
        assert_eq!(table.record_count(), 0);
        // Own uncommitted rows are visible inside the transaction.
        let rows = query(&mut session, SelectStmt::from_table(&name).wildcard());
        assert_eq!(rows.len(), 3);

        session.commit().unwrap();
        assert_eq!(table.record_count(), 3);
        assert_eq!(db.tx_manager().active_count(), 0);
    }
}

#[test]
fn test_view_rolled_back_with_transaction() {
    let db = sample_db();
    let mut session = session(&db, MODES[1]);
    session.begin().unwrap();
    session
        .execute(&create_view("discarded", SelectStmt::from_table("t").wildcard()))
        .unwrap();
    session.rollback().unwrap();
    assert_eq!(db.find_table("discarded").unwrap().record_count(), 0);
}
