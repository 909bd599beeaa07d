//! Describe → bind → execute → fetch lifecycle against the scripted engine

use dynsql_core::mock::{MockEngine, MockStatement, INJECTED, INVALID_SQL};
use dynsql_core::{
    Cell, CursorError, CursorOptions, CursorState, Diagnostic, Session, Stage,
};

const EMP: &str = "SELECT empno, ename, comm FROM emp";

fn emp_statement() -> MockStatement {
    MockStatement::new()
        .column("EMPNO", 4)
        .column("ENAME", 10)
        .column("COMM", 7)
        .row([Some("7839"), Some("KING"), None])
        .row([Some("7499"), Some("ALLEN"), Some("300")])
        .row([Some("7521"), Some("WARD"), Some("500")])
}

fn session(sql: &str, statement: MockStatement) -> Session<MockEngine> {
    Session::from_engine(
        MockEngine::new().with_statement(sql, statement),
        CursorOptions::default(),
    )
}

#[test]
fn test_query_streams_all_rows() {
    let session = session(EMP, emp_statement());
    let mut cursor = session.open_cursor().unwrap();

    let mut rows = cursor.run_query(EMP).unwrap();
    assert_eq!(rows.columns().len(), 3);

    let mut seen = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        seen.push(row.to_values());
    }

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], vec![Some("7839".to_string()), Some("KING".to_string()), None]);
    assert_eq!(seen[2][1].as_deref(), Some("WARD"));

    let summary = rows.summary().unwrap();
    assert_eq!(summary.rows, seen.len() as u64);
    assert_eq!(summary.columns, 3);
    assert_eq!(summary.truncated_values, 0);
    drop(rows);

    assert_eq!(cursor.state(), CursorState::Exhausted);
    assert!(cursor.bindings().is_empty());
    assert_eq!(session.last_error(), Diagnostic::success());
}

#[test]
fn test_describe_stops_after_n_plus_one_calls() {
    for n in [0usize, 1, 5] {
        let mut statement = MockStatement::new();
        for i in 0..n {
            statement = statement.column(&format!("C{}", i + 1), 8);
        }
        let session = session("SELECT n", statement);
        let mut cursor = session.open_cursor().unwrap();

        cursor.parse("SELECT n").unwrap();
        let columns = cursor.describe().unwrap();

        assert_eq!(columns.len(), n);
        for (i, column) in columns.iter().enumerate() {
            assert_eq!(column.position, i + 1);
        }
        assert_eq!(session.engine().calls().describe, n + 1);
    }
}

#[test]
fn test_bindings_sized_from_descriptors() {
    let session = session(EMP, emp_statement());
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse(EMP).unwrap();
    cursor.describe().unwrap();
    cursor.bind().unwrap();

    assert_eq!(cursor.state(), CursorState::Bound);
    for (binding, column) in cursor.bindings().iter().zip(cursor.columns()) {
        assert_eq!(binding.position(), column.position);
        assert!(binding.capacity() >= column.max_length + 1);
    }
    assert_eq!(session.engine().calls().bind, 3);
}

#[test]
fn test_long_column_name_is_truncated() {
    let long_name = "THIS_COLUMN_NAME_IS_DEFINITELY_LONGER_THAN_THIRTY";
    let session = session(
        "SELECT long",
        MockStatement::new().column(long_name, 5).row([Some("x")]),
    );
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse("SELECT long").unwrap();
    let columns = cursor.describe().unwrap();

    assert_eq!(columns[0].name.chars().count(), 30);
    assert_eq!(columns[0].name, &long_name[..30]);
    assert!(columns[0].name_truncated());
}

#[test]
fn test_zero_rows_three_columns() {
    let statement = MockStatement::new()
        .column("A", 1)
        .column("B", 2)
        .column("C", 3);
    let session = session("SELECT a, b, c FROM empty", statement);
    let mut cursor = session.open_cursor().unwrap();

    let mut rows = cursor.run_query("SELECT a, b, c FROM empty").unwrap();
    assert!(rows.next().unwrap().is_none());

    let summary = rows.summary().unwrap();
    assert_eq!(summary.rows, 0);
    assert_eq!(summary.columns, 3);
    drop(rows);
    assert!(session.last_error().is_success());
}

#[test]
fn test_null_indicator_wins_over_stale_bytes() {
    let statement = MockStatement::new()
        .column("JOB", 9)
        .row([Some("PRESIDENT")])
        .row([None::<&str>]);
    let session = session("SELECT job FROM emp", statement);
    let mut cursor = session.open_cursor().unwrap();

    let mut rows = cursor.run_query("SELECT job FROM emp").unwrap();
    let first = rows.next().unwrap().unwrap();
    assert_eq!(first.get(0).and_then(Cell::as_str), Some("PRESIDENT"));

    let second = rows.next().unwrap().unwrap();
    assert_eq!(second.get(0), Some(&Cell::Null));
}

#[test]
fn test_value_longer_than_buffer_is_capped() {
    let statement = MockStatement::new()
        .column("DNAME", 5)
        .row([Some("ACCOUNTING")]);
    let session = session("SELECT dname FROM dept", statement);
    let mut cursor = session.open_cursor().unwrap();

    let mut rows = cursor.run_query("SELECT dname FROM dept").unwrap();
    {
        let row = rows.next().unwrap().unwrap();
        let cell = row.get(0).unwrap();
        assert_eq!(cell.as_str(), Some("ACCOU"));
        assert!(cell.is_truncated());
    }
    assert!(rows.next().unwrap().is_none());
    assert_eq!(rows.summary().unwrap().truncated_values, 1);
}

#[test]
fn test_last_error_is_idempotent() {
    let session = session(EMP, emp_statement());
    let mut cursor = session.open_cursor().unwrap();

    let err = cursor.parse("SELEC nonsense").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Parse));

    let first = session.last_error();
    let second = session.last_error();
    assert_eq!(first, second);
    assert_eq!(first.code, INVALID_SQL);
    assert_eq!(cursor.last_error(), first);
}

#[test]
fn test_fetch_after_failure_never_reaches_engine() {
    let session = session(EMP, emp_statement().fail_fetch_at(2));
    let mut cursor = session.open_cursor().unwrap();

    {
        let mut rows = cursor.run_query(EMP).unwrap();
        assert!(rows.next().unwrap().is_some());

        let err = rows.next().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert_eq!(err.diagnostic().map(|d| d.code), Some(INJECTED));
        assert_eq!(rows.state(), CursorState::Failed);
        assert!(rows.summary().is_none());
    }

    assert_eq!(cursor.state(), CursorState::Failed);
    assert_eq!(cursor.rows_fetched(), 1);
    assert_eq!(cursor.bindings().len(), 3);

    let fetches = session.engine().calls().fetch;
    let err = cursor.fetch().unwrap_err();
    assert!(err.is_state_violation());
    assert_eq!(session.engine().calls().fetch, fetches);
}

#[test]
fn test_execute_failure_requires_reparse() {
    let failing = "DELETE FROM audit_log";
    let engine = MockEngine::new()
        .with_statement(failing, MockStatement::new().fail_execute())
        .with_statement(EMP, emp_statement());
    let session = Session::from_engine(engine, CursorOptions::default());
    let mut cursor = session.open_cursor().unwrap();

    let err = cursor.run_query(failing).err().unwrap();
    assert!(matches!(
        err,
        CursorError::Engine {
            stage: Stage::Execute,
            ..
        }
    ));
    assert_eq!(cursor.state(), CursorState::Failed);

    for _ in 0..2 {
        let err = cursor.fetch().unwrap_err();
        assert!(matches!(
            err,
            CursorError::State {
                operation: "fetch",
                state: CursorState::Failed
            }
        ));
    }
    assert_eq!(session.engine().calls().fetch, 0);

    let (rows, summary) = cursor.run_query(EMP).unwrap().collect_values().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(summary.rows, 3);
}

#[test]
fn test_describe_error_aborts_enumeration() {
    let session = session(EMP, emp_statement().fail_describe_at(2));
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse(EMP).unwrap();
    let err = cursor.describe().unwrap_err();

    assert!(matches!(
        err,
        CursorError::Engine {
            stage: Stage::Describe,
            position: Some(2),
            ..
        }
    ));
    assert_eq!(session.engine().calls().describe, 2);
    assert_eq!(cursor.state(), CursorState::Failed);
    assert!(cursor.columns().is_empty());
}

#[test]
fn test_column_limit_is_enforced() {
    let session = Session::from_engine(
        MockEngine::new().with_statement(EMP, emp_statement()),
        CursorOptions {
            max_columns: 2,
            ..CursorOptions::default()
        },
    );
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse(EMP).unwrap();
    let err = cursor.describe().unwrap_err();
    assert!(matches!(err, CursorError::TooManyColumns { limit: 2 }));
    assert_eq!(cursor.state(), CursorState::Failed);
}

#[test]
fn test_column_limit_allows_exact_fit() {
    let session = Session::from_engine(
        MockEngine::new().with_statement(EMP, emp_statement()),
        CursorOptions {
            max_columns: 3,
            ..CursorOptions::default()
        },
    );
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse(EMP).unwrap();
    assert_eq!(cursor.describe().unwrap().len(), 3);
}

#[test]
fn test_bind_failure_releases_earlier_bindings() {
    let session = session(EMP, emp_statement().fail_bind_at(2));
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse(EMP).unwrap();
    cursor.describe().unwrap();
    let err = cursor.bind().unwrap_err();

    assert!(matches!(
        err,
        CursorError::Engine {
            stage: Stage::Bind,
            position: Some(2),
            ..
        }
    ));
    assert!(cursor.bindings().is_empty());
    assert_eq!(cursor.state(), CursorState::Failed);

    let err = cursor.execute().unwrap_err();
    assert!(err.is_state_violation());
}

#[test]
fn test_allocation_failure_is_reported() {
    let statement = MockStatement::new()
        .column("OK", 4)
        .column("HUGE", usize::MAX);
    let session = session("SELECT huge", statement);
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse("SELECT huge").unwrap();
    cursor.describe().unwrap();
    let err = cursor.bind().unwrap_err();

    assert!(matches!(err, CursorError::Allocation { position: 2, .. }));
    assert!(cursor.bindings().is_empty());
    assert_eq!(session.engine().calls().bind, 1);
}

#[test]
fn test_abandoned_stream_releases_bindings() {
    let engine = MockEngine::new()
        .with_statement(EMP, emp_statement())
        .with_statement("SELECT 1", MockStatement::new().column("ONE", 1).row([Some("1")]));
    let session = Session::from_engine(engine, CursorOptions::default());
    let mut cursor = session.open_cursor().unwrap();

    {
        let mut rows = cursor.run_query(EMP).unwrap();
        assert!(rows.next().unwrap().is_some());
    }

    assert_eq!(cursor.state(), CursorState::Opened);
    assert!(cursor.bindings().is_empty());
    assert!(cursor.fetch().unwrap_err().is_state_violation());

    let (rows, summary) = cursor.run_query("SELECT 1").unwrap().collect_values().unwrap();
    assert_eq!(rows, vec![vec![Some("1".to_string())]]);
    assert_eq!(summary.rows, 1);
}

#[test]
fn test_reparse_discards_previous_statement() {
    let engine = MockEngine::new()
        .with_statement(EMP, emp_statement())
        .with_statement("SELECT 1", MockStatement::new().column("ONE", 1).row([Some("1")]));
    let session = Session::from_engine(engine, CursorOptions::default());
    let mut cursor = session.open_cursor().unwrap();

    cursor.parse(EMP).unwrap();
    cursor.describe().unwrap();
    cursor.bind().unwrap();
    let first_statement = cursor.statement_id();

    cursor.parse("SELECT 1").unwrap();
    assert_eq!(cursor.state(), CursorState::Parsed);
    assert!(cursor.bindings().is_empty());
    assert!(cursor.columns().is_empty());
    assert_eq!(cursor.rows_fetched(), 0);
    assert_ne!(cursor.statement_id(), first_statement);
}

#[test]
fn test_exhausted_cursor_stays_exhausted() {
    let session = session(EMP, emp_statement());
    let mut cursor = session.open_cursor().unwrap();

    let (_, summary) = cursor.run_query(EMP).unwrap().collect_values().unwrap();
    assert_eq!(summary.rows, 3);

    let fetches = session.engine().calls().fetch;
    assert!(cursor.fetch().unwrap().is_none());
    assert_eq!(session.engine().calls().fetch, fetches);
    assert_eq!(cursor.summary().map(|s| s.rows), Some(3));
}

#[test]
fn test_operations_out_of_order_are_rejected() {
    let session = session(EMP, emp_statement());
    let mut cursor = session.open_cursor().unwrap();

    assert!(cursor.describe().unwrap_err().is_state_violation());
    assert!(cursor.bind().unwrap_err().is_state_violation());
    assert!(cursor.execute().unwrap_err().is_state_violation());
    assert!(cursor.fetch().unwrap_err().is_state_violation());

    cursor.parse(EMP).unwrap();
    assert!(cursor.execute().unwrap_err().is_state_violation());
    assert_eq!(session.engine().calls().execute, 0);
}

#[test]
fn test_cursors_are_closed_on_drop() {
    let session = session(EMP, emp_statement());
    {
        let _first = session.open_cursor().unwrap();
        let second = session.open_cursor().unwrap();
        assert_eq!(session.engine().open_cursors(), 2);
        second.close().unwrap();
        assert_eq!(session.engine().open_cursors(), 1);
    }
    assert_eq!(session.engine().open_cursors(), 0);
    assert_eq!(session.engine().calls().close_cursor, 2);
    session.close().unwrap();
}
