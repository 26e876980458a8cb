use std::sync::Arc;

use sql_poll_pool::prelude::*;
use sql_poll_pool::test_utils::{
    QueryScript, ScriptedConnection, ScriptedDriver, ScriptedFinish, create_test_row, wait_until,
};

fn executor(driver: &ScriptedDriver, max: usize) -> AsyncQueryExecutor<ScriptedConnection> {
    let config = PoolConfig::builder()
        .max_connections(max)
        .build()
        .expect("valid config");
    AsyncQueryExecutor::from_factory(driver.factory(), &config).expect("executor starts")
}

#[tokio::test(flavor = "current_thread")]
async fn insert_resolves_with_generated_id() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.script(
        "INSERT INTO t VALUES (1)",
        QueryScript::finishing(ScriptedFinish::RowsAffected(1))
            .pending_for(2)
            .with_insert_id(42),
    );
    driver.script(
        "insert into t values (2)",
        QueryScript::default().with_insert_id(43),
    );
    let executor = executor(&driver, 2);

    let output = executor.execute("INSERT INTO t VALUES (1)").await?;
    assert_eq!(output.insert_id(), Some(42));
    assert_eq!(output.rows_affected(), None);

    let output = executor.execute("insert into t values (2)").await?;
    assert_eq!(output.insert_id(), Some(43));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn non_insert_results_pass_through() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    let mut rows = ResultSet::default();
    rows.add_row(create_test_row(
        vec!["id".into(), "name".into()],
        vec![RowValues::Int(7), RowValues::Text("alice".into())],
    ));
    driver.script(
        "SELECT id, name FROM users",
        QueryScript::finishing(ScriptedFinish::Rows(rows)),
    );
    driver.script(
        "UPDATE users SET active = 1",
        QueryScript::finishing(ScriptedFinish::RowsAffected(3)).with_insert_id(99),
    );
    let executor = executor(&driver, 1);

    let output = executor.execute("SELECT id, name FROM users").await?;
    let rows = output.rows().expect("row set");
    assert_eq!(rows.results.len(), 1);
    assert_eq!(rows.results[0].get("name"), Some(&RowValues::Text("alice".into())));
    assert_eq!(
        rows.get_column_names().map(Arc::as_ref),
        Some(&vec!["id".to_string(), "name".to_string()])
    );

    let output = executor.execute("UPDATE users SET active = 1").await?;
    assert_eq!(output.rows_affected(), Some(3));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn failures_are_classified_and_connection_is_reused() {
    let driver = ScriptedDriver::new();
    driver.script(
        "SELECT * FROM missing",
        QueryScript::finishing(ScriptedFinish::DriverError(
            "Table 'missing' doesn't exist".into(),
        )),
    );
    driver.script(
        "SELECT big_blob FROM t",
        QueryScript::finishing(ScriptedFinish::FetchError("Commands out of sync".into())),
    );
    driver.script(
        "CALL flaky()",
        QueryScript::finishing(ScriptedFinish::Rejected).pending_for(1),
    );
    let executor = executor(&driver, 1);

    let err = executor.execute("SELECT * FROM missing").await.unwrap_err();
    assert_eq!(
        err,
        AsyncPoolError::QueryExecution("Table 'missing' doesn't exist".into())
    );

    let err = executor.execute("SELECT big_blob FROM t").await.unwrap_err();
    assert_eq!(
        err,
        AsyncPoolError::QueryExecution("Commands out of sync".into())
    );

    let err = executor.execute("CALL flaky()").await.unwrap_err();
    assert_eq!(err, AsyncPoolError::QueryRejected);

    let status = executor.pool().status();
    assert_eq!(status.total, 1);
    assert_eq!(status.idle, 1);
    assert_eq!(driver.connects(), 1);
    assert!(executor.execute("SELECT 1").await.is_ok());
}

#[tokio::test(flavor = "current_thread")]
async fn dispatch_failure_returns_connection_immediately() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.script(
        "SELEC 1",
        QueryScript::failing_dispatch("You have an error in your SQL syntax"),
    );
    let executor = executor(&driver, 1);

    let err = executor.execute("SELEC 1").await.unwrap_err();
    assert_eq!(
        err,
        AsyncPoolError::Dispatch("You have an error in your SQL syntax".into())
    );
    assert_eq!(executor.pool().status().idle, 1);

    let conn = executor.pool().acquire().await?;
    assert_eq!(conn.number(), 1);
    executor.pool().release(conn);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn dispatch_failure_hands_connection_to_next_waiter() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.script("SELEC 1", QueryScript::failing_dispatch("syntax error"));
    let executor = executor(&driver, 1);
    let pool = executor.pool().clone();
    let held = pool.acquire().await?;

    let failing = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.execute("SELEC 1").await })
    };
    wait_until(|| pool.status().waiting == 1).await;
    let next = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    wait_until(|| pool.status().waiting == 2).await;

    pool.release(held);
    let err = failing.await.expect("task completes").unwrap_err();
    assert!(matches!(err, AsyncPoolError::Dispatch(_)));

    let conn = next.await.expect("task completes")?;
    assert_eq!(conn.number(), 1);
    assert_eq!(pool.status().idle, 0);
    pool.release(conn);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn factory_failure_surfaces_through_execute() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.fail_next_connects(1);
    let executor = executor(&driver, 1);

    let err = executor.execute("SELECT 1").await.unwrap_err();
    assert_eq!(
        err,
        AsyncPoolError::ConnectionFactory("scripted connect failure".into())
    );
    assert_eq!(executor.pool().status().total, 0);

    assert!(executor.execute("SELECT 1").await.is_ok());
    assert_eq!(executor.pool().status().total, 1);
    Ok(())
}

#[test]
fn executor_needs_a_runtime() {
    let driver = ScriptedDriver::new();
    let err = AsyncQueryExecutor::from_factory(driver.factory(), &PoolConfig::default())
        .unwrap_err();
    assert!(matches!(err, AsyncPoolError::ConnectionError(_)));
}
