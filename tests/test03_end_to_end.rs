use std::time::Duration;

use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sql_poll_pool::prelude::*;
use sql_poll_pool::test_utils::{
    QueryScript, ScriptedConnection, ScriptedDriver, poll_once, wait_until,
};

fn executor(driver: &ScriptedDriver, max: usize) -> AsyncQueryExecutor<ScriptedConnection> {
    let config = PoolConfig::builder()
        .max_connections(max)
        .poll_interval(Duration::from_millis(1))
        .build()
        .expect("valid config");
    AsyncQueryExecutor::from_factory(driver.factory(), &config).expect("executor starts")
}

/// Two connections, three queries: the third waits for whichever finishes first.
#[tokio::test(flavor = "current_thread")]
async fn third_query_runs_on_first_released_connection() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.script("SELECT 'a'", QueryScript::default().gated());
    driver.script("SELECT 'b'", QueryScript::default().gated());
    let executor = executor(&driver, 2);

    let mut handles = Vec::new();
    for (started, sql) in ["SELECT 'a'", "SELECT 'b'", "SELECT 'c'"].into_iter().enumerate() {
        let worker = executor.clone();
        handles.push(tokio::spawn(async move { worker.execute(sql).await }));
        if started < 2 {
            wait_until(|| driver.dispatched().len() == started + 1).await;
        }
    }
    wait_until(|| executor.pool().status().waiting == 1).await;

    assert_eq!(
        driver.dispatched(),
        vec![(1, "SELECT 'a'".to_string()), (2, "SELECT 'b'".to_string())]
    );
    let status = executor.pool().status();
    assert_eq!(status.total, 2);
    assert_eq!(status.busy, 2);

    driver.open_gate("SELECT 'a'");
    wait_until(|| driver.dispatched().len() == 3).await;
    assert_eq!(driver.dispatched()[2], (1, "SELECT 'c'".to_string()));

    driver.open_gate("SELECT 'b'");
    for handle in handles {
        let output = handle.await.expect("task completes")?;
        assert_eq!(output.rows_affected(), Some(1));
    }

    let status = executor.pool().status();
    assert_eq!(status.idle, 2);
    assert_eq!(status.waiting, 0);
    assert_eq!(driver.connects(), 2);
    Ok(())
}

/// Many queries with random latencies share one poller and a small pool.
#[tokio::test(flavor = "current_thread")]
async fn concurrent_queries_share_batched_polls() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let statements: Vec<String> = (0..24).map(|i| format!("SELECT {i}")).collect();
    for sql in &statements {
        driver.script(
            sql.clone(),
            QueryScript::default().pending_for(rng.random_range(0..5)),
        );
    }
    let executor = executor(&driver, 3);

    let handles: Vec<_> = statements
        .into_iter()
        .map(|sql| {
            let worker = executor.clone();
            tokio::spawn(async move { worker.execute(&sql).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task completes")?;
    }

    assert_eq!(driver.dispatched().len(), 24);
    assert!(driver.connects() <= 3);
    assert!(driver.largest_batch() <= 3);
    assert!(driver.batch_polls() < 24 * 5);
    assert_eq!(executor.pool().status().idle, driver.connects());
    Ok(())
}

/// A caller that stops waiting doesn't leak the connection.
#[tokio::test(flavor = "current_thread")]
async fn abandoned_execute_returns_connection() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.script("SELECT SLEEP(5)", QueryScript::default().gated());
    let executor = executor(&driver, 1);

    let abandoned = {
        let worker = executor.clone();
        tokio::spawn(async move { worker.execute("SELECT SLEEP(5)").await })
    };
    wait_until(|| driver.dispatched().len() == 1).await;
    abandoned.abort();
    let _ = abandoned.await;

    driver.open_gate("SELECT SLEEP(5)");
    let output = executor.execute("SELECT 2").await?;
    assert_eq!(output.rows_affected(), Some(1));
    assert_eq!(driver.connects(), 1);
    Ok(())
}

/// An `execute` parked in the pool and dropped right after the hand-off
/// gives the connection back instead of leaking the slot.
#[tokio::test(flavor = "current_thread")]
async fn execute_dropped_after_hand_off_keeps_capacity() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    let executor = executor(&driver, 1);
    let held = executor.pool().acquire().await?;

    let mut parked = Box::pin(executor.execute("SELECT 1"));
    assert!(poll_once(&mut parked).is_pending());
    assert_eq!(executor.pool().status().waiting, 1);

    executor.pool().release(held);
    drop(parked);

    let status = executor.pool().status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.busy, 0);
    let output = executor.execute("SELECT 2").await?;
    assert_eq!(output.rows_affected(), Some(1));
    assert!(driver.dispatched().iter().all(|(_, sql)| sql != "SELECT 1"));
    Ok(())
}

/// A timed-out `execute` neither keeps its queue slot nor blocks later callers.
#[tokio::test(flavor = "current_thread")]
async fn timed_out_execute_does_not_hold_a_slot() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    let executor = executor(&driver, 1);
    let held = executor.pool().acquire().await?;

    let timed_out =
        tokio::time::timeout(Duration::from_millis(5), executor.execute("SELECT 1")).await;
    assert!(timed_out.is_err());
    assert_eq!(executor.pool().status().waiting, 0);

    executor.pool().release(held);
    let output = tokio::time::timeout(Duration::from_secs(5), executor.execute("SELECT 2"))
        .await
        .expect("pool still has capacity")?;
    assert_eq!(output.rows_affected(), Some(1));
    assert_eq!(executor.pool().status().idle, 1);
    Ok(())
}
