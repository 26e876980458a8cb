use sql_poll_pool::AsyncPoolError;
use sql_poll_pool::pool::ConnectionPool;
use sql_poll_pool::test_utils::{ScriptedDriver, wait_until};
use tokio::sync::mpsc;

/// With a single connection, parked callers are served in the order they arrived.
#[tokio::test(flavor = "current_thread")]
async fn waiters_are_served_first_in_first_out() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    let pool = ConnectionPool::new(driver.factory(), 1)?;
    let held = pool.acquire().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    for (queued, label) in ["A", "B", "C"].into_iter().enumerate() {
        let waiter_pool = pool.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let conn = waiter_pool.acquire().await.expect("waiter resolves");
            tx.send((label, conn)).expect("test still listening");
        });
        wait_until(|| pool.status().waiting == queued + 1).await;
    }

    pool.release(held);
    let mut order = Vec::new();
    for _ in 0..3 {
        let (label, conn) = rx.recv().await.expect("waiter reported");
        order.push(label);
        assert_eq!(pool.status().idle, 0, "hand-off must bypass the idle set");
        pool.release(conn);
    }

    assert_eq!(order, vec!["A", "B", "C"]);
    assert_eq!(driver.connects(), 1);
    assert_eq!(pool.status().idle, 1);
    Ok(())
}

/// A burst far above capacity never creates more than `max_connections`.
#[tokio::test(flavor = "current_thread")]
async fn burst_respects_connection_ceiling() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    let pool = ConnectionPool::new(driver.factory(), 4)?;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let conn = pool.acquire().await.expect("acquire");
            let status = pool.status();
            assert!(status.total <= status.max_connections);
            assert!(status.waiting == 0 || status.is_saturated());
            tokio::task::yield_now().await;
            pool.release(conn);
        }));
    }
    for handle in handles {
        handle.await.expect("task completes");
    }

    let status = pool.status();
    assert_eq!(driver.connects(), 4);
    assert_eq!(status.total, 4);
    assert_eq!(status.idle, 4);
    assert_eq!(status.waiting, 0);
    Ok(())
}

/// A failed first connection attempt leaves no phantom reservation behind.
#[tokio::test(flavor = "current_thread")]
async fn factory_failure_leaves_pool_empty() -> Result<(), AsyncPoolError> {
    let driver = ScriptedDriver::new();
    driver.fail_next_connects(1);
    let pool = ConnectionPool::new(driver.factory(), 1)?;

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, AsyncPoolError::ConnectionFactory(_)));
    assert_eq!(pool.status().total, 0);

    let conn = pool.acquire().await?;
    assert_eq!(conn.number(), 1);
    assert_eq!(pool.status().total, 1);
    Ok(())
}
