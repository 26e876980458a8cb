//! Helper utilities for testing and development.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tokio::time::Instant;

use crate::results::CustomDbRow;
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// Poll a future exactly once with a no-op waker.
///
/// Handy for observing whether `acquire` parked without handing control to
/// the runtime.
pub fn poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    std::pin::Pin::new(fut).poll(&mut cx)
}

/// Yield to the runtime until `condition` holds.
///
/// # Panics
/// Panics if the condition is still false after five seconds, so a broken
/// test fails instead of hanging.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "condition not reached within five seconds"
        );
        tokio::task::yield_now().await;
    }
}
