use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::channel::{QueryResponse, QueryTask};
use super::outcome::classify;
use crate::driver::{PollStatus, PollableConnection};
use crate::pool::ConnectionPool;

/// Drive every in-flight query of one executor to completion.
///
/// One batched status check per tick covers all registered connections. The
/// task parks on the channel while nothing is in flight and exits once all
/// senders are gone and the last query has finished.
pub(super) async fn run_poller<C: PollableConnection>(
    pool: ConnectionPool<C>,
    mut receiver: UnboundedReceiver<QueryTask<C>>,
    poll_interval: Duration,
) {
    let mut in_flight: Vec<QueryTask<C>> = Vec::new();
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut accepting = true;

    loop {
        if in_flight.is_empty() {
            if !accepting {
                break;
            }
            match receiver.recv().await {
                Some(task) => in_flight.push(task),
                None => break,
            }
            // First check happens one full interval after dispatch.
            ticker.reset();
        }

        ticker.tick().await;

        loop {
            match receiver.try_recv() {
                Ok(task) => in_flight.push(task),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    accepting = false;
                    break;
                }
            }
        }

        poll_in_flight(&pool, &mut in_flight);
    }

    debug!("query poller stopped");
}

/// One poll tick: check all connections in a single batch and finish the
/// queries that reached a terminal status.
fn poll_in_flight<C: PollableConnection>(
    pool: &ConnectionPool<C>,
    in_flight: &mut Vec<QueryTask<C>>,
) {
    if in_flight.is_empty() {
        return;
    }

    let statuses = {
        let mut batch: Vec<&mut C> = in_flight.iter_mut().map(|task| &mut *task.conn).collect();
        C::poll_batch(&mut batch)
    };
    if statuses.len() != in_flight.len() {
        warn!(
            expected = in_flight.len(),
            got = statuses.len(),
            "batch poll returned a mismatched status count; missing entries stay pending"
        );
    }
    trace!(in_flight = in_flight.len(), "poll tick");

    let mut statuses = statuses.into_iter();
    let mut still_pending = Vec::with_capacity(in_flight.len());
    for mut task in in_flight.drain(..) {
        let status = statuses.next().unwrap_or(PollStatus::Pending);
        match classify(&mut *task.conn, &task.sql, status) {
            None => still_pending.push(task),
            Some(outcome) => {
                if status == PollStatus::Error {
                    // Reused as-is; the driver decides whether the session recovered.
                    warn!(
                        conn_id = task.conn.id(),
                        "returning connection that reported a driver error to the pool"
                    );
                }
                finish(pool, task, outcome);
            }
        }
    }
    *in_flight = still_pending;
}

/// Release the connection first, then resolve the caller.
fn finish<C: PollableConnection>(
    pool: &ConnectionPool<C>,
    task: QueryTask<C>,
    outcome: QueryResponse,
) {
    let QueryTask {
        conn, respond_to, ..
    } = task;
    let conn_id = conn.id();
    pool.release(conn);
    if respond_to.send(outcome).is_err() {
        debug!(conn_id, "caller stopped waiting; query result discarded");
    }
}
