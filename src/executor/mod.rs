mod channel;
mod outcome;
mod poller;

pub use outcome::{QueryOutput, is_insert_statement};

use std::fmt;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tracing::debug;

use crate::config::PoolConfig;
use crate::driver::{ConnectionFactory, PollableConnection};
use crate::error::AsyncPoolError;
use crate::pool::ConnectionPool;

use channel::QueryTask;
use poller::run_poller;

/// Runs queries on pooled connections without blocking the calling task.
///
/// Each `execute` checks out a connection, dispatches the statement and hands
/// the connection to a single background poller shared by all queries of this
/// executor. The poller checks every in-flight connection once per tick,
/// returns the connection to the pool when the query finishes and then
/// resolves the caller.
///
/// Connections go back to the pool after every outcome, including driver
/// errors. Whether a connection that reported an error is still healthy is
/// up to the driver; this executor doesn't discard it.
pub struct AsyncQueryExecutor<C> {
    pool: ConnectionPool<C>,
    sender: UnboundedSender<QueryTask<C>>,
}

impl<C> Clone for AsyncQueryExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<C: PollableConnection> fmt::Debug for AsyncQueryExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncQueryExecutor")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl<C: PollableConnection> AsyncQueryExecutor<C> {
    /// Start an executor over an existing pool.
    ///
    /// Spawns the poller on the current tokio runtime; it stops after the last
    /// executor clone is dropped and the remaining queries have finished.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConfigError`] for an invalid configuration and
    /// [`AsyncPoolError::ConnectionError`] when called outside a tokio runtime.
    pub fn new(pool: ConnectionPool<C>, config: &PoolConfig) -> Result<Self, AsyncPoolError> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|err| {
            AsyncPoolError::ConnectionError(format!("no tokio runtime for the query poller: {err}"))
        })?;

        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(run_poller(pool.clone(), receiver, config.poll_interval));

        Ok(Self { pool, sender })
    }

    /// Build the pool from `factory` and start an executor over it.
    ///
    /// # Errors
    /// Same as [`AsyncQueryExecutor::new`].
    pub fn from_factory(
        factory: impl ConnectionFactory<C>,
        config: &PoolConfig,
    ) -> Result<Self, AsyncPoolError> {
        let pool = ConnectionPool::with_config(factory, config)?;
        Self::new(pool, config)
    }

    /// Run `sql` and wait for its outcome.
    ///
    /// `INSERT` statements resolve with the generated id instead of a row
    /// count. If the returned future is dropped after dispatch, the query
    /// still runs to completion and its connection is returned to the pool.
    ///
    /// # Errors
    /// - [`AsyncPoolError::ConnectionFactory`] if a connection had to be opened and couldn't be.
    /// - [`AsyncPoolError::Dispatch`] if the driver refused to send the query.
    /// - [`AsyncPoolError::QueryExecution`] if the query or the result fetch failed.
    /// - [`AsyncPoolError::QueryRejected`] if the driver discarded the query.
    /// - [`AsyncPoolError::ConnectionError`] if the poller is no longer running.
    pub async fn execute(&self, sql: &str) -> Result<QueryOutput, AsyncPoolError> {
        let mut conn = self.pool.acquire().await?;

        if let Err(message) = conn.dispatch(sql) {
            debug!(conn_id = conn.id(), "dispatch failed; returning connection");
            self.pool.release(conn);
            return Err(AsyncPoolError::Dispatch(message));
        }

        let (respond_to, response) = oneshot::channel();
        let task = QueryTask {
            conn,
            sql: sql.to_owned(),
            respond_to,
        };
        if let Err(mpsc::error::SendError(task)) = self.sender.send(task) {
            self.pool.release(task.conn);
            return Err(poller_gone());
        }

        response.await.map_err(|_| poller_gone())?
    }

    /// The pool this executor draws connections from.
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }
}

fn poller_gone() -> AsyncPoolError {
    AsyncPoolError::ConnectionError("query poller stopped before the query finished".into())
}
