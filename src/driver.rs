//! Capability traits the embedding application implements for its driver.
//!
//! The pool never speaks a wire protocol itself. It creates connections
//! through a [`ConnectionFactory`] and the executor drives each query through
//! the non-blocking [`PollableConnection`] surface.

use std::fmt::Display;

use crate::error::AsyncPoolError;
use crate::results::ResultSet;

/// Outcome of one non-blocking status check on a dispatched query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Still running; check again on the next tick.
    Pending,
    /// Finished; the result can be fetched.
    Ready,
    /// Finished with a driver-reported error, see [`PollableConnection::last_error`].
    Error,
    /// The driver discarded the query without an error message.
    Rejected,
}

impl PollStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollStatus::Pending)
    }
}

/// What a driver hands back from [`PollableConnection::fetch_result`].
#[derive(Debug, Clone)]
pub enum FetchedResult {
    /// Row count reported for a statement that returns no rows.
    RowsAffected(u64),
    /// Rows returned by a query.
    Rows(ResultSet),
}

/// A physical connection that can run one query at a time without blocking.
///
/// All methods must return promptly: the executor calls them from a single
/// poller task that serves every in-flight query.
pub trait PollableConnection: Send + 'static {
    /// Send `sql` without waiting for it to complete.
    ///
    /// # Errors
    /// Returns the driver's message when the query could not be sent.
    fn dispatch(&mut self, sql: &str) -> Result<(), String>;

    /// Check whether the dispatched query has finished.
    fn poll_status(&mut self) -> PollStatus;

    /// Check a batch of connections in one call.
    ///
    /// The returned vector must line up index-for-index with `batch`. The
    /// default checks each connection in turn; drivers with a native
    /// multi-connection poll (e.g. `mysqli_poll`) should override it.
    fn poll_batch(batch: &mut [&mut Self]) -> Vec<PollStatus>
    where
        Self: Sized,
    {
        batch.iter_mut().map(|conn| conn.poll_status()).collect()
    }

    /// Collect the result once [`PollStatus::Ready`] was reported.
    ///
    /// # Errors
    /// Returns the driver's message when the result can't be read.
    fn fetch_result(&mut self) -> Result<FetchedResult, String>;

    /// Identifier generated by the most recent insertion on this connection.
    fn last_insert_id(&self) -> u64;

    /// Message of the most recent driver error on this connection.
    fn last_error(&self) -> String;
}

/// Creates new physical connections on demand.
///
/// Closures returning `Result<C, E>` with a displayable error implement this
/// automatically:
/// ```rust,ignore
/// let pool = ConnectionPool::new(|| MyConn::open("db.example:3306"), 8)?;
/// ```
pub trait ConnectionFactory<C>: Send + Sync + 'static {
    /// Open one connection.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConnectionFactory`] describing why the
    /// connection could not be opened.
    fn connect(&self) -> Result<C, AsyncPoolError>;
}

impl<C, E, F> ConnectionFactory<C> for F
where
    F: Fn() -> Result<C, E> + Send + Sync + 'static,
    E: Display,
{
    fn connect(&self) -> Result<C, AsyncPoolError> {
        self().map_err(|err| AsyncPoolError::ConnectionFactory(err.to_string()))
    }
}
