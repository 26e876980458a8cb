use tokio::sync::oneshot;

use super::outcome::QueryOutput;
use crate::error::AsyncPoolError;
use crate::pool::PooledConnection;

pub(super) type QueryResponse = Result<QueryOutput, AsyncPoolError>;

/// A dispatched query handed to the poller together with its connection.
///
/// The poller owns the connection until the query reaches a terminal status.
pub(super) struct QueryTask<C> {
    pub(super) conn: PooledConnection<C>,
    pub(super) sql: String,
    pub(super) respond_to: oneshot::Sender<QueryResponse>,
}
