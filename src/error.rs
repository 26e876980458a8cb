use thiserror::Error;

/// Errors surfaced by the pool and the query executor.
///
/// Each query resolves with at most one of these; callers can match on the
/// variant to tell a connection-creation failure apart from a failed query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsyncPoolError {
    /// The connection factory failed; pool membership is unchanged and a later
    /// acquire may try again.
    #[error("Connection factory error: {0}")]
    ConnectionFactory(String),

    /// The driver refused to send the query. The connection has already been
    /// returned to the pool.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// The query completed with a driver error, or fetching its result failed.
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// The driver discarded the query without reporting a specific error.
    #[error("Query was rejected")]
    QueryRejected,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The poller that owns in-flight queries is gone, usually because the
    /// runtime is shutting down.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl From<serde_json::Error> for AsyncPoolError {
    fn from(err: serde_json::Error) -> Self {
        AsyncPoolError::ConfigError(format!("invalid pool configuration: {err}"))
    }
}
