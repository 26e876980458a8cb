//! Bounded async connection pool with FIFO waiters and a central query poller.
//!
//! [`ConnectionPool`] hands out at most `max_connections` driver connections,
//! creating them lazily and parking callers in arrival order once the ceiling
//! is reached. [`AsyncQueryExecutor`] dispatches statements on pooled
//! connections and detects completion with non-blocking status checks, batched
//! across all in-flight queries on a fixed cadence.
//!
//! ```rust,ignore
//! use sql_poll_pool::prelude::*;
//!
//! # async fn demo(factory: impl ConnectionFactory<MyConn>) -> Result<(), AsyncPoolError> {
//! let executor = AsyncQueryExecutor::from_factory(factory, &PoolConfig::default())?;
//! let id = executor.execute("INSERT INTO users (name) VALUES ('alice')").await?;
//! assert!(id.insert_id().is_some());
//! # Ok(()) }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use driver::{ConnectionFactory, FetchedResult, PollStatus, PollableConnection};
pub use error::AsyncPoolError;
pub use executor::{AsyncQueryExecutor, QueryOutput, is_insert_statement};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use results::{CustomDbRow, ResultSet};
pub use types::RowValues;
