//! Convenient imports for common functionality.

pub use crate::config::{PoolConfig, PoolConfigBuilder};
pub use crate::driver::{ConnectionFactory, FetchedResult, PollStatus, PollableConnection};
pub use crate::error::AsyncPoolError;
pub use crate::executor::{AsyncQueryExecutor, QueryOutput};
pub use crate::pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::RowValues;
