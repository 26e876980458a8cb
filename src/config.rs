use std::time::Duration;

use serde::Deserialize;

use crate::error::AsyncPoolError;

/// Connection ceiling used when the embedder doesn't pick one.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Time between two poll ticks of the query poller.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tunables for a [`ConnectionPool`](crate::pool::ConnectionPool) and its
/// [`AsyncQueryExecutor`](crate::executor::AsyncQueryExecutor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Check that the ceiling and the poll cadence are usable.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConfigError`] when `max_connections` or
    /// `poll_interval` is zero.
    pub fn validate(&self) -> Result<(), AsyncPoolError> {
        if self.max_connections == 0 {
            return Err(AsyncPoolError::ConfigError(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(AsyncPoolError::ConfigError(
                "poll_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse a JSON document such as `{"max_connections": 8, "poll_interval_ms": 2}`.
    /// Missing keys fall back to the defaults.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConfigError`] if the document is malformed or
    /// the resulting values fail [`PoolConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, AsyncPoolError> {
        let file: PoolConfigFile = serde_json::from_str(json)?;
        let config = PoolConfig::from(file);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PoolConfigFile {
    max_connections: usize,
    poll_interval_ms: u64,
}

impl Default for PoolConfigFile {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            poll_interval_ms: 1,
        }
    }
}

impl From<PoolConfigFile> for PoolConfig {
    fn from(file: PoolConfigFile) -> Self {
        Self {
            max_connections: file.max_connections,
            poll_interval: Duration::from_millis(file.poll_interval_ms),
        }
    }
}

/// Fluent builder for [`PoolConfig`].
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    #[must_use]
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.config.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    /// Finish the builder.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConfigError`] if the values fail validation.
    pub fn build(self) -> Result<PoolConfig, AsyncPoolError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
