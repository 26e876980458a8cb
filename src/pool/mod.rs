pub mod connection;
pub mod types;

pub use connection::PooledConnection;
pub use types::PoolStatus;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::driver::ConnectionFactory;
use crate::error::AsyncPoolError;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Bounded set of lazily created connections with a FIFO queue of waiters.
///
/// `acquire` reuses an idle connection, otherwise creates one while the pool
/// is below its ceiling, otherwise parks the caller. `release` hands the
/// connection straight to the oldest parked caller, so a connection never
/// sits idle while someone is waiting for one.
///
/// Cloning is cheap; clones share the same connections.
pub struct ConnectionPool<C> {
    inner: Arc<PoolInner<C>>,
}

struct PoolInner<C> {
    id: u64,
    max_connections: usize,
    factory: Box<dyn ConnectionFactory<C>>,
    state: Mutex<PoolState<C>>,
}

struct PoolState<C> {
    /// Ids of every connection this pool created, idle or busy.
    all: HashSet<u64>,
    idle: Vec<PooledConnection<C>>,
    waiters: VecDeque<oneshot::Sender<PooledConnection<C>>>,
    next_conn_id: u64,
}

impl<C> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Send + 'static> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<C: Send + 'static> ConnectionPool<C> {
    /// Create an empty pool. No connection is opened until the first `acquire`.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConfigError`] if `max_connections` is zero.
    pub fn new(
        factory: impl ConnectionFactory<C>,
        max_connections: usize,
    ) -> Result<Self, AsyncPoolError> {
        if max_connections == 0 {
            return Err(AsyncPoolError::ConfigError(
                "max_connections must be at least 1".into(),
            ));
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                max_connections,
                factory: Box::new(factory),
                state: Mutex::new(PoolState {
                    all: HashSet::new(),
                    idle: Vec::new(),
                    waiters: VecDeque::new(),
                    next_conn_id: 1,
                }),
            }),
        })
    }

    /// Create a pool sized by `config.max_connections`.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConfigError`] if the configuration is invalid.
    pub fn with_config(
        factory: impl ConnectionFactory<C>,
        config: &PoolConfig,
    ) -> Result<Self, AsyncPoolError> {
        config.validate()?;
        Self::new(factory, config.max_connections)
    }

    /// Check out a connection, waiting for a release if the pool is saturated.
    ///
    /// Completes without suspending when a connection is idle or can be
    /// created. Waiters are served strictly in arrival order. Dropping the
    /// returned future gives up the place in the queue; a connection that was
    /// already handed to it is released again.
    ///
    /// # Errors
    /// Returns [`AsyncPoolError::ConnectionFactory`] if a new connection was
    /// needed and the factory failed. The failed attempt doesn't count toward
    /// the ceiling.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, AsyncPoolError> {
        let mut waiter = {
            let mut state = self.inner.lock_state();

            if let Some(conn) = state.idle.pop() {
                return Ok(conn);
            }

            if state.all.len() < self.inner.max_connections {
                // The lock stays held across the factory call so the slot
                // can't be claimed twice.
                let raw = self.inner.factory.connect()?;
                let conn_id = state.next_conn_id;
                state.next_conn_id += 1;
                state.all.insert(conn_id);
                debug!(
                    pool_id = self.inner.id,
                    conn_id,
                    total = state.all.len(),
                    "opened new connection"
                );
                return Ok(PooledConnection::new(self.inner.id, conn_id, raw));
            }

            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            debug!(
                pool_id = self.inner.id,
                waiting = state.waiters.len(),
                "pool saturated; queued acquire"
            );
            PendingAcquire {
                pool: self,
                receiver,
                settled: false,
            }
        };

        let handed = (&mut waiter.receiver).await;
        waiter.settled = true;
        handed.map_err(|_| {
            AsyncPoolError::ConnectionError("pool dropped while waiting for a connection".into())
        })
    }

    /// Return a connection to the pool.
    ///
    /// The oldest live waiter receives it directly; only when nobody is
    /// waiting does it become idle. Releasing a connection this pool didn't
    /// create, or one that is already idle, is ignored.
    pub fn release(&self, conn: PooledConnection<C>) {
        let mut state = self.inner.lock_state();

        if conn.pool_id() != self.inner.id || !state.all.contains(&conn.id()) {
            warn!(
                pool_id = self.inner.id,
                foreign_pool_id = conn.pool_id(),
                conn_id = conn.id(),
                "ignoring release of a connection from another pool"
            );
            return;
        }
        if state.idle.iter().any(|idle| idle.id() == conn.id()) {
            warn!(
                pool_id = self.inner.id,
                conn_id = conn.id(),
                "ignoring release of an already idle connection"
            );
            return;
        }

        let mut conn = conn;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(conn) {
                Ok(()) => {
                    debug!(pool_id = self.inner.id, "handed connection to waiter");
                    return;
                }
                // The waiting caller went away; try the next one.
                Err(returned) => conn = returned,
            }
        }

        state.idle.push(conn);
    }

    /// Snapshot of the pool's counters.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.lock_state();
        let total = state.all.len();
        let idle = state.idle.len();
        PoolStatus {
            max_connections: self.inner.max_connections,
            total,
            idle,
            busy: total - idle,
            waiting: state.waiters.iter().filter(|w| !w.is_closed()).count(),
        }
    }

    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }
}

/// A parked `acquire`. If it is dropped after `release` already handed it a
/// connection, the connection goes back through `release` instead of being
/// lost with the channel.
struct PendingAcquire<'a, C: Send + 'static> {
    pool: &'a ConnectionPool<C>,
    receiver: oneshot::Receiver<PooledConnection<C>>,
    settled: bool,
}

impl<C: Send + 'static> Drop for PendingAcquire<'_, C> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.receiver.close();
        if let Ok(conn) = self.receiver.try_recv() {
            debug!(
                pool_id = self.pool.inner.id,
                conn_id = conn.id(),
                "waiter dropped after hand-off; passing connection on"
            );
            self.pool.release(conn);
        }
    }
}

impl<C> PoolInner<C> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<C>> {
        // Critical sections never panic midway, so a poisoned lock still
        // guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
