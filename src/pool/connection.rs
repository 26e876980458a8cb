use std::fmt;
use std::ops::{Deref, DerefMut};

/// A driver connection checked out of a [`ConnectionPool`](super::ConnectionPool).
///
/// The wrapper remembers which pool created the connection so `release` can
/// refuse connections it doesn't own. It is not `Clone`: holding
/// the value is what makes a connection busy.
///
/// Dropping a `PooledConnection` without releasing it closes the connection
/// but keeps its slot counted against the pool ceiling.
pub struct PooledConnection<C> {
    pool_id: u64,
    id: u64,
    conn: C,
}

impl<C> PooledConnection<C> {
    pub(crate) fn new(pool_id: u64, id: u64, conn: C) -> Self {
        Self { pool_id, id, conn }
    }

    /// Identifier of this connection within its pool, starting at 1.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn pool_id(&self) -> u64 {
        self.pool_id
    }

    /// Borrow the driver connection.
    #[must_use]
    pub fn get_ref(&self) -> &C {
        &self.conn
    }

    /// Mutably borrow the driver connection.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

// Manual Debug implementation because driver connections rarely implement `Debug`
impl<C> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool_id", &self.pool_id)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
