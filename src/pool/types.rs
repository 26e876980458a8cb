/// Point-in-time view of a pool's bookkeeping.
///
/// Taken under the pool lock, so the counts are consistent with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connection ceiling for this pool.
    pub max_connections: usize,
    /// Connections created so far (idle plus busy).
    pub total: usize,
    /// Connections available for immediate reuse.
    pub idle: usize,
    /// Connections currently held by a caller or an in-flight query.
    pub busy: usize,
    /// Callers parked in `acquire` until a connection is released.
    pub waiting: usize,
}

impl PoolStatus {
    /// `true` when every connection has been created and none is idle.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.total == self.max_connections && self.idle == 0
    }
}
