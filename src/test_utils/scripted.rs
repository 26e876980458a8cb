//! In-memory [`PollableConnection`] whose behaviour is scripted per statement.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{FetchedResult, PollStatus, PollableConnection};
use crate::results::ResultSet;

/// How a scripted query ends once its pending ticks are used up.
#[derive(Debug, Clone)]
pub enum ScriptedFinish {
    RowsAffected(u64),
    Rows(ResultSet),
    /// Poll reports [`PollStatus::Error`] with this message.
    DriverError(String),
    /// Poll reports [`PollStatus::Rejected`].
    Rejected,
    /// Poll reports ready but fetching the result fails.
    FetchError(String),
}

/// Behaviour of one statement on a [`ScriptedConnection`].
#[derive(Debug, Clone)]
pub struct QueryScript {
    pub pending_ticks: usize,
    /// Stay pending until [`ScriptedDriver::open_gate`] is called for the statement.
    pub gated: bool,
    pub dispatch_error: Option<String>,
    pub insert_id: Option<u64>,
    pub finish: ScriptedFinish,
}

impl Default for QueryScript {
    fn default() -> Self {
        Self {
            pending_ticks: 0,
            gated: false,
            dispatch_error: None,
            insert_id: None,
            finish: ScriptedFinish::RowsAffected(1),
        }
    }
}

impl QueryScript {
    #[must_use]
    pub fn finishing(finish: ScriptedFinish) -> Self {
        Self {
            finish,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pending_for(mut self, ticks: usize) -> Self {
        self.pending_ticks = ticks;
        self
    }

    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    #[must_use]
    pub fn with_insert_id(mut self, id: u64) -> Self {
        self.insert_id = Some(id);
        self
    }

    #[must_use]
    pub fn failing_dispatch(message: impl Into<String>) -> Self {
        Self {
            dispatch_error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct DriverState {
    scripts: HashMap<String, QueryScript>,
    open_gates: HashSet<String>,
    dispatched: Vec<(usize, String)>,
    connects: usize,
    failing_connects: usize,
    batch_polls: usize,
    largest_batch: usize,
}

/// Shared handle that scripts statements and records what the pool did.
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<Mutex<DriverState>>,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the behaviour for `sql`; unscripted statements affect one row.
    pub fn script(&self, sql: impl Into<String>, script: QueryScript) {
        self.lock().scripts.insert(sql.into(), script);
    }

    /// Let gated queries of `sql` finish on their next poll.
    pub fn open_gate(&self, sql: &str) {
        self.lock().open_gates.insert(sql.to_owned());
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    /// Factory closure suitable for `ConnectionPool::new`.
    pub fn factory(&self) -> impl Fn() -> Result<ScriptedConnection, String> + Send + Sync + 'static {
        let driver = self.clone();
        move || driver.connect()
    }

    /// Open a connection, honouring [`ScriptedDriver::fail_next_connects`].
    ///
    /// # Errors
    /// Returns a message while scripted connect failures remain.
    pub fn connect(&self) -> Result<ScriptedConnection, String> {
        let mut state = self.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err("scripted connect failure".into());
        }
        state.connects += 1;
        Ok(ScriptedConnection {
            number: state.connects,
            driver: self.clone(),
            running: None,
            last_insert_id: 0,
            last_error: String::new(),
        })
    }

    /// Statements in dispatch order, with the number of the connection used.
    #[must_use]
    pub fn dispatched(&self) -> Vec<(usize, String)> {
        self.lock().dispatched.clone()
    }

    /// Successful connection attempts so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Calls to [`PollableConnection::poll_batch`] so far.
    #[must_use]
    pub fn batch_polls(&self) -> usize {
        self.lock().batch_polls
    }

    /// Most connections checked by one batch poll.
    #[must_use]
    pub fn largest_batch(&self) -> usize {
        self.lock().largest_batch
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn script_for(&self, sql: &str) -> QueryScript {
        self.lock().scripts.get(sql).cloned().unwrap_or_default()
    }

    fn gate_open(&self, sql: &str) -> bool {
        self.lock().open_gates.contains(sql)
    }
}

struct RunningQuery {
    sql: String,
    script: QueryScript,
    ticks_left: usize,
}

/// Connection produced by a [`ScriptedDriver`].
pub struct ScriptedConnection {
    number: usize,
    driver: ScriptedDriver,
    running: Option<RunningQuery>,
    last_insert_id: u64,
    last_error: String,
}

impl ScriptedConnection {
    /// 1-based creation order of this connection.
    #[must_use]
    pub fn number(&self) -> usize {
        self.number
    }
}

impl PollableConnection for ScriptedConnection {
    fn dispatch(&mut self, sql: &str) -> Result<(), String> {
        let script = self.driver.script_for(sql);
        self.driver
            .lock()
            .dispatched
            .push((self.number, sql.to_owned()));
        if let Some(message) = script.dispatch_error {
            self.last_error.clone_from(&message);
            return Err(message);
        }
        self.running = Some(RunningQuery {
            sql: sql.to_owned(),
            ticks_left: script.pending_ticks,
            script,
        });
        Ok(())
    }

    fn poll_status(&mut self) -> PollStatus {
        let Some(query) = self.running.as_mut() else {
            return PollStatus::Pending;
        };
        if query.script.gated && !self.driver.gate_open(&query.sql) {
            return PollStatus::Pending;
        }
        if query.ticks_left > 0 {
            query.ticks_left -= 1;
            return PollStatus::Pending;
        }
        match &query.script.finish {
            ScriptedFinish::DriverError(message) => {
                self.last_error.clone_from(message);
                self.running = None;
                PollStatus::Error
            }
            ScriptedFinish::Rejected => {
                self.running = None;
                PollStatus::Rejected
            }
            _ => PollStatus::Ready,
        }
    }

    fn poll_batch(batch: &mut [&mut Self]) -> Vec<PollStatus> {
        if let Some(first) = batch.first() {
            let mut state = first.driver.lock();
            state.batch_polls += 1;
            state.largest_batch = state.largest_batch.max(batch.len());
        }
        batch.iter_mut().map(|conn| conn.poll_status()).collect()
    }

    fn fetch_result(&mut self) -> Result<FetchedResult, String> {
        let query = self
            .running
            .take()
            .ok_or_else(|| "no query result to fetch".to_string())?;
        if let Some(id) = query.script.insert_id {
            self.last_insert_id = id;
        }
        match query.script.finish {
            ScriptedFinish::RowsAffected(count) => Ok(FetchedResult::RowsAffected(count)),
            ScriptedFinish::Rows(rows) => Ok(FetchedResult::Rows(rows)),
            ScriptedFinish::FetchError(message) => {
                self.last_error.clone_from(&message);
                Err(message)
            }
            ScriptedFinish::DriverError(message) => Err(message),
            ScriptedFinish::Rejected => Err("query was rejected".into()),
        }
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }
}
