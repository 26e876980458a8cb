use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sql_poll_pool::prelude::*;

use crate::model::{Finish, PlannedQuery};

/// Simulated database server shared by every [`SimConnection`].
///
/// Queries are looked up by their exact SQL text, so each planned query must
/// carry a unique statement.
#[derive(Clone)]
pub(crate) struct SimBackend {
    state: Arc<Mutex<BackendState>>,
}

struct BackendState {
    plans: HashMap<String, PlannedQuery>,
    rng: ChaCha8Rng,
    connect_fail_rate: f64,
    next_conn: usize,
    failed_connects: usize,
    running: HashSet<usize>,
    batch_polls: usize,
    largest_batch: usize,
    violations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BackendStats {
    pub(crate) connections_opened: usize,
    pub(crate) failed_connects: usize,
    pub(crate) running: usize,
    pub(crate) batch_polls: usize,
    pub(crate) largest_batch: usize,
}

impl SimBackend {
    pub(crate) fn new(plans: &[PlannedQuery], connect_fail_rate: f64, seed: u64) -> Self {
        let plans = plans
            .iter()
            .map(|plan| (plan.sql.clone(), plan.clone()))
            .collect();
        Self {
            state: Arc::new(Mutex::new(BackendState {
                plans,
                rng: ChaCha8Rng::seed_from_u64(seed),
                connect_fail_rate,
                next_conn: 0,
                failed_connects: 0,
                running: HashSet::new(),
                batch_polls: 0,
                largest_batch: 0,
                violations: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn connect(&self) -> Result<SimConnection, String> {
        let mut state = self.lock();
        let rate = state.connect_fail_rate;
        if state.rng.random_bool(rate) {
            state.failed_connects += 1;
            return Err("simulated connect failure: too many connections".into());
        }
        let number = state.next_conn;
        state.next_conn += 1;
        Ok(SimConnection {
            number,
            backend: self.clone(),
            running: None,
            last_insert_id: 0,
            last_error: String::new(),
        })
    }

    pub(crate) fn stats(&self) -> BackendStats {
        let state = self.lock();
        BackendStats {
            connections_opened: state.next_conn,
            failed_connects: state.failed_connects,
            running: state.running.len(),
            batch_polls: state.batch_polls,
            largest_batch: state.largest_batch,
        }
    }

    /// Protocol violations seen by the server since the last call.
    pub(crate) fn take_violations(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().violations)
    }

    fn violation(&self, message: String) {
        self.lock().violations.push(message);
    }
}

struct Running {
    plan: PlannedQuery,
    remaining: usize,
}

pub(crate) struct SimConnection {
    number: usize,
    backend: SimBackend,
    running: Option<Running>,
    last_insert_id: u64,
    last_error: String,
}

impl SimConnection {
    fn settle(&mut self) {
        self.running = None;
        self.backend.lock().running.remove(&self.number);
    }
}

impl PollableConnection for SimConnection {
    fn dispatch(&mut self, sql: &str) -> Result<(), String> {
        if let Some(current) = &self.running {
            self.backend.violation(format!(
                "conn {} got `{sql}` while q{} was still running",
                self.number, current.plan.id
            ));
        }
        let plan = self
            .backend
            .lock()
            .plans
            .get(sql)
            .cloned()
            .ok_or_else(|| format!("unknown statement: {sql}"))?;
        if plan.finish == Finish::DispatchError {
            return Err(format!("server has gone away (q{})", plan.id));
        }
        self.backend.lock().running.insert(self.number);
        self.running = Some(Running {
            remaining: plan.latency_ticks,
            plan,
        });
        Ok(())
    }

    fn poll_status(&mut self) -> PollStatus {
        let Some(running) = self.running.as_mut() else {
            self.backend
                .violation(format!("conn {} polled with nothing dispatched", self.number));
            return PollStatus::Pending;
        };
        if running.remaining > 0 {
            running.remaining -= 1;
            return PollStatus::Pending;
        }
        let (id, finish) = (running.plan.id, running.plan.finish);
        match finish {
            Finish::DriverError => {
                self.last_error = format!("deadlock found on q{id}");
                self.settle();
                PollStatus::Error
            }
            Finish::Rejected => {
                self.settle();
                PollStatus::Rejected
            }
            _ => PollStatus::Ready,
        }
    }

    fn poll_batch(batch: &mut [&mut Self]) -> Vec<PollStatus> {
        if let Some(first) = batch.first() {
            let mut state = first.backend.lock();
            state.batch_polls += 1;
            state.largest_batch = state.largest_batch.max(batch.len());
        }
        batch.iter_mut().map(|conn| conn.poll_status()).collect()
    }

    fn fetch_result(&mut self) -> Result<FetchedResult, String> {
        let Some(running) = self.running.take() else {
            return Err(format!("conn {} has no result to fetch", self.number));
        };
        self.settle();
        match running.plan.finish {
            Finish::Rows(count) => {
                let columns = Arc::new(vec!["id".into(), "label".into()]);
                let mut result_set = ResultSet::with_columns(columns, count);
                for row in 0..count {
                    result_set
                        .add_row_values(vec![
                            RowValues::Int(row as i64),
                            RowValues::Text(format!("q{}-{row}", running.plan.id)),
                        ])
                        .map_err(|err| err.to_string())?;
                }
                Ok(FetchedResult::Rows(result_set))
            }
            Finish::Affected(count) => {
                if sql_poll_pool::is_insert_statement(&running.plan.sql) {
                    self.last_insert_id = running.plan.insert_id();
                }
                Ok(FetchedResult::RowsAffected(count))
            }
            Finish::FetchError => Err(format!("lost result for q{}", running.plan.id)),
            other => Err(format!("q{} fetched after {other:?}", running.plan.id)),
        }
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }
}
