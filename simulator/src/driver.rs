use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use sql_poll_pool::prelude::*;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::args::SimConfig;
use crate::backend::{SimBackend, SimConnection};
use crate::logging::{EventLog, SimEvent};
use crate::model::{PlannedQuery, generate_plan};
use crate::oracle::{Oracle, Verdict};

type Queue = Arc<Mutex<VecDeque<PlannedQuery>>>;

#[derive(Debug, Default)]
pub(crate) struct RunSummary {
    pub(crate) resolved: usize,
    pub(crate) succeeded: usize,
    pub(crate) planned_failures: usize,
    pub(crate) connect_failures: usize,
    pub(crate) skipped: usize,
    pub(crate) connections_opened: usize,
    pub(crate) batch_polls: usize,
    pub(crate) largest_batch: usize,
    pub(crate) simulated_ms: u64,
}

impl RunSummary {
    fn absorb(&mut self, tally: &RunSummary) {
        self.resolved += tally.resolved;
        self.succeeded += tally.succeeded;
        self.planned_failures += tally.planned_failures;
        self.connect_failures += tally.connect_failures;
    }

    fn count(&mut self, verdict: Verdict) {
        self.resolved += 1;
        match verdict {
            Verdict::Succeeded => self.succeeded += 1,
            Verdict::PlannedFailure => self.planned_failures += 1,
            Verdict::ConnectFailure => self.connect_failures += 1,
        }
    }
}

enum Report {
    Event(SimEvent),
    Failed(String),
}

/// Run one seeded simulation on a paused-clock runtime, so poll ticks cost no
/// wall time and the interleaving is reproducible.
pub(crate) fn run(
    config: &SimConfig,
    rng: &mut ChaCha8Rng,
    events: &mut EventLog,
) -> Result<RunSummary, String> {
    let plan = generate_plan(config, rng);
    let backend = SimBackend::new(&plan, config.connect_fail_rate, rng.random());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|err| format!("failed to build runtime: {err}"))?;
    runtime.block_on(simulate(config, plan, backend, events))
}

async fn simulate(
    config: &SimConfig,
    plan: Vec<PlannedQuery>,
    backend: SimBackend,
    events: &mut EventLog,
) -> Result<RunSummary, String> {
    let pool_config = PoolConfig::builder()
        .max_connections(config.pool_size)
        .poll_interval(Duration::from_millis(config.poll_interval_ms))
        .build()
        .map_err(|err| err.to_string())?;
    let factory_backend = backend.clone();
    let executor: AsyncQueryExecutor<SimConnection> =
        AsyncQueryExecutor::from_factory(move || factory_backend.connect(), &pool_config)
            .map_err(|err| err.to_string())?;

    let planned = plan.len();
    let queue: Queue = Arc::new(Mutex::new(VecDeque::from(plan)));
    let started = Instant::now();
    let deadline = config
        .duration_ms
        .map(|ms| started + Duration::from_millis(ms));

    let (reports, mut inbox) = mpsc::unbounded_channel();
    let mut workers = JoinSet::new();
    for _ in 0..config.tasks {
        workers.spawn(worker(
            executor.clone(),
            Arc::clone(&queue),
            started,
            deadline,
            reports.clone(),
        ));
    }
    drop(reports);

    let mut failure = None;
    while let Some(report) = inbox.recv().await {
        match report {
            Report::Event(event) => events.record(event),
            Report::Failed(reason) => {
                if failure.is_none() {
                    failure = Some(reason);
                    workers.abort_all();
                }
            }
        }
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(tally) => summary.absorb(&tally),
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                failure.get_or_insert_with(|| format!("worker panicked: {err}"));
            }
        }
    }
    if let Some(reason) = failure {
        return Err(reason);
    }

    let violations = backend.take_violations();
    if let Some(first) = violations.first() {
        return Err(format!("{} protocol violations, first: {first}", violations.len()));
    }

    summary.skipped = queue.lock().unwrap_or_else(PoisonError::into_inner).len();
    if summary.resolved + summary.skipped != planned {
        return Err(format!(
            "{} queries resolved and {} skipped out of {planned}",
            summary.resolved, summary.skipped
        ));
    }

    let stats = backend.stats();
    Oracle::check_quiescent(&executor.pool().status(), &stats)?;
    summary.connections_opened = stats.connections_opened;
    summary.batch_polls = stats.batch_polls;
    summary.largest_batch = stats.largest_batch;
    summary.simulated_ms = elapsed_ms(started);
    tracing::info!(
        failed_connects = stats.failed_connects,
        events = events.len(),
        "all callers resolved"
    );
    Ok(summary)
}

async fn worker(
    executor: AsyncQueryExecutor<SimConnection>,
    queue: Queue,
    started: Instant,
    deadline: Option<Instant>,
    reports: mpsc::UnboundedSender<Report>,
) -> RunSummary {
    let mut tally = RunSummary::default();
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(query) = next else {
            break;
        };

        let result = executor.execute(&query.sql).await;
        let checked = Oracle::check_outcome(&query, &result).and_then(|verdict| {
            Oracle::check_status(&executor.pool().status())?;
            Ok(verdict)
        });

        let _ = reports.send(Report::Event(SimEvent {
            at_ms: elapsed_ms(started),
            query: query.id,
            detail: describe(&result),
        }));
        match checked {
            Ok(verdict) => tally.count(verdict),
            Err(reason) => {
                let _ = reports.send(Report::Failed(format!("q{}: {reason}", query.id)));
                break;
            }
        }
    }
    tally
}

fn describe(result: &Result<QueryOutput, AsyncPoolError>) -> String {
    match result {
        Ok(QueryOutput::Rows(rows)) => format!("rows={}", rows.results.len()),
        Ok(QueryOutput::RowsAffected(count)) => format!("affected={count}"),
        Ok(QueryOutput::InsertId(id)) => format!("insert_id={id}"),
        Err(err) => format!("error: {err}"),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
