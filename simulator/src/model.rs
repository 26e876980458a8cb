use rand::RngExt;

use crate::args::SimConfig;

/// Offset added to a query id to form the identifier its insert reports.
pub(crate) const INSERT_ID_BASE: u64 = 10_000;

/// How a planned query is going to end on the simulated server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    Rows(usize),
    Affected(u64),
    DriverError,
    Rejected,
    FetchError,
    DispatchError,
}

impl Finish {
    pub(crate) fn is_planned_failure(self) -> bool {
        !matches!(self, Finish::Rows(_) | Finish::Affected(_))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PlannedQuery {
    pub(crate) id: usize,
    pub(crate) sql: String,
    pub(crate) latency_ticks: usize,
    pub(crate) finish: Finish,
}

impl PlannedQuery {
    pub(crate) fn insert_id(&self) -> u64 {
        INSERT_ID_BASE + self.id as u64
    }
}

/// Draw the whole workload up front so a seed fully determines it.
pub(crate) fn generate_plan<R: RngExt>(config: &SimConfig, rng: &mut R) -> Vec<PlannedQuery> {
    (0..config.queries)
        .map(|id| {
            let (sql, mut finish) = if rng.random_bool(config.insert_rate) {
                // Mixed case keeps the case-insensitive insert check honest.
                let verb = if rng.random_bool(0.5) { "INSERT" } else { "insert" };
                (
                    format!("{verb} INTO sim_events (id) VALUES ({id})"),
                    Finish::Affected(1),
                )
            } else if rng.random_bool(0.5) {
                (
                    format!("SELECT id, label FROM sim_events WHERE bucket = {id}"),
                    Finish::Rows(rng.random_range(0..4)),
                )
            } else {
                (
                    format!("UPDATE sim_events SET hits = hits + 1 WHERE bucket = {id}"),
                    Finish::Affected(rng.random_range(0..10)),
                )
            };

            if rng.random_bool(config.dispatch_fail_rate) {
                finish = Finish::DispatchError;
            } else if rng.random_bool(config.error_rate) {
                finish = Finish::DriverError;
            } else if rng.random_bool(config.reject_rate) {
                finish = Finish::Rejected;
            } else if rng.random_bool(config.fetch_fail_rate) {
                finish = Finish::FetchError;
            }

            let latency_ticks = if config.max_latency_ticks == 0 {
                0
            } else {
                rng.random_range(0..=config.max_latency_ticks)
            };

            PlannedQuery {
                id,
                sql,
                latency_ticks,
                finish,
            }
        })
        .collect()
}
