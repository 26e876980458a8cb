use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic sql-poll-pool simulator")]
pub(crate) struct Args {
    /// Stop issuing new queries after this much simulated time.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    #[arg(long, default_value_t = 2_000)]
    pub(crate) queries: usize,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    #[arg(long, default_value_t = 4)]
    pub(crate) pool_size: usize,
    /// Concurrent callers issuing queries.
    #[arg(long, default_value_t = 16)]
    pub(crate) tasks: usize,
    #[arg(long, default_value_t = 1)]
    pub(crate) poll_interval_ms: u64,
    /// Upper bound on how many poll ticks a query stays pending.
    #[arg(long, default_value_t = 8)]
    pub(crate) max_latency_ticks: usize,
    #[arg(long, default_value_t = 0.25)]
    pub(crate) insert_rate: f64,
    #[arg(long, default_value_t = 0.02)]
    pub(crate) error_rate: f64,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) reject_rate: f64,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) fetch_fail_rate: f64,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) dispatch_fail_rate: f64,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) connect_fail_rate: f64,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) queries: usize,
    pub(crate) seed: u64,
    pub(crate) pool_size: usize,
    pub(crate) tasks: usize,
    pub(crate) poll_interval_ms: u64,
    pub(crate) max_latency_ticks: usize,
    pub(crate) insert_rate: f64,
    pub(crate) error_rate: f64,
    pub(crate) reject_rate: f64,
    pub(crate) fetch_fail_rate: f64,
    pub(crate) dispatch_fail_rate: f64,
    pub(crate) connect_fail_rate: f64,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_events: usize,
    pub(crate) tail_events: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            duration_ms: args
                .duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            queries: args.queries,
            seed: args.seed.unwrap_or_else(random_seed),
            pool_size: args.pool_size.max(1),
            tasks: args.tasks.max(1),
            poll_interval_ms: args.poll_interval_ms.max(1),
            max_latency_ticks: args.max_latency_ticks,
            insert_rate: clamp_rate(args.insert_rate),
            error_rate: clamp_rate(args.error_rate),
            reject_rate: clamp_rate(args.reject_rate),
            fetch_fail_rate: clamp_rate(args.fetch_fail_rate),
            dispatch_fail_rate: clamp_rate(args.dispatch_fail_rate),
            connect_fail_rate: clamp_rate(args.connect_fail_rate),
            log: args.log,
            preset: None,
            first_events: 30,
            tail_events: 80,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.queries = 200;
        self.duration_ms = None;
        self.pool_size = 2;
        self.tasks = 6;
        self.max_latency_ticks = 4;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.queries = 50_000;
        self.duration_ms = None;
        self.pool_size = 16;
        self.tasks = 256;
        self.max_latency_ticks = 32;
        self.error_rate = 0.05;
        self.reject_rate = 0.03;
        self.connect_fail_rate = 0.1;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}
