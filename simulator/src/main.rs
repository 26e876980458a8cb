mod args;
mod backend;
mod driver;
mod logging;
mod model;
mod oracle;

use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::Level;

use crate::args::{Args, SimConfig};
use crate::driver::run;
use crate::logging::{EventLog, LogWriter};

fn main() -> ExitCode {
    let args = Args::parse();
    let config = SimConfig::from_args(args);
    let writer = match LogWriter::new(config.log.clone()) {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("failed to open log file: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let config_json = serde_json::to_string_pretty(&config).unwrap_or_else(|_| "{}".to_string());
    tracing::info!("config: {}", config_json);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut events = EventLog::new(config.first_events, config.tail_events);
    match run(&config, &mut rng, &mut events) {
        Ok(summary) => {
            tracing::info!(
                queries = summary.resolved,
                succeeded = summary.succeeded,
                planned_failures = summary.planned_failures,
                connect_failures = summary.connect_failures,
                skipped = summary.skipped,
                connections = summary.connections_opened,
                batch_polls = summary.batch_polls,
                largest_batch = summary.largest_batch,
                simulated_ms = summary.simulated_ms,
                "simulation passed"
            );
            ExitCode::SUCCESS
        }
        Err(reason) => {
            events.dump(&reason);
            tracing::error!(seed = config.seed, "simulation failed, rerun with --seed {}", config.seed);
            ExitCode::FAILURE
        }
    }
}
