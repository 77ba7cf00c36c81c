#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::inefficient_to_string,
    clippy::multiple_crate_versions,
    clippy::redundant_pub_crate,
    clippy::use_self
)]

#[macro_use]
extern crate tracing;
#[macro_use]
extern crate async_trait;

mod cli;
mod config;
mod logging;
mod probes;
mod shutdown;
mod sinks;
mod worker;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use cli::Cli;
use sinks::http::HttpSink;
use worker::SharedState;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse_args();

    let (mut conf, sensors) = match config::load(&args.config) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("failed to load config {}: {err:#}", args.config.display());
            return ExitCode::FAILURE;
        }
    };
    if let Some(debug) = args.debug {
        conf.debug = debug;
    }

    logging::init(&conf);

    if args.daemonize {
        debug!("-g/--daemonize accepted for compatibility; this process never forks");
    }

    match run(conf, sensors).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("collectord exiting after unrecoverable error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    conf: config::CollectorConfig,
    sensors: Vec<collector_core::SensorDescriptor>,
) -> Result<()> {
    if sensors.is_empty() {
        anyhow::bail!("config file defines no usable sensors");
    }

    let shutdown = shutdown::install().context("installing signal handlers")?;
    let http = HttpSink::new(&conf.http);

    let state = Arc::new(SharedState {
        config: conf,
        store: collector_core::MeasurementStore::new(),
        http,
        shutdown: shutdown.clone(),
    });

    let sensors: Vec<Arc<collector_core::SensorDescriptor>> =
        sensors.into_iter().map(Arc::new).collect();

    info!(
        "starting {} worker(s) over {} sensor(s)",
        state.config.threads,
        sensors.len()
    );

    let handles = worker::spawn(sensors, state);
    futures::future::join_all(handles).await;

    info!("all workers exited, shutting down");
    Ok(())
}
