//! Track simulation - vehicles and traffic lights on a one-dimensional track
//!
//! Reads control commands from stdin and reports every state change through
//! structured logging (and optionally a JSONL event log).
//!
//! Module structure:
//! - `domain/` - Core types (colors, commands, events, motion)
//! - `io/` - Edges (event channel, dispatcher, sinks, command source)
//! - `services/` - Entities and lifecycle (lights, vehicles, clock, controller)
//! - `infra/` - Infrastructure (Config, Metrics, signals)

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use track_sim::domain::command::COMMAND_HELP;
use track_sim::infra::signal::shutdown_requested;
use track_sim::infra::{Config, Metrics};
use track_sim::io::{
    create_event_channel, new_run_id, run_command_source, EventDispatcher, JsonlSink, LogSink,
    PresentationSink,
};
use track_sim::services::SimulationController;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Track simulation - concurrent traffic lights and vehicles
#[derive(Parser, Debug)]
#[command(name = "track-sim", version, about)]
struct Args {
    /// Path to TOML configuration file [default: $CONFIG_FILE, then config/dev.toml]
    #[arg(short, long)]
    config: Option<String>,

    /// Start the simulation without waiting for a `start` command
    #[arg(long)]
    auto_start: bool,

    /// Append every event as JSON lines to this file (overrides config)
    #[arg(long)]
    events_file: Option<String>,

    /// Stop automatically after this many seconds
    #[arg(long)]
    run_for: Option<u64>,

    /// Also log the once-per-second clock ticks
    #[arg(long)]
    show_clock: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-tick visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %env!("CARGO_PKG_VERSION"), git = %env!("GIT_HASH"), "track-sim starting");

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(run(args));
    // A pending stdin read parks a blocking thread that never returns on its own
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config_path = args.config.clone().unwrap_or_else(Config::default_config_path);
    let mut config = Config::load_from_path(&config_path);
    if args.events_file.is_some() {
        config = config.with_events_file(args.events_file.clone());
    }

    info!(
        config_file = %config.config_file(),
        track_length = %config.track_length(),
        lights = ?config.initial_lights(),
        base_speeds = ?config.initial_speeds(),
        tick_ms = %config.tick_period().as_millis(),
        grace_ms = %config.shutdown_grace().as_millis(),
        events_file = ?config.events_file(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let (events, event_rx) = create_event_channel(config.event_channel_capacity());

    // Sinks are opened before anything runs so a bad path fails fast
    let run_id = new_run_id();
    let mut sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(LogSink::new(args.show_clock))];
    if let Some(path) = config.events_file() {
        sinks.push(Box::new(JsonlSink::open(path, run_id.clone())?));
    }

    let controller = Arc::new(SimulationController::new(config.clone(), events, metrics.clone()));

    let dispatcher = EventDispatcher::new(event_rx, sinks, metrics.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run(controller.stopped_signal()));

    // Start metrics reporter
    let reporter_metrics = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    let mut reporter_stopped = controller.stopped_signal();
    let reporter_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut reporter_stopped) => break,
                _ = interval.tick() => reporter_metrics.report().log(),
            }
        }
    });

    // Handle shutdown on Ctrl+C
    let signal_controller = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown_signal_received");
            if let Err(e) = signal_controller.stop().await {
                debug!(reason = %e.as_str(), "shutdown_already_in_progress");
            }
        }
    });

    if let Some(secs) = args.run_for {
        let timer_controller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!(secs = %secs, "run_for_elapsed");
            if let Err(e) = timer_controller.stop().await {
                debug!(reason = %e.as_str(), "shutdown_already_in_progress");
            }
        });
    }

    if args.auto_start {
        if let Err(e) = controller.start() {
            warn!(error = %e, "auto_start_failed");
        }
    } else {
        info!("{}", COMMAND_HELP);
    }

    let command_task =
        tokio::spawn(run_command_source(BufReader::new(tokio::io::stdin()), controller.clone()));

    // Wait until every entity task has been joined
    let mut stopped = controller.stopped_signal();
    shutdown_requested(&mut stopped).await;

    let dispatched = dispatcher_task.await?;
    reporter_task.await?;
    command_task.abort();

    metrics.report().log();
    info!(run_id = %run_id, events = %dispatched, "track-sim shutdown complete");
    Ok(())
}
