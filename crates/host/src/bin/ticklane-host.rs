//! ticklane-host: runs a tick-loop host with a small demo workload.
//!
//! Workload:
//! - a confined heartbeat once per second
//! - a free-threaded job that hands its result back to the tick thread
//! - a `JobFinished` event dispatched from that confined follow-up and
//!   consumed through an async stream

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use ticklane_events::{Event, EventPriority, SubscribeOptions};
use ticklane_host::{load_dotenv, Application, TicklaneConfig};
use ticklane_scheduler::TimeUnit;

// ── CLI ─────────────────────────────────────────────────────────────

/// Tick-loop host with confined and free-threaded schedulers.
#[derive(Parser, Debug)]
#[command(name = "ticklane-host", version, about)]
struct Cli {
    /// Path to ticklane.toml config file.
    #[arg(long, env = "TICKLANE_CONFIG", default_value = "config/ticklane.toml")]
    config: String,

    /// Number of ticks to run before shutting down.
    #[arg(long, env = "TICKLANE_RUN_TICKS", default_value_t = 100)]
    ticks: u64,

    /// Print final host stats as JSON.
    #[arg(long)]
    json: bool,
}

// ── Events ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct JobFinished {
    job: String,
    started_at: u64,
    finished_at: u64,
}

impl Event for JobFinished {}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Fall back to defaults (plus env overrides) if the file is unusable
    let config = match TicklaneConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded ticklane config");
            cfg
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %cli.config,
                "failed to load config, using defaults"
            );
            TicklaneConfig::from_env().context("invalid ticklane environment overrides")?
        }
    };
    config.log_summary();

    let app = Application::start(&config).context("failed to start ticklane host")?;

    app.subscribe(
        SubscribeOptions::new().priority(EventPriority::Monitor),
        |event: &mut JobFinished| debug!(job = %event.job, "monitor saw job completion"),
    );

    let mut finished = app.observe::<JobFinished>(SubscribeOptions::default());
    let listener = tokio::spawn(async move {
        while let Some(event) = finished.next().await {
            info!(
                job = %event.job,
                ticks = event.finished_at.saturating_sub(event.started_at),
                "job finished"
            );
        }
    });

    let confined = Arc::new(app.confined().new_worker());
    let background = Arc::new(app.free_threaded().new_worker());
    app.track(Arc::clone(&confined));
    app.track(Arc::clone(&background));

    // Heartbeat on the tick thread
    let host = Arc::clone(app.host());
    confined.schedule_at_fixed_rate(
        move || info!(tick = host.current_tick(), "heartbeat"),
        0,
        1,
        TimeUnit::Seconds,
    )?;

    // Blocking job off the tick thread, result handed back to it
    let host = Arc::clone(app.host());
    let events = app.events().clone();
    let follow_up = Arc::clone(&confined);
    background.schedule_after(
        move || {
            let started_at = host.current_tick();
            std::thread::sleep(Duration::from_millis(120));
            let scheduled = follow_up.schedule_now(move || {
                let mut event = JobFinished {
                    job: "warmup".into(),
                    started_at,
                    finished_at: host.current_tick(),
                };
                let delivered = events.dispatch(&mut event);
                debug!(delivered, "dispatched JobFinished");
            });
            if let Err(e) = scheduled {
                warn!(error = %e, "could not hand job result back to the tick thread");
            }
        },
        250,
        TimeUnit::Milliseconds,
    )?;

    let run_for = Duration::from_millis(config.host.tick_millis.saturating_mul(cli.ticks));
    tokio::select! {
        _ = tokio::time::sleep(run_for) => info!(ticks = cli.ticks, "run complete"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    app.shutdown();
    if tokio::time::timeout(Duration::from_secs(1), listener).await.is_err() {
        warn!("event listener did not finish after shutdown");
    }

    let stats = app.host().stats();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
    }

    Ok(())
}
