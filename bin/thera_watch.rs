//! # Thera Watch Service
//!
//! Polls the Thera wormhole feed and posts route alerts to Discord.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin thera_watch -- run
//! cargo run --bin thera_watch -- --config prod.toml check
//! cargo run --bin thera_watch -- list
//! ```
//!
//! `run` stops gracefully on Ctrl+C. On unix, `kill -USR1 <pid>` requests an
//! immediate check.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use thera_route_watch::{
    orchestrator::{trigger_channel, CycleOutcome, Orchestrator, TriggerHandle},
    settings::{LogFormat, Settings},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "thera_watch", version, about = "Thera wormhole route watcher")]
struct Cli {
    /// Configuration file (defaults to Config.toml in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Poll continuously and post alerts (default)
    Run,
    /// Run a single cycle and print what it found
    Check,
    /// Print the current k-space connections of the anchor system
    List,
    /// Print the watch configuration
    Status,
}

fn init_logging(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},reqwest=warn,hyper=warn", settings.log.level)));

    let log_file = match &settings.log.file {
        Some(path) => Some(Arc::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?,
        )),
        None => None,
    };

    let (stdout_layer, file_layer) = match settings.log.format {
        LogFormat::Json => (
            fmt::layer().json().boxed(),
            log_file.map(|file| fmt::layer().json().with_writer(file).boxed()),
        ),
        LogFormat::Pretty => (
            fmt::layer().boxed(),
            log_file.map(|file| fmt::layer().with_ansi(false).with_writer(file).boxed()),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(())
}

#[cfg(feature = "observability")]
fn init_metrics(settings: &Settings) -> Result<()> {
    if settings.metrics.enabled {
        thera_route_watch::metrics::install_exporter(settings.metrics.port)?;
        info!("📈 Prometheus exporter listening on :{}", settings.metrics.port);
    }
    Ok(())
}

#[cfg(not(feature = "observability"))]
fn init_metrics(settings: &Settings) -> Result<()> {
    if settings.metrics.enabled {
        warn!("metrics.enabled is set but the binary was built without the `observability` feature");
    }
    Ok(())
}

#[cfg(unix)]
fn spawn_manual_trigger(trigger: TriggerHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            if !trigger.trigger() {
                info!("Manual check already pending");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_manual_trigger(_trigger: TriggerHandle) -> Result<()> {
    Ok(())
}

async fn run(orchestrator: Arc<Orchestrator>) -> Result<()> {
    let (trigger, triggers) = trigger_channel();
    spawn_manual_trigger(trigger)?;

    info!("🚀 Starting Thera route watcher");
    orchestrator
        .run(triggers, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    info!("👋 Thera route watcher stopped");
    Ok(())
}

async fn check(orchestrator: &Orchestrator) {
    match orchestrator.run_cycle().await {
        CycleOutcome::Completed(report) => {
            println!("Raw connections:      {}", report.raw_connections);
            println!("Routable connections: {}", report.routable_connections);
            println!("Route candidates:     {}", report.candidates);
            println!("Notified:             {}", report.notified);
            println!("Suppressed:           {}", report.suppressed);
            println!("Delivery failures:    {}", report.delivery_failures);
        }
        CycleOutcome::Skipped => println!("A cycle was already running"),
    }
}

async fn list(orchestrator: &Orchestrator) {
    let connections = orchestrator.list_connections().await;
    if connections.is_empty() {
        println!("No k-space connections found");
        return;
    }
    for conn in connections {
        println!(
            "{:>10}  {} {:<18} {:<20} {:<8} {} {:<7} {}",
            conn.id,
            conn.security_class.marker(),
            conn.exit_system_name,
            conn.exit_region,
            conn.wh_type,
            conn.max_ship_size.marker(),
            conn.max_ship_size,
            conn.lifetime_status()
        );
    }
}

fn status(orchestrator: &Orchestrator) {
    let status = orchestrator.status();
    println!("Poll interval: {:?}", status.poll_interval);
    println!("Cooldown:      {:?}", status.cooldown);
    println!("Origins:");
    for origin in &status.origins {
        println!("  {} ({})", origin.name, origin.system_id);
    }
    println!("Destinations:");
    for dest in &status.destinations {
        match dest.min_ship_size {
            Some(size) => println!(
                "  {} ({}) within {} jumps, {}+ hulls",
                dest.name, dest.system_id, dest.max_jumps, size
            ),
            None => println!("  {} ({}) within {} jumps", dest.name, dest.system_id, dest.max_jumps),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_path(path),
        None => Settings::new(),
    }
    .context("loading configuration")?;

    init_logging(&settings)?;
    init_metrics(&settings)?;

    if settings.discord.dry_run {
        info!("Dry-run mode: alerts are logged, not posted");
    }

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings)?);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(orchestrator).await?,
        Command::Check => check(&orchestrator).await,
        Command::List => list(&orchestrator).await,
        Command::Status => status(&orchestrator),
    }
    Ok(())
}
