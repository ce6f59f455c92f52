//! Reference host for the Herald event delivery engine.
//!
//! Wires the engine to a narrating in-memory host, registers two demo
//! sources, and lets the scheduler run for a bounded time while an
//! auto-resolver answers each choice the way a player would.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `herald-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the engine around a [`RealmHost`]
//! 4. Register demo sources and start the scheduler
//! 5. Spawn the auto-resolver
//! 6. Run until `demo.run_seconds` elapse or Ctrl-C
//! 7. Stop, flush, and log the chronicle

mod error;
mod host;
mod sources;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use herald_core::config::{HeraldConfig, LoggingConfig};
use herald_core::debug::DebugConsole;
use herald_core::engine::{DeliveryState, Engine};
use herald_core::scheduler::{Scheduler, SharedEngine};
use herald_types::OptionId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::HostError;
use crate::host::RealmHost;
use crate::sources::{BorderSource, HarvestSource};

/// Config file looked up relative to the working directory.
const CONFIG_FILE: &str = "herald-config.yaml";

/// Application entry point for the reference host.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the scheduler
/// cannot start.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let (config, from_file) = load_config().context("loading configuration")?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("herald-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        poll_interval_ms = config.scheduler.clamped_interval_ms(),
        dedup_window_ms = config.engine.dedup_window_ms,
        notification_batch_ms = config.engine.notification_batch_ms,
        seed = ?config.engine.seed,
        "Configuration loaded"
    );

    // 3. Build the engine.
    let engine: SharedEngine<RealmHost> = Arc::new(Mutex::new(Engine::new(
        RealmHost::new(),
        config.engine.clone(),
    )));

    // 4. Register sources and start the scheduler.
    let mut scheduler = Scheduler::from_config(Arc::clone(&engine), &config.scheduler);
    let _ = scheduler.register_source(Arc::new(BorderSource)).await;
    let _ = scheduler.register_source(Arc::new(HarvestSource)).await;
    info!(sources = ?scheduler.source_ids().await, "Sources registered");

    if config.scheduler.autostart {
        let _ = scheduler.start().map_err(HostError::from)?;
    } else {
        info!("Scheduler autostart disabled, ticking once");
        let report = scheduler.tick_once().await;
        info!(received = report.received, "Inline tick complete");
    }

    // 5. Spawn the auto-resolver.
    let resolver = spawn_resolver(Arc::clone(&engine), config.demo.auto_resolve_ms);

    // 6. Run.
    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(config.demo.run_seconds)) => {
            info!(run_seconds = config.demo.run_seconds, "Demo time elapsed");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Interrupted");
        }
    }

    // 7. Stop and report.
    resolver.abort();
    let _ = scheduler.stop();

    let status = DebugConsole::new(Arc::clone(&engine)).status().await;
    let mut engine = engine.lock().await;
    let _ = engine.flush_notification_buffer();
    info!(
        status = %serde_json::to_string(&status).context("encoding status")?,
        ticks = scheduler.tick_count(),
        "Final engine status"
    );

    let host = engine.adapter();
    for record in host.latest() {
        info!(id = %record.id, title = record.title, "Recent");
    }
    info!(
        realm = %serde_json::to_string(host.realm()).context("encoding realm")?,
        chronicle_entries = host.history().len(),
        "herald-engine shutdown complete"
    );

    Ok(())
}

/// Read `herald-config.yaml` if present, otherwise defaults with
/// environment overrides. The flag reports whether the file was found.
fn load_config() -> Result<(HeraldConfig, bool), HostError> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Ok((HeraldConfig::from_file(path)?, true))
    } else {
        let mut config = HeraldConfig::default();
        config.apply_env_overrides();
        Ok((config, false))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Answer the displayed choice every `delay_ms`, picking an option with
/// the engine's RNG so seeded runs replay.
fn spawn_resolver(engine: SharedEngine<RealmHost>, delay_ms: u64) -> JoinHandle<()> {
    let console = DebugConsole::new(Arc::clone(&engine));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(delay_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let _ = interval.tick().await;
            if console.status().await.state != DeliveryState::Showing {
                continue;
            }
            let pick = {
                let engine = engine.lock().await;
                engine.head().and_then(|head| {
                    engine
                        .rng_handle()
                        .pick_index(head.options.len())
                        .and_then(|i| head.options.get(i))
                        .map(|option| option.id.clone())
                })
            };
            if let Some(res) = console.choose(pick.as_ref().map(OptionId::as_str)).await {
                info!(
                    event_id = %res.event_id,
                    option_id = res.option_id.as_ref().map_or("<none>", OptionId::as_str),
                    "Auto-resolved"
                );
            }
        }
    })
}
