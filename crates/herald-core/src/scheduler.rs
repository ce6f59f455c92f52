//! Periodic driver for the engine.
//!
//! A [`Scheduler`] owns the source registry and a background tokio task that
//! ticks the shared engine every `interval_ms`. Between ticks the task
//! sleeps until the engine's next one-shot deadline, so a notification
//! flush fires on time even when the poll interval is long. Arming a new
//! deadline outside a tick (`push`, the debug console) wakes the task so it
//! re-reads the deadline.
//!
//! The engine lock is never held across a source poll: the task snapshots
//! the registry, takes a [`PollContext`](crate::source::PollContext) under
//! the lock, releases it, polls, then re-acquires it to ingest.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use herald_types::SourceId;

use crate::adapter::Adapter;
use crate::config::SchedulerConfig;
use crate::engine::{Engine, TickReport};
use crate::source::{EventSource, SourceRegistry, poll_all};

/// Shortest accepted poll interval, in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 200;

/// Longest accepted poll interval, in milliseconds.
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// An engine shared between the scheduler task and the host.
pub type SharedEngine<A> = Arc<Mutex<Engine<A>>>;

/// Errors from starting the scheduler task.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `start` was called outside a tokio runtime.
    #[error("no tokio runtime available: {source}")]
    NoRuntime {
        /// The underlying runtime lookup error.
        #[from]
        source: tokio::runtime::TryCurrentError,
    },
}

/// Clamp a requested interval into the accepted range.
pub fn clamp_interval(ms: u64) -> u64 {
    ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
}

/// Drives an engine on a fixed interval.
pub struct Scheduler<A> {
    engine: SharedEngine<A>,
    registry: Arc<RwLock<SourceRegistry>>,
    interval_ms: u64,
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl<A: Adapter + 'static> Scheduler<A> {
    /// Create a stopped scheduler. `interval_ms` is clamped to
    /// `[200, 10000]`.
    pub fn new(engine: SharedEngine<A>, interval_ms: u64) -> Self {
        Self {
            engine,
            registry: Arc::new(RwLock::new(SourceRegistry::new())),
            interval_ms: clamp_interval(interval_ms),
            task: None,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a stopped scheduler from configuration.
    pub fn from_config(engine: SharedEngine<A>, config: &SchedulerConfig) -> Self {
        Self::new(engine, config.poll_interval_ms)
    }

    /// Spawn the timer task. Returns `Ok(false)` if it is already running.
    pub fn start(&mut self) -> Result<bool, SchedulerError> {
        if self.is_running() {
            return Ok(false);
        }
        let runtime = tokio::runtime::Handle::try_current()?;
        let task = runtime.spawn(run_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.registry),
            self.interval_ms,
            Arc::clone(&self.ticks),
        ));
        self.task = Some(task);
        info!(interval_ms = self.interval_ms, "Scheduler started");
        Ok(true)
    }

    /// Abort the timer task. Engine state and registered sources are left
    /// as they are. Returns `false` if it was not running.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                info!("Scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Whether the timer task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Change the poll interval, restarting the task if it is running.
    /// Returns the interval actually applied after clamping.
    pub fn set_interval_ms(&mut self, ms: u64) -> Result<u64, SchedulerError> {
        let clamped = clamp_interval(ms);
        if clamped == self.interval_ms {
            return Ok(clamped);
        }
        self.interval_ms = clamped;
        info!(interval_ms = clamped, "Poll interval changed");
        if self.stop() {
            let _ = self.start()?;
        }
        Ok(clamped)
    }

    /// Current poll interval in milliseconds.
    pub const fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Register a source. Returns `false` if one with the same id exists.
    pub async fn register_source(&self, source: Arc<dyn EventSource>) -> bool {
        self.registry.write().await.register(source)
    }

    /// Remove a source by id. Returns `false` if it was not registered.
    pub async fn unregister_source(&self, id: &str) -> bool {
        self.registry.write().await.unregister(id)
    }

    /// Registered source ids in registration order.
    pub async fn source_ids(&self) -> Vec<SourceId> {
        self.registry.read().await.ids()
    }

    /// The shared engine.
    pub fn engine(&self) -> SharedEngine<A> {
        Arc::clone(&self.engine)
    }

    /// Ticks completed since the scheduler was created.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run one tick inline, independent of the timer task.
    pub async fn tick_once(&self) -> TickReport {
        let report = tick(&self.engine, &self.registry).await;
        let _ = self.ticks.fetch_add(1, Ordering::Relaxed);
        report
    }
}

impl<A> Drop for Scheduler<A> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn tick<A: Adapter>(
    engine: &Mutex<Engine<A>>,
    registry: &RwLock<SourceRegistry>,
) -> TickReport {
    let sources = registry.read().await.snapshot();
    let ctx = engine.lock().await.poll_context();
    let batch = poll_all(&sources, &ctx).await;
    engine.lock().await.ingest(batch)
}

async fn run_loop<A: Adapter + 'static>(
    engine: SharedEngine<A>,
    registry: Arc<RwLock<SourceRegistry>>,
    interval_ms: u64,
    ticks: Arc<AtomicU64>,
) {
    let period = Duration::from_millis(interval_ms);
    let first = Instant::now()
        .checked_add(period)
        .unwrap_or_else(Instant::now);
    let mut interval = tokio::time::interval_at(first, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline_armed = engine.lock().await.deadline_armed();

    loop {
        let until_deadline = {
            let engine = engine.lock().await;
            engine
                .next_deadline()
                .map(|deadline| deadline.saturating_sub(engine.adapter().now_ms()))
        };

        tokio::select! {
            _ = interval.tick() => {
                let report = tick(&engine, &registry).await;
                let n = ticks.fetch_add(1, Ordering::Relaxed).saturating_add(1);
                debug!(tick = n, received = report.received, "Scheduler tick");
            }
            () = sleep_for(until_deadline) => {
                let fired = engine.lock().await.run_due_timers();
                debug!(fired, "One-shot timers fired");
            }
            () = deadline_armed.notified() => {}
        }
    }
}

async fn sleep_for(delay_ms: Option<u64>) {
    match delay_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => std::future::pending::<()>().await,
    }
}
