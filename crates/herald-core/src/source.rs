//! Event source contract, registry, and the concurrent poll.
//!
//! A source is anything that can be asked "anything new?" once per tick.
//! The engine polls every registered source concurrently and merges the
//! answers; a source that fails is logged and treated as having produced
//! nothing, so one broken producer never stalls the others.
//!
//! [`ScriptedSource`] replays pre-loaded batches and exists for tests and
//! demos, the same way a stub stands in for a real backend.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::FutureExt as _;
use futures::future::join_all;
use herald_types::{SourceId, WireEvent};
use tracing::{debug, warn};

use crate::rng::RngHandle;

/// Errors a source may report from [`EventSource::poll`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not produce events this tick.
    #[error("source failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },

    /// The source's raw output could not be decoded.
    #[error("source output was not valid JSON: {source}")]
    Json {
        /// The underlying decode error.
        #[from]
        source: serde_json::Error,
    },

    /// The source panicked while polling.
    #[error("source panicked: {message}")]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },
}

/// What a source can see while it is being polled.
#[derive(Debug, Clone)]
pub struct PollContext {
    /// Host time at the start of the tick, in milliseconds.
    pub now_ms: u64,
    /// The engine's seeded generator. Draws taken here land in the engine's
    /// replay log.
    pub rng: RngHandle,
}

/// A pollable producer of events.
///
/// `poll` is called once per tick. It may read or write host state through
/// its own handles but must not touch the engine, and it must not block
/// indefinitely: the engine applies no timeout of its own.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Stable identifier used for idempotent registration.
    fn id(&self) -> &str;

    /// Produce zero or more candidate events.
    async fn poll(&self, ctx: &PollContext) -> Result<Vec<WireEvent>, SourceError>;
}

/// Registered sources in registration order, keyed by id.
#[derive(Default)]
pub struct SourceRegistry {
    entries: Vec<(SourceId, Arc<dyn EventSource>)>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Returns `false` (and keeps the existing entry)
    /// when a source with the same id is already registered.
    pub fn register(&mut self, source: Arc<dyn EventSource>) -> bool {
        let id = SourceId::new(source.id());
        if self.contains(id.as_str()) {
            debug!(source_id = %id, "Source already registered, ignoring");
            return false;
        }
        debug!(source_id = %id, "Source registered");
        self.entries.push((id, source));
        true
    }

    /// Remove a source by id. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _)| sid.as_str() != id);
        let removed = self.entries.len() != before;
        if removed {
            debug!(source_id = id, "Source unregistered");
        }
        removed
    }

    /// Whether a source with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(sid, _)| sid.as_str() == id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<SourceId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Cheap clones of every registered source, in registration order.
    ///
    /// Used to poll without holding the registry lock across an await.
    pub fn snapshot(&self) -> Vec<Arc<dyn EventSource>> {
        self.entries.iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl core::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Poll every source concurrently and flatten the results in registration
/// order. Failing or panicking sources contribute nothing.
pub async fn poll_all(sources: &[Arc<dyn EventSource>], ctx: &PollContext) -> Vec<WireEvent> {
    let results = join_all(sources.iter().map(|s| guarded_poll(s.as_ref(), ctx))).await;

    let mut merged = Vec::new();
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(events) => {
                if !events.is_empty() {
                    debug!(source_id = source.id(), count = events.len(), "Source produced events");
                }
                merged.extend(events);
            }
            Err(e) => {
                warn!(source_id = source.id(), error = %e, "Source poll failed, treating as empty");
            }
        }
    }
    merged
}

async fn guarded_poll(
    source: &dyn EventSource,
    ctx: &PollContext,
) -> Result<Vec<WireEvent>, SourceError> {
    AssertUnwindSafe(source.poll(ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(SourceError::Panicked {
                message: panic_message(payload.as_ref()),
            })
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("<non-string payload>"))
}

/// A source that hands out one pre-loaded batch per poll, then nothing.
pub struct ScriptedSource {
    id: String,
    batches: Mutex<VecDeque<Result<Vec<WireEvent>, String>>>,
}

impl ScriptedSource {
    /// Create a source with no batches loaded.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            batches: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a batch to be returned by a future poll.
    pub fn push_batch(&self, batch: Vec<WireEvent>) {
        self.lock().push_back(Ok(batch));
    }

    /// Queue a failure to be returned by a future poll.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().push_back(Err(message.into()));
    }

    /// Number of batches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<WireEvent>, String>>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn poll(&self, _ctx: &PollContext) -> Result<Vec<WireEvent>, SourceError> {
        match self.lock().pop_front() {
            None => Ok(Vec::new()),
            Some(Ok(batch)) => Ok(batch),
            Some(Err(message)) => Err(SourceError::Failed { message }),
        }
    }
}
