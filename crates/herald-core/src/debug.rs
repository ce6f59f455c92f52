//! Operator console over a shared engine.
//!
//! Thin async wrappers that take the engine lock for exactly one call.
//! Hosts expose these to developer tooling; the reference binary uses them
//! to auto-answer choices.

use herald_types::{EventId, RngLog, WireEvent};
use serde::Serialize;

use crate::adapter::Adapter;
use crate::engine::{DeliveryState, Resolution};
use crate::scheduler::SharedEngine;

/// Errors from console input.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// The injected text was not JSON.
    #[error("invalid JSON: {source}")]
    Json {
        /// The underlying parse error.
        #[from]
        source: serde_json::Error,
    },
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    /// Delivery state.
    pub state: DeliveryState,
    /// Queued choices, including the one displayed.
    pub queue_len: usize,
    /// Id of the queue head.
    pub head_id: Option<EventId>,
    /// Notifications waiting for a flush.
    pub pending_notifications: usize,
    /// Whether the engine owns the host pause.
    pub paused_by_engine: bool,
    /// Current RNG seed.
    pub seed: u32,
    /// Draws since the seed was set.
    pub draws: usize,
}

/// Debug surface over a [`SharedEngine`].
pub struct DebugConsole<A> {
    engine: SharedEngine<A>,
}

impl<A: Adapter> DebugConsole<A> {
    /// Wrap a shared engine.
    pub const fn new(engine: SharedEngine<A>) -> Self {
        Self { engine }
    }

    /// Resolve the head with `option_id`, falling back to its first option.
    pub async fn choose(&self, option_id: Option<&str>) -> Option<Resolution> {
        self.engine.lock().await.choose(option_id)
    }

    /// Resolve the head with its first option.
    pub async fn dismiss(&self) -> Option<Resolution> {
        self.engine.lock().await.dismiss()
    }

    /// Id of the queue head.
    pub async fn head_id(&self) -> Option<EventId> {
        self.engine.lock().await.head_id().cloned()
    }

    /// Seed and draws since it was set.
    pub async fn rng_log(&self) -> RngLog {
        self.engine.lock().await.rng_log()
    }

    /// Reseed the RNG and clear its log.
    pub async fn set_seed(&self, seed: u32) {
        self.engine.lock().await.set_seed(seed);
    }

    /// Parse `json` as a wire event and inject it.
    ///
    /// Returns whether the engine accepted it. Text that is not JSON at all
    /// is an error; JSON that is not a valid event is simply not accepted.
    pub async fn push_json(&self, json: &str) -> Result<bool, ConsoleError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let Ok(wire) = WireEvent::from_json(&value) else {
            tracing::debug!("Console payload is not shaped like an event");
            return Ok(false);
        };
        Ok(self.engine.lock().await.push(&wire))
    }

    /// Snapshot of the engine's state.
    pub async fn status(&self) -> EngineStatus {
        let engine = self.engine.lock().await;
        let rng = engine.rng_log();
        EngineStatus {
            state: engine.delivery_state(),
            queue_len: engine.queue_len(),
            head_id: engine.head_id().cloned(),
            pending_notifications: engine.pending_notifications(),
            paused_by_engine: engine.paused_by_engine(),
            seed: rng.seed,
            draws: rng.draws.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;
    use crate::adapter::RecordingAdapter;
    use crate::config::EngineConfig;
    use crate::engine::Engine;

    fn console() -> DebugConsole<RecordingAdapter> {
        let config = EngineConfig {
            seed: Some(3),
            ..EngineConfig::default()
        };
        DebugConsole::new(Arc::new(Mutex::new(Engine::new(
            RecordingAdapter::new(0),
            config,
        ))))
    }

    const RAID: &str = r#"{
        "kind": "choice", "id": "raid", "title": "Raiders at the gate",
        "priority": "urgent",
        "options": [{"id": "fight", "text": "Fight"}, {"id": "pay", "text": "Pay tribute"}]
    }"#;

    #[tokio::test]
    async fn push_json_then_choose() {
        let console = console();
        assert!(console.push_json(RAID).await.unwrap());
        assert_eq!(console.head_id().await.unwrap().as_str(), "raid");

        let status = console.status().await;
        assert_eq!(status.state, DeliveryState::Showing);
        assert_eq!(status.queue_len, 1);

        let res = console.choose(Some("pay")).await.unwrap();
        assert_eq!(res.option_id.unwrap().as_str(), "pay");
        assert_eq!(console.status().await.state, DeliveryState::Idle);
    }

    #[tokio::test]
    async fn push_json_reports_bad_input() {
        let console = console();
        assert!(console.push_json("{not json").await.is_err());
        assert!(!console.push_json(r#"{"kind": "choice"}"#).await.unwrap());
        assert!(!console.push_json("[1, 2]").await.unwrap());
        assert!(console.dismiss().await.is_none());
    }

    #[tokio::test]
    async fn reseeding_clears_the_log() {
        let console = console();
        {
            let engine = console.engine.lock().await;
            let _ = engine.random();
            let _ = engine.random();
        }
        assert_eq!(console.status().await.draws, 2);
        console.set_seed(9).await;
        let log = console.rng_log().await;
        assert_eq!(log.seed, 9);
        assert!(log.draws.is_empty());
    }
}
