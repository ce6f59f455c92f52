//! Host adapter contract and an in-memory recording implementation.
//!
//! The engine never inspects host state directly. Every read (is the game
//! paused? what time is it? which modal is up?) and every side effect
//! (pause, show a modal, append to history, apply effects) crosses the
//! [`Adapter`] trait. That keeps the engine host-agnostic and lets tests
//! drive it with [`RecordingAdapter`], whose clock they control.

use std::collections::VecDeque;

use herald_types::{ChoiceEvent, Effect, EventId, HistoryRecord};
use tokio::time::Instant;

/// Capacity of the recent list kept by [`RecordingAdapter`].
pub const DEFAULT_LATEST_CAPACITY: usize = 3;

/// Errors a host may report while applying effects.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// The host does not know how to apply this effect.
    #[error("unsupported effect `{effect_type}`")]
    Unsupported {
        /// Wire tag of the effect.
        effect_type: String,
    },

    /// The host tried and failed.
    #[error("effect application failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

/// The engine's only window into the host.
///
/// All methods are invoked synchronously from inside engine operations.
pub trait Adapter: Send {
    /// Whether the host is paused for any reason.
    fn is_paused(&self) -> bool;

    /// Current host wall-clock time in milliseconds.
    fn now_ms(&self) -> u64;

    /// Whether another subsystem still owns a pause queue of its own. While
    /// it does, the engine leaves the pause state alone when its queue
    /// drains.
    fn has_legacy_pause_queue(&self) -> bool {
        false
    }

    /// Id of the choice currently displayed, if any.
    fn current_modal_id(&self) -> Option<EventId>;

    /// Pause the host.
    fn pause(&mut self);

    /// Resume the host.
    fn resume(&mut self);

    /// Display a choice.
    fn show_modal(&mut self, event: &ChoiceEvent);

    /// Refresh the displayed choice in place, or clear it with `None`.
    fn update_modal(&mut self, event: Option<&ChoiceEvent>);

    /// Remove whatever choice is displayed.
    fn hide_modal(&mut self);

    /// Append a record to the host's history log.
    ///
    /// A resolved record arrives for a choice whose unresolved record was
    /// appended when it was queued; hosts should let the newer one supersede
    /// the older.
    fn append_history(&mut self, record: HistoryRecord);

    /// Append a record to the host's bounded recent list.
    fn append_latest(&mut self, record: HistoryRecord);

    /// Apply the effects of a chosen option.
    fn apply_effects(&mut self, effects: &[Effect]) -> Result<(), EffectError>;
}

/// Where a [`RecordingAdapter`] reads time from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClock {
    /// A value the caller sets and advances by hand.
    Manual(u64),
    /// `base_ms` plus time elapsed on the tokio clock since `origin`.
    ///
    /// Follows virtual time when the tokio clock is paused in tests.
    Monotonic {
        /// Tokio instant the clock was started at.
        origin: Instant,
        /// Host milliseconds at `origin`.
        base_ms: u64,
    },
}

impl HostClock {
    /// A monotonic clock anchored at the current Unix time.
    pub fn monotonic() -> Self {
        let base_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        Self::monotonic_from(base_ms)
    }

    /// A monotonic clock anchored at `base_ms`.
    pub fn monotonic_from(base_ms: u64) -> Self {
        Self::Monotonic {
            origin: Instant::now(),
            base_ms,
        }
    }

    /// Current time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        match *self {
            Self::Manual(ms) => ms,
            Self::Monotonic { origin, base_ms } => {
                let elapsed = u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX);
                base_ms.saturating_add(elapsed)
            }
        }
    }
}

/// How many times each write operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterCalls {
    /// `pause` calls.
    pub pause: u32,
    /// `resume` calls.
    pub resume: u32,
    /// `show_modal` calls.
    pub show_modal: u32,
    /// `update_modal` calls.
    pub update_modal: u32,
    /// `hide_modal` calls.
    pub hide_modal: u32,
    /// `apply_effects` calls.
    pub apply_effects: u32,
}

/// An in-memory host that records everything the engine asks of it.
///
/// Also tracks "second modal" violations: a `show_modal` for one id while a
/// different id is still displayed.
#[derive(Debug)]
pub struct RecordingAdapter {
    clock: HostClock,
    paused: bool,
    legacy_pause_queue: bool,
    modal: Option<ChoiceEvent>,
    history: Vec<HistoryRecord>,
    latest: VecDeque<HistoryRecord>,
    latest_capacity: usize,
    applied_effects: Vec<Effect>,
    fail_effects: bool,
    shown: Vec<EventId>,
    overlapping_shows: Vec<(EventId, EventId)>,
    calls: AdapterCalls,
}

impl RecordingAdapter {
    /// A running, unpaused host with a manual clock at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self::with_clock(HostClock::Manual(now_ms))
    }

    /// A running, unpaused host reading time from `clock`.
    pub const fn with_clock(clock: HostClock) -> Self {
        Self {
            clock,
            paused: false,
            legacy_pause_queue: false,
            modal: None,
            history: Vec::new(),
            latest: VecDeque::new(),
            latest_capacity: DEFAULT_LATEST_CAPACITY,
            applied_effects: Vec::new(),
            fail_effects: false,
            shown: Vec::new(),
            overlapping_shows: Vec::new(),
            calls: AdapterCalls {
                pause: 0,
                resume: 0,
                show_modal: 0,
                update_modal: 0,
                hide_modal: 0,
                apply_effects: 0,
            },
        }
    }

    /// Move a manual clock forward. No effect on a monotonic clock.
    pub const fn advance(&mut self, ms: u64) {
        if let HostClock::Manual(now) = &mut self.clock {
            *now = now.saturating_add(ms);
        }
    }

    /// Pause or unpause the host from outside the engine (e.g. the user
    /// pressed the pause key). Not counted as an engine call.
    pub const fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Pretend another subsystem owns a pause queue.
    pub const fn set_legacy_pause_queue(&mut self, present: bool) {
        self.legacy_pause_queue = present;
    }

    /// Make every subsequent `apply_effects` call fail.
    pub const fn set_fail_effects(&mut self, fail: bool) {
        self.fail_effects = fail;
    }

    /// History records in append order.
    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    /// Recent records, oldest first, at most three.
    pub fn latest(&self) -> Vec<&HistoryRecord> {
        self.latest.iter().collect()
    }

    /// Every effect applied so far.
    pub fn applied_effects(&self) -> &[Effect] {
        &self.applied_effects
    }

    /// The choice currently displayed.
    pub const fn modal(&self) -> Option<&ChoiceEvent> {
        self.modal.as_ref()
    }

    /// Ids passed to `show_modal`, in order.
    pub fn shown(&self) -> &[EventId] {
        &self.shown
    }

    /// `(displayed, requested)` pairs where a second choice was shown over
    /// a different one.
    pub fn overlapping_shows(&self) -> &[(EventId, EventId)] {
        &self.overlapping_shows
    }

    /// Call counters.
    pub const fn calls(&self) -> AdapterCalls {
        self.calls
    }
}

impl Adapter for RecordingAdapter {
    fn is_paused(&self) -> bool {
        self.paused
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn has_legacy_pause_queue(&self) -> bool {
        self.legacy_pause_queue
    }

    fn current_modal_id(&self) -> Option<EventId> {
        self.modal.as_ref().map(|ev| ev.id.clone())
    }

    fn pause(&mut self) {
        self.calls.pause = self.calls.pause.saturating_add(1);
        self.paused = true;
    }

    fn resume(&mut self) {
        self.calls.resume = self.calls.resume.saturating_add(1);
        self.paused = false;
    }

    fn show_modal(&mut self, event: &ChoiceEvent) {
        self.calls.show_modal = self.calls.show_modal.saturating_add(1);
        if let Some(current) = &self.modal
            && current.id != event.id
        {
            self.overlapping_shows
                .push((current.id.clone(), event.id.clone()));
        }
        self.shown.push(event.id.clone());
        self.modal = Some(event.clone());
    }

    fn update_modal(&mut self, event: Option<&ChoiceEvent>) {
        self.calls.update_modal = self.calls.update_modal.saturating_add(1);
        self.modal = event.cloned();
    }

    fn hide_modal(&mut self) {
        self.calls.hide_modal = self.calls.hide_modal.saturating_add(1);
        self.modal = None;
    }

    fn append_history(&mut self, record: HistoryRecord) {
        let pending = self
            .history
            .iter_mut()
            .rev()
            .find(|r| r.id == record.id && r.kind == record.kind && !r.is_resolved);
        match pending {
            Some(slot) => *slot = record,
            None => self.history.push(record),
        }
    }

    fn append_latest(&mut self, record: HistoryRecord) {
        self.latest.push_back(record);
        while self.latest.len() > self.latest_capacity {
            let _ = self.latest.pop_front();
        }
    }

    fn apply_effects(&mut self, effects: &[Effect]) -> Result<(), EffectError> {
        self.calls.apply_effects = self.calls.apply_effects.saturating_add(1);
        if self.fail_effects {
            return Err(EffectError::Failed {
                message: String::from("effect application disabled"),
            });
        }
        self.applied_effects.extend_from_slice(effects);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use herald_types::{EventKind, EventMeta, Priority};

    use super::*;

    fn record(id: &str) -> HistoryRecord {
        HistoryRecord {
            kind: EventKind::Notification,
            id: EventId::new(id),
            title: id.to_owned(),
            description: None,
            priority: Priority::Low,
            timestamp: 0,
            meta: EventMeta::default(),
            options: Vec::new(),
            is_resolved: true,
            chosen_option_id: None,
            resolved_at: None,
        }
    }

    #[test]
    fn latest_keeps_three_newest() {
        let mut host = RecordingAdapter::new(0);
        for id in ["a", "b", "c", "d"] {
            host.append_latest(record(id));
        }
        let ids: Vec<&str> = host.latest().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn resolved_record_supersedes_pending_one() {
        let mut host = RecordingAdapter::new(0);
        let mut pending = record("c1");
        pending.kind = EventKind::Choice;
        pending.is_resolved = false;
        host.append_history(pending.clone());
        host.append_history(record("n1"));

        let mut resolved = pending;
        resolved.is_resolved = true;
        resolved.resolved_at = Some(10);
        host.append_history(resolved);

        assert_eq!(host.history().len(), 2);
        let first = host.history().first().unwrap();
        assert_eq!(first.id.as_str(), "c1");
        assert!(first.is_resolved);
    }

    #[test]
    fn manual_clock_advances() {
        let mut host = RecordingAdapter::new(100);
        host.advance(250);
        assert_eq!(host.now_ms(), 350);
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_tokio_time() {
        let clock = HostClock::monotonic_from(1_000);
        tokio::time::advance(std::time::Duration::from_millis(400)).await;
        assert_eq!(clock.now_ms(), 1_400);
    }

    #[test]
    fn failing_effects_report_an_error() {
        let mut host = RecordingAdapter::new(0);
        host.set_fail_effects(true);
        assert!(host.apply_effects(&[Effect::SpDelta { amount: 1 }]).is_err());
        assert!(host.applied_effects().is_empty());
        assert_eq!(host.calls().apply_effects, 1);
    }
}
