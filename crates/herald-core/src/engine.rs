//! The delivery engine: one queue of choices, one buffer of notifications.
//!
//! Each tick polls every source, validates and deduplicates what comes
//! back, orders it by priority, and routes it: choices join a FIFO queue of
//! which only the head is ever displayed; notifications accumulate in a
//! buffer that is flushed into history after a short batching window.
//!
//! # Delivery states
//!
//! - **Idle** -- nothing displayed, the engine does not own a pause.
//! - **Showing** -- the engine paused the host and displays the queue head.
//! - **Backpressured** -- choices are queued but the host was paused by
//!   someone else, so nothing is displayed until it resumes.
//!
//! Every mutating operation ends with one synchronous post-condition
//! check ([`Engine::show_head_if_idle`] or its in-place variant) so the
//! displayed modal, the host pause, and the queue never drift apart.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use herald_types::{
    ChoiceEvent, Event, EventId, EventMeta, HistoryRecord, NotificationEvent, OptionId, RngLog,
    WireEvent,
};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::config::EngineConfig;
use crate::rng::RngHandle;
use crate::source::{PollContext, SourceRegistry, poll_all};
use crate::timer::{TimerHandle, TimerKind, TimerQueue};
use crate::validation::validate;

/// Where the engine is in its delivery cycle. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Nothing displayed and no engine-owned pause.
    Idle,
    /// The queue head is displayed under an engine-owned pause.
    Showing,
    /// Choices are waiting on a pause the engine does not own.
    Backpressured,
}

/// Outcome of resolving the queue head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The choice that was resolved.
    pub event_id: EventId,
    /// The option that was applied. `None` only for a choice without
    /// options, which validation never lets through.
    pub option_id: Option<OptionId>,
    /// Whether the option's effects reached the host successfully.
    pub effects_applied: bool,
}

/// Counters for one call to [`Engine::ingest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Raw events handed in.
    pub received: usize,
    /// Events that failed validation.
    pub rejected: usize,
    /// Events dropped as repeats, within the tick or within a dedup window.
    pub duplicates: usize,
    /// Choices appended to the queue.
    pub choices_queued: usize,
    /// Notifications added to the buffer.
    pub notifications_buffered: usize,
}

/// Last id seen on one dedup channel and when.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LedgerEntry {
    id: EventId,
    at_ms: u64,
}

impl LedgerEntry {
    fn suppresses(&self, id: &EventId, now_ms: u64, window_ms: u64) -> bool {
        self.id == *id && now_ms.saturating_sub(self.at_ms) < window_ms
    }
}

/// The event scheduling and delivery engine.
///
/// Owns the choice queue, the notification buffer, both dedup ledgers, the
/// one-shot timers, and the seeded RNG. All host interaction goes through
/// the adapter `A`.
pub struct Engine<A> {
    adapter: A,
    config: EngineConfig,
    queue: VecDeque<ChoiceEvent>,
    notification_buffer: Vec<NotificationEvent>,
    flush_timer: Option<TimerHandle>,
    timers: TimerQueue,
    deadline_armed: Arc<Notify>,
    paused_by_engine: bool,
    last_resolved_choice: Option<LedgerEntry>,
    last_buffered_notification: Option<LedgerEntry>,
    rng: RngHandle,
}

impl<A: Adapter> Engine<A> {
    /// Create an engine driving `adapter`.
    ///
    /// The RNG starts from `config.seed`, or from the host clock when no
    /// seed is configured.
    pub fn new(adapter: A, config: EngineConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| clock_seed(adapter.now_ms()));
        info!(seed, "Engine created");
        Self {
            adapter,
            config,
            queue: VecDeque::new(),
            notification_buffer: Vec::new(),
            flush_timer: None,
            timers: TimerQueue::new(),
            deadline_armed: Arc::new(Notify::new()),
            paused_by_engine: false,
            last_resolved_choice: None,
            last_buffered_notification: None,
            rng: RngHandle::new(seed),
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Poll every registered source, then [`ingest`](Self::ingest) the
    /// merged results.
    pub async fn tick(&mut self, registry: &SourceRegistry) -> TickReport {
        let ctx = self.poll_context();
        let batch = Self::poll_sources(registry, &ctx).await;
        self.ingest(batch)
    }

    /// Poll every source in `registry` concurrently without borrowing an
    /// engine, so callers holding the engine behind a lock can release it
    /// for the duration of the poll.
    pub async fn poll_sources(registry: &SourceRegistry, ctx: &PollContext) -> Vec<WireEvent> {
        poll_all(&registry.snapshot(), ctx).await
    }

    /// Context handed to sources for the next poll.
    pub fn poll_context(&self) -> PollContext {
        PollContext {
            now_ms: self.adapter.now_ms(),
            rng: self.rng.clone(),
        }
    }

    /// Validate, deduplicate, order, and route one tick's worth of events,
    /// then bring the display up to date.
    ///
    /// Invalid events are dropped. Of several events sharing an id, the
    /// first one survives. Survivors are routed highest priority first.
    pub fn ingest(&mut self, batch: Vec<WireEvent>) -> TickReport {
        let now = self.adapter.now_ms();
        let mut report = TickReport {
            received: batch.len(),
            ..TickReport::default()
        };

        let mut seen = BTreeSet::new();
        let mut events = Vec::with_capacity(batch.len());
        for wire in batch {
            match validate(&wire, now) {
                Ok(event) => {
                    if seen.insert(event.id().clone()) {
                        events.push(event);
                    } else {
                        report.duplicates = report.duplicates.saturating_add(1);
                        debug!(event_id = %event.id(), "Dropping repeated id within tick");
                    }
                }
                Err(e) => {
                    report.rejected = report.rejected.saturating_add(1);
                    debug!(
                        event_id = wire.id.as_deref().unwrap_or("<none>"),
                        error = %e,
                        "Dropping invalid event"
                    );
                }
            }
        }

        order_by_priority(&mut events);

        for event in events {
            match event {
                Event::Choice(ev) => {
                    if self.enqueue_choice(ev) {
                        report.choices_queued = report.choices_queued.saturating_add(1);
                    } else {
                        report.duplicates = report.duplicates.saturating_add(1);
                    }
                }
                Event::Notification(ev) => {
                    if self.buffer_notification(ev) {
                        report.notifications_buffered =
                            report.notifications_buffered.saturating_add(1);
                    } else {
                        report.duplicates = report.duplicates.saturating_add(1);
                    }
                }
            }
        }

        self.settle();
        if !self.notification_buffer.is_empty() {
            self.arm_flush(now);
        }

        if report.received > 0 {
            debug!(
                received = report.received,
                rejected = report.rejected,
                duplicates = report.duplicates,
                choices = report.choices_queued,
                notifications = report.notifications_buffered,
                queue_len = self.queue.len(),
                "Tick ingested"
            );
        }
        report
    }

    // -----------------------------------------------------------------------
    // Choices
    // -----------------------------------------------------------------------

    /// Append a choice to the tail of the queue and record it in history as
    /// unresolved.
    ///
    /// Returns `false` without queuing when the id matches the most recently
    /// resolved choice inside the dedup window, or is already queued.
    pub fn enqueue_choice(&mut self, event: ChoiceEvent) -> bool {
        let now = self.adapter.now_ms();
        if self
            .last_resolved_choice
            .as_ref()
            .is_some_and(|l| l.suppresses(&event.id, now, self.config.dedup_window_ms))
        {
            debug!(event_id = %event.id, "Choice resolved moments ago, suppressing");
            return false;
        }
        if self.queue.iter().any(|queued| queued.id == event.id) {
            debug!(event_id = %event.id, "Choice already queued, suppressing");
            return false;
        }

        self.adapter
            .append_history(HistoryRecord::pending_choice(&event));
        debug!(
            event_id = %event.id,
            priority = event.priority.as_str(),
            position = self.queue.len(),
            "Choice queued"
        );
        self.queue.push_back(event);
        true
    }

    /// Display the queue head if nothing else holds the host.
    ///
    /// - Empty queue: release an engine-owned pause (unless the host still
    ///   has a legacy pause queue) and hide any displayed choice.
    /// - Host paused for any reason: do nothing.
    /// - Otherwise: pause the host and display the head.
    pub fn show_head_if_idle(&mut self) {
        if self.queue.is_empty() {
            self.release_pause();
            return;
        }
        if self.adapter.is_paused() {
            return;
        }
        self.paused_by_engine = true;
        self.adapter.pause();
        self.display_head();
    }

    /// Resolve the queue head with `option_id`, or with its first option
    /// when the id is absent or unknown.
    ///
    /// Effects are applied through the adapter; a failure is logged and the
    /// choice is still resolved. Returns `None` when the queue is empty.
    pub fn choose(&mut self, option_id: Option<&str>) -> Option<Resolution> {
        let head = self.queue.pop_front()?;
        let now = self.adapter.now_ms();

        let option = head.option_or_first(option_id);
        if let (Some(requested), Some(picked)) = (option_id, option)
            && picked.id.as_str() != requested
        {
            debug!(
                event_id = %head.id,
                requested,
                fallback = %picked.id,
                "Unknown option, using first"
            );
        }

        let mut effects_applied = false;
        if let Some(picked) = option.filter(|o| !o.effects.is_empty()) {
            match self.adapter.apply_effects(&picked.effects) {
                Ok(()) => effects_applied = true,
                Err(e) => warn!(
                    event_id = %head.id,
                    option_id = %picked.id,
                    error = %e,
                    "Applying effects failed, resolving anyway"
                ),
            }
        }
        let chosen = option.map(|o| o.id.clone());

        self.last_resolved_choice = Some(LedgerEntry {
            id: head.id.clone(),
            at_ms: now,
        });

        let record = HistoryRecord::resolved_choice(&head, chosen.as_ref(), now);
        let recent = head.meta.records_in_latest().then(|| record.clone());
        self.adapter.append_history(record);
        if let Some(record) = recent {
            self.adapter.append_latest(record);
        }

        info!(
            event_id = %head.id,
            option_id = chosen.as_ref().map_or("<none>", OptionId::as_str),
            remaining = self.queue.len(),
            "Choice resolved"
        );

        // The engine's own display moves straight on to the next head.
        if self.paused_by_engine
            && let Some(next) = self.queue.front()
        {
            self.adapter.update_modal(Some(next));
        }
        self.settle();

        Some(Resolution {
            event_id: head.id,
            option_id: chosen,
            effects_applied,
        })
    }

    /// Resolve the queue head with its first option.
    pub fn dismiss(&mut self) -> Option<Resolution> {
        self.choose(None)
    }

    /// Inject one event outside the tick cycle. Routed exactly as a
    /// single-event tick would route it.
    ///
    /// Returns whether the event was accepted.
    pub fn push(&mut self, wire: &WireEvent) -> bool {
        let now = self.adapter.now_ms();
        let accepted = match validate(wire, now) {
            Ok(Event::Choice(ev)) => self.enqueue_choice(ev),
            Ok(Event::Notification(ev)) => self.buffer_notification(ev),
            Err(e) => {
                debug!(
                    event_id = wire.id.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "Rejecting pushed event"
                );
                false
            }
        };
        self.settle();
        accepted
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Add a notification to the buffer and arm the flush timer if it is
    /// not already armed.
    ///
    /// Returns `false` when the id matches the last buffered notification
    /// inside the dedup window.
    pub fn buffer_notification(&mut self, event: NotificationEvent) -> bool {
        let now = self.adapter.now_ms();
        if self
            .last_buffered_notification
            .as_ref()
            .is_some_and(|l| l.suppresses(&event.id, now, self.config.dedup_window_ms))
        {
            debug!(event_id = %event.id, "Notification repeated inside window, suppressing");
            return false;
        }
        self.last_buffered_notification = Some(LedgerEntry {
            id: event.id.clone(),
            at_ms: now,
        });
        self.notification_buffer.push(event);
        self.arm_flush(now);
        true
    }

    /// Drain the buffer into history.
    ///
    /// One notification is recorded as is. Two or more collapse into a
    /// single summary record. Returns the record written, or `None` when
    /// the buffer was empty.
    pub fn flush_notification_buffer(&mut self) -> Option<HistoryRecord> {
        if let Some(handle) = self.flush_timer.take() {
            let _ = self.timers.cancel(handle);
        }
        let batch = std::mem::take(&mut self.notification_buffer);

        let (record, to_latest) = match batch.as_slice() {
            [] => return None,
            [single] => (
                HistoryRecord::notification(single),
                single.meta.records_in_latest(),
            ),
            _ => {
                let summary = summarize(
                    &batch,
                    self.config.summary_title_limit,
                    self.adapter.now_ms(),
                );
                (HistoryRecord::notification(&summary), true)
            }
        };

        info!(
            record_id = %record.id,
            batched = batch.len(),
            "Notifications flushed"
        );
        self.adapter.append_history(record.clone());
        if to_latest {
            self.adapter.append_latest(record.clone());
        }
        Some(record)
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Earliest armed one-shot deadline, in host milliseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Signalled whenever a new one-shot deadline is armed, so a driver
    /// sleeping on [`next_deadline`](Self::next_deadline) can wake and
    /// re-read it.
    pub fn deadline_armed(&self) -> Arc<Notify> {
        Arc::clone(&self.deadline_armed)
    }

    /// Fire every timer whose deadline has passed on the host clock.
    /// Returns how many fired.
    pub fn run_due_timers(&mut self) -> usize {
        let due = self.timers.take_due(self.adapter.now_ms());
        for (handle, kind) in &due {
            match kind {
                TimerKind::NotificationFlush => {
                    if self.flush_timer == Some(*handle) {
                        self.flush_timer = None;
                        let _ = self.flush_notification_buffer();
                    }
                }
            }
        }
        if !due.is_empty() {
            self.settle();
        }
        due.len()
    }

    // -----------------------------------------------------------------------
    // RNG
    // -----------------------------------------------------------------------

    /// Draw the next value in `[0, 1)` and log it.
    pub fn random(&self) -> f64 {
        self.rng.random()
    }

    /// Restart the generator from `seed` and clear the draw log.
    pub fn set_seed(&self, seed: u32) {
        info!(seed, "RNG reseeded");
        self.rng.set_seed(seed);
    }

    /// Seed and every draw since it was set.
    pub fn rng_log(&self) -> RngLog {
        self.rng.log()
    }

    /// Shared handle to the generator, for sources that draw outside a
    /// poll.
    pub fn rng_handle(&self) -> RngHandle {
        self.rng.clone()
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Id of the choice at the head of the queue.
    pub fn head_id(&self) -> Option<&EventId> {
        self.queue.front().map(|ev| &ev.id)
    }

    /// The choice at the head of the queue.
    pub fn head(&self) -> Option<&ChoiceEvent> {
        self.queue.front()
    }

    /// Ids of every queued choice, head first.
    pub fn queued_ids(&self) -> Vec<EventId> {
        self.queue.iter().map(|ev| ev.id.clone()).collect()
    }

    /// Number of queued choices.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of buffered notifications awaiting a flush.
    pub fn pending_notifications(&self) -> usize {
        self.notification_buffer.len()
    }

    /// Whether the current host pause was requested by the engine.
    pub const fn paused_by_engine(&self) -> bool {
        self.paused_by_engine
    }

    /// Current delivery state. An empty queue is always idle, even while a
    /// host with a legacy pause queue keeps the engine's pause alive.
    pub fn delivery_state(&self) -> DeliveryState {
        if self.queue.is_empty() {
            DeliveryState::Idle
        } else if self.paused_by_engine {
            DeliveryState::Showing
        } else if !self.queue.is_empty() && self.adapter.is_paused() {
            DeliveryState::Backpressured
        } else {
            DeliveryState::Idle
        }
    }

    /// The engine's configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The host adapter.
    pub const fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The host adapter, mutably.
    pub const fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Post-condition check run after every mutation.
    ///
    /// Beyond [`show_head_if_idle`](Self::show_head_if_idle), re-displays
    /// the head when the engine still owns the pause but the host dropped
    /// the modal.
    fn settle(&mut self) {
        if self.queue.is_empty() || !self.adapter.is_paused() {
            self.show_head_if_idle();
        } else if self.paused_by_engine && self.adapter.current_modal_id().is_none() {
            self.display_head();
        }
    }

    fn display_head(&mut self) {
        let Some(head) = self.queue.front() else {
            return;
        };
        if self.adapter.current_modal_id().as_ref() == Some(&head.id) {
            return;
        }
        info!(
            event_id = %head.id,
            priority = head.priority.as_str(),
            queued = self.queue.len(),
            "Showing choice"
        );
        self.adapter.show_modal(head);
    }

    fn release_pause(&mut self) {
        if self.adapter.has_legacy_pause_queue() {
            return;
        }
        if self.paused_by_engine {
            info!("Queue drained, releasing pause");
            self.adapter.resume();
        }
        self.paused_by_engine = false;
        if self.adapter.current_modal_id().is_some() {
            self.adapter.hide_modal();
        }
    }

    fn arm_flush(&mut self, now_ms: u64) {
        if self.flush_timer.is_some_and(|h| self.timers.is_armed(h)) {
            return;
        }
        let deadline = now_ms.saturating_add(self.config.notification_batch_ms);
        self.flush_timer = Some(
            self.timers
                .schedule(deadline, TimerKind::NotificationFlush),
        );
        self.deadline_armed.notify_one();
    }
}

/// Stable ascending sort by rank, then reversed: highest priority first,
/// and equal priorities end up in reverse arrival order.
///
/// Existing content depends on this tie order. A plain descending sort
/// would keep arrival order among equals; switching is a behavior change.
fn order_by_priority(events: &mut [Event]) {
    events.sort_by_key(|ev| ev.priority().rank());
    events.reverse();
}

/// A limit of 0 is treated as 1 so the description always names a title.
fn summarize(batch: &[NotificationEvent], title_limit: usize, now_ms: u64) -> NotificationEvent {
    let title_limit = title_limit.max(1);
    let mut description = batch
        .iter()
        .take(title_limit)
        .map(|ev| ev.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if batch.len() > title_limit {
        description.push_str(", and more");
    }
    NotificationEvent {
        id: EventId::batch(),
        title: format!("{} new notifications", batch.len()),
        description: Some(description),
        priority: batch.iter().map(|ev| ev.priority).max().unwrap_or_default(),
        timestamp: now_ms,
        meta: EventMeta::default(),
    }
}

fn clock_seed(now_ms: u64) -> u32 {
    u32::try_from(now_ms & u64::from(u32::MAX)).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use herald_types::{ChoiceOption, Effect, Priority, WireOption};

    use super::*;
    use crate::adapter::RecordingAdapter;

    const START_MS: u64 = 100_000;

    fn engine() -> Engine<RecordingAdapter> {
        let config = EngineConfig {
            seed: Some(7),
            ..EngineConfig::default()
        };
        Engine::new(RecordingAdapter::new(START_MS), config)
    }

    fn wire_choice(id: &str, priority: Priority) -> WireEvent {
        WireEvent::choice(id, id.to_uppercase())
            .with_priority(priority)
            .with_option(
                WireOption::new("accept", "Accept").with_effect(&Effect::SpDelta { amount: 5 }),
            )
            .with_option(WireOption::new("refuse", "Refuse"))
    }

    fn wire_note(id: &str, title: &str, priority: Priority) -> WireEvent {
        WireEvent::notification(id, title).with_priority(priority)
    }

    fn choice(id: &str) -> ChoiceEvent {
        ChoiceEvent {
            id: EventId::new(id),
            title: id.to_owned(),
            description: None,
            priority: Priority::Medium,
            timestamp: START_MS,
            options: vec![ChoiceOption {
                id: OptionId::new("ok"),
                text: String::from("OK"),
                effects: Vec::new(),
            }],
            meta: EventMeta::default(),
        }
    }

    fn resolve_all(engine: &mut Engine<RecordingAdapter>) -> Vec<String> {
        let mut order = Vec::new();
        while let Some(res) = engine.dismiss() {
            order.push(res.event_id.into_inner());
        }
        order
    }

    #[test]
    fn priority_order_is_ascending_sort_reversed() {
        let mut engine = engine();
        let report = engine.ingest(vec![
            wire_choice("A", Priority::Low),
            wire_choice("B", Priority::Urgent),
            wire_choice("C", Priority::Low),
        ]);
        assert_eq!(report.choices_queued, 3);
        assert_eq!(resolve_all(&mut engine), vec!["B", "C", "A"]);
    }

    #[test]
    fn first_occurrence_of_an_id_wins_within_a_tick() {
        let mut engine = engine();
        let report = engine.ingest(vec![
            wire_note("n1", "First", Priority::Low),
            wire_note("n1", "Second", Priority::Urgent),
        ]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(engine.pending_notifications(), 1);

        let record = engine.flush_notification_buffer().unwrap();
        assert_eq!(record.title, "First");
    }

    #[test]
    fn invalid_events_never_reach_history() {
        let mut engine = engine();
        let bad = WireEvent::choice("no-options", "Empty");
        let report = engine.ingest(vec![bad.clone()]);
        assert_eq!(report.rejected, 1);
        assert!(!engine.push(&bad));
        assert!(engine.adapter().history().is_empty());
        assert_eq!(engine.queue_len(), 0);
    }

    #[test]
    fn idle_engine_shows_head_and_pauses() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_choice("raid", Priority::High)]);

        let host = engine.adapter();
        assert!(host.is_paused());
        assert_eq!(host.modal().unwrap().id.as_str(), "raid");
        assert_eq!(host.calls().pause, 1);
        assert!(engine.paused_by_engine());
        assert_eq!(engine.delivery_state(), DeliveryState::Showing);
    }

    #[test]
    fn only_one_choice_is_visible_at_a_time() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_choice("first", Priority::Low)]);
        let _ = engine.ingest(vec![wire_choice("second", Priority::Urgent)]);

        assert_eq!(engine.head_id().unwrap().as_str(), "first");
        assert_eq!(engine.adapter().calls().show_modal, 1);

        let _ = engine.dismiss();
        let host = engine.adapter();
        assert_eq!(host.modal().unwrap().id.as_str(), "second");
        assert!(host.overlapping_shows().is_empty());
        assert_eq!(host.calls().resume, 0);
    }

    #[test]
    fn host_pause_backpressures_the_queue() {
        let mut engine = engine();
        engine.adapter_mut().set_paused(true);
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Urgent)]);

        let calls = engine.adapter().calls();
        assert_eq!(calls.pause, 0);
        assert_eq!(calls.show_modal, 0);
        assert_eq!(engine.queue_len(), 1);
        assert!(!engine.paused_by_engine());
        assert_eq!(engine.delivery_state(), DeliveryState::Backpressured);

        engine.adapter_mut().set_paused(false);
        let _ = engine.ingest(Vec::new());
        assert_eq!(engine.adapter().modal().unwrap().id.as_str(), "raid");
        assert_eq!(engine.delivery_state(), DeliveryState::Showing);
    }

    #[test]
    fn draining_the_queue_resumes_exactly_once() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let _ = engine.choose(Some("accept")).unwrap();

        let host = engine.adapter();
        assert_eq!(host.calls().resume, 1);
        assert!(!host.is_paused());
        assert!(host.modal().is_none());
        assert!(!engine.paused_by_engine());
        assert_eq!(engine.delivery_state(), DeliveryState::Idle);

        let _ = engine.ingest(Vec::new());
        assert_eq!(engine.adapter().calls().resume, 1);
    }

    #[test]
    fn foreign_pause_is_never_released() {
        let mut engine = engine();
        engine.adapter_mut().set_paused(true);
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let _ = engine.dismiss().unwrap();

        assert_eq!(engine.adapter().calls().resume, 0);
        assert!(engine.adapter().is_paused());
    }

    #[test]
    fn legacy_pause_queue_keeps_the_pause() {
        let mut engine = engine();
        engine.adapter_mut().set_legacy_pause_queue(true);
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let _ = engine.dismiss().unwrap();

        assert_eq!(engine.adapter().calls().resume, 0);
        assert!(engine.paused_by_engine());
        assert_eq!(engine.delivery_state(), DeliveryState::Idle);
    }

    #[test]
    fn unknown_option_falls_back_to_first() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let res = engine.choose(Some("surrender")).unwrap();

        assert_eq!(res.option_id.unwrap().as_str(), "accept");
        assert!(res.effects_applied);
        assert_eq!(
            engine.adapter().applied_effects(),
            &[Effect::SpDelta { amount: 5 }]
        );
    }

    #[test]
    fn failed_effects_still_resolve() {
        let mut engine = engine();
        engine.adapter_mut().set_fail_effects(true);
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let res = engine.dismiss().unwrap();

        assert!(!res.effects_applied);
        assert_eq!(engine.queue_len(), 0);
        let record = engine.adapter().history().first().unwrap();
        assert!(record.is_resolved);
        assert_eq!(record.chosen_option_id.as_ref().unwrap().as_str(), "accept");
    }

    #[test]
    fn option_without_effects_skips_the_adapter() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let res = engine.choose(Some("refuse")).unwrap();
        assert!(!res.effects_applied);
        assert_eq!(engine.adapter().calls().apply_effects, 0);
    }

    #[test]
    fn resolved_choice_is_suppressed_inside_window() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let _ = engine.dismiss();

        engine.adapter_mut().advance(999);
        let report = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        assert_eq!(report.choices_queued, 0);
        assert_eq!(engine.queue_len(), 0);

        engine.adapter_mut().advance(1);
        let report = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        assert_eq!(report.choices_queued, 1);
    }

    #[test]
    fn queued_choice_is_not_queued_twice() {
        let mut engine = engine();
        assert!(engine.enqueue_choice(choice("x")));
        assert!(!engine.enqueue_choice(choice("x")));
        assert_eq!(engine.queue_len(), 1);
    }

    #[test]
    fn history_tracks_choice_from_queue_to_resolution() {
        let mut engine = engine();
        engine.adapter_mut().set_paused(true);
        let _ = engine.ingest(vec![wire_choice("raid", Priority::Medium)]);
        let pending = engine.adapter().history().first().unwrap();
        assert!(!pending.is_resolved);

        engine.adapter_mut().advance(250);
        let _ = engine.dismiss();
        let history = engine.adapter().history();
        assert_eq!(history.len(), 1);
        let resolved = history.first().unwrap();
        assert!(resolved.is_resolved);
        assert_eq!(resolved.resolved_at, Some(START_MS + 250));
        assert_eq!(engine.adapter().latest().len(), 1);
    }

    #[test]
    fn opted_out_choice_skips_recent_list() {
        let mut engine = engine();
        let meta = EventMeta {
            do_not_record_in_latest: Some(true),
            ..EventMeta::default()
        };
        let _ = engine.ingest(vec![wire_choice("quiet", Priority::Low).with_meta(meta)]);
        let _ = engine.dismiss();
        assert!(engine.adapter().latest().is_empty());
        assert_eq!(engine.adapter().history().len(), 1);
    }

    #[test]
    fn single_notification_is_recorded_verbatim() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_note("harvest", "Harvest done", Priority::Low)]);
        assert_eq!(engine.next_deadline(), Some(START_MS + 500));

        engine.adapter_mut().advance(499);
        assert_eq!(engine.run_due_timers(), 0);
        engine.adapter_mut().advance(1);
        assert_eq!(engine.run_due_timers(), 1);

        let record = engine.adapter().history().first().unwrap();
        assert_eq!(record.id.as_str(), "harvest");
        assert_eq!(record.title, "Harvest done");
        assert_eq!(engine.pending_notifications(), 0);
    }

    #[test]
    fn single_notification_record_matches_its_input() {
        let wire = WireEvent::notification("well", "A well was dug")
            .with_description("Water for the eastern farms")
            .with_priority(Priority::High)
            .with_timestamp(START_MS - 250)
            .with_meta(EventMeta {
                pauses_game: Some(false),
                ..EventMeta::default()
            });
        let Ok(Event::Notification(input)) = validate(&wire, START_MS) else {
            panic!("expected a notification");
        };

        let mut engine = engine();
        assert!(engine.push(&wire));
        let record = engine.flush_notification_buffer().unwrap();

        let expected = HistoryRecord::notification(&input);
        assert_eq!(record, expected);
        assert_eq!(engine.adapter().history(), &[expected.clone()]);
        assert_eq!(engine.adapter().latest(), vec![&expected]);
    }

    #[test]
    fn single_opted_out_notification_skips_latest() {
        let mut engine = engine();
        let quiet = WireEvent::notification("rain", "It rained").with_meta(EventMeta {
            do_not_record_in_latest: Some(true),
            ..EventMeta::default()
        });
        assert!(engine.push(&quiet));
        let _ = engine.flush_notification_buffer().unwrap();

        assert_eq!(engine.adapter().history().len(), 1);
        assert!(engine.adapter().latest().is_empty());
    }

    #[test]
    fn three_notifications_collapse_into_a_summary() {
        let mut engine = engine();
        let _ = engine.ingest(vec![
            wire_note("a", "Alpha", Priority::Low),
            wire_note("b", "Beta", Priority::High),
            wire_note("c", "Gamma", Priority::Medium),
        ]);
        engine.adapter_mut().advance(500);
        let _ = engine.run_due_timers();

        let history = engine.adapter().history();
        assert_eq!(history.len(), 1);
        let summary = history.first().unwrap();
        assert_eq!(summary.title, "3 new notifications");
        assert!(summary.id.as_str().starts_with("batch-"));
        assert_eq!(summary.priority, Priority::High);
        let description = summary.description.as_deref().unwrap();
        for title in ["Alpha", "Beta", "Gamma"] {
            assert!(description.contains(title));
        }
        assert!(!description.contains("and more"));
        assert_eq!(engine.adapter().latest().len(), 1);
    }

    #[test]
    fn long_summary_lists_five_titles_and_more() {
        let mut engine = engine();
        let batch = (1..=7)
            .map(|n| wire_note(&format!("n{n}"), &format!("T{n}"), Priority::Low))
            .collect();
        let _ = engine.ingest(batch);
        let summary = engine.flush_notification_buffer().unwrap();

        assert_eq!(summary.title, "7 new notifications");
        let description = summary.description.unwrap();
        assert!(description.ends_with(", and more"));
        assert_eq!(description.matches('T').count(), 5);
    }

    #[test]
    fn zero_title_limit_still_names_one_title() {
        let config = EngineConfig {
            seed: Some(7),
            summary_title_limit: 0,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(RecordingAdapter::new(START_MS), config);
        let _ = engine.ingest(vec![
            wire_note("a", "Alpha", Priority::Low),
            wire_note("b", "Beta", Priority::Low),
        ]);
        let summary = engine.flush_notification_buffer().unwrap();

        // Equal priorities route in reverse arrival order.
        assert_eq!(summary.description.as_deref(), Some("Beta, and more"));
    }

    #[test]
    fn arming_a_flush_signals_waiting_drivers() {
        use futures::FutureExt as _;

        let mut engine = engine();
        let armed = engine.deadline_armed();
        assert!(armed.notified().now_or_never().is_none());

        assert!(engine.push(&wire_note("a", "Alpha", Priority::Low)));
        assert!(armed.notified().now_or_never().is_some());

        // Already armed: a second notification does not signal again.
        assert!(engine.push(&wire_note("b", "Beta", Priority::Low)));
        assert!(armed.notified().now_or_never().is_none());
    }

    #[test]
    fn flush_timer_is_armed_once_per_batch() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_note("a", "A", Priority::Low)]);
        engine.adapter_mut().advance(300);
        let _ = engine.ingest(vec![wire_note("b", "B", Priority::Low)]);

        assert_eq!(engine.next_deadline(), Some(START_MS + 500));
        engine.adapter_mut().advance(200);
        assert_eq!(engine.run_due_timers(), 1);
        assert_eq!(engine.pending_notifications(), 0);
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn repeated_notification_is_suppressed_inside_window() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_note("n", "N", Priority::Low)]);
        engine.adapter_mut().advance(600);
        let _ = engine.run_due_timers();

        let report = engine.ingest(vec![wire_note("n", "N", Priority::Low)]);
        assert_eq!(report.notifications_buffered, 0);

        engine.adapter_mut().advance(400);
        let report = engine.ingest(vec![wire_note("n", "N", Priority::Low)]);
        assert_eq!(report.notifications_buffered, 1);
    }

    #[test]
    fn manual_flush_disarms_the_timer() {
        let mut engine = engine();
        let _ = engine.ingest(vec![wire_note("n", "N", Priority::Low)]);
        assert!(engine.flush_notification_buffer().is_some());
        assert_eq!(engine.next_deadline(), None);
        assert!(engine.flush_notification_buffer().is_none());
    }

    #[test]
    fn pushed_choice_is_shown_immediately() {
        let mut engine = engine();
        assert!(engine.push(&wire_choice("dbg", Priority::Low)));
        assert_eq!(engine.adapter().modal().unwrap().id.as_str(), "dbg");
    }

    #[test]
    fn seeded_draws_replay() {
        let engine = engine();
        engine.set_seed(42);
        let draws: Vec<f64> = (0..3).map(|_| engine.random()).collect();
        let log = engine.rng_log();
        assert_eq!(log.seed, 42);
        assert_eq!(log.draws, draws);

        engine.set_seed(42);
        let again: Vec<f64> = (0..3).map(|_| engine.random()).collect();
        assert_eq!(again, draws);
        assert_eq!(engine.rng_log().draws.len(), 3);
    }

    #[test]
    fn unseeded_engine_seeds_from_clock() {
        let engine = Engine::new(RecordingAdapter::new(12_345), EngineConfig::default());
        assert_eq!(engine.rng_log().seed, 12_345);
    }

    #[test]
    fn order_by_priority_keeps_the_reversal() {
        let make = |id: &str, priority: Priority| Event::Choice(ChoiceEvent {
            priority,
            ..choice(id)
        });
        let mut events = vec![
            make("a", Priority::Medium),
            make("b", Priority::Medium),
            make("c", Priority::Urgent),
        ];
        order_by_priority(&mut events);
        let ids: Vec<&str> = events.iter().map(|e| e.id().as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }
}
