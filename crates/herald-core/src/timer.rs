//! One-shot timers measured in host milliseconds.
//!
//! The engine never sleeps. It schedules deadlines here and whoever drives
//! it (the [`Scheduler`](crate::scheduler::Scheduler) or a test harness)
//! asks for the next deadline and calls
//! [`Engine::run_due_timers`](crate::engine::Engine::run_due_timers) once
//! the host clock has passed it. Virtual time in tests is just an adapter
//! whose `now_ms` the test advances.

use std::collections::BTreeMap;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Drain the notification buffer.
    NotificationFlush,
}

/// Cancellation handle returned by [`TimerQueue::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

/// A pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerEntry {
    deadline_ms: u64,
    kind: TimerKind,
}

/// Ordered set of pending one-shot timers.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    entries: BTreeMap<TimerHandle, TimerEntry>,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer that fires once `now >= deadline_ms`.
    pub fn schedule(&mut self, deadline_ms: u64, kind: TimerKind) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.insert(handle, TimerEntry { deadline_ms, kind });
        handle
    }

    /// Disarm a timer. Returns `false` if it had already fired or been
    /// cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Whether the timer behind `handle` is still pending.
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.values().map(|e| e.deadline_ms).min()
    }

    /// Remove and return every timer due at `now_ms`, earliest first.
    /// Timers with equal deadlines fire in scheduling order.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<(TimerHandle, TimerKind)> {
        let mut due: Vec<(TimerHandle, TimerEntry)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline_ms <= now_ms)
            .map(|(h, e)| (*h, *e))
            .collect();
        due.sort_by_key(|(h, e)| (e.deadline_ms, *h));
        for (handle, _) in &due {
            self.entries.remove(handle);
        }
        due.into_iter().map(|(h, e)| (h, e.kind)).collect()
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
