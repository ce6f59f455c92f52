//! Records the engine hands to the host for persistence and inspection.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EventKind, Priority};
use crate::events::{ChoiceEvent, ChoiceOption, EventMeta, NotificationEvent};
use crate::ids::{EventId, OptionId};

/// An entry in the host's history log (and, optionally, its recent list).
///
/// Carries the event's own fields plus resolution state. Unresolved
/// records are written when a choice enters the queue; a second, resolved
/// record follows when the user answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HistoryRecord {
    /// Which variant the record came from.
    pub kind: EventKind,
    /// Event identifier.
    pub id: EventId,
    /// Headline.
    pub title: String,
    /// Optional body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Delivery priority.
    pub priority: Priority,
    /// Event creation time in host milliseconds.
    pub timestamp: u64,
    /// Delivery hints.
    #[serde(default)]
    pub meta: EventMeta,
    /// The options a choice offered; empty for notifications.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    /// Whether the event has been answered (choices) or delivered
    /// (notifications).
    pub is_resolved: bool,
    /// Option the user picked, for resolved choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_option_id: Option<OptionId>,
    /// Host time at which the record was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<u64>,
}

impl HistoryRecord {
    /// Record a choice that has just entered the queue.
    pub fn pending_choice(ev: &ChoiceEvent) -> Self {
        Self {
            kind: EventKind::Choice,
            id: ev.id.clone(),
            title: ev.title.clone(),
            description: ev.description.clone(),
            priority: ev.priority,
            timestamp: ev.timestamp,
            meta: ev.meta.clone(),
            options: ev.options.clone(),
            is_resolved: false,
            chosen_option_id: None,
            resolved_at: None,
        }
    }

    /// Record a choice the user has answered.
    pub fn resolved_choice(ev: &ChoiceEvent, chosen: Option<&OptionId>, now_ms: u64) -> Self {
        Self {
            is_resolved: true,
            chosen_option_id: chosen.cloned(),
            resolved_at: Some(now_ms),
            ..Self::pending_choice(ev)
        }
    }

    /// Record a delivered notification verbatim.
    pub fn notification(ev: &NotificationEvent) -> Self {
        Self {
            kind: EventKind::Notification,
            id: ev.id.clone(),
            title: ev.title.clone(),
            description: ev.description.clone(),
            priority: ev.priority,
            timestamp: ev.timestamp,
            meta: ev.meta.clone(),
            options: Vec::new(),
            is_resolved: true,
            chosen_option_id: None,
            resolved_at: None,
        }
    }
}

/// Seed and every draw taken since the last reseed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RngLog {
    /// Seed the generator was last started from.
    pub seed: u32,
    /// Draws in order, each in `[0, 1)`.
    pub draws: Vec<f64>,
}
