//! Validated event types consumed by the engine.
//!
//! Everything in this module has already passed schema validation: ids and
//! titles are non-blank, priorities are known, and every [`ChoiceEvent`]
//! carries at least one option. Producers never build these directly; they
//! emit [`WireEvent`](crate::wire::WireEvent)s which the engine validates.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::effects::Effect;
use crate::enums::{EventKind, Priority};
use crate::ids::{EventId, OptionId};

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

/// Delivery hints attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EventMeta {
    /// Whether showing this choice should pause the host. Informational for
    /// notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pauses_game: Option<bool>,
    /// Explicitly ask for the resolved item to appear in the recent list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_in_latest: Option<bool>,
    /// Keep the resolved item out of the recent list. Wins over
    /// `record_in_latest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_not_record_in_latest: Option<bool>,
}

impl EventMeta {
    /// Whether a resolved item carrying this meta belongs in the recent list.
    ///
    /// Recorded by default. `do_not_record_in_latest` opts out and wins over
    /// an explicit `record_in_latest`; `record_in_latest: false` also opts out.
    pub fn records_in_latest(&self) -> bool {
        if self.do_not_record_in_latest == Some(true) {
            return false;
        }
        self.record_in_latest.unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// One selectable answer of a [`ChoiceEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChoiceOption {
    /// Option identifier, unique within its event.
    pub id: OptionId,
    /// Label shown to the user.
    pub text: String,
    /// Effects applied when this option is picked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

/// An event that blocks the host until the user picks an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChoiceEvent {
    /// Event identifier.
    pub id: EventId,
    /// Headline.
    pub title: String,
    /// Optional body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Delivery priority.
    pub priority: Priority,
    /// Creation time in host milliseconds.
    pub timestamp: u64,
    /// Non-empty ordered list of options.
    pub options: Vec<ChoiceOption>,
    /// Delivery hints.
    #[serde(default)]
    pub meta: EventMeta,
}

impl ChoiceEvent {
    /// Look up an option by id, falling back to the first option when the id
    /// is absent or unknown.
    ///
    /// Returns `None` only for an event with no options, which validation
    /// never lets through.
    pub fn option_or_first(&self, option_id: Option<&str>) -> Option<&ChoiceOption> {
        option_id
            .and_then(|wanted| self.options.iter().find(|o| o.id.as_str() == wanted))
            .or_else(|| self.options.first())
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A non-blocking informational event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NotificationEvent {
    /// Event identifier.
    pub id: EventId,
    /// Headline.
    pub title: String,
    /// Optional body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Delivery priority.
    pub priority: Priority,
    /// Creation time in host milliseconds.
    pub timestamp: u64,
    /// Delivery hints.
    #[serde(default)]
    pub meta: EventMeta,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A validated event of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Event {
    /// A blocking choice.
    Choice(ChoiceEvent),
    /// An informational notice.
    Notification(NotificationEvent),
}

impl Event {
    /// The event's identifier.
    pub const fn id(&self) -> &EventId {
        match self {
            Self::Choice(ev) => &ev.id,
            Self::Notification(ev) => &ev.id,
        }
    }

    /// The event's headline.
    pub fn title(&self) -> &str {
        match self {
            Self::Choice(ev) => &ev.title,
            Self::Notification(ev) => &ev.title,
        }
    }

    /// The event's delivery priority.
    pub const fn priority(&self) -> Priority {
        match self {
            Self::Choice(ev) => ev.priority,
            Self::Notification(ev) => ev.priority,
        }
    }

    /// Which variant this is.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Choice(_) => EventKind::Choice,
            Self::Notification(_) => EventKind::Notification,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn option(id: &str) -> ChoiceOption {
        ChoiceOption {
            id: OptionId::new(id),
            text: id.to_uppercase(),
            effects: Vec::new(),
        }
    }

    fn choice(options: Vec<ChoiceOption>) -> ChoiceEvent {
        ChoiceEvent {
            id: EventId::new("ev"),
            title: String::from("Title"),
            description: None,
            priority: Priority::Medium,
            timestamp: 0,
            options,
            meta: EventMeta::default(),
        }
    }

    #[test]
    fn option_lookup_falls_back_to_first() {
        let ev = choice(vec![option("ok"), option("cancel")]);
        assert_eq!(ev.option_or_first(Some("cancel")).unwrap().id.as_str(), "cancel");
        assert_eq!(ev.option_or_first(Some("nope")).unwrap().id.as_str(), "ok");
        assert_eq!(ev.option_or_first(None).unwrap().id.as_str(), "ok");
    }

    #[test]
    fn option_lookup_on_empty_event_is_none() {
        let ev = choice(Vec::new());
        assert!(ev.option_or_first(None).is_none());
    }

    #[test]
    fn latest_recording_rules() {
        let neither = EventMeta::default();
        assert!(neither.records_in_latest());

        let opt_in = EventMeta {
            record_in_latest: Some(true),
            ..EventMeta::default()
        };
        assert!(opt_in.records_in_latest());

        let opt_out = EventMeta {
            do_not_record_in_latest: Some(true),
            ..EventMeta::default()
        };
        assert!(!opt_out.records_in_latest());

        let both = EventMeta {
            record_in_latest: Some(true),
            do_not_record_in_latest: Some(true),
            ..EventMeta::default()
        };
        assert!(!both.records_in_latest());
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let ev = Event::Choice(choice(vec![option("ok")]));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json.get("kind").and_then(|k| k.as_str()), Some("choice"));
        assert_eq!(ev.kind(), EventKind::Choice);
    }
}
