//! Lenient wire representation of events as emitted by producers.
//!
//! Every field is optional so that malformed producer output still
//! deserializes; schema validation in `herald-core` then decides whether the
//! event may enter the engine. Nothing in this module rejects input.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::effects::Effect;
use crate::enums::{EventKind, Priority};
use crate::events::EventMeta;

/// One option of a choice event, as received from a producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WireOption {
    /// Option identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Label shown to the user.
    #[serde(default)]
    pub text: Option<String>,
    /// Untyped effect payloads; each must parse as an [`Effect`].
    #[serde(default)]
    pub effects: Option<Vec<serde_json::Value>>,
}

impl WireOption {
    /// Build an option with an id and label and no effects.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
            effects: None,
        }
    }

    /// Attach a typed effect.
    #[must_use]
    pub fn with_effect(mut self, effect: &Effect) -> Self {
        if let Ok(value) = serde_json::to_value(effect) {
            self.effects.get_or_insert_with(Vec::new).push(value);
        }
        self
    }
}

/// An event exactly as a producer shaped it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WireEvent {
    /// `"choice"` or `"notification"`.
    #[serde(default)]
    pub kind: Option<String>,
    /// Event identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Headline.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional body text.
    #[serde(default)]
    pub description: Option<String>,
    /// `"low" | "medium" | "high" | "urgent"`; absent means medium.
    #[serde(default)]
    pub priority: Option<String>,
    /// Creation time in host milliseconds; absent means "now". Any JSON
    /// number is accepted: fractions are truncated, negatives become 0.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub timestamp: Option<u64>,
    /// Delivery hints.
    #[serde(default)]
    pub meta: Option<EventMeta>,
    /// Required and non-empty for choices; ignored for notifications.
    #[serde(default)]
    pub options: Option<Vec<WireOption>>,
}

impl WireEvent {
    /// Start a choice event.
    pub fn choice(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_kind(EventKind::Choice, id.into(), title.into())
    }

    /// Start a notification event.
    pub fn notification(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_kind(EventKind::Notification, id.into(), title.into())
    }

    fn with_kind(kind: EventKind, id: String, title: String) -> Self {
        let kind = match kind {
            EventKind::Choice => "choice",
            EventKind::Notification => "notification",
        };
        Self {
            kind: Some(kind.to_owned()),
            id: Some(id),
            title: Some(title),
            ..Self::default()
        }
    }

    /// Set the body text.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority.as_str().to_owned());
        self
    }

    /// Set the creation timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the delivery hints.
    #[must_use]
    pub fn with_meta(mut self, meta: EventMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Append an option.
    #[must_use]
    pub fn with_option(mut self, option: WireOption) -> Self {
        self.options.get_or_insert_with(Vec::new).push(option);
        self
    }

    /// Deserialize from an arbitrary JSON value.
    ///
    /// Fails only when a present field has the wrong JSON type (for example
    /// a numeric `id`); missing fields are left as `None` for validation to
    /// reject.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

/// Read an optional millisecond count from any JSON number, as hosts using
/// a fractional clock (`performance.now()`) send them.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(ms) = number.as_u64() {
        return Ok(Some(ms));
    }
    Ok(Some(number.as_f64().map_or(0, saturating_millis)))
}

// Float-to-int `as` saturates: negatives and NaN become 0, fractions drop.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn saturating_millis(ms: f64) -> u64 {
    ms as u64
}
