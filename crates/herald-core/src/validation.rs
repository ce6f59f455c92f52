//! Schema validation: the gate between producer output and the engine.
//!
//! Producers emit lenient [`WireEvent`]s. [`validate`] turns one into a typed
//! [`Event`] or explains why it cannot. The engine drops rejected events
//! before they reach the queue, the notification buffer, or history; a
//! validation error never propagates past the engine boundary.

use std::collections::BTreeSet;

use herald_types::{
    ChoiceEvent, ChoiceOption, Effect, Event, EventId, EventKind, NotificationEvent, OptionId,
    Priority, WireEvent, WireOption,
};

/// Why a wire event was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The payload was not shaped like an event at all.
    #[error("malformed event JSON: {reason}")]
    MalformedJson {
        /// Deserializer message.
        reason: String,
    },

    /// A required field was absent.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Name of the absent field.
        field: &'static str,
    },

    /// A required string field was present but empty or whitespace.
    #[error("field `{field}` must not be blank")]
    BlankField {
        /// Name of the blank field.
        field: &'static str,
    },

    /// `kind` was neither `choice` nor `notification`.
    #[error("unknown event kind `{kind}`")]
    UnknownKind {
        /// The offending value.
        kind: String,
    },

    /// `priority` was not one of the four known levels.
    #[error("unknown priority `{priority}`")]
    UnknownPriority {
        /// The offending value.
        priority: String,
    },

    /// A choice arrived without any options.
    #[error("choice `{event_id}` has no options")]
    NoOptions {
        /// The choice's id.
        event_id: String,
    },

    /// An option lacked its id or text.
    #[error("option #{index} is missing `{field}`")]
    InvalidOption {
        /// Zero-based position of the option.
        index: usize,
        /// Name of the missing or blank field.
        field: &'static str,
    },

    /// Two options of one choice share an id.
    #[error("duplicate option id `{option_id}`")]
    DuplicateOption {
        /// The repeated id.
        option_id: String,
    },

    /// An effect payload did not match any known effect shape.
    #[error("option `{option_id}` has an invalid effect: {reason}")]
    InvalidEffect {
        /// The option carrying the effect.
        option_id: String,
        /// Deserializer message.
        reason: String,
    },
}

/// Validate a raw JSON value.
///
/// `now_ms` fills in a missing timestamp.
pub fn validate_json(value: &serde_json::Value, now_ms: u64) -> Result<Event, ValidationError> {
    let wire = WireEvent::from_json(value).map_err(|e| ValidationError::MalformedJson {
        reason: e.to_string(),
    })?;
    validate(&wire, now_ms)
}

/// Validate a wire event and convert it into a typed [`Event`].
///
/// `now_ms` fills in a missing timestamp.
pub fn validate(wire: &WireEvent, now_ms: u64) -> Result<Event, ValidationError> {
    let kind_raw = wire
        .kind
        .as_deref()
        .ok_or(ValidationError::MissingField { field: "kind" })?;
    let kind = EventKind::parse(kind_raw).ok_or_else(|| ValidationError::UnknownKind {
        kind: kind_raw.to_owned(),
    })?;

    let id = required_text(wire.id.as_deref(), "id")?;
    let title = required_text(wire.title.as_deref(), "title")?;
    let priority = match wire.priority.as_deref() {
        None => Priority::default(),
        Some(raw) => Priority::parse(raw).ok_or_else(|| ValidationError::UnknownPriority {
            priority: raw.to_owned(),
        })?,
    };
    let timestamp = wire.timestamp.unwrap_or(now_ms);
    let meta = wire.meta.clone().unwrap_or_default();
    let description = wire.description.clone();

    match kind {
        EventKind::Notification => Ok(Event::Notification(NotificationEvent {
            id: EventId::new(id),
            title: title.to_owned(),
            description,
            priority,
            timestamp,
            meta,
        })),
        EventKind::Choice => {
            let raw_options = wire
                .options
                .as_deref()
                .filter(|opts| !opts.is_empty())
                .ok_or_else(|| ValidationError::NoOptions {
                    event_id: id.to_owned(),
                })?;
            let options = validate_options(raw_options)?;
            Ok(Event::Choice(ChoiceEvent {
                id: EventId::new(id),
                title: title.to_owned(),
                description,
                priority,
                timestamp,
                options,
                meta,
            }))
        }
    }
}

fn required_text<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField { field })?;
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField { field });
    }
    Ok(value)
}

fn validate_options(raw: &[WireOption]) -> Result<Vec<ChoiceOption>, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut options = Vec::with_capacity(raw.len());

    for (index, opt) in raw.iter().enumerate() {
        let id = opt
            .id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ValidationError::InvalidOption { index, field: "id" })?;
        let text = opt
            .text
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ValidationError::InvalidOption {
                index,
                field: "text",
            })?;
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateOption {
                option_id: id.to_owned(),
            });
        }

        let effects = opt
            .effects
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|value| {
                serde_json::from_value::<Effect>(value.clone()).map_err(|e| {
                    ValidationError::InvalidEffect {
                        option_id: id.to_owned(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        options.push(ChoiceOption {
            id: OptionId::new(id),
            text: text.to_owned(),
            effects,
        });
    }

    Ok(options)
}
