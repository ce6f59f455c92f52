//! Demo event sources.
//!
//! Both draw from the engine's RNG handle passed in the poll context, so a
//! seeded run is reproducible end to end.

use async_trait::async_trait;
use herald_core::source::{EventSource, PollContext, SourceError};
use herald_types::{Effect, EventMeta, Priority, WireEvent, WireOption};

/// Chance per poll that a border incident is raised.
const INCIDENT_CHANCE: f64 = 0.35;

/// Chance per poll that a harvest report arrives.
const HARVEST_CHANCE: f64 = 0.6;

/// Raises border incidents as blocking choices.
pub struct BorderSource;

struct Incident {
    key: &'static str,
    title: &'static str,
    nation: &'static str,
    priority: Priority,
}

const INCIDENTS: &[Incident] = &[
    Incident {
        key: "envoy",
        title: "An envoy arrives from the north",
        nation: "norse",
        priority: Priority::Medium,
    },
    Incident {
        key: "raid",
        title: "Raiders cross the river",
        nation: "saxon",
        priority: Priority::Urgent,
    },
    Incident {
        key: "caravan",
        title: "A merchant caravan requests passage",
        nation: "frankish",
        priority: Priority::Low,
    },
];

#[async_trait]
impl EventSource for BorderSource {
    fn id(&self) -> &str {
        "border"
    }

    async fn poll(&self, ctx: &PollContext) -> Result<Vec<WireEvent>, SourceError> {
        if ctx.rng.random() >= INCIDENT_CHANCE {
            return Ok(Vec::new());
        }
        let Some(incident) = ctx.rng.pick_index(INCIDENTS.len()).and_then(|i| INCIDENTS.get(i))
        else {
            return Ok(Vec::new());
        };

        let event = WireEvent::choice(format!("{}-{}", incident.key, ctx.now_ms), incident.title)
            .with_priority(incident.priority)
            .with_timestamp(ctx.now_ms)
            .with_option(
                WireOption::new("welcome", "Receive them")
                    .with_effect(&Effect::DiscoverNation {
                        nation: incident.nation.to_owned(),
                    })
                    .with_effect(&Effect::SpDelta { amount: 2 }),
            )
            .with_option(
                WireOption::new("repel", "Turn them away").with_effect(&Effect::Resource {
                    resource: String::from("gold"),
                    amount: -5.0,
                }),
            );
        Ok(vec![event])
    }
}

/// Reports harvests as notifications.
pub struct HarvestSource;

const CROPS: &[&str] = &["wheat", "barley", "flax", "grapes", "olives", "rye"];

#[async_trait]
impl EventSource for HarvestSource {
    fn id(&self) -> &str {
        "harvest"
    }

    async fn poll(&self, ctx: &PollContext) -> Result<Vec<WireEvent>, SourceError> {
        if ctx.rng.random() >= HARVEST_CHANCE {
            return Ok(Vec::new());
        }
        let Some(crop) = ctx.rng.pick_index(CROPS.len()).and_then(|i| CROPS.get(i)) else {
            return Ok(Vec::new());
        };
        let bumper = ctx.rng.random() > 0.8;
        let (title, priority) = if bumper {
            (format!("Bumper {crop} harvest"), Priority::High)
        } else {
            (format!("The {crop} is in"), Priority::Low)
        };
        let quiet = EventMeta {
            do_not_record_in_latest: Some(!bumper),
            ..EventMeta::default()
        };
        Ok(vec![
            WireEvent::notification(format!("harvest-{crop}"), title)
                .with_priority(priority)
                .with_meta(quiet),
        ])
    }
}
