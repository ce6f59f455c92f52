//! Typed effect payloads carried by choice options.
//!
//! Producers attach effects to options; when the user picks an option the
//! engine forwards its effects to the host adapter, which dispatches on the
//! variant. The engine itself never interprets them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single state change requested by a resolved choice.
///
/// Serialized with an internal `type` tag, e.g.
/// `{"type": "resource", "resource": "gold", "amount": 25}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Effect {
    /// Add to (or, when negative, remove from) a named resource stock.
    Resource {
        /// Resource key understood by the host.
        resource: String,
        /// Signed quantity to apply.
        amount: f64,
    },
    /// Adjust the host's points counter.
    SpDelta {
        /// Signed number of points.
        amount: i64,
    },
    /// Reveal a nation or faction to the player.
    DiscoverNation {
        /// Nation key understood by the host.
        nation: String,
    },
    /// Set a boolean host flag.
    Flag {
        /// Flag name.
        key: String,
        /// New value.
        value: bool,
    },
    /// Host-specific effect forwarded verbatim.
    Custom {
        /// Effect name the host dispatches on.
        name: String,
        /// Arbitrary payload.
        payload: serde_json::Value,
    },
}

impl Effect {
    /// Short name of the variant, matching the wire `type` tag.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Resource { .. } => "resource",
            Self::SpDelta { .. } => "spDelta",
            Self::DiscoverNation { .. } => "discoverNation",
            Self::Flag { .. } => "flag",
            Self::Custom { .. } => "custom",
        }
    }
}
