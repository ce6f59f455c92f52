//! Enumeration types shared by the engine and its hosts.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Delivery priority of an event.
///
/// Variants are declared from lowest to highest so the derived ordering
/// agrees with [`Priority::rank`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Priority {
    /// Background information.
    Low,
    /// The default when a producer does not say.
    #[default]
    Medium,
    /// Should be seen soon.
    High,
    /// Must be seen before anything else.
    Urgent,
}

impl Priority {
    /// Numeric sort rank: `urgent=3 > high=2 > medium=1 > low=0`.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    /// Parse the wire spelling of a priority. Unknown strings yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    /// The wire spelling of this priority.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// Discriminates the two event variants on the wire and in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Blocks the host until the user picks an option.
    Choice,
    /// Informational, batchable, never blocks.
    Notification,
}

impl EventKind {
    /// Parse the wire spelling of an event kind.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "choice" => Some(Self::Choice),
            "notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_matches_derived_order() {
        let mut all = vec![Priority::Urgent, Priority::Low, Priority::High, Priority::Medium];
        all.sort();
        let ranks: Vec<u8> = all.iter().map(|p| p.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn parse_round_trips_wire_spelling() {
        for p in [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent] {
            assert_eq!(Priority::parse(p.as_str()), Some(p));
        }
        assert_eq!(Priority::parse("critical"), None);
        assert_eq!(Priority::parse("LOW"), None);
    }

    #[test]
    fn default_priority_is_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn kind_parse() {
        assert_eq!(EventKind::parse("choice"), Some(EventKind::Choice));
        assert_eq!(EventKind::parse("notification"), Some(EventKind::Notification));
        assert_eq!(EventKind::parse("modal"), None);
    }
}
