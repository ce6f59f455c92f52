//! Shared type definitions for the Herald event delivery engine.
//!
//! This crate is the single source of truth for every type that crosses the
//! boundary between producers, the engine, and the host. Types defined here
//! flow downstream to `TypeScript` via `ts-rs` for host tooling.
//!
//! # Modules
//!
//! - [`ids`] -- String newtypes for event, option, and source identifiers
//! - [`enums`] -- [`Priority`] and [`EventKind`]
//! - [`effects`] -- Typed [`Effect`] payloads applied by the host
//! - [`events`] -- Validated [`Event`], [`ChoiceEvent`], [`NotificationEvent`]
//! - [`wire`] -- Lenient [`WireEvent`] as emitted by producers
//! - [`records`] -- [`HistoryRecord`] and [`RngLog`]

pub mod effects;
pub mod enums;
pub mod events;
pub mod ids;
pub mod records;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use effects::Effect;
pub use enums::{EventKind, Priority};
pub use events::{ChoiceEvent, ChoiceOption, Event, EventMeta, NotificationEvent};
pub use ids::{EventId, OptionId, SourceId};
pub use records::{HistoryRecord, RngLog};
pub use wire::{WireEvent, WireOption};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::OptionId::export_all();
        let _ = crate::ids::SourceId::export_all();
        let _ = crate::enums::Priority::export_all();
        let _ = crate::enums::EventKind::export_all();
        let _ = crate::effects::Effect::export_all();
        let _ = crate::events::Event::export_all();
        let _ = crate::wire::WireEvent::export_all();
        let _ = crate::records::HistoryRecord::export_all();
        let _ = crate::records::RngLog::export_all();
    }
}
