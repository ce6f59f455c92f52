//! Reference host that narrates engine calls and keeps a small realm state.
//!
//! [`RealmHost`] delegates pause, modal, and history bookkeeping to a
//! [`RecordingAdapter`] and interprets effects against [`Realm`], logging
//! every call so a demo run reads like a game transcript.

use std::collections::{BTreeMap, BTreeSet};

use herald_core::adapter::{Adapter, EffectError, HostClock, RecordingAdapter};
use herald_types::{ChoiceEvent, Effect, EventId, HistoryRecord};
use serde::Serialize;
use tracing::{debug, info};

/// Game state touched by effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Realm {
    /// Resource stocks by key.
    pub resources: BTreeMap<String, f64>,
    /// Points counter.
    pub sp: i64,
    /// Nations the player has met.
    pub nations: BTreeSet<String>,
    /// Boolean flags.
    pub flags: BTreeMap<String, bool>,
}

impl Realm {
    fn apply(&mut self, effect: &Effect) -> Result<(), EffectError> {
        match effect {
            Effect::Resource { resource, amount } => {
                let stock = self.resources.entry(resource.clone()).or_insert(0.0);
                *stock = (*stock + amount).max(0.0);
            }
            Effect::SpDelta { amount } => self.sp = self.sp.saturating_add(*amount),
            Effect::DiscoverNation { nation } => {
                let _ = self.nations.insert(nation.clone());
            }
            Effect::Flag { key, value } => {
                let _ = self.flags.insert(key.clone(), *value);
            }
            Effect::Custom { name, .. } => {
                return Err(EffectError::Unsupported {
                    effect_type: format!("custom:{name}"),
                });
            }
        }
        Ok(())
    }
}

/// Adapter used by the binary.
#[derive(Debug)]
pub struct RealmHost {
    inner: RecordingAdapter,
    realm: Realm,
}

impl RealmHost {
    /// A running host on the wall clock.
    pub fn new() -> Self {
        Self {
            inner: RecordingAdapter::with_clock(HostClock::monotonic()),
            realm: Realm::default(),
        }
    }

    /// Current realm state.
    pub const fn realm(&self) -> &Realm {
        &self.realm
    }

    /// History written so far.
    pub fn history(&self) -> &[HistoryRecord] {
        self.inner.history()
    }

    /// The most recent records.
    pub fn latest(&self) -> Vec<&HistoryRecord> {
        self.inner.latest()
    }
}

impl Default for RealmHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for RealmHost {
    fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    fn now_ms(&self) -> u64 {
        self.inner.now_ms()
    }

    fn current_modal_id(&self) -> Option<EventId> {
        self.inner.current_modal_id()
    }

    fn pause(&mut self) {
        debug!("Game paused");
        self.inner.pause();
    }

    fn resume(&mut self) {
        debug!("Game resumed");
        self.inner.resume();
    }

    fn show_modal(&mut self, event: &ChoiceEvent) {
        let options: Vec<&str> = event.options.iter().map(|o| o.text.as_str()).collect();
        info!(
            event_id = %event.id,
            title = event.title,
            options = ?options,
            "Choice presented"
        );
        self.inner.show_modal(event);
    }

    fn update_modal(&mut self, event: Option<&ChoiceEvent>) {
        if let Some(ev) = event {
            info!(event_id = %ev.id, title = ev.title, "Choice presented");
        }
        self.inner.update_modal(event);
    }

    fn hide_modal(&mut self) {
        self.inner.hide_modal();
    }

    fn append_history(&mut self, record: HistoryRecord) {
        if record.is_resolved {
            info!(
                id = %record.id,
                kind = ?record.kind,
                title = record.title,
                "Chronicle entry"
            );
        }
        self.inner.append_history(record);
    }

    fn append_latest(&mut self, record: HistoryRecord) {
        self.inner.append_latest(record);
    }

    /// All or nothing: effects are staged on a copy of the realm, which
    /// replaces the live one only once every effect has applied.
    fn apply_effects(&mut self, effects: &[Effect]) -> Result<(), EffectError> {
        let mut staged = self.realm.clone();
        for effect in effects {
            staged.apply(effect)?;
            debug!(effect = effect.type_name(), "Effect staged");
        }
        self.inner.apply_effects(effects)?;
        self.realm = staged;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn effects_update_the_realm() {
        let mut host = RealmHost::new();
        host.apply_effects(&[
            Effect::Resource {
                resource: String::from("gold"),
                amount: 25.0,
            },
            Effect::Resource {
                resource: String::from("gold"),
                amount: -40.0,
            },
            Effect::SpDelta { amount: 3 },
            Effect::DiscoverNation {
                nation: String::from("norse"),
            },
        ])
        .unwrap();

        let realm = host.realm();
        assert_eq!(realm.resources.get("gold").copied(), Some(0.0));
        assert_eq!(realm.sp, 3);
        assert!(realm.nations.contains("norse"));
    }

    #[test]
    fn custom_effects_are_unsupported() {
        let mut host = RealmHost::new();
        let err = host
            .apply_effects(&[Effect::Custom {
                name: String::from("earthquake"),
                payload: serde_json::Value::Null,
            }])
            .unwrap_err();
        assert!(matches!(err, EffectError::Unsupported { .. }));
    }

    #[test]
    fn failed_batch_leaves_realm_and_log_untouched() {
        let mut host = RealmHost::new();
        let err = host
            .apply_effects(&[
                Effect::DiscoverNation {
                    nation: String::from("norse"),
                },
                Effect::Custom {
                    name: String::from("earthquake"),
                    payload: serde_json::Value::Null,
                },
            ])
            .unwrap_err();
        assert!(matches!(err, EffectError::Unsupported { .. }));
        assert_eq!(host.realm(), &Realm::default());
        assert!(host.inner.applied_effects().is_empty());
    }
}
