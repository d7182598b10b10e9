//! Versioned save envelope and the overlay loader.
//!
//! ## Versioning
//!
//! - `SAVE_VERSION` is bumped whenever the state gains fields.
//! - `MIN_COMPATIBLE_VERSION` is bumped only for breaking changes (renamed or
//!   repurposed fields). Anything at or above it loads; fields missing from
//!   an older blob keep the values of the fresh default state.

use crate::store::{BlobStore, StoreError};
use idle_core::{Catalog, GameState, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

pub const SAVE_VERSION: u32 = 1;
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("save blob is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version {found} is older than the minimum {min}")]
    Incompatible { found: u32, min: u32 },
    #[error("save belongs to game {found}, expected {expected}")]
    WrongGame { found: String, expected: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    version: u32,
    state: &'a GameState,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    version: u32,
    state: Value,
}

/// Serialize `state` into the current envelope.
pub fn encode(state: &GameState) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(&EnvelopeOut {
        version: SAVE_VERSION,
        state,
    })?)
}

/// Recursively merge `overlay` into `base`. Objects merge key by key; any
/// other value in the overlay replaces the base value.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Decode a blob on top of `default`, then align it with the catalog and
/// restart the clock at `now`.
pub fn decode(
    blob: &str,
    default: &GameState,
    catalog: &Catalog,
    now: Timestamp,
) -> Result<GameState, SnapshotError> {
    let envelope: EnvelopeIn = serde_json::from_str(blob)?;
    if envelope.version < MIN_COMPATIBLE_VERSION {
        return Err(SnapshotError::Incompatible {
            found: envelope.version,
            min: MIN_COMPATIBLE_VERSION,
        });
    }
    if envelope.version < SAVE_VERSION {
        info!(
            saved = envelope.version,
            current = SAVE_VERSION,
            "migrating older save"
        );
    }
    let mut merged = serde_json::to_value(default)?;
    merge_json(&mut merged, envelope.state);
    let mut state: GameState = serde_json::from_value(merged)?;
    if state.game != catalog.game {
        return Err(SnapshotError::WrongGame {
            found: state.game,
            expected: catalog.game.clone(),
        });
    }
    state.reconcile_slots(catalog, now);
    // offline time is not replayed as one giant tick
    state.last_tick = now;
    Ok(state)
}

/// Load the saved state under `key`, or `default` when there is none or it
/// cannot be used. Never fails.
pub fn load_or_default<S: BlobStore + ?Sized>(
    store: &S,
    key: &str,
    default: GameState,
    catalog: &Catalog,
    now: Timestamp,
) -> GameState {
    let blob = match store.load(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return default,
        Err(e) => {
            warn!(key, error = %e, "save store unavailable, starting fresh");
            return default;
        }
    };
    match decode(&blob, &default, catalog, now) {
        Ok(state) => {
            info!(key, "save restored");
            state
        }
        Err(e) => {
            warn!(key, error = %e, "discarding unusable save");
            default
        }
    }
}

/// Encode and write `state` under `key`.
pub fn save<S: BlobStore + ?Sized>(
    store: &mut S,
    key: &str,
    state: &GameState,
) -> Result<(), SnapshotError> {
    let blob = encode(state)?;
    store.save(key, &blob)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::io;

    /// Store whose every read and write fails.
    struct BrokenStore;

    fn broken(key: &str) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "storage disabled"),
        }
    }

    impl BlobStore for BrokenStore {
        fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
            Err(broken(key))
        }

        fn save(&mut self, key: &str, _blob: &str) -> Result<(), StoreError> {
            Err(broken(key))
        }
    }

    fn catalog() -> Catalog {
        serde_json::from_value(json!({
            "game": "demo",
            "producibles": [{ "id": "ore", "name": "Ore", "base_value": 5.0 }],
            "slots": [
                { "id": "a", "kind": "generator" },
                { "id": "b", "kind": "generator", "unlock_cost": 40 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn roundtrip_restores_state_and_resets_clock() {
        let c = catalog();
        let mut s = GameState::from_catalog(&c, Timestamp(0));
        s.resources.money = 321;
        s.inventory.add("ore", 4);
        s.discovered.insert("smelt".into());
        s.last_tick = Timestamp(5_000);
        let mut store = MemoryStore::new();
        save(&mut store, "demo_save", &s).unwrap();

        let default = GameState::from_catalog(&c, Timestamp(90_000));
        let loaded = load_or_default(&store, "demo_save", default, &c, Timestamp(90_000));
        assert_eq!(loaded.resources.money, 321);
        assert_eq!(loaded.inventory.count("ore"), 4);
        assert!(loaded.discovered.contains("smelt"));
        assert_eq!(loaded.last_tick, Timestamp(90_000));
    }

    #[test]
    fn missing_fields_fall_back_to_default() {
        let c = catalog();
        let default = GameState::from_catalog(&c, Timestamp(1_000));
        let blob = json!({
            "version": 1,
            "state": { "game": "demo", "resources": { "money": 7 } }
        })
        .to_string();
        let s = decode(&blob, &default, &c, Timestamp(1_000)).unwrap();
        assert_eq!(s.resources.money, 7);
        assert_eq!(s.resources.energy, default.resources.energy);
        assert_eq!(s.slots.len(), 2);
        assert_eq!(s.progression.level, 1);
    }

    #[test]
    fn slots_are_reconciled_with_layout() {
        let c = catalog();
        let default = GameState::from_catalog(&c, Timestamp(0));
        let blob = json!({
            "version": 1,
            "state": {
                "game": "demo",
                "slots": [{
                    "slot_id": "gone",
                    "kind": "generator",
                    "catalog_entry_id": null,
                    "level": 3,
                    "last_produced_at": null,
                    "auto_enabled": false,
                    "unlocked": true
                }, {
                    "slot_id": "a",
                    "kind": "generator",
                    "catalog_entry_id": null,
                    "level": 2,
                    "last_produced_at": null,
                    "auto_enabled": false,
                    "unlocked": true
                }]
            }
        })
        .to_string();
        let s = decode(&blob, &default, &c, Timestamp(0)).unwrap();
        let ids: Vec<&str> = s.slots.iter().map(|s| s.slot_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(s.slot("a").unwrap().level, 2);
        assert!(!s.slot("b").unwrap().unlocked);
    }

    #[test]
    fn occupants_without_acquisition_time_start_holding_now() {
        let c = catalog();
        let default = GameState::from_catalog(&c, Timestamp(0));
        let blob = json!({
            "version": 1,
            "state": {
                "game": "demo",
                "slots": [{
                    "slot_id": "a",
                    "kind": "generator",
                    "catalog_entry_id": "drill",
                    "level": 1,
                    "last_produced_at": 1000,
                    "auto_enabled": false,
                    "unlocked": true
                }]
            }
        })
        .to_string();
        let s = decode(&blob, &default, &c, Timestamp(9_000)).unwrap();
        assert_eq!(s.slot("a").unwrap().acquired_at, Some(Timestamp(9_000)));
        assert_eq!(s.slot("b").unwrap().acquired_at, None);
    }

    #[test]
    fn corrupt_blob_yields_default() {
        let c = catalog();
        let default = GameState::from_catalog(&c, Timestamp(0));
        let store = MemoryStore::with_blob("demo_save", "{not json");
        let s = load_or_default(&store, "demo_save", default.clone(), &c, Timestamp(0));
        assert_eq!(s, default);
    }

    #[test]
    fn unavailable_store_starts_fresh_and_reports_save_errors() {
        let c = catalog();
        let default = GameState::from_catalog(&c, Timestamp(0));
        let s = load_or_default(&BrokenStore, "demo_save", default.clone(), &c, Timestamp(0));
        assert_eq!(s, default);
        assert!(matches!(
            save(&mut BrokenStore, "demo_save", &s),
            Err(SnapshotError::Store(StoreError::Io { .. }))
        ));
    }

    #[test]
    fn old_or_foreign_saves_are_rejected() {
        let c = catalog();
        let default = GameState::from_catalog(&c, Timestamp(0));
        let old = json!({ "version": 0, "state": {} }).to_string();
        assert!(matches!(
            decode(&old, &default, &c, Timestamp(0)),
            Err(SnapshotError::Incompatible { found: 0, min: 1 })
        ));
        let foreign = json!({ "version": 1, "state": { "game": "farm" } }).to_string();
        assert!(matches!(
            decode(&foreign, &default, &c, Timestamp(0)),
            Err(SnapshotError::WrongGame { .. })
        ));
    }

    #[test]
    fn merge_replaces_scalars_and_arrays() {
        let mut base = json!({ "a": { "x": 1, "y": 2 }, "list": [1, 2, 3] });
        merge_json(&mut base, json!({ "a": { "y": 5 }, "list": [9] }));
        assert_eq!(base, json!({ "a": { "x": 1, "y": 5 }, "list": [9] }));
    }
}
