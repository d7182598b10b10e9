//! Read-only projections of the state for display.

use crate::slots;
use idle_core::{Catalog, GameState, Slot, Timestamp};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct InventoryUsage {
    pub used: u64,
    pub capacity: Option<u64>,
}

impl InventoryUsage {
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.used >= cap)
    }
}

pub fn inventory_usage(catalog: &Catalog, state: &GameState) -> InventoryUsage {
    InventoryUsage {
        used: state.inventory.total(),
        capacity: catalog.settings.storage_capacity,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct XpProgress {
    pub level: u32,
    pub xp: u64,
    /// XP needed for the next level; `None` at the level cap.
    pub needed: Option<u64>,
    pub pct: f64,
}

pub fn xp_progress(catalog: &Catalog, state: &GameState) -> XpProgress {
    let curve = &catalog.settings.progression;
    let level = state.progression.level;
    let xp = state.progression.xp;
    if level >= curve.max_level {
        return XpProgress {
            level,
            xp,
            needed: None,
            pct: 100.0,
        };
    }
    let needed = curve.xp_for_level(level);
    XpProgress {
        level,
        xp,
        needed: Some(needed),
        pct: (xp as f64 / needed as f64 * 100.0).min(100.0),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotStatus {
    LockedByLevel { required: u32 },
    LockedByCost { cost: u64 },
    Empty,
    NeedsFeed,
    Cooling { remaining_secs: f64 },
    Ready,
}

pub fn slot_status(catalog: &Catalog, state: &GameState, slot: &Slot, now: Timestamp) -> SlotStatus {
    if !slot.unlocked {
        let spec = catalog.slot_spec(&slot.slot_id);
        let required = spec.map_or(1, |s| s.unlock_level);
        if state.progression.level < required {
            return SlotStatus::LockedByLevel { required };
        }
        return SlotStatus::LockedByCost {
            cost: spec.map_or(0, |s| s.unlock_cost),
        };
    }
    if slot.needs_feed {
        return SlotStatus::NeedsFeed;
    }
    match slots::ready_at(catalog, slot) {
        None => SlotStatus::Empty,
        Some(at) if now >= at => SlotStatus::Ready,
        Some(at) => SlotStatus::Cooling {
            remaining_secs: at.secs_since(now),
        },
    }
}

/// Share of the current cycle elapsed, in [0, 100]. Zero for empty or unfed slots.
pub fn slot_progress_pct(catalog: &Catalog, slot: &Slot, now: Timestamp) -> f64 {
    let Some(template) = slot
        .catalog_entry_id
        .as_deref()
        .and_then(|id| catalog.template(id))
    else {
        return 0.0;
    };
    if slot.needs_feed {
        return 0.0;
    }
    let cooldown = slots::cooldown_secs(catalog, slot, template);
    if cooldown <= 0.0 {
        return 100.0;
    }
    let started = slot.last_produced_at.unwrap_or(Timestamp::EPOCH);
    (now.secs_since(started) / cooldown * 100.0).clamp(0.0, 100.0)
}

/// Money `amount` units would fetch at the current price.
pub fn sell_value(state: &GameState, item_id: &str, amount: u64) -> u64 {
    state
        .market
        .get(item_id)
        .map_or(0, |entry| idle_econ::sale_value(entry, amount))
}
