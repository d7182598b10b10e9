//! Game state aggregate and its ledgers.
//!
//! `GameState` is the single unit of persistence. It is replaced wholesale by
//! the action processor; nothing else mutates it.

use crate::catalog::{Catalog, ItemStack, SlotKind, SlotSpec};
use crate::time::Timestamp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fungible resources. Money is whole coins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub money: u64,
    pub energy: f64,
    /// Fund reputation; may go negative.
    #[serde(default)]
    pub reputation: f64,
}

impl Resources {
    /// Deduct `cost` if affordable. Returns false and leaves money untouched otherwise.
    pub fn try_spend(&mut self, cost: u64) -> bool {
        match self.money.checked_sub(cost) {
            Some(rest) => {
                self.money = rest;
                true
            }
            None => false,
        }
    }

    pub fn try_spend_energy(&mut self, cost: f64) -> bool {
        if cost <= 0.0 {
            return true;
        }
        if self.energy + 1e-9 < cost {
            return false;
        }
        self.energy = (self.energy - cost).max(0.0);
        true
    }

    pub fn credit(&mut self, amount: u64) {
        self.money = self.money.saturating_add(amount);
    }
}

/// Item counts. Entries are always positive; a count reaching zero is removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(BTreeMap<String, u64>);

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, item: &str) -> u64 {
        self.0.get(item).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn add(&mut self, item: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let entry = self.0.entry(item.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Remove `amount` of `item`; refuses (returns false) on shortfall.
    pub fn remove(&mut self, item: &str, amount: u64) -> bool {
        let have = self.count(item);
        if have < amount {
            return false;
        }
        if have == amount {
            self.0.remove(item);
        } else {
            self.0.insert(item.to_string(), have - amount);
        }
        true
    }

    /// True when every stack (summed per item) is covered.
    pub fn has_all(&self, stacks: &[ItemStack]) -> bool {
        let mut need: BTreeMap<&str, u64> = BTreeMap::new();
        for s in stacks {
            *need.entry(s.item.as_str()).or_insert(0) += s.amount as u64;
        }
        need.iter().all(|(item, n)| self.count(item) >= *n)
    }

    /// Remove every stack atomically: either all are removed or none.
    pub fn remove_all(&mut self, stacks: &[ItemStack]) -> bool {
        if !self.has_all(stacks) {
            return false;
        }
        for s in stacks {
            self.remove(&s.item, s.amount as u64);
        }
        true
    }

    /// Drop any non-positive entries that slipped in through deserialization.
    pub fn normalize(&mut self) {
        self.0.retain(|_, v| *v > 0);
    }
}

impl FromIterator<(String, u64)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        let mut inv = Inventory::new();
        for (item, n) in iter {
            inv.add(&item, n);
        }
        inv
    }
}

/// One production unit position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: String,
    pub kind: SlotKind,
    pub catalog_entry_id: Option<String>,
    pub level: u32,
    pub last_produced_at: Option<Timestamp>,
    pub auto_enabled: bool,
    pub unlocked: bool,
    /// Fed occupants wait for feed before the next cycle starts.
    #[serde(default)]
    pub needs_feed: bool,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// When the current occupant arrived.
    #[serde(default)]
    pub acquired_at: Option<Timestamp>,
}

impl Slot {
    /// Fresh slot from the layout. Only free level-1 slots start unlocked.
    pub fn from_spec(spec: &SlotSpec, catalog: &Catalog, now: Timestamp) -> Self {
        let mut slot = Slot {
            slot_id: spec.id.clone(),
            kind: spec.kind,
            catalog_entry_id: None,
            level: 1,
            last_produced_at: None,
            auto_enabled: false,
            unlocked: spec.unlock_cost == 0 && spec.unlock_level <= 1,
            needs_feed: false,
            metrics: BTreeMap::new(),
            acquired_at: None,
        };
        if let Some(template) = spec.occupant.as_deref().and_then(|id| catalog.template(id)) {
            slot.occupy(template, now);
            slot.unlocked = true;
        }
        slot
    }

    pub fn is_occupied(&self) -> bool {
        self.catalog_entry_id.is_some()
    }

    pub fn occupy(&mut self, template: &crate::catalog::SlotTemplate, now: Timestamp) {
        self.catalog_entry_id = Some(template.id.clone());
        self.last_produced_at = Some(now);
        self.acquired_at = Some(now);
        self.needs_feed = template.needs_feed();
        self.metrics = template.metrics.clone();
    }

    pub fn clear(&mut self) {
        self.catalog_entry_id = None;
        self.last_produced_at = None;
        self.auto_enabled = false;
        self.needs_feed = false;
        self.metrics.clear();
        self.acquired_at = None;
    }

    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }
}

/// Price state for one item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub current_price: u64,
    pub supply: f64,
    pub demand: f64,
    pub last_update: Timestamp,
}

/// Monotonic counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_crafted: u64,
    pub total_produced: u64,
    pub total_sold: u64,
    pub total_earned: u64,
    pub total_spent: u64,
    pub play_time_secs: f64,
    /// Named counters referenced by event conditions.
    pub counters: BTreeMap<String, f64>,
}

impl Stats {
    pub fn bump(&mut self, counter: &str, by: f64) {
        *self.counters.entry(counter.to_string()).or_insert(0.0) += by;
    }

    pub fn counter(&self, counter: &str) -> f64 {
        self.counters.get(counter).copied().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub level: u32,
    pub xp: u64,
}

impl Default for Progression {
    fn default() -> Self {
        Self { level: 1, xp: 0 }
    }
}

/// In-game calendar for turn-based instances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarState {
    pub date: NaiveDate,
    pub month_started_at: Timestamp,
    pub months_elapsed: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveEvent {
    pub event_id: String,
    pub target_slot: Option<String>,
    pub started_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

impl ActiveEvent {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Open delivery order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub template_id: String,
    pub expires_at: Timestamp,
}

impl Order {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Seed plus draw counter; each random step derives a fresh generator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub draws: u64,
}

/// Aggregate root of one game instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub game: String,
    pub resources: Resources,
    pub inventory: Inventory,
    pub slots: Vec<Slot>,
    pub discovered: BTreeSet<String>,
    pub market: BTreeMap<String, MarketEntry>,
    pub stats: Stats,
    pub progression: Progression,
    pub calendar: Option<CalendarState>,
    pub active_event: Option<ActiveEvent>,
    pub orders: Vec<Order>,
    pub next_order_seq: u64,
    pub rng: RngState,
    pub last_tick: Timestamp,
    pub last_saved: Option<Timestamp>,
    pub last_market_update: Timestamp,
    pub last_order_refresh: Timestamp,
}

impl GameState {
    /// Fresh state for `catalog` without market prices; the engine fills those.
    pub fn from_catalog(catalog: &Catalog, now: Timestamp) -> Self {
        let s = &catalog.settings;
        GameState {
            game: catalog.game.clone(),
            resources: Resources {
                money: s.start_money,
                energy: s.start_energy.min(s.max_energy),
                reputation: 0.0,
            },
            slots: catalog
                .slots
                .iter()
                .map(|spec| Slot::from_spec(spec, catalog, now))
                .collect(),
            calendar: s.calendar.as_ref().map(|cal| CalendarState {
                date: cal.start_date,
                month_started_at: now,
                months_elapsed: 0,
            }),
            rng: RngState {
                seed: s.rng_seed,
                draws: 0,
            },
            last_tick: now,
            last_market_update: now,
            last_order_refresh: now,
            ..GameState::default()
        }
    }

    pub fn slot(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn slot_mut(&mut self, slot_id: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.slot_id == slot_id)
    }

    /// Number of occupied company slots.
    pub fn portfolio_size(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.kind == SlotKind::Company && s.is_occupied())
            .count()
    }

    /// Fraction of catalog recipes discovered, in [0, 1].
    pub fn discovery_ratio(&self, catalog: &Catalog) -> f64 {
        if catalog.recipes.is_empty() {
            return 0.0;
        }
        let known = catalog
            .recipes
            .iter()
            .filter(|r| self.discovered.contains(&r.id))
            .count();
        known as f64 / catalog.recipes.len() as f64
    }

    /// Re-align slots with the catalog layout after loading an older save:
    /// unknown slots are dropped, missing ones appended fresh.
    pub fn reconcile_slots(&mut self, catalog: &Catalog, now: Timestamp) {
        self.slots.retain(|s| catalog.slot_spec(&s.slot_id).is_some());
        for spec in &catalog.slots {
            if self.slot(&spec.id).is_none() {
                self.slots.push(Slot::from_spec(spec, catalog, now));
            }
        }
        let order: BTreeMap<&str, usize> = catalog
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        self.slots
            .sort_by_key(|s| order.get(s.slot_id.as_str()).copied().unwrap_or(usize::MAX));
        // saves from before holding periods were tracked
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.is_occupied() && s.acquired_at.is_none())
        {
            slot.acquired_at = Some(now);
        }
        self.inventory.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn inventory_removes_zero_entries() {
        let mut inv = Inventory::new();
        inv.add("fire", 2);
        assert!(inv.remove("fire", 2));
        assert!(inv.is_empty());
        assert_eq!(inv.count("fire"), 0);
    }

    #[test]
    fn inventory_refuses_shortfall() {
        let mut inv = Inventory::new();
        inv.add("fire", 1);
        assert!(!inv.remove("fire", 2));
        assert_eq!(inv.count("fire"), 1);
    }

    #[test]
    fn inventory_add_saturates() {
        let mut inv = Inventory::new();
        inv.add("fire", u64::MAX - 1);
        inv.add("fire", 5);
        assert_eq!(inv.count("fire"), u64::MAX);
    }

    #[test]
    fn remove_all_is_atomic() {
        let mut inv: Inventory = vec![("fire".to_string(), 1), ("water".to_string(), 1)]
            .into_iter()
            .collect();
        let before = inv.clone();
        let stacks = vec![ItemStack::new("fire", 1), ItemStack::new("water", 2)];
        assert!(!inv.remove_all(&stacks));
        assert_eq!(inv, before);
    }

    #[test]
    fn has_all_sums_repeated_items() {
        let inv: Inventory = vec![("fire".to_string(), 1)].into_iter().collect();
        let stacks = vec![ItemStack::new("fire", 1), ItemStack::new("fire", 1)];
        assert!(!inv.has_all(&stacks));
    }

    #[test]
    fn spend_refuses_overdraft() {
        let mut r = Resources {
            money: 40,
            energy: 5.0,
            reputation: 0.0,
        };
        assert!(!r.try_spend(50));
        assert_eq!(r.money, 40);
        assert!(!r.try_spend_energy(6.0));
        assert_eq!(r.energy, 5.0);
        assert!(r.try_spend(40));
        assert_eq!(r.money, 0);
    }

    #[test]
    fn event_expiry_is_strict() {
        let ev = ActiveEvent {
            event_id: "e".into(),
            target_slot: None,
            started_at: Timestamp(0),
            expires_at: Some(Timestamp(1_000)),
        };
        assert!(!ev.is_expired(Timestamp(1_000)));
        assert!(ev.is_expired(Timestamp(1_001)));
    }

    proptest! {
        #[test]
        fn inventory_never_holds_zero(ops in proptest::collection::vec((0u8..3, 0u64..5, any::<bool>()), 0..40)) {
            let mut inv = Inventory::new();
            let names = ["a", "b", "c"];
            for (i, n, add) in ops {
                let item = names[i as usize];
                if add { inv.add(item, n); } else { inv.remove(item, n); }
                prop_assert!(inv.iter().all(|(_, c)| c > 0));
            }
        }
    }
}
