//! Slot registry operations: acquire, produce, feed, upgrade, unlock, sell.

use crate::outcome::{Notice, Rejection};
use crate::progression::grant_xp;
use crate::reducer::{earn, spend, Step};
use idle_core::{
    floor_credit, Catalog, GameState, Harvest, ItemStack, Slot, SlotKind, SlotTemplate, Timestamp,
};

/// Cooldown of the slot's occupant at the slot's level, in seconds.
pub fn cooldown_secs(catalog: &Catalog, slot: &Slot, template: &SlotTemplate) -> f64 {
    catalog
        .settings
        .upgrade
        .cooldown_secs(template.cooldown_secs, slot.level)
}

/// When the current cycle completes. `None` for empty slots.
pub fn ready_at(catalog: &Catalog, slot: &Slot) -> Option<Timestamp> {
    let template = catalog.template(slot.catalog_entry_id.as_deref()?)?;
    let started = slot.last_produced_at.unwrap_or(Timestamp::EPOCH);
    Some(started.plus_secs(cooldown_secs(catalog, slot, template)))
}

pub fn is_ready(catalog: &Catalog, slot: &Slot, now: Timestamp) -> bool {
    !slot.needs_feed && ready_at(catalog, slot).is_some_and(|at| now >= at)
}

fn index_of(state: &GameState, slot_id: &str) -> Result<usize, Rejection> {
    state
        .slots
        .iter()
        .position(|s| s.slot_id == slot_id)
        .ok_or_else(|| Rejection::UnknownSlot(slot_id.to_string()))
}

fn occupant<'c>(catalog: &'c Catalog, slot: &Slot) -> Result<&'c SlotTemplate, Rejection> {
    let id = slot
        .catalog_entry_id
        .as_deref()
        .ok_or_else(|| Rejection::SlotEmpty(slot.slot_id.clone()))?;
    catalog
        .template(id)
        .ok_or_else(|| Rejection::UnknownEntry(id.to_string()))
}

fn check_placeable(
    state: &GameState,
    slot: &Slot,
    template: &SlotTemplate,
) -> Result<(), Rejection> {
    if template.kind != slot.kind {
        return Err(Rejection::WrongKind {
            slot: slot.slot_id.clone(),
            kind: template.kind,
        });
    }
    if state.progression.level < template.unlock_level {
        return Err(Rejection::LevelTooLow {
            required: template.unlock_level,
        });
    }
    Ok(())
}

pub(crate) fn acquire(
    step: &mut Step,
    state: &mut GameState,
    slot_id: &str,
    catalog_id: &str,
) -> Result<(), Rejection> {
    let template = step
        .catalog
        .template(catalog_id)
        .ok_or_else(|| Rejection::UnknownEntry(catalog_id.to_string()))?;
    let idx = index_of(state, slot_id)?;
    let slot = &state.slots[idx];
    if !slot.unlocked {
        return Err(Rejection::SlotLocked(slot_id.to_string()));
    }
    if slot.is_occupied() {
        return Err(Rejection::SlotOccupied(slot_id.to_string()));
    }
    check_placeable(state, slot, template)?;
    spend(state, template.acquire_cost)?;
    state.slots[idx].occupy(template, step.now);
    Ok(())
}

/// Run one production cycle of slot `idx`. Validates everything before
/// touching the state, so a failure here never leaves partial effects.
pub(crate) fn try_produce(
    step: &mut Step,
    state: &mut GameState,
    idx: usize,
) -> Result<(), Rejection> {
    let catalog = step.catalog;
    let slot = &state.slots[idx];
    let template = occupant(catalog, slot)?;
    if slot.needs_feed {
        return Err(Rejection::NeedsFeed(slot.slot_id.clone()));
    }
    if !is_ready(catalog, slot, step.now) {
        return Err(Rejection::NotReady(slot.slot_id.clone()));
    }
    if state.resources.energy + 1e-9 < template.energy_cost {
        return Err(Rejection::InsufficientEnergy {
            need: template.energy_cost,
            have: state.resources.energy,
        });
    }
    if !state.inventory.has_all(&template.inputs) {
        return Err(Rejection::MissingItems);
    }

    let rule = &catalog.settings.upgrade;
    let level = slot.level;
    let items: Vec<ItemStack> = template
        .outputs
        .iter()
        .map(|o| {
            let n = floor_credit(rule.production(o.amount as f64, level));
            ItemStack::new(o.item.clone(), n.min(u32::MAX as u64) as u32)
        })
        .filter(|s| s.amount > 0)
        .collect();
    let money = floor_credit(rule.production(template.money_output, level));

    let before_total = state.inventory.total();
    if let Some(capacity) = catalog.settings.storage_capacity {
        let consumed: u64 = template.inputs.iter().map(|s| s.amount as u64).sum();
        let added: u64 = items.iter().map(|s| s.amount as u64).sum();
        let after = before_total.saturating_sub(consumed) + added;
        if after > capacity && after > before_total {
            return Err(Rejection::StorageFull { capacity });
        }
    }

    state.resources.try_spend_energy(template.energy_cost);
    state.inventory.remove_all(&template.inputs);
    for s in &items {
        state.inventory.add(&s.item, s.amount as u64);
    }
    earn(state, money);
    state.stats.total_produced += items.iter().map(|s| s.amount as u64).sum::<u64>();

    let slot = &mut state.slots[idx];
    let slot_id = slot.slot_id.clone();
    slot.last_produced_at = Some(step.now);
    if template.harvest == Harvest::Clear {
        slot.clear();
    } else if template.needs_feed() {
        slot.needs_feed = true;
    }
    step.notify(Notice::Produced {
        slot_id,
        items,
        money,
    });
    grant_xp(step, state, template.xp_reward);
    Ok(())
}

pub(crate) fn produce(step: &mut Step, state: &mut GameState, slot_id: &str) -> Result<(), Rejection> {
    let idx = index_of(state, slot_id)?;
    try_produce(step, state, idx)
}

pub(crate) fn feed(step: &mut Step, state: &mut GameState, slot_id: &str) -> Result<(), Rejection> {
    let idx = index_of(state, slot_id)?;
    let template = occupant(step.catalog, &state.slots[idx])?;
    if !state.slots[idx].needs_feed {
        return Err(Rejection::AlreadyFed(slot_id.to_string()));
    }
    if !state.inventory.remove_all(&template.feed) {
        return Err(Rejection::MissingItems);
    }
    let slot = &mut state.slots[idx];
    slot.needs_feed = false;
    slot.last_produced_at = Some(step.now);
    Ok(())
}

pub(crate) fn upgrade(step: &mut Step, state: &mut GameState, slot_id: &str) -> Result<(), Rejection> {
    let idx = index_of(state, slot_id)?;
    let rule = &step.catalog.settings.upgrade;
    let slot = &state.slots[idx];
    if !slot.unlocked {
        return Err(Rejection::SlotLocked(slot_id.to_string()));
    }
    if slot.level >= rule.max_level {
        return Err(Rejection::MaxLevel(slot_id.to_string()));
    }
    let cost = rule.upgrade_cost(slot.level);
    spend(state, cost)?;
    state.slots[idx].level += 1;
    Ok(())
}

pub(crate) fn unlock(
    step: &mut Step,
    state: &mut GameState,
    slot_id: &str,
    catalog_id: Option<&str>,
) -> Result<(), Rejection> {
    let spec = step
        .catalog
        .slot_spec(slot_id)
        .ok_or_else(|| Rejection::UnknownSlot(slot_id.to_string()))?;
    let idx = index_of(state, slot_id)?;
    if state.slots[idx].unlocked {
        return Err(Rejection::AlreadyUnlocked(slot_id.to_string()));
    }
    if state.progression.level < spec.unlock_level {
        return Err(Rejection::LevelTooLow {
            required: spec.unlock_level,
        });
    }
    let template = match catalog_id {
        Some(id) => {
            let t = step
                .catalog
                .template(id)
                .ok_or_else(|| Rejection::UnknownEntry(id.to_string()))?;
            check_placeable(state, &state.slots[idx], t)?;
            Some(t)
        }
        None => None,
    };
    spend(state, spec.unlock_cost)?;
    let slot = &mut state.slots[idx];
    slot.unlocked = true;
    if let Some(t) = template {
        slot.occupy(t, step.now);
    }
    step.notify(Notice::SlotUnlocked {
        slot_id: slot_id.to_string(),
    });
    Ok(())
}

pub(crate) fn toggle_auto(step: &mut Step, state: &mut GameState, slot_id: &str) -> Result<(), Rejection> {
    let idx = index_of(state, slot_id)?;
    let template = occupant(step.catalog, &state.slots[idx])?;
    if template.passive {
        return Err(Rejection::PassiveSlot(slot_id.to_string()));
    }
    let slot = &mut state.slots[idx];
    slot.auto_enabled = !slot.auto_enabled;
    Ok(())
}

/// Sale price of the slot's occupant before liabilities.
///
/// Companies sell at their `valuation` once held for `company_hold_secs`;
/// until then the price never exceeds the regular resale refund.
pub fn resale_value(catalog: &Catalog, slot: &Slot, template: &SlotTemplate, now: Timestamp) -> u64 {
    let settings = &catalog.settings;
    let refund = template.acquire_cost as f64 * settings.slot_resale_pct;
    let valuation = match slot.metrics.get("valuation") {
        Some(v) if template.kind == SlotKind::Company => *v,
        _ => return floor_credit(refund),
    };
    let held = slot
        .acquired_at
        .is_some_and(|at| now.secs_since(at) >= settings.company_hold_secs);
    if held {
        floor_credit(valuation)
    } else {
        floor_credit(valuation.min(refund))
    }
}

/// Outstanding `debt` on the occupant, rounded up to whole coins.
pub fn liability(slot: &Slot) -> u64 {
    let debt = slot.metric("debt");
    if debt.is_finite() && debt > 0.0 {
        debt.ceil() as u64
    } else {
        0
    }
}

pub(crate) fn sell_slot(step: &mut Step, state: &mut GameState, slot_id: &str) -> Result<(), Rejection> {
    let idx = index_of(state, slot_id)?;
    let template = occupant(step.catalog, &state.slots[idx])?;
    let price = resale_value(step.catalog, &state.slots[idx], template, step.now);
    let debt = liability(&state.slots[idx]);
    // debt is settled out of the sale, and out of pocket when it exceeds the price
    if debt > price {
        spend(state, debt - price)?;
    } else {
        earn(state, price - debt);
    }
    state.slots[idx].clear();
    step.notify(Notice::SlotSold {
        slot_id: slot_id.to_string(),
        refund: price.saturating_sub(debt),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::action::Action;
    use crate::outcome::{Notice, Rejection};
    use crate::reducer::{apply, fixtures, new_game};
    use idle_core::{GameState, Timestamp};
    use proptest::prelude::*;

    fn game() -> (idle_core::Catalog, GameState) {
        let c = fixtures::catalog();
        let s = new_game(&c, Timestamp(0));
        (c, s)
    }

    fn produce(slot: &str) -> Action {
        Action::Produce {
            slot_id: slot.to_string(),
        }
    }

    #[test]
    fn produce_respects_cooldown_boundary() {
        let (c, s) = game();
        let early = apply(&c, &s, Timestamp(9_999), &produce("g1"));
        assert_eq!(early.rejected, Some(Rejection::NotReady("g1".into())));
        assert_eq!(early.state, s);

        let on_time = apply(&c, &s, Timestamp(10_000), &produce("g1"));
        assert!(on_time.is_applied());
        assert_eq!(on_time.state.inventory.count("fire"), 1);
        assert_eq!(on_time.state.resources.energy, 95.0);
        assert_eq!(on_time.state.slots[0].last_produced_at, Some(Timestamp(10_000)));
    }

    #[test]
    fn produce_rejects_without_energy() {
        let (c, mut s) = game();
        s.resources.energy = 4.0;
        let t = apply(&c, &s, Timestamp(20_000), &produce("g1"));
        assert!(matches!(t.rejected, Some(Rejection::InsufficientEnergy { .. })));
        assert_eq!(t.state, s);
    }

    #[test]
    fn storage_capacity_blocks_production() {
        let (mut c, mut s) = game();
        c.settings.storage_capacity = Some(3);
        s.inventory.add("water", 3);
        let t = apply(&c, &s, Timestamp(20_000), &produce("g1"));
        assert_eq!(t.rejected, Some(Rejection::StorageFull { capacity: 3 }));
    }

    #[test]
    fn unlock_with_insufficient_funds_is_noop() {
        let (c, mut s) = game();
        s.resources.money = 40;
        let t = apply(
            &c,
            &s,
            Timestamp(1),
            &Action::UnlockSlot {
                slot_id: "g2".into(),
                catalog_id: None,
            },
        );
        assert_eq!(
            t.rejected,
            Some(Rejection::InsufficientFunds { need: 50, have: 40 })
        );
        assert_eq!(t.state.resources.money, 40);
        assert!(!t.state.slot("g2").unwrap().unlocked);
    }

    #[test]
    fn unlock_with_template_occupies_slot() {
        let (c, s) = game();
        let t = apply(
            &c,
            &s,
            Timestamp(1),
            &Action::UnlockSlot {
                slot_id: "g2".into(),
                catalog_id: Some("fire-gen".into()),
            },
        );
        assert!(t.is_applied());
        let slot = t.state.slot("g2").unwrap();
        assert!(slot.unlocked);
        assert_eq!(slot.catalog_entry_id.as_deref(), Some("fire-gen"));
        assert_eq!(t.state.resources.money, 50);
    }

    #[test]
    fn level_gated_slot_needs_level() {
        let (c, s) = game();
        let t = apply(
            &c,
            &s,
            Timestamp(1),
            &Action::UnlockSlot {
                slot_id: "g3".into(),
                catalog_id: None,
            },
        );
        assert_eq!(t.rejected, Some(Rejection::LevelTooLow { required: 3 }));
    }

    #[test]
    fn field_clears_after_harvest() {
        let (c, s) = game();
        let planted = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::AcquireSlotItem {
                slot_id: "f1".into(),
                catalog_id: "wheat".into(),
            },
        );
        assert_eq!(planted.state.resources.money, 95);
        let harvested = apply(&c, &planted.state, Timestamp(60_000), &produce("f1"));
        assert!(harvested.is_applied());
        assert_eq!(harvested.state.inventory.count("wheat-crop"), 2);
        assert!(!harvested.state.slot("f1").unwrap().is_occupied());
    }

    #[test]
    fn acquire_rejects_kind_mismatch_and_occupied() {
        let (c, s) = game();
        let wrong = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::AcquireSlotItem {
                slot_id: "f1".into(),
                catalog_id: "chicken".into(),
            },
        );
        assert!(matches!(wrong.rejected, Some(Rejection::WrongKind { .. })));
        let occupied = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::AcquireSlotItem {
                slot_id: "g1".into(),
                catalog_id: "fire-gen".into(),
            },
        );
        assert_eq!(occupied.rejected, Some(Rejection::SlotOccupied("g1".into())));
    }

    #[test]
    fn animal_cycle_requires_feed() {
        let (c, mut s) = game();
        s.inventory.add("wheat-crop", 2);
        let bought = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::AcquireSlotItem {
                slot_id: "p1".into(),
                catalog_id: "chicken".into(),
            },
        )
        .state;
        assert!(bought.slot("p1").unwrap().needs_feed);
        let hungry = apply(&c, &bought, Timestamp(60_000), &produce("p1"));
        assert_eq!(hungry.rejected, Some(Rejection::NeedsFeed("p1".into())));

        let fed = apply(
            &c,
            &bought,
            Timestamp(1_000),
            &Action::Feed {
                slot_id: "p1".into(),
            },
        )
        .state;
        assert_eq!(fed.inventory.count("wheat-crop"), 1);
        let early = apply(&c, &fed, Timestamp(30_999), &produce("p1"));
        assert!(!early.is_applied());
        let laid = apply(&c, &fed, Timestamp(31_000), &produce("p1")).state;
        assert_eq!(laid.inventory.count("egg"), 1);
        assert!(laid.slot("p1").unwrap().needs_feed);
    }

    #[test]
    fn upgrade_scales_cost_and_output() {
        let (c, mut s) = game();
        s.resources.money = 1_000;
        let once = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::UpgradeSlot {
                slot_id: "g1".into(),
            },
        )
        .state;
        assert_eq!(once.resources.money, 950);
        assert_eq!(once.slot("g1").unwrap().level, 2);
        let twice = apply(
            &c,
            &once,
            Timestamp(0),
            &Action::UpgradeSlot {
                slot_id: "g1".into(),
            },
        )
        .state;
        assert_eq!(twice.resources.money, 950 - 75);
        // level 2 cooldown is 10 * 0.9 = 9s
        let produced = apply(&c, &once, Timestamp(9_000), &produce("g1"));
        assert!(produced.is_applied());
        // floor(1 * 1.25) = 1
        assert_eq!(produced.state.inventory.count("fire"), 1);
    }

    #[test]
    fn upgrade_stops_at_max_level() {
        let (c, mut s) = game();
        s.resources.money = 1_000_000;
        s.slots[0].level = c.settings.upgrade.max_level;
        let t = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::UpgradeSlot {
                slot_id: "g1".into(),
            },
        );
        assert_eq!(t.rejected, Some(Rejection::MaxLevel("g1".into())));
    }

    #[test]
    fn toggle_auto_flips_and_refuses_passive() {
        let (c, mut s) = game();
        let on = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::ToggleAuto {
                slot_id: "g1".into(),
            },
        )
        .state;
        assert!(on.slot("g1").unwrap().auto_enabled);

        s.resources.money = 500;
        let owned = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::AcquireSlotItem {
                slot_id: "c1".into(),
                catalog_id: "startup".into(),
            },
        )
        .state;
        let passive = apply(
            &c,
            &owned,
            Timestamp(0),
            &Action::ToggleAuto {
                slot_id: "c1".into(),
            },
        );
        assert_eq!(passive.rejected, Some(Rejection::PassiveSlot("c1".into())));
    }

    fn owned_startup() -> (idle_core::Catalog, GameState) {
        let (c, mut s) = game();
        s.resources.money = 100;
        let owned = apply(
            &c,
            &s,
            Timestamp(0),
            &Action::AcquireSlotItem {
                slot_id: "c1".into(),
                catalog_id: "startup".into(),
            },
        )
        .state;
        assert_eq!(owned.resources.money, 0);
        (c, owned)
    }

    fn sell_c1() -> Action {
        Action::SellSlot {
            slot_id: "c1".into(),
        }
    }

    #[test]
    fn fresh_company_sells_at_resale_refund() {
        let (c, owned) = owned_startup();
        let sold = apply(&c, &owned, Timestamp(0), &sell_c1()).state;
        // 100 * 0.5, not the 400 valuation
        assert_eq!(sold.resources.money, 50);
        assert!(!sold.slot("c1").unwrap().is_occupied());
        assert_eq!(sold.slot("c1").unwrap().acquired_at, None);
    }

    #[test]
    fn held_company_sells_at_valuation() {
        let (c, owned) = owned_startup();
        let early = apply(&c, &owned, Timestamp(299_999), &sell_c1()).state;
        assert_eq!(early.resources.money, 50);
        let sold = apply(&c, &owned, Timestamp(300_000), &sell_c1()).state;
        assert_eq!(sold.resources.money, 400);
    }

    #[test]
    fn sale_settles_company_debt() {
        let (c, mut owned) = owned_startup();
        owned
            .slot_mut("c1")
            .unwrap()
            .metrics
            .insert("debt".into(), 350.5);
        let sold = apply(&c, &owned, Timestamp(300_000), &sell_c1());
        assert_eq!(sold.state.resources.money, 400 - 351);
        assert!(sold.notices.contains(&Notice::SlotSold {
            slot_id: "c1".into(),
            refund: 49,
        }));

        owned
            .slot_mut("c1")
            .unwrap()
            .metrics
            .insert("debt".into(), 460.0);
        let short = apply(&c, &owned, Timestamp(300_000), &sell_c1());
        assert_eq!(
            short.rejected,
            Some(Rejection::InsufficientFunds { need: 60, have: 0 })
        );
        assert_eq!(short.state, owned);

        owned.resources.money = 100;
        let paid = apply(&c, &owned, Timestamp(300_000), &sell_c1()).state;
        assert_eq!(paid.resources.money, 40);
        assert!(!paid.slot("c1").unwrap().is_occupied());
    }

    proptest! {
        #[test]
        fn produce_succeeds_iff_cooldown_elapsed(offset_ms in 0i64..30_000) {
            let (c, s) = game();
            let t = apply(&c, &s, Timestamp(offset_ms), &produce("g1"));
            prop_assert_eq!(t.is_applied(), offset_ms >= 10_000);
        }
    }
}
