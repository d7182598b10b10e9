//! The recurring tick: regen, passive production, market, calendar, orders,
//! events and bankruptcies, in that order.

use crate::events;
use crate::outcome::{Notice, Rejection};
use crate::reducer::Step;
use crate::slots;
use crate::trade;
use chrono::{Datelike, Months};
use idle_core::{floor_credit, GameState, SlotKind};
use tracing::{info, warn};

pub(crate) fn tick(step: &mut Step, state: &mut GameState) -> Result<(), Rejection> {
    let now = step.now;
    if now <= state.last_tick {
        return Err(Rejection::StaleTick);
    }
    let delta = now.secs_since(state.last_tick);

    regen_energy(step, state, delta);
    run_production(step, state);
    update_market(step, state);
    advance_calendar(step, state);
    trade::refresh_orders(step, state);
    events::expire_and_roll(step, state);
    sweep_bankruptcies(step, state);

    state.stats.play_time_secs += delta;
    state.last_tick = now;
    Ok(())
}

fn regen_energy(step: &Step, state: &mut GameState, delta: f64) {
    let s = &step.catalog.settings;
    let energy = &mut state.resources.energy;
    if *energy < s.max_energy {
        *energy = (*energy + s.energy_regen_per_sec * delta).min(s.max_energy);
    }
}

/// At most one cycle per slot per tick, however long the tick was.
fn run_production(step: &mut Step, state: &mut GameState) {
    let catalog = step.catalog;
    for idx in 0..state.slots.len() {
        let slot = &state.slots[idx];
        let Some(template) = slot
            .catalog_entry_id
            .as_deref()
            .and_then(|id| catalog.template(id))
        else {
            continue;
        };
        if !(template.passive || slot.auto_enabled) {
            continue;
        }
        if !slots::is_ready(catalog, slot, step.now) {
            continue;
        }
        // unaffordable cycles wait for the next tick
        let _ = slots::try_produce(step, state, idx);
    }
}

fn update_market(step: &mut Step, state: &mut GameState) {
    let catalog = step.catalog;
    let market = &catalog.settings.market;
    if state.market.is_empty()
        || step.now.secs_since(state.last_market_update) < market.update_interval_secs
    {
        return;
    }
    let mut rng = idle_econ::draw_rng(&mut state.rng);
    for (item, entry) in state.market.iter_mut() {
        let Some(p) = catalog.producible(item) else {
            continue;
        };
        idle_econ::drift(entry, p.base_value, market, &mut rng, step.now);
    }
    state.last_market_update = step.now;
}

fn advance_calendar(step: &mut Step, state: &mut GameState) {
    let catalog = step.catalog;
    let Some(settings) = &catalog.settings.calendar else {
        return;
    };
    let Some(cal) = state.calendar.as_mut() else {
        return;
    };
    if settings.secs_per_month <= 0.0
        || step.now.secs_since(cal.month_started_at) < settings.secs_per_month
    {
        return;
    }
    let Some(next) = cal.date.checked_add_months(Months::new(1)) else {
        warn!(date = %cal.date, "calendar overflow");
        return;
    };
    let new_year = next.year() != cal.date.year();
    cal.date = next;
    cal.month_started_at = step.now;
    cal.months_elapsed += 1;
    step.notify(Notice::MonthAdvanced { date: next });

    if new_year && settings.annual_fee_pct > 0.0 {
        let fee = floor_credit(state.resources.money as f64 * settings.annual_fee_pct);
        state.resources.money -= fee.min(state.resources.money);
        state.stats.total_spent += fee;
        state.stats.bump("fees_paid", fee as f64);
        info!(fee, year = next.year(), "annual fee collected");
        step.notify(Notice::AnnualFee { amount: fee });
    }
}

/// Companies whose debt exceeds their valuation leave the portfolio.
fn sweep_bankruptcies(step: &mut Step, state: &mut GameState) {
    for slot in state
        .slots
        .iter_mut()
        .filter(|s| s.kind == SlotKind::Company && s.is_occupied())
    {
        if slot.metric("debt") <= slot.metric("valuation") {
            continue;
        }
        let template_id = slot.catalog_entry_id.clone().unwrap_or_default();
        warn!(slot = %slot.slot_id, company = %template_id, "company went bankrupt");
        slot.clear();
        state.stats.bump("bankruptcies", 1.0);
        step.notify(Notice::Bankrupt {
            slot_id: slot.slot_id.clone(),
            template_id,
        });
    }
}
