//! Management actions on portfolio companies (debt, dividends, layoffs, asset sales).

use crate::events::set_metric;
use crate::outcome::{Notice, Rejection};
use crate::reducer::{earn, spend, Step};
use idle_core::{floor_credit, GameState, SlotKind};
use tracing::debug;

pub(crate) fn execute(
    step: &mut Step,
    state: &mut GameState,
    slot_id: &str,
    action_id: &str,
    magnitude: f64,
) -> Result<(), Rejection> {
    let catalog = step.catalog;
    let action = catalog
        .strategy(action_id)
        .ok_or_else(|| Rejection::UnknownEntry(action_id.to_string()))?;
    if !magnitude.is_finite()
        || magnitude < action.min_magnitude
        || magnitude > action.max_magnitude
    {
        return Err(Rejection::MagnitudeOutOfRange(magnitude));
    }
    let idx = state
        .slots
        .iter()
        .position(|s| s.slot_id == slot_id)
        .ok_or_else(|| Rejection::UnknownSlot(slot_id.to_string()))?;
    let slot = &state.slots[idx];
    if slot.kind != SlotKind::Company {
        return Err(Rejection::WrongKind {
            slot: slot_id.to_string(),
            kind: slot.kind,
        });
    }
    if !slot.is_occupied() {
        return Err(Rejection::SlotEmpty(slot_id.to_string()));
    }

    let capital = action.capital_per_unit * magnitude;
    let capital_signed = if capital >= 0.0 {
        let credit = floor_credit(capital);
        earn(state, credit);
        state.stats.bump("extracted", credit as f64);
        credit as i64
    } else {
        let charge = floor_credit(-capital);
        spend(state, charge)?;
        -(charge as i64)
    };
    state.resources.reputation += action.reputation_per_unit * magnitude;

    let settings = &catalog.settings;
    let slot = &mut state.slots[idx];
    for change in &action.effects {
        let next = slot.metric(&change.metric) + change.per_unit * magnitude;
        set_metric(settings, &mut slot.metrics, &change.metric, next);
    }
    if let Some(counter) = &action.counter {
        state.stats.bump(counter, magnitude);
    }
    debug!(slot = slot_id, action = action_id, magnitude, "strategy executed");
    step.notify(Notice::StrategyExecuted {
        slot_id: slot_id.to_string(),
        action_id: action_id.to_string(),
        capital: capital_signed,
    });
    Ok(())
}
