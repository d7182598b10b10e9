//! Random events: trigger rolls, conditions, and declarative effects.

use crate::outcome::{Notice, Rejection};
use crate::reducer::Step;
use idle_core::{
    ActiveEvent, Catalog, Condition, Effect, EffectTarget, EventTemplate, GameState, Settings,
    SlotKind, Subject, Timestamp,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

/// What to do when an effect would take capital below zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Overdraft {
    Reject,
    Saturate,
}

/// Write `value` into `metrics`, clamping configured percentage metrics to [0, 100].
pub(crate) fn set_metric(
    settings: &Settings,
    metrics: &mut BTreeMap<String, f64>,
    metric: &str,
    value: f64,
) {
    let value = if settings.is_bounded_metric(metric) {
        value.clamp(0.0, 100.0)
    } else {
        value
    };
    metrics.insert(metric.to_string(), value);
}

fn subject_value(state: &GameState, condition: &Condition) -> f64 {
    match condition.subject {
        Subject::PortfolioSize => state.portfolio_size() as f64,
        Subject::Money => state.resources.money as f64,
        Subject::Reputation => state.resources.reputation,
        Subject::Level => state.progression.level as f64,
        Subject::Counter => condition
            .counter
            .as_deref()
            .map_or(0.0, |name| state.stats.counter(name)),
    }
}

pub fn conditions_hold(state: &GameState, event: &EventTemplate) -> bool {
    event
        .conditions
        .iter()
        .all(|c| c.cmp.holds(subject_value(state, c), c.value))
}

/// Apply `effects` to the fund and the targeted slots.
pub(crate) fn apply_effects(
    catalog: &Catalog,
    state: &mut GameState,
    target_slot: Option<&str>,
    effects: &[Effect],
    overdraft: Overdraft,
) -> Result<(), Rejection> {
    for effect in effects {
        match effect.target {
            EffectTarget::Fund => apply_fund_effect(state, effect, overdraft)?,
            EffectTarget::AffectedEntity => {
                let Some(slot) = target_slot.and_then(|id| state.slot_mut(id)) else {
                    continue;
                };
                if !slot.is_occupied() {
                    continue;
                }
                let next = effect.modifier.apply(slot.metric(&effect.metric), effect.value);
                set_metric(&catalog.settings, &mut slot.metrics, &effect.metric, next);
            }
            EffectTarget::AllEntities => {
                for slot in state
                    .slots
                    .iter_mut()
                    .filter(|s| s.kind == SlotKind::Company && s.is_occupied())
                {
                    let next = effect.modifier.apply(slot.metric(&effect.metric), effect.value);
                    set_metric(&catalog.settings, &mut slot.metrics, &effect.metric, next);
                }
            }
        }
    }
    Ok(())
}

fn apply_fund_effect(
    state: &mut GameState,
    effect: &Effect,
    overdraft: Overdraft,
) -> Result<(), Rejection> {
    match effect.metric.as_str() {
        "capital" => {
            let have = state.resources.money;
            let next = effect.modifier.apply(have as f64, effect.value);
            if next < 0.0 && overdraft == Overdraft::Reject {
                return Err(Rejection::InsufficientFunds {
                    need: (have as f64 - next).floor() as u64,
                    have,
                });
            }
            let next = if next.is_finite() { next.max(0.0).floor() as u64 } else { have };
            if next >= have {
                state.stats.total_earned += next - have;
            } else {
                state.stats.total_spent += have - next;
            }
            state.resources.money = next;
        }
        "reputation" => {
            state.resources.reputation =
                effect.modifier.apply(state.resources.reputation, effect.value);
        }
        other => {
            let current = state.stats.counter(other);
            let next = effect.modifier.apply(current, effect.value);
            if next > current {
                state.stats.bump(other, next - current);
            }
        }
    }
    Ok(())
}

/// Tick step: resolve an expired event with its default effects, otherwise
/// roll for a new one when none is active.
pub(crate) fn expire_and_roll(step: &mut Step, state: &mut GameState) {
    let catalog = step.catalog;
    if let Some(active) = &state.active_event {
        if active.is_expired(step.now) {
            let active = active.clone();
            if let Some(event) = catalog.event(&active.event_id) {
                // saturating effects cannot fail
                let _ = apply_effects(
                    catalog,
                    state,
                    active.target_slot.as_deref(),
                    &event.effects,
                    Overdraft::Saturate,
                );
            }
            state.active_event = None;
            info!(event = %active.event_id, "event expired");
            step.notify(Notice::EventResolved {
                event_id: active.event_id,
            });
        }
        return;
    }
    if catalog.events.is_empty() {
        return;
    }

    let mut rng = idle_econ::draw_rng(&mut state.rng);
    for event in &catalog.events {
        if rng.gen::<f64>() >= event.probability || !conditions_hold(state, event) {
            continue;
        }
        let target_slot = if event.targets_entity {
            let companies: Vec<&str> = state
                .slots
                .iter()
                .filter(|s| s.kind == SlotKind::Company && s.is_occupied())
                .map(|s| s.slot_id.as_str())
                .collect();
            match companies.choose(&mut rng) {
                Some(id) => Some(id.to_string()),
                None => continue,
            }
        } else {
            None
        };
        info!(event = %event.id, target = ?target_slot, "event started");
        state.active_event = Some(ActiveEvent {
            event_id: event.id.clone(),
            target_slot: target_slot.clone(),
            started_at: step.now,
            expires_at: event.expires_after_secs.map(|s| step.now.plus_secs(s)),
        });
        step.notify(Notice::EventStarted {
            event_id: event.id.clone(),
            target_slot,
        });
        break;
    }
}

fn active_template<'c>(
    catalog: &'c Catalog,
    state: &GameState,
    now: Timestamp,
) -> Result<(&'c EventTemplate, Option<String>), Rejection> {
    let active = state.active_event.as_ref().ok_or(Rejection::NoActiveEvent)?;
    if active.is_expired(now) {
        return Err(Rejection::EventExpired);
    }
    let event = catalog
        .event(&active.event_id)
        .ok_or_else(|| Rejection::UnknownEntry(active.event_id.clone()))?;
    Ok((event, active.target_slot.clone()))
}

pub(crate) fn choose(step: &mut Step, state: &mut GameState, index: usize) -> Result<(), Rejection> {
    let catalog = step.catalog;
    let (event, target) = active_template(catalog, state, step.now)?;
    let choice = event
        .choices
        .get(index)
        .ok_or(Rejection::InvalidChoice(index))?;
    apply_effects(catalog, state, target.as_deref(), &choice.effects, Overdraft::Reject)?;
    state.resources.reputation += choice.reputation_delta;
    state.active_event = None;
    step.notify(Notice::EventResolved {
        event_id: event.id.clone(),
    });
    Ok(())
}

pub(crate) fn dismiss(step: &mut Step, state: &mut GameState) -> Result<(), Rejection> {
    let catalog = step.catalog;
    let (event, target) = active_template(catalog, state, step.now)?;
    if !event.choices.is_empty() {
        return Err(Rejection::ChoiceRequired);
    }
    apply_effects(catalog, state, target.as_deref(), &event.effects, Overdraft::Saturate)?;
    state.active_event = None;
    step.notify(Notice::EventResolved {
        event_id: event.id.clone(),
    });
    Ok(())
}
