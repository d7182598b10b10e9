//! The action processor: the only place game state changes.
//!
//! [`apply`] works on a scratch copy of the input state. Handlers may mutate
//! that copy freely and bail out with a [`Rejection`]; the copy is then
//! thrown away and the input state is returned untouched, so a failed
//! precondition never leaves partial effects behind.

use crate::action::Action;
use crate::outcome::{Notice, Rejection, Transition};
use crate::{clock, crafting, events, slots, strategy, trade};
use idle_core::{Catalog, GameState, Timestamp};
use tracing::debug;

/// Per-call context shared by the handlers.
pub(crate) struct Step<'a> {
    pub catalog: &'a Catalog,
    pub now: Timestamp,
    pub notices: Vec<Notice>,
}

impl<'a> Step<'a> {
    pub fn new(catalog: &'a Catalog, now: Timestamp) -> Self {
        Self {
            catalog,
            now,
            notices: Vec::new(),
        }
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// Fresh game for `catalog`, with market entries for every priced item.
pub fn new_game(catalog: &Catalog, now: Timestamp) -> GameState {
    let mut state = GameState::from_catalog(catalog, now);
    for p in catalog.producibles.iter().filter(|p| p.base_value > 0.0) {
        state.market.insert(
            p.id.clone(),
            idle_econ::initial_entry(p.base_value, &catalog.settings.market, now),
        );
    }
    state
}

/// Apply one action at wall-clock time `now`.
pub fn apply(catalog: &Catalog, state: &GameState, now: Timestamp, action: &Action) -> Transition {
    let mut next = state.clone();
    let mut step = Step::new(catalog, now);
    let result = dispatch(&mut step, &mut next, action);
    match result {
        Ok(()) => Transition {
            state: next,
            notices: step.notices,
            rejected: None,
        },
        Err(rejection) => {
            if !action.is_tick() {
                debug!(?action, %rejection, "action rejected");
            }
            Transition {
                state: state.clone(),
                notices: Vec::new(),
                rejected: Some(rejection),
            }
        }
    }
}

fn dispatch(step: &mut Step, state: &mut GameState, action: &Action) -> Result<(), Rejection> {
    match action {
        Action::Tick => clock::tick(step, state),
        Action::AcquireSlotItem {
            slot_id,
            catalog_id,
        } => slots::acquire(step, state, slot_id, catalog_id),
        Action::Produce { slot_id } => slots::produce(step, state, slot_id),
        Action::Feed { slot_id } => slots::feed(step, state, slot_id),
        Action::Craft { input } => crafting::craft(step, state, input),
        Action::Sell { item_id, amount } => trade::sell(step, state, item_id, *amount),
        Action::SellSlot { slot_id } => slots::sell_slot(step, state, slot_id),
        Action::UpgradeSlot { slot_id } => slots::upgrade(step, state, slot_id),
        Action::UnlockSlot {
            slot_id,
            catalog_id,
        } => slots::unlock(step, state, slot_id, catalog_id.as_deref()),
        Action::ToggleAuto { slot_id } => slots::toggle_auto(step, state, slot_id),
        Action::ExecuteStrategy {
            slot_id,
            action_id,
            magnitude,
        } => strategy::execute(step, state, slot_id, action_id, *magnitude),
        Action::HandleEventChoice { choice_index } => events::choose(step, state, *choice_index),
        Action::DismissEvent => events::dismiss(step, state),
        Action::FulfillOrder { order_id } => trade::fulfill_order(step, state, order_id),
        Action::MarkSaved => {
            state.last_saved = Some(step.now);
            Ok(())
        }
        Action::Reset => {
            *state = new_game(step.catalog, step.now);
            Ok(())
        }
    }
}

/// Deduct money or reject with the shortfall.
pub(crate) fn spend(state: &mut GameState, cost: u64) -> Result<(), Rejection> {
    let have = state.resources.money;
    if !state.resources.try_spend(cost) {
        return Err(Rejection::InsufficientFunds { need: cost, have });
    }
    state.stats.total_spent += cost;
    Ok(())
}

pub(crate) fn earn(state: &mut GameState, amount: u64) {
    state.resources.credit(amount);
    state.stats.total_earned += amount;
}

/// Reject when the inventory grew past the configured capacity.
pub(crate) fn ensure_storage(
    catalog: &Catalog,
    before_total: u64,
    state: &GameState,
) -> Result<(), Rejection> {
    if let Some(capacity) = catalog.settings.storage_capacity {
        let after = state.inventory.total();
        if after > capacity && after > before_total {
            return Err(Rejection::StorageFull { capacity });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small catalogs shared by the handler tests.

    use idle_core::*;
    use std::collections::BTreeMap;

    pub fn producible(id: &str, base_value: f64) -> Producible {
        Producible {
            id: id.to_string(),
            name: id.to_string(),
            emoji: String::new(),
            tier: 1,
            base_value,
        }
    }

    pub fn template(id: &str, kind: SlotKind, cooldown_secs: f64) -> SlotTemplate {
        SlotTemplate {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            emoji: String::new(),
            acquire_cost: 0,
            unlock_level: 1,
            cooldown_secs,
            outputs: vec![],
            money_output: 0.0,
            energy_cost: 0.0,
            inputs: vec![],
            feed: vec![],
            harvest: Harvest::Repeat,
            passive: false,
            xp_reward: 0,
            metrics: BTreeMap::new(),
        }
    }

    pub fn slot(id: &str, kind: SlotKind) -> SlotSpec {
        SlotSpec {
            id: id.to_string(),
            kind,
            unlock_level: 1,
            unlock_cost: 0,
            occupant: None,
        }
    }

    /// fire + water -> steam, a fire generator, a crop field, a chicken pen,
    /// a locked generator slot and one company slot.
    pub fn catalog() -> Catalog {
        let mut fire_gen = template("fire-gen", SlotKind::Generator, 10.0);
        fire_gen.outputs = vec![ItemStack::new("fire", 1)];
        fire_gen.energy_cost = 5.0;
        fire_gen.acquire_cost = 30;
        fire_gen.xp_reward = 5;

        let mut wheat = template("wheat", SlotKind::Field, 60.0);
        wheat.outputs = vec![ItemStack::new("wheat-crop", 2)];
        wheat.harvest = Harvest::Clear;
        wheat.acquire_cost = 5;

        let mut chicken = template("chicken", SlotKind::Animal, 30.0);
        chicken.outputs = vec![ItemStack::new("egg", 1)];
        chicken.feed = vec![ItemStack::new("wheat-crop", 1)];
        chicken.acquire_cost = 20;

        let mut startup = template("startup", SlotKind::Company, 30.0);
        startup.acquire_cost = 100;
        startup.passive = true;
        startup.money_output = 10.0;
        startup.metrics = [
            ("morale".to_string(), 70.0),
            ("brand".to_string(), 50.0),
            ("debt".to_string(), 0.0),
            ("valuation".to_string(), 400.0),
        ]
        .into_iter()
        .collect();

        let mut locked = slot("g2", SlotKind::Generator);
        locked.unlock_cost = 50;
        let mut gated = slot("g3", SlotKind::Generator);
        gated.unlock_level = 3;

        Catalog {
            game: "fixture".to_string(),
            version: 1,
            producibles: vec![
                producible("fire", 4.0),
                producible("water", 4.0),
                producible("steam", 10.0),
                producible("wheat-crop", 3.0),
                producible("egg", 6.0),
            ],
            recipes: vec![Recipe {
                id: "steam-recipe".to_string(),
                inputs: vec![ItemStack::new("fire", 1), ItemStack::new("water", 1)],
                output: ItemStack::new("steam", 1),
                energy_cost: 2.0,
                xp_reward: 3,
            }],
            templates: vec![fire_gen, wheat, chicken, startup],
            slots: vec![
                SlotSpec {
                    occupant: Some("fire-gen".to_string()),
                    ..slot("g1", SlotKind::Generator)
                },
                locked,
                gated,
                slot("f1", SlotKind::Field),
                slot("p1", SlotKind::Animal),
                slot("c1", SlotKind::Company),
            ],
            strategies: vec![StrategyAction {
                id: "layoffs".to_string(),
                name: "Layoffs".to_string(),
                min_magnitude: 1.0,
                max_magnitude: 50.0,
                capital_per_unit: 4.0,
                reputation_per_unit: -0.5,
                effects: vec![MetricChange {
                    metric: "morale".to_string(),
                    per_unit: -3.0,
                }],
                counter: Some("layoffs".to_string()),
            }],
            events: vec![],
            orders: vec![],
            settings: Settings {
                start_money: 100,
                ..Settings::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::CraftInput;
    use idle_core::validate_catalog;
    use proptest::prelude::*;

    #[test]
    fn fixture_catalog_is_valid() {
        validate_catalog(&fixtures::catalog()).unwrap();
    }

    #[test]
    fn new_game_prices_every_item() {
        let c = fixtures::catalog();
        let s = new_game(&c, Timestamp(0));
        assert_eq!(s.market.len(), c.producibles.len());
        assert_eq!(s.market["steam"].current_price, 15);
    }

    #[test]
    fn rejected_action_returns_input_state() {
        let c = fixtures::catalog();
        let s = new_game(&c, Timestamp(0));
        let t = apply(
            &c,
            &s,
            Timestamp(1),
            &Action::Craft {
                input: CraftInput::Items(vec!["fire".into(), "water".into()]),
            },
        );
        assert_eq!(t.rejected, Some(Rejection::MissingItems));
        assert_eq!(t.state, s);
        assert!(t.notices.is_empty());
    }

    #[test]
    fn mark_saved_records_timestamp() {
        let c = fixtures::catalog();
        let s = new_game(&c, Timestamp(0));
        let t = apply(&c, &s, Timestamp(5_000), &Action::MarkSaved);
        assert_eq!(t.state.last_saved, Some(Timestamp(5_000)));
    }

    #[test]
    fn reset_rebuilds_default() {
        let c = fixtures::catalog();
        let mut s = new_game(&c, Timestamp(0));
        s.resources.money = 9_999;
        s.discovered.insert("steam-recipe".into());
        let t = apply(&c, &s, Timestamp(10), &Action::Reset);
        assert_eq!(t.state, new_game(&c, Timestamp(10)));
    }

    fn any_action() -> impl Strategy<Value = Action> {
        let slot = prop::sample::select(vec!["g1", "g2", "g3", "f1", "p1", "c1", "nope"]);
        let item = prop::sample::select(vec!["fire", "water", "steam", "wheat-crop", "egg"]);
        let template = prop::sample::select(vec!["fire-gen", "wheat", "chicken", "startup"]);
        prop_oneof![
            Just(Action::Tick),
            slot.clone().prop_map(|s| Action::Produce { slot_id: s.into() }),
            slot.clone().prop_map(|s| Action::Feed { slot_id: s.into() }),
            slot.clone().prop_map(|s| Action::UpgradeSlot { slot_id: s.into() }),
            slot.clone().prop_map(|s| Action::ToggleAuto { slot_id: s.into() }),
            slot.clone().prop_map(|s| Action::SellSlot { slot_id: s.into() }),
            (slot.clone(), template).prop_map(|(s, t)| Action::AcquireSlotItem {
                slot_id: s.into(),
                catalog_id: t.into(),
            }),
            (item.clone(), 0u64..4).prop_map(|(i, amount)| Action::Sell {
                item_id: i.into(),
                amount,
            }),
            prop::collection::vec(item, 1..4).prop_map(Action::craft_items),
            (slot, 0.0f64..60.0).prop_map(|(s, magnitude)| Action::ExecuteStrategy {
                slot_id: s.into(),
                action_id: "layoffs".into(),
                magnitude,
            }),
        ]
    }

    proptest! {
        #[test]
        fn rejections_are_noops_and_discovery_is_monotonic(
            actions in proptest::collection::vec((any_action(), 0i64..20_000), 1..60)
        ) {
            let c = fixtures::catalog();
            let mut s = new_game(&c, Timestamp(0));
            s.inventory.add("fire", 3);
            s.inventory.add("water", 3);
            let mut now = Timestamp(0);
            for (action, dt) in actions {
                now = Timestamp(now.millis() + dt);
                let t = apply(&c, &s, now, &action);
                if t.rejected.is_some() {
                    prop_assert_eq!(&t.state, &s);
                    prop_assert!(t.notices.is_empty());
                }
                prop_assert!(t.state.discovered.len() >= s.discovered.len());
                prop_assert!(t.state.resources.energy >= 0.0);
                prop_assert!(t.state.inventory.iter().all(|(_, n)| n > 0));
                s = t.state;
            }
        }
    }
}
