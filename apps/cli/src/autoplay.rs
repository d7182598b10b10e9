//! Greedy scripted player used by the headless runner.

use idle_core::{GameState, SlotKind};
use idle_engine::{Action, ManualClock, Notice, Session, SlotStatus};
use persistence::BlobStore;
use std::collections::BTreeMap;
use tracing::debug;

/// Steps between strategy executions on company slots.
const STRATEGY_EVERY: u64 = 240;
/// Units of each item kept back from sale.
const KEEP: u64 = 12;

#[derive(Debug, Default)]
pub struct Tally {
    pub steps: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub notices: BTreeMap<&'static str, u64>,
}

impl Tally {
    fn record(&mut self, notices: &[Notice]) {
        for n in notices {
            *self.notices.entry(notice_name(n)).or_default() += 1;
        }
    }
}

fn notice_name(n: &Notice) -> &'static str {
    match n {
        Notice::Crafted { .. } => "crafted",
        Notice::Produced { .. } => "produced",
        Notice::Sold { .. } => "sold",
        Notice::SlotSold { .. } => "slot_sold",
        Notice::SlotUnlocked { .. } => "slot_unlocked",
        Notice::LevelUp { .. } => "level_up",
        Notice::StrategyExecuted { .. } => "strategy",
        Notice::EventStarted { .. } => "event_started",
        Notice::EventResolved { .. } => "event_resolved",
        Notice::MonthAdvanced { .. } => "month",
        Notice::AnnualFee { .. } => "annual_fee",
        Notice::Bankrupt { .. } => "bankrupt",
        Notice::OrderPosted { .. } => "order_posted",
        Notice::OrderExpired { .. } => "order_expired",
        Notice::OrderFulfilled { .. } => "order_fulfilled",
    }
}

pub struct AutoPlayer<'a, S: BlobStore> {
    session: &'a mut Session<S, ManualClock>,
    tally: Tally,
}

impl<'a, S: BlobStore> AutoPlayer<'a, S> {
    pub fn new(session: &'a mut Session<S, ManualClock>) -> Self {
        Self {
            session,
            tally: Tally::default(),
        }
    }

    /// Advance the clock by `tick_ms` per step and act after every tick.
    pub fn run(mut self, steps: u64, tick_ms: i64) -> Tally {
        for _ in 0..steps {
            self.session.clock().advance_ms(tick_ms);
            let notices = self.session.tick();
            self.tally.record(&notices);
            self.act();
            self.tally.steps += 1;
        }
        self.tally
    }

    fn try_action(&mut self, action: Action) -> bool {
        match self.session.dispatch(action) {
            Ok(notices) => {
                self.tally.accepted += 1;
                self.tally.record(&notices);
                true
            }
            Err(reason) => {
                debug!(%reason, "autoplayer action rejected");
                self.tally.rejected += 1;
                false
            }
        }
    }

    fn act(&mut self) {
        self.resolve_event();
        self.tend_slots();
        self.craft_one();
        self.fill_orders();
        self.sell_surplus();
        if self.tally.steps % STRATEGY_EVERY == 0 {
            self.run_strategy();
        }
    }

    fn resolve_event(&mut self) {
        let Some(active) = &self.session.state().active_event else {
            return;
        };
        let n = self
            .session
            .catalog()
            .event(&active.event_id)
            .map_or(0, |e| e.choices.len());
        if n > 0 {
            // later choices only when the earlier ones are unaffordable
            for choice_index in 0..n {
                if self.try_action(Action::HandleEventChoice { choice_index }) {
                    break;
                }
            }
        } else {
            self.try_action(Action::DismissEvent);
        }
    }

    fn tend_slots(&mut self) {
        for (slot_id, status, _) in self.session.slot_statuses() {
            let action = match status {
                SlotStatus::Ready => Action::Produce { slot_id },
                SlotStatus::NeedsFeed => Action::Feed { slot_id },
                SlotStatus::Empty => match self.cheapest_fit(&slot_id) {
                    Some(catalog_id) => Action::AcquireSlotItem {
                        slot_id,
                        catalog_id,
                    },
                    None => continue,
                },
                SlotStatus::LockedByCost { cost } if self.session.state().resources.money >= cost * 2 => {
                    Action::UnlockSlot {
                        slot_id,
                        catalog_id: None,
                    }
                }
                _ => continue,
            };
            self.try_action(action);
        }
    }

    /// Cheapest affordable template the slot can hold at the current level.
    fn cheapest_fit(&self, slot_id: &str) -> Option<String> {
        let state = self.session.state();
        let kind = state.slot(slot_id)?.kind;
        self.session
            .catalog()
            .templates
            .iter()
            .filter(|t| t.kind == kind)
            .filter(|t| t.unlock_level <= state.progression.level)
            .filter(|t| t.acquire_cost <= state.resources.money)
            .filter(|t| kind != SlotKind::Company || t.acquire_cost * 2 <= state.resources.money)
            .min_by_key(|t| t.acquire_cost)
            .map(|t| t.id.clone())
    }

    fn craft_one(&mut self) {
        let state = self.session.state();
        let candidate = self
            .session
            .catalog()
            .recipes
            .iter()
            .filter(|r| state.inventory.has_all(&r.inputs))
            .find(|r| !state.discovered.contains(&r.id))
            .or_else(|| {
                self.session
                    .catalog()
                    .recipes
                    .iter()
                    .find(|r| state.inventory.has_all(&r.inputs))
            })
            .map(|r| r.flattened_inputs().into_iter().map(str::to_string).collect::<Vec<_>>());
        if let Some(items) = candidate {
            self.try_action(Action::craft_items(items));
        }
    }

    fn fill_orders(&mut self) {
        let ids: Vec<String> = self
            .session
            .state()
            .orders
            .iter()
            .map(|o| o.order_id.clone())
            .collect();
        for order_id in ids {
            let fillable = self.fillable(&order_id);
            if fillable {
                self.try_action(Action::FulfillOrder { order_id });
            }
        }
    }

    fn fillable(&self, order_id: &str) -> bool {
        let state = self.session.state();
        state
            .orders
            .iter()
            .find(|o| o.order_id == order_id)
            .and_then(|o| self.session.catalog().order(&o.template_id))
            .is_some_and(|t| state.inventory.has_all(&t.items))
    }

    fn sell_surplus(&mut self) {
        let sales = surplus(self.session.state(), self.session.inventory_usage().is_full());
        for (item_id, amount) in sales {
            self.try_action(Action::Sell { item_id, amount });
        }
    }

    fn run_strategy(&mut self) {
        let catalog = self.session.catalog();
        if catalog.strategies.is_empty() {
            return;
        }
        let pick = (self.tally.steps / STRATEGY_EVERY) as usize % catalog.strategies.len();
        let strategy = &catalog.strategies[pick];
        let (action_id, magnitude) = (strategy.id.clone(), strategy.min_magnitude);
        let target = self
            .session
            .state()
            .slots
            .iter()
            .find(|s| s.kind == SlotKind::Company && s.is_occupied())
            .map(|s| s.slot_id.clone());
        if let Some(slot_id) = target {
            self.try_action(Action::ExecuteStrategy {
                slot_id,
                action_id,
                magnitude,
            });
        }
    }
}

/// Items to sell: everything above the keep-back, or half of each stack
/// when storage is full.
fn surplus(state: &GameState, storage_full: bool) -> Vec<(String, u64)> {
    state
        .inventory
        .iter()
        .filter_map(|(item, count)| {
            let amount = if storage_full {
                count.div_ceil(2)
            } else {
                count.saturating_sub(KEEP)
            };
            (amount > 0).then(|| (item.to_string(), amount))
        })
        .collect()
}
