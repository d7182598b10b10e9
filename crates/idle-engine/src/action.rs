//! The closed set of state transitions.

use serde::{Deserialize, Serialize};

/// How a craft attempt names its inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CraftInput {
    /// A recipe already in the discovered set.
    Recipe(String),
    /// Loose item ids, one per unit, in any order.
    Items(Vec<String>),
}

/// Every action the processor understands. Clock ticks and player input
/// go through the same entry point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Tick,
    AcquireSlotItem { slot_id: String, catalog_id: String },
    Produce { slot_id: String },
    Feed { slot_id: String },
    Craft { input: CraftInput },
    Sell { item_id: String, amount: u64 },
    SellSlot { slot_id: String },
    UpgradeSlot { slot_id: String },
    UnlockSlot { slot_id: String, catalog_id: Option<String> },
    ToggleAuto { slot_id: String },
    ExecuteStrategy { slot_id: String, action_id: String, magnitude: f64 },
    HandleEventChoice { choice_index: usize },
    DismissEvent,
    FulfillOrder { order_id: String },
    MarkSaved,
    Reset,
}

impl Action {
    pub fn craft_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Action::Craft {
            input: CraftInput::Items(items.into_iter().map(Into::into).collect()),
        }
    }

    pub fn is_tick(&self) -> bool {
        matches!(self, Action::Tick)
    }
}
