//! Results of applying an action.

use chrono::NaiveDate;
use idle_core::{GameState, ItemStack, SlotKind};
use thiserror::Error;

/// Why an action left the state unchanged. Expected during normal play;
/// the processor only logs it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Rejection {
    #[error("tick is not later than the last tick")]
    StaleTick,
    #[error("unknown slot {0}")]
    UnknownSlot(String),
    #[error("unknown catalog entry {0}")]
    UnknownEntry(String),
    #[error("slot {0} is locked")]
    SlotLocked(String),
    #[error("slot {0} is already unlocked")]
    AlreadyUnlocked(String),
    #[error("slot {0} is occupied")]
    SlotOccupied(String),
    #[error("slot {0} is empty")]
    SlotEmpty(String),
    #[error("slot {slot} cannot hold a {kind:?}")]
    WrongKind { slot: String, kind: SlotKind },
    #[error("level {required} required")]
    LevelTooLow { required: u32 },
    #[error("need {need} money, have {have}")]
    InsufficientFunds { need: u64, have: u64 },
    #[error("need {need:.1} energy, have {have:.1}")]
    InsufficientEnergy { need: f64, have: f64 },
    #[error("missing input items")]
    MissingItems,
    #[error("storage capacity {capacity} exceeded")]
    StorageFull { capacity: u64 },
    #[error("slot {0} is not ready")]
    NotReady(String),
    #[error("slot {0} needs feed")]
    NeedsFeed(String),
    #[error("slot {0} does not need feed")]
    AlreadyFed(String),
    #[error("no recipe matches the inputs")]
    NoMatchingRecipe,
    #[error("recipe {0} has not been discovered")]
    Undiscovered(String),
    #[error("slot {0} is at max level")]
    MaxLevel(String),
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("magnitude {0} outside the allowed range")]
    MagnitudeOutOfRange(f64),
    #[error("no active event")]
    NoActiveEvent,
    #[error("event choice {0} does not exist")]
    InvalidChoice(usize),
    #[error("event requires a choice")]
    ChoiceRequired,
    #[error("event has expired")]
    EventExpired,
    #[error("unknown order {0}")]
    UnknownOrder(String),
    #[error("order {0} has expired")]
    OrderExpired(String),
    #[error("slot {0} produces passively")]
    PassiveSlot(String),
}

/// Something the consumer may want to surface after a successful action.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Crafted {
        recipe_id: String,
        output: ItemStack,
        new_discovery: bool,
    },
    Produced {
        slot_id: String,
        items: Vec<ItemStack>,
        money: u64,
    },
    Sold {
        item_id: String,
        amount: u64,
        earned: u64,
    },
    SlotSold {
        slot_id: String,
        refund: u64,
    },
    SlotUnlocked {
        slot_id: String,
    },
    LevelUp {
        level: u32,
    },
    StrategyExecuted {
        slot_id: String,
        action_id: String,
        capital: i64,
    },
    EventStarted {
        event_id: String,
        target_slot: Option<String>,
    },
    EventResolved {
        event_id: String,
    },
    MonthAdvanced {
        date: NaiveDate,
    },
    AnnualFee {
        amount: u64,
    },
    Bankrupt {
        slot_id: String,
        template_id: String,
    },
    OrderPosted {
        order_id: String,
    },
    OrderExpired {
        order_id: String,
    },
    OrderFulfilled {
        order_id: String,
        reward: u64,
    },
}

/// New state plus what happened. On rejection `state` equals the input.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: GameState,
    pub notices: Vec<Notice>,
    pub rejected: Option<Rejection>,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        self.rejected.is_none()
    }

    /// True when this transition crafted a recipe for the first time.
    pub fn is_new_discovery(&self) -> bool {
        self.notices.iter().any(|n| {
            matches!(
                n,
                Notice::Crafted {
                    new_discovery: true,
                    ..
                }
            )
        })
    }
}
