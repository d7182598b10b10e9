#![deny(warnings)]

//! Core domain models and invariants for the idle hub games.
//!
//! This crate defines the static catalog, the serializable game state and
//! the level scaling formulas. It has no notion of time passing; that lives
//! in `idle-engine`.

pub mod catalog;
pub mod scaling;
pub mod state;
pub mod time;

pub use catalog::{
    validate_catalog, CalendarSettings, Catalog, Comparison, Condition, Effect, EffectTarget,
    EventChoice, EventTemplate, Harvest, ItemStack, MarketSettings, MetricChange, Modifier,
    OrderBoardSettings, OrderTemplate, Producible, ProgressionSettings, Recipe, Settings,
    SlotKind, SlotSpec, SlotTemplate, StrategyAction, Subject, UpgradeRule, ValidationError,
};
pub use scaling::{cooldown_at_level, cost_at_level, floor_credit, production_at_level};
pub use state::{
    ActiveEvent, CalendarState, GameState, Inventory, MarketEntry, Order, Progression,
    Resources, RngState, Slot, Stats,
};
pub use time::Timestamp;
