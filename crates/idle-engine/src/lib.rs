#![deny(warnings)]

//! Idle game engine: the action processor, the simulation clock and the
//! session that ties them to a blob store.
//!
//! Every state change is an [`Action`] applied by [`apply`]; the function is
//! pure over `(catalog, state, now, action)`, so the same inputs always give
//! the same [`Transition`].

pub mod action;
mod clock;
mod crafting;
mod events;
pub mod outcome;
mod progression;
mod reducer;
pub mod session;
pub mod slots;
mod strategy;
mod trade;
pub mod views;

pub use action::{Action, CraftInput};
pub use crafting::match_recipe;
pub use events::conditions_hold;
pub use outcome::{Notice, Rejection, Transition};
pub use reducer::{apply, new_game};
pub use session::{Clock, ManualClock, Session, SessionConfig, SystemClock};
pub use views::{InventoryUsage, SlotStatus, XpProgress};
