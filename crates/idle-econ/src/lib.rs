#![deny(warnings)]

//! Market models: supply/demand pricing and seeded drift for the idle games.
//!
//! This module provides:
//! - The fixed price formula `max(1, floor(base * (0.5 + demand / supply)))`
//! - Sale bookkeeping that nudges supply upward
//! - A bounded random walk for periodic market redraws
//! - Deterministic generators derived from the state's RNG counter

use idle_core::{MarketEntry, MarketSettings, RngState, Timestamp};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::warn;

/// Errors produced by pricing helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Supply must be strictly positive and finite.
    #[error("invalid supply: {0}")]
    InvalidSupply(f64),
    /// Base value and demand must be non-negative and finite.
    #[error("invalid base value or demand")]
    InvalidPrice,
}

/// Price of one unit given the item's base value and current supply/demand.
///
/// Example:
/// assert_eq!(market_price(10.0, 50.0, 50.0).unwrap(), 15);
pub fn market_price(base_value: f64, supply: f64, demand: f64) -> Result<u64, EconError> {
    if !supply.is_finite() || supply <= 0.0 {
        return Err(EconError::InvalidSupply(supply));
    }
    if !base_value.is_finite() || base_value < 0.0 || !demand.is_finite() || demand < 0.0 {
        return Err(EconError::InvalidPrice);
    }
    let raw = (base_value * (0.5 + demand / supply)).floor();
    Ok((raw as u64).max(1))
}

fn clamp_level(value: f64, settings: &MarketSettings) -> f64 {
    if value.is_finite() {
        value.clamp(settings.range_min, settings.range_max)
    } else {
        settings.range_min
    }
}

/// Clamp supply/demand into range and re-derive the price from the formula.
pub fn reprice(entry: &mut MarketEntry, base_value: f64, settings: &MarketSettings) {
    entry.supply = clamp_level(entry.supply, settings);
    entry.demand = clamp_level(entry.demand, settings);
    entry.current_price = match market_price(base_value, entry.supply, entry.demand) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "falling back to minimum price");
            1
        }
    };
}

/// Fresh market entry at the configured initial supply and demand.
pub fn initial_entry(base_value: f64, settings: &MarketSettings, now: Timestamp) -> MarketEntry {
    let mut entry = MarketEntry {
        current_price: 1,
        supply: settings.initial_supply,
        demand: settings.initial_demand,
        last_update: now,
    };
    reprice(&mut entry, base_value, settings);
    entry
}

/// Money received for `amount` units at the entry's current price.
pub fn sale_value(entry: &MarketEntry, amount: u64) -> u64 {
    entry.current_price.saturating_mul(amount)
}

/// Record a sale: supply rises by `amount * sell_supply_factor` and the price is re-derived.
pub fn record_sale(
    entry: &mut MarketEntry,
    base_value: f64,
    amount: u64,
    settings: &MarketSettings,
    now: Timestamp,
) {
    entry.supply += amount as f64 * settings.sell_supply_factor;
    entry.last_update = now;
    reprice(entry, base_value, settings);
}

/// Bounded random walk of supply and demand, followed by a reprice.
pub fn drift<R: Rng>(
    entry: &mut MarketEntry,
    base_value: f64,
    settings: &MarketSettings,
    rng: &mut R,
    now: Timestamp,
) {
    let step = settings.drift_step.abs();
    if step > 0.0 {
        entry.supply += rng.gen_range(-step..=step);
        entry.demand += rng.gen_range(-step..=step);
    }
    entry.last_update = now;
    reprice(entry, base_value, settings);
}

/// Generator for the next random step; advances the draw counter.
pub fn draw_rng(state: &mut RngState) -> ChaCha8Rng {
    let mixed = state
        .seed
        .wrapping_add(state.draws.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let rng = ChaCha8Rng::seed_from_u64(mixed);
    state.draws = state.draws.wrapping_add(1);
    rng
}
