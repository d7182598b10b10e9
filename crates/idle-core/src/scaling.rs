//! Level scaling formulas shared by every slot type.
//!
//! All helpers return unrounded values; callers floor only when crediting or
//! debiting resources so rounding never compounds across levels.

use crate::catalog::{ProgressionSettings, UpgradeRule};

/// `base * multiplier^(level-1)`.
pub fn cost_at_level(base: f64, multiplier: f64, level: u32) -> f64 {
    base * multiplier.powi(level.saturating_sub(1) as i32)
}

/// `base * (1 + (level-1) * step)`.
pub fn production_at_level(base: f64, step_pct: f64, level: u32) -> f64 {
    base * (1.0 + level.saturating_sub(1) as f64 * step_pct)
}

/// `base * max(floor, 1 - (level-1) * step)`.
pub fn cooldown_at_level(base: f64, step_pct: f64, floor_pct: f64, level: u32) -> f64 {
    base * floor_pct.max(1.0 - level.saturating_sub(1) as f64 * step_pct)
}

/// Truncate a non-negative amount to whole units.
pub fn floor_credit(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

impl UpgradeRule {
    /// Money needed to go from `level` to `level + 1`.
    pub fn upgrade_cost(&self, level: u32) -> u64 {
        floor_credit(cost_at_level(self.base_cost, self.cost_multiplier, level))
    }

    pub fn production(&self, base: f64, level: u32) -> f64 {
        production_at_level(base, self.production_step_pct, level)
    }

    pub fn cooldown_secs(&self, base: f64, level: u32) -> f64 {
        cooldown_at_level(base, self.cooldown_step_pct, self.cooldown_floor_pct, level)
    }
}

impl ProgressionSettings {
    /// XP required to advance from `level` to `level + 1`.
    pub fn xp_for_level(&self, level: u32) -> u64 {
        floor_credit(cost_at_level(self.base_xp, self.growth, level)).max(1)
    }
}
