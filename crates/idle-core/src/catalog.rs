//! Static catalog: producibles, recipes, slot templates and tunables.
//!
//! A catalog is immutable once loaded. Every entry is addressed by a stable
//! string id; [`validate_catalog`] checks cross references so the simulation
//! can treat a dangling id as a programmer error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

fn one() -> u32 {
    1
}

fn tier_one() -> u8 {
    1
}

/// A fungible item the player can hold, craft and sell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Producible {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    /// Ordinal rank in [1, 5].
    #[serde(default = "tier_one")]
    pub tier: u8,
    /// Reference value used by market pricing.
    pub base_value: f64,
}

/// An amount of a single item.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    #[serde(default = "one")]
    pub amount: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, amount: u32) -> Self {
        Self {
            item: item.into(),
            amount,
        }
    }
}

/// Multiset of inputs turned into one output stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub inputs: Vec<ItemStack>,
    pub output: ItemStack,
    #[serde(default)]
    pub energy_cost: f64,
    #[serde(default)]
    pub xp_reward: u64,
}

impl Recipe {
    /// Inputs expanded to one id per unit, sorted.
    pub fn flattened_inputs(&self) -> Vec<&str> {
        let mut flat: Vec<&str> = self
            .inputs
            .iter()
            .flat_map(|s| std::iter::repeat(s.item.as_str()).take(s.amount as usize))
            .collect();
        flat.sort_unstable();
        flat
    }
}

/// What kind of production unit a slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Generator,
    Field,
    Animal,
    Machine,
    Company,
}

/// What happens to an occupied slot after collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Harvest {
    /// Occupant stays and starts another cycle.
    #[default]
    Repeat,
    /// Occupant is consumed and the slot becomes empty.
    Clear,
}

/// Something that can be placed into a slot: generator, crop, animal, company.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub id: String,
    pub name: String,
    pub kind: SlotKind,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub acquire_cost: u64,
    #[serde(default = "one")]
    pub unlock_level: u32,
    pub cooldown_secs: f64,
    #[serde(default)]
    pub outputs: Vec<ItemStack>,
    #[serde(default)]
    pub money_output: f64,
    #[serde(default)]
    pub energy_cost: f64,
    /// Items consumed per production cycle.
    #[serde(default)]
    pub inputs: Vec<ItemStack>,
    /// Items consumed to restart a fed occupant. Empty means no feeding.
    #[serde(default)]
    pub feed: Vec<ItemStack>,
    #[serde(default)]
    pub harvest: Harvest,
    /// Passive producers fire on every tick without auto being enabled.
    #[serde(default)]
    pub passive: bool,
    #[serde(default)]
    pub xp_reward: u64,
    /// Initial per-occupant metrics (morale, brand, valuation, ...).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl SlotTemplate {
    pub fn needs_feed(&self) -> bool {
        !self.feed.is_empty()
    }
}

/// One position in the slot layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub id: String,
    pub kind: SlotKind,
    #[serde(default = "one")]
    pub unlock_level: u32,
    #[serde(default)]
    pub unlock_cost: u64,
    /// Template placed here in a fresh game.
    #[serde(default)]
    pub occupant: Option<String>,
}

/// A metric delta applied per unit of strategy magnitude.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: String,
    pub per_unit: f64,
}

/// Management action run against a portfolio slot with a chosen magnitude.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyAction {
    pub id: String,
    pub name: String,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
    /// Money credited (positive) or charged (negative) per unit.
    #[serde(default)]
    pub capital_per_unit: f64,
    #[serde(default)]
    pub reputation_per_unit: f64,
    #[serde(default)]
    pub effects: Vec<MetricChange>,
    /// Named stat counter that accumulates the magnitude.
    #[serde(default)]
    pub counter: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    Fund,
    AffectedEntity,
    AllEntities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Add,
    Subtract,
    Multiply,
}

impl Modifier {
    pub fn apply(self, current: f64, value: f64) -> f64 {
        match self {
            Modifier::Add => current + value,
            Modifier::Subtract => current - value,
            Modifier::Multiply => current * value,
        }
    }
}

/// Declarative event effect. Fund metrics are `capital` and `reputation`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub target: EffectTarget,
    pub metric: String,
    pub modifier: Modifier,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    PortfolioSize,
    Money,
    Reputation,
    Level,
    /// A named stat counter; the name lives in [`Condition::counter`].
    Counter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Comparison {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Gt => lhs > rhs,
            Comparison::Gte => lhs >= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Lte => lhs <= rhs,
            Comparison::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

/// Event precondition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub subject: Subject,
    #[serde(default)]
    pub counter: Option<String>,
    pub cmp: Comparison,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventChoice {
    pub label: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub reputation_delta: f64,
}

/// Random event rolled by the clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Chance per tick in [0, 1].
    pub probability: f64,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Pick one random occupied company slot as the affected entity.
    #[serde(default)]
    pub targets_entity: bool,
    /// Applied on dismissal when the event has no choices.
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub choices: Vec<EventChoice>,
    #[serde(default)]
    pub expires_after_secs: Option<f64>,
}

/// Delivery order posted to the order board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderTemplate {
    pub id: String,
    pub items: Vec<ItemStack>,
    pub reward_money: u64,
    #[serde(default)]
    pub reward_xp: u64,
    pub duration_secs: f64,
}

/// Level scaling shared by every slot type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeRule {
    pub base_cost: f64,
    pub cost_multiplier: f64,
    pub production_step_pct: f64,
    pub cooldown_step_pct: f64,
    pub cooldown_floor_pct: f64,
    pub max_level: u32,
}

impl Default for UpgradeRule {
    fn default() -> Self {
        Self {
            base_cost: 50.0,
            cost_multiplier: 1.5,
            production_step_pct: 0.25,
            cooldown_step_pct: 0.1,
            cooldown_floor_pct: 0.3,
            max_level: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub update_interval_secs: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub initial_supply: f64,
    pub initial_demand: f64,
    /// Largest step of the supply/demand random walk.
    pub drift_step: f64,
    /// Supply added per unit sold.
    pub sell_supply_factor: f64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            update_interval_secs: 30.0,
            range_min: 10.0,
            range_max: 100.0,
            initial_supply: 50.0,
            initial_demand: 50.0,
            drift_step: 5.0,
            sell_supply_factor: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionSettings {
    pub base_xp: f64,
    pub growth: f64,
    pub max_level: u32,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            base_xp: 100.0,
            growth: 1.5,
            max_level: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarSettings {
    pub start_date: NaiveDate,
    pub secs_per_month: f64,
    /// Fraction of money charged when a year boundary is crossed.
    #[serde(default)]
    pub annual_fee_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBoardSettings {
    pub max_open: usize,
    pub refresh_secs: f64,
}

impl Default for OrderBoardSettings {
    fn default() -> Self {
        Self {
            max_open: 3,
            refresh_secs: 60.0,
        }
    }
}

/// Tunable constants for one game instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub start_money: u64,
    pub start_energy: f64,
    pub max_energy: f64,
    pub energy_regen_per_sec: f64,
    pub storage_capacity: Option<u64>,
    pub upgrade: UpgradeRule,
    pub market: MarketSettings,
    pub progression: ProgressionSettings,
    pub calendar: Option<CalendarSettings>,
    pub order_board: OrderBoardSettings,
    /// Metrics clamped to [0, 100] after every effect.
    pub bounded_metrics: Vec<String>,
    pub slot_resale_pct: f64,
    /// Companies held at least this long sell at their valuation.
    pub company_hold_secs: f64,
    pub discovery_xp: u64,
    pub rng_seed: u64,
    pub tick_interval_ms: u64,
    pub autosave_interval_secs: f64,
    pub storage_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_money: 100,
            start_energy: 100.0,
            max_energy: 100.0,
            energy_regen_per_sec: 0.5,
            storage_capacity: None,
            upgrade: UpgradeRule::default(),
            market: MarketSettings::default(),
            progression: ProgressionSettings::default(),
            calendar: None,
            order_board: OrderBoardSettings::default(),
            bounded_metrics: vec![
                "morale".to_string(),
                "brand".to_string(),
                "satisfaction".to_string(),
            ],
            slot_resale_pct: 0.5,
            company_hold_secs: 300.0,
            discovery_xp: 10,
            rng_seed: 0x1D1E,
            tick_interval_ms: 250,
            autosave_interval_secs: 30.0,
            storage_key: None,
        }
    }
}

impl Settings {
    pub fn is_bounded_metric(&self, metric: &str) -> bool {
        self.bounded_metrics.iter().any(|m| m == metric)
    }
}

/// Full static configuration of one game instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub game: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub producibles: Vec<Producible>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub templates: Vec<SlotTemplate>,
    #[serde(default)]
    pub slots: Vec<SlotSpec>,
    #[serde(default)]
    pub strategies: Vec<StrategyAction>,
    #[serde(default)]
    pub events: Vec<EventTemplate>,
    #[serde(default)]
    pub orders: Vec<OrderTemplate>,
    #[serde(default)]
    pub settings: Settings,
}

impl Catalog {
    pub fn producible(&self, id: &str) -> Option<&Producible> {
        self.producibles.iter().find(|p| p.id == id)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&SlotTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn slot_spec(&self, id: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn strategy(&self, id: &str) -> Option<&StrategyAction> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&EventTemplate> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn order(&self, id: &str) -> Option<&OrderTemplate> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// Key used by the blob store for this game's save.
    pub fn storage_key(&self) -> String {
        self.settings
            .storage_key
            .clone()
            .unwrap_or_else(|| format!("{}_save", self.game))
    }
}

/// Validation errors for catalog invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("{context} references unknown item {item}")]
    UnknownItem { context: String, item: String },
    #[error("unknown slot template: {0}")]
    UnknownTemplate(String),
    #[error("slot {slot} cannot hold template {template}")]
    KindMismatch { slot: String, template: String },
    #[error("non-finite numeric value in {0}")]
    NonFinite(String),
    #[error("value must be > 0 in {0}")]
    NonPositive(String),
    #[error("tier {tier} of {id} outside [1,5]")]
    InvalidTier { id: String, tier: u8 },
    #[error("probability outside [0,1] in {0}")]
    InvalidProbability(String),
    #[error("invalid range in {0}")]
    InvalidRange(String),
    #[error("recipe {0} has no inputs")]
    EmptyRecipe(String),
    #[error("counter condition without a counter name in {0}")]
    MissingCounter(String),
    #[error("{context} may only add to counter {counter}")]
    CounterDecrease { context: String, counter: String },
}

fn finite(value: f64, context: &str) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite(context.to_string()))
    }
}

fn positive(value: f64, context: &str) -> Result<(), ValidationError> {
    finite(value, context)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositive(context.to_string()))
    }
}

fn unique<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId(id.to_string()));
        }
    }
    Ok(())
}

fn known_items(
    catalog: &Catalog,
    stacks: &[ItemStack],
    context: &str,
) -> Result<(), ValidationError> {
    for s in stacks {
        if catalog.producible(&s.item).is_none() {
            return Err(ValidationError::UnknownItem {
                context: context.to_string(),
                item: s.item.clone(),
            });
        }
        if s.amount == 0 {
            return Err(ValidationError::NonPositive(format!("{context}/{}", s.item)));
        }
    }
    Ok(())
}

fn validate_settings(s: &Settings) -> Result<(), ValidationError> {
    finite(s.start_energy, "settings.start_energy")?;
    finite(s.max_energy, "settings.max_energy")?;
    finite(s.energy_regen_per_sec, "settings.energy_regen_per_sec")?;
    if s.start_energy < 0.0 || s.max_energy < 0.0 || s.energy_regen_per_sec < 0.0 {
        return Err(ValidationError::InvalidRange("settings.energy".to_string()));
    }
    let u = &s.upgrade;
    finite(u.base_cost, "upgrade.base_cost")?;
    positive(u.cost_multiplier, "upgrade.cost_multiplier")?;
    finite(u.production_step_pct, "upgrade.production_step_pct")?;
    finite(u.cooldown_step_pct, "upgrade.cooldown_step_pct")?;
    if !(0.0..=1.0).contains(&u.cooldown_floor_pct) || u.max_level == 0 {
        return Err(ValidationError::InvalidRange("upgrade".to_string()));
    }
    let m = &s.market;
    positive(m.update_interval_secs, "market.update_interval_secs")?;
    positive(m.range_min, "market.range_min")?;
    finite(m.range_max, "market.range_max")?;
    finite(m.drift_step, "market.drift_step")?;
    finite(m.sell_supply_factor, "market.sell_supply_factor")?;
    if m.range_min > m.range_max {
        return Err(ValidationError::InvalidRange("market".to_string()));
    }
    positive(s.progression.base_xp, "progression.base_xp")?;
    positive(s.progression.growth, "progression.growth")?;
    if let Some(cal) = &s.calendar {
        positive(cal.secs_per_month, "calendar.secs_per_month")?;
        if !(0.0..=1.0).contains(&cal.annual_fee_pct) {
            return Err(ValidationError::InvalidRange("calendar.annual_fee_pct".to_string()));
        }
    }
    positive(s.order_board.refresh_secs, "order_board.refresh_secs")?;
    if !(0.0..=1.0).contains(&s.slot_resale_pct) {
        return Err(ValidationError::InvalidRange("settings.slot_resale_pct".to_string()));
    }
    if !(s.company_hold_secs.is_finite() && s.company_hold_secs >= 0.0) {
        return Err(ValidationError::InvalidRange("settings.company_hold_secs".to_string()));
    }
    positive(s.autosave_interval_secs, "settings.autosave_interval_secs")?;
    if s.tick_interval_ms == 0 {
        return Err(ValidationError::NonPositive("settings.tick_interval_ms".to_string()));
    }
    Ok(())
}

fn validate_effects(effects: &[Effect], context: &str) -> Result<(), ValidationError> {
    for e in effects {
        finite(e.value, context)?;
        // fund metrics other than capital and reputation are stat counters
        let counter = e.target == EffectTarget::Fund
            && !matches!(e.metric.as_str(), "capital" | "reputation");
        if counter && (e.modifier != Modifier::Add || e.value < 0.0) {
            return Err(ValidationError::CounterDecrease {
                context: context.to_string(),
                counter: e.metric.clone(),
            });
        }
    }
    Ok(())
}

/// Validate a catalog, including every cross reference.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), ValidationError> {
    unique(catalog.producibles.iter().map(|p| p.id.as_str()))?;
    unique(catalog.recipes.iter().map(|r| r.id.as_str()))?;
    unique(catalog.templates.iter().map(|t| t.id.as_str()))?;
    unique(catalog.slots.iter().map(|s| s.id.as_str()))?;
    unique(catalog.strategies.iter().map(|s| s.id.as_str()))?;
    unique(catalog.events.iter().map(|e| e.id.as_str()))?;
    unique(catalog.orders.iter().map(|o| o.id.as_str()))?;

    for p in &catalog.producibles {
        if !(1..=5).contains(&p.tier) {
            return Err(ValidationError::InvalidTier {
                id: p.id.clone(),
                tier: p.tier,
            });
        }
        finite(p.base_value, &p.id)?;
        if p.base_value < 0.0 {
            return Err(ValidationError::InvalidRange(p.id.clone()));
        }
    }
    for r in &catalog.recipes {
        if r.inputs.is_empty() {
            return Err(ValidationError::EmptyRecipe(r.id.clone()));
        }
        known_items(catalog, &r.inputs, &r.id)?;
        known_items(catalog, std::slice::from_ref(&r.output), &r.id)?;
        finite(r.energy_cost, &r.id)?;
    }
    for t in &catalog.templates {
        positive(t.cooldown_secs, &t.id)?;
        finite(t.money_output, &t.id)?;
        finite(t.energy_cost, &t.id)?;
        if t.money_output < 0.0 || t.energy_cost < 0.0 {
            return Err(ValidationError::InvalidRange(t.id.clone()));
        }
        known_items(catalog, &t.outputs, &t.id)?;
        known_items(catalog, &t.inputs, &t.id)?;
        known_items(catalog, &t.feed, &t.id)?;
        for v in t.metrics.values() {
            finite(*v, &t.id)?;
        }
    }
    for s in &catalog.slots {
        if let Some(occupant) = &s.occupant {
            let t = catalog
                .template(occupant)
                .ok_or_else(|| ValidationError::UnknownTemplate(occupant.clone()))?;
            if t.kind != s.kind {
                return Err(ValidationError::KindMismatch {
                    slot: s.id.clone(),
                    template: occupant.clone(),
                });
            }
        }
    }
    for a in &catalog.strategies {
        finite(a.min_magnitude, &a.id)?;
        finite(a.max_magnitude, &a.id)?;
        finite(a.capital_per_unit, &a.id)?;
        finite(a.reputation_per_unit, &a.id)?;
        if a.min_magnitude < 0.0 || a.min_magnitude > a.max_magnitude {
            return Err(ValidationError::InvalidRange(a.id.clone()));
        }
        for c in &a.effects {
            finite(c.per_unit, &a.id)?;
        }
    }
    for e in &catalog.events {
        if !(0.0..=1.0).contains(&e.probability) {
            return Err(ValidationError::InvalidProbability(e.id.clone()));
        }
        for c in &e.conditions {
            finite(c.value, &e.id)?;
            if c.subject == Subject::Counter && c.counter.is_none() {
                return Err(ValidationError::MissingCounter(e.id.clone()));
            }
        }
        validate_effects(&e.effects, &e.id)?;
        for choice in &e.choices {
            validate_effects(&choice.effects, &e.id)?;
            finite(choice.reputation_delta, &e.id)?;
        }
        if let Some(secs) = e.expires_after_secs {
            positive(secs, &e.id)?;
        }
    }
    for o in &catalog.orders {
        known_items(catalog, &o.items, &o.id)?;
        positive(o.duration_secs, &o.id)?;
    }
    validate_settings(&catalog.settings)
}
