//! Tabular remote source: sheet fetching and row-to-catalog mapping.
//!
//! Every sheet has a header row; columns are matched by (case-insensitive)
//! header name, so column order does not matter and unknown columns are
//! ignored. Rows missing a required field are dropped. Numeric fields that
//! fail to parse fall back to the documented default.
//!
//! | sheet | required | optional (default) |
//! |---|---|---|
//! | `producibles` | id, name | emoji, tier (1), base_value (1) |
//! | `recipes` | id, inputs, output | energy_cost (0), xp_reward (0) |
//! | `templates` | id, name, kind | emoji, acquire_cost (0), unlock_level (1), cooldown_secs (60), outputs, money_output (0), energy_cost (0), inputs, feed, harvest (repeat), passive (false), xp_reward (0) |
//! | `settings` | key, value | |
//!
//! Item lists are written `fire, water:2` (amount defaults to 1).

use crate::ProviderError;
use idle_core::{Harvest, ItemStack, Producible, Recipe, Settings, SlotKind, SlotTemplate};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub const PRODUCIBLES: &str = "producibles";
pub const RECIPES: &str = "recipes";
pub const TEMPLATES: &str = "templates";
pub const SETTINGS: &str = "settings";

/// Raw cell grid of one sheet, header row first.
pub type Grid = Vec<Vec<String>>;

pub trait SheetSource {
    fn fetch(&self, sheet: &str) -> Result<Grid, ProviderError>;
}

/// API key and spreadsheet id for one game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub api_key: String,
    pub spreadsheet_id: String,
}

impl RemoteConfig {
    /// Reads `<PREFIX>_SHEETS_API_KEY` and `<PREFIX>_SPREADSHEET_ID`; both
    /// must be non-empty.
    pub fn from_env(prefix: &str) -> Option<Self> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |suffix: &str| {
            lookup(&format!("{prefix}_{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some(Self {
            api_key: get("SHEETS_API_KEY")?,
            spreadsheet_id: get("SPREADSHEET_ID")?,
        })
    }
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Public spreadsheet read through the Sheets v4 values endpoint.
#[derive(Clone, Debug)]
pub struct HttpSheetSource {
    config: RemoteConfig,
}

impl HttpSheetSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn url(&self, sheet: &str) -> String {
        format!(
            "{SHEETS_API}/{}/values/{sheet}?key={}",
            self.config.spreadsheet_id, self.config.api_key
        )
    }
}

impl SheetSource for HttpSheetSource {
    fn fetch(&self, sheet: &str) -> Result<Grid, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        let response = client.get(self.url(sheet)).send()?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                sheet: sheet.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body: ValuesResponse = response.json()?;
        debug!(sheet, rows = body.values.len(), "sheet fetched");
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

/// One data row keyed by lower-cased header.
pub type Record = BTreeMap<String, String>;

/// Pair every data row with the header row. Blank rows are skipped.
pub fn records(grid: &[Vec<String>]) -> Vec<Record> {
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };
    let header: Vec<String> = header.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
    rows.iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .map(|row| {
            header
                .iter()
                .zip(row.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, c)| (h.clone(), c.trim().to_string()))
                .collect()
        })
        .collect()
}

fn text<'r>(rec: &'r Record, key: &str) -> Option<&'r str> {
    rec.get(key).map(String::as_str).filter(|s| !s.is_empty())
}

fn number<T: FromStr>(rec: &Record, key: &str, default: T) -> T {
    text(rec, key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Finite float or `default`; never lets NaN or infinities through.
pub fn real(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn flag(rec: &Record, key: &str) -> bool {
    matches!(
        text(rec, key).map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "yes" | "1" | "x")
    )
}

/// Parse `fire, water:2`. `None` if any entry is malformed.
pub fn item_list(raw: &str) -> Option<Vec<ItemStack>> {
    raw.split([',', '+'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((item, n)) => {
                let amount: u32 = n.trim().parse().ok().filter(|n| *n > 0)?;
                Some(ItemStack::new(item.trim(), amount))
            }
            None => Some(ItemStack::new(entry, 1)),
        })
        .collect()
}

fn optional_items(rec: &Record, key: &str) -> Option<Vec<ItemStack>> {
    match text(rec, key) {
        Some(raw) => item_list(raw),
        None => Some(Vec::new()),
    }
}

fn slot_kind(raw: &str) -> Option<SlotKind> {
    match raw.to_ascii_lowercase().as_str() {
        "generator" => Some(SlotKind::Generator),
        "field" | "crop" => Some(SlotKind::Field),
        "animal" => Some(SlotKind::Animal),
        "machine" => Some(SlotKind::Machine),
        "company" => Some(SlotKind::Company),
        _ => None,
    }
}

fn drop_row(sheet: &str, index: usize) {
    warn!(sheet, row = index + 2, "dropping malformed row");
}

pub fn parse_producibles(records: &[Record]) -> Vec<Producible> {
    let mut out = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let (Some(id), Some(name)) = (text(rec, "id"), text(rec, "name")) else {
            drop_row(PRODUCIBLES, i);
            continue;
        };
        out.push(Producible {
            id: id.to_string(),
            name: name.to_string(),
            emoji: text(rec, "emoji").unwrap_or_default().to_string(),
            tier: number(rec, "tier", 1u8).clamp(1, 5),
            base_value: real(text(rec, "base_value"), 1.0).max(0.0),
        });
    }
    out
}

pub fn parse_recipes(records: &[Record]) -> Vec<Recipe> {
    let mut out = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let parsed = (|| {
            let id = text(rec, "id")?;
            let inputs = item_list(text(rec, "inputs")?).filter(|v| !v.is_empty())?;
            let mut output = item_list(text(rec, "output")?)?;
            if output.len() != 1 {
                return None;
            }
            Some(Recipe {
                id: id.to_string(),
                inputs,
                output: output.remove(0),
                energy_cost: real(text(rec, "energy_cost"), 0.0).max(0.0),
                xp_reward: number(rec, "xp_reward", 0),
            })
        })();
        match parsed {
            Some(r) => out.push(r),
            None => drop_row(RECIPES, i),
        }
    }
    out
}

pub fn parse_templates(records: &[Record]) -> Vec<SlotTemplate> {
    let mut out = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let parsed = (|| {
            let id = text(rec, "id")?;
            let name = text(rec, "name")?;
            let kind = slot_kind(text(rec, "kind")?)?;
            let cooldown = real(text(rec, "cooldown_secs"), 60.0);
            Some(SlotTemplate {
                id: id.to_string(),
                name: name.to_string(),
                kind,
                emoji: text(rec, "emoji").unwrap_or_default().to_string(),
                acquire_cost: number(rec, "acquire_cost", 0),
                unlock_level: number(rec, "unlock_level", 1u32).max(1),
                cooldown_secs: if cooldown > 0.0 { cooldown } else { 60.0 },
                outputs: optional_items(rec, "outputs")?,
                money_output: real(text(rec, "money_output"), 0.0).max(0.0),
                energy_cost: real(text(rec, "energy_cost"), 0.0).max(0.0),
                inputs: optional_items(rec, "inputs")?,
                feed: optional_items(rec, "feed")?,
                harvest: match text(rec, "harvest") {
                    Some(h) if h.eq_ignore_ascii_case("clear") => Harvest::Clear,
                    _ => Harvest::Repeat,
                },
                passive: flag(rec, "passive"),
                xp_reward: number(rec, "xp_reward", 0),
                metrics: BTreeMap::new(),
            })
        })();
        match parsed {
            Some(t) => out.push(t),
            None => drop_row(TEMPLATES, i),
        }
    }
    out
}

/// Apply `key`/`value` rows onto `settings`. Unknown keys and unparsable
/// values leave the current value in place. Returns how many were applied.
pub fn apply_settings(records: &[Record], settings: &mut Settings) -> usize {
    let mut applied = 0;
    for rec in records {
        let (Some(key), Some(value)) = (text(rec, "key"), text(rec, "value")) else {
            continue;
        };
        let real_value = real(Some(value), f64::NAN);
        let int_value = value.parse::<u64>().ok();
        let ok = match key {
            "start_money" => int_value.map(|v| settings.start_money = v).is_some(),
            "start_energy" if real_value.is_finite() => {
                settings.start_energy = real_value;
                true
            }
            "max_energy" if real_value.is_finite() => {
                settings.max_energy = real_value;
                true
            }
            "energy_regen_per_sec" if real_value.is_finite() => {
                settings.energy_regen_per_sec = real_value;
                true
            }
            "storage_capacity" => int_value.map(|v| settings.storage_capacity = Some(v)).is_some(),
            "discovery_xp" => int_value.map(|v| settings.discovery_xp = v).is_some(),
            "slot_resale_pct" if real_value.is_finite() => {
                settings.slot_resale_pct = real_value;
                true
            }
            "company_hold_secs" if real_value.is_finite() => {
                settings.company_hold_secs = real_value;
                true
            }
            "upgrade_base_cost" if real_value.is_finite() => {
                settings.upgrade.base_cost = real_value;
                true
            }
            "upgrade_cost_multiplier" if real_value.is_finite() => {
                settings.upgrade.cost_multiplier = real_value;
                true
            }
            "max_level" => int_value
                .and_then(|v| u32::try_from(v).ok())
                .map(|v| settings.upgrade.max_level = v)
                .is_some(),
            "market_update_interval_secs" if real_value.is_finite() => {
                settings.market.update_interval_secs = real_value;
                true
            }
            _ => false,
        };
        if ok {
            applied += 1;
        } else {
            debug!(key, value, "ignoring settings row");
        }
    }
    applied
}
