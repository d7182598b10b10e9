//! Catalogs compiled into the binary.

use crate::{CatalogProvider, LoadedCatalog, ProviderError, Source};
use idle_core::Catalog;
use std::fmt;
use std::str::FromStr;

const ALCHEMOJI: &str = include_str!("../catalogs/alchemoji.yaml");
const FARM_VALLEY: &str = include_str!("../catalogs/farm_valley.yaml");
const CAPITALISM: &str = include_str!("../catalogs/capitalism.yaml");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Game {
    Alchemoji,
    FarmValley,
    Capitalism,
}

impl Game {
    pub const ALL: [Game; 3] = [Game::Alchemoji, Game::FarmValley, Game::Capitalism];

    pub fn slug(self) -> &'static str {
        match self {
            Game::Alchemoji => "alchemoji",
            Game::FarmValley => "farm",
            Game::Capitalism => "capitalism",
        }
    }

    /// Prefix of the `<PREFIX>_SHEETS_API_KEY` / `<PREFIX>_SPREADSHEET_ID` variables.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Game::Alchemoji => "ALCHEMOJI",
            Game::FarmValley => "FARM_VALLEY",
            Game::Capitalism => "CAPITALISM",
        }
    }

    fn yaml(self) -> &'static str {
        match self {
            Game::Alchemoji => ALCHEMOJI,
            Game::FarmValley => FARM_VALLEY,
            Game::Capitalism => CAPITALISM,
        }
    }

    /// Parse the embedded catalog.
    pub fn bundled(self) -> Result<Catalog, ProviderError> {
        Ok(serde_yaml::from_str(self.yaml())?)
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alchemoji" => Ok(Game::Alchemoji),
            "farm" | "farm_valley" | "farm-valley" => Ok(Game::FarmValley),
            "capitalism" | "lscs" => Ok(Game::Capitalism),
            other => Err(format!("unknown game: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BundledProvider {
    game: Game,
}

impl BundledProvider {
    pub fn new(game: Game) -> Self {
        Self { game }
    }
}

impl CatalogProvider for BundledProvider {
    fn load(&mut self) -> Result<LoadedCatalog, ProviderError> {
        Ok(LoadedCatalog {
            catalog: self.game.bundled()?,
            source: Source::Bundled,
            warning: None,
        })
    }
}
