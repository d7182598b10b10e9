#![deny(warnings)]

//! Catalog providers: the bundled YAML catalogs of the three games and an
//! optional remote spreadsheet overlay with caching and local fallback.

pub mod bundled;
pub mod remote;
pub mod sheets;

use idle_core::{Catalog, ValidationError};
use thiserror::Error;

pub use bundled::{BundledProvider, Game};
pub use remote::RemoteProvider;
pub use sheets::{HttpSheetSource, RemoteConfig, SheetSource};

/// Where a loaded catalog came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Bundled,
    Remote,
    Cache,
}

/// A usable catalog plus an optional non-fatal warning for display.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub source: Source,
    pub warning: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("bundled catalog is malformed: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheet {sheet} returned status {status}")]
    Status { sheet: String, status: u16 },
    #[error("remote catalog is invalid: {0}")]
    Invalid(#[from] ValidationError),
    #[error("remote sheets have no usable rows")]
    NoUsableRows,
}

/// Supplies the catalog for one game instance. Problems with optional
/// sources degrade to the bundled catalog plus a warning; an error means the
/// bundled catalog itself is unusable.
pub trait CatalogProvider {
    fn load(&mut self) -> Result<LoadedCatalog, ProviderError>;
}

/// Remote provider when `remote` is set and the game's environment values
/// are present, the bundled one otherwise.
pub fn provider_for(game: Game, remote: bool) -> Box<dyn CatalogProvider> {
    if remote {
        if let Some(config) = RemoteConfig::from_env(game.env_prefix()) {
            return Box::new(RemoteProvider::new(game, HttpSheetSource::new(config)));
        }
        tracing::info!(game = %game, "remote catalog not configured, using bundled data");
    }
    Box::new(BundledProvider::new(game))
}
