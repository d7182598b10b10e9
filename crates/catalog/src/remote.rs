//! Spreadsheet-backed catalog with an in-memory TTL cache.
//!
//! Each non-empty sheet replaces the matching section of the bundled
//! catalog; the merged result must still validate. Any failure along the
//! way yields the bundled catalog and a warning instead of an error.

use crate::sheets::{self, SheetSource};
use crate::{CatalogProvider, Game, LoadedCatalog, ProviderError, Source};
use chrono::{DateTime, Duration, Utc};
use idle_core::{validate_catalog, Catalog};
use tracing::{info, warn};

pub const DEFAULT_TTL_SECS: i64 = 3_600;

struct Cached {
    fetched_at: DateTime<Utc>,
    catalog: Catalog,
}

pub struct RemoteProvider<S: SheetSource> {
    game: Game,
    source: S,
    ttl: Duration,
    cache: Option<Cached>,
}

impl<S: SheetSource> RemoteProvider<S> {
    pub fn new(game: Game, source: S) -> Self {
        Self {
            game,
            source,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            cache: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Serve from cache while fresh, otherwise fetch and merge.
    pub fn load_at(&mut self, now: DateTime<Utc>) -> Result<LoadedCatalog, ProviderError> {
        if let Some(cached) = &self.cache {
            if now - cached.fetched_at < self.ttl {
                return Ok(LoadedCatalog {
                    catalog: cached.catalog.clone(),
                    source: Source::Cache,
                    warning: None,
                });
            }
        }
        let bundled = self.game.bundled()?;
        match self.fetch_merged(bundled.clone()) {
            Ok(catalog) => {
                info!(game = %self.game, "remote catalog loaded");
                self.cache = Some(Cached {
                    fetched_at: now,
                    catalog: catalog.clone(),
                });
                Ok(LoadedCatalog {
                    catalog,
                    source: Source::Remote,
                    warning: None,
                })
            }
            Err(e) => {
                warn!(game = %self.game, error = %e, "remote catalog unavailable, using bundled data");
                Ok(LoadedCatalog {
                    catalog: bundled,
                    source: Source::Bundled,
                    warning: Some(format!("using local data: {e}")),
                })
            }
        }
    }

    /// Drop the cached copy and fetch again.
    pub fn clear_cache_and_refetch(&mut self) -> Result<LoadedCatalog, ProviderError> {
        self.cache = None;
        self.load()
    }

    fn fetch_merged(&self, mut catalog: Catalog) -> Result<Catalog, ProviderError> {
        let producibles =
            sheets::parse_producibles(&sheets::records(&self.source.fetch(sheets::PRODUCIBLES)?));
        let recipes = sheets::parse_recipes(&sheets::records(&self.source.fetch(sheets::RECIPES)?));
        let templates =
            sheets::parse_templates(&sheets::records(&self.source.fetch(sheets::TEMPLATES)?));
        let settings = sheets::records(&self.source.fetch(sheets::SETTINGS)?);

        let mut touched = sheets::apply_settings(&settings, &mut catalog.settings) > 0;
        if !producibles.is_empty() {
            catalog.producibles = producibles;
            touched = true;
        }
        if !recipes.is_empty() {
            catalog.recipes = recipes;
            touched = true;
        }
        if !templates.is_empty() {
            catalog.templates = templates;
            touched = true;
        }
        if !touched {
            return Err(ProviderError::NoUsableRows);
        }
        validate_catalog(&catalog)?;
        Ok(catalog)
    }
}

impl<S: SheetSource> CatalogProvider for RemoteProvider<S> {
    fn load(&mut self) -> Result<LoadedCatalog, ProviderError> {
        self.load_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::Grid;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeSheets {
        sheets: BTreeMap<String, Grid>,
        fail: bool,
        calls: Cell<usize>,
    }

    impl FakeSheets {
        fn with(mut self, name: &str, rows: &[&[&str]]) -> Self {
            let grid = rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect();
            self.sheets.insert(name.to_string(), grid);
            self
        }
    }

    impl SheetSource for FakeSheets {
        fn fetch(&self, sheet: &str) -> Result<Grid, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ProviderError::Status {
                    sheet: sheet.to_string(),
                    status: 503,
                });
            }
            Ok(self.sheets.get(sheet).cloned().unwrap_or_default())
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn richer_start() -> FakeSheets {
        FakeSheets::default().with("settings", &[&["key", "value"], &["start_money", "999"]])
    }

    #[test]
    fn failing_source_falls_back_to_bundled() {
        let source = FakeSheets {
            fail: true,
            ..FakeSheets::default()
        };
        let loaded = RemoteProvider::new(Game::Alchemoji, source)
            .load_at(t0())
            .unwrap();
        assert_eq!(loaded.source, Source::Bundled);
        assert!(loaded.warning.unwrap().contains("503"));
        assert_eq!(loaded.catalog, Game::Alchemoji.bundled().unwrap());
    }

    #[test]
    fn empty_sheets_count_as_failure() {
        let loaded = RemoteProvider::new(Game::FarmValley, FakeSheets::default())
            .load_at(t0())
            .unwrap();
        assert_eq!(loaded.source, Source::Bundled);
        assert!(loaded.warning.is_some());
    }

    #[test]
    fn remote_rows_overlay_bundled_sections() {
        let mut p = RemoteProvider::new(Game::Alchemoji, richer_start());
        let loaded = p.load_at(t0()).unwrap();
        assert_eq!(loaded.source, Source::Remote);
        assert_eq!(loaded.catalog.settings.start_money, 999);
        assert_eq!(
            loaded.catalog.recipes,
            Game::Alchemoji.bundled().unwrap().recipes
        );
    }

    #[test]
    fn invalid_merge_is_rejected() {
        // recipes still reference items this sheet drops
        let source = FakeSheets::default().with("producibles", &[&["id", "name"], &["fire", "Fire"]]);
        let loaded = RemoteProvider::new(Game::Alchemoji, source)
            .load_at(t0())
            .unwrap();
        assert_eq!(loaded.source, Source::Bundled);
        assert!(loaded.warning.is_some());
    }

    #[test]
    fn cache_serves_until_ttl_expires() {
        let mut p = RemoteProvider::new(Game::Capitalism, richer_start()).with_ttl(Duration::minutes(10));
        p.load_at(t0()).unwrap();
        let fetches = p.source().calls.get();
        assert_eq!(fetches, 4);

        let cached = p.load_at(t0() + Duration::minutes(5)).unwrap();
        assert_eq!(cached.source, Source::Cache);
        assert_eq!(cached.catalog.settings.start_money, 999);
        assert_eq!(p.source().calls.get(), fetches);

        let fresh = p.load_at(t0() + Duration::minutes(11)).unwrap();
        assert_eq!(fresh.source, Source::Remote);
        assert_eq!(p.source().calls.get(), fetches * 2);
    }

    #[test]
    fn clearing_the_cache_refetches() {
        let mut p = RemoteProvider::new(Game::Capitalism, richer_start());
        p.load_at(t0()).unwrap();
        let loaded = p.clear_cache_and_refetch().unwrap();
        assert_eq!(loaded.source, Source::Remote);
        assert_eq!(p.source().calls.get(), 8);
    }
}
