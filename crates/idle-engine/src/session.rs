//! A running game: owns the catalog, the current state, a blob store and a
//! clock, and funnels every change through [`apply`].

use crate::action::Action;
use crate::outcome::{Notice, Rejection};
use crate::reducer::{apply, new_game};
use crate::views::{self, InventoryUsage, SlotStatus, XpProgress};
use idle_core::{validate_catalog, Catalog, GameState, Timestamp, ValidationError};
use persistence::{BlobStore, SnapshotError};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of wall-clock time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(chrono::Utc::now().timestamp_millis())
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Arc::new(AtomicI64::new(start.millis())))
    }

    pub fn set(&self, at: Timestamp) {
        self.0.store(at.millis(), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance_ms((secs * 1000.0).round() as i64);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.0.load(Ordering::SeqCst))
    }
}

/// Cadences taken from the catalog settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub tick_interval: Duration,
    pub autosave_interval_secs: f64,
    pub storage_key: String,
}

impl SessionConfig {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            tick_interval: Duration::from_millis(catalog.settings.tick_interval_ms.max(1)),
            autosave_interval_secs: catalog.settings.autosave_interval_secs,
            storage_key: catalog.storage_key(),
        }
    }
}

pub struct Session<S: BlobStore, C: Clock> {
    catalog: Catalog,
    state: GameState,
    store: S,
    clock: C,
    config: SessionConfig,
    last_autosave: Timestamp,
}

impl<S: BlobStore, C: Clock> Session<S, C> {
    /// Validate the catalog and restore the saved game, if any.
    pub fn start(catalog: Catalog, store: S, clock: C) -> Result<Self, ValidationError> {
        validate_catalog(&catalog)?;
        let config = SessionConfig::from_catalog(&catalog);
        let now = clock.now();
        let fresh = new_game(&catalog, now);
        let state =
            persistence::load_or_default(&store, &config.storage_key, fresh, &catalog, now);
        info!(
            game = %catalog.game,
            level = state.progression.level,
            money = state.resources.money,
            "session started"
        );
        Ok(Self {
            catalog,
            state,
            store,
            clock,
            config,
            last_autosave: now,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Apply `action` at the clock's current time.
    pub fn dispatch(&mut self, action: Action) -> Result<Vec<Notice>, Rejection> {
        let transition = apply(&self.catalog, &self.state, self.clock.now(), &action);
        if let Some(rejection) = transition.rejected {
            return Err(rejection);
        }
        for notice in &transition.notices {
            debug!(?notice, "notice");
        }
        self.state = transition.state;
        Ok(transition.notices)
    }

    /// Advance the simulation to now and autosave when due.
    pub fn tick(&mut self) -> Vec<Notice> {
        let notices = self.dispatch(Action::Tick).unwrap_or_default();
        self.autosave_if_due();
        notices
    }

    /// Record the save time and write the state to the store.
    pub fn save(&mut self) -> Result<(), SnapshotError> {
        let now = self.clock.now();
        let marked = apply(&self.catalog, &self.state, now, &Action::MarkSaved);
        persistence::save(&mut self.store, &self.config.storage_key, &marked.state)?;
        self.state = marked.state;
        self.last_autosave = now;
        debug!(key = %self.config.storage_key, "state saved");
        Ok(())
    }

    fn autosave_if_due(&mut self) {
        let now = self.clock.now();
        if now.secs_since(self.last_autosave) < self.config.autosave_interval_secs {
            return;
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "autosave failed, continuing in memory");
            self.last_autosave = now;
        }
    }

    /// Tick on the configured interval for `duration` of real time.
    pub fn run_for(&mut self, duration: Duration) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            std::thread::sleep(self.config.tick_interval);
            elapsed += self.config.tick_interval;
            notices.extend(self.tick());
        }
        notices
    }

    pub fn inventory_usage(&self) -> InventoryUsage {
        views::inventory_usage(&self.catalog, &self.state)
    }

    pub fn xp_progress(&self) -> XpProgress {
        views::xp_progress(&self.catalog, &self.state)
    }

    /// Status and cycle progress of every slot, in layout order.
    pub fn slot_statuses(&self) -> Vec<(String, SlotStatus, f64)> {
        let now = self.clock.now();
        self.state
            .slots
            .iter()
            .map(|slot| {
                (
                    slot.slot_id.clone(),
                    views::slot_status(&self.catalog, &self.state, slot, now),
                    views::slot_progress_pct(&self.catalog, slot, now),
                )
            })
            .collect()
    }

    pub fn sell_value(&self, item_id: &str, amount: u64) -> u64 {
        views::sell_value(&self.state, item_id, amount)
    }
}

impl<S: BlobStore, C: Clock> Drop for Session<S, C> {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "final save failed");
        }
    }
}
