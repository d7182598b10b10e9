#![deny(warnings)]

//! Headless runner: loads a game catalog, plays it with a scripted player on
//! a simulated clock and prints the resulting KPIs.

mod autoplay;

use anyhow::{bail, Context, Result};
use autoplay::{AutoPlayer, Tally};
use idle_catalog::{provider_for, Game, LoadedCatalog};
use idle_core::{Catalog, Timestamp};
use idle_engine::{ManualClock, Session};
use persistence::{BlobStore, FileStore, MemoryStore};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    game: Game,
    minutes: f64,
    tick_ms: Option<u64>,
    save_dir: Option<PathBuf>,
    remote: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        game: Game::Alchemoji,
        minutes: 60.0,
        tick_ms: None,
        save_dir: None,
        remote: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--game" => {
                let name = it.next().context("--game needs a value")?;
                args.game = name.parse().map_err(anyhow::Error::msg)?;
            }
            "--minutes" => {
                args.minutes = it
                    .next()
                    .and_then(|s| s.parse().ok())
                    .filter(|m: &f64| m.is_finite() && *m > 0.0)
                    .context("--minutes needs a positive number")?;
            }
            "--tick-ms" => {
                args.tick_ms = Some(
                    it.next()
                        .and_then(|s| s.parse().ok())
                        .filter(|ms: &u64| *ms > 0)
                        .context("--tick-ms needs a positive integer")?,
                );
            }
            "--save-dir" => args.save_dir = it.next().map(PathBuf::from),
            "--remote" => args.remote = true,
            other => bail!(
                "unknown argument {other}\nusage: idle-cli --game <alchemoji|farm|capitalism> \
                 [--minutes N] [--tick-ms N] [--save-dir DIR] [--remote]"
            ),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    info!(
        ?args,
        sha = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        "starting CLI"
    );

    let LoadedCatalog {
        catalog,
        source,
        warning,
    } = provider_for(args.game, args.remote).load()?;
    if let Some(w) = &warning {
        warn!("{w}");
    }
    info!(game = %catalog.game, ?source, "catalog ready");

    let tick_ms = args.tick_ms.unwrap_or(catalog.settings.tick_interval_ms);
    let steps = (args.minutes * 60_000.0 / tick_ms as f64).ceil() as u64;
    let clock = ManualClock::new(Timestamp(chrono::Utc::now().timestamp_millis()));

    match &args.save_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating save dir {}", dir.display()))?;
            play(catalog, FileStore::new(dir), clock, steps, tick_ms)
        }
        None => play(catalog, MemoryStore::new(), clock, steps, tick_ms),
    }
}

fn play<S: BlobStore>(
    catalog: Catalog,
    store: S,
    clock: ManualClock,
    steps: u64,
    tick_ms: u64,
) -> Result<()> {
    let mut session = Session::start(catalog, store, clock)?;
    let tally = AutoPlayer::new(&mut session).run(steps, tick_ms as i64);
    session.save().context("final save")?;
    report(&session, &tally);
    Ok(())
}

fn report<S: BlobStore>(session: &Session<S, ManualClock>, tally: &Tally) {
    let state = session.state();
    let xp = session.xp_progress();
    let usage = session.inventory_usage();
    println!(
        "Game {} | steps: {} | accepted: {} | rejected: {}",
        state.game, tally.steps, tally.accepted, tally.rejected
    );
    println!(
        "KPI | level: {} ({:.0}%) | money: {} | energy: {:.1} | reputation: {:.1} | earned: {} | spent: {}",
        xp.level,
        xp.pct,
        state.resources.money,
        state.resources.energy,
        state.resources.reputation,
        state.stats.total_earned,
        state.stats.total_spent
    );
    println!(
        "Output | produced: {} | crafted: {} | sold: {} | discovered: {}/{} | inventory: {}{}",
        state.stats.total_produced,
        state.stats.total_crafted,
        state.stats.total_sold,
        state.discovered.len(),
        session.catalog().recipes.len(),
        usage.used,
        usage.capacity.map(|c| format!("/{c}")).unwrap_or_default()
    );
    if let Some(cal) = &state.calendar {
        println!("Calendar | date: {} | months: {}", cal.date, cal.months_elapsed);
    }
    let occupied = state.slots.iter().filter(|s| s.is_occupied()).count();
    println!("Slots | occupied: {occupied}/{}", state.slots.len());
    for (name, count) in &tally.notices {
        println!("  {name}: {count}");
    }
    for (name, value) in &state.stats.counters {
        println!("  counter {name}: {value:.1}");
    }
}
