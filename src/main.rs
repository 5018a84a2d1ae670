//! Tessera - headless driver for the tessera entity store
//!
//! Usage: `tessera [CONFIG.toml] [FRAMES]`
//!
//! Loads a world configuration (defaults when no path is given), then runs a
//! small simulation schedule for a fixed number of frames, logging a summary
//! of each frame.

mod demo;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tessera_core::WorldConfig;
use tessera_ecs::World;

const DEFAULT_FRAMES: u32 = 3;

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => WorldConfig::load(&path)
            .with_context(|| format!("failed to load world config from {path}"))?,
        None => {
            info!("No config given, using defaults");
            WorldConfig::default()
        }
    };
    let frames = match args.next() {
        Some(n) => n
            .parse::<u32>()
            .with_context(|| format!("invalid frame count '{n}'"))?,
        None => DEFAULT_FRAMES,
    };

    info!(?config, frames, "Starting tessera");

    let mut world = World::with_config(config);
    let mut schedule = demo::build(&mut world, frames)?;

    for frame in 0..frames {
        world.insert_resource(demo::Frame(frame));
        let expired = schedule.run_frame(&mut world);
        info!(
            frame,
            entities = world.entity_count(),
            storages = world.storage_count(),
            queries = world.query_count(),
            expired,
            "Frame complete"
        );
    }

    if let Some((entity, slot)) = world.find_inconsistency() {
        anyhow::bail!("bitset of {entity:?} disagrees with storage slot {slot}");
    }
    info!("Done");
    Ok(())
}
