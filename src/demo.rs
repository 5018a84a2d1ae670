//! Demo schedule exercising spawning, cached queries, relations, and events.

use anyhow::Result;
use tracing::{info, warn};

use tessera_ecs::{ConsumerId, EcsResult, Entity, SystemSchedule, World};

/// Index of the frame being run, stored as a resource.
pub struct Frame(pub u32);

#[derive(Debug, Clone, Copy, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

/// Relation: the owner follows its target around.
#[derive(Debug, Clone, Copy)]
pub struct Follows {
    pub distance: f32,
}

/// Event sent whenever a mover is spawned.
#[derive(Debug, Default)]
pub struct Spawned {
    pub entity: Option<Entity>,
}

/// The entity every mover follows, stored as a resource.
struct Leader(Entity);

/// Set up the leader entity and return the schedule that drives the demo.
pub fn build(world: &mut World, frames: u32) -> Result<SystemSchedule> {
    let leader = world.spawn();
    world.insert(leader, Position::default())?;
    world.insert_resource(Leader(leader));

    let mut schedule = SystemSchedule::new();
    schedule.add_system(spawn_movers);
    schedule.add_system(move_movers);
    schedule.add_system(log_spawns);
    schedule.add_system(move |world: &mut World, _: ConsumerId| {
        disband_on_last_frame(world, frames)
    });
    Ok(schedule)
}

fn spawn_movers(world: &mut World, _: ConsumerId) {
    let Some(leader) = world.resource::<Leader>().map(|l| l.0) else {
        return;
    };
    if !world.is_alive(leader) {
        return;
    }
    let frame = world.resource::<Frame>().map_or(0, |f| f.0);
    for i in 0..2 {
        let step = (frame * 2 + i) as f32;
        match spawn_mover(world, leader, step) {
            Ok(mover) => world.send::<Spawned>().entity = Some(mover),
            Err(e) => warn!("Failed to set up mover: {e}"),
        }
    }
}

fn spawn_mover(world: &mut World, leader: Entity, step: f32) -> EcsResult<Entity> {
    let mover = world.spawn();
    world.insert(mover, Position::default())?;
    world.insert(mover, Velocity { dx: step, dy: 1.0 })?;
    world.insert_relation(mover, leader, Follows { distance: step })?;
    Ok(mover)
}

fn move_movers(world: &mut World, _: ConsumerId) {
    let query = match world.mask().with::<Position>().with::<Velocity>().apply() {
        Ok(query) => query,
        Err(e) => {
            warn!("Failed to build mover query: {e}");
            return;
        }
    };
    let result = world.for_each(query, |world, entity| {
        let Ok(&velocity) = world.get::<Velocity>(entity) else {
            return;
        };
        if let Ok(position) = world.get_mut::<Position>(entity) {
            position.x += velocity.dx;
            position.y += velocity.dy;
        }
    });
    if let Err(e) = result {
        warn!("Failed to move movers: {e}");
    }
}

fn log_spawns(world: &mut World, me: ConsumerId) {
    let mut spawned = Vec::new();
    world.receive::<Spawned>(me, |event| spawned.extend(event.entity));
    if !spawned.is_empty() {
        info!("Spawned {} movers: {:?}", spawned.len(), spawned);
    }
}

fn disband_on_last_frame(world: &mut World, frames: u32) {
    let frame = world.resource::<Frame>().map_or(0, |f| f.0);
    if frame + 1 != frames {
        return;
    }
    let Some(leader) = world.resource::<Leader>().map(|l| l.0) else {
        return;
    };
    let distances: Vec<f32> = world
        .iter_relation::<Follows>(leader)
        .map(|(_, follows)| follows.distance)
        .collect();
    let followers = distances.len();
    let farthest = distances.into_iter().fold(0.0f32, f32::max);
    world.despawn(leader);
    let remaining = world
        .entities()
        .filter(|e| !world.relation_targets::<Follows>(*e).is_empty())
        .count();
    info!(followers, farthest, remaining, "Leader despawned, relations cleaned up");
}
