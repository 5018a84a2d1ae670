//! Randomized structural mutation against incrementally maintained queries.
//!
//! After every operation, each cached query's membership must equal the set
//! of entities that match its mask when recomputed from scratch, and every
//! entity's bitset must agree with storage membership.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_ecs::{Entity, QueryId, World};

#[derive(Debug, Clone, Copy)]
struct A(u32);
#[derive(Debug, Clone, Copy)]
struct B;
#[derive(Debug, Clone, Copy)]
struct C;
#[derive(Debug, Clone, Copy)]
struct Likes;

#[derive(Clone, Copy)]
enum Shape {
    WithA,
    WithAWithoutB,
    WithBWithC,
    WithoutC,
    WithAWithoutBWithoutC,
    LikesAnchor,
    WithAWithoutLikesAnchor,
}

const SHAPES: [Shape; 7] = [
    Shape::WithA,
    Shape::WithAWithoutB,
    Shape::WithBWithC,
    Shape::WithoutC,
    Shape::WithAWithoutBWithoutC,
    Shape::LikesAnchor,
    Shape::WithAWithoutLikesAnchor,
];

/// `anchor` is spawned first and never despawned, so relation masks on it stay valid.
fn build(world: &mut World, shape: Shape, anchor: Entity) -> QueryId {
    let mask = world.mask();
    let mask = match shape {
        Shape::WithA => mask.with::<A>(),
        Shape::WithAWithoutB => mask.with::<A>().without::<B>(),
        Shape::WithBWithC => mask.with::<B>().with::<C>(),
        Shape::WithoutC => mask.without::<C>(),
        Shape::WithAWithoutBWithoutC => mask.with::<A>().without::<B>().without::<C>(),
        Shape::LikesAnchor => mask.with_relation::<Likes>(anchor),
        Shape::WithAWithoutLikesAnchor => mask.with::<A>().without_relation::<Likes>(anchor),
    };
    mask.apply().unwrap()
}

fn expected(world: &World, shape: Shape, anchor: Entity, e: Entity) -> bool {
    let (a, b, c) = (world.has::<A>(e), world.has::<B>(e), world.has::<C>(e));
    let likes = world.has_relation::<Likes>(e, anchor);
    match shape {
        Shape::WithA => a,
        Shape::WithAWithoutB => a && !b,
        Shape::WithBWithC => b && c,
        Shape::WithoutC => !c,
        Shape::WithAWithoutBWithoutC => a && !b && !c,
        Shape::LikesAnchor => likes,
        Shape::WithAWithoutLikesAnchor => a && !likes,
    }
}

fn check(world: &World, anchor: Entity, queries: &[(Shape, QueryId)]) {
    assert_eq!(world.find_inconsistency(), None);
    for e in world.entities() {
        assert_eq!(world.has::<A>(e), world.get::<A>(e).is_ok());
        assert_eq!(world.has::<B>(e), world.get::<B>(e).is_ok());
    }
    for &(shape, id) in queries {
        let members = world.query_entities(id).unwrap();
        let actual: HashSet<Entity> = members.iter().copied().collect();
        assert_eq!(actual.len(), members.len(), "duplicate members");
        let scratch: HashSet<Entity> = world.entities().filter(|e| expected(world, shape, anchor, *e)).collect();
        assert_eq!(actual, scratch);
    }
}

/// Relation targets lean towards the anchor so anchor-relation queries see churn.
fn pick_target(rng: &mut StdRng, live: &[Entity], anchor: Entity) -> Entity {
    if rng.gen_bool(0.5) {
        anchor
    } else {
        live[rng.gen_range(0..live.len())]
    }
}

fn run(seed: u64, steps: usize, early_queries: bool) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut world = World::new();
    let anchor = world.spawn();
    let mut live: Vec<Entity> = Vec::new();
    let mut dead: Vec<Entity> = Vec::new();
    let mut queries = Vec::new();

    if early_queries {
        for shape in SHAPES {
            queries.push((shape, build(&mut world, shape, anchor)));
        }
    }

    for step in 0..steps {
        if !early_queries && step == steps / 2 {
            for shape in SHAPES {
                queries.push((shape, build(&mut world, shape, anchor)));
            }
        }

        let op = rng.gen_range(0..10);
        if live.is_empty() || op == 0 {
            live.push(world.spawn());
        } else {
            let e = live[rng.gen_range(0..live.len())];
            match op {
                1 => {
                    world.despawn(e);
                    live.retain(|x| *x != e);
                    dead.push(e);
                }
                2 => {
                    world.insert(e, A(step as u32)).unwrap();
                }
                3 => {
                    world.remove::<A>(e).unwrap();
                }
                4 => {
                    world.insert(e, B).unwrap();
                }
                5 => {
                    world.remove::<B>(e).unwrap();
                }
                6 => {
                    world.insert(e, C).unwrap();
                }
                7 => {
                    world.remove::<C>(e).unwrap();
                }
                8 => {
                    let target = pick_target(&mut rng, &live, anchor);
                    world.insert_relation(e, target, Likes).unwrap();
                }
                _ => {
                    let target = pick_target(&mut rng, &live, anchor);
                    world.remove_relation::<Likes>(e, target).unwrap();
                }
            }
        }
        check(&world, anchor, &queries);
    }

    assert!(world.is_alive(anchor));
    for e in dead {
        assert!(!world.is_alive(e));
    }
    for e in &live {
        for target in world.relation_targets::<Likes>(*e) {
            assert!(world.is_alive(target));
        }
    }
}

#[test]
fn incremental_matches_scratch_with_early_queries() {
    for seed in 0..8 {
        run(seed, 400, true);
    }
}

#[test]
fn incremental_matches_scratch_with_late_queries() {
    for seed in 100..108 {
        run(seed, 400, false);
    }
}

#[test]
fn relations_never_dangle() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut world = World::new();
    let entities: Vec<Entity> = (0..32).map(|_| world.spawn()).collect();
    for _ in 0..200 {
        let owner = entities[rng.gen_range(0..entities.len())];
        let target = entities[rng.gen_range(0..entities.len())];
        if world.is_alive(owner) && world.is_alive(target) {
            world.insert_relation(owner, target, Likes).unwrap();
        }
    }
    for e in entities.iter().step_by(3) {
        world.despawn(*e);
    }
    for e in world.entities().collect::<Vec<_>>() {
        for target in world.relation_targets::<Likes>(e) {
            assert!(world.is_alive(target), "{e:?} still points at {target:?}");
        }
    }
    assert_eq!(world.find_inconsistency(), None);
}
