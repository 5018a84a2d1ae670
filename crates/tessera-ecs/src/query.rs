//! Cached, incrementally maintained query results.
//!
//! One [`Query`] exists per distinct [`Mask`]. Each query is registered under
//! every storage slot its mask includes *or* excludes, so a structural change
//! to any slot re-evaluates exactly the one changed entity against exactly the
//! queries that depend on that slot. Queries with an empty include set match
//! entities that have no components at all, so they are additionally told
//! about spawns and despawns.

use std::collections::HashMap;

use tracing::debug;

use crate::bitset::BitSet;
use crate::entity::Entity;
use crate::mask::Mask;
use crate::world::WorldId;

/// Handle to a cached query in a specific world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId {
    pub(crate) world: WorldId,
    pub(crate) index: usize,
}

/// Live membership of one mask.
#[derive(Debug)]
pub struct Query {
    mask: Mask,
    members: Vec<Entity>,
    /// Entity slot index → position in `members`.
    positions: HashMap<u32, usize>,
}

impl Query {
    pub(crate) fn new(mask: Mask) -> Self {
        Self {
            mask,
            members: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Current members. Order is insertion order, except that removals move
    /// the last member into the freed position.
    pub fn entities(&self) -> &[Entity] {
        &self.members
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.positions
            .get(&entity.index)
            .is_some_and(|&pos| self.members[pos] == entity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Re-evaluate one entity against the mask and fix up membership.
    pub(crate) fn reconcile(&mut self, entity: Entity, bits: &BitSet) {
        let present = self.positions.contains_key(&entity.index);
        match (self.mask.matches(bits), present) {
            (true, false) => {
                self.positions.insert(entity.index, self.members.len());
                self.members.push(entity);
            }
            (false, true) => self.evict(entity.index),
            _ => {}
        }
    }

    pub(crate) fn evict(&mut self, index: u32) {
        let Some(pos) = self.positions.remove(&index) else {
            return;
        };
        self.members.swap_remove(pos);
        if let Some(moved) = self.members.get(pos) {
            self.positions.insert(moved.index, pos);
        }
    }
}

/// Every query of a world plus the slot → query registrations that drive
/// incremental maintenance.
pub(crate) struct QueryCache {
    queries: Vec<Query>,
    by_mask: HashMap<Mask, usize>,
    by_slot: Vec<Vec<usize>>,
    unfiltered: Vec<usize>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            queries: Vec::new(),
            by_mask: HashMap::new(),
            by_slot: Vec::new(),
            unfiltered: Vec::new(),
        }
    }

    pub fn lookup(&self, mask: &Mask) -> Option<usize> {
        self.by_mask.get(mask).copied()
    }

    /// Register an already seeded query and return its index.
    pub fn insert(&mut self, query: Query) -> usize {
        let index = self.queries.len();
        for slot in query.mask.referenced_slots() {
            if slot >= self.by_slot.len() {
                self.by_slot.resize_with(slot + 1, Vec::new);
            }
            self.by_slot[slot].push(index);
        }
        if query.mask.include.is_empty() {
            self.unfiltered.push(index);
        }
        debug!(
            query = index,
            include = ?query.mask.include,
            exclude = ?query.mask.exclude,
            seeded = query.len(),
            "created query"
        );
        self.by_mask.insert(query.mask.clone(), index);
        self.queries.push(query);
        index
    }

    pub fn get(&self, index: usize) -> &Query {
        &self.queries[index]
    }

    /// `entity` gained or lost storage `slot`; `bits` is its updated bitset.
    pub fn on_change(&mut self, slot: usize, entity: Entity, bits: &BitSet) {
        let Some(registered) = self.by_slot.get(slot) else {
            return;
        };
        for &index in registered {
            self.queries[index].reconcile(entity, bits);
        }
    }

    pub fn on_spawn(&mut self, entity: Entity, bits: &BitSet) {
        for &index in &self.unfiltered {
            self.queries[index].reconcile(entity, bits);
        }
    }

    /// Called after every slot of `entity` has been cleared.
    pub fn on_despawn(&mut self, entity: Entity) {
        for &index in &self.unfiltered {
            self.queries[index].evict(entity.index);
        }
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    fn bits(slots: &[usize]) -> BitSet {
        slots.iter().copied().collect()
    }

    #[test]
    fn reconcile_adds_and_evicts() {
        let world = World::new();
        let mask = Mask::from_slots(world.id(), [0], [1]);
        let mut query = Query::new(mask);
        let e1 = Entity::from_raw(1, 1);
        let e2 = Entity::from_raw(2, 1);

        query.reconcile(e1, &bits(&[0]));
        query.reconcile(e2, &bits(&[0, 2]));
        assert_eq!(query.entities(), &[e1, e2]);

        query.reconcile(e1, &bits(&[0, 1]));
        assert_eq!(query.entities(), &[e2]);
        assert!(!query.contains(e1));
        assert!(query.contains(e2));

        // Re-evaluating an unchanged match is a no-op.
        query.reconcile(e2, &bits(&[0, 2]));
        assert_eq!(query.len(), 1);
    }

    #[test]
    fn contains_checks_generation() {
        let world = World::new();
        let mut query = Query::new(Mask::from_slots(world.id(), [0], []));
        query.reconcile(Entity::from_raw(1, 1), &bits(&[0]));
        assert!(!query.contains(Entity::from_raw(1, 2)));
    }

    #[test]
    fn notifications_follow_registration() {
        let world = World::new();
        let mut cache = QueryCache::new();
        let q = cache.insert(Query::new(Mask::from_slots(world.id(), [0], [1])));
        let other = cache.insert(Query::new(Mask::from_slots(world.id(), [2], [])));
        let e = Entity::from_raw(1, 1);

        cache.on_change(0, e, &bits(&[0]));
        assert!(cache.get(q).contains(e));
        assert!(cache.get(other).is_empty());

        // Excluded slot changes drive the transition out.
        cache.on_change(1, e, &bits(&[0, 1]));
        assert!(!cache.get(q).contains(e));

        // Unregistered slot: nothing happens.
        cache.on_change(7, e, &bits(&[0, 7]));
        assert!(cache.get(q).is_empty());
    }

    #[test]
    fn unfiltered_queries_track_spawns() {
        let world = World::new();
        let mut cache = QueryCache::new();
        let q = cache.insert(Query::new(Mask::from_slots(world.id(), [], [3])));
        let e = Entity::from_raw(4, 1);
        cache.on_spawn(e, &BitSet::new());
        assert!(cache.get(q).contains(e));
        cache.on_despawn(e);
        assert!(cache.get(q).is_empty());
        assert_eq!(cache.lookup(&Mask::from_slots(world.id(), [], [3])), Some(q));
    }
}
