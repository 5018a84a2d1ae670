//! Include/exclude predicates over storage slots.

use crate::bitset::BitSet;
use crate::component::Component;
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::query::QueryId;
use crate::world::{World, WorldId};

/// A compiled structural predicate: the storage slots an entity must occupy
/// and the slots it must not occupy.
///
/// Masks are only meaningful for the world that built them.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Mask {
    pub(crate) include: BitSet,
    pub(crate) exclude: BitSet,
    pub(crate) world: WorldId,
}

impl Mask {
    pub(crate) fn from_slots(
        world: WorldId,
        include: impl IntoIterator<Item = usize>,
        exclude: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            include: include.into_iter().collect(),
            exclude: exclude.into_iter().collect(),
            world,
        }
    }

    pub fn include(&self) -> &BitSet {
        &self.include
    }

    pub fn exclude(&self) -> &BitSet {
        &self.exclude
    }

    /// An entity matches when it has every included slot and none of the excluded ones.
    pub fn matches(&self, bits: &BitSet) -> bool {
        bits.is_disjoint(&self.exclude) && bits.is_superset(&self.include)
    }

    /// Every slot this mask depends on, included or excluded.
    pub(crate) fn referenced_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.include.ones().chain(self.exclude.ones())
    }
}

/// Fluent mask declaration, obtained from [`World::mask`].
///
/// Each declaration resolves its `(type, target)` pair to a storage slot
/// immediately, creating the storage if it does not exist yet. The first
/// invalid relation target is remembered and reported by [`build`](Self::build).
pub struct MaskBuilder<'w> {
    world: &'w mut World,
    include: BitSet,
    exclude: BitSet,
    error: Option<EcsError>,
}

impl<'w> MaskBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self {
            world,
            include: BitSet::new(),
            exclude: BitSet::new(),
            error: None,
        }
    }

    /// Require component `T`.
    pub fn with<T: Component>(mut self) -> Self {
        let slot = self.world.storages.slot_or_create::<T>(0);
        self.include.insert(slot);
        self
    }

    /// Forbid component `T`.
    pub fn without<T: Component>(mut self) -> Self {
        let slot = self.world.storages.slot_or_create::<T>(0);
        self.exclude.insert(slot);
        self
    }

    /// Require a `T` relation pointing at `target`.
    pub fn with_relation<T: Component>(mut self, target: Entity) -> Self {
        if let Some(slot) = self.relation_slot::<T>(target) {
            self.include.insert(slot);
        }
        self
    }

    /// Forbid a `T` relation pointing at `target`.
    pub fn without_relation<T: Component>(mut self, target: Entity) -> Self {
        if let Some(slot) = self.relation_slot::<T>(target) {
            self.exclude.insert(slot);
        }
        self
    }

    fn relation_slot<T: Component>(&mut self, target: Entity) -> Option<usize> {
        match self.world.relation_key_target(target) {
            Ok(index) => Some(self.world.storages.slot_or_create::<T>(index)),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    pub fn build(self) -> EcsResult<Mask> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Mask {
            include: self.include,
            exclude: self.exclude,
            world: self.world.id(),
        })
    }

    /// Build the mask and fetch (or create and seed) its cached query.
    pub fn apply(self) -> EcsResult<QueryId> {
        let world_id = self.world.id();
        let MaskBuilder {
            world,
            include,
            exclude,
            error,
        } = self;
        if let Some(e) = error {
            return Err(e);
        }
        let mask = Mask {
            include,
            exclude,
            world: world_id,
        };
        world.query(&mask)
    }
}
