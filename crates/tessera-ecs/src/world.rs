use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{trace, warn};

use tessera_core::WorldConfig;

use crate::bitset::BitSet;
use crate::component::Component;
use crate::entity::{Entity, EntityAllocator, SENTINEL_INDEX};
use crate::error::{EcsError, EcsResult};
use crate::event::{Added, DeliveryRecord, EventLifetime, Removed};
use crate::mask::{Mask, MaskBuilder};
use crate::query::{Query, QueryCache, QueryId};
use crate::storage::{StorageKey, Storages};

/// Process-unique identity of a world, used to reject masks and query handles
/// built by another world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(u64);

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(0);

/// Sends a structural event for a tracked component type.
type StructuralHook = fn(&mut World, Entity, Option<Entity>);

/// Event senders registered by [`World::track`]. Kept as fn pointers so the
/// generic insert/remove paths never name `Added<T>` or `Removed<T>`.
#[derive(Clone, Copy)]
struct TrackedHooks {
    added: StructuralHook,
    removed: StructuralHook,
}

/// The central store. Owns all entity slots, bitsets, storages, and query caches.
///
/// Slot 0 is held by a sentinel entity that carries resources. It is never
/// returned from [`spawn`](Self::spawn), never appears in query results, and
/// every public component operation treats it as not alive.
pub struct World {
    id: WorldId,
    config: WorldConfig,
    pub(crate) entities: EntityAllocator,
    /// Per entity slot: bit `s` is set iff storage slot `s` holds a value for it.
    pub(crate) bitsets: Vec<BitSet>,
    pub(crate) storages: Storages,
    pub(crate) queries: QueryCache,
    tracked: HashMap<TypeId, TrackedHooks>,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        let mut bitsets = Vec::with_capacity(config.entity_capacity.max(1));
        bitsets.push(BitSet::new());
        Self {
            id: WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed)),
            entities: EntityAllocator::with_capacity(config.entity_capacity),
            bitsets,
            storages: Storages::with_capacity(config.storage_capacity),
            queries: QueryCache::new(),
            tracked: HashMap::new(),
            config,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ---- Entity management ----

    /// Spawn a new entity with no components.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.allocate();
        let idx = entity.index as usize;
        if idx < self.bitsets.len() {
            self.bitsets[idx].clear();
        } else {
            let hint = self.storages.len();
            self.bitsets
                .resize_with(idx + 1, || BitSet::with_capacity(hint));
        }
        self.queries.on_spawn(entity, &self.bitsets[idx]);
        entity
    }

    /// Despawn an entity, removing all its components and every relation that
    /// points at it. Returns `false` (and does nothing) if it was not alive.
    ///
    /// Relation cleanup visits each storage keyed on this entity as a target
    /// and removes every owner's entry, so its cost is proportional to the
    /// number of relation storages targeting the entity times their owners.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.check_alive(entity).is_err() {
            return false;
        }
        let slots: Vec<usize> = self.bitsets[entity.index as usize].ones().collect();
        for slot in slots {
            self.detach(entity, slot);
        }
        self.cascade(entity);
        self.queries.on_despawn(entity);
        self.entities.deallocate(entity);
        true
    }

    /// Remove every relation entry that targets `target`.
    fn cascade(&mut self, target: Entity) {
        let slots = self.storages.relation_slots(target.index).to_vec();
        for slot in slots {
            let owners: Vec<Entity> = self
                .storages
                .by_slot(slot)
                .entity_indices()
                .iter()
                .filter_map(|&i| self.entities.current(i))
                .collect();
            if owners.is_empty() {
                continue;
            }
            trace!(
                %target,
                slot,
                owners = owners.len(),
                component = self.storages.by_slot(slot).type_name(),
                "cascading relation cleanup"
            );
            for owner in owners {
                self.detach(owner, slot);
            }
        }
    }

    /// Type-erased removal of `entity`'s value in `slot`.
    fn detach(&mut self, entity: Entity, slot: usize) -> bool {
        if !self.storages.by_slot_mut(slot).remove(entity.index) {
            return false;
        }
        let idx = entity.index as usize;
        self.bitsets[idx].remove(slot);
        self.queries.on_change(slot, entity, &self.bitsets[idx]);

        let key = self.storages.by_slot(slot).key();
        if let Some(hooks) = self.tracked.get(&key.type_id).copied() {
            let target = self.entities.current(key.target);
            (hooks.removed)(self, entity, target);
        }
        true
    }

    /// Check whether an entity is alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        entity.index != SENTINEL_INDEX && self.entities.is_alive(entity)
    }

    /// Number of alive entities, events included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    pub(crate) fn check_alive(&self, entity: Entity) -> EcsResult<()> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::NotAlive(entity))
        }
    }

    /// Validate a relation target and return the slot index used in storage keys.
    pub(crate) fn relation_key_target(&self, target: Entity) -> EcsResult<u32> {
        if target.index == SENTINEL_INDEX {
            return Err(EcsError::InvalidTarget(target));
        }
        self.check_alive(target)?;
        Ok(target.index)
    }

    // ---- Component management ----

    /// Store `value` without liveness checks, keeping bitset and queries in step.
    pub(crate) fn insert_at<T: Component>(
        &mut self,
        entity: Entity,
        target: Option<Entity>,
        value: T,
    ) -> &mut T {
        let slot = self
            .storages
            .slot_or_create::<T>(target.map_or(0, |t| t.index));
        let idx = entity.index as usize;
        let fresh = self.bitsets[idx].insert(slot);
        if fresh && entity.index != SENTINEL_INDEX {
            if let Some(hooks) = self.tracked.get(&TypeId::of::<T>()).copied() {
                (hooks.added)(self, entity, target);
            }
            self.queries.on_change(slot, entity, &self.bitsets[idx]);
        }
        let (stored, _) = self.storages.typed_mut::<T>(slot).set.insert(entity.index, value);
        stored
    }

    /// Take the value out without liveness checks, keeping bitset and queries in step.
    pub(crate) fn remove_at<T: Component>(
        &mut self,
        entity: Entity,
        target: Option<Entity>,
    ) -> Option<T> {
        let key = StorageKey::of::<T>(target.map_or(0, |t| t.index));
        let slot = self.storages.slot_of(&key)?;
        let value = self.storages.typed_mut::<T>(slot).set.take(entity.index)?;
        let idx = entity.index as usize;
        self.bitsets[idx].remove(slot);
        if entity.index != SENTINEL_INDEX {
            if let Some(hooks) = self.tracked.get(&TypeId::of::<T>()).copied() {
                (hooks.removed)(self, entity, target);
            }
            self.queries.on_change(slot, entity, &self.bitsets[idx]);
        }
        Some(value)
    }

    fn bit(&self, entity: Entity, key: StorageKey) -> bool {
        self.storages
            .slot_of(&key)
            .is_some_and(|slot| self.bitsets[entity.index as usize].contains(slot))
    }

    /// Insert a component on an entity. Replaces any existing component of the
    /// same type and returns the stored value for in-place initialization.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> EcsResult<&mut T> {
        self.check_alive(entity)?;
        Ok(self.insert_at(entity, None, component))
    }

    /// Insert `T::default()` and return it for in-place initialization.
    pub fn insert_default<T: Component + Default>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.insert(entity, T::default())
    }

    /// Get an immutable reference to a component on an entity.
    pub fn get<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        self.check_alive(entity)?;
        self.storages
            .get::<T>(0)
            .and_then(|s| s.get(entity.index))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Get a mutable reference to a component on an entity.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.check_alive(entity)?;
        self.storages
            .get_mut::<T>(0)
            .and_then(|s| s.set.get_mut(entity.index))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Remove a component from an entity. Removing an absent component is a
    /// no-op that returns `Ok(None)`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> EcsResult<Option<T>> {
        self.check_alive(entity)?;
        Ok(self.remove_at(entity, None))
    }

    /// Check whether an entity has a component of the given type.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity) && self.bit(entity, StorageKey::of::<T>(0))
    }

    // ---- Relations ----

    /// Attach relation data `value` of type `T` from `entity` to `target`.
    pub fn insert_relation<T: Component>(
        &mut self,
        entity: Entity,
        target: Entity,
        value: T,
    ) -> EcsResult<&mut T> {
        self.check_alive(entity)?;
        self.relation_key_target(target)?;
        Ok(self.insert_at(entity, Some(target), value))
    }

    pub fn get_relation<T: Component>(&self, entity: Entity, target: Entity) -> EcsResult<&T> {
        self.check_alive(entity)?;
        let key_target = self.relation_key_target(target)?;
        self.storages
            .get::<T>(key_target)
            .and_then(|s| s.get(entity.index))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    pub fn get_relation_mut<T: Component>(
        &mut self,
        entity: Entity,
        target: Entity,
    ) -> EcsResult<&mut T> {
        self.check_alive(entity)?;
        let key_target = self.relation_key_target(target)?;
        self.storages
            .get_mut::<T>(key_target)
            .and_then(|s| s.set.get_mut(entity.index))
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    pub fn remove_relation<T: Component>(
        &mut self,
        entity: Entity,
        target: Entity,
    ) -> EcsResult<Option<T>> {
        self.check_alive(entity)?;
        self.relation_key_target(target)?;
        Ok(self.remove_at(entity, Some(target)))
    }

    pub fn has_relation<T: Component>(&self, entity: Entity, target: Entity) -> bool {
        self.is_alive(entity)
            && self.is_alive(target)
            && self.bit(entity, StorageKey::of::<T>(target.index))
    }

    /// Every entity `entity` currently holds a `T` relation to.
    pub fn relation_targets<T: Component>(&self, entity: Entity) -> Vec<Entity> {
        if !self.is_alive(entity) {
            return Vec::new();
        }
        let bits = &self.bitsets[entity.index as usize];
        self.storages
            .relations_of::<T>()
            .filter(|(_, storage)| bits.contains(storage.slot()))
            .filter_map(|(target, _)| self.entities.current(target))
            .collect()
    }

    // ---- Structural events ----

    /// Send `Added<T>` / `Removed<T>` events whenever a `T` is attached to or
    /// detached from any entity, including removals caused by despawns.
    ///
    /// Event bookkeeping types ([`DeliveryRecord`], [`EventLifetime`]) cannot
    /// be tracked, since every event carries them. Returns `false` for those.
    pub fn track<T: Component>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();
        if type_id == TypeId::of::<DeliveryRecord>() || type_id == TypeId::of::<EventLifetime>() {
            warn!(component = type_name::<T>(), "refusing to track event bookkeeping type");
            return false;
        }
        self.tracked.insert(
            type_id,
            TrackedHooks {
                added: send_added::<T>,
                removed: send_removed::<T>,
            },
        );
        true
    }

    // ---- Queries ----

    /// Start declaring a mask against this world.
    pub fn mask(&mut self) -> MaskBuilder<'_> {
        MaskBuilder::new(self)
    }

    /// Fetch the cached query for `mask`, creating and seeding it on first use.
    pub fn query(&mut self, mask: &Mask) -> EcsResult<QueryId> {
        if mask.world != self.id {
            return Err(EcsError::ForeignWorld);
        }
        Ok(QueryId {
            world: self.id,
            index: self.query_index(mask),
        })
    }

    pub(crate) fn query_index(&mut self, mask: &Mask) -> usize {
        if let Some(index) = self.queries.lookup(mask) {
            return index;
        }
        let mut query = Query::new(mask.clone());
        for entity in self.entities.iter_alive() {
            query.reconcile(entity, &self.bitsets[entity.index as usize]);
        }
        self.queries.insert(query)
    }

    pub fn get_query(&self, id: QueryId) -> EcsResult<&Query> {
        if id.world != self.id {
            return Err(EcsError::ForeignWorld);
        }
        Ok(self.queries.get(id.index))
    }

    /// The live member list of a query.
    pub fn query_entities(&self, id: QueryId) -> EcsResult<&[Entity]> {
        Ok(self.get_query(id)?.entities())
    }

    /// A copy of the query's current members.
    pub fn snapshot(&self, id: QueryId) -> EcsResult<Vec<Entity>> {
        Ok(self.query_entities(id)?.to_vec())
    }

    /// Run `f` for each member of the query.
    ///
    /// Iteration runs over a snapshot taken before the first call, so `f` may
    /// add, remove, spawn, and despawn freely. Members despawned by an earlier
    /// call in the same pass are skipped.
    pub fn for_each(
        &mut self,
        id: QueryId,
        mut f: impl FnMut(&mut World, Entity),
    ) -> EcsResult<()> {
        for entity in self.snapshot(id)? {
            if self.is_alive(entity) {
                f(self, entity);
            }
        }
        Ok(())
    }

    /// Iterate `(Entity, &T)` over every entity holding a plain `T`.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.iter_keyed::<T>(Some(0))
    }

    /// Iterate `(owner, &T)` over every `T` relation pointing at `target`.
    pub fn iter_relation<T: Component>(
        &self,
        target: Entity,
    ) -> impl Iterator<Item = (Entity, &T)> {
        self.iter_keyed::<T>(self.relation_key_target(target).ok())
    }

    fn iter_keyed<T: Component>(
        &self,
        key_target: Option<u32>,
    ) -> impl Iterator<Item = (Entity, &T)> {
        key_target
            .and_then(|target| self.storages.get::<T>(target))
            .into_iter()
            .flat_map(|storage| storage.iter())
            .filter_map(|(index, value)| Some((self.entities.current(index)?, value)))
    }

    // ---- Introspection ----

    /// The storage slot of plain component `T`, if its storage exists.
    pub fn storage_slot<T: Component>(&self) -> Option<usize> {
        self.storages.slot_of(&StorageKey::of::<T>(0))
    }

    /// Number of storages created so far.
    pub fn storage_count(&self) -> usize {
        self.storages.len()
    }

    /// Number of distinct cached queries.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// The membership bitset of a live entity.
    pub fn bits(&self, entity: Entity) -> Option<&BitSet> {
        self.is_alive(entity)
            .then(|| &self.bitsets[entity.index as usize])
    }

    /// Check that every entity's bitset agrees with storage membership.
    /// Returns the first disagreement found, as `(entity, storage slot)`.
    pub fn find_inconsistency(&self) -> Option<(Entity, usize)> {
        for entity in self.entities.iter_alive() {
            let bits = &self.bitsets[entity.index as usize];
            for storage in self.storages.iter() {
                if bits.contains(storage.slot()) != storage.has(entity.index) {
                    return Some((entity, storage.slot()));
                }
            }
        }
        None
    }
}

fn send_added<T: Component>(world: &mut World, entity: Entity, target: Option<Entity>) {
    world.send_value(Added::<T>::new(entity, target));
}

fn send_removed<T: Component>(world: &mut World, entity: Entity, target: Option<Entity>) {
    world.send_value(Removed::<T>::new(entity, target));
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
