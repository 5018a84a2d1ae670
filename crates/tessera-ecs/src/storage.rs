//! Keyed component storages.
//!
//! Every storage is identified by a [`StorageKey`]: the component type plus an
//! optional relation target. Plain components use target 0; relation data is
//! kept in a separate storage per target entity. Each storage is assigned a
//! slot index when it is first created. Slot indices are never reused and
//! storages are never dropped, so a slot index stays valid for the lifetime
//! of the world and can be used as a bit position in entity bitsets.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use tracing::debug;

use crate::component::{Component, SparseSet};

/// Composite identity of a storage: component type and relation target slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub type_id: TypeId,
    /// Slot index of the relation target, or 0 for a plain component.
    pub target: u32,
}

impl StorageKey {
    pub fn of<T: Component>(target: u32) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            target,
        }
    }

    pub fn is_relation(&self) -> bool {
        self.target != 0
    }
}

/// Type-erased storage interface used for structural operations that don't
/// know the component type (despawn, relation cascade, consistency checks).
pub(crate) trait ComponentStorage: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn key(&self) -> StorageKey;
    fn slot(&self) -> usize;
    fn type_name(&self) -> &'static str;
    fn has(&self, index: u32) -> bool;
    /// Drop the entry for `index`. Returns `true` if one existed.
    fn remove(&mut self, index: u32) -> bool;
    fn entity_indices(&self) -> &[u32];
}

/// Values of one component type for one relation target.
pub struct Storage<T> {
    key: StorageKey,
    slot: usize,
    pub(crate) set: SparseSet<T>,
}

impl<T: Component> Storage<T> {
    fn new(key: StorageKey, slot: usize) -> Self {
        Self {
            key,
            slot,
            set: SparseSet::new(),
        }
    }

    pub fn key(&self) -> StorageKey {
        self.key
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.set.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.set.iter()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl<T: Component> ComponentStorage for Storage<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn key(&self) -> StorageKey {
        self.key
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn has(&self, index: u32) -> bool {
        self.set.contains(index)
    }

    fn remove(&mut self, index: u32) -> bool {
        self.set.take(index).is_some()
    }

    fn entity_indices(&self) -> &[u32] {
        self.set.entity_indices()
    }
}

/// All storages of a world, addressable by key or by slot index.
pub(crate) struct Storages {
    slots: HashMap<StorageKey, usize>,
    storages: Vec<Box<dyn ComponentStorage>>,
    /// Relation target slot → storage slots whose key points at it.
    by_target: HashMap<u32, Vec<usize>>,
}

impl Storages {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            storages: Vec::with_capacity(capacity.max(1)),
            by_target: HashMap::new(),
        }
    }

    pub fn slot_of(&self, key: &StorageKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Resolve the slot for `(T, target)`, creating the storage on first use.
    pub fn slot_or_create<T: Component>(&mut self, target: u32) -> usize {
        let key = StorageKey::of::<T>(target);
        if let Some(slot) = self.slots.get(&key) {
            return *slot;
        }
        if self.storages.len() == self.storages.capacity() {
            let old = self.storages.capacity();
            self.storages.reserve_exact(old.max(1));
            debug!(old, new = self.storages.capacity(), "grew storage table");
        }
        let slot = self.storages.len();
        self.storages.push(Box::new(Storage::<T>::new(key, slot)));
        self.slots.insert(key, slot);
        if key.is_relation() {
            self.by_target.entry(target).or_default().push(slot);
        }
        debug!(slot, target, component = type_name::<T>(), "created storage");
        slot
    }

    pub fn typed<T: Component>(&self, slot: usize) -> &Storage<T> {
        self.storages[slot]
            .as_any()
            .downcast_ref::<Storage<T>>()
            .expect("component type mismatch")
    }

    pub fn typed_mut<T: Component>(&mut self, slot: usize) -> &mut Storage<T> {
        self.storages[slot]
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
            .expect("component type mismatch")
    }

    pub fn get<T: Component>(&self, target: u32) -> Option<&Storage<T>> {
        let slot = self.slot_of(&StorageKey::of::<T>(target))?;
        Some(self.typed(slot))
    }

    pub fn get_mut<T: Component>(&mut self, target: u32) -> Option<&mut Storage<T>> {
        let slot = self.slot_of(&StorageKey::of::<T>(target))?;
        Some(self.typed_mut(slot))
    }

    pub fn by_slot(&self, slot: usize) -> &(dyn ComponentStorage + 'static) {
        self.storages[slot].as_ref()
    }

    pub fn by_slot_mut(&mut self, slot: usize) -> &mut (dyn ComponentStorage + 'static) {
        self.storages[slot].as_mut()
    }

    /// Storage slots holding relation data that points at `target`.
    pub fn relation_slots(&self, target: u32) -> &[usize] {
        self.by_target
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Relation storages of type `T`, as `(target slot, storage)` pairs.
    pub fn relations_of<T: Component>(&self) -> impl Iterator<Item = (u32, &Storage<T>)> {
        let type_id = TypeId::of::<T>();
        self.storages.iter().filter_map(move |s| {
            let key = s.key();
            if key.type_id == type_id && key.is_relation() {
                s.as_any()
                    .downcast_ref::<Storage<T>>()
                    .map(|storage| (key.target, storage))
            } else {
                None
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn ComponentStorage + 'static)> {
        self.storages.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }
}
