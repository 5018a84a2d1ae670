use std::fmt;

use tracing::debug;

/// A generational entity handle. Uses compact u32 index + generation for cache performance.
///
/// Index 0 is reserved for the world's sentinel entity, so a handle with index 0
/// never names a spawned entity. [`Entity::NONE`] is the canonical "no entity".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// The "no entity" handle. Never alive.
    pub const NONE: Entity = Entity {
        index: 0,
        generation: 0,
    };

    /// Create an entity from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this entity (incremented each time the slot is freed).
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Index of the sentinel slot that holds resources.
pub(crate) const SENTINEL_INDEX: u32 = 0;

/// Allocates and recycles entity slots with generational tracking.
///
/// Fresh slots start at generation 1. Freeing a slot bumps its generation, so a
/// recycled slot always hands out a handle that compares unequal to every
/// handle issued for it before.
pub struct EntityAllocator {
    pub(crate) generations: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    free_list: Vec<u32>,
    len: usize,
}

impl EntityAllocator {
    /// Create an allocator with room for `capacity` slots. Slot 0 is claimed
    /// immediately for the sentinel and does not count towards [`len`](Self::len).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut generations = Vec::with_capacity(capacity);
        let mut alive = Vec::with_capacity(capacity);
        generations.push(1);
        alive.push(true);
        Self {
            generations,
            alive,
            free_list: Vec::with_capacity(capacity),
            len: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(tessera_core::config::DEFAULT_ENTITY_CAPACITY)
    }

    /// The sentinel handle occupying slot 0.
    pub fn sentinel(&self) -> Entity {
        Entity {
            index: SENTINEL_INDEX,
            generation: self.generations[SENTINEL_INDEX as usize],
        }
    }

    /// Allocate a new entity, reusing a freed slot if available.
    pub fn allocate(&mut self) -> Entity {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            Entity {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            if self.generations.len() == self.generations.capacity() {
                let old = self.generations.capacity();
                let additional = old.max(1);
                self.generations.reserve_exact(additional);
                self.alive.reserve_exact(additional);
                debug!(old, new = self.generations.capacity(), "grew entity table");
            }
            let index = self.generations.len() as u32;
            self.generations.push(1);
            self.alive.push(true);
            Entity {
                index,
                generation: 1,
            }
        }
    }

    /// Deallocate an entity. Returns `true` if it was alive.
    ///
    /// The sentinel slot can never be deallocated.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if entity.index == SENTINEL_INDEX || !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index as usize;
        self.alive[idx] = false;
        self.generations[idx] += 1;
        if self.free_list.len() == self.free_list.capacity() {
            let additional = self.free_list.capacity().max(1);
            self.free_list.reserve_exact(additional);
        }
        self.free_list.push(entity.index);
        self.len -= 1;
        true
    }

    /// Check if an entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.alive.len() && self.alive[idx] && self.generations[idx] == entity.generation
    }

    /// The live handle currently occupying `index`, if any. Never returns the sentinel.
    pub fn current(&self, index: u32) -> Option<Entity> {
        let idx = index as usize;
        if index == SENTINEL_INDEX || idx >= self.alive.len() || !self.alive[idx] {
            return None;
        }
        Some(Entity {
            index,
            generation: self.generations[idx],
        })
    }

    /// All live entities, excluding the sentinel, in slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        (1..self.alive.len() as u32).filter_map(move |i| self.current(i))
    }

    /// Number of currently alive entities.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no alive entities.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
