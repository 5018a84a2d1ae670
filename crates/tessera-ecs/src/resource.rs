//! Singleton resources.
//!
//! A resource is a component on the world's sentinel entity, so the storage
//! for its type holds at most one value. The sentinel is excluded from
//! queries and cannot be reached through the entity API.

use crate::component::Component;
use crate::world::World;

impl World {
    /// Insert a singleton resource, replacing any previous value of the same
    /// type, and return the stored value.
    pub fn insert_resource<T: Component>(&mut self, value: T) -> &mut T {
        let sentinel = self.entities.sentinel();
        self.insert_at(sentinel, None, value)
    }

    /// Get an immutable reference to a resource.
    pub fn resource<T: Component>(&self) -> Option<&T> {
        let sentinel = self.entities.sentinel();
        self.storages.get::<T>(0)?.get(sentinel.index)
    }

    /// Get a mutable reference to a resource.
    pub fn resource_mut<T: Component>(&mut self) -> Option<&mut T> {
        let sentinel = self.entities.sentinel();
        self.storages.get_mut::<T>(0)?.set.get_mut(sentinel.index)
    }

    /// Remove a resource, returning it if it existed.
    pub fn remove_resource<T: Component>(&mut self) -> Option<T> {
        let sentinel = self.entities.sentinel();
        self.remove_at(sentinel, None)
    }

    /// Check whether a resource of this type exists.
    pub fn has_resource<T: Component>(&self) -> bool {
        self.resource::<T>().is_some()
    }
}
