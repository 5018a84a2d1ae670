//! Short-lived message entities.
//!
//! An event is an ordinary entity carrying its payload component, an
//! [`EventLifetime`] and a [`DeliveryRecord`]. Consumers poll with
//! [`World::receive`], which hands each event to each consumer at most once.
//! [`World::tick`] ages events and despawns them once they have outlived the
//! configured retention window.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::component::Component;
use crate::entity::Entity;
use crate::mask::Mask;
use crate::world::World;

/// Identity of an event consumer. Each consumer sees each event at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u32);

/// Number of ticks an event has been alive for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventLifetime {
    pub age: u32,
}

/// Consumers that have already been handed an event.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRecord {
    pub consumed_by: HashSet<ConsumerId>,
}

/// Sent when a tracked component `T` is attached to an entity.
pub struct Added<T> {
    pub entity: Entity,
    /// The relation target, for relation components.
    pub target: Option<Entity>,
    _marker: PhantomData<fn() -> T>,
}

/// Sent when a tracked component `T` is detached from an entity, including
/// detachment by despawn or relation cleanup.
pub struct Removed<T> {
    pub entity: Entity,
    pub target: Option<Entity>,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! impl_structural_event {
    ($name:ident) => {
        impl<T> $name<T> {
            pub fn new(entity: Entity, target: Option<Entity>) -> Self {
                Self {
                    entity,
                    target,
                    _marker: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("component", &std::any::type_name::<T>())
                    .field("entity", &self.entity)
                    .field("target", &self.target)
                    .finish()
            }
        }
    };
}

impl_structural_event!(Added);
impl_structural_event!(Removed);

impl World {
    fn spawn_event(&mut self) -> Entity {
        let entity = self.spawn();
        self.insert_at(entity, None, DeliveryRecord::default());
        self.insert_at(entity, None, EventLifetime::default());
        entity
    }

    /// Send a default-initialized event and return its payload for filling in.
    pub fn send<T: Component + Default>(&mut self) -> &mut T {
        let entity = self.spawn_event();
        self.insert_at(entity, None, T::default())
    }

    /// Send an event with a ready-made payload, returning the event entity.
    pub fn send_value<T: Component>(&mut self, payload: T) -> Entity {
        let entity = self.spawn_event();
        self.insert_at(entity, None, payload);
        entity
    }

    /// Cached query over live events carrying a `T` payload.
    fn event_query<T: Component>(&mut self) -> usize {
        let include = [
            self.storages.slot_or_create::<T>(0),
            self.storages.slot_or_create::<EventLifetime>(0),
            self.storages.slot_or_create::<DeliveryRecord>(0),
        ];
        let mask = Mask::from_slots(self.id(), include, []);
        self.query_index(&mask)
    }

    /// Hand every `T` event `consumer` has not seen yet to `callback`.
    /// Returns the number of events delivered.
    pub fn receive<T: Component>(
        &mut self,
        consumer: ConsumerId,
        mut callback: impl FnMut(&T),
    ) -> usize {
        let query = self.event_query::<T>();
        let pending = self.queries.get(query).entities().to_vec();
        let mut delivered = 0;
        for event in pending {
            let unseen = self
                .storages
                .get_mut::<DeliveryRecord>(0)
                .and_then(|records| records.set.get_mut(event.index))
                .is_some_and(|record| record.consumed_by.insert(consumer));
            if !unseen {
                continue;
            }
            if let Some(payload) = self.storages.get::<T>(0).and_then(|s| s.get(event.index)) {
                callback(payload);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live `T` events, regardless of who has seen them.
    pub fn pending_events<T: Component>(&mut self) -> usize {
        let query = self.event_query::<T>();
        self.queries.get(query).len()
    }

    /// Age every event by one tick and despawn those whose age now exceeds
    /// the retention window. Returns the number of events expired.
    pub fn tick(&mut self) -> usize {
        let slot = self.storages.slot_or_create::<EventLifetime>(0);
        let retention = self.config().event_retention;
        let query = self.query_index(&Mask::from_slots(self.id(), [slot], []));
        let events = self.queries.get(query).entities().to_vec();

        let lifetimes = &mut self.storages.typed_mut::<EventLifetime>(slot).set;
        let expired: Vec<Entity> = events
            .into_iter()
            .filter(|event| {
                lifetimes.get_mut(event.index).is_some_and(|lifetime| {
                    lifetime.age += 1;
                    lifetime.age > retention
                })
            })
            .collect();

        for event in &expired {
            self.despawn(*event);
        }
        if !expired.is_empty() {
            trace!(expired = expired.len(), "expired events");
        }
        expired.len()
    }
}
