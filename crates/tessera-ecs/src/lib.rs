//! Tessera ECS - in-memory entity/component store
//!
//! Generational entity handles, sparse-set storage per (component type,
//! relation target), bitset membership per entity, and cached queries that
//! are kept up to date incrementally as components come and go. Events are
//! ordinary short-lived entities built on the same storage.

mod bitset;
mod component;
mod entity;
mod error;
mod event;
mod mask;
mod query;
mod resource;
mod storage;
mod system;
mod world;

pub use bitset::BitSet;
pub use component::{Component, SparseSet};
pub use entity::{Entity, EntityAllocator};
pub use error::{EcsError, EcsResult};
pub use event::{Added, ConsumerId, DeliveryRecord, EventLifetime, Removed};
pub use mask::{Mask, MaskBuilder};
pub use query::{Query, QueryId};
pub use storage::{Storage, StorageKey};
pub use system::{System, SystemSchedule};
pub use world::{World, WorldId};
