use crate::entity::Entity;

/// Errors returned by world operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The handle's slot is free or has been recycled since the handle was issued.
    #[error("entity {0:?} is not alive")]
    NotAlive(Entity),

    #[error("entity {entity:?} has no {component} component")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("{0:?} cannot be used as a relation target")]
    InvalidTarget(Entity),

    /// A mask or query handle from another world was passed in.
    #[error("mask or query belongs to a different world")]
    ForeignWorld,
}

pub type EcsResult<T> = Result<T, EcsError>;
