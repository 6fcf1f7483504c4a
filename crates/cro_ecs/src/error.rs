use std::error::Error;

use crate::entities::Entity;

/// The types of errors used throughout the ECS.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A resource or component store was not initialized in the [`World`][crate::World] but
    /// something tried to access it.
    #[error("Resource or component `{0}` not initialized")]
    NotInitialized(&'static str),
    /// The requested resource or component store is already borrowed.
    ///
    /// This happens when reading a store that is mutably borrowed elsewhere, or mutably
    /// borrowing a store that is being read.
    #[error("Resource or component `{0}` already borrowed")]
    AlreadyBorrowed(&'static str),
    /// The entity has been destroyed, or never existed.
    #[error("Entity {0:?} is not alive")]
    DeadEntity(Entity),
    /// This variant is for user-defined errors returned from systems.
    #[error("System errored: {0}")]
    SystemError(Box<dyn Error + Send + Sync>),
}

/// The result of a [`System`][crate::system::System]'s execution.
pub type SystemResult<Out = ()> = anyhow::Result<Out>;
