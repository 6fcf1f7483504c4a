//! ECS scheduling with batched sprite and text rendering.
//!
//! This crate re-exports [`cro_ecs`] and [`cro_render`], and adds engine configuration and
//! logging setup.

#![warn(missing_docs)]

/// Entities, components, systems and scenes.
pub mod ecs {
    pub use cro_ecs::*;
}

/// Batched sprite and text rendering.
pub mod render {
    pub use cro_render::*;
}

pub mod config;
pub mod logging;

/// The prelude
pub mod prelude {
    pub use cro_render::prelude::*;

    pub use crate::{config::*, logging::*};
}
