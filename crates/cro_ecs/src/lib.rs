#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod atomic {
    //! Atomic Refcell implmentation.
    //!
    //! Atomic Refcells are from the [`atomic_refcell`] crate.
    //!
    //! [`atomic_refcell`]: https://docs.rs/atomic_refcell
    pub use atomic_refcell::*;
}
pub mod bitset;
pub mod components;
pub mod entities;
pub mod resources;
pub mod scene;
pub mod system;

mod error;
pub use error::EcsError;

mod world;
pub use world::{FromWorld, World};

/// The prelude.
pub mod prelude {
    pub use {atomic_refcell::*, bitset_core::BitSet, fxhash::FxHashMap};

    pub use crate::{
        bitset::*, components::*, default, entities::*, error::*, resources::*, scene::*,
        system::*, EcsData, FromWorld, World,
    };
}

/// Helper trait that is auto-implemented for anything that may be stored in the ECS as a
/// component or a resource.
pub trait EcsData: Sync + Send + 'static {}
impl<T: Sync + Send + 'static> EcsData for T {}

/// Free-standing, shorter equivalent to [`Default::default()`].
#[inline]
pub fn default<T: Default>() -> T {
    std::default::Default::default()
}
