//! Contains the ECS [`World`].

use std::any::type_name;

use crate::prelude::*;

/// The [`World`] is simply a collection of [`Resources`], and [`ComponentStores`].
///
/// Also stored in the world is the [`Entities`], but it is stored as a resource.
pub struct World {
    /// Stores the world resources.
    pub resources: Resources,
    /// Stores the world components.
    pub components: ComponentStores,
}

impl Default for World {
    fn default() -> Self {
        let mut resources = Resources::new();

        // Always initialize an Entities resource
        resources.insert(Entities::default());

        Self {
            resources,
            components: Default::default(),
        }
    }
}

impl World {
    /// Create a new [`World`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the component info for dead entities.
    ///
    /// This should be called every frame to cleanup entities that have been killed.
    ///
    /// This will remove the component storage for all killed entities, and allow their slots to be
    /// re-used for any new entities.
    pub fn maintain(&mut self) {
        let mut entities = self.resource_mut::<Entities>();
        for &entity in entities.killed() {
            self.components.remove_all(entity);
        }
        entities.clear_killed();
    }

    /// Borrow the [`Entities`] resource.
    pub fn entities(&self) -> Res<Entities> {
        self.resource::<Entities>()
    }

    /// Mutably borrow the [`Entities`] resource.
    pub fn entities_mut(&self) -> ResMut<Entities> {
        self.resource_mut::<Entities>()
    }

    /// Initialize a resource of type `T` by inserting it's default value.
    pub fn init_resource<R: EcsData + FromWorld>(&mut self) {
        if !self.resources.contains::<R>() {
            let value = R::from_world(self);
            self.resources.insert(value)
        }
    }

    /// Insert a resource.
    pub fn insert_resource<R: EcsData>(&mut self, resource: R) {
        self.resources.insert(resource)
    }

    /// Borrow a resource from the world.
    ///
    /// # Panics
    ///
    /// Panics if the resource does not exist in the store or is mutably borrowed.
    #[track_caller]
    pub fn resource<R: EcsData>(&self) -> Res<R> {
        match self.resources.try_get() {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        }
    }

    /// Mutably borrow a resource from the world.
    ///
    /// # Panics
    ///
    /// Panics if the resource does not exist in the store or is already borrowed.
    #[track_caller]
    pub fn resource_mut<R: EcsData>(&self) -> ResMut<R> {
        match self.resources.try_get_mut() {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        }
    }

    /// Borrow a resource, or get an error if it does not exist or is mutably borrowed.
    pub fn get_resource<R: EcsData>(&self) -> Result<Res<R>, EcsError> {
        self.resources.try_get()
    }

    /// Initialize the component store for type `T`. Does nothing if it already exists.
    pub fn init_component<T: EcsData>(&mut self) {
        self.components.init::<T>();
    }

    /// Borrow the component store for `T`.
    ///
    /// # Panics
    ///
    /// Panics if the store was never initialized or is mutably borrowed.
    #[track_caller]
    pub fn component<T: EcsData>(&self) -> Comp<T> {
        match self.components.try_get() {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        }
    }

    /// Mutably borrow the component store for `T`.
    ///
    /// # Panics
    ///
    /// Panics if the store was never initialized or is already borrowed.
    #[track_caller]
    pub fn component_mut<T: EcsData>(&self) -> CompMut<T> {
        match self.components.try_get_mut() {
            Ok(c) => c,
            Err(e) => panic!("{e}"),
        }
    }

    /// Borrow the component store for `T`, or get an error if it cannot be borrowed.
    pub fn get_component<T: EcsData>(&self) -> Result<Comp<T>, EcsError> {
        self.components.try_get()
    }

    /// Mutably borrow the component store for `T`, or get an error if it cannot be borrowed.
    pub fn get_component_mut<T: EcsData>(&self) -> Result<CompMut<T>, EcsError> {
        self.components.try_get_mut()
    }

    /// Insert a component on a live entity, initializing its store if needed.
    pub fn insert_component<T: EcsData>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<Option<T>, EcsError> {
        if !self.entities().is_alive(entity) {
            return Err(EcsError::DeadEntity(entity));
        }
        self.init_component::<T>();
        Ok(self.component_mut::<T>().insert(entity, component))
    }

    /// The type name of every initialized component store.
    pub fn component_names(&self) -> Vec<&'static str> {
        let mut names = self
            .components
            .iter()
            .map(|store| store.component_name())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// Check that a resource exists, with a readable error naming its type otherwise.
    pub fn require_resource<R: EcsData>(&self) -> Result<(), EcsError> {
        if self.resources.contains::<R>() {
            Ok(())
        } else {
            Err(EcsError::NotInitialized(type_name::<R>()))
        }
    }
}

/// Creates an instance of the type this trait is implemented for
/// using data from the supplied [`World`].
///
/// For an example, see [`World::init_resource()`].
pub trait FromWorld {
    /// Creates `Self` using data from the given World
    fn from_world(world: &World) -> Self;
}

impl<T: Default> FromWorld for T {
    fn from_world(_world: &World) -> T {
        T::default()
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct C(u32);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct D(u32);

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Counter(u32);

    #[test]
    fn maintain_purges_killed_components() {
        let mut world = World::new();
        let e1 = world.entities_mut().create();
        let e2 = world.entities_mut().create();
        world.insert_component(e1, C(1)).unwrap();
        world.insert_component(e1, D(1)).unwrap();
        world.insert_component(e2, C(2)).unwrap();

        world.entities_mut().kill(e1);
        world.maintain();

        assert!(world.entities().killed().is_empty());
        assert!(!world.component::<C>().contains(e1));
        assert!(!world.component::<D>().contains(e1));
        assert_eq!(world.component::<C>().get(e2), Some(&C(2)));
    }

    #[test]
    fn inserted_components_read_back() {
        let mut world = World::new();
        let e = world.entities_mut().create();
        assert_eq!(world.insert_component(e, C(7)).unwrap(), None);
        assert_eq!(world.insert_component(e, C(8)).unwrap(), Some(C(7)));

        assert_eq!(world.component::<C>().get(e), Some(&C(8)));
        world.get_component_mut::<C>().unwrap().get_mut(e).unwrap().0 += 1;
        assert_eq!(world.get_component::<C>().unwrap().get(e), Some(&C(9)));
        assert!(world.components.has_component(std::any::TypeId::of::<C>(), e));
    }

    #[test]
    fn insert_on_dead_entity_errors() {
        let mut world = World::new();
        let e = world.entities_mut().create();
        world.entities_mut().kill(e);
        assert!(matches!(
            world.insert_component(e, C(0)),
            Err(EcsError::DeadEntity(_))
        ));
    }

    #[test]
    fn init_resource_keeps_existing() {
        let mut world = World::new();
        world.init_resource::<Counter>();
        world.resource_mut::<Counter>().0 = 4;
        world.init_resource::<Counter>();
        assert_eq!(*world.resource::<Counter>(), Counter(4));
        assert!(world.require_resource::<Counter>().is_ok());
        assert!(world.require_resource::<C>().is_err());
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn missing_component_store_panics() {
        let world = World::new();
        let _ = world.component::<C>();
    }
}
