//! ECS component storage.

use std::any::{type_name, Any, TypeId};

use crate::prelude::*;

mod iterator;
mod typed;

pub use iterator::*;
pub use typed::*;

/// A read-only borrow of a [`ComponentStore`].
pub type Comp<'a, T> = AtomicRef<'a, ComponentStore<T>>;
/// A mutable borrow of a [`ComponentStore`].
pub type CompMut<'a, T> = AtomicRefMut<'a, ComponentStore<T>>;

/// Type-erased access to a runtime borrow checked component store.
///
/// Lets the [`World`] purge destroyed entities and lets systems test their requirements without
/// knowing each component type.
pub trait UntypedComponentStore: Send + Sync + 'static {
    /// Remove the component for the given entity, if any.
    fn remove_entity(&self, entity: Entity);
    /// Whether the store holds a component for the given entity.
    fn contains_entity(&self, entity: Entity) -> bool;
    /// The Rust type name of the stored component.
    fn component_name(&self) -> &'static str;
    /// Upcast for downcasting to the typed store.
    fn as_any(&self) -> &dyn Any;
}

impl<T: EcsData> UntypedComponentStore for AtomicRefCell<ComponentStore<T>> {
    fn remove_entity(&self, entity: Entity) {
        self.borrow_mut().remove(entity);
    }

    fn contains_entity(&self, entity: Entity) -> bool {
        self.borrow().contains(entity)
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A collection of [`ComponentStore<T>`], one per component type.
#[derive(Default)]
pub struct ComponentStores {
    pub(crate) components: FxHashMap<TypeId, Box<dyn UntypedComponentStore>>,
}

impl ComponentStores {
    /// Initialize component storage for type `T`. Does nothing if it already exists.
    pub fn init<T: EcsData>(&mut self) {
        self.components
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(AtomicRefCell::new(ComponentStore::<T>::default())));
    }

    /// Whether storage for `T` has been initialized.
    pub fn contains<T: EcsData>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Get the cell holding the store for `T`.
    pub fn get_cell<T: EcsData>(&self) -> Result<&AtomicRefCell<ComponentStore<T>>, EcsError> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|store| (**store).as_any().downcast_ref())
            .ok_or(EcsError::NotInitialized(type_name::<T>()))
    }

    /// Borrow the store for `T`.
    pub fn try_get<T: EcsData>(&self) -> Result<Comp<T>, EcsError> {
        self.get_cell::<T>()?
            .try_borrow()
            .map_err(|_| EcsError::AlreadyBorrowed(type_name::<T>()))
    }

    /// Mutably borrow the store for `T`.
    pub fn try_get_mut<T: EcsData>(&self) -> Result<CompMut<T>, EcsError> {
        self.get_cell::<T>()?
            .try_borrow_mut()
            .map_err(|_| EcsError::AlreadyBorrowed(type_name::<T>()))
    }

    /// Whether the entity has a component in the store registered under `id`.
    ///
    /// Uninitialized stores hold nothing.
    pub fn has_component(&self, id: TypeId, entity: Entity) -> bool {
        self.components
            .get(&id)
            .map(|store| store.contains_entity(entity))
            .unwrap_or(false)
    }

    /// Remove every component of the given entity.
    pub fn remove_all(&self, entity: Entity) {
        for store in self.components.values() {
            store.remove_entity(entity);
        }
    }

    /// Iterate over the type-erased stores.
    pub fn iter(&self) -> impl Iterator<Item = &dyn UntypedComponentStore> {
        self.components.values().map(|store| store.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use crate::prelude::*;

    #[derive(Debug, PartialEq, Eq)]
    struct A(u32);
    #[derive(Debug, PartialEq, Eq)]
    struct B(u32);

    #[test]
    fn uninitialized_store_errors() {
        let stores = ComponentStores::default();
        assert!(matches!(
            stores.try_get::<A>(),
            Err(EcsError::NotInitialized(_))
        ));
        assert!(!stores.has_component(TypeId::of::<A>(), Entity::new(0, 0)));
    }

    #[test]
    fn double_mutable_borrow_errors() {
        let mut stores = ComponentStores::default();
        stores.init::<A>();
        let _a = stores.try_get_mut::<A>().unwrap();
        assert!(matches!(
            stores.try_get::<A>(),
            Err(EcsError::AlreadyBorrowed(_))
        ));
    }

    #[test]
    fn remove_all_clears_every_store() {
        let mut stores = ComponentStores::default();
        stores.init::<A>();
        stores.init::<B>();
        let e = Entity::new(3, 0);
        stores.try_get_mut::<A>().unwrap().insert(e, A(1));
        stores.try_get_mut::<B>().unwrap().insert(e, B(2));
        assert!(stores.has_component(TypeId::of::<B>(), e));

        stores.remove_all(e);
        assert!(!stores.has_component(TypeId::of::<A>(), e));
        assert!(!stores.has_component(TypeId::of::<B>(), e));
        assert_eq!(stores.iter().count(), 2);
    }
}
