//! World resource storage.

use std::any::{type_name, Any, TypeId};

use crate::prelude::*;

/// A read-only borrow of a resource.
pub type Res<'a, T> = AtomicRef<'a, T>;
/// A mutable borrow of a resource.
pub type ResMut<'a, T> = AtomicRefMut<'a, T>;

/// A collection of resources: singletons stored in the [`World`], one per Rust type.
#[derive(Default)]
pub struct Resources {
    resources: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Create an empty [`Resources`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource, replacing any previous resource of the same type.
    pub fn insert<T: EcsData>(&mut self, resource: T) {
        self.resources
            .insert(TypeId::of::<T>(), Box::new(AtomicRefCell::new(resource)));
    }

    /// Remove a resource, returning it if it existed.
    pub fn remove<T: EcsData>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|cell| cell.downcast::<AtomicRefCell<T>>().ok())
            .map(|cell| (*cell).into_inner())
    }

    /// Check whether or not a resource is in the store.
    pub fn contains<T: EcsData>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Get the cell holding the resource of type `T`.
    pub fn get_cell<T: EcsData>(&self) -> Option<&AtomicRefCell<T>> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|cell| cell.downcast_ref())
    }

    /// Borrow a resource.
    pub fn try_get<T: EcsData>(&self) -> Result<Res<T>, EcsError> {
        self.get_cell::<T>()
            .ok_or(EcsError::NotInitialized(type_name::<T>()))?
            .try_borrow()
            .map_err(|_| EcsError::AlreadyBorrowed(type_name::<T>()))
    }

    /// Mutably borrow a resource.
    pub fn try_get_mut<T: EcsData>(&self) -> Result<ResMut<T>, EcsError> {
        self.get_cell::<T>()
            .ok_or(EcsError::NotInitialized(type_name::<T>()))?
            .try_borrow_mut()
            .map_err(|_| EcsError::AlreadyBorrowed(type_name::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, PartialEq, Eq)]
    struct A(String);

    #[derive(Debug, PartialEq, Eq)]
    struct B(u32);

    #[test]
    fn sanity_check() {
        let mut resources = Resources::new();

        resources.insert(A(String::from("hi")));
        assert_eq!(resources.try_get::<A>().unwrap().0, "hi");

        resources.insert(B(1));
        resources.try_get_mut::<B>().unwrap().0 = 2;
        assert_eq!(resources.try_get::<B>().unwrap().0, 2);
        assert_eq!(resources.remove::<B>(), Some(B(2)));
        assert!(!resources.contains::<B>());
        assert!(matches!(
            resources.try_get::<B>(),
            Err(EcsError::NotInitialized(_))
        ));
    }
}
