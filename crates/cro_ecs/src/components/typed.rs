use crate::prelude::*;

use super::iterator::{ComponentBitsetIterator, ComponentBitsetIteratorMut};

/// Sparse storage for components of type `T`, indexed by entity.
///
/// Lookups ignore the entity generation; stale handles must be filtered with
/// [`Entities::is_alive()`] by the caller, and [`World::maintain()`] purges the components of
/// killed entities before their index can be reused.
pub struct ComponentStore<T> {
    bitset: BitSetVec,
    storage: Vec<Option<T>>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            bitset: create_bitset(),
            storage: Vec::new(),
        }
    }
}

impl<T> ComponentStore<T> {
    /// Inserts a component for the given `Entity` index.
    /// Returns the previous component, if any.
    pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
        let index = entity.index() as usize;
        if index >= self.storage.len() {
            self.storage.resize_with(index + 1, || None);
        }
        self.bitset.set(entity);
        self.storage[index].replace(component)
    }

    /// Gets an immutable reference to the component of `Entity`.
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.storage
            .get(entity.index() as usize)
            .and_then(|slot| slot.as_ref())
    }

    /// Gets a mutable reference to the component of `Entity`.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage
            .get_mut(entity.index() as usize)
            .and_then(|slot| slot.as_mut())
    }

    /// Get mutable references to the components of several distinct entities at once.
    ///
    /// # Panics
    ///
    /// Panics if the same entity is requested twice.
    pub fn get_many_mut<const N: usize>(&mut self, entities: [Entity; N]) -> [Option<&mut T>; N] {
        for (i, a) in entities.iter().enumerate() {
            for b in &entities[i + 1..] {
                assert_ne!(a.index(), b.index(), "Tried to borrow the same entity twice");
            }
        }
        let mut slots = self.storage.iter_mut().map(Some).collect::<Vec<_>>();
        entities.map(|entity| {
            slots
                .get_mut(entity.index() as usize)
                .and_then(Option::take)
                .and_then(Option::as_mut)
        })
    }

    /// Removes the component of `Entity`.
    /// Returns `Some(T)` if the entity did have the component.
    /// Returns `None` if the entity did not have the component.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.storage.get_mut(entity.index() as usize)?;
        self.bitset.unset(entity);
        slot.take()
    }

    /// Iterates immutably over all components of this type.
    /// Very fast but doesn't allow joining with other component types.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.storage.iter().flatten()
    }

    /// Iterates mutably over all components of this type.
    /// Very fast but doesn't allow joining with other component types.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.storage.iter_mut().flatten()
    }

    /// Iterates immutably over the components of this type where `bitset`
    /// indicates the indices of entities.
    /// Slower than `iter()` but allows joining between multiple component types.
    pub fn iter_with_bitset<'a>(&'a self, bitset: &'a BitSetVec) -> ComponentBitsetIterator<'a, T> {
        ComponentBitsetIterator {
            current_id: 0,
            components: &self.storage,
            bitset,
        }
    }

    /// Iterates mutably over the components of this type where `bitset`
    /// indicates the indices of entities.
    pub fn iter_mut_with_bitset<'a>(
        &'a mut self,
        bitset: &'a BitSetVec,
    ) -> ComponentBitsetIteratorMut<'a, T> {
        ComponentBitsetIteratorMut {
            inner: self.storage.iter_mut().enumerate(),
            bitset,
        }
    }

    /// Read the bitset containing the list of entites with this component type on it.
    pub fn bitset(&self) -> &BitSetVec {
        &self.bitset
    }

    /// Check whether or not this component store has data for the given entity.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.bitset().contains(entity)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct A(String);

    #[test]
    fn create_remove_components() {
        let mut entities = Entities::default();
        let e1 = entities.create();
        let e2 = entities.create();

        let mut storage = ComponentStore::<A>::default();
        storage.insert(e1, A("hello".into()));
        storage.insert(e2, A("world".into()));
        assert!(storage.get(e1).is_some());
        storage.remove(e1);
        assert!(storage.get(e1).is_none());
        assert!(!storage.contains(e1));
        assert_eq!(
            storage.iter().cloned().collect::<Vec<_>>(),
            vec![A("world".into())]
        );
    }

    #[test]
    fn insert_returns_previous() {
        let e = Entity::new(10, 0);
        let mut storage = ComponentStore::<A>::default();
        assert_eq!(storage.insert(e, A("a".into())), None);
        assert_eq!(storage.insert(e, A("b".into())), Some(A("a".into())));
        assert_eq!(storage.remove(Entity::new(99, 0)), None);
    }

    #[test]
    fn get_mut_many() {
        let mut entities = Entities::default();
        let e1 = entities.create();
        let e2 = entities.create();
        let e3 = entities.create();

        let mut storage = ComponentStore::<A>::default();
        storage.insert(e1, A("1".into()));
        storage.insert(e3, A("3".into()));

        let [a, b, c] = storage.get_many_mut([e3, e2, e1]);
        assert_eq!(a.map(|a| a.0.clone()), Some("3".to_string()));
        assert!(b.is_none());
        c.unwrap().0.push('!');
        assert_eq!(storage.get(e1).unwrap().0, "1!");
    }

    #[test]
    #[should_panic(expected = "same entity twice")]
    fn get_mut_many_aliasing_panics() {
        let e = Entity::new(0, 0);
        let mut storage = ComponentStore::<A>::default();
        storage.insert(e, A("x".into()));
        let _ = storage.get_many_mut([e, e]);
    }

    #[test]
    fn bitset_join() {
        let mut entities = Entities::default();
        let e = (0..4).map(|_| entities.create()).collect::<Vec<_>>();
        let mut a = ComponentStore::<u32>::default();
        let mut b = ComponentStore::<u32>::default();
        for (i, &e) in e.iter().enumerate() {
            a.insert(e, i as u32);
        }
        b.insert(e[1], 10);
        b.insert(e[3], 30);

        let mut join = a.bitset().clone();
        join.bit_and(b.bitset());
        assert_eq!(a.iter_with_bitset(&join).copied().collect::<Vec<_>>(), [1, 3]);
        for v in a.iter_mut_with_bitset(&join) {
            *v *= 2;
        }
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), [0, 2, 2, 6]);
    }
}
