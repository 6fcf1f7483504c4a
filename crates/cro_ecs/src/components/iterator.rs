use crate::prelude::*;

/// Read-only iterator over the components whose entity index is set in a bitset.
pub struct ComponentBitsetIterator<'a, T> {
    pub(crate) current_id: usize,
    pub(crate) components: &'a [Option<T>],
    pub(crate) bitset: &'a BitSetVec,
}

impl<'a, T> Iterator for ComponentBitsetIterator<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<Self::Item> {
        while self.current_id < self.components.len() {
            let id = self.current_id;
            self.current_id += 1;
            if self.bitset.bit_test(id) {
                if let Some(component) = &self.components[id] {
                    return Some(component);
                }
            }
        }
        None
    }
}

/// Mutable iterator over the components whose entity index is set in a bitset.
pub struct ComponentBitsetIteratorMut<'a, T> {
    pub(crate) inner: std::iter::Enumerate<std::slice::IterMut<'a, Option<T>>>,
    pub(crate) bitset: &'a BitSetVec,
}

impl<'a, T> Iterator for ComponentBitsetIteratorMut<'a, T> {
    type Item = &'a mut T;
    fn next(&mut self) -> Option<Self::Item> {
        for (id, slot) in self.inner.by_ref() {
            if self.bitset.bit_test(id) {
                if let Some(component) = slot.as_mut() {
                    return Some(component);
                }
            }
        }
        None
    }
}
