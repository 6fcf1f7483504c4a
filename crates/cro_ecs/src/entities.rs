//! [`Entity`] implementation, storage, and interation.

use std::collections::VecDeque;

use crate::prelude::*;

/// The number of released indices that must be waiting before [`Entities::create()`] starts
/// recycling them.
///
/// Until then new indices are appended, which keeps an index's generation from being bumped
/// over and over by a hot create/destroy loop.
pub const MIN_FREE_IDS: usize = 1024;

/// An entity handle.
///
/// They are created using the [`Entities`] struct. They are used as indices with
/// [`ComponentStore`]s.
///
/// The generation lets a stale handle, kept after its entity was destroyed, be told apart from
/// a new entity that happens to reuse the same index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32, u32);
impl Entity {
    /// Creates a new `Entity` from the provided index and generation.
    ///
    /// > ⚠️ **Warning:** It is not generally recommended to manually create [`Entity`]s unless you
    /// > know exactly what you are doing. Usually you should use [`Entities::create()`] or
    /// > [`Scene::create_entity()`] to spawn entities.
    pub fn new(index: u32, generation: u32) -> Entity {
        Entity(index, generation)
    }

    /// Returns the index of this `Entity`.
    pub fn index(&self) -> u32 {
        self.0
    }

    /// Returns the generation of this `Entity`.
    pub fn generation(&self) -> u32 {
        self.1
    }
}

/// Holds a list of alive entities.
///
/// It also holds a list of entities that were recently killed, which allows to remove components of
/// deleted entities at the end of a frame. Their indices only become available for reuse once the
/// killed list is cleared.
#[derive(Clone)]
pub struct Entities {
    /// Bitset containing all living entities
    alive: BitSetVec,
    generation: Vec<u32>,
    killed: Vec<Entity>,
    free_ids: VecDeque<u32>,
    next_id: usize,
    count: usize,
}

impl Default for Entities {
    fn default() -> Self {
        Self {
            alive: create_bitset(),
            generation: vec![0u32; BITSET_SIZE],
            killed: vec![],
            free_ids: VecDeque::new(),
            next_id: 0,
            count: 0,
        }
    }
}

impl Entities {
    /// Creates a new `Entity` and returns it.
    ///
    /// # Panics
    ///
    /// Panics if more entities are alive than the bitset can track.
    pub fn create(&mut self) -> Entity {
        let i = if self.free_ids.len() >= MIN_FREE_IDS {
            // Indices in the free list are never in the killed list.
            self.free_ids.pop_front().unwrap_or_default() as usize
        } else {
            let i = self.next_id;
            if i >= BITSET_SIZE {
                panic!("Exceeded maximum amount of concurrent entities.");
            }
            self.next_id += 1;
            i
        };

        self.alive.bit_set(i);
        self.count += 1;
        Entity::new(i as u32, self.generation[i])
    }

    /// Checks if the `Entity` is still alive.
    ///
    /// Returns true if it is alive. Returns false if it has been killed.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        index < BITSET_SIZE
            && self.alive.bit_test(index)
            && self.generation[index] == entity.generation()
    }

    /// Kill an entity.
    ///
    /// Killing a stale handle does nothing.
    pub fn kill(&mut self, entity: Entity) {
        if self.is_alive(entity) {
            let index = entity.index() as usize;
            self.alive.bit_reset(index);
            self.generation[index] = self.generation[index].wrapping_add(1);
            self.killed.push(entity);
            self.count -= 1;
        }
    }

    /// Returns entities in the killed list.
    pub fn killed(&self) -> &Vec<Entity> {
        &self.killed
    }

    /// Clears the killed entity list, releasing their indices for reuse.
    pub fn clear_killed(&mut self) {
        self.free_ids
            .extend(self.killed.drain(..).map(|entity| entity.index()));
    }

    /// The number of live entities.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether there are no live entities.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns a bitset where each index where the bit is set to 1 indicates the index of an alive
    /// entity.
    ///
    /// Useful for joining over [`Entity`] and [`ComponentStore<T>`] at the same time.
    pub fn bitset(&self) -> &BitSetVec {
        &self.alive
    }

    /// Iterates over all live entities.
    pub fn iter(&self) -> EntityIterator {
        self.iter_with_bitset(&self.alive)
    }

    /// Iterates over live entities that are also set in the provided bitset.
    pub fn iter_with_bitset<'a>(&'a self, bitset: &'a BitSetVec) -> EntityIterator<'a> {
        EntityIterator {
            current_id: 0,
            next_id: self.next_id,
            entities: &self.alive,
            generations: &self.generation,
            bitset,
        }
    }
}

/// Iterator over entities using the provided bitset.
pub struct EntityIterator<'a> {
    pub(crate) current_id: usize,
    pub(crate) next_id: usize,
    pub(crate) entities: &'a BitSetVec,
    pub(crate) generations: &'a Vec<u32>,
    pub(crate) bitset: &'a BitSetVec,
}

impl<'a> Iterator for EntityIterator<'a> {
    type Item = Entity;
    fn next(&mut self) -> Option<Self::Item> {
        while self.current_id < self.next_id
            && !(self.bitset.bit_test(self.current_id) && self.entities.bit_test(self.current_id))
        {
            self.current_id += 1;
        }
        let ret = if self.current_id < self.next_id {
            Some(Entity::new(
                self.current_id as u32,
                self.generations[self.current_id],
            ))
        } else {
            None
        };
        self.current_id += 1;
        ret
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::prelude::*;

    #[test]
    fn create_kill_entities() {
        let mut entities = Entities::default();
        let e1 = entities.create();
        let e2 = entities.create();
        let e3 = entities.create();
        assert_eq!(e1.index(), 0);
        assert_eq!(e2.index(), 1);
        assert_eq!(e3.index(), 2);
        assert_eq!(e1.generation(), 0);
        assert!(entities.is_alive(e1));
        entities.kill(e1);
        assert!(!entities.is_alive(e1));
        assert!(entities.is_alive(e2));
        assert!(entities.is_alive(e3));
        assert_eq!(entities.len(), 2);

        // Too few free ids to start recycling.
        let e4 = entities.create();
        assert_eq!(e4.index(), 3);

        assert_eq!(*entities.killed(), vec![e1]);
        entities.clear_killed();
        assert_eq!(*entities.killed(), vec![]);
    }

    #[test]
    fn kill_stale_handle_is_noop() {
        let mut entities = Entities::default();
        let e1 = entities.create();
        entities.kill(e1);
        entities.kill(e1);
        assert_eq!(entities.killed().len(), 1);
        assert!(entities.is_empty());
    }

    #[test]
    fn recycles_after_min_free_ids() {
        let mut entities = Entities::default();
        let created = (0..MIN_FREE_IDS + 1)
            .map(|_| entities.create())
            .collect::<Vec<_>>();
        for &e in &created[..MIN_FREE_IDS] {
            entities.kill(e);
        }

        // Indices are held back until the killed list is cleared.
        let e = entities.create();
        assert_eq!(e.index() as usize, MIN_FREE_IDS + 1);

        entities.clear_killed();
        let reused = entities.create();
        assert_eq!(reused.index(), 0);
        assert_eq!(reused.generation(), 1);
        assert!(!entities.is_alive(created[0]));
        assert!(entities.is_alive(reused));
    }

    #[test]
    fn iterates_live_entities() {
        let mut entities = Entities::default();
        let e = (0..5).map(|_| entities.create()).collect::<Vec<_>>();
        entities.kill(e[1]);
        entities.kill(e[3]);
        assert_eq!(entities.iter().collect::<Vec<_>>(), vec![e[0], e[2], e[4]]);

        let mut filter = create_bitset();
        filter.set(e[2]);
        filter.set(e[3]);
        assert_eq!(
            entities.iter_with_bitset(&filter).collect::<Vec<_>>(),
            vec![e[2]]
        );
    }

    #[test]
    /// Exercise basic operations on entities to increase code coverage
    fn clone_debug_hash() {
        let mut entities = Entities::default();
        let e1 = entities.create();
        // Clone
        #[allow(clippy::clone_on_copy)]
        let _ = e1.clone();
        // Debug
        println!("{e1:?}");
        // Hash
        let mut h = HashSet::new();
        h.insert(e1);
    }

    #[test]
    #[should_panic(expected = "Exceeded maximum amount")]
    fn force_max_entity_panic() {
        let mut entities = Entities::default();
        for _ in 0..(BITSET_SIZE + 1) {
            entities.create();
        }
    }
}
