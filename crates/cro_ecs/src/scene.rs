//! The [`Scene`]: a world plus the systems that run over it.

use crate::prelude::*;

/// Owns a [`World`] and its [`SystemManager`], and drives them one frame at a time.
///
/// Structural changes are deferred: entities whose components change are re-evaluated against
/// every system's requirements, and destroyed entities are removed, at the start of the next
/// [`simulate()`][Self::simulate].
#[derive(Default)]
pub struct Scene {
    world: World,
    systems: SystemManager,
    pending: Vec<Entity>,
    pending_set: BitSetVec,
    destroyed: Vec<Entity>,
    destroyed_set: BitSetVec,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// The scene's world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The scene's world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Create a new entity.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.world.entities_mut().create();
        self.mark_pending(entity);
        entity
    }

    /// Insert a component, returning the previous one if any.
    ///
    /// Inserting on a dead entity is a programmer error: it asserts in debug builds and is
    /// ignored in release builds.
    pub fn insert_component<T: EcsData>(&mut self, entity: Entity, component: T) -> Option<T> {
        match self.world.insert_component(entity, component) {
            Ok(previous) => {
                self.mark_pending(entity);
                previous
            }
            Err(e) => {
                debug_assert!(false, "{e}");
                tracing::error!("{e}");
                None
            }
        }
    }

    /// Remove a component from an entity.
    pub fn remove_component<T: EcsData>(&mut self, entity: Entity) -> Option<T> {
        let removed = self
            .world
            .get_component_mut::<T>()
            .ok()
            .and_then(|mut store| store.remove(entity));
        if removed.is_some() {
            self.mark_pending(entity);
        }
        removed
    }

    /// Mark an entity for destruction at the start of the next frame.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if self.entity_valid(entity) {
            self.destroyed_set.set(entity);
            self.destroyed.push(entity);
        }
    }

    /// Whether the entity is alive and not marked for destruction.
    pub fn entity_valid(&self, entity: Entity) -> bool {
        self.world.entities().is_alive(entity) && !self.destroyed_set.contains(entity)
    }

    /// Add a system to the scene. Systems run in the order they are added.
    ///
    /// Existing entities that fit the new system are added to it on the next frame.
    pub fn add_system<S: System>(&mut self, system: S) -> &mut S {
        let existing = self.systems.system::<S>().is_some();
        if !existing {
            let live = self.world.entities().iter().collect::<Vec<_>>();
            for entity in live {
                self.mark_pending(entity);
            }
        }
        self.systems.add_system(&mut self.world, system)
    }

    /// Get a system by type.
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.system::<S>()
    }

    /// Get a system by type.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.system_mut::<S>()
    }

    /// Run one frame: apply deferred membership changes and destructions, then process every
    /// system in registration order.
    pub fn simulate(&mut self, dt: f32) -> SystemResult {
        let mut pending = std::mem::take(&mut self.pending);
        for &entity in &pending {
            self.pending_set.unset(entity);
        }
        pending.retain(|&entity| self.entity_valid(entity));
        self.systems.update_membership(&self.world, &pending);

        let destroyed = std::mem::take(&mut self.destroyed);
        if !destroyed.is_empty() {
            self.systems.remove_many_from_systems(&self.world, &destroyed);
            for &entity in &destroyed {
                self.destroyed_set.unset(entity);
                self.world.entities_mut().kill(entity);
            }
            self.world.maintain();
            tracing::trace!(count = destroyed.len(), "Destroyed entities");
        }

        self.systems.process(&self.world, dt)
    }

    /// Draw every renderable system from the given camera entity.
    pub fn render(&mut self, camera: Entity) -> SystemResult {
        self.systems.render(&self.world, camera)
    }

    fn mark_pending(&mut self, entity: Entity) {
        if !self.pending_set.contains(entity) {
            self.pending_set.set(entity);
            self.pending.push(entity);
        }
    }
}
