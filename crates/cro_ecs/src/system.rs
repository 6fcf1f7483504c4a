//! Systems and the [`SystemManager`] that schedules them.

use std::any::{type_name, Any, TypeId};

use crate::prelude::*;

/// Upcasting helper so boxed systems can be downcast to their concrete type.
pub trait AsAny: Any {
    /// Borrow as [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Clone, Copy)]
struct Requirement {
    id: TypeId,
    name: &'static str,
    init: fn(&mut ComponentStores),
}

impl std::fmt::Debug for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// State shared by every system: its name, the component types it requires and the entities
/// that currently satisfy them.
#[derive(Debug, Clone)]
pub struct SystemBase {
    name: &'static str,
    requirements: Vec<Requirement>,
    entities: Vec<Entity>,
    membership: BitSetVec,
    active: bool,
}

impl SystemBase {
    /// Create a system base with no requirements.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            requirements: Vec::new(),
            entities: Vec::new(),
            membership: create_bitset(),
            active: true,
        }
    }

    /// Require entities processed by this system to have a component of type `T`.
    pub fn require_component<T: EcsData>(&mut self) -> &mut Self {
        let id = TypeId::of::<T>();
        if !self.requirements.iter().any(|r| r.id == id) {
            self.requirements.push(Requirement {
                id,
                name: type_name::<T>(),
                init: ComponentStores::init::<T>,
            });
        }
        self
    }

    /// The system's name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The entities currently matching the system's requirements, in the order they were added.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Reorder the entity list, for systems that keep it sorted. The sort is stable.
    pub fn sort_entities_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Entity, &Entity) -> std::cmp::Ordering,
    {
        self.entities.sort_by(compare);
    }

    /// Whether [`System::process()`] is called for this system.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enable or disable processing of this system.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether the entity has every required component.
    pub fn fits(&self, components: &ComponentStores, entity: Entity) -> bool {
        self.requirements
            .iter()
            .all(|r| components.has_component(r.id, entity))
    }

    /// Whether the entity is in this system's list.
    ///
    /// Membership is tracked by entity index, so an entity must be removed from its systems
    /// before it is killed.
    pub fn has_entity(&self, entity: Entity) -> bool {
        self.membership.contains(entity)
    }

    fn push_entity(&mut self, entity: Entity) {
        self.membership.set(entity);
        self.entities.push(entity);
    }

    /// Drop every listed entity whose membership bit was cleared, in a single pass.
    fn compact(&mut self) {
        let membership = &self.membership;
        self.entities.retain(|e| membership.contains(*e));
    }

    /// The type names of the required components.
    pub fn requirement_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.requirements.iter().map(|r| r.name)
    }
}

/// A system processes the entities matching its required components once per frame.
pub trait System: AsAny + Send + Sync {
    /// The shared system state.
    fn base(&self) -> &SystemBase;
    /// The shared system state.
    fn base_mut(&mut self) -> &mut SystemBase;

    /// Called once when the system is added to a scene, after the stores of its required
    /// components have been initialized.
    fn initialize(&mut self, _world: &mut World) {}

    /// Update the system. Called once per frame in registration order.
    fn process(&mut self, _world: &World, _dt: f32) -> SystemResult {
        Ok(())
    }

    /// Called after an entity is added to the system's entity list.
    fn on_entity_added(&mut self, _world: &World, _entity: Entity) {}

    /// Called after an entity is removed from the system's entity list.
    fn on_entity_removed(&mut self, _world: &World, _entity: Entity) {}

    /// Systems that draw return themselves here.
    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        None
    }
}

/// A system that can draw its entities from the point of view of a camera entity.
pub trait Renderable {
    /// Draw the system's entities.
    fn render(&mut self, world: &World, camera: Entity) -> SystemResult;
}

/// An ordered collection of systems.
#[derive(Default)]
pub struct SystemManager {
    systems: Vec<Box<dyn System>>,
}

impl SystemManager {
    /// Add a system, returning a reference to it.
    ///
    /// A scene holds at most one system of each type; adding a second one returns the existing
    /// system and drops the new one.
    pub fn add_system<S: System>(&mut self, world: &mut World, mut system: S) -> &mut S {
        let position = self
            .systems
            .iter()
            .position(|s| (**s).as_any().is::<S>());

        let index = match position {
            Some(index) => {
                tracing::warn!(
                    system = system.base().name(),
                    "System already exists in scene, returning existing instance"
                );
                index
            }
            None => {
                for requirement in &system.base().requirements {
                    (requirement.init)(&mut world.components);
                }
                system.initialize(world);
                tracing::debug!(
                    system = system.base().name(),
                    requirements = ?system.base().requirement_names().collect::<Vec<_>>(),
                    "Added system"
                );
                self.systems.push(Box::new(system));
                self.systems.len() - 1
            }
        };

        (*self.systems[index])
            .as_any_mut()
            .downcast_mut::<S>()
            .unwrap_or_else(|| unreachable!())
    }

    /// Get a system by type.
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|s| (**s).as_any().downcast_ref::<S>())
    }

    /// Get a system by type.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|s| (**s).as_any_mut().downcast_mut::<S>())
    }

    /// The number of systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether there are no systems.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Re-evaluate which systems an entity belongs to after its components changed.
    ///
    /// Systems the entity now fits gain it; systems it no longer fits lose it.
    pub fn add_to_systems(&mut self, world: &World, entity: Entity) {
        self.update_membership(world, &[entity]);
    }

    /// [`add_to_systems()`][Self::add_to_systems] for many entities, touching each system's
    /// entity list once.
    pub fn update_membership(&mut self, world: &World, entities: &[Entity]) {
        let mut removed = Vec::new();
        for system in &mut self.systems {
            for &entity in entities {
                let fits = system.base().fits(&world.components, entity);
                let has = system.base().has_entity(entity);
                if fits && !has {
                    system.base_mut().push_entity(entity);
                    system.on_entity_added(world, entity);
                } else if !fits && has {
                    system.base_mut().membership.unset(entity);
                    removed.push(entity);
                }
            }
            Self::finish_removal(system.as_mut(), world, &mut removed);
        }
    }

    /// Remove an entity from every system.
    pub fn remove_from_systems(&mut self, world: &World, entity: Entity) {
        self.remove_many_from_systems(world, &[entity]);
    }

    /// Remove many entities from every system, touching each system's entity list once.
    pub fn remove_many_from_systems(&mut self, world: &World, entities: &[Entity]) {
        let mut removed = Vec::new();
        for system in &mut self.systems {
            for &entity in entities {
                if system.base().has_entity(entity) {
                    system.base_mut().membership.unset(entity);
                    removed.push(entity);
                }
            }
            Self::finish_removal(system.as_mut(), world, &mut removed);
        }
    }

    fn finish_removal(system: &mut dyn System, world: &World, removed: &mut Vec<Entity>) {
        if removed.is_empty() {
            return;
        }
        system.base_mut().compact();
        for entity in removed.drain(..) {
            system.on_entity_removed(world, entity);
        }
    }

    /// Run every active system, strictly in registration order.
    pub fn process(&mut self, world: &World, dt: f32) -> SystemResult {
        for system in &mut self.systems {
            if system.base().is_active() {
                system.process(world, dt)?;
            }
        }
        Ok(())
    }

    /// Render every renderable system, in registration order.
    pub fn render(&mut self, world: &World, camera: Entity) -> SystemResult {
        for system in &mut self.systems {
            if let Some(renderable) = system.as_renderable() {
                renderable.render(world, camera)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::prelude::*;

    struct Pos;
    struct Vel;

    struct Recorder {
        base: SystemBase,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
            let mut base = SystemBase::new(name);
            base.require_component::<Pos>().require_component::<Vel>();
            Self { base, log }
        }
    }

    impl System for Recorder {
        fn base(&self) -> &SystemBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }
        fn process(&mut self, _world: &World, _dt: f32) -> SystemResult {
            self.log.lock().unwrap().push(format!("process {}", self.base.name()));
            Ok(())
        }
        fn on_entity_added(&mut self, _world: &World, entity: Entity) {
            self.log.lock().unwrap().push(format!("added {}", entity.index()));
        }
        fn on_entity_removed(&mut self, _world: &World, entity: Entity) {
            self.log.lock().unwrap().push(format!("removed {}", entity.index()));
        }
    }

    struct Other {
        base: SystemBase,
    }

    impl System for Other {
        fn base(&self) -> &SystemBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }
        fn process(&mut self, _world: &World, _dt: f32) -> SystemResult {
            anyhow::bail!("other failed")
        }
    }

    #[test]
    fn membership_follows_requirements() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::new();
        let mut systems = SystemManager::default();
        systems.add_system(&mut world, Recorder::new("recorder", log.clone()));

        let e = world.entities_mut().create();
        world.component_mut::<Pos>().insert(e, Pos);
        systems.add_to_systems(&world, e);
        assert!(systems.system::<Recorder>().unwrap().base().entities().is_empty());

        world.component_mut::<Vel>().insert(e, Vel);
        systems.add_to_systems(&world, e);
        systems.add_to_systems(&world, e);
        assert_eq!(systems.system::<Recorder>().unwrap().base().entities(), &[e]);

        world.component_mut::<Vel>().remove(e);
        systems.add_to_systems(&world, e);
        assert!(systems.system::<Recorder>().unwrap().base().entities().is_empty());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["added 0".to_string(), "removed 0".to_string()]
        );
    }

    #[test]
    fn batched_updates_keep_list_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::new();
        let mut systems = SystemManager::default();
        systems.add_system(&mut world, Recorder::new("recorder", log.clone()));

        let entities = (0..4)
            .map(|_| {
                let e = world.entities_mut().create();
                world.component_mut::<Pos>().insert(e, Pos);
                world.component_mut::<Vel>().insert(e, Vel);
                e
            })
            .collect::<Vec<_>>();
        systems.update_membership(&world, &entities);
        systems.update_membership(&world, &entities);
        assert_eq!(systems.system::<Recorder>().unwrap().base().entities(), &entities[..]);

        world.component_mut::<Vel>().remove(entities[1]);
        world.component_mut::<Vel>().remove(entities[3]);
        systems.update_membership(&world, &entities);
        let base = systems.system::<Recorder>().unwrap().base();
        assert_eq!(base.entities(), &[entities[0], entities[2]]);
        assert!(!base.has_entity(entities[1]));

        systems.remove_many_from_systems(&world, &[entities[0], entities[0]]);
        assert_eq!(systems.system::<Recorder>().unwrap().base().entities(), &[entities[2]]);

        assert_eq!(
            log.lock().unwrap()[4..],
            ["removed 1", "removed 3", "removed 0"].map(String::from)
        );
    }

    #[test]
    fn duplicate_system_returns_existing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::new();
        let mut systems = SystemManager::default();
        systems
            .add_system(&mut world, Recorder::new("first", log.clone()))
            .base_mut()
            .set_active(false);
        let again = systems.add_system(&mut world, Recorder::new("second", log));
        assert_eq!(again.base().name(), "first");
        assert!(!again.base().is_active());
        assert_eq!(systems.len(), 1);
    }

    #[test]
    fn process_runs_in_order_and_propagates_errors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = World::new();
        let mut systems = SystemManager::default();
        systems.add_system(&mut world, Recorder::new("recorder", log.clone()));
        systems.add_system(
            &mut world,
            Other {
                base: SystemBase::new("other"),
            },
        );

        let err = systems.process(&world, 0.016).unwrap_err();
        assert_eq!(err.to_string(), "other failed");
        assert_eq!(*log.lock().unwrap(), vec!["process recorder".to_string()]);

        systems.system_mut::<Other>().unwrap().base_mut().set_active(false);
        assert!(systems.process(&world, 0.016).is_ok());
    }
}
