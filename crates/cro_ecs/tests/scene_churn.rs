//! Randomised create/insert/destroy churn through a [`Scene`].

use cro_ecs::prelude::*;
use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
struct Position(Vec2);

#[derive(Debug, Clone, Copy)]
struct Velocity(Vec2);

struct Movement {
    base: SystemBase,
    added: usize,
    removed: usize,
}

impl Movement {
    fn new() -> Self {
        let mut base = SystemBase::new("Movement");
        base.require_component::<Position>()
            .require_component::<Velocity>();
        Self {
            base,
            added: 0,
            removed: 0,
        }
    }
}

impl System for Movement {
    fn base(&self) -> &SystemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SystemBase {
        &mut self.base
    }

    fn process(&mut self, world: &World, dt: f32) -> SystemResult {
        let mut positions = world.component_mut::<Position>();
        let velocities = world.component::<Velocity>();
        for &entity in self.base.entities() {
            let velocity = velocities.get(entity).ok_or(EcsError::DeadEntity(entity))?;
            if let Some(position) = positions.get_mut(entity) {
                position.0 += velocity.0 * dt;
            }
        }
        Ok(())
    }

    fn on_entity_added(&mut self, _world: &World, _entity: Entity) {
        self.added += 1;
    }

    fn on_entity_removed(&mut self, _world: &World, _entity: Entity) {
        self.removed += 1;
    }
}

#[test]
fn system_list_matches_component_sets() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut scene = Scene::new();
    scene.add_system(Movement::new());
    let mut live = Vec::new();

    for _ in 0..200 {
        for _ in 0..rng.gen_range(0..8) {
            let e = scene.create_entity();
            scene.insert_component(e, Position(Vec2::ZERO));
            if rng.gen_bool(0.7) {
                scene.insert_component(e, Velocity(Vec2::ONE));
            }
            live.push(e);
        }
        if !live.is_empty() && rng.gen_bool(0.5) {
            let e = live.swap_remove(rng.gen_range(0..live.len()));
            scene.destroy_entity(e);
        }
        if !live.is_empty() && rng.gen_bool(0.2) {
            let e = live[rng.gen_range(0..live.len())];
            scene.remove_component::<Velocity>(e);
        }
        scene.simulate(1.0 / 60.0).unwrap();

        let world = scene.world();
        let velocities = world.component::<Velocity>();
        let mut expected = live
            .iter()
            .copied()
            .filter(|e| velocities.contains(*e))
            .collect::<Vec<_>>();
        let mut actual = scene.system::<Movement>().unwrap().base().entities().to_vec();
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }

    let movement = scene.system::<Movement>().unwrap();
    assert_eq!(movement.added - movement.removed, movement.base().entities().len());
    assert_eq!(scene.world().entities().len(), live.len());
}
