//! The [`SpriteRenderer`] system.

use std::cmp::Ordering;

use crate::prelude::*;

/// Draws every entity with a [`Sprite`] and a [`Transform`] in as few draw calls as possible.
///
/// Sprites are sorted by texture and packed into vertex buffers of up to
/// [`max_per_buffer()`][Self::max_per_buffer] quads. Changing a texture or blend mode, or adding
/// or removing a sprite, rebuilds every buffer on the next [`process()`][System::process];
/// changing only vertices uploads the changed quad in place.
pub struct SpriteRenderer {
    base: SystemBase,
    context: RenderContext,
    limits: BatchLimits,
    depth_axis: DepthAxis,
    program: Option<BatchProgram>,
    buffers: BatchBuffers,
    pending_sorting: bool,
    pending_rebuild: bool,
}

impl SpriteRenderer {
    /// Create the renderer and its batching program.
    pub fn new(context: RenderContext, config: &RendererConfig) -> Self {
        let mut base = SystemBase::new("SpriteRenderer");
        base.require_component::<Sprite>()
            .require_component::<Transform>();

        let (limits, program) = {
            let mut device = context.lock();
            let limits = BatchLimits::resolve(device.max_vertex_uniform_vectors(), config);
            tracing::info!(
                max_per_buffer = limits.max_per_buffer(),
                "Sprite renderer batch size"
            );
            let program =
                BatchProgram::create(&mut *device, ProgramKind::Sprite, limits, base.name());
            (limits, program)
        };

        Self {
            base,
            buffers: BatchBuffers::new(context.clone()),
            context,
            limits,
            depth_axis: config.depth_axis,
            program,
            pending_sorting: false,
            pending_rebuild: false,
        }
    }

    /// The maximum number of sprites per vertex buffer.
    pub fn max_per_buffer(&self) -> usize {
        self.limits.max_per_buffer()
    }

    /// Whether the next update rebuilds every buffer.
    pub fn pending_rebuild(&self) -> bool {
        self.pending_rebuild
    }

    /// The vertex buffers with their batches and matrices.
    pub fn buffers(&self) -> &[GpuBuffer] {
        self.buffers.buffers()
    }

    /// The number of buffers in use.
    pub fn buffer_count(&self) -> usize {
        self.buffers.active_count()
    }

    /// Whether the batching program was created.
    pub fn is_ready(&self) -> bool {
        self.program.is_some()
    }

    fn rebuild_batch(&mut self, sprites: &mut ComponentStore<Sprite>) {
        if std::mem::take(&mut self.pending_sorting) {
            self.base.sort_entities_by(|a, b| {
                match (sprites.get(*a), sprites.get(*b)) {
                    (Some(a), Some(b)) => a.batch_key().draw_order(&b.batch_key()),
                    _ => Ordering::Equal,
                }
            });
        }

        let entities = self.base.entities();
        let plan = {
            let items = entities
                .iter()
                .map(|entity| match sprites.get(*entity) {
                    Some(sprite) => BatchItem {
                        key: sprite.batch_key(),
                        vertices: sprite.vertices(),
                    },
                    None => BatchItem {
                        key: BatchKey::new(TextureId::NONE, BlendMode::default()),
                        vertices: &[],
                    },
                })
                .collect::<Vec<_>>();
            build_batches(&items, self.limits)
        };

        for (entity, placement) in entities.iter().zip(&plan.placements) {
            if let Some(sprite) = sprites.get_mut(*entity) {
                sprite.placement = *placement;
                sprite.dirty = SpriteDirty::empty();
            }
        }

        let mut device = self.context.lock();
        self.buffers.upload(&mut *device, &plan);
        self.pending_rebuild = false;

        tracing::trace!(
            sprites = entities.len(),
            buffers = plan.buffers.len(),
            "Rebuilt sprite batches"
        );
    }

    fn update_vertices(&mut self, sprites: &mut ComponentStore<Sprite>) {
        let mut device = self.context.lock();
        for entity in self.base.entities() {
            let Some(sprite) = sprites.get_mut(*entity) else {
                continue;
            };
            if sprite.dirty.contains(SpriteDirty::VERTICES) {
                let (offset, span) = entity_span(&sprite.placement, sprite.vertices());
                self.buffers
                    .write_span(&mut *device, sprite.placement.buffer, offset, &span);
                sprite.dirty.remove(SpriteDirty::VERTICES);
            }
        }
    }
}

impl System for SpriteRenderer {
    fn base(&self) -> &SystemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SystemBase {
        &mut self.base
    }

    fn process(&mut self, world: &World, _dt: f32) -> SystemResult {
        let mut sprites = world.component_mut::<Sprite>();
        let mut transforms = world.component_mut::<Transform>();

        for entity in self.base.entities() {
            let Some(sprite) = sprites.get(*entity) else {
                debug_assert!(false, "{entity:?} in sprite renderer without a sprite");
                continue;
            };
            if sprite
                .dirty
                .intersects(SpriteDirty::TEXTURE | SpriteDirty::BLEND_MODE)
            {
                self.pending_sorting = true;
                self.pending_rebuild = true;
            }
        }

        if self.pending_rebuild {
            self.rebuild_batch(&mut sprites);
        } else {
            self.update_vertices(&mut sprites);
        }

        for entity in self.base.entities() {
            let (Some(sprite), Some(transform)) =
                (sprites.get_mut(*entity), transforms.get_mut(*entity))
            else {
                continue;
            };

            if self.depth_axis == DepthAxis::Y {
                transform.translation.z = -transform.translation.y / 100.0;
            }

            let world_matrix = transform.world_transform();
            self.buffers.set_transform(
                sprite.placement.buffer,
                sprite.placement.slot,
                world_matrix,
            );
            sprite.global_bounds = sprite.local_bounds().transform(&world_matrix);
        }

        Ok(())
    }

    fn on_entity_added(&mut self, _world: &World, _entity: Entity) {
        self.pending_sorting = true;
        self.pending_rebuild = true;
    }

    fn on_entity_removed(&mut self, _world: &World, _entity: Entity) {
        self.pending_sorting = true;
        self.pending_rebuild = true;
    }

    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        Some(self)
    }
}

impl Renderable for SpriteRenderer {
    fn render(&mut self, world: &World, camera: Entity) -> SystemResult {
        let Some(program) = self.program else {
            return Ok(());
        };
        let cameras = world.get_component::<Camera>()?;
        let Some(camera) = cameras.get(camera) else {
            debug_assert!(false, "{camera:?} has no camera component");
            tracing::error!(?camera, "Sprite renderer given an entity without a camera");
            return Ok(());
        };
        if !camera.active {
            return Ok(());
        }

        let mut device = self.context.lock();
        program.bind(&mut *device, camera);
        self.buffers
            .draw(&mut *device, program.world_matrix, |_, _| None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::prelude::*;

    fn scene_with(device: RecordingDevice, config: RendererConfig) -> (Scene, Arc<Mutex<RecordingDevice>>) {
        let device = Arc::new(Mutex::new(device));
        let mut scene = Scene::new();
        scene.add_system(SpriteRenderer::new(
            RenderContext::from_shared(device.clone()),
            &config,
        ));
        (scene, device)
    }

    fn spawn(scene: &mut Scene, texture: &Texture, position: Vec3) -> Entity {
        let entity = scene.create_entity();
        scene.insert_component(entity, Sprite::new(texture));
        scene.insert_component(entity, Transform::from_translation(position));
        entity
    }

    #[test]
    fn limit_comes_from_device() {
        let (scene, device) = scene_with(RecordingDevice::new(512), default());
        let renderer = scene.system::<SpriteRenderer>().unwrap();
        assert_eq!(renderer.max_per_buffer(), 127);
        assert!(renderer.is_ready());

        let device = device.lock();
        let DeviceCommand::CreateProgram(descriptor) = &device.commands()[0] else {
            panic!("program not created first");
        };
        assert_eq!(descriptor.kind, ProgramKind::Sprite);
        assert_eq!(descriptor.defines, ["MAX_MATRICES 127"]);
    }

    #[test]
    fn y_depth_axis_sets_z() {
        let config = RendererConfig {
            depth_axis: DepthAxis::Y,
            ..default()
        };
        let (mut scene, _device) = scene_with(RecordingDevice::default(), config);
        let texture = Texture::new(UVec2::new(4, 4));
        let e = spawn(&mut scene, &texture, Vec3::new(3.0, 250.0, 0.0));
        scene.simulate(0.016).unwrap();

        let transforms = scene.world().component::<Transform>();
        assert_eq!(transforms.get(e).unwrap().translation.z, -2.5);
        let sprites = scene.world().component::<Sprite>();
        assert_eq!(
            sprites.get(e).unwrap().global_bounds(),
            FloatRect::new(3.0, 250.0, 4.0, 4.0)
        );
    }

    #[test]
    fn failed_program_draws_nothing() {
        let (mut scene, device) =
            scene_with(RecordingDevice::default().with_failing_programs(), default());
        assert!(!scene.system::<SpriteRenderer>().unwrap().is_ready());

        let texture = Texture::new(UVec2::new(4, 4));
        spawn(&mut scene, &texture, Vec3::ZERO);
        let camera = scene.create_entity();
        scene.insert_component(camera, Camera::for_viewport(UVec2::new(640, 480)));
        scene.simulate(0.016).unwrap();
        scene.render(camera).unwrap();

        assert!(device.lock().draw_calls().is_empty());
    }
}
