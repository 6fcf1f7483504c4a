use std::{cmp::Ordering, sync::Arc};

use fxhash::FxHashMap;

use crate::prelude::*;

/// Draws every entity with a [`Text`] and a [`Transform`], batched by font atlas page.
///
/// Layout, string, character size and blend mode changes rebuild every buffer on the next
/// [`process()`][System::process], as does a font replacing one of its atlas textures. Fill
/// colour changes are uploaded in place. Texts with a cropping area get a batch of their own
/// and are drawn with a scissor rectangle.
pub struct TextRenderer {
    base: SystemBase,
    context: RenderContext,
    limits: BatchLimits,
    program: Option<BatchProgram>,
    buffers: BatchBuffers,
    observer: FontObserver,
    /// The entity of each scissored batch, by buffer and batch index.
    scissored: FxHashMap<(usize, usize), Entity>,
    pending_sorting: bool,
    pending_rebuild: bool,
}

impl TextRenderer {
    /// Create the renderer and its batching program.
    pub fn new(context: RenderContext, config: &RendererConfig) -> Self {
        let mut base = SystemBase::new("TextRenderer");
        base.require_component::<Text>()
            .require_component::<Transform>();

        let (limits, program) = {
            let mut device = context.lock();
            let limits = BatchLimits::resolve(device.max_vertex_uniform_vectors(), config);
            tracing::info!(
                max_per_buffer = limits.max_per_buffer(),
                "Text renderer batch size"
            );
            let program =
                BatchProgram::create(&mut *device, ProgramKind::Text, limits, base.name());
            (limits, program)
        };

        Self {
            base,
            buffers: BatchBuffers::new(context.clone()),
            context,
            limits,
            program,
            observer: FontObserver::new(),
            scissored: FxHashMap::default(),
            pending_sorting: false,
            pending_rebuild: false,
        }
    }

    /// The maximum number of texts per vertex buffer.
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

    fn rebuild_batch(&mut self, texts: &mut ComponentStore<Text>) {
        // Laying out one text can grow an atlas page under texts laid out before it.
        loop {
            for entity in self.base.entities() {
                if let Some(text) = texts.get_mut(*entity) {
                    text.font().register_observer(&self.observer);
                    text.update_vertices();
                }
            }
            if !self.observer.take_notification() {
                break;
            }
            for entity in self.base.entities() {
                if let Some(text) = texts.get_mut(*entity) {
                    text.dirty |= TextDirty::VERTICES;
                }
            }
        }

        if std::mem::take(&mut self.pending_sorting) {
            self.base.sort_entities_by(|a, b| {
                match (texts.get(*a), texts.get(*b)) {
                    (Some(a), Some(b)) => a.batch_key().draw_order(&b.batch_key()),
                    _ => Ordering::Equal,
                }
            });
        }

        let entities = self.base.entities();
        let plan = {
            let items = entities
                .iter()
                .map(|entity| match texts.get(*entity) {
                    Some(text) => BatchItem {
                        key: text.batch_key(),
                        vertices: text.vertices(),
                    },
                    None => BatchItem {
                        key: BatchKey::new(TextureId::NONE, BlendMode::default()),
                        vertices: &[],
                    },
                })
                .collect::<Vec<_>>();
            build_batches(&items, self.limits)
        };

        self.scissored.clear();
        for (entity, placement) in entities.iter().zip(&plan.placements) {
            let Some(text) = texts.get_mut(*entity) else {
                continue;
            };
            text.placement = *placement;
            text.dirty = TextDirty::empty();
            if let (Some(batch), Some(_)) = (placement.batch, text.cropping_area()) {
                self.scissored.insert((placement.buffer, batch), *entity);
            }
        }

        let mut device = self.context.lock();
        self.buffers.upload(&mut *device, &plan);
        self.pending_rebuild = false;

        tracing::trace!(
            texts = entities.len(),
            buffers = plan.buffers.len(),
            "Rebuilt text batches"
        );
    }

    fn update_colours(&mut self, texts: &mut ComponentStore<Text>) {
        let mut device = self.context.lock();
        for entity in self.base.entities() {
            let Some(text) = texts.get_mut(*entity) else {
                continue;
            };
            if text.dirty.contains(TextDirty::COLOURS) {
                text.update_vertices();
                let (offset, span) = entity_span(&text.placement, text.vertices());
                if !span.is_empty() {
                    self.buffers
                        .write_span(&mut *device, text.placement.buffer, offset, &span);
                }
            }
        }
    }

    fn sync_fonts(&self, texts: &ComponentStore<Text>) {
        let mut fonts: Vec<&Arc<Font>> = Vec::new();
        for entity in self.base.entities() {
            if let Some(text) = texts.get(*entity) {
                if !fonts.iter().any(|f| Arc::ptr_eq(f, text.font())) {
                    fonts.push(text.font());
                }
            }
        }

        let mut device = self.context.lock();
        for font in fonts {
            font.sync_textures(&mut *device);
        }
    }
}

impl System for TextRenderer {
    fn base(&self) -> &SystemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SystemBase {
        &mut self.base
    }

    fn process(&mut self, world: &World, _dt: f32) -> SystemResult {
        let mut texts = world.component_mut::<Text>();
        let transforms = world.component::<Transform>();

        if self.observer.take_notification() {
            tracing::debug!("Font atlas changed, laying out all texts");
            for entity in self.base.entities() {
                if let Some(text) = texts.get_mut(*entity) {
                    text.dirty |= TextDirty::VERTICES;
                }
            }
        }

        for entity in self.base.entities() {
            let Some(text) = texts.get(*entity) else {
                debug_assert!(false, "{entity:?} in text renderer without a text");
                continue;
            };
            if text.dirty.intersects(TextDirty::REBUILD) {
                self.pending_sorting = true;
                self.pending_rebuild = true;
            }
        }

        if self.pending_rebuild {
            self.rebuild_batch(&mut texts);
        } else {
            self.update_colours(&mut texts);
        }
        self.sync_fonts(&texts);

        for entity in self.base.entities() {
            let (Some(text), Some(transform)) = (texts.get(*entity), transforms.get(*entity))
            else {
                continue;
            };
            self.buffers.set_transform(
                text.placement.buffer,
                text.placement.slot,
                transform.world_transform(),
            );
        }

        Ok(())
    }

    fn on_entity_added(&mut self, world: &World, entity: Entity) {
        if let Some(text) = world.component::<Text>().get(entity) {
            text.font().register_observer(&self.observer);
        }
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

impl Renderable for TextRenderer {
    fn render(&mut self, world: &World, camera: Entity) -> SystemResult {
        let Some(program) = self.program else {
            return Ok(());
        };
        let cameras = world.get_component::<Camera>()?;
        let Some(camera) = cameras.get(camera) else {
            debug_assert!(false, "{camera:?} has no camera component");
            tracing::error!(?camera, "Text renderer given an entity without a camera");
            return Ok(());
        };
        if !camera.active {
            return Ok(());
        }

        let texts = world.component::<Text>();
        let transforms = world.component::<Transform>();
        let scissor = |buffer: usize, batch: usize| {
            let entity = *self.scissored.get(&(buffer, batch))?;
            let area = texts.get(entity)?.cropping_area()?;
            let world_area = area.transform(&transforms.get(entity)?.world_transform());
            Some(camera.scissor_rect(&world_area))
        };

        let mut device = self.context.lock();
        program.bind(&mut *device, camera);
        self.buffers
            .draw(&mut *device, program.world_matrix, scissor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::prelude::*;

    fn scene() -> (Scene, Arc<Mutex<RecordingDevice>>) {
        let device = Arc::new(Mutex::new(RecordingDevice::default()));
        let mut scene = Scene::new();
        scene.add_system(TextRenderer::new(
            RenderContext::from_shared(device.clone()),
            &default(),
        ));
        (scene, device)
    }

    #[test]
    fn program_kind_is_text() {
        let (_scene, device) = scene();
        let device = device.lock();
        assert!(matches!(
            &device.commands()[0],
            DeviceCommand::CreateProgram(ProgramDescriptor {
                kind: ProgramKind::Text,
                ..
            })
        ));
    }

    #[test]
    fn fonts_are_uploaded() {
        let (mut scene, device) = scene();
        let font = Arc::new(Font::new(BlockRasterizer::new()));
        let e = scene.create_entity();
        scene.insert_component(e, Text::with_string(font.clone(), "abc"));
        scene.insert_component(e, Transform::default());
        scene.simulate(0.016).unwrap();

        let texture = font.texture(DEFAULT_CHAR_SIZE);
        assert_eq!(device.lock().texture_size(texture.id()), Some(texture.size()));
        assert_eq!(font.observer_count(), 1);
    }
}
