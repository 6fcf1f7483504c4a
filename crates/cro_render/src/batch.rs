//! Grouping of renderable entities into vertex buffers and draw batches.
//!
//! Entities are expected to arrive sorted with [`BatchKey::draw_order()`]. They are cut into
//! vertex buffers of at most [`BatchLimits::max_per_buffer()`] entities, because each buffer
//! has a uniform array holding one world matrix per entity. Inside a buffer, each run of
//! entities sharing a texture and blend mode becomes one [`Batch`]: a single triangle strip in
//! which consecutive entities are joined by two duplicated vertices, producing zero-area
//! triangles.

use std::cmp::Ordering;

use glam::Mat4;

use crate::{
    camera::Camera,
    config::RendererConfig,
    device::{
        find_uniform, BlendMode, BufferId, PrimitiveType, ProgramDescriptor, ProgramId,
        ProgramKind, RenderContext, RenderDevice, UniformLocation,
    },
    rect::IntRect,
    texture::TextureId,
    vertex::{BatchVertex, Vertex2D, VertexLayout, VERTEX_SIZE},
};

/// Upper bound on entities per buffer, whatever the device supports.
pub const MAX_BUFFER_ENTITIES: usize = 255;

/// How many entities fit in one vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLimits {
    max_per_buffer: usize,
}

impl BatchLimits {
    /// Limits for an explicit entity count, clamped to `1..=255`.
    pub fn new(max_per_buffer: usize) -> Self {
        Self {
            max_per_buffer: max_per_buffer.clamp(1, MAX_BUFFER_ENTITIES),
        }
    }

    /// Limits from the number of vertex uniform vectors: one 4x4 matrix per entity, minus one
    /// matrix for the projection.
    pub fn from_uniform_vectors(max_vectors: u32) -> Self {
        Self::new((max_vectors as usize / 4).saturating_sub(1))
    }

    /// Limits from the device, optionally lowered by configuration.
    pub fn resolve(max_vectors: u32, config: &RendererConfig) -> Self {
        let limits = Self::from_uniform_vectors(max_vectors);
        match config.max_batch_entities {
            Some(max) => Self::new(max.min(limits.max_per_buffer)),
            None => limits,
        }
    }

    /// The maximum number of entities per vertex buffer.
    pub fn max_per_buffer(&self) -> usize {
        self.max_per_buffer
    }

    /// The number of buffers needed for `entities` entities.
    pub fn buffer_count(&self, entities: usize) -> usize {
        entities.div_ceil(self.max_per_buffer)
    }

    /// The buffer and matrix slot of the entity at `index` in the sorted entity list.
    pub fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.max_per_buffer, index % self.max_per_buffer)
    }
}

/// The state an entity must share with its neighbours to be drawn in the same batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchKey {
    /// The texture bound for the batch.
    pub texture: TextureId,
    /// The blend mode of the batch.
    pub blend_mode: BlendMode,
    /// Isolated entities always get a batch of their own, e.g. because they are scissored.
    pub isolated: bool,
}

impl BatchKey {
    /// A shareable key.
    pub fn new(texture: TextureId, blend_mode: BlendMode) -> Self {
        Self {
            texture,
            blend_mode,
            isolated: false,
        }
    }

    /// The same key, but never shared with another entity.
    pub fn isolated(self) -> Self {
        Self {
            isolated: true,
            ..self
        }
    }

    /// Sort order of entities: texture handle descending, then blend mode.
    pub fn draw_order(&self, other: &BatchKey) -> Ordering {
        other
            .texture
            .cmp(&self.texture)
            .then(self.blend_mode.cmp(&other.blend_mode))
    }
}

/// One entity's contribution to a batch build.
#[derive(Clone, Copy, Debug)]
pub struct BatchItem<'a> {
    /// Batch state.
    pub key: BatchKey,
    /// Vertices in strip order. May be empty.
    pub vertices: &'a [Vertex2D],
}

/// A range of a vertex buffer drawn with one texture bind and one draw call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    /// First vertex of the strip.
    pub start: u32,
    /// Number of vertices, join vertices included.
    pub count: u32,
    /// Texture to bind.
    pub texture: TextureId,
    /// Blend mode to apply.
    pub blend_mode: BlendMode,
    /// Whether a scissor rectangle must be applied.
    pub scissor: bool,
    /// Number of entities drawn.
    pub entity_count: u32,
}

impl Batch {
    fn new(start: usize, key: BatchKey) -> Self {
        Self {
            start: start as u32,
            count: 0,
            texture: key.texture,
            blend_mode: key.blend_mode,
            scissor: key.isolated,
            entity_count: 0,
        }
    }
}

/// Where an entity's vertices ended up after a build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Placement {
    /// Index of the vertex buffer.
    pub buffer: usize,
    /// Index of the entity's matrix in the buffer's matrix array.
    pub slot: usize,
    /// Index of the batch within the buffer, if the entity has vertices.
    pub batch: Option<usize>,
    /// Byte offset of the entity's first vertex in the buffer.
    pub vbo_offset: usize,
    /// Number of vertices written for the entity, join vertices excluded.
    pub vertex_count: usize,
    /// A copy of the first vertex precedes the entity's vertices.
    pub joined_prev: bool,
    /// A copy of the last vertex follows the entity's vertices.
    pub joined_next: bool,
}

/// The contents of one vertex buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferLayout {
    /// Vertex data.
    pub vertices: Vec<BatchVertex>,
    /// Draw batches, in order.
    pub batches: Vec<Batch>,
    /// Number of entities, and so of world matrices.
    pub entity_count: usize,
}

/// The result of [`build_batches()`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchPlan {
    /// One layout per vertex buffer.
    pub buffers: Vec<BufferLayout>,
    /// One placement per input item, in input order.
    pub placements: Vec<Placement>,
}

/// Lay out sorted items into vertex buffers and batches.
pub fn build_batches(items: &[BatchItem], limits: BatchLimits) -> BatchPlan {
    let mut plan = BatchPlan {
        buffers: Vec::with_capacity(limits.buffer_count(items.len())),
        placements: Vec::with_capacity(items.len()),
    };

    for (buffer, chunk) in items.chunks(limits.max_per_buffer()).enumerate() {
        let mut layout = BufferLayout {
            entity_count: chunk.len(),
            ..Default::default()
        };
        let mut current: Option<(BatchKey, Batch)> = None;
        // Placement of the previous entity with vertices in the current batch.
        let mut previous: Option<usize> = None;

        for (slot, item) in chunk.iter().enumerate() {
            let mut placement = Placement {
                buffer,
                slot,
                vbo_offset: layout.vertices.len() * VERTEX_SIZE,
                ..Default::default()
            };
            let Some(first) = item.vertices.first() else {
                plan.placements.push(placement);
                continue;
            };

            let joinable = matches!(current, Some((key, _)) if key == item.key && !key.isolated);
            if !joinable {
                if let Some((_, batch)) = current.take() {
                    layout.batches.push(batch);
                }
                previous = None;
            }
            let (_, batch) = current
                .get_or_insert_with(|| (item.key, Batch::new(layout.vertices.len(), item.key)));

            if let Some(previous) = previous {
                if let Some(&last) = layout.vertices.last() {
                    layout.vertices.push(last);
                    layout.vertices.push(BatchVertex::new(first, slot));
                    batch.count += 2;
                    plan.placements[previous].joined_next = true;
                    placement.joined_prev = true;
                }
            }

            placement.vbo_offset = layout.vertices.len() * VERTEX_SIZE;
            placement.batch = Some(layout.batches.len());
            placement.vertex_count = item.vertices.len();
            layout
                .vertices
                .extend(item.vertices.iter().map(|v| BatchVertex::new(v, slot)));
            batch.count += item.vertices.len() as u32;
            batch.entity_count += 1;

            previous = Some(plan.placements.len());
            plan.placements.push(placement);
        }

        if let Some((_, batch)) = current {
            layout.batches.push(batch);
        }
        plan.buffers.push(layout);
    }

    plan
}

/// The byte offset and contents of the buffer range owned by an entity: its vertices plus its
/// copies inside the neighbouring join vertices.
///
/// Writing this span updates an entity in place without disturbing any other entity, as long as
/// its vertex count is unchanged.
pub fn entity_span(placement: &Placement, vertices: &[Vertex2D]) -> (usize, Vec<BatchVertex>) {
    debug_assert_eq!(placement.vertex_count, vertices.len());
    let slot = placement.slot;
    let mut offset = placement.vbo_offset;
    let mut span = Vec::with_capacity(vertices.len() + 2);

    if let (true, Some(first)) = (placement.joined_prev, vertices.first()) {
        span.push(BatchVertex::new(first, slot));
        offset -= VERTEX_SIZE;
    }
    span.extend(vertices.iter().map(|v| BatchVertex::new(v, slot)));
    if let (true, Some(last)) = (placement.joined_next, vertices.last()) {
        span.push(BatchVertex::new(last, slot));
    }

    (offset, span)
}

/// The batching program of a renderer with the locations of its uniforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgram {
    /// The device program.
    pub id: ProgramId,
    /// `u_worldMatrix[0]`, the per-entity matrix array.
    pub world_matrix: UniformLocation,
    /// `u_texture`, the sampler.
    pub texture: UniformLocation,
    /// `u_projectionMatrix`, the camera view-projection.
    pub projection: UniformLocation,
}

impl BatchProgram {
    /// Compile the program for `limits` and look up its uniforms.
    ///
    /// Returns `None` after logging an error if the device rejects the program.
    pub fn create(
        device: &mut dyn RenderDevice,
        kind: ProgramKind,
        limits: BatchLimits,
        renderer: &str,
    ) -> Option<Self> {
        let descriptor = ProgramDescriptor {
            kind,
            defines: vec![format!("MAX_MATRICES {}", limits.max_per_buffer())],
        };
        let id = match device.create_program(&descriptor) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("{renderer}: failed to create batching program: {e}");
                return None;
            }
        };

        let device = &*device;
        Some(Self {
            id,
            world_matrix: find_uniform(device, id, renderer, "u_worldMatrix[0]"),
            texture: find_uniform(device, id, renderer, "u_texture"),
            projection: find_uniform(device, id, renderer, "u_projectionMatrix"),
        })
    }

    /// Make the program current for a camera.
    pub fn bind(&self, device: &mut dyn RenderDevice, camera: &Camera) {
        gpu_check!(device, device.use_program(self.id));
        gpu_check!(
            device,
            device.set_uniform_mat4(self.projection, &[camera.view_projection])
        );
        gpu_check!(device, device.set_uniform_i32(self.texture, 0));
    }
}

/// A vertex buffer on the device with its batches and world matrices.
#[derive(Debug)]
pub struct GpuBuffer {
    id: BufferId,
    batches: Vec<Batch>,
    transforms: Vec<Mat4>,
    vertex_count: usize,
}

impl GpuBuffer {
    /// The device buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The draw batches.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// The world matrix of each entity, by slot.
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    /// The number of vertices uploaded.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}

/// The vertex buffers owned by a renderer.
///
/// Buffers are created as needed and kept when fewer are needed, to be reused by later builds.
/// They are deleted when this is dropped.
pub struct BatchBuffers {
    context: RenderContext,
    buffers: Vec<GpuBuffer>,
}

impl BatchBuffers {
    /// No buffers yet.
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            buffers: Vec::new(),
        }
    }

    /// Upload a plan, replacing the previous contents of every buffer.
    pub fn upload(&mut self, device: &mut dyn RenderDevice, plan: &BatchPlan) {
        while self.buffers.len() < plan.buffers.len() {
            let id = gpu_check!(device, device.create_vertex_buffer());
            self.buffers.push(GpuBuffer {
                id,
                batches: Vec::new(),
                transforms: Vec::new(),
                vertex_count: 0,
            });
        }

        for (i, buffer) in self.buffers.iter_mut().enumerate() {
            buffer.batches.clear();
            buffer.transforms.clear();
            buffer.vertex_count = 0;

            let Some(layout) = plan.buffers.get(i) else {
                continue;
            };
            gpu_check!(
                device,
                device.buffer_data(buffer.id, bytemuck::cast_slice(&layout.vertices))
            );
            buffer.batches.extend_from_slice(&layout.batches);
            buffer.transforms.resize(layout.entity_count, Mat4::IDENTITY);
            buffer.vertex_count = layout.vertices.len();
        }
    }

    /// Overwrite vertices of a buffer in place, starting at a byte offset.
    pub fn write_span(
        &mut self,
        device: &mut dyn RenderDevice,
        buffer: usize,
        offset: usize,
        vertices: &[BatchVertex],
    ) {
        let Some(buffer) = self.buffers.get(buffer) else {
            debug_assert!(false, "write to missing batch buffer {buffer}");
            return;
        };
        gpu_check!(
            device,
            device.buffer_sub_data(buffer.id, offset, bytemuck::cast_slice(vertices))
        );
    }

    /// Set the world matrix of the entity in `slot` of `buffer`.
    pub fn set_transform(&mut self, buffer: usize, slot: usize, transform: Mat4) {
        if let Some(matrix) = self
            .buffers
            .get_mut(buffer)
            .and_then(|b| b.transforms.get_mut(slot))
        {
            *matrix = transform;
        }
    }

    /// All buffers, including unused ones kept for reuse.
    pub fn buffers(&self) -> &[GpuBuffer] {
        &self.buffers
    }

    /// The number of buffers holding at least one batch.
    pub fn active_count(&self) -> usize {
        self.buffers.iter().filter(|b| !b.batches.is_empty()).count()
    }

    /// Draw every batch.
    ///
    /// Each buffer uploads its world matrices and binds its vertices once, then each batch
    /// binds its texture and issues one strip draw call. `scissor` is asked for the rectangle
    /// of batches that need one.
    pub fn draw(
        &self,
        device: &mut dyn RenderDevice,
        matrix_uniform: UniformLocation,
        mut scissor: impl FnMut(usize, usize) -> Option<IntRect>,
    ) {
        let layout = VertexLayout::batch();
        for (b, buffer) in self.buffers.iter().enumerate() {
            if buffer.batches.is_empty() {
                continue;
            }

            gpu_check!(
                device,
                device.set_uniform_mat4(matrix_uniform, &buffer.transforms)
            );
            gpu_check!(device, device.bind_vertex_buffer(buffer.id, &layout));

            for (i, batch) in buffer.batches.iter().enumerate() {
                let rect = if batch.scissor { scissor(b, i) } else { None };
                if rect.is_some() {
                    gpu_check!(device, device.set_scissor(rect));
                }
                gpu_check!(device, device.apply_blend_mode(batch.blend_mode));
                gpu_check!(device, device.bind_texture(0, batch.texture));
                gpu_check!(
                    device,
                    device.draw_arrays(PrimitiveType::TriangleStrip, batch.start, batch.count)
                );
                if rect.is_some() {
                    gpu_check!(device, device.set_scissor(None));
                }
            }
        }
    }
}

impl Drop for BatchBuffers {
    fn drop(&mut self) {
        let mut device = self.context.lock();
        for buffer in &self.buffers {
            device.delete_vertex_buffer(buffer.id);
        }
    }
}
