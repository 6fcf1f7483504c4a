//! The graphics API seen by the renderers.
//!
//! Renderers never talk to a graphics API directly. They issue the calls of the
//! [`RenderDevice`] trait through a shared [`RenderContext`], which makes the batching logic
//! independent of the backend and observable in tests through [`RecordingDevice`].

use std::sync::Arc;

use fxhash::FxHashMap;
use glam::{Mat4, UVec2};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::{
    rect::IntRect,
    texture::TextureId,
    vertex::{BatchVertex, VertexLayout, VERTEX_SIZE},
    RenderError,
};

/// Handle of a vertex buffer on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle of a linked shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Location of a uniform in a program. Location 0 is used when a uniform is missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// The built-in programs a device must provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Textured, vertex coloured quads.
    Sprite,
    /// Alpha-only glyph atlas text.
    Text,
}

/// Request for a program, with the preprocessor defines it is compiled with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramDescriptor {
    /// Which program.
    pub kind: ProgramKind,
    /// `NAME VALUE` defines, e.g. `MAX_MATRICES 127`.
    pub defines: Vec<String>,
}

/// How a batch is blended with the render target.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BlendMode {
    /// Opaque, depth tested.
    None,
    /// Source alpha blending.
    #[default]
    Alpha,
    /// Additive blending.
    Additive,
    /// Multiply the destination by the source colour.
    Multiply,
}

/// Primitive topology of a draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveType {
    /// Each vertex after the first two forms a triangle with the two before it.
    TriangleStrip,
}

/// The subset of a graphics API used by the batching renderers.
///
/// Calls that cannot fail in a way the caller can act on return nothing; errors are reported
/// through [`take_error()`][Self::take_error] as a GL-style error queue.
pub trait RenderDevice: Send {
    /// The number of 4-component uniform vectors available to vertex programs.
    fn max_vertex_uniform_vectors(&self) -> u32;
    /// Compile and link a program.
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, RenderError>;
    /// Names of the active uniforms of a program.
    fn uniform_names(&self, program: ProgramId) -> Vec<String>;
    /// Location of a uniform, if the program has it.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Create an empty vertex buffer.
    fn create_vertex_buffer(&mut self) -> BufferId;
    /// Delete a vertex buffer.
    fn delete_vertex_buffer(&mut self, buffer: BufferId);
    /// Replace the whole contents of a buffer.
    fn buffer_data(&mut self, buffer: BufferId, data: &[u8]);
    /// Overwrite part of a buffer. The write must lie within the buffer's current size.
    fn buffer_sub_data(&mut self, buffer: BufferId, offset: usize, data: &[u8]);
    /// Create or replace the pixels of a single channel texture.
    fn upload_texture(&mut self, texture: TextureId, size: UVec2, pixels: &[u8]);
    /// Make a program current.
    fn use_program(&mut self, program: ProgramId);
    /// Upload an array of matrices starting at `location`.
    fn set_uniform_mat4(&mut self, location: UniformLocation, matrices: &[Mat4]);
    /// Set an integer uniform.
    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32);
    /// Bind a vertex buffer and its attribute layout for drawing.
    fn bind_vertex_buffer(&mut self, buffer: BufferId, layout: &VertexLayout);
    /// Bind a texture to a texture unit.
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    /// Set blending state.
    fn apply_blend_mode(&mut self, mode: BlendMode);
    /// Enable scissoring to a rectangle, or disable it with `None`.
    fn set_scissor(&mut self, rect: Option<IntRect>);
    /// Draw `count` vertices of the bound buffer, starting at vertex `start`.
    fn draw_arrays(&mut self, primitive: PrimitiveType, start: u32, count: u32);
    /// Pop the oldest unreported error.
    fn take_error(&mut self) -> Option<RenderError>;
}

/// A shared handle to a [`RenderDevice`].
#[derive(Clone)]
pub struct RenderContext {
    device: Arc<Mutex<dyn RenderDevice>>,
}

impl RenderContext {
    /// Wrap a device.
    pub fn new<D: RenderDevice + 'static>(device: D) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
        }
    }

    /// Share a device the caller keeps a typed handle to.
    pub fn from_shared<D: RenderDevice + 'static>(device: Arc<Mutex<D>>) -> Self {
        Self { device }
    }

    /// Lock the device for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, dyn RenderDevice> {
        self.device.lock()
    }
}

/// A device call recorded by [`RecordingDevice`].
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    /// [`RenderDevice::create_program()`]
    CreateProgram(ProgramDescriptor),
    /// [`RenderDevice::create_vertex_buffer()`]
    CreateBuffer(BufferId),
    /// [`RenderDevice::delete_vertex_buffer()`]
    DeleteBuffer(BufferId),
    /// [`RenderDevice::buffer_data()`]
    BufferData {
        /// Buffer written.
        buffer: BufferId,
        /// Bytes written.
        len: usize,
    },
    /// [`RenderDevice::buffer_sub_data()`]
    BufferSubData {
        /// Buffer written.
        buffer: BufferId,
        /// Byte offset.
        offset: usize,
        /// Bytes written.
        len: usize,
    },
    /// [`RenderDevice::upload_texture()`]
    UploadTexture {
        /// Texture written.
        texture: TextureId,
        /// Its size.
        size: UVec2,
    },
    /// [`RenderDevice::use_program()`]
    UseProgram(ProgramId),
    /// [`RenderDevice::set_uniform_mat4()`]
    UniformMat4 {
        /// Location.
        location: UniformLocation,
        /// The matrices.
        matrices: Vec<Mat4>,
    },
    /// [`RenderDevice::set_uniform_i32()`]
    UniformI32 {
        /// Location.
        location: UniformLocation,
        /// Value.
        value: i32,
    },
    /// [`RenderDevice::bind_vertex_buffer()`]
    BindVertexBuffer(BufferId),
    /// [`RenderDevice::bind_texture()`]
    BindTexture(TextureId),
    /// [`RenderDevice::apply_blend_mode()`]
    BlendMode(BlendMode),
    /// [`RenderDevice::set_scissor()`]
    Scissor(Option<IntRect>),
    /// [`RenderDevice::draw_arrays()`]
    DrawArrays {
        /// First vertex.
        start: u32,
        /// Vertex count.
        count: u32,
    },
}

/// A headless device that keeps buffer contents in memory and records every call.
pub struct RecordingDevice {
    max_vertex_uniform_vectors: u32,
    uniforms: Vec<String>,
    fail_programs: bool,
    commands: Vec<DeviceCommand>,
    buffers: FxHashMap<BufferId, Vec<u8>>,
    textures: FxHashMap<TextureId, UVec2>,
    errors: Vec<RenderError>,
    next_buffer: u32,
    next_program: u32,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl RecordingDevice {
    /// The uniforms every program of a default device exposes.
    pub const DEFAULT_UNIFORMS: [&'static str; 3] =
        ["u_worldMatrix[0]", "u_texture", "u_projectionMatrix"];

    /// A device reporting the given vertex uniform vector limit.
    pub fn new(max_vertex_uniform_vectors: u32) -> Self {
        Self {
            max_vertex_uniform_vectors,
            uniforms: Self::DEFAULT_UNIFORMS.map(String::from).to_vec(),
            fail_programs: false,
            commands: Vec::new(),
            buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
            errors: Vec::new(),
            next_buffer: 1,
            next_program: 1,
        }
    }

    /// Replace the uniform names programs expose.
    pub fn with_uniforms(mut self, names: &[&str]) -> Self {
        self.uniforms = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Make every program creation fail.
    pub fn with_failing_programs(mut self) -> Self {
        self.fail_programs = true;
        self
    }

    /// Queue an error to be returned from [`RenderDevice::take_error()`].
    pub fn push_error(&mut self, error: RenderError) {
        self.errors.push(error);
    }

    /// Every call recorded so far.
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget recorded calls. Buffer contents are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// The `(start, count)` of every recorded draw call.
    pub fn draw_calls(&self) -> Vec<(u32, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawArrays { start, count } => Some((*start, *count)),
                _ => None,
            })
            .collect()
    }

    /// The raw contents of a buffer.
    pub fn buffer(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.as_slice())
    }

    /// The contents of a buffer read back as batch vertices.
    pub fn buffer_vertices(&self, buffer: BufferId) -> Vec<BatchVertex> {
        self.buffer(buffer)
            .map(|bytes| {
                bytes
                    .chunks_exact(VERTEX_SIZE)
                    .map(bytemuck::pod_read_unaligned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// The size of an uploaded texture.
    pub fn texture_size(&self, texture: TextureId) -> Option<UVec2> {
        self.textures.get(&texture).copied()
    }
}

impl RenderDevice for RecordingDevice {
    fn max_vertex_uniform_vectors(&self) -> u32 {
        self.max_vertex_uniform_vectors
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, RenderError> {
        self.commands
            .push(DeviceCommand::CreateProgram(descriptor.clone()));
        if self.fail_programs {
            return Err(RenderError::ProgramCreation(format!(
                "{:?} program rejected by device",
                descriptor.kind
            )));
        }
        let id = ProgramId(self.next_program);
        self.next_program += 1;
        Ok(id)
    }

    fn uniform_names(&self, _program: ProgramId) -> Vec<String> {
        self.uniforms.clone()
    }

    fn uniform_location(&self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| UniformLocation(i as i32 + 1))
    }

    fn create_vertex_buffer(&mut self) -> BufferId {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, Vec::new());
        self.commands.push(DeviceCommand::CreateBuffer(id));
        id
    }

    fn delete_vertex_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_none() {
            self.errors.push(RenderError::InvalidBuffer(buffer));
        }
        self.commands.push(DeviceCommand::DeleteBuffer(buffer));
    }

    fn buffer_data(&mut self, buffer: BufferId, data: &[u8]) {
        self.commands.push(DeviceCommand::BufferData {
            buffer,
            len: data.len(),
        });
        match self.buffers.get_mut(&buffer) {
            Some(contents) => *contents = data.to_vec(),
            None => self.errors.push(RenderError::InvalidBuffer(buffer)),
        }
    }

    fn buffer_sub_data(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        self.commands.push(DeviceCommand::BufferSubData {
            buffer,
            offset,
            len: data.len(),
        });
        let Some(contents) = self.buffers.get_mut(&buffer) else {
            self.errors.push(RenderError::InvalidBuffer(buffer));
            return;
        };
        match contents.get_mut(offset..offset + data.len()) {
            Some(dst) => dst.copy_from_slice(data),
            None => self.errors.push(RenderError::OutOfRange {
                buffer,
                offset,
                len: data.len(),
                size: contents.len(),
            }),
        }
    }

    fn upload_texture(&mut self, texture: TextureId, size: UVec2, pixels: &[u8]) {
        debug_assert_eq!(pixels.len(), (size.x * size.y) as usize);
        self.textures.insert(texture, size);
        self.commands
            .push(DeviceCommand::UploadTexture { texture, size });
    }

    fn use_program(&mut self, program: ProgramId) {
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, matrices: &[Mat4]) {
        self.commands.push(DeviceCommand::UniformMat4 {
            location,
            matrices: matrices.to_vec(),
        });
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.commands
            .push(DeviceCommand::UniformI32 { location, value });
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId, _layout: &VertexLayout) {
        if !self.buffers.contains_key(&buffer) {
            self.errors.push(RenderError::InvalidBuffer(buffer));
        }
        self.commands.push(DeviceCommand::BindVertexBuffer(buffer));
    }

    fn bind_texture(&mut self, _unit: u32, texture: TextureId) {
        self.commands.push(DeviceCommand::BindTexture(texture));
    }

    fn apply_blend_mode(&mut self, mode: BlendMode) {
        self.commands.push(DeviceCommand::BlendMode(mode));
    }

    fn set_scissor(&mut self, rect: Option<IntRect>) {
        self.commands.push(DeviceCommand::Scissor(rect));
    }

    fn draw_arrays(&mut self, _primitive: PrimitiveType, start: u32, count: u32) {
        self.commands
            .push(DeviceCommand::DrawArrays { start, count });
    }

    fn take_error(&mut self) -> Option<RenderError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.remove(0))
        }
    }
}

/// Look up the uniforms a batching program needs.
///
/// Missing uniforms are logged along with the uniforms the program does have, and fall back
/// to location 0.
pub(crate) fn find_uniform(
    device: &dyn RenderDevice,
    program: ProgramId,
    renderer: &str,
    name: &str,
) -> UniformLocation {
    match device.uniform_location(program, name) {
        Some(location) => location,
        None => {
            tracing::warn!(
                available = ?device.uniform_names(program),
                "{name} uniform missing from {renderer}"
            );
            UniformLocation::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn sub_data_out_of_range_is_reported() {
        let mut device = RecordingDevice::default();
        let buffer = device.create_vertex_buffer();
        device.buffer_data(buffer, &[0; 16]);
        device.buffer_sub_data(buffer, 8, &[1; 8]);
        assert!(device.take_error().is_none());
        assert_eq!(&device.buffer(buffer).unwrap()[8..], &[1; 8]);

        device.buffer_sub_data(buffer, 12, &[1; 8]);
        assert_eq!(
            device.take_error(),
            Some(RenderError::OutOfRange {
                buffer,
                offset: 12,
                len: 8,
                size: 16
            })
        );
        assert!(device.take_error().is_none());
    }

    #[test]
    fn missing_uniform_defaults_to_zero() {
        let mut device = RecordingDevice::default().with_uniforms(&["u_texture"]);
        let program = device
            .create_program(&ProgramDescriptor {
                kind: ProgramKind::Sprite,
                defines: vec![],
            })
            .unwrap();
        assert_eq!(
            find_uniform(&device, program, "test", "u_projectionMatrix"),
            UniformLocation(0)
        );
        assert_eq!(
            find_uniform(&device, program, "test", "u_texture"),
            UniformLocation(1)
        );
    }

    #[test]
    fn gpu_check_drains_errors() {
        let context = RenderContext::new(RecordingDevice::default());
        let mut device = context.lock();
        gpu_check!(device, device.delete_vertex_buffer(BufferId(99)));
        assert!(device.take_error().is_none() || !cfg!(debug_assertions));
    }
}
