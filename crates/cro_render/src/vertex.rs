//! Vertex formats.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::color::Colour;

/// A 2D vertex as stored on sprite and text components.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex2D {
    /// Position in the entity's local space.
    pub position: Vec2,
    /// Texture coordinate.
    pub uv: Vec2,
    /// Vertex colour.
    pub colour: Colour,
}

impl Vertex2D {
    /// Create a vertex.
    pub fn new(position: Vec2, uv: Vec2, colour: Colour) -> Self {
        Self {
            position,
            uv,
            colour,
        }
    }
}

/// A vertex as uploaded to a batch buffer.
///
/// `uv1.x` holds the slot of the entity's matrix in the buffer's world matrix array; `uv1.y` is
/// unused padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BatchVertex {
    /// Position, with `w` fixed at 1.
    pub position: [f32; 4],
    /// Colour.
    pub colour: [f32; 4],
    /// Texture coordinate.
    pub uv0: [f32; 2],
    /// Matrix slot and padding.
    pub uv1: [f32; 2],
}

/// Size in bytes of a [`BatchVertex`].
pub const VERTEX_SIZE: usize = size_of::<BatchVertex>();

impl BatchVertex {
    /// Expand a component vertex for upload, tagging it with its entity's matrix slot.
    pub fn new(vertex: &Vertex2D, slot: usize) -> Self {
        Self {
            position: [vertex.position.x, vertex.position.y, 0.0, 1.0],
            colour: vertex.colour.as_rgba_f32(),
            uv0: vertex.uv.to_array(),
            uv1: [slot as f32, 0.0],
        }
    }

    /// The 2D position.
    pub fn position2(&self) -> Vec2 {
        Vec2::new(self.position[0], self.position[1])
    }
}

/// A vertex attribute within a vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute name in the batching program.
    pub name: &'static str,
    /// Number of float components.
    pub size: u32,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

/// The attribute layout of a vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    /// The attributes.
    pub attributes: [VertexAttribute; 4],
    /// Distance in bytes between vertices.
    pub stride: u32,
}

impl VertexLayout {
    /// The layout of [`BatchVertex`].
    pub const fn batch() -> Self {
        Self {
            attributes: [
                VertexAttribute {
                    name: "a_position",
                    size: 4,
                    offset: 0,
                },
                VertexAttribute {
                    name: "a_colour",
                    size: 4,
                    offset: 16,
                },
                VertexAttribute {
                    name: "a_texCoord0",
                    size: 2,
                    offset: 32,
                },
                VertexAttribute {
                    name: "a_texCoord1",
                    size: 2,
                    offset: 40,
                },
            ],
            stride: VERTEX_SIZE as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use crate::prelude::*;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(VERTEX_SIZE, 48);
        let layout = VertexLayout::batch();
        assert_eq!(layout.attributes[1].offset as usize, offset_of!(BatchVertex, colour));
        assert_eq!(layout.attributes[2].offset as usize, offset_of!(BatchVertex, uv0));
        assert_eq!(layout.attributes[3].offset as usize, offset_of!(BatchVertex, uv1));
        let sizes = layout.attributes.map(|a| a.size).iter().sum::<u32>();
        assert_eq!(sizes as usize * 4, VERTEX_SIZE);
    }

    #[test]
    fn slot_is_tagged() {
        let v = Vertex2D::new(Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.25), Colour::RED);
        let b = BatchVertex::new(&v, 7);
        assert_eq!(b.position, [1.0, 2.0, 0.0, 1.0]);
        assert_eq!(b.colour, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(b.uv1, [7.0, 0.0]);
    }
}
