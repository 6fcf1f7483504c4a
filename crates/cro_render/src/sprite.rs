//! The [`Sprite`] component.

use bitflags::bitflags;
use glam::Vec2;

use crate::prelude::*;

bitflags! {
    /// What changed on a [`Sprite`] since the renderer last uploaded it.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SpriteDirty: u8 {
        /// Positions, UVs or colours. Uploaded in place.
        const VERTICES = 1 << 0;
        /// The texture. Changes the sort order.
        const TEXTURE = 1 << 1;
        /// The blend mode. Changes batching.
        const BLEND_MODE = 1 << 2;
    }
}

/// A textured, coloured quad drawn by the [`SpriteRenderer`].
///
/// The quad spans `(0, 0)` to the size of the texture rectangle in local space, and is placed
/// in the world by the entity's [`Transform`].
#[derive(Clone, Debug)]
pub struct Sprite {
    texture: TextureId,
    texture_size: Vec2,
    texture_rect: FloatRect,
    colour: Colour,
    blend_mode: BlendMode,
    quad: [Vertex2D; 4],
    pub(crate) dirty: SpriteDirty,
    pub(crate) placement: Placement,
    pub(crate) global_bounds: FloatRect,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            texture: TextureId::NONE,
            texture_size: Vec2::ZERO,
            texture_rect: FloatRect::default(),
            colour: Colour::WHITE,
            blend_mode: BlendMode::Alpha,
            quad: [Vertex2D::default(); 4],
            dirty: SpriteDirty::all(),
            placement: Placement::default(),
            global_bounds: FloatRect::default(),
        }
    }
}

impl Sprite {
    /// A sprite showing the whole texture.
    pub fn new(texture: &Texture) -> Self {
        let mut sprite = Self::default();
        sprite.set_texture(texture, true);
        sprite
    }

    /// A sprite showing part of a texture.
    pub fn with_rect(texture: &Texture, rect: FloatRect) -> Self {
        let mut sprite = Self::default();
        sprite.set_texture(texture, false);
        sprite.set_texture_rect(rect);
        sprite
    }

    /// Change the texture. With `resize` the texture rectangle becomes the whole texture.
    pub fn set_texture(&mut self, texture: &Texture, resize: bool) {
        self.texture = texture.id();
        self.texture_size = texture.size().as_vec2();
        if resize {
            self.texture_rect = FloatRect::new(0.0, 0.0, self.texture_size.x, self.texture_size.y);
        }
        self.update_quad();
        self.dirty |= SpriteDirty::TEXTURE | SpriteDirty::VERTICES;
    }

    /// The texture handle.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Set the area of the texture to display, in pixels from the bottom left.
    pub fn set_texture_rect(&mut self, rect: FloatRect) {
        self.texture_rect = rect;
        self.update_quad();
        self.dirty |= SpriteDirty::VERTICES;
    }

    /// The area of the texture displayed.
    pub fn texture_rect(&self) -> FloatRect {
        self.texture_rect
    }

    /// Set the vertex colour, multiplied with the texture.
    pub fn set_colour(&mut self, colour: Colour) {
        self.colour = colour;
        for vertex in &mut self.quad {
            vertex.colour = colour;
        }
        self.dirty |= SpriteDirty::VERTICES;
    }

    /// The vertex colour.
    pub fn colour(&self) -> Colour {
        self.colour
    }

    /// Set the blend mode.
    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        if blend_mode != self.blend_mode {
            self.blend_mode = blend_mode;
            self.dirty |= SpriteDirty::BLEND_MODE;
        }
    }

    /// The blend mode.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// The size of the quad.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.texture_rect.width, self.texture_rect.height)
    }

    /// The bounds of the quad in local space.
    pub fn local_bounds(&self) -> FloatRect {
        FloatRect::new(0.0, 0.0, self.texture_rect.width, self.texture_rect.height)
    }

    /// The bounds of the quad in world space, as of the last renderer update.
    pub fn global_bounds(&self) -> FloatRect {
        self.global_bounds
    }

    /// The quad in triangle strip order.
    pub fn vertices(&self) -> &[Vertex2D; 4] {
        &self.quad
    }

    /// Pending changes.
    pub fn dirty(&self) -> SpriteDirty {
        self.dirty
    }

    /// Where the quad lives in the renderer's buffers.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Byte offset of the quad in its vertex buffer.
    pub fn vbo_offset(&self) -> usize {
        self.placement.vbo_offset
    }

    pub(crate) fn batch_key(&self) -> BatchKey {
        BatchKey::new(self.texture, self.blend_mode)
    }

    fn update_quad(&mut self) {
        let rect = self.texture_rect;
        let uv = |x: f32, y: f32| {
            if self.texture_size.x > 0.0 && self.texture_size.y > 0.0 {
                Vec2::new(x, y) / self.texture_size
            } else {
                Vec2::ZERO
            }
        };

        let corners = [
            (Vec2::new(0.0, rect.height), uv(rect.left, rect.top())),
            (Vec2::ZERO, uv(rect.left, rect.bottom)),
            (Vec2::new(rect.width, rect.height), uv(rect.right(), rect.top())),
            (Vec2::new(rect.width, 0.0), uv(rect.right(), rect.bottom)),
        ];
        self.quad = corners.map(|(position, uv)| Vertex2D::new(position, uv, self.colour));
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn quad_covers_texture_rect() {
        let texture = Texture::new(UVec2::new(64, 32));
        let sprite = Sprite::with_rect(&texture, FloatRect::new(16.0, 0.0, 16.0, 8.0));
        let positions = sprite.vertices().map(|v| v.position);
        assert_eq!(
            positions,
            [
                Vec2::new(0.0, 8.0),
                Vec2::ZERO,
                Vec2::new(16.0, 8.0),
                Vec2::new(16.0, 0.0)
            ]
        );
        let uvs = sprite.vertices().map(|v| v.uv);
        assert_eq!(uvs[1], Vec2::new(0.25, 0.0));
        assert_eq!(uvs[2], Vec2::new(0.5, 0.25));
        assert_eq!(sprite.local_bounds(), FloatRect::new(0.0, 0.0, 16.0, 8.0));
    }

    #[test]
    fn setters_mark_dirt() {
        let texture = Texture::new(UVec2::new(8, 8));
        let mut sprite = Sprite::new(&texture);
        assert!(sprite.dirty().contains(SpriteDirty::TEXTURE | SpriteDirty::VERTICES));

        sprite.dirty = SpriteDirty::empty();
        sprite.set_colour(Colour::RED);
        assert_eq!(sprite.dirty(), SpriteDirty::VERTICES);
        assert!(sprite.vertices().iter().all(|v| v.colour == Colour::RED));

        sprite.dirty = SpriteDirty::empty();
        sprite.set_blend_mode(BlendMode::Alpha);
        assert!(sprite.dirty().is_empty());
        sprite.set_blend_mode(BlendMode::Additive);
        assert_eq!(sprite.dirty(), SpriteDirty::BLEND_MODE);
    }

    #[test]
    fn untextured_sprite_has_zero_uvs() {
        let mut sprite = Sprite::default();
        sprite.set_texture_rect(FloatRect::new(0.0, 0.0, 10.0, 10.0));
        assert!(sprite.vertices().iter().all(|v| v.uv == Vec2::ZERO));
        assert_eq!(sprite.texture(), TextureId::NONE);
    }
}
