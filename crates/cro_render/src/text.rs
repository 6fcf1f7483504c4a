//! Text: fonts, glyph layout, the [`Text`] component and its renderer.

use std::sync::Arc;

use bitflags::bitflags;

use crate::prelude::*;

pub mod font;
pub mod layout;
mod renderer;

pub use font::*;
pub use layout::*;
pub use renderer::*;

/// Character size of a new [`Text`].
pub const DEFAULT_CHAR_SIZE: u32 = 30;

bitflags! {
    /// What changed on a [`Text`] since the renderer last uploaded it.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TextDirty: u8 {
        /// The string, font, alignment or spacing. Needs a new layout.
        const VERTICES = 1 << 0;
        /// The character size. Needs a new layout on another atlas page.
        const CHAR_SIZE = 1 << 1;
        /// The blend mode. Changes batching.
        const BLEND_MODE = 1 << 2;
        /// The fill colour. Uploaded in place.
        const COLOURS = 1 << 3;
    }
}

impl TextDirty {
    /// Changes that need a new layout.
    pub const LAYOUT: TextDirty = TextDirty::VERTICES.union(TextDirty::CHAR_SIZE);
    /// Changes that need the renderer to rebuild its batches.
    pub const REBUILD: TextDirty = TextDirty::LAYOUT.union(TextDirty::BLEND_MODE);
}

/// A string drawn with a [`Font`] by the [`TextRenderer`].
#[derive(Clone, Debug)]
pub struct Text {
    font: Arc<Font>,
    string: String,
    char_size: u32,
    fill_colour: Colour,
    alignment: Alignment,
    vertical_spacing: f32,
    blend_mode: BlendMode,
    cropping_area: Option<FloatRect>,
    vertices: Vec<Vertex2D>,
    fill: Vec<bool>,
    local_bounds: FloatRect,
    texture: Texture,
    pub(crate) dirty: TextDirty,
    pub(crate) placement: Placement,
}

impl Text {
    /// An empty text using the given font.
    pub fn new(font: Arc<Font>) -> Self {
        let texture = font.texture(DEFAULT_CHAR_SIZE);
        Self {
            font,
            string: String::new(),
            char_size: DEFAULT_CHAR_SIZE,
            fill_colour: Colour::WHITE,
            alignment: Alignment::Left,
            vertical_spacing: 0.0,
            blend_mode: BlendMode::Alpha,
            cropping_area: None,
            vertices: Vec::new(),
            fill: Vec::new(),
            local_bounds: FloatRect::default(),
            texture,
            dirty: TextDirty::all(),
            placement: Placement::default(),
        }
    }

    /// A text showing a string.
    pub fn with_string(font: Arc<Font>, string: impl Into<String>) -> Self {
        let mut text = Self::new(font);
        text.set_string(string);
        text
    }

    /// The font.
    pub fn font(&self) -> &Arc<Font> {
        &self.font
    }

    /// Change the font.
    pub fn set_font(&mut self, font: Arc<Font>) {
        if !Arc::ptr_eq(&font, &self.font) {
            self.font = font;
            self.dirty |= TextDirty::VERTICES;
        }
    }

    /// The string.
    pub fn string(&self) -> &str {
        &self.string
    }

    /// Change the string.
    pub fn set_string(&mut self, string: impl Into<String>) {
        let string = string.into();
        if string != self.string {
            self.string = string;
            self.dirty |= TextDirty::VERTICES;
        }
    }

    /// The character size in pixels.
    pub fn char_size(&self) -> u32 {
        self.char_size
    }

    /// Change the character size.
    pub fn set_char_size(&mut self, char_size: u32) {
        if char_size != self.char_size {
            self.char_size = char_size;
            self.dirty |= TextDirty::CHAR_SIZE;
        }
    }

    /// The fill colour.
    pub fn fill_colour(&self) -> Colour {
        self.fill_colour
    }

    /// Change the fill colour.
    pub fn set_fill_colour(&mut self, colour: Colour) {
        if colour != self.fill_colour {
            self.fill_colour = colour;
            self.dirty |= TextDirty::COLOURS;
        }
    }

    /// The alignment of each line.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Change the alignment.
    pub fn set_alignment(&mut self, alignment: Alignment) {
        if alignment != self.alignment {
            self.alignment = alignment;
            self.dirty |= TextDirty::VERTICES;
        }
    }

    /// Extra space between lines.
    pub fn vertical_spacing(&self) -> f32 {
        self.vertical_spacing
    }

    /// Change the extra space between lines.
    pub fn set_vertical_spacing(&mut self, spacing: f32) {
        if spacing != self.vertical_spacing {
            self.vertical_spacing = spacing;
            self.dirty |= TextDirty::VERTICES;
        }
    }

    /// The blend mode.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Change the blend mode.
    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        if blend_mode != self.blend_mode {
            self.blend_mode = blend_mode;
            self.dirty |= TextDirty::BLEND_MODE;
        }
    }

    /// The local space area outside which the text is cut off, if any.
    pub fn cropping_area(&self) -> Option<FloatRect> {
        self.cropping_area
    }

    /// Cut the text off outside a local space area.
    ///
    /// Cropped texts are drawn in a batch of their own.
    pub fn set_cropping_area(&mut self, area: Option<FloatRect>) {
        if area.is_some() != self.cropping_area.is_some() {
            self.dirty |= TextDirty::BLEND_MODE;
        }
        self.cropping_area = area;
    }

    /// The glyph vertices of the last layout.
    pub fn vertices(&self) -> &[Vertex2D] {
        &self.vertices
    }

    /// The local bounds of the last layout.
    pub fn local_bounds(&self) -> FloatRect {
        self.local_bounds
    }

    /// The atlas page of the last layout.
    pub fn texture(&self) -> Texture {
        self.texture
    }

    /// Pending changes.
    pub fn dirty(&self) -> TextDirty {
        self.dirty
    }

    /// Where the vertices live in the renderer's buffers.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Byte offset of the first vertex in its vertex buffer.
    pub fn vbo_offset(&self) -> usize {
        self.placement.vbo_offset
    }

    /// Bring the cached vertices up to date.
    ///
    /// Layout changes run a new [`layout()`]; a fill colour change alone recolours the cached
    /// vertices, keeping their number and positions.
    pub fn update_vertices(&mut self) {
        if self.dirty.intersects(TextDirty::LAYOUT) {
            let result = layout(&LayoutContext {
                font: &self.font,
                string: &self.string,
                char_size: self.char_size,
                fill_colour: self.fill_colour,
                alignment: self.alignment,
                vertical_spacing: self.vertical_spacing,
            });
            self.vertices = result.vertices;
            self.fill = result.fill;
            self.local_bounds = result.local_bounds;
            self.texture = result.texture;
        } else if self.dirty.contains(TextDirty::COLOURS) {
            for (vertex, fill) in self.vertices.iter_mut().zip(&self.fill) {
                vertex.colour = glyph_colour(self.fill_colour, *fill);
            }
        }
        self.dirty
            .remove(TextDirty::LAYOUT | TextDirty::COLOURS);
    }

    pub(crate) fn batch_key(&self) -> BatchKey {
        let key = BatchKey::new(self.texture.id(), self.blend_mode);
        if self.cropping_area.is_some() {
            key.isolated()
        } else {
            key
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::prelude::*;

    #[test]
    fn colour_change_keeps_layout() {
        let font = Arc::new(Font::new(BlockRasterizer::new()));
        let mut text = Text::with_string(font, "hi there");
        text.update_vertices();
        assert!(text.dirty().intersection(TextDirty::LAYOUT | TextDirty::COLOURS).is_empty());
        let before = text.vertices().to_vec();

        text.set_fill_colour(Colour::BLUE);
        assert_eq!(text.dirty(), TextDirty::BLEND_MODE | TextDirty::COLOURS);
        text.update_vertices();
        assert_eq!(text.vertices().len(), before.len());
        for (after, before) in text.vertices().iter().zip(&before) {
            assert_eq!(after.position, before.position);
            assert_eq!(after.colour, Colour::BLUE);
        }
    }

    #[test]
    fn setters_only_mark_real_changes() {
        let font = Arc::new(Font::new(BlockRasterizer::new()));
        let mut text = Text::with_string(font.clone(), "a");
        text.dirty = TextDirty::empty();

        text.set_string("a");
        text.set_font(font);
        text.set_char_size(DEFAULT_CHAR_SIZE);
        assert!(text.dirty().is_empty());

        text.set_char_size(12);
        assert_eq!(text.dirty(), TextDirty::CHAR_SIZE);
        text.set_cropping_area(Some(FloatRect::new(0.0, 0.0, 5.0, 5.0)));
        assert!(text.dirty().contains(TextDirty::BLEND_MODE));
        assert!(text.batch_key().isolated);
    }
}
