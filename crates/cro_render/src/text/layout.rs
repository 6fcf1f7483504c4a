//! Glyph placement.

use fxhash::FxHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Horizontal alignment of each line of a text relative to the entity's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    /// Lines start at the origin.
    #[default]
    Left,
    /// Lines are centred on the origin.
    Centre,
    /// Lines end at the origin.
    Right,
}

/// The inputs of [`layout()`].
#[derive(Clone, Copy, Debug)]
pub struct LayoutContext<'a> {
    /// Source of the glyphs.
    pub font: &'a Font,
    /// The string to lay out.
    pub string: &'a str,
    /// Character size in pixels.
    pub char_size: u32,
    /// Colour of glyphs using the fill colour.
    pub fill_colour: Colour,
    /// Alignment of each line.
    pub alignment: Alignment,
    /// Extra space between lines.
    pub vertical_spacing: f32,
}

/// The result of [`layout()`].
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    /// Glyph quads in triangle strip order, joined by degenerate vertices.
    pub vertices: Vec<Vertex2D>,
    /// For each vertex, whether it takes the fill colour.
    pub fill: Vec<bool>,
    /// Bounds of every glyph quad, in local space.
    pub local_bounds: FloatRect,
    /// The atlas page the texture coordinates refer to.
    pub texture: Texture,
}

/// The colour of a glyph vertex.
pub fn glyph_colour(fill_colour: Colour, use_fill_colour: bool) -> Colour {
    if use_fill_colour {
        fill_colour
    } else {
        Colour::WHITE.with_alpha(fill_colour.a)
    }
}

/// Place the glyphs of a string.
///
/// The pen starts at the origin on the first baseline and moves down one line height plus
/// the vertical spacing for each newline. A tab advances by four spaces. Each glyph is one
/// quad; consecutive quads are joined with two degenerate vertices, and the degenerate
/// vertices before the first and after the last quad are left out.
pub fn layout(context: &LayoutContext) -> TextLayout {
    let LayoutContext {
        font,
        string,
        char_size,
        fill_colour,
        alignment,
        vertical_spacing,
    } = *context;

    // Rasterize everything first: a glyph can grow the page and change its size.
    let mut glyphs = FxHashMap::default();
    for c in string.chars().filter(|c| *c != '\n') {
        let c = if c == '\t' { ' ' } else { c };
        glyphs
            .entry(c)
            .or_insert_with(|| font.glyph(c, char_size));
    }
    let texture = font.texture(char_size);
    let page_size = texture.size().as_vec2();
    let line_height = font.line_height(char_size) + vertical_spacing;

    let mut vertices = Vec::with_capacity(string.len() * 6);
    let mut fill = Vec::with_capacity(string.len() * 6);
    let mut pen = Vec2::ZERO;
    let mut previous: Option<char> = None;
    let mut row_start = 0;

    let end_row = |vertices: &mut Vec<Vertex2D>, row_start: usize, width: f32| {
        let shift = match alignment {
            Alignment::Left => 0.0,
            Alignment::Centre => (width / 2.0).floor(),
            Alignment::Right => width.floor(),
        };
        if shift != 0.0 {
            for vertex in &mut vertices[row_start..] {
                vertex.position.x -= shift;
            }
        }
    };

    for c in string.chars() {
        if let Some(previous) = previous.filter(|_| c != '\n') {
            pen.x += font.kerning(previous, c, char_size);
        }
        previous = Some(c);

        match c {
            '\n' => {
                end_row(&mut vertices, row_start, pen.x);
                row_start = vertices.len();
                pen = Vec2::new(0.0, pen.y - line_height);
                previous = None;
            }
            '\t' => {
                let space = glyphs.get(&' ').copied().unwrap_or_default();
                pen.x += space.advance * 4.0;
            }
            c => {
                let glyph = glyphs.get(&c).copied().unwrap_or_default();
                let colour = glyph_colour(fill_colour, glyph.use_fill_colour);

                let left = pen.x + glyph.bounds.left;
                let bottom = pen.y + glyph.bounds.bottom;
                let right = left + glyph.bounds.width;
                let top = bottom + glyph.bounds.height;

                let tex = glyph.texture_bounds;
                let (u0, v0) = (tex.left as f32, tex.bottom as f32);
                let (u1, v1) = (u0 + tex.width as f32, v0 + tex.height as f32);
                let uv = |u: f32, v: f32| {
                    if page_size.x > 0.0 && page_size.y > 0.0 {
                        Vec2::new(u, v) / page_size
                    } else {
                        Vec2::ZERO
                    }
                };

                let quad = [
                    Vertex2D::new(Vec2::new(left, top), uv(u0, v1), colour),
                    Vertex2D::new(Vec2::new(left, bottom), uv(u0, v0), colour),
                    Vertex2D::new(Vec2::new(right, top), uv(u1, v1), colour),
                    Vertex2D::new(Vec2::new(right, bottom), uv(u1, v0), colour),
                ];
                vertices.push(quad[0]);
                vertices.extend_from_slice(&quad);
                vertices.push(quad[3]);
                fill.extend(std::iter::repeat(glyph.use_fill_colour).take(6));

                pen.x += glyph.advance;
            }
        }
    }
    end_row(&mut vertices, row_start, pen.x);

    if !vertices.is_empty() {
        vertices.pop();
        vertices.remove(0);
        fill.pop();
        fill.remove(0);
    }

    let local_bounds = if vertices.is_empty() {
        FloatRect::default()
    } else {
        FloatRect::from_points(vertices.iter().map(|v| v.position))
    };

    TextLayout {
        vertices,
        fill,
        local_bounds,
        texture,
    }
}
