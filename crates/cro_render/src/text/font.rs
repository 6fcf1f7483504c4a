//! Fonts and their glyph atlases.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use fxhash::FxHashMap;
use glam::UVec2;
use parking_lot::Mutex;

use crate::prelude::*;

/// Side of a new atlas page, in pixels.
pub const INITIAL_PAGE_SIZE: u32 = 128;
/// An atlas page never grows past this side, in pixels.
pub const MAX_PAGE_SIZE: u32 = 4096;
const PADDING: u32 = 1;

/// A glyph placed in an atlas page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Glyph {
    /// Horizontal distance to the next glyph.
    pub advance: f32,
    /// The glyph box relative to the pen position on the baseline.
    pub bounds: FloatRect,
    /// The glyph's pixels in the atlas page, from the bottom left.
    pub texture_bounds: IntRect,
    /// Whether the glyph is tinted with the text's fill colour. Coloured glyphs such as emoji
    /// are not, and only take its alpha.
    pub use_fill_colour: bool,
}

/// A glyph image produced by a [`GlyphRasterizer`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RasterizedGlyph {
    /// Horizontal distance to the next glyph.
    pub advance: f32,
    /// The glyph box relative to the pen position on the baseline.
    pub bounds: FloatRect,
    /// Image size in pixels.
    pub size: UVec2,
    /// One alpha byte per pixel, rows from the bottom.
    pub pixels: Vec<u8>,
    /// See [`Glyph::use_fill_colour`].
    pub use_fill_colour: bool,
}

/// Turns characters into glyph images.
pub trait GlyphRasterizer: Send + Sync {
    /// Rasterize a character at a size. `None` if the font has no glyph for it.
    fn rasterize(&self, codepoint: char, char_size: u32) -> Option<RasterizedGlyph>;

    /// The distance between two baselines.
    fn line_height(&self, char_size: u32) -> f32;

    /// Adjustment of the advance between two consecutive characters.
    fn kerning(&self, _first: char, _second: char, _char_size: u32) -> f32 {
        0.0
    }
}

/// A rasterizer drawing every visible character as a solid box.
///
/// Glyphs are half the character size wide and three quarters high, and advance by six tenths
/// of the character size. Useful for headless runs and tests.
#[derive(Clone, Debug, Default)]
pub struct BlockRasterizer {
    kerning: FxHashMap<(char, char), f32>,
    coloured: Vec<char>,
}

impl BlockRasterizer {
    /// A rasterizer without kerning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kerning pair, in pixels.
    pub fn with_kerning(mut self, first: char, second: char, amount: f32) -> Self {
        self.kerning.insert((first, second), amount);
        self
    }

    /// Rasterize these characters as coloured glyphs.
    pub fn with_coloured(mut self, chars: &str) -> Self {
        self.coloured.extend(chars.chars());
        self
    }
}

impl GlyphRasterizer for BlockRasterizer {
    fn rasterize(&self, codepoint: char, char_size: u32) -> Option<RasterizedGlyph> {
        if codepoint.is_control() {
            return None;
        }

        let advance = (char_size as f32 * 0.6).round();
        if codepoint.is_whitespace() {
            return Some(RasterizedGlyph {
                advance,
                use_fill_colour: true,
                ..Default::default()
            });
        }

        let size = UVec2::new(char_size / 2, char_size * 3 / 4);
        Some(RasterizedGlyph {
            advance,
            bounds: FloatRect::new(0.0, 0.0, size.x as f32, size.y as f32),
            size,
            pixels: vec![u8::MAX; (size.x * size.y) as usize],
            use_fill_colour: !self.coloured.contains(&codepoint),
        })
    }

    fn line_height(&self, char_size: u32) -> f32 {
        char_size as f32 * 1.25
    }

    fn kerning(&self, first: char, second: char, _char_size: u32) -> f32 {
        self.kerning.get(&(first, second)).copied().unwrap_or(0.0)
    }
}

/// A flag set by fonts when an atlas texture is replaced.
///
/// Fonts hold the flag weakly, so dropping every clone unregisters it.
#[derive(Clone, Debug, Default)]
pub struct FontObserver(Arc<AtomicBool>);

impl FontObserver {
    /// A flag that has not been notified.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a font was updated since the last call, clearing the flag.
    pub fn take_notification(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Whether a font was updated, leaving the flag set.
    pub fn is_notified(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The glyph atlas of one character size.
struct Page {
    texture: Texture,
    pixels: Vec<u8>,
    glyphs: FxHashMap<char, Glyph>,
    next_x: u32,
    shelf_y: u32,
    shelf_height: u32,
    dirty: bool,
}

impl Page {
    fn new() -> Self {
        Self {
            texture: Texture::new(UVec2::splat(INITIAL_PAGE_SIZE)),
            pixels: vec![0; (INITIAL_PAGE_SIZE * INITIAL_PAGE_SIZE) as usize],
            glyphs: FxHashMap::default(),
            next_x: PADDING,
            shelf_y: PADDING,
            shelf_height: 0,
            dirty: true,
        }
    }

    /// Find room for an image, growing the page if needed. Returns the bottom left corner and
    /// whether the page grew.
    fn allocate(&mut self, size: UVec2) -> Option<(UVec2, bool)> {
        let mut grew = false;
        loop {
            let page = self.texture.size();
            if self.next_x + size.x + PADDING > page.x {
                self.shelf_y += self.shelf_height + PADDING;
                self.next_x = PADDING;
                self.shelf_height = 0;
            }
            if self.next_x + size.x + PADDING <= page.x && self.shelf_y + size.y + PADDING <= page.y
            {
                let position = UVec2::new(self.next_x, self.shelf_y);
                self.next_x += size.x + PADDING;
                self.shelf_height = self.shelf_height.max(size.y);
                return Some((position, grew));
            }
            if page.x >= MAX_PAGE_SIZE {
                return None;
            }
            self.grow();
            grew = true;
        }
    }

    fn grow(&mut self) {
        let old = self.texture.size();
        let new = (old * 2).min(UVec2::splat(MAX_PAGE_SIZE));
        let mut pixels = vec![0; (new.x * new.y) as usize];
        for (row, src) in self.pixels.chunks_exact(old.x as usize).enumerate() {
            let start = row * new.x as usize;
            pixels[start..start + src.len()].copy_from_slice(src);
        }
        self.pixels = pixels;
        self.texture = Texture::new(new);
        self.dirty = true;
        tracing::debug!(size = ?new, texture = ?self.texture.id(), "Grew font atlas page");
    }

    fn blit(&mut self, position: UVec2, glyph: &RasterizedGlyph) {
        let width = self.texture.size().x as usize;
        for (row, src) in glyph.pixels.chunks_exact(glyph.size.x as usize).enumerate() {
            let start = (position.y as usize + row) * width + position.x as usize;
            self.pixels[start..start + src.len()].copy_from_slice(src);
        }
        self.dirty = true;
    }
}

struct FontInner {
    rasterizer: Box<dyn GlyphRasterizer>,
    pages: FxHashMap<u32, Page>,
}

/// A font: a glyph rasterizer plus one lazily filled atlas page per character size.
///
/// When a page runs out of room its texture doubles in size and gets a new handle, which
/// invalidates the texture coordinates of text laid out with it. Registered
/// [`FontObserver`]s are notified when that happens.
pub struct Font {
    inner: Mutex<FontInner>,
    observers: Mutex<Vec<Weak<AtomicBool>>>,
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Font")
            .field("char_sizes", &inner.pages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Font {
    /// A font drawing glyphs with the given rasterizer.
    pub fn new(rasterizer: impl GlyphRasterizer + 'static) -> Self {
        Self {
            inner: Mutex::new(FontInner {
                rasterizer: Box::new(rasterizer),
                pages: FxHashMap::default(),
            }),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Get a glyph, rasterizing it into the atlas on first use.
    ///
    /// Characters the rasterizer has no glyph for, or that no longer fit in a full page, get
    /// an empty glyph.
    pub fn glyph(&self, codepoint: char, char_size: u32) -> Glyph {
        let mut grew = false;
        let glyph = {
            let mut inner = self.inner.lock();
            let FontInner { rasterizer, pages } = &mut *inner;
            let page = pages.entry(char_size).or_insert_with(Page::new);
            if let Some(glyph) = page.glyphs.get(&codepoint) {
                return *glyph;
            }

            let Some(raster) = rasterizer.rasterize(codepoint, char_size) else {
                tracing::warn!(?codepoint, char_size, "No glyph for character");
                page.glyphs.insert(codepoint, Glyph::default());
                return Glyph::default();
            };

            let mut glyph = Glyph {
                advance: raster.advance,
                bounds: raster.bounds,
                texture_bounds: IntRect::default(),
                use_fill_colour: raster.use_fill_colour,
            };
            if raster.size.x > 0 && raster.size.y > 0 {
                match page.allocate(raster.size) {
                    Some((position, page_grew)) => {
                        page.blit(position, &raster);
                        glyph.texture_bounds = IntRect::new(
                            position.x as i32,
                            position.y as i32,
                            raster.size.x as i32,
                            raster.size.y as i32,
                        );
                        grew = page_grew;
                    }
                    None => {
                        tracing::warn!(?codepoint, char_size, "Font atlas page is full");
                    }
                }
            }
            page.glyphs.insert(codepoint, glyph);
            glyph
        };

        if grew {
            self.notify_observers();
        }
        glyph
    }

    /// The distance between two baselines.
    pub fn line_height(&self, char_size: u32) -> f32 {
        self.inner.lock().rasterizer.line_height(char_size)
    }

    /// Adjustment of the advance between two consecutive characters.
    pub fn kerning(&self, first: char, second: char, char_size: u32) -> f32 {
        self.inner.lock().rasterizer.kerning(first, second, char_size)
    }

    /// The current atlas texture of a character size.
    pub fn texture(&self, char_size: u32) -> Texture {
        self.inner
            .lock()
            .pages
            .entry(char_size)
            .or_insert_with(Page::new)
            .texture
    }

    /// Upload the atlas pages that changed since the last sync.
    pub fn sync_textures(&self, device: &mut dyn RenderDevice) {
        let mut inner = self.inner.lock();
        for page in inner.pages.values_mut().filter(|p| p.dirty) {
            gpu_check!(
                device,
                device.upload_texture(page.texture.id(), page.texture.size(), &page.pixels)
            );
            page.dirty = false;
        }
    }

    /// Be notified when an atlas texture is replaced. Registering twice has no effect.
    pub fn register_observer(&self, observer: &FontObserver) {
        let mut observers = self.observers.lock();
        let weak = Arc::downgrade(&observer.0);
        if !observers.iter().any(|o| o.ptr_eq(&weak)) {
            observers.push(weak);
        }
    }

    /// The number of registered observers still alive.
    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        observers.len()
    }

    fn notify_observers(&self) {
        let mut observers = self.observers.lock();
        observers.retain(|observer| match observer.upgrade() {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn glyphs_are_packed_once() {
        let font = Font::new(BlockRasterizer::new());
        let a = font.glyph('a', 20);
        let b = font.glyph('b', 20);
        assert_eq!(font.glyph('a', 20), a);
        assert_eq!(a.advance, 12.0);
        assert_eq!(a.texture_bounds, IntRect::new(1, 1, 10, 15));
        assert_eq!(b.texture_bounds, IntRect::new(12, 1, 10, 15));

        let space = font.glyph(' ', 20);
        assert_eq!(space.texture_bounds, IntRect::default());
        assert_eq!(space.advance, 12.0);
        assert_eq!(font.glyph('\u{7}', 20), Glyph::default());
    }

    #[test]
    fn full_page_grows_and_notifies() {
        let font = Font::new(BlockRasterizer::new());
        let observer = FontObserver::new();
        font.register_observer(&observer);
        font.register_observer(&observer);
        assert_eq!(font.observer_count(), 1);

        let first = font.texture(40);
        assert_eq!(first.size(), UVec2::splat(INITIAL_PAGE_SIZE));

        // 20x30 glyphs: 6 per shelf and 4 shelves fit in a 128 pixel page.
        for c in ('A'..='Z').take(24) {
            font.glyph(c, 40);
        }
        assert!(!observer.is_notified());
        font.glyph('z', 40);
        assert!(observer.take_notification());
        assert!(!observer.is_notified());

        let grown = font.texture(40);
        assert_eq!(grown.size(), UVec2::splat(INITIAL_PAGE_SIZE * 2));
        assert_ne!(grown.id(), first.id());
        // Existing glyphs keep their pixel position.
        assert_eq!(font.glyph('A', 40).texture_bounds, IntRect::new(1, 1, 20, 30));
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let font = Font::new(BlockRasterizer::new());
        let kept = FontObserver::new();
        font.register_observer(&kept);
        {
            let dropped = FontObserver::new();
            font.register_observer(&dropped);
            assert_eq!(font.observer_count(), 2);
        }
        assert_eq!(font.observer_count(), 1);
    }

    #[test]
    fn sync_uploads_dirty_pages() {
        let font = Font::new(BlockRasterizer::new());
        let mut device = RecordingDevice::default();
        let texture = font.texture(12);
        font.glyph('x', 12);
        font.sync_textures(&mut device);
        assert_eq!(device.texture_size(texture.id()), Some(texture.size()));

        device.clear_commands();
        font.sync_textures(&mut device);
        assert!(device.commands().is_empty());
    }
}
