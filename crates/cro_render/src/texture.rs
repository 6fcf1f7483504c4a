//! Texture handles.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::UVec2;

static NEXT_TEXTURE_ID: AtomicU32 = AtomicU32::new(1);

/// The handle of a texture on the device.
///
/// Handles are allocated in increasing order and never reused. `TextureId::NONE` is the
/// handle of a missing texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

impl TextureId {
    /// No texture.
    pub const NONE: TextureId = TextureId(0);

    /// Allocate a fresh handle.
    pub fn allocate() -> TextureId {
        TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A texture: a handle and the size of its image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texture {
    id: TextureId,
    size: UVec2,
}

impl Texture {
    /// Describe a new texture of the given size with a freshly allocated handle.
    pub fn new(size: UVec2) -> Self {
        Self {
            id: TextureId::allocate(),
            size,
        }
    }

    /// Describe an existing texture.
    pub fn from_id(id: TextureId, size: UVec2) -> Self {
        Self { id, size }
    }

    /// The texture handle.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The size in pixels.
    pub fn size(&self) -> UVec2 {
        self.size
    }
}
