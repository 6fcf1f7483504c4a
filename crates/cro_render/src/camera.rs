//! Camera components.

use glam::{Mat4, UVec2, Vec2, Vec4};

use crate::rect::{FloatRect, IntRect};

/// Makes an entity behave like a camera.
///
/// Renderers read the view-projection matrix to place their vertices and the viewport to map
/// world space cropping areas to scissor rectangles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// The combined view and projection matrix.
    pub view_projection: Mat4,
    /// The area of the render target drawn to, in pixels.
    pub viewport: IntRect,
    /// Whether or not the camera is enabled and rendering.
    pub active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::for_viewport(UVec2::new(800, 600))
    }
}

impl Camera {
    /// A camera with an orthographic projection of the given world area.
    pub fn orthographic(area: FloatRect, near: f32, far: f32, viewport: IntRect) -> Self {
        Self {
            view_projection: Mat4::orthographic_rh_gl(
                area.left,
                area.right(),
                area.bottom,
                area.top(),
                near,
                far,
            ),
            viewport,
            active: true,
        }
    }

    /// A camera mapping one world unit to one pixel of a target of the given size, with the
    /// origin in the bottom left.
    pub fn for_viewport(size: UVec2) -> Self {
        let size = size.as_ivec2();
        Self::orthographic(
            FloatRect::new(0.0, 0.0, size.x as f32, size.y as f32),
            -0.1,
            100.0,
            IntRect::new(0, 0, size.x, size.y),
        )
    }

    /// Project a world point to viewport pixel coordinates.
    pub fn world_to_viewport(&self, point: Vec2) -> Vec2 {
        let clip = self.view_projection * Vec4::new(point.x, point.y, 0.0, 1.0);
        let ndc = Vec2::new(clip.x, clip.y) / clip.w;
        let size = Vec2::new(self.viewport.width as f32, self.viewport.height as f32);
        let offset = Vec2::new(self.viewport.left as f32, self.viewport.bottom as f32);
        (ndc + Vec2::ONE) / 2.0 * size + offset
    }

    /// Map a world space rectangle to the viewport pixels it covers.
    pub fn scissor_rect(&self, world: &FloatRect) -> IntRect {
        let min = self.world_to_viewport(Vec2::new(world.left, world.bottom));
        let max = self.world_to_viewport(Vec2::new(world.right(), world.top()));
        let (min, max) = (min.min(max).round(), min.max(max).round());
        IntRect::new(
            min.x as i32,
            min.y as i32,
            (max.x - min.x) as i32,
            (max.y - min.y) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn pixel_camera_scissor() {
        let camera = Camera::for_viewport(UVec2::new(640, 480));
        assert_eq!(
            camera.scissor_rect(&FloatRect::new(10.0, 20.0, 100.0, 50.0)),
            IntRect::new(10, 20, 100, 50)
        );
    }

    #[test]
    fn viewport_offset_is_applied() {
        let camera = Camera::orthographic(
            FloatRect::new(-1.0, -1.0, 2.0, 2.0),
            -1.0,
            1.0,
            IntRect::new(100, 50, 200, 100),
        );
        let p = camera.world_to_viewport(Vec2::ZERO);
        assert_eq!(p, Vec2::new(200.0, 100.0));
    }
}
