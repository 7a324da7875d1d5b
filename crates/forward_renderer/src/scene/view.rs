//! The view being rendered

use std::sync::Arc;

use crate::foundation::math::{Mat4, Plane, Vec3};
use crate::render::api::ScissorBox;
use crate::scene::light::ViewLight;
use crate::scene::surface::{ScreenRect, SpaceId, Surface, ViewEntity};

/// Everything the passes need about one view
#[derive(Debug, Clone)]
pub struct ViewDef {
    /// World-space eye position
    pub view_origin: Vec3,
    /// Eye to clip
    pub projection_matrix: Mat4,
    /// World space as a view entity (identity model matrix)
    pub world_space: Arc<ViewEntity>,
    /// Viewport within the window
    pub viewport: ScreenRect,
    /// View scissor, relative to the viewport
    pub scissor: ScreenRect,
    /// Window size in pixels
    pub window_size: (i32, i32),
    /// Seconds, drives sky rotation
    pub float_time: f32,
    /// Near clip distance
    pub near_clip: f32,
    /// Far clip distance
    pub far_clip: f32,
    /// False for 2D GUI views, which skip the depth pre-pass
    pub is_3d: bool,
    /// Mirror clip plane
    pub clip_plane: Option<Plane>,
    /// Visible surfaces in sort order
    pub draw_surfaces: Vec<Surface>,
    /// Visible lights
    pub lights: Vec<ViewLight>,
}

impl ViewDef {
    /// A 3D view covering the whole window
    pub fn new(view_origin: Vec3, view_matrix: &Mat4, projection_matrix: Mat4, width: i32, height: i32) -> Self {
        let full = ScreenRect::new(0, 0, width - 1, height - 1);
        Self {
            view_origin,
            projection_matrix,
            world_space: Arc::new(ViewEntity::new(SpaceId(0), Mat4::identity(), view_matrix)),
            viewport: full,
            scissor: full,
            window_size: (width, height),
            float_time: 0.0,
            near_clip: 1.0,
            far_clip: 10_000.0,
            is_3d: true,
            clip_plane: None,
            draw_surfaces: Vec::new(),
            lights: Vec::new(),
        }
    }

    /// Pixel scissor for a rectangle relative to the viewport
    pub const fn scissor_box(&self, rect: &ScreenRect) -> ScissorBox {
        ScissorBox::new(
            self.viewport.x1 + rect.x1,
            self.viewport.y1 + rect.y1,
            rect.width(),
            rect.height(),
        )
    }

    /// Scissor covering the whole window
    pub const fn full_window_scissor(&self) -> ScissorBox {
        ScissorBox::new(0, 0, self.window_size.0, self.window_size.1)
    }

    /// Scissor covering the viewport
    pub const fn viewport_box(&self) -> ScissorBox {
        ScissorBox::new(
            self.viewport.x1,
            self.viewport.y1,
            self.viewport.width(),
            self.viewport.height(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scissor_is_offset_by_viewport() {
        let mut view = ViewDef::new(Vec3::zeros(), &Mat4::identity(), Mat4::identity(), 640, 480);
        view.viewport = ScreenRect::new(100, 50, 419, 289);
        let scissor = view.scissor_box(&ScreenRect::new(10, 10, 29, 19));
        assert_eq!(scissor, ScissorBox::new(110, 60, 20, 10));
        assert_eq!(view.full_window_scissor(), ScissorBox::new(0, 0, 640, 480));
        assert_eq!(view.viewport_box(), ScissorBox::new(100, 50, 320, 240));
    }
}
