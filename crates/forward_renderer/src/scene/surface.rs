//! Visible surfaces
//!
//! A surface is one piece of geometry drawn with one material in one space.
//! Front-end culling produces them each frame; the passes only read them.

use std::sync::Arc;

use bitflags::bitflags;

use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::resources::CacheHandle;
use crate::render::material::DepthBlendMode;

/// Screen rectangle with depth bounds, inclusive pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    /// Left
    pub x1: i32,
    /// Bottom
    pub y1: i32,
    /// Right, inclusive
    pub x2: i32,
    /// Top, inclusive
    pub y2: i32,
    /// Nearest depth touched
    pub zmin: f32,
    /// Farthest depth touched
    pub zmax: f32,
}

impl ScreenRect {
    /// Rectangle covering `[x1, x2] x [y1, y2]` at full depth range
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            zmin: 0.0,
            zmax: 1.0,
        }
    }

    /// Set the depth bounds
    #[must_use]
    pub const fn with_depth(mut self, zmin: f32, zmax: f32) -> Self {
        self.zmin = zmin;
        self.zmax = zmax;
        self
    }

    /// Width in pixels
    pub const fn width(&self) -> i32 {
        self.x2 + 1 - self.x1
    }

    /// Height in pixels
    pub const fn height(&self) -> i32 {
        self.y2 + 1 - self.y1
    }

    /// Whether the rectangle covers no pixels
    pub const fn is_empty(&self) -> bool {
        self.x1 > self.x2 || self.y1 > self.y2
    }
}

/// Identity of a view entity, compared to detect space changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(pub u32);

/// Per-instance transform shared by the surfaces of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEntity {
    /// Identity
    pub id: SpaceId,
    /// Object to world
    pub model_matrix: Mat4,
    /// Object to eye
    pub model_view_matrix: Mat4,
    /// Squash into the front of the depth range (view weapons)
    pub weapon_depth_hack: bool,
    /// Pull toward the viewer by this much in clip space, `0` for none
    pub model_depth_hack: f32,
}

impl ViewEntity {
    /// Entity with the given transforms
    pub fn new(id: SpaceId, model_matrix: Mat4, view_matrix: &Mat4) -> Self {
        Self {
            id,
            model_matrix,
            model_view_matrix: view_matrix * model_matrix,
            weapon_depth_hack: false,
            model_depth_hack: 0.0,
        }
    }

    /// Whether drawing this entity alters the projection
    pub fn has_depth_hack(&self) -> bool {
        self.weapon_depth_hack || self.model_depth_hack != 0.0
    }
}

bitflags! {
    /// Cap planes of a shadow volume
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShadowCapBits: u8 {
        /// Light frustum plane 0
        const PLANE_0 = 1 << 0;
        /// Light frustum plane 1
        const PLANE_1 = 1 << 1;
        /// Light frustum plane 2
        const PLANE_2 = 1 << 2;
        /// Light frustum plane 3
        const PLANE_3 = 1 << 3;
        /// Light frustum plane 4
        const PLANE_4 = 1 << 4;
        /// Light frustum plane 5
        const PLANE_5 = 1 << 5;
        /// Volume projected to infinity
        const INFINITE = 1 << 6;
        /// All six frustum planes
        const ALL_PLANES = 0x3f;
    }
}

bitflags! {
    /// Per-surface visibility facts computed by the front end
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u8 {
        /// The viewer may be inside this surface's shadow volume
        const VIEW_INSIDE_SHADOW = 1 << 0;
    }
}

/// Triangle data of a surface as seen by the passes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// Index count of the renderable triangles
    pub num_indexes: u32,
    /// Vertex cache entry for lit and ambient drawing
    pub ambient_cache: Option<CacheHandle>,
    /// Vertex cache entry for shadow volume drawing
    pub shadow_cache: Option<CacheHandle>,
    /// Shadow indexes without any caps
    pub num_shadow_indexes_no_caps: u32,
    /// Shadow indexes without the front (light-facing) cap
    pub num_shadow_indexes_no_front_caps: u32,
    /// Which light planes the shadow caps touch
    pub shadow_cap_plane_bits: ShadowCapBits,
    /// Soft particle mode when the stage leaves it undefined
    pub depth_blend_mode: DepthBlendMode,
    /// Soft particle fade distance when the stage leaves it undefined
    pub depth_blend_range: f32,
}

impl Geometry {
    /// Renderable triangles in a vertex cache entry
    pub fn triangles(num_indexes: u32, ambient_cache: CacheHandle) -> Self {
        Self {
            num_indexes,
            ambient_cache: Some(ambient_cache),
            ..Self::default()
        }
    }

    /// Shadow volume triangles with their cap subsets
    pub fn shadow_volume(shadow_cache: CacheHandle, full: u32, no_caps: u32, no_front_caps: u32) -> Self {
        Self {
            num_indexes: full,
            shadow_cache: Some(shadow_cache),
            num_shadow_indexes_no_caps: no_caps,
            num_shadow_indexes_no_front_caps: no_front_caps,
            ..Self::default()
        }
    }

    /// Set cap plane bits
    #[must_use]
    pub fn with_cap_bits(mut self, bits: ShadowCapBits) -> Self {
        self.shadow_cap_plane_bits = bits;
        self
    }
}

/// A visible surface
#[derive(Debug, Clone)]
pub struct Surface {
    /// Triangles
    pub geometry: Arc<Geometry>,
    /// Material
    pub material: Arc<Material>,
    /// Instance transform
    pub space: Arc<ViewEntity>,
    /// Evaluated material registers
    pub registers: Vec<f32>,
    /// Screen bounds
    pub scissor: ScreenRect,
    /// Visibility facts
    pub flags: SurfaceFlags,
}

impl Surface {
    /// Create a surface with no registers and no flags
    pub fn new(geometry: Arc<Geometry>, material: Arc<Material>, space: Arc<ViewEntity>, scissor: ScreenRect) -> Self {
        Self {
            geometry,
            material,
            space,
            registers: Vec::new(),
            scissor,
            flags: SurfaceFlags::empty(),
        }
    }

    /// Set the evaluated registers
    #[must_use]
    pub fn with_registers(mut self, registers: Vec<f32>) -> Self {
        self.registers = registers;
        self
    }

    /// Set visibility flags
    #[must_use]
    pub fn with_flags(mut self, flags: SurfaceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The ambient vertex cache entry, logging when it is missing
    pub fn ambient_cache(&self) -> Option<CacheHandle> {
        let cache = self.geometry.ambient_cache;
        if cache.is_none() {
            log::warn!("Surface with material '{}' has no ambient cache", self.material.name);
        }
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_rect_size() {
        let rect = ScreenRect::new(10, 20, 19, 39);
        assert_eq!(rect.width(), 10);
        assert_eq!(rect.height(), 20);
        assert!(!rect.is_empty());
        assert!(ScreenRect::new(5, 5, 4, 5).is_empty());
    }

    #[test]
    fn test_view_entity_combines_matrices() {
        let model = Mat4::new_translation(&crate::foundation::math::Vec3::new(1.0, 2.0, 3.0));
        let view = Mat4::new_translation(&crate::foundation::math::Vec3::new(0.0, 0.0, -10.0));
        let entity = ViewEntity::new(SpaceId(1), model, &view);
        assert_eq!(entity.model_view_matrix, view * model);
        assert!(!entity.has_depth_hack());
    }

    #[test]
    fn test_cap_bits() {
        let bits = ShadowCapBits::PLANE_2 | ShadowCapBits::INFINITE;
        assert!(bits.contains(ShadowCapBits::INFINITE));
        assert!(bits.intersects(ShadowCapBits::ALL_PLANES));
    }
}
