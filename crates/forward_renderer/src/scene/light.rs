//! Visible lights
//!
//! One [`ViewLight`] exists per light touching the view this frame. Its
//! surface chains are sorted by the front end:
//!
//! - `global_shadows` / `local_shadows`: shadow volumes cast by world and
//!   entity geometry
//! - `local_interactions`: surfaces only shadowed by the global volumes
//! - `global_interactions`: surfaces shadowed by both
//! - `translucent_interactions`: lit without shadows or depth writes

use std::sync::Arc;

use crate::foundation::math::{Mat4, Plane, Vec3, Vec4};
use crate::render::material::{LightKind, Material};
use crate::render::resources::ImageId;
use crate::scene::surface::{Geometry, ScreenRect, ShadowCapBits, Surface};

/// Shadow-map inputs computed by the shadow map renderer
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMapParams {
    /// Point light using six cube faces
    pub point_light: bool,
    /// Cube face view-projections for point lights
    pub point_view_projections: [Mat4; 6],
    /// View-projection for projected lights
    pub spot_view_projection: Mat4,
    /// Filter radius
    pub softness: f32,
    /// Brightness inside shadows
    pub brightness: f32,
}

/// How a light is shadowed
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ShadowMode {
    /// Stencil shadow volumes
    #[default]
    Stencil,
    /// Shadow maps sampled by the interaction program
    ShadowMap(ShadowMapParams),
}

impl ShadowMode {
    /// Selector uploaded to the interaction program
    pub const fn program_value(&self) -> i32 {
        match self {
            Self::Stencil => 0,
            Self::ShadowMap(params) if params.point_light => 1,
            Self::ShadowMap(_) => 2,
        }
    }
}

/// A light visible this frame
#[derive(Debug, Clone)]
pub struct ViewLight {
    /// Light shader
    pub shader: Arc<Material>,
    /// Evaluated light shader registers
    pub registers: Vec<f32>,
    /// Shadowing technique
    pub shadow_mode: ShadowMode,
    /// Falloff image
    pub falloff_image: ImageId,
    /// World-space S, T, Q and falloff planes
    pub light_project: [Plane; 4],
    /// World-space origin
    pub global_light_origin: Vec3,
    /// The viewer is inside the light volume
    pub view_inside_light: bool,
    /// Light frustum planes the viewer can see the back of
    pub view_sees_shadow_plane_bits: ShadowCapBits,
    /// Screen bounds
    pub scissor: ScreenRect,
    /// World-space fog plane for fog lights
    pub fog_plane: Plane,
    /// Closed light frustum for fog lights
    pub frustum_tris: Option<Arc<Geometry>>,
    /// Shadow volumes from the world
    pub global_shadows: Vec<Surface>,
    /// Shadow volumes from entities
    pub local_shadows: Vec<Surface>,
    /// Surfaces shadowed by world volumes only
    pub local_interactions: Vec<Surface>,
    /// Surfaces shadowed by both sets of volumes
    pub global_interactions: Vec<Surface>,
    /// Translucent surfaces
    pub translucent_interactions: Vec<Surface>,
}

impl ViewLight {
    /// Light with empty chains
    pub fn new(shader: Arc<Material>, falloff_image: ImageId, global_light_origin: Vec3, scissor: ScreenRect) -> Self {
        Self {
            shader,
            registers: Vec::new(),
            shadow_mode: ShadowMode::Stencil,
            falloff_image,
            light_project: [
                Vec4::new(1.0, 0.0, 0.0, 0.0),
                Vec4::new(0.0, 1.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 0.0, 1.0, 0.0),
            ],
            global_light_origin,
            view_inside_light: false,
            view_sees_shadow_plane_bits: ShadowCapBits::empty(),
            scissor,
            fog_plane: Vec4::new(0.0, 0.0, 1.0, 0.0),
            frustum_tris: None,
            global_shadows: Vec::new(),
            local_shadows: Vec::new(),
            local_interactions: Vec::new(),
            global_interactions: Vec::new(),
            translucent_interactions: Vec::new(),
        }
    }

    /// Light shader classification
    pub fn kind(&self) -> LightKind {
        self.shader.light_kind
    }

    /// Fog volume
    pub fn is_fog(&self) -> bool {
        self.kind() == LightKind::Fog
    }

    /// Blend light
    pub fn is_blend(&self) -> bool {
        self.kind() == LightKind::Blend
    }

    /// Whether the light has any shadow volumes
    pub fn has_shadows(&self) -> bool {
        !self.global_shadows.is_empty() || !self.local_shadows.is_empty()
    }

    /// Whether the light touches any surface
    pub fn has_interactions(&self) -> bool {
        !self.local_interactions.is_empty()
            || !self.global_interactions.is_empty()
            || !self.translucent_interactions.is_empty()
    }

    /// Whether stencil shadow volumes are drawn for this light
    pub const fn uses_stencil_shadows(&self) -> bool {
        matches!(self.shadow_mode, ShadowMode::Stencil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot_params(point_light: bool) -> ShadowMapParams {
        ShadowMapParams {
            point_light,
            point_view_projections: [Mat4::identity(); 6],
            spot_view_projection: Mat4::identity(),
            softness: 1.0,
            brightness: 0.2,
        }
    }

    #[test]
    fn test_shadow_mode_selector() {
        assert_eq!(ShadowMode::Stencil.program_value(), 0);
        assert_eq!(ShadowMode::ShadowMap(spot_params(true)).program_value(), 1);
        assert_eq!(ShadowMode::ShadowMap(spot_params(false)).program_value(), 2);
    }

    #[test]
    fn test_light_classification() {
        let shader = Arc::new(Material::new("fog").with_light_kind(LightKind::Fog));
        let light = ViewLight::new(shader, ImageId::default(), Vec3::zeros(), ScreenRect::new(0, 0, 9, 9));
        assert!(light.is_fog());
        assert!(!light.is_blend());
        assert!(!light.has_shadows());
        assert!(!light.has_interactions());
        assert!(light.uses_stencil_shadows());
    }
}
