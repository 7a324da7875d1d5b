//! # Render Settings
//!
//! Every tunable the passes read per frame. The host engine owns how these
//! are edited; this crate only needs a validated snapshot.
//!
//! ## Categories
//!
//! - **Clipping**: scissor and depth-bounds usage
//! - **Shadows**: external volume classification, polygon offset, debug view
//! - **Lighting**: light scale, overbright, specular response, shading model
//! - **Debug skips**: switches that drop whole classes of draws

use serde::{Deserialize, Serialize};

use super::Config;

/// How shadow volumes the viewer is outside of are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalShadowMode {
    /// Always draw the full capped volume with the preload pass
    Disabled,
    /// Classify per surface and drop caps when the viewer is outside
    #[default]
    Enabled,
    /// Debug: always draw the uncapped subset without preload
    ForceNoCaps,
}

/// Shadow volume visualisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowDebugMode {
    /// Normal stencil-only rendering
    #[default]
    Off,
    /// Volumes drawn as additive wireframe
    Lines,
    /// Volumes drawn as additive filled triangles
    Filled,
}

/// Lighting model used by the interaction program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingModel {
    /// Blinn-Phong half-vector specular
    #[default]
    BlinnPhong,
    /// Phong reflection-vector specular
    Phong,
}

impl ShadingModel {
    /// Selector value uploaded to the interaction program
    pub const fn program_value(self) -> i32 {
        match self {
            Self::BlinnPhong => 0,
            Self::Phong => 1,
        }
    }
}

/// Per-frame render tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Restrict draws to the surface and light scissor rectangles
    pub use_scissor: bool,
    /// Use the depth bounds test for shadow volumes when the backend has it
    pub use_depth_bounds_test: bool,
    /// Shadow volume cap classification
    pub external_shadows: ExternalShadowMode,
    /// Shadow volume visualisation
    pub show_shadows: ShadowDebugMode,
    /// Polygon offset factor applied to shadow volumes
    pub shadow_polygon_factor: f32,
    /// Polygon offset units applied to shadow volumes
    pub shadow_polygon_offset: f32,
    /// Polygon offset factor for decals and offset stages
    pub offset_factor: f32,
    /// Polygon offset units, multiplied by the material offset
    pub offset_units: f32,
    /// Global light intensity multiplier
    pub light_scale: f32,
    /// Overbright factor; subviews darken by its reciprocal
    pub overbright: f32,
    /// Multiplier on every specular colour
    pub specular_scale: f32,
    /// Specular exponent
    pub specular_exp: f32,
    /// Interaction shading model
    pub shading: ShadingModel,
    /// Parallax occlusion mapping on specular maps with alpha
    pub pom_enabled: bool,
    /// Parallax height scale
    pub pom_max_height: f32,
    /// Skip all light interactions
    pub skip_interactions: bool,
    /// Skip translucent interactions
    pub skip_translucent: bool,
    /// Skip ambient stages
    pub skip_ambient: bool,
    /// Draw interactions with black diffuse
    pub skip_diffuse: bool,
    /// Draw interactions with black specular
    pub skip_specular: bool,
    /// Draw interactions with a flat normal map
    pub skip_bump: bool,
    /// Skip stages with a custom program
    pub skip_custom_stages: bool,
    /// Skip blend lights
    pub skip_blend_lights: bool,
    /// Skip post-process stages
    pub skip_post_process: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            use_scissor: true,
            use_depth_bounds_test: true,
            external_shadows: ExternalShadowMode::Enabled,
            show_shadows: ShadowDebugMode::Off,
            shadow_polygon_factor: 0.0,
            shadow_polygon_offset: -1.0,
            offset_factor: -1.0,
            offset_units: -2.0,
            light_scale: 2.0,
            overbright: 1.0,
            specular_scale: 1.0,
            specular_exp: 10.0,
            shading: ShadingModel::BlinnPhong,
            pom_enabled: false,
            pom_max_height: 0.045,
            skip_interactions: false,
            skip_translucent: false,
            skip_ambient: false,
            skip_diffuse: false,
            skip_specular: false,
            skip_bump: false,
            skip_custom_stages: false,
            skip_blend_lights: false,
            skip_post_process: false,
        }
    }
}

impl Config for RenderSettings {}

impl RenderSettings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shadow volume classification mode
    pub fn with_external_shadows(mut self, mode: ExternalShadowMode) -> Self {
        self.external_shadows = mode;
        self
    }

    /// Enable or disable scissoring
    pub fn with_scissor(mut self, enabled: bool) -> Self {
        self.use_scissor = enabled;
        self
    }

    /// Set the global light scale
    pub fn with_light_scale(mut self, scale: f32) -> Self {
        self.light_scale = scale;
        self
    }

    /// Set the specular scale and exponent
    pub fn with_specular(mut self, scale: f32, exponent: f32) -> Self {
        self.specular_scale = scale;
        self.specular_exp = exponent;
        self
    }

    /// Enable parallax occlusion mapping with the given height
    pub fn with_pom(mut self, max_height: f32) -> Self {
        self.pom_enabled = true;
        self.pom_max_height = max_height;
        self
    }

    /// Whether shadow polygon offset is active
    pub fn has_shadow_polygon_offset(&self) -> bool {
        self.shadow_polygon_factor != 0.0 || self.shadow_polygon_offset != 0.0
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), String> {
        let finite = [
            ("shadow_polygon_factor", self.shadow_polygon_factor),
            ("shadow_polygon_offset", self.shadow_polygon_offset),
            ("offset_factor", self.offset_factor),
            ("offset_units", self.offset_units),
            ("pom_max_height", self.pom_max_height),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, value)| !value.is_finite()) {
            return Err(format!("{name} must be finite"));
        }
        if !(self.light_scale.is_finite() && self.light_scale > 0.0) {
            return Err(format!("light_scale must be positive, got {}", self.light_scale));
        }
        if !(self.overbright.is_finite() && self.overbright >= 1.0) {
            return Err(format!("overbright must be at least 1, got {}", self.overbright));
        }
        if !(self.specular_scale.is_finite() && self.specular_scale >= 0.0) {
            return Err(format!("specular_scale must be non-negative, got {}", self.specular_scale));
        }
        if !(self.specular_exp.is_finite() && self.specular_exp > 0.0) {
            return Err(format!("specular_exp must be positive, got {}", self.specular_exp));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_defaults_are_valid() {
        let settings = RenderSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.external_shadows, ExternalShadowMode::Enabled);
        assert!(settings.has_shadow_polygon_offset());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = "light_scale = 3.0\nexternal_shadows = \"force_no_caps\"\nshading = \"phong\"\n";
        let settings = RenderSettings::parse_str(text, ConfigFormat::Toml).unwrap();
        assert_eq!(settings.light_scale, 3.0);
        assert_eq!(settings.external_shadows, ExternalShadowMode::ForceNoCaps);
        assert_eq!(settings.shading.program_value(), 1);
        assert_eq!(settings.specular_exp, 10.0);
    }

    #[test]
    fn test_ron_round_trip() {
        let settings = RenderSettings::new().with_pom(0.03).with_scissor(false);
        let text = settings.to_string_in(ConfigFormat::Ron).unwrap();
        let parsed = RenderSettings::parse_str(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = RenderSettings::new().with_light_scale(0.0);
        assert!(settings.validate().is_err());
        settings.light_scale = 2.0;
        settings.overbright = 0.5;
        assert!(settings.validate().is_err());
        settings.overbright = 1.0;
        settings.offset_units = f32::NAN;
        assert!(settings.validate().unwrap_err().contains("offset_units"));
    }
}
