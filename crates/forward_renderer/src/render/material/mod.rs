//! Material model consumed by the passes
//!
//! Materials are parsed and owned by the asset layer and shared across
//! frames. Per-surface behaviour comes from an evaluated register array; the
//! material only stores which register drives which value.
//!
//! # Coverage
//!
//! - **Opaque**: fills depth with a solid draw
//! - **Perforated**: alpha tested; fills depth per alpha-test stage
//! - **Translucent**: never written to or tested against depth in the pre-pass

pub mod stage;

pub use stage::{
    CustomStage, DepthBlendMode, MaterialStage, MatrixRegisters, StageLighting, TexGen, TextureStage,
    VertexColorMode,
};

use crate::render::api::CullType;

/// Source of one scalar in a material definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Register {
    /// Fixed value
    Constant(f32),
    /// Index into the surface's evaluated registers
    Slot(usize),
}

impl Register {
    /// Constant zero
    pub const ZERO: Self = Self::Constant(0.0);
    /// Constant one
    pub const ONE: Self = Self::Constant(1.0);

    /// Read the value; slots past the end of the array read as zero
    pub fn eval(self, registers: &[f32]) -> f32 {
        match self {
            Self::Constant(value) => value,
            Self::Slot(index) => registers.get(index).copied().unwrap_or(0.0),
        }
    }
}

/// Depth pre-pass classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Coverage {
    /// Solid
    #[default]
    Opaque,
    /// Alpha tested
    Perforated,
    /// Blended
    Translucent,
}

/// Sort key placing a material in the ambient stage order
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Sort(pub f32);

impl Sort {
    /// Mirrors, cameras and other subviews
    pub const SUBVIEW: Self = Self(-3.0);
    /// In-world GUIs
    pub const GUI: Self = Self(-2.0);
    /// Unsorted
    pub const BAD: Self = Self(-1.0);
    /// Default for opaque materials
    pub const OPAQUE: Self = Self(0.0);
    /// Portal sky surfaces
    pub const PORTAL_SKY: Self = Self(1.0);
    /// Decals over opaque geometry
    pub const DECAL: Self = Self(2.0);
    /// Far translucent
    pub const FAR: Self = Self(3.0);
    /// Default for translucent materials
    pub const MEDIUM: Self = Self(4.0);
    /// Near translucent
    pub const CLOSE: Self = Self(5.0);
    /// Just behind nearest
    pub const ALMOST_NEAREST: Self = Self(6.0);
    /// Weapons and view models
    pub const NEAREST: Self = Self(7.0);
    /// Reads the rendered frame
    pub const POST_PROCESS: Self = Self(100.0);
}

/// How a material behaves when used as a light shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightKind {
    /// Normal bump/diffuse/specular light
    #[default]
    Normal,
    /// Non-directional light without specular
    Ambient,
    /// Fog volume
    Fog,
    /// Light whose stages are blended straight onto surfaces
    Blend,
}

/// An immutable material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Debug name
    pub name: String,
    /// Stages in declaration order
    pub stages: Vec<MaterialStage>,
    /// Depth pre-pass classification
    pub coverage: Coverage,
    /// Sort key
    pub sort: Sort,
    /// Polygon offset for every stage
    pub polygon_offset: Option<f32>,
    /// Face culling
    pub cull: CullType,
    /// Drawn through a portal sky rather than directly
    pub portal_sky: bool,
    /// Not drawn in mirrors and other subviews
    pub suppress_in_subview: bool,
    /// Classification when used as a light
    pub light_kind: LightKind,
    /// Wobble sky tilt degrees, tilt speed and spin speed
    pub sky_registers: [Register; 3],
}

impl Material {
    /// Create an opaque material without stages
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            coverage: Coverage::Opaque,
            sort: Sort::OPAQUE,
            polygon_offset: None,
            cull: CullType::FrontSided,
            portal_sky: false,
            suppress_in_subview: false,
            light_kind: LightKind::Normal,
            sky_registers: [Register::ZERO; 3],
        }
    }

    /// Append a stage
    pub fn with_stage(mut self, stage: MaterialStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Set coverage
    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    /// Set the sort key
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Set a material polygon offset
    pub fn with_polygon_offset(mut self, offset: f32) -> Self {
        self.polygon_offset = Some(offset);
        self
    }

    /// Set face culling
    pub fn with_cull(mut self, cull: CullType) -> Self {
        self.cull = cull;
        self
    }

    /// Set the light classification
    pub fn with_light_kind(mut self, kind: LightKind) -> Self {
        self.light_kind = kind;
        self
    }

    /// Set wobble sky registers
    pub fn with_sky_registers(mut self, registers: [Register; 3]) -> Self {
        self.sky_registers = registers;
        self
    }

    /// Whether anything is drawn for this material
    pub fn is_drawn(&self) -> bool {
        !self.stages.is_empty()
    }

    /// Whether any stage belongs to the ambient pass
    pub fn has_ambient(&self) -> bool {
        self.stages.iter().any(|stage| stage.lighting == StageLighting::Ambient)
    }

    /// Whether any stage could light through interactions
    pub fn receives_lighting(&self) -> bool {
        self.stages.iter().any(|stage| stage.lighting != StageLighting::Ambient)
    }

    /// First bump stage, used by reflection stages
    pub fn bump_stage(&self) -> Option<&MaterialStage> {
        self.stages.iter().find(|stage| stage.lighting == StageLighting::Bump)
    }

    /// Whether this material is sorted as a subview
    pub fn is_subview(&self) -> bool {
        self.sort == Sort::SUBVIEW
    }

    /// Whether this material reads the rendered frame
    pub fn is_post_process(&self) -> bool {
        self.sort >= Sort::POST_PROCESS
    }

    /// Polygon offset amount, zero when the material has none
    pub fn polygon_offset_amount(&self) -> f32 {
        self.polygon_offset.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::resources::ImageId;

    #[test]
    fn test_register_eval() {
        assert_eq!(Register::Constant(0.25).eval(&[]), 0.25);
        assert_eq!(Register::Slot(1).eval(&[3.0, 4.0]), 4.0);
        assert_eq!(Register::Slot(9).eval(&[3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_material_classification() {
        let image = ImageId::default();
        let material = Material::new("wall")
            .with_stage(MaterialStage::bump(image))
            .with_stage(MaterialStage::diffuse(image));
        assert!(material.is_drawn());
        assert!(!material.has_ambient());
        assert!(material.receives_lighting());
        assert!(material.bump_stage().is_some());
        assert!(!Material::new("empty").is_drawn());
    }

    #[test]
    fn test_sort_ordering() {
        assert!(Material::new("pp").with_sort(Sort::POST_PROCESS).is_post_process());
        assert!(!Material::new("glass").with_sort(Sort::NEAREST).is_post_process());
        assert!(Material::new("mirror").with_sort(Sort::SUBVIEW).is_subview());
    }
}
