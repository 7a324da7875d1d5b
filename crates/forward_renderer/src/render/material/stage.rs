//! Material stages
//!
//! A stage is one textured layer of a material with its blend state, its
//! role in lighting and the registers that drive its colour, visibility and
//! texture transform.

use crate::foundation::math::{TexMatrix, Vec4};
use crate::render::material::Register;
use crate::render::resources::{ImageId, ProgramId};
use crate::render::state::StateBits;

/// Role of a stage during lighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageLighting {
    /// Drawn once in the ambient stage pass
    #[default]
    Ambient,
    /// Normal map for light interactions
    Bump,
    /// Diffuse reflectance for light interactions
    Diffuse,
    /// Specular reflectance for light interactions
    Specular,
}

/// Texture coordinate generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexGen {
    /// Vertex texture coordinates
    #[default]
    Explicit,
    /// Cube map looked up by the vertex normal
    DiffuseCube,
    /// Cube map looked up by the reflection vector
    ReflectCube,
    /// Cube map looked up by the view direction
    SkyboxCube,
    /// Skybox with a time-varying tilt and spin
    WobbleSkyCube,
    /// Screen-space coordinates
    Screen,
    /// Alternate screen-space coordinates
    Screen2,
    /// Refraction through the framebuffer
    GlassWarp,
}

/// How vertex colours combine with the stage colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexColorMode {
    /// Vertex colour unused
    #[default]
    Ignore,
    /// Multiply by vertex colour
    Modulate,
    /// Multiply by one minus vertex colour
    InverseModulate,
}

impl VertexColorMode {
    /// The `(modulate, add)` pair the programs compute `vertex * modulate + add` with
    pub const fn modulate_add(self) -> (f32, f32) {
        match self {
            Self::Ignore => (0.0, 1.0),
            Self::Modulate => (1.0, 0.0),
            Self::InverseModulate => (-1.0, 1.0),
        }
    }

    /// Modulate uniform value
    pub fn modulate(self) -> Vec4 {
        let (modulate, _) = self.modulate_add();
        Vec4::repeat(modulate)
    }

    /// Add uniform value
    pub fn add(self) -> Vec4 {
        let (_, add) = self.modulate_add();
        Vec4::repeat(add)
    }
}

/// Soft particle depth blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthBlendMode {
    /// Not specified on the stage; the geometry decides
    #[default]
    Undefined,
    /// Chosen from the stage blend factors
    Auto,
    /// Disabled
    Off,
    /// Fade colour and alpha toward zero near geometry
    ColorAlphaZero,
    /// Fade colour and alpha toward one near geometry
    ColorAlphaOne,
    /// Fade alpha toward zero
    AlphaZero,
    /// Fade alpha toward one
    AlphaOne,
}

impl DepthBlendMode {
    /// Selector value uploaded to the depth blend program
    pub const fn program_value(self) -> i32 {
        match self {
            Self::Undefined => 0,
            Self::Auto => 1,
            Self::Off => 2,
            Self::ColorAlphaZero => 3,
            Self::ColorAlphaOne => 4,
            Self::AlphaZero => 5,
            Self::AlphaOne => 6,
        }
    }
}

/// Register-driven 2x3 texture transform
pub type MatrixRegisters = [[Register; 3]; 2];

/// Keep scrolling offsets small; rotations and scales about the centre may
/// still need offsets above one.
fn wrap_offset(value: f32) -> f32 {
    if (-40.0..=40.0).contains(&value) {
        value
    } else {
        value - value.trunc()
    }
}

/// Texture reference of a stage
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureStage {
    /// Bound image, `None` for stages that draw untextured
    pub image: Option<ImageId>,
    /// Coordinate generation
    pub texgen: TexGen,
    /// Optional register-driven transform
    pub matrix: Option<MatrixRegisters>,
}

impl TextureStage {
    /// Evaluate the texture transform, `None` when the stage has none
    pub fn evaluate_matrix(&self, registers: &[f32]) -> Option<TexMatrix> {
        self.matrix.as_ref().map(|rows| {
            let row = |r: &[Register; 3]| {
                Vec4::new(
                    r[0].eval(registers),
                    r[1].eval(registers),
                    0.0,
                    wrap_offset(r[2].eval(registers)),
                )
            };
            TexMatrix::from_rows(row(&rows[0]), row(&rows[1]))
        })
    }

    /// Evaluate the texture transform, identity when the stage has none
    pub fn matrix_or_identity(&self, registers: &[f32]) -> TexMatrix {
        self.evaluate_matrix(registers).unwrap_or_default()
    }
}

/// Stage rendered with a custom program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomStage {
    /// Program to activate; stages without one are skipped
    pub program: Option<ProgramId>,
    /// Parameter vectors, evaluated per surface
    pub parms: Vec<[Register; 4]>,
    /// Images bound to units 0 and up
    pub maps: Vec<Option<ImageId>>,
}

/// One layer of a material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialStage {
    /// Lighting role
    pub lighting: StageLighting,
    /// Drawn only while this register is nonzero
    pub condition: Register,
    /// RGBA colour registers
    pub color: [Register; 4],
    /// Blend, mask and depth state
    pub draw_state: StateBits,
    /// Texture reference
    pub texture: TextureStage,
    /// Alpha test reference register; perforated materials only
    pub alpha_test: Option<Register>,
    /// Vertex colour usage
    pub vertex_color: VertexColorMode,
    /// Polygon offset used when the material has none, `0` for none
    pub private_polygon_offset: f32,
    /// Soft particle blending
    pub depth_blend_mode: DepthBlendMode,
    /// Soft particle fade distance
    pub depth_blend_range: f32,
    /// Custom program stage
    pub custom: Option<CustomStage>,
}

impl MaterialStage {
    /// Create an unconditional white stage
    pub fn new(lighting: StageLighting, image: Option<ImageId>) -> Self {
        Self {
            lighting,
            condition: Register::ONE,
            color: [Register::ONE; 4],
            draw_state: StateBits::empty(),
            texture: TextureStage {
                image,
                ..TextureStage::default()
            },
            alpha_test: None,
            vertex_color: VertexColorMode::Ignore,
            private_polygon_offset: 0.0,
            depth_blend_mode: DepthBlendMode::Undefined,
            depth_blend_range: 0.0,
            custom: None,
        }
    }

    /// Ambient stage
    pub fn ambient(image: Option<ImageId>) -> Self {
        Self::new(StageLighting::Ambient, image)
    }

    /// Bump stage
    pub fn bump(image: ImageId) -> Self {
        Self::new(StageLighting::Bump, Some(image))
    }

    /// Diffuse stage
    pub fn diffuse(image: ImageId) -> Self {
        Self::new(StageLighting::Diffuse, Some(image))
    }

    /// Specular stage
    pub fn specular(image: ImageId) -> Self {
        Self::new(StageLighting::Specular, Some(image))
    }

    /// Custom program stage
    pub fn custom(program: Option<ProgramId>) -> Self {
        let mut stage = Self::new(StageLighting::Ambient, None);
        stage.custom = Some(CustomStage {
            program,
            ..CustomStage::default()
        });
        stage
    }

    /// Set the condition register
    pub fn with_condition(mut self, condition: Register) -> Self {
        self.condition = condition;
        self
    }

    /// Set the colour registers
    pub fn with_color(mut self, color: [Register; 4]) -> Self {
        self.color = color;
        self
    }

    /// Set a constant colour
    pub fn with_constant_color(self, r: f32, g: f32, b: f32, a: f32) -> Self {
        self.with_color([
            Register::Constant(r),
            Register::Constant(g),
            Register::Constant(b),
            Register::Constant(a),
        ])
    }

    /// Set the blend/depth state
    pub fn with_state(mut self, bits: StateBits) -> Self {
        self.draw_state = bits;
        self
    }

    /// Set texture coordinate generation
    pub fn with_texgen(mut self, texgen: TexGen) -> Self {
        self.texture.texgen = texgen;
        self
    }

    /// Set a register-driven texture transform
    pub fn with_matrix(mut self, matrix: MatrixRegisters) -> Self {
        self.texture.matrix = Some(matrix);
        self
    }

    /// Alpha test against a register
    pub fn with_alpha_test(mut self, threshold: Register) -> Self {
        self.alpha_test = Some(threshold);
        self
    }

    /// Set vertex colour usage
    pub fn with_vertex_color(mut self, mode: VertexColorMode) -> Self {
        self.vertex_color = mode;
        self
    }

    /// Set a stage-level polygon offset
    pub fn with_private_polygon_offset(mut self, offset: f32) -> Self {
        self.private_polygon_offset = offset;
        self
    }

    /// Set soft particle blending
    pub fn with_depth_blend(mut self, mode: DepthBlendMode, range: f32) -> Self {
        self.depth_blend_mode = mode;
        self.depth_blend_range = range;
        self
    }

    /// Add a custom stage parameter vector
    pub fn with_shader_parm(mut self, parm: [Register; 4]) -> Self {
        if let Some(custom) = self.custom.as_mut() {
            custom.parms.push(parm);
        }
        self
    }

    /// Add a custom stage map
    pub fn with_shader_map(mut self, image: Option<ImageId>) -> Self {
        if let Some(custom) = self.custom.as_mut() {
            custom.maps.push(image);
        }
        self
    }

    /// Whether the stage is drawn for these registers
    pub fn is_enabled(&self, registers: &[f32]) -> bool {
        self.condition.eval(registers) != 0.0
    }

    /// Evaluate the RGBA colour registers
    pub fn evaluate_color(&self, registers: &[f32]) -> Vec4 {
        Vec4::new(
            self.color[0].eval(registers),
            self.color[1].eval(registers),
            self.color[2].eval(registers),
            self.color[3].eval(registers),
        )
    }
}
