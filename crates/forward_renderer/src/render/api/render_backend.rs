//! Backend abstraction for the submission core
//!
//! [`GraphicsBackend`] is the raw device seam: every method maps to one
//! pipeline mutation or command and applies unconditionally. Redundancy
//! elimination lives one level up in the render context, so a backend never
//! compares against previous values.

use crate::render::api::Uniform;
use crate::render::resources::{BufferOffset, ImageId, ProgramId};
use crate::render::state::StateBits;

/// Number of texture units the passes address
pub const MAX_TEXTURE_UNITS: usize = 8;

/// Reference value the stencil buffer is cleared to; values below it are shadowed
pub const STENCIL_SHADOW_REFERENCE: u8 = 128;

/// Pixel rectangle handed to the scissor test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorBox {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl ScissorBox {
    /// Create a scissor box
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// Which faces survive rasterisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullType {
    /// Only front faces are drawn
    #[default]
    FrontSided,
    /// Only back faces are drawn
    BackSided,
    /// Both faces are drawn
    TwoSided,
}

/// Depth bias applied to rasterised fragments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    /// Slope scale
    pub factor: f32,
    /// Constant units
    pub units: f32,
}

/// Stencil comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilCompare {
    /// Always passes
    Always,
    /// Passes when the reference equals the stored value
    Equal,
    /// Passes when the reference is greater than or equal to the stored value
    GreaterEqual,
    /// Passes when the reference is less than the stored value
    Less,
}

/// Stencil test function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFunc {
    /// Comparison
    pub compare: StencilCompare,
    /// Reference value
    pub reference: u8,
    /// Mask applied to both sides of the comparison
    pub mask: u8,
}

impl StencilFunc {
    /// Create a stencil function
    pub const fn new(compare: StencilCompare, reference: u8, mask: u8) -> Self {
        Self { compare, reference, mask }
    }
}

/// Stencil buffer update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilAction {
    /// Leave the value
    Keep,
    /// Set to zero
    Zero,
    /// Set to the reference value
    Replace,
    /// Increment with wrap-around
    IncrWrap,
    /// Decrement with wrap-around
    DecrWrap,
}

/// Stencil operations for the three test outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilOps {
    /// Stencil test failed
    pub stencil_fail: StencilAction,
    /// Stencil passed, depth failed
    pub depth_fail: StencilAction,
    /// Both passed
    pub depth_pass: StencilAction,
}

impl StencilOps {
    /// Create a stencil operation triple
    pub const fn new(stencil_fail: StencilAction, depth_fail: StencilAction, depth_pass: StencilAction) -> Self {
        Self { stencil_fail, depth_fail, depth_pass }
    }

    /// Leave the stencil buffer untouched
    pub const KEEP: Self = Self::new(StencilAction::Keep, StencilAction::Keep, StencilAction::Keep);
}

/// Vertex attribute layouts the passes bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// Position, texcoord, normal, tangents and colour
    Draw,
    /// Position only
    DrawPosOnly,
    /// Position and texcoord
    DrawPosTexOnly,
    /// Position and colour
    DrawPosColorOnly,
    /// Position, colour and texcoord
    DrawPosColorTexOnly,
    /// Homogeneous shadow volume positions
    Shadow,
}

/// Optional device features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    /// Depth bounds test support
    pub depth_bounds_test: bool,
}

/// Raw GPU command seam
pub trait GraphicsBackend {
    /// Optional features of this device
    fn capabilities(&self) -> BackendCapabilities;

    /// Apply packed blend/mask/depth state
    fn apply_state(&mut self, bits: StateBits);

    /// Activate a program, `None` for no program
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Bind an image to a texture unit, `None` unbinds
    fn bind_texture(&mut self, unit: usize, image: Option<ImageId>);

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: ScissorBox);

    /// Bind vertex attributes at `offset` in the shared vertex buffer
    fn set_vertex_layout(&mut self, layout: VertexLayout, offset: BufferOffset);

    /// Set face culling
    fn set_cull(&mut self, cull: CullType);

    /// Enable polygon offset with the given parameters, or disable it
    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>);

    /// Enable or disable the stencil test
    fn set_stencil_test(&mut self, enabled: bool);

    /// Set the stencil comparison
    fn set_stencil_func(&mut self, func: StencilFunc);

    /// Set the stencil update operations
    fn set_stencil_ops(&mut self, ops: StencilOps);

    /// Enable or disable the depth bounds test
    fn set_depth_bounds_test(&mut self, enabled: bool);

    /// Set the depth bounds
    fn set_depth_bounds(&mut self, min: f32, max: f32);

    /// Set the depth range mapping
    fn set_depth_range(&mut self, near: f32, far: f32);

    /// Upload a uniform to the active program
    fn set_uniform(&mut self, uniform: &Uniform);

    /// Clear the stencil buffer inside the current scissor
    fn clear_stencil(&mut self, value: u8);

    /// Copy the framebuffer region into an image
    fn copy_framebuffer(&mut self, image: ImageId, region: ScissorBox);

    /// Draw indexed triangles from the bound vertex range
    fn draw_elements(&mut self, index_count: u32);
}
