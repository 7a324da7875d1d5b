//! Recording backend
//!
//! Captures every call in order instead of talking to a device. Used by the
//! replay tool and by tests that assert on the exact command stream.

use crate::render::api::render_backend::{
    BackendCapabilities, CullType, GraphicsBackend, PolygonOffset, ScissorBox, StencilFunc, StencilOps,
    VertexLayout,
};
use crate::render::api::Uniform;
use crate::render::resources::{BufferOffset, ImageId, ProgramId};
use crate::render::state::StateBits;

/// One captured backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `apply_state`
    State(StateBits),
    /// `use_program`
    Program(Option<ProgramId>),
    /// `bind_texture`
    Texture(usize, Option<ImageId>),
    /// `set_scissor`
    Scissor(ScissorBox),
    /// `set_vertex_layout`
    VertexLayout(VertexLayout, BufferOffset),
    /// `set_cull`
    Cull(CullType),
    /// `set_polygon_offset`
    PolygonOffset(Option<PolygonOffset>),
    /// `set_stencil_test`
    StencilTest(bool),
    /// `set_stencil_func`
    StencilFunc(StencilFunc),
    /// `set_stencil_ops`
    StencilOps(StencilOps),
    /// `set_depth_bounds_test`
    DepthBoundsTest(bool),
    /// `set_depth_bounds`
    DepthBounds(f32, f32),
    /// `set_depth_range`
    DepthRange(f32, f32),
    /// `set_uniform`
    Uniform(Uniform),
    /// `clear_stencil`
    ClearStencil(u8),
    /// `copy_framebuffer`
    CopyFramebuffer(ImageId, ScissorBox),
    /// `draw_elements`
    Draw(u32),
}

impl BackendCall {
    /// Whether this call changes pipeline state (not a draw, upload or clear)
    pub const fn is_state_change(&self) -> bool {
        !matches!(
            self,
            Self::Uniform(_) | Self::Draw(_) | Self::ClearStencil(_) | Self::CopyFramebuffer(..)
        )
    }
}

/// Backend that records calls
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    capabilities: BackendCapabilities,
}

impl RecordingBackend {
    /// Create a backend without optional features
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with the given features
    pub fn with_capabilities(capabilities: BackendCapabilities) -> Self {
        Self {
            calls: Vec::new(),
            capabilities,
        }
    }

    /// Calls captured so far
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forget captured calls
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Draw calls with their index counts
    pub fn draws(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Draw(count) => Some(*count),
                _ => None,
            })
            .collect()
    }

    /// Number of pipeline state changes
    pub fn state_change_count(&self) -> usize {
        self.calls.iter().filter(|call| call.is_state_change()).count()
    }

    /// Uniform uploads in order
    pub fn uniforms(&self) -> impl Iterator<Item = &Uniform> {
        self.calls.iter().filter_map(|call| match call {
            BackendCall::Uniform(uniform) => Some(uniform),
            _ => None,
        })
    }
}

impl GraphicsBackend for RecordingBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn apply_state(&mut self, bits: StateBits) {
        self.calls.push(BackendCall::State(bits));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(BackendCall::Program(program));
    }

    fn bind_texture(&mut self, unit: usize, image: Option<ImageId>) {
        self.calls.push(BackendCall::Texture(unit, image));
    }

    fn set_scissor(&mut self, scissor: ScissorBox) {
        self.calls.push(BackendCall::Scissor(scissor));
    }

    fn set_vertex_layout(&mut self, layout: VertexLayout, offset: BufferOffset) {
        self.calls.push(BackendCall::VertexLayout(layout, offset));
    }

    fn set_cull(&mut self, cull: CullType) {
        self.calls.push(BackendCall::Cull(cull));
    }

    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>) {
        self.calls.push(BackendCall::PolygonOffset(offset));
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.calls.push(BackendCall::StencilTest(enabled));
    }

    fn set_stencil_func(&mut self, func: StencilFunc) {
        self.calls.push(BackendCall::StencilFunc(func));
    }

    fn set_stencil_ops(&mut self, ops: StencilOps) {
        self.calls.push(BackendCall::StencilOps(ops));
    }

    fn set_depth_bounds_test(&mut self, enabled: bool) {
        self.calls.push(BackendCall::DepthBoundsTest(enabled));
    }

    fn set_depth_bounds(&mut self, min: f32, max: f32) {
        self.calls.push(BackendCall::DepthBounds(min, max));
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.calls.push(BackendCall::DepthRange(near, far));
    }

    fn set_uniform(&mut self, uniform: &Uniform) {
        self.calls.push(BackendCall::Uniform(uniform.clone()));
    }

    fn clear_stencil(&mut self, value: u8) {
        self.calls.push(BackendCall::ClearStencil(value));
    }

    fn copy_framebuffer(&mut self, image: ImageId, region: ScissorBox) {
        self.calls.push(BackendCall::CopyFramebuffer(image, region));
    }

    fn draw_elements(&mut self, index_count: u32) {
        self.calls.push(BackendCall::Draw(index_count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut backend = RecordingBackend::new();
        backend.apply_state(StateBits::DEPTHMASK);
        backend.set_uniform(&Uniform::ShadingModel(1));
        backend.draw_elements(6);
        assert_eq!(backend.calls().len(), 3);
        assert_eq!(backend.state_change_count(), 1);
        assert_eq!(backend.draws(), vec![6]);
        assert_eq!(backend.uniforms().count(), 1);
    }
}
