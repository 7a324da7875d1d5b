//! Render state gate
//!
//! [`RenderContext`] owns the backend and remembers every value it applied.
//! Each setter compares the requested value with the applied one and only
//! forwards a change. All passes mutate pipeline state through it; reaching
//! the backend directly would desynchronise the tracked state for the rest of
//! the frame.

use crate::render::api::{
    BackendCapabilities, CullType, GraphicsBackend, PolygonOffset, ScissorBox, StencilFunc, StencilOps, Uniform,
    VertexLayout, MAX_TEXTURE_UNITS,
};
use crate::render::resources::{BufferOffset, CacheHandle, ImageId, ProgramId, VertexCache};
use crate::render::state::StateBits;

/// Counters for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Changes forwarded to the backend
    pub state_changes: usize,
    /// Setter calls that matched the applied value
    pub redundant_skipped: usize,
    /// Draw calls
    pub draws: usize,
    /// Uniform uploads
    pub uniforms: usize,
    /// Geometry that failed to bind
    pub cache_misses: usize,
}

impl GateStats {
    /// Fraction of setter calls that were filtered out
    pub fn redundancy_ratio(&self) -> f32 {
        let total = self.state_changes + self.redundant_skipped;
        if total == 0 {
            0.0
        } else {
            self.redundant_skipped as f32 / total as f32
        }
    }
}

/// Last applied value of every tracked piece of state; `None` means unknown
#[derive(Debug, Clone, Default)]
struct AppliedState {
    bits: Option<StateBits>,
    program: Option<Option<ProgramId>>,
    textures: [Option<Option<ImageId>>; MAX_TEXTURE_UNITS],
    scissor: Option<ScissorBox>,
    vertex: Option<(VertexLayout, BufferOffset)>,
    cull: Option<CullType>,
    polygon_offset: Option<Option<PolygonOffset>>,
    stencil_test: Option<bool>,
    stencil_func: Option<StencilFunc>,
    stencil_ops: Option<StencilOps>,
    depth_bounds_test: Option<bool>,
    depth_bounds: Option<(f32, f32)>,
    depth_range: Option<(f32, f32)>,
}

/// Store `value` and report whether it differs from the applied one
fn update<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        false
    } else {
        *slot = Some(value);
        true
    }
}

/// Lazy, delta-only front end to a backend
pub struct RenderContext<B: GraphicsBackend, V: VertexCache> {
    backend: B,
    vertex_cache: V,
    applied: AppliedState,
    force_state: bool,
    stats: GateStats,
}

impl<B: GraphicsBackend, V: VertexCache> RenderContext<B, V> {
    /// Wrap a backend and vertex cache
    pub fn new(backend: B, vertex_cache: V) -> Self {
        Self {
            backend,
            vertex_cache,
            applied: AppliedState::default(),
            force_state: false,
            stats: GateStats::default(),
        }
    }

    /// Forget all applied state and reset counters
    ///
    /// Called at the start of a frame since the device may have been touched
    /// by other code in between.
    pub fn begin_frame(&mut self) {
        self.applied = AppliedState::default();
        self.force_state = false;
        self.stats = GateStats::default();
    }

    /// Counters since `begin_frame`
    pub const fn stats(&self) -> GateStats {
        self.stats
    }

    /// Device features
    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    /// The wrapped backend
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The vertex cache
    pub fn vertex_cache_mut(&mut self) -> &mut V {
        &mut self.vertex_cache
    }

    fn record(&mut self, changed: bool) -> bool {
        if changed {
            self.stats.state_changes += 1;
        } else {
            self.stats.redundant_skipped += 1;
        }
        changed
    }

    /// Make the next `set_state` apply even if unchanged
    pub fn force_next_state(&mut self) {
        self.force_state = true;
    }

    /// Apply packed blend/mask/depth state
    pub fn set_state(&mut self, bits: StateBits) {
        let forced = std::mem::take(&mut self.force_state);
        let changed = update(&mut self.applied.bits, bits) || forced;
        if self.record(changed) {
            self.backend.apply_state(bits);
        }
    }

    /// Currently applied state bits, if known
    pub const fn current_state(&self) -> Option<StateBits> {
        self.applied.bits
    }

    /// Activate a program
    pub fn use_program(&mut self, program: Option<ProgramId>) {
        let changed = update(&mut self.applied.program, program);
        if self.record(changed) {
            self.backend.use_program(program);
        }
    }

    /// Currently active program, if known
    pub fn current_program(&self) -> Option<ProgramId> {
        self.applied.program.flatten()
    }

    /// Bind an image to a texture unit, `None` unbinds
    pub fn bind_texture(&mut self, unit: usize, image: Option<ImageId>) {
        let Some(slot) = self.applied.textures.get_mut(unit) else {
            log::warn!("Texture unit {} out of range", unit);
            return;
        };
        let changed = update(slot, image);
        if self.record(changed) {
            self.backend.bind_texture(unit, image);
        }
    }

    /// Set the scissor rectangle
    pub fn set_scissor(&mut self, scissor: ScissorBox) {
        let changed = update(&mut self.applied.scissor, scissor);
        if self.record(changed) {
            self.backend.set_scissor(scissor);
        }
    }

    /// Bind a vertex layout at a buffer offset
    pub fn set_vertex_layout(&mut self, layout: VertexLayout, offset: BufferOffset) {
        let changed = update(&mut self.applied.vertex, (layout, offset));
        if self.record(changed) {
            self.backend.set_vertex_layout(layout, offset);
        }
    }

    /// Resolve a cache handle and bind its vertices
    ///
    /// Returns `false` when the handle was evicted; the caller must skip the
    /// draw.
    pub fn bind_geometry(&mut self, handle: CacheHandle, layout: VertexLayout) -> bool {
        match self.vertex_cache.bind(handle) {
            Some(offset) => {
                self.set_vertex_layout(layout, offset);
                true
            }
            None => {
                self.stats.cache_misses += 1;
                log::warn!("Vertex cache entry {:?} was evicted, skipping draw", handle);
                false
            }
        }
    }

    /// Set face culling
    pub fn set_cull(&mut self, cull: CullType) {
        let changed = update(&mut self.applied.cull, cull);
        if self.record(changed) {
            self.backend.set_cull(cull);
        }
    }

    /// Enable polygon offset, or disable with `None`
    pub fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>) {
        let changed = update(&mut self.applied.polygon_offset, offset);
        if self.record(changed) {
            self.backend.set_polygon_offset(offset);
        }
    }

    /// Enable or disable the stencil test
    pub fn set_stencil_test(&mut self, enabled: bool) {
        let changed = update(&mut self.applied.stencil_test, enabled);
        if self.record(changed) {
            self.backend.set_stencil_test(enabled);
        }
    }

    /// Set the stencil comparison
    pub fn set_stencil_func(&mut self, func: StencilFunc) {
        let changed = update(&mut self.applied.stencil_func, func);
        if self.record(changed) {
            self.backend.set_stencil_func(func);
        }
    }

    /// Currently applied stencil function, if known
    pub const fn current_stencil_func(&self) -> Option<StencilFunc> {
        self.applied.stencil_func
    }

    /// Set the stencil update operations
    pub fn set_stencil_ops(&mut self, ops: StencilOps) {
        let changed = update(&mut self.applied.stencil_ops, ops);
        if self.record(changed) {
            self.backend.set_stencil_ops(ops);
        }
    }

    /// Enable or disable the depth bounds test
    pub fn set_depth_bounds_test(&mut self, enabled: bool) {
        let changed = update(&mut self.applied.depth_bounds_test, enabled);
        if self.record(changed) {
            self.backend.set_depth_bounds_test(enabled);
        }
    }

    /// Set the depth bounds
    pub fn set_depth_bounds(&mut self, min: f32, max: f32) {
        let changed = update(&mut self.applied.depth_bounds, (min, max));
        if self.record(changed) {
            self.backend.set_depth_bounds(min, max);
        }
    }

    /// Set the depth range mapping
    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        let changed = update(&mut self.applied.depth_range, (near, far));
        if self.record(changed) {
            self.backend.set_depth_range(near, far);
        }
    }

    /// Upload a uniform to the active program
    pub fn uniform(&mut self, uniform: Uniform) {
        self.stats.uniforms += 1;
        self.backend.set_uniform(&uniform);
    }

    /// Clear the stencil buffer inside the current scissor
    pub fn clear_stencil(&mut self, value: u8) {
        self.backend.clear_stencil(value);
    }

    /// Copy a framebuffer region into an image
    pub fn copy_framebuffer(&mut self, image: ImageId, region: ScissorBox) {
        self.backend.copy_framebuffer(image, region);
        // the copy may rebind the target image on the active unit
        self.applied.textures = Default::default();
    }

    /// Draw indexed triangles from the bound vertices
    pub fn draw_elements(&mut self, index_count: u32) {
        self.stats.draws += 1;
        self.backend.draw_elements(index_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{BackendCall, RecordingBackend, StencilCompare};
    use crate::render::resources::{FrameVertexCache, ImageInfo, ImageTable, ProgramTable};

    fn context() -> RenderContext<RecordingBackend, FrameVertexCache> {
        RenderContext::new(RecordingBackend::new(), FrameVertexCache::new())
    }

    #[test]
    fn test_repeated_state_is_applied_once() {
        let mut ctx = context();
        ctx.set_state(StateBits::DEPTHMASK);
        ctx.set_state(StateBits::DEPTHMASK);
        ctx.set_state(StateBits::DEPTHMASK | StateBits::DEPTHFUNC_EQUAL);
        assert_eq!(ctx.backend().state_change_count(), 2);
        assert_eq!(ctx.stats().redundant_skipped, 1);
    }

    #[test]
    fn test_force_reapplies_once() {
        let mut ctx = context();
        ctx.set_state(StateBits::DEPTHMASK);
        ctx.force_next_state();
        ctx.set_state(StateBits::DEPTHMASK);
        ctx.set_state(StateBits::DEPTHMASK);
        assert_eq!(ctx.backend().state_change_count(), 2);
    }

    #[test]
    fn test_texture_units_tracked_independently() {
        let mut ctx = context();
        let mut images = ImageTable::new();
        let image = images.register(ImageInfo::new("wall", 4, 4));
        ctx.bind_texture(1, Some(image));
        ctx.bind_texture(2, Some(image));
        ctx.bind_texture(1, Some(image));
        ctx.bind_texture(1, None);
        assert_eq!(
            ctx.backend().calls(),
            &[
                BackendCall::Texture(1, Some(image)),
                BackendCall::Texture(2, Some(image)),
                BackendCall::Texture(1, None),
            ]
        );
    }

    #[test]
    fn test_out_of_range_unit_is_ignored() {
        let mut ctx = context();
        ctx.bind_texture(MAX_TEXTURE_UNITS, None);
        assert!(ctx.backend().calls().is_empty());
    }

    #[test]
    fn test_begin_frame_forgets_applied_state() {
        let mut ctx = context();
        let mut programs = ProgramTable::new();
        let program = programs.register("depth");
        ctx.use_program(Some(program));
        ctx.begin_frame();
        ctx.use_program(Some(program));
        assert_eq!(ctx.backend().state_change_count(), 2);
        assert_eq!(ctx.current_program(), Some(program));
    }

    #[test]
    fn test_evicted_geometry_does_not_bind() {
        let mut ctx = context();
        let handle = ctx.vertex_cache_mut().alloc(128);
        assert!(ctx.bind_geometry(handle, VertexLayout::Draw));
        ctx.vertex_cache_mut().evict(handle);
        assert!(!ctx.bind_geometry(handle, VertexLayout::Draw));
        assert_eq!(ctx.stats().cache_misses, 1);
        assert_eq!(ctx.backend().state_change_count(), 1);
    }

    #[test]
    fn test_stencil_func_dedup() {
        let mut ctx = context();
        let func = StencilFunc::new(StencilCompare::Always, 128, 255);
        ctx.set_stencil_func(func);
        ctx.set_stencil_func(func);
        assert_eq!(ctx.current_stencil_func(), Some(func));
        assert_eq!(ctx.backend().state_change_count(), 1);
    }
}
