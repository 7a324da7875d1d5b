//! Stencil shadow volumes
//!
//! Shadow volumes are drawn into the stencil buffer only. Volumes the viewer
//! is outside of use the cheap depth-pass technique on their side planes;
//! volumes that may contain the viewer first preload the stencil with the
//! depth-fail counts so that clipping by the near plane does not invert the
//! result.

use crate::config::{ExternalShadowMode, RenderSettings, ShadowDebugMode};
use crate::foundation::math::{global_point_to_local, Vec4};
use crate::render::api::{
    CullType, GraphicsBackend, PolygonOffset, StencilAction, StencilCompare, StencilFunc, StencilOps, Uniform,
    VertexLayout, STENCIL_SHADOW_REFERENCE,
};
use crate::render::passes::{submit_records, DrawRecord, FrameParams, SpaceTracker};
use crate::render::resources::VertexCache;
use crate::render::state::{DepthFunc, DstBlend, RenderContext, SrcBlend, StateBits};
use crate::render::RenderResult;
use crate::scene::{Geometry, ShadowCapBits, Surface, SurfaceFlags, ViewLight};

/// Which subset of a shadow volume's indexes is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowIndexSet {
    /// Side planes and both caps
    Full,
    /// Side planes only
    NoCaps,
    /// Side planes and the rear cap
    NoFrontCaps,
}

/// Index subset and technique chosen for one shadow volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowDrawPlan {
    /// Indexes to draw
    pub index_count: u32,
    /// Subset the count comes from
    pub set: ShadowIndexSet,
    /// The viewer is known to be outside the volume, so no preload is needed
    pub external: bool,
}

impl ShadowDrawPlan {
    fn new(geometry: &Geometry, set: ShadowIndexSet, external: bool) -> Self {
        let index_count = match set {
            ShadowIndexSet::Full => geometry.num_indexes,
            ShadowIndexSet::NoCaps => geometry.num_shadow_indexes_no_caps,
            ShadowIndexSet::NoFrontCaps => geometry.num_shadow_indexes_no_front_caps,
        };
        Self {
            index_count,
            set,
            external,
        }
    }

    /// Draw calls this plan issues
    pub const fn draw_count(&self) -> usize {
        if self.external {
            2
        } else {
            4
        }
    }
}

/// Choose the index subset and technique for a shadow volume
pub fn plan_shadow_draw(
    mode: ExternalShadowMode,
    geometry: &Geometry,
    flags: SurfaceFlags,
    light: &ViewLight,
) -> ShadowDrawPlan {
    match mode {
        ExternalShadowMode::Disabled => ShadowDrawPlan::new(geometry, ShadowIndexSet::Full, false),
        // debug: caps are never drawn, shadows may be wrong
        ExternalShadowMode::ForceNoCaps => ShadowDrawPlan::new(geometry, ShadowIndexSet::NoCaps, false),
        ExternalShadowMode::Enabled => {
            if !flags.contains(SurfaceFlags::VIEW_INSIDE_SHADOW) {
                return ShadowDrawPlan::new(geometry, ShadowIndexSet::NoCaps, true);
            }
            let infinite = geometry.shadow_cap_plane_bits.contains(ShadowCapBits::INFINITE);
            if !light.view_inside_light && !infinite {
                // inside the projection but outside the light: only a rear
                // cap the viewer can see through needs drawing
                let set = if light.view_sees_shadow_plane_bits.intersects(geometry.shadow_cap_plane_bits) {
                    ShadowIndexSet::NoFrontCaps
                } else {
                    ShadowIndexSet::NoCaps
                };
                return ShadowDrawPlan::new(geometry, set, true);
            }
            ShadowDrawPlan::new(geometry, ShadowIndexSet::Full, false)
        }
    }
}

/// One shadow volume draw
#[derive(Debug, Clone, Copy)]
pub struct ShadowRecord<'a> {
    /// Volume surface
    pub surface: &'a Surface,
    /// Light origin in the volume's space, `w = 0`
    pub local_light_origin: Vec4,
    /// Index subset and technique
    pub plan: ShadowDrawPlan,
}

/// Build the shadow records for one chain of a light
pub fn build_shadow_list<'a>(
    surfaces: &'a [Surface],
    light: &ViewLight,
    settings: &RenderSettings,
) -> Vec<ShadowRecord<'a>> {
    surfaces
        .iter()
        .filter(|surface| surface.geometry.shadow_cache.is_some())
        .map(|surface| ShadowRecord {
            surface,
            local_light_origin: global_point_to_local(&surface.space.model_matrix, &light.global_light_origin)
                .push(0.0),
            plan: plan_shadow_draw(settings.external_shadows, &surface.geometry, surface.flags, light),
        })
        .collect()
}

/// Tracking state of the shadow submitter
#[derive(Debug, Default)]
pub struct ShadowCursor {
    space: SpaceTracker,
    depth_bounds: bool,
}

impl ShadowRecord<'_> {
    fn draw_sided<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        cull: CullType,
        depth_fail: StencilAction,
        depth_pass: StencilAction,
    ) {
        ctx.set_stencil_ops(StencilOps::new(StencilAction::Keep, depth_fail, depth_pass));
        ctx.set_cull(cull);
        ctx.draw_elements(self.plan.index_count);
    }
}

impl DrawRecord for ShadowRecord<'_> {
    type Cursor = ShadowCursor;

    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut ShadowCursor,
    ) -> bool {
        let surface = self.surface;
        if cursor.space.enter(ctx, frame, &surface.space) {
            ctx.uniform(Uniform::LocalLightOrigin(self.local_light_origin));
            if !surface.space.has_depth_hack() {
                ctx.uniform(Uniform::ProjectionMatrix(frame.view.projection_matrix));
            }
        }

        let Some(cache) = surface.geometry.shadow_cache else {
            return false;
        };
        if !ctx.bind_geometry(cache, VertexLayout::Shadow) {
            return false;
        }
        frame.apply_scissor(ctx, &surface.scissor);
        if cursor.depth_bounds {
            ctx.set_depth_bounds(surface.scissor.zmin, surface.scissor.zmax);
        }

        if !self.plan.external {
            // preload with the volumes clipped by the near or far plane
            self.draw_sided(ctx, CullType::FrontSided, StencilAction::DecrWrap, StencilAction::DecrWrap);
            self.draw_sided(ctx, CullType::BackSided, StencilAction::IncrWrap, StencilAction::IncrWrap);
        }
        self.draw_sided(ctx, CullType::FrontSided, StencilAction::Keep, StencilAction::IncrWrap);
        self.draw_sided(ctx, CullType::BackSided, StencilAction::Keep, StencilAction::DecrWrap);
        true
    }
}

fn shadow_state(debug: ShadowDebugMode) -> StateBits {
    match debug {
        ShadowDebugMode::Off => {
            StateBits::DEPTHMASK | StateBits::COLORMASK | StateBits::ALPHAMASK | DepthFunc::Less.bits()
        }
        ShadowDebugMode::Filled => {
            StateBits::DEPTHMASK | StateBits::blend(SrcBlend::One, DstBlend::One) | DepthFunc::Less.bits()
        }
        ShadowDebugMode::Lines => {
            StateBits::blend(SrcBlend::One, DstBlend::Zero) | StateBits::POLYMODE_LINE | DepthFunc::Always.bits()
        }
    }
}

/// Draw one shadow chain of `light` into the stencil buffer
///
/// Afterwards the stencil test passes only where the shadow count is back at
/// the reference value, i.e. outside every volume.
pub fn submit_shadow_list<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    light: &ViewLight,
    records: &[ShadowRecord<'_>],
) -> RenderResult<usize> {
    if !light.uses_stencil_shadows() || records.is_empty() {
        return Ok(0);
    }
    let program = frame.require_program(frame.programs.shadow, "shadow")?;
    let settings = frame.settings;

    ctx.use_program(Some(program));
    ctx.bind_texture(0, None);
    ctx.set_state(shadow_state(settings.show_shadows));

    let polygon_offset = settings.has_shadow_polygon_offset();
    if polygon_offset {
        ctx.set_polygon_offset(Some(PolygonOffset {
            factor: settings.shadow_polygon_factor,
            units: -settings.shadow_polygon_offset,
        }));
    }
    ctx.set_stencil_func(StencilFunc::new(StencilCompare::Always, 1, 255));

    let depth_bounds = ctx.capabilities().depth_bounds_test && settings.use_depth_bounds_test;
    if depth_bounds {
        ctx.set_depth_bounds_test(true);
    }

    let mut cursor = ShadowCursor {
        depth_bounds,
        ..ShadowCursor::default()
    };
    let drawn = submit_records(ctx, frame, records, &mut cursor);
    cursor.space.finish(ctx, frame);

    ctx.set_cull(CullType::FrontSided);
    if polygon_offset {
        ctx.set_polygon_offset(None);
    }
    if depth_bounds {
        ctx.set_depth_bounds_test(false);
    }
    ctx.set_stencil_func(StencilFunc::new(
        StencilCompare::GreaterEqual,
        STENCIL_SHADOW_REFERENCE,
        255,
    ));
    ctx.set_stencil_ops(StencilOps::KEEP);
    ctx.use_program(None);
    log::trace!("Shadow pass: {} of {} volumes drawn", drawn, records.len());
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{BackendCall, BackendCapabilities, RecordingBackend};
    use crate::render::frame_tests::Fixture;
    use crate::render::resources::FrameVertexCache;
    use crate::render::state::RenderContext;
    use crate::scene::ShadowMode;

    fn volume() -> Geometry {
        Geometry {
            num_indexes: 36,
            num_shadow_indexes_no_caps: 24,
            num_shadow_indexes_no_front_caps: 30,
            ..Geometry::default()
        }
    }

    #[test]
    fn test_plan_selection() {
        let fixture = Fixture::new();
        let mut light = fixture.light();
        let geometry = volume().with_cap_bits(ShadowCapBits::PLANE_1);
        let inside = SurfaceFlags::VIEW_INSIDE_SHADOW;

        let plan = plan_shadow_draw(ExternalShadowMode::Disabled, &geometry, SurfaceFlags::empty(), &light);
        assert_eq!((plan.set, plan.index_count, plan.external), (ShadowIndexSet::Full, 36, false));

        let plan = plan_shadow_draw(ExternalShadowMode::ForceNoCaps, &geometry, inside, &light);
        assert_eq!((plan.set, plan.external), (ShadowIndexSet::NoCaps, false));

        let plan = plan_shadow_draw(ExternalShadowMode::Enabled, &geometry, SurfaceFlags::empty(), &light);
        assert_eq!((plan.set, plan.index_count, plan.external), (ShadowIndexSet::NoCaps, 24, true));

        let plan = plan_shadow_draw(ExternalShadowMode::Enabled, &geometry, inside, &light);
        assert_eq!((plan.set, plan.external), (ShadowIndexSet::NoCaps, true));

        light.view_sees_shadow_plane_bits = ShadowCapBits::PLANE_1;
        let plan = plan_shadow_draw(ExternalShadowMode::Enabled, &geometry, inside, &light);
        assert_eq!((plan.set, plan.index_count, plan.external), (ShadowIndexSet::NoFrontCaps, 30, true));

        light.view_inside_light = true;
        let plan = plan_shadow_draw(ExternalShadowMode::Enabled, &geometry, inside, &light);
        assert_eq!((plan.set, plan.external), (ShadowIndexSet::Full, false));
    }

    #[test]
    fn test_infinite_volume_needs_full_set() {
        let fixture = Fixture::new();
        let light = fixture.light();
        let geometry = volume().with_cap_bits(ShadowCapBits::INFINITE);
        let plan = plan_shadow_draw(
            ExternalShadowMode::Enabled,
            &geometry,
            SurfaceFlags::VIEW_INSIDE_SHADOW,
            &light,
        );
        assert_eq!(plan.set, ShadowIndexSet::Full);
        assert_eq!(plan.draw_count(), 4);
    }

    #[test]
    fn test_external_volume_draws_side_planes_without_preload() {
        let mut fixture = Fixture::new();
        let light = fixture.light();
        let surface = fixture.shadow_surface(36, 24, 30);
        let frame = fixture.params();
        let records = build_shadow_list(std::slice::from_ref(&surface), &light, frame.settings);
        assert!(records[0].plan.external);

        let mut ctx = fixture.context();
        assert_eq!(submit_shadow_list(&mut ctx, &frame, &light, &records).unwrap(), 1);
        assert_eq!(ctx.backend().draws(), vec![24, 24]);
        let preload = ctx.backend().calls().iter().any(|call| {
            matches!(call, BackendCall::StencilOps(ops) if ops.depth_fail == StencilAction::DecrWrap)
        });
        assert!(!preload);
    }

    #[test]
    fn test_internal_volume_preloads_then_counts() {
        let mut fixture = Fixture::new();
        let mut light = fixture.light();
        light.view_inside_light = true;
        let surface = fixture
            .shadow_surface(36, 24, 30)
            .with_flags(SurfaceFlags::VIEW_INSIDE_SHADOW);
        let frame = fixture.params();
        let records = build_shadow_list(std::slice::from_ref(&surface), &light, frame.settings);
        let mut ctx = fixture.context();
        submit_shadow_list(&mut ctx, &frame, &light, &records).unwrap();

        let ops: Vec<_> = ctx
            .backend()
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::StencilOps(ops) => Some((ops.depth_fail, ops.depth_pass)),
                _ => None,
            })
            .collect();
        use StencilAction::*;
        assert_eq!(
            ops,
            vec![(DecrWrap, DecrWrap), (IncrWrap, IncrWrap), (Keep, IncrWrap), (Keep, DecrWrap), (Keep, Keep)]
        );
        assert_eq!(ctx.backend().draws(), vec![36; 4]);
    }

    #[test]
    fn test_epilogue_leaves_shadow_test_enabled() {
        let mut fixture = Fixture::new();
        let light = fixture.light();
        let surface = fixture.shadow_surface(12, 6, 9);
        let frame = fixture.params();
        let records = build_shadow_list(std::slice::from_ref(&surface), &light, frame.settings);
        let mut ctx = fixture.context();
        submit_shadow_list(&mut ctx, &frame, &light, &records).unwrap();
        assert_eq!(
            ctx.current_stencil_func(),
            Some(StencilFunc::new(StencilCompare::GreaterEqual, 128, 255))
        );
        assert_eq!(ctx.current_program(), None);
    }

    #[test]
    fn test_depth_bounds_follow_capability() {
        let mut fixture = Fixture::new();
        let light = fixture.light();
        let surface = fixture.shadow_surface(12, 6, 9);
        let frame = fixture.params();
        let records = build_shadow_list(std::slice::from_ref(&surface), &light, frame.settings);

        let backend = RecordingBackend::with_capabilities(BackendCapabilities { depth_bounds_test: true });
        let mut ctx = RenderContext::new(backend, fixture.cache.clone());
        submit_shadow_list(&mut ctx, &frame, &light, &records).unwrap();
        let calls = ctx.backend().calls();
        assert!(calls.contains(&BackendCall::DepthBoundsTest(true)));
        assert!(calls.contains(&BackendCall::DepthBounds(0.0, 1.0)));
        assert_eq!(calls.last(), Some(&BackendCall::Program(None)));

        let mut ctx = RenderContext::new(RecordingBackend::new(), FrameVertexCache::new());
        submit_shadow_list(&mut ctx, &frame, &light, &records).unwrap();
        assert!(!ctx.backend().calls().contains(&BackendCall::DepthBoundsTest(true)));
    }

    #[test]
    fn test_shadow_mapped_lights_skip_the_pass() {
        let mut fixture = Fixture::new();
        let mut light = fixture.light();
        light.shadow_mode = ShadowMode::ShadowMap(fixture.shadow_map_params());
        let surface = fixture.shadow_surface(12, 6, 9);
        let frame = fixture.params();
        let records = build_shadow_list(std::slice::from_ref(&surface), &light, frame.settings);
        let mut ctx = fixture.context();
        assert_eq!(submit_shadow_list(&mut ctx, &frame, &light, &records).unwrap(), 0);
        assert!(ctx.backend().calls().is_empty());
    }
}
