//! Fog and blend lights
//!
//! Neither kind interacts with surface materials. Fog lights darken surfaces
//! inside their volume toward the fog colour by distance from the viewer;
//! blend lights modulate or add their projected image straight onto the
//! surfaces they touch.

use crate::foundation::math::{global_plane_to_local, Mat4, Plane, TexMatrix, Vec4};
use crate::render::api::{CullType, GraphicsBackend, Uniform, VertexLayout};
use crate::render::passes::{submit_records, DrawRecord, FrameParams, SpaceTracker};
use crate::render::resources::VertexCache;
use crate::render::state::{DepthFunc, DstBlend, RenderContext, SrcBlend, StateBits};
use crate::render::RenderResult;
use crate::scene::{Surface, ViewDef, ViewLight};

/// Fog distance used when the fog colour alpha is left at its default
pub const DEFAULT_FOG_DISTANCE: f32 = 500.0;

/// Fog-enter texture coordinate of the fog plane
pub const FOG_ENTER: f32 = (64.0 + 1.0) / (64.0 * 2.0);

/// Distance over which fog reaches full density
pub fn fog_distance(alpha: f32) -> f32 {
    if alpha <= 1.0 {
        DEFAULT_FOG_DISTANCE
    } else {
        alpha
    }
}

/// World-space fog texgen planes: density S, density T, enter plane and
/// enter S
///
/// Density follows eye depth; the enter correction fades surfaces near the
/// fog plane when the viewer is outside the volume.
pub fn global_fog_planes(view: &ViewDef, light: &ViewLight, alpha: f32) -> [Plane; 4] {
    let a = -0.5 / fog_distance(alpha);
    let model_view = &view.world_space.model_view_matrix;
    let depth = model_view.row(2).transpose() * a;
    let side = model_view.row(0).transpose() * a;
    let enter = light.fog_plane * 0.001;
    let s = view.view_origin.dot(&enter.xyz()) + enter.w;
    [depth, side, enter, Vec4::new(0.0, 0.0, 0.0, FOG_ENTER + s)]
}

/// One fogged surface
#[derive(Debug, Clone)]
pub struct FogRecord<'a> {
    /// Surface inside the fog volume
    pub surface: &'a Surface,
    /// Density S/T and enter S/T planes in surface space
    pub planes: [Plane; 4],
}

impl<'a> FogRecord<'a> {
    /// Fog `surface` with the given world-space fog planes
    pub fn new(surface: &'a Surface, global: &[Plane; 4]) -> Self {
        let model = &surface.space.model_matrix;
        let mut density_s = global_plane_to_local(model, &global[0]);
        density_s.w += 0.5;
        let density_t = Vec4::new(0.0, 0.0, 0.0, 0.5);
        let enter_s = global_plane_to_local(model, &global[3]);
        let mut enter_t = global_plane_to_local(model, &global[2]);
        enter_t.w += FOG_ENTER;
        Self {
            surface,
            planes: [density_s, density_t, enter_s, enter_t],
        }
    }
}

impl DrawRecord for FogRecord<'_> {
    type Cursor = SpaceTracker;

    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut SpaceTracker,
    ) -> bool {
        let surface = self.surface;
        let Some(cache) = surface.geometry.ambient_cache else {
            return false;
        };
        if !ctx.bind_geometry(cache, VertexLayout::DrawPosOnly) {
            return false;
        }
        if cursor.enter(ctx, frame, &surface.space) {
            ctx.uniform(Uniform::FogPlanes(self.planes));
        }
        frame.apply_scissor(ctx, &surface.scissor);
        ctx.draw_elements(surface.geometry.num_indexes);
        true
    }
}

/// Draw one fog light over its interaction chains and its own frustum
pub fn submit_fog_light<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    light: &ViewLight,
) -> RenderResult<usize> {
    let program = frame.require_program(frame.programs.fog_light, "fog light")?;
    let view = frame.view;

    // the frustum was never cached, most likely out of vertex memory
    let Some(frustum) = light.frustum_tris.as_ref().filter(|tris| tris.ambient_cache.is_some()) else {
        log::debug!("Fog light '{}' has no frustum geometry, skipping", light.shader.name);
        return Ok(0);
    };
    // fog shaders have a single stage
    let Some(stage) = light.shader.stages.first() else {
        return Ok(0);
    };
    let color = stage.evaluate_color(&light.registers);
    let global = global_fog_planes(view, light, color.w);

    ctx.use_program(Some(program));
    ctx.uniform(Uniform::ProjectionMatrix(view.projection_matrix));
    ctx.uniform(Uniform::DiffuseColor(color));
    ctx.bind_texture(0, Some(frame.images.fog));
    ctx.bind_texture(1, Some(frame.images.fog_enter));

    let blend = StateBits::DEPTHMASK | StateBits::blend(SrcBlend::SrcAlpha, DstBlend::OneMinusSrcAlpha);
    ctx.force_next_state();
    ctx.set_state(blend | DepthFunc::Equal.bits());

    let records: Vec<_> = light
        .global_interactions
        .iter()
        .chain(&light.local_interactions)
        .map(|surface| FogRecord::new(surface, &global))
        .collect();
    let mut cursor = SpaceTracker::default();
    let mut drawn = submit_records(ctx, frame, &records, &mut cursor);

    // frustum planes are not in the depth buffer
    let frustum_surface = Surface::new(
        frustum.clone(),
        light.shader.clone(),
        view.world_space.clone(),
        view.scissor,
    );
    ctx.set_state(blend | DepthFunc::Less.bits());
    ctx.set_cull(CullType::BackSided);
    if FogRecord::new(&frustum_surface, &global).emit(ctx, frame, &mut cursor) {
        drawn += 1;
    }
    ctx.set_cull(CullType::FrontSided);

    cursor.finish(ctx, frame);
    ctx.bind_texture(1, None);
    ctx.use_program(None);
    log::trace!("Fog light '{}': {} draws", light.shader.name, drawn);
    Ok(drawn)
}

/// One surface under a blend light
#[derive(Debug, Clone)]
pub struct BlendLightRecord<'a> {
    /// Surface touched by the light
    pub surface: &'a Surface,
    /// Light S, T, Q and falloff planes in surface space
    pub light_projection: [Plane; 4],
}

impl<'a> BlendLightRecord<'a> {
    /// Project `light` onto `surface`
    pub fn new(surface: &'a Surface, light: &ViewLight) -> Self {
        let model = &surface.space.model_matrix;
        Self {
            surface,
            light_projection: light.light_project.map(|plane| global_plane_to_local(model, &plane)),
        }
    }
}

impl DrawRecord for BlendLightRecord<'_> {
    type Cursor = SpaceTracker;

    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut SpaceTracker,
    ) -> bool {
        let geometry = &self.surface.geometry;
        // blend lights also land on shadow-only geometry
        let bound = match (geometry.ambient_cache, geometry.shadow_cache) {
            (Some(cache), _) => ctx.bind_geometry(cache, VertexLayout::DrawPosOnly),
            (None, Some(cache)) => ctx.bind_geometry(cache, VertexLayout::Shadow),
            (None, None) => false,
        };
        if !bound {
            return false;
        }
        if cursor.enter(ctx, frame, &self.surface.space) {
            let [s, t, q, falloff] = self.light_projection;
            ctx.uniform(Uniform::BumpMatrix(TexMatrix::from_rows(s, t)));
            ctx.uniform(Uniform::SpecularMatrix(TexMatrix::from_rows(q, Vec4::zeros())));
            ctx.uniform(Uniform::DiffuseMatrix(TexMatrix::from_rows(falloff, Vec4::zeros())));
        }
        frame.apply_scissor(ctx, &self.surface.scissor);
        ctx.draw_elements(geometry.num_indexes);
        true
    }
}

/// Draw one blend light over its interaction chains, once per enabled stage
pub fn submit_blend_light<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    light: &ViewLight,
) -> RenderResult<usize> {
    if frame.settings.skip_blend_lights || (light.global_interactions.is_empty() && light.local_interactions.is_empty()) {
        return Ok(0);
    }
    let program = frame.require_program(frame.programs.blend_light, "blend light")?;
    let registers = light.registers.as_slice();

    let records: Vec<_> = light
        .global_interactions
        .iter()
        .chain(&light.local_interactions)
        .map(|surface| BlendLightRecord::new(surface, light))
        .collect();

    ctx.use_program(Some(program));
    ctx.uniform(Uniform::ProjectionMatrix(frame.view.projection_matrix));
    ctx.bind_texture(1, Some(light.falloff_image));

    let mut drawn = 0;
    for stage in &light.shader.stages {
        if !stage.is_enabled(registers) {
            continue;
        }
        ctx.set_state((StateBits::DEPTHMASK | stage.draw_state).with_depth_func(DepthFunc::Equal));
        ctx.bind_texture(0, Some(stage.texture.image.unwrap_or(frame.images.white)));
        let matrix = stage.texture.evaluate_matrix(registers);
        if let Some(matrix) = matrix {
            ctx.uniform(Uniform::TextureMatrix(matrix.to_mat4()));
        }
        // light colour including alpha, unlike normal lights
        ctx.uniform(Uniform::DiffuseColor(stage.evaluate_color(registers)));

        let mut cursor = SpaceTracker::default();
        drawn += submit_records(ctx, frame, &records, &mut cursor);
        cursor.finish(ctx, frame);

        if matrix.is_some() {
            ctx.uniform(Uniform::TextureMatrix(Mat4::identity()));
        }
    }
    ctx.use_program(None);
    log::trace!("Blend light '{}': {} draws", light.shader.name, drawn);
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::BackendCall;
    use crate::foundation::math::Vec3;
    use crate::render::frame_tests::Fixture;
    use crate::render::material::{LightKind, Material, MaterialStage, Register};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn fog_light(fixture: &mut Fixture, alpha: f32) -> ViewLight {
        let mut light = fixture.light();
        light.shader = Arc::new(
            Material::new("fog")
                .with_light_kind(LightKind::Fog)
                .with_stage(MaterialStage::ambient(None).with_constant_color(0.5, 0.5, 0.5, alpha)),
        );
        light.frustum_tris = Some(fixture.geometry(36));
        light
    }

    #[test]
    fn test_fog_distance_defaults_for_small_alpha() {
        assert_relative_eq!(fog_distance(1.0), 500.0);
        assert_relative_eq!(fog_distance(0.2), 500.0);
        assert_relative_eq!(fog_distance(750.0), 750.0);
        assert_relative_eq!(FOG_ENTER, 65.0 / 128.0);
    }

    #[test]
    fn test_fog_enter_plane_follows_view_origin() {
        let mut fixture = Fixture::new();
        fixture.view.view_origin = Vec3::new(0.0, 0.0, 200.0);
        let mut light = fog_light(&mut fixture, 1.0);
        light.fog_plane = Vec4::new(0.0, 0.0, 1.0, -100.0);
        let planes = global_fog_planes(&fixture.view, &light, 1.0);
        assert_relative_eq!(planes[2], Vec4::new(0.0, 0.0, 0.001, -0.1));
        // viewer 100 units above the fog plane
        assert_relative_eq!(planes[3].w, FOG_ENTER + 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_fog_draws_chains_then_frustum() {
        let mut fixture = Fixture::new();
        let mut light = fog_light(&mut fixture, 1.0);
        let wall = Arc::new(Material::new("wall").with_stage(MaterialStage::ambient(None)));
        light.global_interactions.push(fixture.surface(wall.clone(), 12));
        light.local_interactions.push(fixture.surface(wall, 6));
        let frame = fixture.params();
        let mut ctx = fixture.context();
        assert_eq!(submit_fog_light(&mut ctx, &frame, &light).unwrap(), 3);
        assert_eq!(ctx.backend().draws(), vec![12, 6, 36]);

        let calls = ctx.backend().calls();
        let last_draw = calls.iter().rposition(|call| matches!(call, BackendCall::Draw(_))).unwrap();
        assert!(calls[..last_draw].contains(&BackendCall::Cull(CullType::BackSided)));
        assert_eq!(calls[last_draw + 1], BackendCall::Cull(CullType::FrontSided));
    }

    #[test]
    fn test_fog_without_frustum_is_skipped() {
        let mut fixture = Fixture::new();
        let mut light = fog_light(&mut fixture, 1.0);
        light.frustum_tris = None;
        let frame = fixture.params();
        let mut ctx = fixture.context();
        assert_eq!(submit_fog_light(&mut ctx, &frame, &light).unwrap(), 0);
        assert!(ctx.backend().draws().is_empty());
    }

    #[test]
    fn test_blend_light_draws_once_per_enabled_stage() {
        let mut fixture = Fixture::new();
        let mut light = fixture.light();
        let image = fixture.image("caustics");
        light.shader = Arc::new(
            Material::new("caustics")
                .with_light_kind(LightKind::Blend)
                .with_stage(
                    MaterialStage::ambient(Some(image)).with_state(StateBits::blend(SrcBlend::DstColor, DstBlend::Zero)),
                )
                .with_stage(MaterialStage::ambient(Some(image)).with_condition(Register::ZERO))
                .with_stage(MaterialStage::ambient(Some(image)).with_matrix([
                    [Register::ONE, Register::ZERO, Register::Constant(0.25)],
                    [Register::ZERO, Register::ONE, Register::ZERO],
                ])),
        );
        let wall = Arc::new(Material::new("wall").with_stage(MaterialStage::ambient(None)));
        light.global_interactions.push(fixture.surface(wall, 6));
        let frame = fixture.params();
        let mut ctx = fixture.context();
        assert_eq!(submit_blend_light(&mut ctx, &frame, &light).unwrap(), 2);

        let texture_matrices = ctx
            .backend()
            .uniforms()
            .filter(|uniform| matches!(uniform, Uniform::TextureMatrix(_)))
            .count();
        assert_eq!(texture_matrices, 2);

        fixture.settings.skip_blend_lights = true;
        let mut ctx = fixture.context();
        assert_eq!(submit_blend_light(&mut ctx, &fixture.params(), &light).unwrap(), 0);
    }
}
