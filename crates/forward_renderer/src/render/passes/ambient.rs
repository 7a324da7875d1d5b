//! Ambient stage pass
//!
//! Draws every non-lighting stage of every visible material: decals, glows,
//! skies, reflections, particles and custom program stages. Stages are drawn
//! in surface sort order with their own blend state.
//!
//! Post-process materials read a copy of the frame. Building stops at the
//! first of them until the frame has been copied; the frame renderer copies
//! it after fog and builds the rest.

use crate::foundation::math::{constants, global_point_to_local, Mat4, TexMatrix, Vec2, Vec3, Vec4};
use crate::render::api::{CullType, GraphicsBackend, PolygonOffset, Uniform, VertexLayout};
use crate::render::material::{DepthBlendMode, MaterialStage, StageLighting, TexGen, VertexColorMode};
use crate::render::passes::{submit_records, DrawRecord, FrameParams, SpaceTracker};
use crate::render::resources::{ImageId, ProgramId, VertexCache};
use crate::render::state::{DstBlend, RenderContext, SrcBlend, StateBits};
use crate::render::RenderResult;
use crate::scene::Surface;

/// Parameter vectors and maps a custom stage may use
pub const MAX_CUSTOM_STAGE_SLOTS: usize = 4;

/// One ambient stage draw
#[derive(Debug, Clone)]
pub struct AmbientRecord<'a> {
    /// Surface drawn
    pub surface: &'a Surface,
    /// Program for the stage
    pub program: ProgramId,
    /// Blend, mask and depth state
    pub state: StateBits,
    /// Face culling
    pub cull: CullType,
    /// Polygon offset amount, `0` for none
    pub polygon_offset: f32,
    /// Vertex attributes the program reads
    pub layout: VertexLayout,
    /// View origin in surface space, `w = 1`
    pub local_view_origin: Vec4,
    /// Stage colour
    pub color: Vec4,
    /// Cube map coordinate transform
    pub texture_matrix: Mat4,
    /// Stage texture transform, `None` for identity
    pub bump_matrix: Option<TexMatrix>,
    /// Soft particle mode
    pub depth_blend_mode: DepthBlendMode,
    /// Soft particle fade distance
    pub depth_blend_range: f32,
    /// Custom stage parameters
    pub shader_parms: Vec<Vec4>,
    /// Images per texture unit; `None` leaves the unit alone
    pub textures: [Option<ImageId>; MAX_CUSTOM_STAGE_SLOTS],
    /// Vertex colour usage
    pub vertex_color: VertexColorMode,
}

/// Axes of the wobble sky frame at `time` seconds, before the spin
///
/// `degrees` tilts the sky away from vertical; `speed` is in tilt cycles per
/// minute.
pub fn wobble_sky_axes(degrees: f32, speed: f32, time: f32) -> [Vec3; 3] {
    let wobble = degrees * constants::DEG_TO_RAD;
    let speed = speed * constants::TWO_PI / 60.0;
    let a = time * speed;
    let s = a.sin() * wobble.sin();
    let c = a.cos() * wobble.sin();
    let z = wobble.cos();

    let axis2 = Vec3::new(c, s, z);
    let x = -(a * 2.0).sin() * wobble.sin();
    let z1 = -s * wobble.sin();
    let mut axis1 = Vec3::new(x, (1.0 - (x * x + z1 * z1)).sqrt(), z1);
    // exactly perpendicular to the tilt axis
    axis1 -= axis2 * axis2.dot(&axis1);
    axis1.normalize_mut();
    let axis0 = axis1.cross(&axis2);
    [axis0, axis1, axis2]
}

/// Cube map transform of a wobble sky: tilt plus a spin of `rotate` turns
/// per minute about the tilted axis
pub fn wobble_sky_matrix(degrees: f32, speed: f32, rotate: f32, time: f32) -> Mat4 {
    let [axis0, axis1, axis2] = wobble_sky_axes(degrees, speed, time);
    let spin = rotate * constants::TWO_PI / 60.0 * time;
    let (s, c) = spin.sin_cos();
    let row0 = axis0 * c + axis1 * s;
    let row1 = axis1 * c - axis0 * s;

    #[rustfmt::skip]
    let columns = [
        row0.x, row1.x, axis2.x, 0.0,
        row0.y, row1.y, axis2.y, 0.0,
        row0.z, row1.z, axis2.z, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    Mat4::from_column_slice(&columns)
}

/// Resolve an `Auto` depth blend mode from the stage blend factors
fn resolve_depth_blend(mode: DepthBlendMode, state: StateBits) -> DepthBlendMode {
    if mode != DepthBlendMode::Auto {
        return mode;
    }
    if state.blends(SrcBlend::One, DstBlend::One) {
        DepthBlendMode::ColorAlphaZero
    } else if state.blends(SrcBlend::DstColor, DstBlend::Zero) {
        DepthBlendMode::ColorAlphaOne
    } else {
        DepthBlendMode::Off
    }
}

/// Build ambient records for surfaces in sort order
///
/// Returns the records and the number of surfaces consumed. Unless
/// `render_copied` is set, consumption stops before the first post-process
/// surface.
pub fn build_stage_list<'a>(
    surfaces: &'a [Surface],
    frame: &FrameParams<'_>,
    render_copied: bool,
) -> (Vec<AmbientRecord<'a>>, usize) {
    let mut records = Vec::new();
    if frame.view.is_3d && frame.settings.skip_ambient {
        return (records, surfaces.len());
    }

    let mut consumed = 0;
    for surface in surfaces {
        let material = &surface.material;
        if material.is_post_process() && !render_copied {
            break;
        }
        consumed += 1;
        if material.suppress_in_subview {
            continue;
        }
        push_surface(&mut records, surface, frame);
    }
    log::trace!("Ambient list: {} records from {} surfaces", records.len(), consumed);
    (records, consumed)
}

fn push_surface<'a>(records: &mut Vec<AmbientRecord<'a>>, surface: &'a Surface, frame: &FrameParams<'_>) {
    let material = &surface.material;
    if !material.has_ambient() || material.portal_sky || surface.geometry.num_indexes == 0 {
        return;
    }
    if surface.ambient_cache().is_none() {
        return;
    }
    let registers = surface.registers.as_slice();
    let local_view_origin = global_point_to_local(&surface.space.model_matrix, &frame.view.view_origin).push(1.0);

    for stage in &material.stages {
        if !stage.is_enabled(registers) || stage.lighting != StageLighting::Ambient {
            continue;
        }
        // (ZERO, ONE) stages only write alpha masks
        if stage.draw_state.blends(SrcBlend::Zero, DstBlend::One) {
            continue;
        }
        let base = AmbientRecord {
            surface,
            program: ProgramId::default(),
            state: stage.draw_state,
            cull: material.cull,
            polygon_offset: material.polygon_offset_amount(),
            layout: VertexLayout::DrawPosColorTexOnly,
            local_view_origin,
            color: stage.evaluate_color(registers),
            texture_matrix: Mat4::identity(),
            bump_matrix: None,
            depth_blend_mode: DepthBlendMode::Off,
            depth_blend_range: 0.0,
            shader_parms: Vec::new(),
            textures: [None; MAX_CUSTOM_STAGE_SLOTS],
            vertex_color: stage.vertex_color,
        };
        let record = if stage.custom.is_some() {
            custom_stage(base, stage, registers, frame)
        } else {
            fixed_stage(base, stage, surface, frame)
        };
        records.extend(record);
    }
}

fn custom_stage<'a>(
    mut record: AmbientRecord<'a>,
    stage: &MaterialStage,
    registers: &[f32],
    frame: &FrameParams<'_>,
) -> Option<AmbientRecord<'a>> {
    if frame.settings.skip_custom_stages {
        return None;
    }
    let custom = stage.custom.as_ref()?;
    record.program = custom.program?;
    record.layout = VertexLayout::Draw;
    record.shader_parms = custom
        .parms
        .iter()
        .take(MAX_CUSTOM_STAGE_SLOTS)
        .map(|parm| Vec4::new(parm[0].eval(registers), parm[1].eval(registers), parm[2].eval(registers), parm[3].eval(registers)))
        .collect();
    for (unit, map) in custom.maps.iter().take(MAX_CUSTOM_STAGE_SLOTS).enumerate() {
        record.textures[unit] = *map;
    }
    Some(record)
}

fn fixed_stage<'a>(
    mut record: AmbientRecord<'a>,
    stage: &MaterialStage,
    surface: &Surface,
    frame: &FrameParams<'_>,
) -> Option<AmbientRecord<'a>> {
    let registers = surface.registers.as_slice();
    let color = record.color;
    // an add of black or a blend of nothing leaves the frame unchanged
    if stage.draw_state.blends(SrcBlend::One, DstBlend::One) && color.xyz().iter().all(|&c| c <= 0.0) {
        return None;
    }
    if stage.draw_state.blends(SrcBlend::SrcAlpha, DstBlend::OneMinusSrcAlpha) && color.w <= 0.0 {
        return None;
    }

    let programs = frame.programs;
    match stage.texture.texgen {
        TexGen::DiffuseCube | TexGen::Screen | TexGen::GlassWarp => return None,
        TexGen::SkyboxCube | TexGen::WobbleSkyCube => {
            record.program = programs.skybox?;
            if stage.texture.texgen == TexGen::WobbleSkyCube {
                let [degrees, speed, rotate] = surface.material.sky_registers.map(|register| register.eval(registers));
                record.texture_matrix = wobble_sky_matrix(degrees, speed, rotate, frame.view.float_time);
            }
            record.layout = VertexLayout::DrawPosColorOnly;
        }
        TexGen::ReflectCube => {
            record.program = programs.bumpy_environment?;
            match surface.material.bump_stage() {
                Some(bump) => {
                    record.bump_matrix = Some(bump.texture.matrix_or_identity(registers));
                    record.textures[2] = bump.texture.image;
                }
                None => record.textures[2] = Some(frame.images.flat_normal),
            }
            record.layout = VertexLayout::Draw;
        }
        TexGen::Explicit | TexGen::Screen2 => {
            let (mode, range) = if stage.depth_blend_mode == DepthBlendMode::Undefined {
                (surface.geometry.depth_blend_mode, surface.geometry.depth_blend_range)
            } else {
                (stage.depth_blend_mode, stage.depth_blend_range)
            };
            record.depth_blend_mode = resolve_depth_blend(mode, stage.draw_state);
            record.depth_blend_range = range;
            let soft = !matches!(record.depth_blend_mode, DepthBlendMode::Off | DepthBlendMode::Undefined) && range > 0.0;
            if soft {
                record.program = programs.depth_blend?;
                record.textures[2] = Some(frame.images.current_depth);
            } else {
                record.program = programs.default?;
            }
        }
    }

    if stage.private_polygon_offset != 0.0 {
        record.polygon_offset = stage.private_polygon_offset;
    }
    if let Some(image) = stage.texture.image {
        if let Some(matrix) = stage.texture.evaluate_matrix(registers) {
            record.bump_matrix = Some(matrix);
        }
        record.textures[1] = Some(image);
    }
    Some(record)
}

/// Tracking state of the ambient submitter
#[derive(Debug)]
pub struct AmbientCursor {
    program: Option<ProgramId>,
    space: SpaceTracker,
    vertex_color: Option<VertexColorMode>,
    bump_matrix: bool,
}

impl Default for AmbientCursor {
    fn default() -> Self {
        Self {
            program: None,
            space: SpaceTracker::default(),
            vertex_color: None,
            // unknown after a program switch, so the first record resets it
            bump_matrix: true,
        }
    }
}

impl AmbientCursor {
    fn switch_program<B: GraphicsBackend, V: VertexCache>(
        &mut self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        program: ProgramId,
    ) {
        let view = frame.view;
        ctx.use_program(Some(program));
        ctx.uniform(Uniform::ProjectionMatrix(view.projection_matrix));
        ctx.uniform(Uniform::ClipRange(view.near_clip, view.far_clip));
        let (width, height) = frame.image_table.upload_size(frame.images.current_render);
        ctx.uniform(Uniform::CurrentRenderSize {
            texture: Vec2::new(width as f32, height as f32),
            viewport: Vec2::new(view.viewport.width() as f32, view.viewport.height() as f32),
        });
        self.program = Some(program);
        self.space.invalidate();
        self.vertex_color = None;
        self.bump_matrix = true;
    }
}

impl DrawRecord for AmbientRecord<'_> {
    type Cursor = AmbientCursor;

    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut AmbientCursor,
    ) -> bool {
        let surface = self.surface;
        let Some(cache) = surface.geometry.ambient_cache else {
            return false;
        };
        if !ctx.bind_geometry(cache, self.layout) {
            return false;
        }
        if cursor.program != Some(self.program) {
            cursor.switch_program(ctx, frame, self.program);
        }
        cursor.space.enter(ctx, frame, &surface.space);
        frame.apply_scissor(ctx, &surface.scissor);

        ctx.set_cull(self.cull);
        if self.polygon_offset != 0.0 {
            ctx.set_polygon_offset(Some(PolygonOffset {
                factor: frame.settings.offset_factor,
                units: frame.settings.offset_units * self.polygon_offset,
            }));
        }

        match self.bump_matrix {
            Some(matrix) => {
                ctx.uniform(Uniform::BumpMatrix(matrix));
                ctx.uniform(Uniform::HasBumpMatrix(true));
                cursor.bump_matrix = true;
            }
            None if cursor.bump_matrix => {
                ctx.uniform(Uniform::BumpMatrix(TexMatrix::identity()));
                ctx.uniform(Uniform::HasBumpMatrix(false));
                cursor.bump_matrix = false;
            }
            None => {}
        }

        ctx.uniform(Uniform::LocalViewOrigin(self.local_view_origin));
        ctx.uniform(Uniform::DiffuseColor(self.color));
        ctx.uniform(Uniform::TextureMatrix(self.texture_matrix));
        ctx.uniform(Uniform::DepthBlendRange(self.depth_blend_range));
        ctx.uniform(Uniform::DepthBlendMode(self.depth_blend_mode.program_value()));
        for (slot, parm) in self.shader_parms.iter().enumerate() {
            ctx.uniform(Uniform::ShaderParm(slot, *parm));
        }

        if cursor.vertex_color != Some(self.vertex_color) {
            ctx.uniform(Uniform::ColorModulate(self.vertex_color.modulate()));
            ctx.uniform(Uniform::ColorAdd(self.vertex_color.add()));
            cursor.vertex_color = Some(self.vertex_color);
        }

        for (unit, image) in self.textures.iter().enumerate() {
            if image.is_some() {
                ctx.bind_texture(unit, *image);
            }
        }

        ctx.set_state(self.state);
        ctx.draw_elements(surface.geometry.num_indexes);

        if self.polygon_offset != 0.0 {
            ctx.set_polygon_offset(None);
        }
        true
    }
}

/// Draw an ambient stage list
pub fn submit_stage_list<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    records: &[AmbientRecord<'_>],
) -> RenderResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut cursor = AmbientCursor::default();
    let drawn = submit_records(ctx, frame, records, &mut cursor);

    cursor.space.finish(ctx, frame);
    frame.reset_scissor(ctx);
    ctx.use_program(None);
    log::trace!("Ambient pass: {} of {} stages drawn", drawn, records.len());
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::BackendCall;
    use crate::render::frame_tests::Fixture;
    use crate::render::material::{Material, Register, Sort};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn glow(fixture: &mut Fixture) -> Material {
        let image = fixture.image("glow");
        Material::new("glow").with_stage(
            MaterialStage::ambient(Some(image)).with_state(StateBits::blend(SrcBlend::One, DstBlend::One)),
        )
    }

    #[test]
    fn test_wobble_without_tilt_is_a_z_rotation() {
        let axes = wobble_sky_axes(0.0, 3.0, 7.5);
        assert_relative_eq!(axes[0], Vec3::x(), epsilon = 1e-6);
        assert_relative_eq!(axes[1], Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(axes[2], Vec3::z(), epsilon = 1e-6);

        // 15 turns per minute is a quarter turn per second
        let matrix = wobble_sky_matrix(0.0, 3.0, 15.0, 1.0);
        let expected = Mat4::new_rotation(Vec3::z() * -std::f32::consts::FRAC_PI_2);
        assert_relative_eq!(matrix, expected, epsilon = 1e-6);
        assert_relative_eq!(matrix[(2, 2)], 1.0);
    }

    #[test]
    fn test_wobble_axes_are_orthonormal() {
        let [x, y, z] = wobble_sky_axes(10.0, 2.0, 3.3);
        assert_relative_eq!(x.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(y.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(z.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(x.dot(&y), 0.0, epsilon = 1e-5);
        assert_relative_eq!(y.dot(&z), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_identical_records_mutate_state_once() {
        let mut fixture = Fixture::new();
        let material = Arc::new(glow(&mut fixture));
        let surface = fixture.surface(material, 6);
        let surfaces = vec![surface.clone(), surface];
        let frame = fixture.params();
        let (records, consumed) = build_stage_list(&surfaces, &frame, false);
        assert_eq!((records.len(), consumed), (2, 2));

        let mut ctx = fixture.context();
        assert_eq!(submit_stage_list(&mut ctx, &frame, &records).unwrap(), 2);
        let calls = ctx.backend().calls();
        let draws: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, BackendCall::Draw(_)))
            .map(|(index, _)| index)
            .collect();
        assert_eq!(draws.len(), 2);
        let between = &calls[draws[0] + 1..draws[1]];
        assert!(between.iter().all(|call| !call.is_state_change()));
    }

    #[test]
    fn test_invisible_stages_are_skipped() {
        let mut fixture = Fixture::new();
        let image = fixture.image("mask");
        let material = Material::new("mixed")
            .with_stage(MaterialStage::ambient(Some(image)).with_state(StateBits::blend(SrcBlend::Zero, DstBlend::One)))
            .with_stage(
                MaterialStage::ambient(Some(image))
                    .with_state(StateBits::blend(SrcBlend::One, DstBlend::One))
                    .with_constant_color(0.0, 0.0, 0.0, 1.0),
            )
            .with_stage(
                MaterialStage::ambient(Some(image))
                    .with_state(StateBits::blend(SrcBlend::SrcAlpha, DstBlend::OneMinusSrcAlpha))
                    .with_constant_color(1.0, 1.0, 1.0, 0.0),
            )
            .with_stage(MaterialStage::ambient(Some(image)).with_texgen(TexGen::Screen))
            .with_stage(MaterialStage::ambient(Some(image)).with_texgen(TexGen::DiffuseCube))
            .with_stage(MaterialStage::diffuse(image))
            .with_stage(MaterialStage::ambient(Some(image)).with_condition(Register::ZERO))
            .with_stage(MaterialStage::ambient(Some(image)));
        let surface = fixture.surface(Arc::new(material), 6);
        let (records, _) = build_stage_list(std::slice::from_ref(&surface), &fixture.params(), false);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].textures[1], Some(image));
        assert_eq!(Some(records[0].program), fixture.programs.default);
    }

    #[test]
    fn test_build_stops_before_post_process_until_copied() {
        let mut fixture = Fixture::new();
        let material = glow(&mut fixture);
        let post = Arc::new(material.clone().with_sort(Sort::POST_PROCESS));
        let surfaces = vec![
            fixture.surface(Arc::new(material), 6),
            fixture.surface(post.clone(), 6),
            fixture.surface(post, 6),
        ];
        let frame = fixture.params();
        let (records, consumed) = build_stage_list(&surfaces, &frame, false);
        assert_eq!((records.len(), consumed), (1, 1));
        let (records, consumed) = build_stage_list(&surfaces[consumed..], &frame, true);
        assert_eq!((records.len(), consumed), (2, 2));
    }

    #[test]
    fn test_suppressed_surfaces_draw_nothing_in_the_main_view() {
        let mut fixture = Fixture::new();
        let mut suppressed = glow(&mut fixture);
        suppressed.suppress_in_subview = true;
        let first = fixture.surface(Arc::new(suppressed), 6);
        let second = glow(&mut fixture);
        let surfaces = vec![first, fixture.surface(Arc::new(second), 6)];
        let (records, consumed) = build_stage_list(&surfaces, &fixture.params(), false);
        assert_eq!((records.len(), consumed), (1, 2));
        assert!(!records[0].surface.material.suppress_in_subview);
    }

    #[test]
    fn test_auto_depth_blend_resolution() {
        let additive = StateBits::blend(SrcBlend::One, DstBlend::One);
        let modulate = StateBits::blend(SrcBlend::DstColor, DstBlend::Zero);
        let alpha = StateBits::blend(SrcBlend::SrcAlpha, DstBlend::OneMinusSrcAlpha);
        assert_eq!(resolve_depth_blend(DepthBlendMode::Auto, additive), DepthBlendMode::ColorAlphaZero);
        assert_eq!(resolve_depth_blend(DepthBlendMode::Auto, modulate), DepthBlendMode::ColorAlphaOne);
        assert_eq!(resolve_depth_blend(DepthBlendMode::Auto, alpha), DepthBlendMode::Off);
        assert_eq!(resolve_depth_blend(DepthBlendMode::AlphaOne, additive), DepthBlendMode::AlphaOne);
    }

    #[test]
    fn test_soft_particles_use_depth_blend_program() {
        let mut fixture = Fixture::new();
        let image = fixture.image("smoke");
        let stage = MaterialStage::ambient(Some(image))
            .with_state(StateBits::blend(SrcBlend::One, DstBlend::One))
            .with_depth_blend(DepthBlendMode::Auto, 8.0);
        let surface = fixture.surface(Arc::new(Material::new("smoke").with_stage(stage)), 6);
        let frame = fixture.params();
        let (records, _) = build_stage_list(std::slice::from_ref(&surface), &frame, false);
        assert_eq!(Some(records[0].program), frame.programs.depth_blend);
        assert_eq!(records[0].depth_blend_mode, DepthBlendMode::ColorAlphaZero);
        assert_eq!(records[0].textures[2], Some(frame.images.current_depth));
    }

    #[test]
    fn test_reflection_uses_bump_stage() {
        let mut fixture = Fixture::new();
        let cube = fixture.image("env");
        let normal = fixture.image("wall_local");
        let material = Material::new("chrome")
            .with_stage(MaterialStage::bump(normal))
            .with_stage(MaterialStage::ambient(Some(cube)).with_texgen(TexGen::ReflectCube));
        let surface = fixture.surface(Arc::new(material), 6);
        let frame = fixture.params();
        let (records, _) = build_stage_list(std::slice::from_ref(&surface), &frame, false);
        assert_eq!(Some(records[0].program), frame.programs.bumpy_environment);
        assert_eq!(records[0].textures[2], Some(normal));
        assert_eq!(records[0].layout, VertexLayout::Draw);
    }

    #[test]
    fn test_custom_stage_parms_are_capped_and_uploaded() {
        let mut fixture = Fixture::new();
        let program = fixture.program("heathaze");
        let image = fixture.image("haze");
        let stage = (0..6).fold(MaterialStage::custom(Some(program)), |stage, i| {
            stage
                .with_shader_parm([Register::Constant(i as f32); 4])
                .with_shader_map(Some(image))
        });
        let surface = fixture.surface(Arc::new(Material::new("haze").with_stage(stage)), 6);
        let frame = fixture.params();
        let (records, _) = build_stage_list(std::slice::from_ref(&surface), &frame, false);
        assert_eq!(records[0].shader_parms.len(), 4);
        assert!(records[0].textures.iter().all(|map| *map == Some(image)));

        let mut ctx = fixture.context();
        submit_stage_list(&mut ctx, &frame, &records).unwrap();
        let parms = ctx
            .backend()
            .uniforms()
            .filter(|uniform| matches!(uniform, Uniform::ShaderParm(..)))
            .count();
        assert_eq!(parms, 4);

        fixture.settings.skip_custom_stages = true;
        let (records, _) = build_stage_list(std::slice::from_ref(&surface), &fixture.params(), false);
        assert!(records.is_empty());
    }

    #[test]
    fn test_custom_stage_without_program_is_skipped() {
        let mut fixture = Fixture::new();
        let surface = fixture.surface(Arc::new(Material::new("broken").with_stage(MaterialStage::custom(None))), 6);
        let (records, _) = build_stage_list(std::slice::from_ref(&surface), &fixture.params(), false);
        assert!(records.is_empty());
    }

    #[test]
    fn test_program_switch_reuploads_view_uniforms() {
        let mut fixture = Fixture::new();
        let image = fixture.image("sky");
        let sky = Material::new("sky")
            .with_stage(MaterialStage::ambient(Some(image)).with_texgen(TexGen::SkyboxCube));
        let glow = glow(&mut fixture);
        let surfaces = vec![
            fixture.surface(Arc::new(sky), 6),
            fixture.surface(Arc::new(glow), 6),
        ];
        let frame = fixture.params();
        let (records, _) = build_stage_list(&surfaces, &frame, false);
        assert_eq!(records[0].layout, VertexLayout::DrawPosColorOnly);
        assert_eq!(records[0].texture_matrix, Mat4::identity());

        let mut ctx = fixture.context();
        submit_stage_list(&mut ctx, &frame, &records).unwrap();
        let clip_ranges = ctx
            .backend()
            .uniforms()
            .filter(|uniform| matches!(uniform, Uniform::ClipRange(..)))
            .count();
        assert_eq!(clip_ranges, 2);
    }
}
