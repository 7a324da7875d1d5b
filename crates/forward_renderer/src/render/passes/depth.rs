//! Depth pre-pass
//!
//! Fills the depth buffer (and seeds the stencil buffer) before any light is
//! drawn so that interactions can use an `EQUAL` depth test.
//!
//! Translucent surfaces never take part. Perforated surfaces draw one
//! alpha-tested record per enabled alpha-test stage, or a single solid
//! record when none of their alpha-test stages is enabled. Subview materials
//! darken what is behind them instead of drawing black.

use crate::foundation::math::{TexMatrix, Vec4};
use crate::render::api::{
    GraphicsBackend, PolygonOffset, StencilCompare, StencilFunc, Uniform, VertexLayout,
};
use crate::render::material::Coverage;
use crate::render::passes::{submit_records, DrawRecord, FrameParams, SpaceTracker};
use crate::render::resources::{ImageId, VertexCache};
use crate::render::state::{DepthFunc, DstBlend, RenderContext, SrcBlend, StateBits};
use crate::render::RenderResult;
use crate::scene::Surface;

/// Alpha test parameters of a perforated depth draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaTest {
    /// Image whose alpha is tested
    pub image: ImageId,
    /// Fragments with alpha below this are discarded
    pub threshold: f32,
    /// Texture coordinate transform
    pub matrix: TexMatrix,
}

/// One depth draw
#[derive(Debug, Clone, Copy)]
pub struct DepthRecord<'a> {
    /// Surface drawn
    pub surface: &'a Surface,
    /// Polygon offset amount, `0` for none
    pub polygon_offset: f32,
    /// Output colour; alpha carries the stage alpha for alpha-tested draws
    pub color: Vec4,
    /// Draw with the subview darkening blend
    pub subview: bool,
    /// Alpha test, `None` for solid draws
    pub alpha_test: Option<AlphaTest>,
}

impl DepthRecord<'_> {
    /// Whether this is a solid, untextured draw
    pub const fn is_solid(&self) -> bool {
        self.alpha_test.is_none()
    }
}

/// Build the depth records for a frame's surfaces
pub fn build_depth_list<'a>(surfaces: &'a [Surface], frame: &FrameParams<'_>) -> Vec<DepthRecord<'a>> {
    let mut records = Vec::with_capacity(surfaces.len());
    for surface in surfaces {
        push_surface(&mut records, surface, frame);
    }
    log::trace!("Depth list: {} records from {} surfaces", records.len(), surfaces.len());
    records
}

fn push_surface<'a>(records: &mut Vec<DepthRecord<'a>>, surface: &'a Surface, frame: &FrameParams<'_>) {
    let material = &surface.material;
    let registers = surface.registers.as_slice();

    if !material.is_drawn() || surface.geometry.num_indexes == 0 {
        return;
    }
    // translucent surfaces must not touch depth or mirror clipping breaks
    if material.coverage == Coverage::Translucent {
        return;
    }
    if surface.ambient_cache().is_none() {
        return;
    }
    if !material.stages.iter().any(|stage| stage.is_enabled(registers)) {
        return;
    }

    let subview = material.is_subview();
    let base_color = if subview {
        let darken = 1.0 / frame.settings.overbright;
        Vec4::new(darken, darken, darken, 1.0)
    } else {
        Vec4::new(0.0, 0.0, 0.0, 1.0)
    };
    let material_offset = material.polygon_offset_amount();
    let solid = DepthRecord {
        surface,
        polygon_offset: material_offset,
        color: base_color,
        subview,
        alpha_test: None,
    };

    if material.coverage != Coverage::Perforated {
        records.push(solid);
        return;
    }

    let mut tried_alpha_test = false;
    for stage in &material.stages {
        let Some(threshold) = stage.alpha_test else {
            continue;
        };
        if !stage.is_enabled(registers) {
            continue;
        }
        // an enabled alpha-test stage replaces the solid draw even if its
        // alpha turns out to be zero
        tried_alpha_test = true;

        let alpha = stage.color[3].eval(registers);
        if alpha <= 0.0 {
            continue;
        }
        let polygon_offset = if stage.private_polygon_offset != 0.0 && material.polygon_offset.is_none() {
            stage.private_polygon_offset
        } else {
            material_offset
        };
        records.push(DepthRecord {
            polygon_offset,
            color: Vec4::new(base_color.x, base_color.y, base_color.z, alpha),
            alpha_test: Some(AlphaTest {
                image: stage.texture.image.unwrap_or(frame.images.default_image),
                threshold: threshold.eval(registers),
                matrix: stage.texture.matrix_or_identity(registers),
            }),
            ..solid
        });
    }

    if !tried_alpha_test {
        records.push(solid);
    }
}

/// Tracking state of the depth submitter
#[derive(Debug, Default)]
pub struct DepthCursor {
    space: SpaceTracker,
    color: Option<Vec4>,
    alpha_test: bool,
}

impl DrawRecord for DepthRecord<'_> {
    type Cursor = DepthCursor;

    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut DepthCursor,
    ) -> bool {
        let surface = self.surface;
        let Some(cache) = surface.geometry.ambient_cache else {
            return false;
        };
        if !ctx.bind_geometry(cache, VertexLayout::Draw) {
            return false;
        }

        cursor.space.enter(ctx, frame, &surface.space);
        frame.apply_scissor(ctx, &surface.scissor);

        if self.polygon_offset != 0.0 {
            ctx.set_polygon_offset(Some(PolygonOffset {
                factor: frame.settings.offset_factor,
                units: frame.settings.offset_units * self.polygon_offset,
            }));
        }
        if self.subview {
            ctx.set_state(StateBits::blend(SrcBlend::DstColor, DstBlend::Zero) | DepthFunc::Less.bits());
        }
        if cursor.color != Some(self.color) {
            ctx.uniform(Uniform::DiffuseColor(self.color));
            cursor.color = Some(self.color);
        }

        match &self.alpha_test {
            Some(alpha_test) => {
                ctx.bind_texture(0, Some(alpha_test.image));
                if !cursor.alpha_test {
                    ctx.uniform(Uniform::AlphaTestEnabled(true));
                    cursor.alpha_test = true;
                }
                ctx.uniform(Uniform::AlphaTestThreshold(alpha_test.threshold));
                ctx.uniform(Uniform::TextureMatrix(alpha_test.matrix.to_mat4()));
            }
            None => {
                if cursor.alpha_test {
                    ctx.bind_texture(0, Some(frame.images.white));
                    ctx.uniform(Uniform::AlphaTestEnabled(false));
                    cursor.alpha_test = false;
                }
            }
        }

        ctx.draw_elements(surface.geometry.num_indexes);

        // never let offset or the subview blend leak into the next record
        if self.polygon_offset != 0.0 {
            ctx.set_polygon_offset(None);
        }
        if self.subview {
            ctx.set_state(DepthFunc::Less.bits());
        }
        true
    }
}

/// Draw a depth list; 2D views have no depth pre-pass
pub fn submit_depth_list<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    records: &[DepthRecord<'_>],
) -> RenderResult<usize> {
    if !frame.view.is_3d {
        return Ok(0);
    }
    let program = frame.require_program(frame.programs.depth, "depth")?;

    // mirrors clip with an alpha notch texture on unit 1
    if frame.view.clip_plane.is_some() {
        ctx.bind_texture(1, Some(frame.images.alpha_notch));
    }
    ctx.set_state(DepthFunc::Less.bits());
    // seed the stencil buffer everywhere depth is written
    ctx.set_stencil_test(true);
    ctx.set_stencil_func(StencilFunc::new(StencilCompare::Always, 1, 255));
    ctx.use_program(Some(program));
    ctx.uniform(Uniform::ProjectionMatrix(frame.view.projection_matrix));
    ctx.uniform(Uniform::AlphaTestEnabled(false));
    ctx.bind_texture(0, Some(frame.images.white));
    frame.reset_scissor(ctx);

    let mut cursor = DepthCursor::default();
    let drawn = submit_records(ctx, frame, records, &mut cursor);

    cursor.space.finish(ctx, frame);
    if cursor.alpha_test {
        ctx.uniform(Uniform::AlphaTestEnabled(false));
    }
    frame.reset_scissor(ctx);
    ctx.use_program(None);
    log::trace!("Depth pass: {} of {} records drawn", drawn, records.len());
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::BackendCall;
    use crate::render::frame_tests::Fixture;
    use crate::render::material::{Material, MaterialStage, Register, Sort};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn perforated(stages: Vec<MaterialStage>) -> Material {
        stages
            .into_iter()
            .fold(Material::new("grate").with_coverage(Coverage::Perforated), Material::with_stage)
    }

    #[test]
    fn test_translucent_surfaces_emit_nothing() {
        let mut fixture = Fixture::new();
        let glass = Material::new("glass")
            .with_coverage(Coverage::Translucent)
            .with_stage(MaterialStage::ambient(None));
        let surface = fixture.surface(Arc::new(glass), 36);
        let records = build_depth_list(std::slice::from_ref(&surface), &fixture.params());
        assert!(records.is_empty());
    }

    #[test]
    fn test_undrawn_and_empty_surfaces_are_rejected() {
        let mut fixture = Fixture::new();
        let empty_material = fixture.surface(Arc::new(Material::new("nodraw")), 36);
        let no_indexes = fixture.surface(Arc::new(Material::new("wall").with_stage(MaterialStage::ambient(None))), 0);
        let disabled = fixture.surface(
            Arc::new(Material::new("off").with_stage(MaterialStage::ambient(None).with_condition(Register::ZERO))),
            36,
        );
        let surfaces = vec![empty_material, no_indexes, disabled];
        assert!(build_depth_list(&surfaces, &fixture.params()).is_empty());
    }

    #[test]
    fn test_perforated_with_disabled_alpha_stages_falls_back_to_solid() {
        let mut fixture = Fixture::new();
        let image = fixture.image("grate_d");
        let material = perforated(vec![
            MaterialStage::diffuse(image)
                .with_alpha_test(Register::Constant(0.5))
                .with_condition(Register::Slot(0)),
            MaterialStage::ambient(Some(image)),
        ]);
        let surface = fixture.surface(Arc::new(material), 12).with_registers(vec![0.0]);
        let records = build_depth_list(std::slice::from_ref(&surface), &fixture.params());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_solid());
        assert_relative_eq!(records[0].color, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_perforated_emits_one_record_per_enabled_alpha_stage() {
        let mut fixture = Fixture::new();
        let image = fixture.image("grate_d");
        let material = perforated(vec![
            MaterialStage::diffuse(image)
                .with_alpha_test(Register::Slot(1))
                .with_private_polygon_offset(2.0),
            MaterialStage::ambient(Some(image)).with_alpha_test(Register::Constant(0.25)),
        ]);
        let surface = fixture.surface(Arc::new(material), 12).with_registers(vec![1.0, 0.75]);
        let records = build_depth_list(std::slice::from_ref(&surface), &fixture.params());
        assert_eq!(records.len(), 2);
        let first = records[0].alpha_test.unwrap();
        assert_eq!(first.image, image);
        assert_relative_eq!(first.threshold, 0.75);
        assert_relative_eq!(records[0].polygon_offset, 2.0);
        assert_relative_eq!(records[1].polygon_offset, 0.0);
    }

    #[test]
    fn test_zero_alpha_stage_counts_as_tried() {
        let mut fixture = Fixture::new();
        let image = fixture.image("grate_d");
        let material = perforated(vec![MaterialStage::diffuse(image)
            .with_alpha_test(Register::Constant(0.5))
            .with_constant_color(1.0, 1.0, 1.0, 0.0)]);
        let surface = fixture.surface(Arc::new(material), 12);
        assert!(build_depth_list(std::slice::from_ref(&surface), &fixture.params()).is_empty());
    }

    #[test]
    fn test_subview_darkens_by_overbright() {
        let mut fixture = Fixture::new();
        fixture.settings.overbright = 2.0;
        let mirror = Material::new("mirror")
            .with_sort(Sort::SUBVIEW)
            .with_stage(MaterialStage::ambient(None));
        let surface = fixture.surface(Arc::new(mirror), 6);
        let records = build_depth_list(std::slice::from_ref(&surface), &fixture.params());
        assert!(records[0].subview);
        assert_relative_eq!(records[0].color, Vec4::new(0.5, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_polygon_offset_is_disabled_after_each_draw() {
        let mut fixture = Fixture::new();
        let decal = Material::new("decal")
            .with_polygon_offset(1.0)
            .with_stage(MaterialStage::ambient(None));
        let surface = fixture.surface(Arc::new(decal), 6);
        let surfaces = vec![surface.clone(), surface];
        let frame = fixture.params();
        let records = build_depth_list(&surfaces, &frame);
        let mut ctx = fixture.context();
        assert_eq!(submit_depth_list(&mut ctx, &frame, &records).unwrap(), 2);

        let calls = ctx.backend().calls();
        let offsets: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, BackendCall::PolygonOffset(_) | BackendCall::Draw(_)))
            .map(|(_, call)| call.clone())
            .collect();
        let enabled = BackendCall::PolygonOffset(Some(PolygonOffset { factor: -1.0, units: -2.0 }));
        assert_eq!(
            offsets,
            vec![
                enabled.clone(),
                BackendCall::Draw(6),
                BackendCall::PolygonOffset(None),
                enabled,
                BackendCall::Draw(6),
                BackendCall::PolygonOffset(None),
            ]
        );
    }

    #[test]
    fn test_two_dimensional_views_skip_the_pass() {
        let mut fixture = Fixture::new();
        fixture.view.is_3d = false;
        let wall = Material::new("wall").with_stage(MaterialStage::ambient(None));
        let surface = fixture.surface(Arc::new(wall), 6);
        let frame = fixture.params();
        let records = build_depth_list(std::slice::from_ref(&surface), &frame);
        let mut ctx = fixture.context();
        assert_eq!(submit_depth_list(&mut ctx, &frame, &records).unwrap(), 0);
        assert!(ctx.backend().calls().is_empty());
    }
}
