//! Light interactions
//!
//! Each surface lit by a light is split into interactions: one bump map with
//! the diffuse and specular maps that follow it. Materials may stack several
//! bump/diffuse/specular groups; every group becomes its own additive draw.
//!
//! [`InteractionBuilder`] walks a surface's stages in order and produces a
//! record every time a group is complete. Records that would add nothing
//! (black colours or black images on both diffuse and specular) are dropped.

use crate::foundation::math::{global_plane_to_local, global_point_to_local, Plane, TexMatrix, Vec4};
use crate::render::api::{GraphicsBackend, Uniform, VertexLayout};
use crate::render::material::{LightKind, MaterialStage, StageLighting, VertexColorMode};
use crate::render::passes::{submit_records, DrawRecord, FrameParams, SpaceTracker};
use crate::render::resources::{GlobalImages, ImageId, VertexCache};
use crate::render::state::{DepthFunc, DstBlend, RenderContext, SrcBlend, StateBits};
use crate::render::RenderResult;
use crate::scene::{ShadowMode, Surface, ViewLight};

/// One textured layer of an interaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionLayer {
    /// Image bound for the layer
    pub image: ImageId,
    /// Texture transform, `None` for identity
    pub matrix: Option<TexMatrix>,
    /// Colour, light colour already applied
    pub color: Vec4,
}

impl InteractionLayer {
    fn from_stage(stage: &MaterialStage, registers: &[f32], images: &GlobalImages, light_color: &Vec4) -> Self {
        let color = stage.evaluate_color(registers).map(|c| c.clamp(0.0, 1.0));
        Self {
            image: stage.texture.image.unwrap_or(images.default_image),
            matrix: stage.texture.evaluate_matrix(registers),
            color: color.component_mul(light_color),
        }
    }

    fn black(images: &GlobalImages) -> Self {
        Self {
            image: images.black,
            matrix: None,
            color: Vec4::zeros(),
        }
    }

    fn adds_light(&self, black: ImageId) -> bool {
        self.image != black && self.color.xyz().iter().any(|&c| c > 0.0)
    }
}

/// One additive light interaction draw
#[derive(Debug, Clone, Copy)]
pub struct InteractionRecord<'a> {
    /// Lit surface
    pub surface: &'a Surface,
    /// Light origin in surface space, `w = 0`
    pub local_light_origin: Vec4,
    /// View origin in surface space, `w = 1`
    pub local_view_origin: Vec4,
    /// Light S, T, Q and falloff planes in surface space
    pub light_projection: [Plane; 4],
    /// Light projection image
    pub light_image: ImageId,
    /// Light falloff image
    pub falloff_image: ImageId,
    /// Normal map
    pub bump: InteractionLayer,
    /// Diffuse reflectance
    pub diffuse: InteractionLayer,
    /// Specular reflectance
    pub specular: InteractionLayer,
    /// Vertex colour usage
    pub vertex_color: VertexColorMode,
}

impl InteractionRecord<'_> {
    /// Whether drawing this record changes the framebuffer
    pub fn is_visible(&self, black: ImageId) -> bool {
        self.diffuse.adds_light(black) || self.specular.adds_light(black)
    }
}

/// Accumulates the layers of one surface under one light stage
#[derive(Debug, Clone)]
pub struct InteractionBuilder<'a> {
    surface: &'a Surface,
    local_light_origin: Vec4,
    local_view_origin: Vec4,
    light_projection: [Plane; 4],
    light_image: ImageId,
    falloff_image: ImageId,
    ambient_light: bool,
    bump: Option<InteractionLayer>,
    diffuse: Option<InteractionLayer>,
    specular: Option<InteractionLayer>,
    vertex_color: VertexColorMode,
}

impl<'a> InteractionBuilder<'a> {
    /// Start a builder for `surface` lit by `light`, before any light stage
    pub fn new(surface: &'a Surface, light: &ViewLight, frame: &FrameParams<'_>) -> Self {
        let model = &surface.space.model_matrix;
        Self {
            surface,
            local_light_origin: global_point_to_local(model, &light.global_light_origin).push(0.0),
            local_view_origin: global_point_to_local(model, &frame.view.view_origin).push(1.0),
            light_projection: light.light_project.map(|plane| global_plane_to_local(model, &plane)),
            light_image: frame.images.white,
            falloff_image: light.falloff_image,
            ambient_light: light.kind() == LightKind::Ambient,
            bump: None,
            diffuse: None,
            specular: None,
            vertex_color: VertexColorMode::Ignore,
        }
    }

    /// Restart for a light stage: new light image and projection, no layers
    pub fn begin_light_stage(&mut self, base_projection: &[Plane; 4], image: ImageId, matrix: Option<TexMatrix>) {
        let mut projection = *base_projection;
        if let Some(matrix) = matrix {
            let (s, t) = matrix.bake_into_planes(&projection[0], &projection[1], &projection[2]);
            projection[0] = s;
            projection[1] = t;
        }
        self.light_projection = projection;
        self.light_image = image;
        self.bump = None;
        self.diffuse = None;
        self.specular = None;
        self.vertex_color = VertexColorMode::Ignore;
    }

    /// Start a new bump group
    pub fn set_bump(&mut self, layer: InteractionLayer) {
        self.bump = Some(layer);
        self.diffuse = None;
        self.specular = None;
    }

    /// Whether a diffuse layer is pending
    pub const fn has_diffuse(&self) -> bool {
        self.diffuse.is_some()
    }

    /// Whether a specular layer is pending
    pub const fn has_specular(&self) -> bool {
        self.specular.is_some()
    }

    /// Set the diffuse layer
    pub fn set_diffuse(&mut self, layer: InteractionLayer, vertex_color: VertexColorMode) {
        self.diffuse = Some(layer);
        self.vertex_color = vertex_color;
    }

    /// Set the specular layer
    pub fn set_specular(&mut self, layer: InteractionLayer, vertex_color: VertexColorMode) {
        self.specular = Some(layer);
        self.vertex_color = vertex_color;
    }

    /// Complete the current group
    ///
    /// Returns `None` when no bump layer has been seen or the draw would add
    /// nothing. The builder keeps its layers; only a new bump stage or light
    /// stage clears them.
    pub fn flush(&self, frame: &FrameParams<'_>) -> Option<InteractionRecord<'a>> {
        let bump = self.bump?;
        let settings = frame.settings;
        let images = frame.images;

        let diffuse = match self.diffuse {
            Some(layer) if !settings.skip_diffuse => layer,
            _ => InteractionLayer::black(images),
        };
        // ambient lights have no direction to reflect
        let specular = match self.specular {
            Some(layer) if !settings.skip_specular && !self.ambient_light => layer,
            _ => InteractionLayer::black(images),
        };
        let bump = if settings.skip_bump {
            InteractionLayer {
                image: images.flat_normal,
                ..bump
            }
        } else {
            bump
        };

        let record = InteractionRecord {
            surface: self.surface,
            local_light_origin: self.local_light_origin,
            local_view_origin: self.local_view_origin,
            light_projection: self.light_projection,
            light_image: self.light_image,
            falloff_image: self.falloff_image,
            bump,
            diffuse,
            specular,
            vertex_color: self.vertex_color,
        };
        record.is_visible(images.black).then_some(record)
    }
}

/// Build the interaction records of one light chain
pub fn build_interactions<'a>(
    surfaces: &'a [Surface],
    light: &ViewLight,
    frame: &FrameParams<'_>,
) -> Vec<InteractionRecord<'a>> {
    let mut records = Vec::new();
    if frame.settings.skip_interactions {
        return records;
    }
    for surface in surfaces {
        push_surface(&mut records, surface, light, frame);
    }
    log::trace!("Interactions: {} records from {} surfaces", records.len(), surfaces.len());
    records
}

fn push_surface<'a>(
    records: &mut Vec<InteractionRecord<'a>>,
    surface: &'a Surface,
    light: &ViewLight,
    frame: &FrameParams<'_>,
) {
    if surface.ambient_cache().is_none() || !surface.material.receives_lighting() {
        return;
    }
    let settings = frame.settings;
    let images = frame.images;
    let surface_registers = surface.registers.as_slice();
    let light_registers = light.registers.as_slice();

    let mut builder = InteractionBuilder::new(surface, light, frame);
    let base_projection = builder.light_projection;

    for light_stage in &light.shader.stages {
        if !light_stage.is_enabled(light_registers) {
            continue;
        }
        builder.begin_light_stage(
            &base_projection,
            light_stage.texture.image.unwrap_or(images.white),
            light_stage.texture.evaluate_matrix(light_registers),
        );

        let raw = light_stage.evaluate_color(light_registers);
        let light_color = Vec4::new(
            settings.light_scale * raw.x,
            settings.light_scale * raw.y,
            settings.light_scale * raw.z,
            raw.w,
        );

        for stage in &surface.material.stages {
            if stage.lighting == StageLighting::Ambient || !stage.is_enabled(surface_registers) {
                continue;
            }
            match stage.lighting {
                StageLighting::Bump => {
                    records.extend(builder.flush(frame));
                    let layer = InteractionLayer {
                        color: Vec4::repeat(1.0),
                        ..InteractionLayer::from_stage(stage, surface_registers, images, &Vec4::repeat(1.0))
                    };
                    builder.set_bump(layer);
                }
                StageLighting::Diffuse => {
                    if builder.has_diffuse() {
                        records.extend(builder.flush(frame));
                    }
                    let layer = InteractionLayer::from_stage(stage, surface_registers, images, &light_color);
                    builder.set_diffuse(layer, stage.vertex_color);
                }
                StageLighting::Specular => {
                    if builder.has_specular() {
                        records.extend(builder.flush(frame));
                    }
                    let mut layer = InteractionLayer::from_stage(stage, surface_registers, images, &light_color);
                    layer.color *= settings.specular_scale;
                    builder.set_specular(layer, stage.vertex_color);
                }
                StageLighting::Ambient => {}
            }
        }

        records.extend(builder.flush(frame));
    }
}

/// Tracking state of the interaction submitter
#[derive(Debug)]
pub struct InteractionCursor {
    space: SpaceTracker,
    bump_matrix: bool,
    diffuse_matrix: bool,
    specular_matrix: bool,
    vertex_color: Option<VertexColorMode>,
    diffuse_color: Vec4,
    specular_color: Vec4,
    pom_height: f32,
}

impl Default for InteractionCursor {
    fn default() -> Self {
        Self {
            space: SpaceTracker::default(),
            bump_matrix: false,
            diffuse_matrix: false,
            specular_matrix: false,
            vertex_color: None,
            diffuse_color: Vec4::repeat(1.0),
            specular_color: Vec4::repeat(1.0),
            pom_height: -1.0,
        }
    }
}

/// Upload a layer matrix when the record has one, or reset to identity
/// once after records that had one
fn apply_matrix<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    matrix: Option<TexMatrix>,
    current: &mut bool,
    uniform: fn(TexMatrix) -> Uniform,
) {
    match matrix {
        Some(matrix) => {
            ctx.uniform(uniform(matrix));
            *current = true;
        }
        None if *current => {
            ctx.uniform(uniform(TexMatrix::identity()));
            *current = false;
        }
        None => {}
    }
}

impl DrawRecord for InteractionRecord<'_> {
    type Cursor = InteractionCursor;

    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut InteractionCursor,
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

        ctx.uniform(Uniform::LocalLightOrigin(self.local_light_origin));
        ctx.uniform(Uniform::LocalViewOrigin(self.local_view_origin));
        ctx.uniform(Uniform::LightProjection(self.light_projection));

        apply_matrix(ctx, self.bump.matrix, &mut cursor.bump_matrix, Uniform::BumpMatrix);
        apply_matrix(ctx, self.diffuse.matrix, &mut cursor.diffuse_matrix, Uniform::DiffuseMatrix);
        apply_matrix(ctx, self.specular.matrix, &mut cursor.specular_matrix, Uniform::SpecularMatrix);

        if cursor.vertex_color != Some(self.vertex_color) {
            ctx.uniform(Uniform::ColorModulate(self.vertex_color.modulate()));
            ctx.uniform(Uniform::ColorAdd(self.vertex_color.add()));
            cursor.vertex_color = Some(self.vertex_color);
        }
        if cursor.diffuse_color != self.diffuse.color {
            ctx.uniform(Uniform::DiffuseColor(self.diffuse.color));
            cursor.diffuse_color = self.diffuse.color;
        }
        if cursor.specular_color != self.specular.color {
            ctx.uniform(Uniform::SpecularColor(self.specular.color));
            cursor.specular_color = self.specular.color;
        }

        let settings = frame.settings;
        let pom_height = if settings.pom_enabled && frame.image_table.has_alpha(self.specular.image) {
            settings.pom_max_height
        } else {
            -1.0
        };
        if pom_height != cursor.pom_height {
            ctx.uniform(Uniform::PomMaxHeight(pom_height));
            cursor.pom_height = pom_height;
        }

        ctx.bind_texture(1, Some(self.bump.image));
        ctx.bind_texture(2, Some(self.falloff_image));
        ctx.bind_texture(3, Some(self.light_image));
        ctx.bind_texture(4, Some(self.diffuse.image));
        ctx.bind_texture(5, Some(self.specular.image));

        ctx.draw_elements(surface.geometry.num_indexes);
        true
    }
}

fn upload_shadow_mode<B: GraphicsBackend, V: VertexCache>(ctx: &mut RenderContext<B, V>, light: &ViewLight) {
    let mode = &light.shadow_mode;
    ctx.uniform(Uniform::ShadowMappingMode(mode.program_value()));
    if let ShadowMode::ShadowMap(params) = mode {
        ctx.uniform(Uniform::GlobalLightOrigin(light.global_light_origin.push(1.0)));
        ctx.uniform(Uniform::ShadowParams(Vec4::new(params.softness, params.brightness, 0.0, 0.0)));
        if params.point_light {
            ctx.uniform(Uniform::PointLightProjections(Box::new(params.point_view_projections)));
        } else {
            ctx.uniform(Uniform::SpotLightProjection(params.spot_view_projection));
        }
    }
}

/// Draw the interactions of one light chain additively
///
/// `depth_func` is `Equal` for opaque chains, which only touch pixels the
/// depth pre-pass laid down, and `Less` for translucent chains.
pub fn submit_interactions<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    light: &ViewLight,
    records: &[InteractionRecord<'_>],
    depth_func: DepthFunc,
) -> RenderResult<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let program = frame.require_program(frame.programs.interaction, "interaction")?;
    let settings = frame.settings;

    ctx.set_state(StateBits::blend(SrcBlend::One, DstBlend::One) | StateBits::DEPTHMASK | depth_func.bits());
    ctx.use_program(Some(program));
    ctx.uniform(Uniform::ShadingModel(settings.shading.program_value()));
    ctx.uniform(Uniform::SpecularExponent(settings.specular_exp));
    upload_shadow_mode(ctx, light);
    ctx.uniform(Uniform::ProjectionMatrix(frame.view.projection_matrix));
    ctx.uniform(Uniform::PomMaxHeight(-1.0));

    let mut cursor = InteractionCursor::default();
    ctx.uniform(Uniform::DiffuseColor(cursor.diffuse_color));
    ctx.uniform(Uniform::SpecularColor(cursor.specular_color));
    ctx.uniform(Uniform::BumpMatrix(TexMatrix::identity()));
    ctx.uniform(Uniform::DiffuseMatrix(TexMatrix::identity()));
    ctx.uniform(Uniform::SpecularMatrix(TexMatrix::identity()));
    frame.reset_scissor(ctx);

    let drawn = submit_records(ctx, frame, records, &mut cursor);

    cursor.space.finish(ctx, frame);
    frame.reset_scissor(ctx);
    log::trace!("Interactions: {} of {} drawn", drawn, records.len());
    Ok(drawn)
}
