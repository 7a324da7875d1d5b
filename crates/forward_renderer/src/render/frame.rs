//! Frame orchestration
//!
//! [`FrameRenderer`] runs the passes of one view in order:
//!
//! 1. depth pre-pass
//! 2. per light: shadow volumes and interactions, see [`LightPhase`]
//! 3. ambient stages up to the first post-process surface
//! 4. fog and blend lights
//! 5. the framebuffer copy and the remaining post-process stages

use crate::config::RenderSettings;
use crate::render::api::{GraphicsBackend, StencilCompare, StencilFunc, STENCIL_SHADOW_REFERENCE};
use crate::render::passes::{
    build_depth_list, build_interactions, build_shadow_list, build_stage_list, submit_blend_light, submit_depth_list,
    submit_fog_light, submit_interactions, submit_shadow_list, submit_stage_list, FrameParams,
};
use crate::render::resources::{GlobalImages, ImageTable, ProgramSet, VertexCache};
use crate::render::state::{DepthFunc, GateStats, RenderContext};
use crate::render::{RenderError, RenderResult};
use crate::scene::{Surface, ViewDef, ViewLight};

/// The steps drawn for one light, in submission order
///
/// Global shadows are cast by world geometry and shadow every interaction;
/// local shadows are cast by entities and only shadow the global chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightPhase {
    /// World shadow volumes into the cleared stencil buffer
    GlobalShadows,
    /// Surfaces shadowed by world volumes only
    LocalInteractions,
    /// Entity shadow volumes on top of the world ones
    LocalShadows,
    /// Surfaces shadowed by both
    GlobalInteractions,
    /// Unshadowed translucent surfaces with a `LESS` depth test
    Translucent,
}

impl LightPhase {
    /// Submission order
    pub const ORDER: [Self; 5] = [
        Self::GlobalShadows,
        Self::LocalInteractions,
        Self::LocalShadows,
        Self::GlobalInteractions,
        Self::Translucent,
    ];
}

/// Draw counts of one rendered view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Depth pre-pass records drawn
    pub depth: usize,
    /// Shadow volumes drawn
    pub shadow_volumes: usize,
    /// Interaction records drawn
    pub interactions: usize,
    /// Ambient stages drawn before fog
    pub ambient: usize,
    /// Fog and blend light surfaces drawn
    pub fog: usize,
    /// Ambient stages drawn after the framebuffer copy
    pub post_process: usize,
    /// Lights that went through the interaction phases
    pub lights: usize,
    /// Gate counters for the whole view
    pub gate: GateStats,
}

impl FrameStats {
    /// Records drawn across every pass
    pub const fn total_records(&self) -> usize {
        self.depth + self.shadow_volumes + self.interactions + self.ambient + self.fog + self.post_process
    }
}

fn stencil_always() -> StencilFunc {
    StencilFunc::new(StencilCompare::Always, STENCIL_SHADOW_REFERENCE, 255)
}

/// Renders views with a fixed set of programs, images and settings
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    settings: RenderSettings,
    programs: ProgramSet,
    images: GlobalImages,
    image_table: ImageTable,
}

impl FrameRenderer {
    /// Create a renderer, rejecting settings that fail validation
    pub fn new(
        settings: RenderSettings,
        programs: ProgramSet,
        images: GlobalImages,
        image_table: ImageTable,
    ) -> RenderResult<Self> {
        settings.validate().map_err(RenderError::InvalidSettings)?;
        Ok(Self {
            settings,
            programs,
            images,
            image_table,
        })
    }

    /// Current settings
    pub const fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replace the settings between frames
    pub fn set_settings(&mut self, settings: RenderSettings) -> RenderResult<()> {
        settings.validate().map_err(RenderError::InvalidSettings)?;
        self.settings = settings;
        Ok(())
    }

    /// Built-in programs
    pub const fn programs(&self) -> &ProgramSet {
        &self.programs
    }

    /// Well-known images
    pub const fn images(&self) -> &GlobalImages {
        &self.images
    }

    /// Image metadata, e.g. to register level images
    pub fn image_table_mut(&mut self) -> &mut ImageTable {
        &mut self.image_table
    }

    fn params<'f>(&'f self, view: &'f ViewDef) -> FrameParams<'f> {
        FrameParams {
            view,
            settings: &self.settings,
            programs: &self.programs,
            images: &self.images,
            image_table: &self.image_table,
        }
    }

    /// Render every pass of `view`
    pub fn render_view<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        view: &ViewDef,
    ) -> RenderResult<FrameStats> {
        let frame = self.params(view);
        let mut stats = FrameStats::default();

        ctx.begin_frame();
        ctx.set_depth_range(0.0, 1.0);
        frame.reset_scissor(ctx);

        let depth_records = build_depth_list(&view.draw_surfaces, &frame);
        stats.depth = submit_depth_list(ctx, &frame, &depth_records)?;

        for light in view.lights.iter().filter(|light| !light.is_fog() && !light.is_blend()) {
            if !light.has_interactions() {
                continue;
            }
            self.render_light(ctx, &frame, light, &mut stats)?;
            stats.lights += 1;
        }
        ctx.set_stencil_func(stencil_always());

        let (records, consumed) = build_stage_list(&view.draw_surfaces, &frame, false);
        stats.ambient = submit_stage_list(ctx, &frame, &records)?;

        stats.fog = Self::render_fog_lights(ctx, &frame)?;

        let remaining = &view.draw_surfaces[consumed..];
        if !remaining.is_empty() {
            stats.post_process = self.render_post_process(ctx, &frame, remaining)?;
        }

        stats.gate = ctx.stats();
        log::debug!(
            "View rendered: {} lights, {} records ({} depth, {} shadow, {} interaction, {} ambient, {} fog, {} post), {} state changes",
            stats.lights,
            stats.total_records(),
            stats.depth,
            stats.shadow_volumes,
            stats.interactions,
            stats.ambient,
            stats.fog,
            stats.post_process,
            stats.gate.state_changes,
        );
        Ok(stats)
    }

    fn render_light<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        light: &ViewLight,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        if light.has_shadows() && light.uses_stencil_shadows() {
            frame.apply_scissor(ctx, &light.scissor);
            ctx.clear_stencil(STENCIL_SHADOW_REFERENCE);
        } else {
            // nothing writes the stencil buffer, so nothing may read it
            ctx.set_stencil_func(stencil_always());
        }

        for phase in LightPhase::ORDER {
            match phase {
                LightPhase::GlobalShadows => stats.shadow_volumes += shadow_chain(ctx, frame, light, &light.global_shadows)?,
                LightPhase::LocalInteractions => {
                    stats.interactions += interaction_chain(ctx, frame, light, &light.local_interactions, DepthFunc::Equal)?;
                }
                LightPhase::LocalShadows => stats.shadow_volumes += shadow_chain(ctx, frame, light, &light.local_shadows)?,
                LightPhase::GlobalInteractions => {
                    stats.interactions += interaction_chain(ctx, frame, light, &light.global_interactions, DepthFunc::Equal)?;
                }
                LightPhase::Translucent => {
                    if self.settings.skip_translucent {
                        continue;
                    }
                    // translucent surfaces are never stencil shadowed
                    ctx.set_stencil_func(stencil_always());
                    stats.interactions +=
                        interaction_chain(ctx, frame, light, &light.translucent_interactions, DepthFunc::Less)?;
                }
            }
        }
        Ok(())
    }

    fn render_fog_lights<B: GraphicsBackend, V: VertexCache>(
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
    ) -> RenderResult<usize> {
        let lights: Vec<_> = frame
            .view
            .lights
            .iter()
            .filter(|light| light.is_fog() || light.is_blend())
            .collect();
        if lights.is_empty() {
            return Ok(0);
        }

        ctx.set_stencil_test(false);
        let mut drawn = 0;
        for light in lights {
            drawn += if light.is_fog() {
                submit_fog_light(ctx, frame, light)?
            } else {
                submit_blend_light(ctx, frame, light)?
            };
        }
        ctx.set_stencil_test(true);
        Ok(drawn)
    }

    fn render_post_process<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        surfaces: &[Surface],
    ) -> RenderResult<usize> {
        if self.settings.skip_post_process {
            log::trace!("Skipping {} post-process surfaces", surfaces.len());
            return Ok(0);
        }
        let view = frame.view;
        if view.is_3d {
            ctx.copy_framebuffer(self.images.current_render, view.viewport_box());
        }
        let (records, _) = build_stage_list(surfaces, frame, true);
        submit_stage_list(ctx, frame, &records)
    }
}

fn shadow_chain<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    light: &ViewLight,
    surfaces: &[Surface],
) -> RenderResult<usize> {
    let records = build_shadow_list(surfaces, light, frame.settings);
    submit_shadow_list(ctx, frame, light, &records)
}

fn interaction_chain<B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    light: &ViewLight,
    surfaces: &[Surface],
    depth_func: DepthFunc,
) -> RenderResult<usize> {
    let records = build_interactions(surfaces, light, frame);
    submit_interactions(ctx, frame, light, &records, depth_func)
}
