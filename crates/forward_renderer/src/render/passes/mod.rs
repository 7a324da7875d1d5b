//! Render list passes
//!
//! Each pass is split in two: a builder that walks surfaces once and
//! resolves every per-surface decision into a flat record, and a submitter
//! that walks the records and emits only what changed since the previous
//! one.
//!
//! Records implement [`DrawRecord`]; [`submit_records`] is the single loop
//! that drives them. Pass-specific setup and teardown wrap that loop in each
//! module's `submit_*` function.

pub mod ambient;
pub mod depth;
pub mod fog;
pub mod interaction;
pub mod shadow;

use crate::config::RenderSettings;
use crate::foundation::math::Mat4;
use crate::render::api::{GraphicsBackend, Uniform};
use crate::render::resources::{GlobalImages, ImageTable, ProgramId, ProgramSet, VertexCache};
use crate::render::state::RenderContext;
use crate::render::{RenderError, RenderResult};
use crate::scene::{ScreenRect, SpaceId, ViewDef, ViewEntity};

pub use ambient::{build_stage_list, submit_stage_list, wobble_sky_matrix, AmbientRecord};
pub use depth::{build_depth_list, submit_depth_list, AlphaTest, DepthRecord};
pub use fog::{submit_blend_light, submit_fog_light, BlendLightRecord, FogRecord};
pub use interaction::{build_interactions, submit_interactions, InteractionBuilder, InteractionRecord};
pub use shadow::{build_shadow_list, plan_shadow_draw, submit_shadow_list, ShadowDrawPlan, ShadowIndexSet, ShadowRecord};

/// Read-only inputs shared by every pass of a frame
#[derive(Debug, Clone, Copy)]
pub struct FrameParams<'f> {
    /// View being rendered
    pub view: &'f ViewDef,
    /// Tunables
    pub settings: &'f RenderSettings,
    /// Built-in programs
    pub programs: &'f ProgramSet,
    /// Well-known images
    pub images: &'f GlobalImages,
    /// Image metadata
    pub image_table: &'f ImageTable,
}

impl FrameParams<'_> {
    /// Resolve a built-in program a pass cannot run without
    ///
    /// A missing program means frame setup is broken: debug builds stop here,
    /// release builds report the error and skip the pass.
    pub fn require_program(&self, program: Option<ProgramId>, name: &'static str) -> RenderResult<ProgramId> {
        debug_assert!(program.is_some(), "{name} program is not loaded");
        program.ok_or(RenderError::MissingProgram(name))
    }

    /// Apply a surface scissor if scissoring is enabled
    pub fn apply_scissor<B: GraphicsBackend, V: VertexCache>(&self, ctx: &mut RenderContext<B, V>, rect: &ScreenRect) {
        if self.settings.use_scissor {
            ctx.set_scissor(self.view.scissor_box(rect));
        }
    }

    /// Restore the full window scissor if scissoring is enabled
    pub fn reset_scissor<B: GraphicsBackend, V: VertexCache>(&self, ctx: &mut RenderContext<B, V>) {
        if self.settings.use_scissor {
            ctx.set_scissor(self.view.full_window_scissor());
        }
    }
}

/// A flat, pre-resolved draw unit
pub trait DrawRecord {
    /// Tracking state carried from one record to the next within a list
    type Cursor: Default;

    /// Emit state deltas and the draw; returns whether anything was drawn
    fn emit<B: GraphicsBackend, V: VertexCache>(
        &self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        cursor: &mut Self::Cursor,
    ) -> bool;
}

/// Emit every record of a list in order, returning the number drawn
pub fn submit_records<R: DrawRecord, B: GraphicsBackend, V: VertexCache>(
    ctx: &mut RenderContext<B, V>,
    frame: &FrameParams<'_>,
    records: &[R],
    cursor: &mut R::Cursor,
) -> usize {
    records
        .iter()
        .filter(|record| record.emit(ctx, frame, cursor))
        .count()
}

/// Projection with the weapon depth hack: depth squashed toward the near plane
pub fn weapon_depth_projection(projection: &Mat4) -> Mat4 {
    let mut matrix = *projection;
    matrix[(2, 3)] *= 0.25;
    matrix
}

/// Projection with the model depth hack: depth pulled toward the viewer
pub fn model_depth_projection(projection: &Mat4, depth: f32) -> Mat4 {
    let mut matrix = *projection;
    matrix[(2, 3)] -= depth;
    matrix
}

/// Tracks the current space across records
///
/// Entering a new space uploads its matrices and switches depth hacks on or
/// off; records in the same space skip all of it.
#[derive(Debug, Default)]
pub struct SpaceTracker {
    current: Option<SpaceId>,
    depth_hack: bool,
}

impl SpaceTracker {
    /// Whether `space` is the current space
    pub fn is_current(&self, space: &ViewEntity) -> bool {
        self.current == Some(space.id)
    }

    /// Switch to `space`, returning whether it changed
    pub fn enter<B: GraphicsBackend, V: VertexCache>(
        &mut self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        space: &ViewEntity,
    ) -> bool {
        if self.is_current(space) {
            return false;
        }
        self.current = Some(space.id);
        ctx.uniform(Uniform::ModelMatrix(space.model_matrix));
        ctx.uniform(Uniform::ModelViewMatrix(space.model_view_matrix));
        self.update_depth_hack(ctx, frame, space);
        true
    }

    fn update_depth_hack<B: GraphicsBackend, V: VertexCache>(
        &mut self,
        ctx: &mut RenderContext<B, V>,
        frame: &FrameParams<'_>,
        space: &ViewEntity,
    ) {
        let projection = &frame.view.projection_matrix;
        if space.weapon_depth_hack {
            ctx.set_depth_range(0.0, 0.5);
            ctx.uniform(Uniform::ProjectionMatrix(weapon_depth_projection(projection)));
            self.depth_hack = true;
        } else if space.model_depth_hack != 0.0 {
            ctx.set_depth_range(0.0, 1.0);
            ctx.uniform(Uniform::ProjectionMatrix(model_depth_projection(projection, space.model_depth_hack)));
            self.depth_hack = true;
        } else if self.depth_hack {
            self.leave_depth_hack(ctx, frame);
        }
    }

    fn leave_depth_hack<B: GraphicsBackend, V: VertexCache>(&mut self, ctx: &mut RenderContext<B, V>, frame: &FrameParams<'_>) {
        ctx.set_depth_range(0.0, 1.0);
        ctx.uniform(Uniform::ProjectionMatrix(frame.view.projection_matrix));
        self.depth_hack = false;
    }

    /// End of list: restore the projection if a depth hack is active
    pub fn finish<B: GraphicsBackend, V: VertexCache>(&mut self, ctx: &mut RenderContext<B, V>, frame: &FrameParams<'_>) {
        if self.depth_hack {
            self.leave_depth_hack(ctx, frame);
        }
        self.current = None;
    }

    /// Forget the current space so the next record reapplies it
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
