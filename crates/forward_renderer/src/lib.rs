//! # Forward Renderer
//!
//! Command submission core of a forward-lit renderer with stencil shadow
//! volumes.
//!
//! ## Features
//!
//! - **Depth Pre-Pass**: opaque and alpha-tested surfaces fill depth first
//! - **Stencil Shadows**: depth-fail and depth-pass shadow volumes
//! - **Light Interactions**: bump, diffuse and specular per light
//! - **Ambient Stages**: per-stage programs, soft particles, skies, post-process
//! - **Fog and Blend Lights**: fog volumes and projected blend lights
//! - **State Gate**: only state changes reach the device
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forward_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut programs = ProgramTable::new();
//!     let program_set = ProgramSet::register_builtin(&mut programs);
//!     let mut images = ImageTable::new();
//!     let globals = GlobalImages::register(&mut images, 1280, 720);
//!     let renderer = FrameRenderer::new(RenderSettings::default(), program_set, globals, images)?;
//!
//!     let view = ViewDef::new(Vec3::zeros(), &Mat4::identity(), Mat4::identity(), 1280, 720);
//!     let mut ctx = RenderContext::new(RecordingBackend::new(), FrameVertexCache::new());
//!     let stats = renderer.render_view(&mut ctx, &view)?;
//!     println!("{} records", stats.total_records());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ExternalShadowMode, RenderSettings, ShadowDebugMode},
        foundation::math::{Mat4, Plane, TexMatrix, Vec3, Vec4},
        render::{
            api::{GraphicsBackend, RecordingBackend, Uniform},
            material::{Coverage, LightKind, Material, MaterialStage, Register, Sort},
            resources::{FrameVertexCache, GlobalImages, ImageInfo, ImageTable, ProgramSet, ProgramTable, VertexCache},
            state::RenderContext,
            FrameRenderer, FrameStats, RenderError, RenderResult,
        },
        scene::{Geometry, ScreenRect, Surface, ViewDef, ViewEntity, ViewLight},
    };
}
