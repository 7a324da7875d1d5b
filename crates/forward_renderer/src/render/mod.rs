//! # Rendering
//!
//! Turns a per-frame list of visible surfaces and lights into an ordered
//! stream of pipeline state changes and draws.
//!
//! ## Architecture
//!
//! - **api**: the raw [`GraphicsBackend`](api::GraphicsBackend) seam, the
//!   uniform vocabulary and a recording backend
//! - **state**: packed state bits and the [`RenderContext`](state::RenderContext)
//!   gate that forwards only changes
//! - **resources**: image and program handles, the vertex cache binder
//! - **material**: the immutable material model the passes read
//! - **passes**: depth, shadow, interaction, ambient and fog passes, each
//!   split into a record builder and a submitter
//! - **frame**: runs the passes of one view in order
//!
//! ## Error handling
//!
//! Most problems are local to one surface and are logged and skipped: an
//! evicted vertex cache entry, a stage with no image. Only frame setup
//! problems surface as [`RenderError`].

pub mod api;
pub mod frame;
pub mod material;
pub mod passes;
pub mod resources;
pub mod state;


pub use frame::{FrameRenderer, FrameStats, LightPhase};

use thiserror::Error;

/// Rendering error types
#[derive(Error, Debug)]
pub enum RenderError {
    /// A pass ran without its built-in program registered
    #[error("Program '{0}' is not loaded")]
    MissingProgram(&'static str),

    /// Settings failed validation
    #[error("Invalid render settings: {0}")]
    InvalidSettings(String),

    /// The device reported a failure
    ///
    /// Backends that can fail outside the command stream (device loss,
    /// out of memory on upload) report through this variant.
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
