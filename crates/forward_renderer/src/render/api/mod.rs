//! Backend-facing API
//!
//! The raw command trait every device implements, the uniform vocabulary of
//! the built-in programs, and a recording implementation.

pub mod recording;
pub mod render_backend;
pub mod uniforms;

pub use recording::{BackendCall, RecordingBackend};
pub use render_backend::{
    BackendCapabilities, CullType, GraphicsBackend, PolygonOffset, ScissorBox, StencilAction, StencilCompare,
    StencilFunc, StencilOps, VertexLayout, MAX_TEXTURE_UNITS, STENCIL_SHADOW_REFERENCE,
};
pub use uniforms::Uniform;
