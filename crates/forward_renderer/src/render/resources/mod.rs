//! Resource tables
//!
//! The core never owns GPU objects. Images and programs are opaque slotmap
//! keys registered by the host, and geometry is reached through the vertex
//! cache binder.

pub mod images;
pub mod programs;
pub mod vertex_cache;

pub use images::{GlobalImages, ImageId, ImageInfo, ImageTable};
pub use programs::{ProgramId, ProgramSet, ProgramTable};
pub use vertex_cache::{BufferOffset, CacheHandle, FrameVertexCache, VertexCache};
