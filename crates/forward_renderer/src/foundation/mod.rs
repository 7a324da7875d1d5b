//! Foundation module - shared math and logging
//!
//! - Vector, matrix, plane and texture-matrix types
//! - Logging setup for tools embedding the renderer

pub mod math;
pub mod logging;
