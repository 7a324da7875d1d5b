//! Render state tracking
//!
//! Packed blend/depth bits and the gate every pass routes state through.

pub mod gate;
pub mod state_bits;

pub use gate::{GateStats, RenderContext};
pub use state_bits::{DepthFunc, DstBlend, SrcBlend, StateBits};
