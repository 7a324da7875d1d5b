//! Per-frame scene data handed to the passes
//!
//! The front end (culling, light/surface interaction generation, register
//! evaluation) lives outside this crate. What arrives here is:
//!
//! ```text
//! ViewDef
//!   ├── draw_surfaces: sorted visible surfaces
//!   └── lights: ViewLight
//!         ├── shadow chains (global, local)
//!         └── interaction chains (local, global, translucent)
//! ```

mod light;
mod surface;
mod view;

pub use light::{ShadowMapParams, ShadowMode, ViewLight};
pub use surface::{Geometry, ScreenRect, ShadowCapBits, SpaceId, Surface, SurfaceFlags, ViewEntity};
pub use view::ViewDef;
