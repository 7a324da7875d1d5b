//! Program handles
//!
//! Compilation happens elsewhere; the passes only activate programs and
//! upload uniforms to whichever one is current.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Opaque handle to a linked GPU program
    pub struct ProgramId;
}

/// Registry of linked programs, keyed by debug name
#[derive(Debug, Default)]
pub struct ProgramTable {
    programs: SlotMap<ProgramId, String>,
}

impl ProgramTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a program
    pub fn register(&mut self, name: impl Into<String>) -> ProgramId {
        self.programs.insert(name.into())
    }

    /// Debug name of a program
    pub fn name(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(id).map(String::as_str)
    }
}

/// The built-in programs each pass activates
///
/// A missing entry is a frame-setup error: the pass that needs it reports
/// `RenderError::MissingProgram`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramSet {
    /// Depth pre-pass
    pub depth: Option<ProgramId>,
    /// Stencil shadow volumes
    pub shadow: Option<ProgramId>,
    /// Bump/diffuse/specular light interactions
    pub interaction: Option<ProgramId>,
    /// Plain textured ambient stages
    pub default: Option<ProgramId>,
    /// Skybox and wobble sky cube maps
    pub skybox: Option<ProgramId>,
    /// Bumped environment reflections
    pub bumpy_environment: Option<ProgramId>,
    /// Soft particle depth blending
    pub depth_blend: Option<ProgramId>,
    /// Fog lights
    pub fog_light: Option<ProgramId>,
    /// Blend lights
    pub blend_light: Option<ProgramId>,
}

impl ProgramSet {
    /// Register every built-in program under its conventional name
    pub fn register_builtin(table: &mut ProgramTable) -> Self {
        Self {
            depth: Some(table.register("depth")),
            shadow: Some(table.register("shadow")),
            interaction: Some(table.register("interaction")),
            default: Some(table.register("default")),
            skybox: Some(table.register("skybox")),
            bumpy_environment: Some(table.register("bumpyenv")),
            depth_blend: Some(table.register("depthblend")),
            fog_light: Some(table.register("fog")),
            blend_light: Some(table.register("blend")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registration() {
        let mut table = ProgramTable::new();
        let set = ProgramSet::register_builtin(&mut table);
        assert_eq!(table.name(set.shadow.unwrap()), Some("shadow"));
        assert_ne!(set.depth, set.interaction);
        assert_eq!(ProgramSet::default().shadow, None);
    }
}
