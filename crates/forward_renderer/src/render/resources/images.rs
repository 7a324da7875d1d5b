//! Image handles and the well-known images the passes substitute for
//! missing material textures.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Opaque handle to a texture owned by the host
    pub struct ImageId;
}

/// What the passes need to know about an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Debug name
    pub name: String,
    /// The image carries an alpha channel (gates parallax mapping)
    pub has_alpha: bool,
    /// Uploaded width in texels
    pub upload_width: u32,
    /// Uploaded height in texels
    pub upload_height: u32,
}

impl ImageInfo {
    /// Create an opaque image description
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            has_alpha: false,
            upload_width: width,
            upload_height: height,
        }
    }

    /// Mark the image as having alpha
    pub fn with_alpha(mut self) -> Self {
        self.has_alpha = true;
        self
    }
}

/// Registry of images known to the renderer
#[derive(Debug, Clone, Default)]
pub struct ImageTable {
    images: SlotMap<ImageId, ImageInfo>,
}

impl ImageTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image and get its handle
    pub fn register(&mut self, info: ImageInfo) -> ImageId {
        log::trace!("Registering image '{}'", info.name);
        self.images.insert(info)
    }

    /// Look up an image
    pub fn get(&self, id: ImageId) -> Option<&ImageInfo> {
        self.images.get(id)
    }

    /// Mutable lookup, used when the host resizes render targets
    pub fn get_mut(&mut self, id: ImageId) -> Option<&mut ImageInfo> {
        self.images.get_mut(id)
    }

    /// Whether the image has an alpha channel; unknown images have none
    pub fn has_alpha(&self, id: ImageId) -> bool {
        self.images.get(id).is_some_and(|info| info.has_alpha)
    }

    /// Uploaded size of an image, `(0, 0)` when unknown
    pub fn upload_size(&self, id: ImageId) -> (u32, u32) {
        self.images
            .get(id)
            .map_or((0, 0), |info| (info.upload_width, info.upload_height))
    }

    /// Number of registered images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether no image is registered
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Images with a fixed role in the passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalImages {
    /// All zero; default diffuse and specular
    pub black: ImageId,
    /// All one; solid depth draws
    pub white: ImageId,
    /// (0.5, 0.5, 1) normal map
    pub flat_normal: ImageId,
    /// Placeholder for stages without a texture
    pub default_image: ImageId,
    /// Depth copy sampled by soft particles
    pub current_depth: ImageId,
    /// Colour copy sampled by post-process stages
    pub current_render: ImageId,
    /// Fog density ramp
    pub fog: ImageId,
    /// Fog plane entry ramp
    pub fog_enter: ImageId,
    /// Clip plane alpha mask for mirrors
    pub alpha_notch: ImageId,
}

impl GlobalImages {
    /// Register the fixed images in `table`
    pub fn register(table: &mut ImageTable, render_width: u32, render_height: u32) -> Self {
        Self {
            black: table.register(ImageInfo::new("_black", 8, 8)),
            white: table.register(ImageInfo::new("_white", 8, 8)),
            flat_normal: table.register(ImageInfo::new("_flat", 8, 8)),
            default_image: table.register(ImageInfo::new("_default", 16, 16)),
            current_depth: table.register(ImageInfo::new("_currentDepth", render_width, render_height)),
            current_render: table.register(ImageInfo::new("_currentRender", render_width, render_height)),
            fog: table.register(ImageInfo::new("_fog", 256, 256).with_alpha()),
            fog_enter: table.register(ImageInfo::new("_fogEnter", 64, 64).with_alpha()),
            alpha_notch: table.register(ImageInfo::new("_alphaNotch", 2, 1).with_alpha()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_images_are_distinct() {
        let mut table = ImageTable::new();
        let globals = GlobalImages::register(&mut table, 640, 480);
        assert_eq!(table.len(), 9);
        assert_ne!(globals.black, globals.white);
        assert_eq!(table.upload_size(globals.current_render), (640, 480));
        assert!(table.has_alpha(globals.fog));
        assert!(!table.has_alpha(globals.flat_normal));
    }

    #[test]
    fn test_removed_or_foreign_ids_are_opaque() {
        let mut other = ImageTable::new();
        let foreign = other.register(ImageInfo::new("gloss", 4, 4).with_alpha());
        let table = ImageTable::new();
        assert!(!table.has_alpha(foreign));
        assert_eq!(table.upload_size(foreign), (0, 0));
    }
}
