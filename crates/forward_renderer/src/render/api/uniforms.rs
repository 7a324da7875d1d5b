//! Uniform values uploaded to the active program

use crate::foundation::math::{Mat4, TexMatrix, Vec2, Vec4};

/// One uniform upload
///
/// Variants mirror the inputs of the built-in programs. A backend maps each
/// to its own location; passes never address uniforms by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Uniform {
    /// Object to world
    ModelMatrix(Mat4),
    /// Object to eye
    ModelViewMatrix(Mat4),
    /// Eye to clip
    ProjectionMatrix(Mat4),
    /// Stage texture transform
    TextureMatrix(Mat4),
    /// Light origin in object space, `w = 0`
    LocalLightOrigin(Vec4),
    /// View origin in object space, `w = 1`
    LocalViewOrigin(Vec4),
    /// Light projection S, T, Q and falloff planes in object space
    LightProjection([Vec4; 4]),
    /// Bump map coordinate transform
    BumpMatrix(TexMatrix),
    /// Diffuse map coordinate transform
    DiffuseMatrix(TexMatrix),
    /// Specular map coordinate transform
    SpecularMatrix(TexMatrix),
    /// Vertex colour multiplier
    ColorModulate(Vec4),
    /// Vertex colour bias
    ColorAdd(Vec4),
    /// Diffuse or stage colour
    DiffuseColor(Vec4),
    /// Specular colour
    SpecularColor(Vec4),
    /// Shading model selector
    ShadingModel(i32),
    /// Specular exponent
    SpecularExponent(f32),
    /// Light origin in world space, `w = 1`
    GlobalLightOrigin(Vec4),
    /// 0 off, 1 point light cube maps, 2 projected spot light
    ShadowMappingMode(i32),
    /// Shadow map softness and brightness
    ShadowParams(Vec4),
    /// Six cube face view-projections of a point light
    PointLightProjections(Box<[Mat4; 6]>),
    /// View-projection of a projected light
    SpotLightProjection(Mat4),
    /// Parallax height, negative disables parallax
    PomMaxHeight(f32),
    /// Alpha test enable
    AlphaTestEnabled(bool),
    /// Alpha test reference
    AlphaTestThreshold(f32),
    /// Whether the bump matrix uniform is meaningful
    HasBumpMatrix(bool),
    /// Custom stage parameter slot
    ShaderParm(usize, Vec4),
    /// Near and far clip distances
    ClipRange(f32, f32),
    /// Current render texture size and viewport size
    CurrentRenderSize {
        /// Uploaded texture size
        texture: Vec2,
        /// Rendered region size
        viewport: Vec2,
    },
    /// Soft particle depth blend mode
    DepthBlendMode(i32),
    /// Soft particle depth blend range
    DepthBlendRange(f32),
    /// Fog density planes: S, T, fog enter S and T
    FogPlanes([Vec4; 4]),
}
