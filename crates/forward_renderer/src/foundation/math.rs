//! Math utilities and types
//!
//! Provides the vector, matrix and plane types used by the passes, together
//! with the handful of space conversions the lighting code needs.

pub use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Plane stored as `(a, b, c, d)` with `a*x + b*y + c*z + d = 0`
pub type Plane = Vec4;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Two times Pi
    pub const TWO_PI: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Transform a world-space point into the local space of `model`.
///
/// `model` is expected to be a rigid transform: its upper 3x3 columns are the
/// local axes expressed in world space and the fourth column is the origin.
pub fn global_point_to_local(model: &Mat4, point: &Vec3) -> Vec3 {
    let delta = point - model.fixed_view::<3, 1>(0, 3);
    Vec3::new(
        delta.dot(&model.fixed_view::<3, 1>(0, 0)),
        delta.dot(&model.fixed_view::<3, 1>(0, 1)),
        delta.dot(&model.fixed_view::<3, 1>(0, 2)),
    )
}

/// Transform a world-space plane into the local space of `model`.
pub fn global_plane_to_local(model: &Mat4, plane: &Plane) -> Plane {
    let normal = plane.xyz();
    let origin = model.fixed_view::<3, 1>(0, 3);
    Plane::new(
        normal.dot(&model.fixed_view::<3, 1>(0, 0)),
        normal.dot(&model.fixed_view::<3, 1>(0, 1)),
        normal.dot(&model.fixed_view::<3, 1>(0, 2)),
        plane.w + origin.dot(&normal),
    )
}

/// A 2x4 texture coordinate transform.
///
/// `s` and `t` are the rows producing the two texture coordinates from a
/// homogeneous `(x, y, z, w)` input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexMatrix {
    /// Row producing the S coordinate
    pub s: Vec4,
    /// Row producing the T coordinate
    pub t: Vec4,
}

impl TexMatrix {
    /// The identity transform
    pub fn identity() -> Self {
        Self {
            s: Vec4::new(1.0, 0.0, 0.0, 0.0),
            t: Vec4::new(0.0, 1.0, 0.0, 0.0),
        }
    }

    /// Build a matrix from explicit rows
    pub const fn from_rows(s: Vec4, t: Vec4) -> Self {
        Self { s, t }
    }

    /// Expand to a full 4x4 matrix with identity Z and W rows
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::new(
            self.s.x, self.s.y, self.s.z, self.s.w,
            self.t.x, self.t.y, self.t.z, self.t.w,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Bake this transform into projective texgen planes.
    ///
    /// `planes` holds the S, T and Q generating planes; the returned pair is
    /// the new S and T planes producing transformed coordinates directly.
    pub fn bake_into_planes(&self, s: &Plane, t: &Plane, q: &Plane) -> (Plane, Plane) {
        let new_s = s * self.s.x + t * self.s.y + q * self.s.w;
        let new_t = s * self.t.x + t * self.t.y + q * self.t.w;
        (new_s, new_t)
    }
}

impl Default for TexMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn translated_yaw(origin: Vec3) -> Mat4 {
        // local X points along world Y, local Y along world -X
        Mat4::new(
            0.0, -1.0, 0.0, origin.x,
            1.0, 0.0, 0.0, origin.y,
            0.0, 0.0, 1.0, origin.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    #[test]
    fn test_global_point_to_local() {
        let model = translated_yaw(Vec3::new(10.0, 0.0, 0.0));
        let local = global_point_to_local(&model, &Vec3::new(10.0, 5.0, 2.0));
        assert_relative_eq!(local, Vec3::new(5.0, 0.0, 2.0));
    }

    #[test]
    fn test_global_plane_to_local_keeps_points_on_plane() {
        let model = translated_yaw(Vec3::new(3.0, -2.0, 7.0));
        // z = 4 in world space
        let plane = Plane::new(0.0, 0.0, 1.0, -4.0);
        let local_plane = global_plane_to_local(&model, &plane);
        let local_point = global_point_to_local(&model, &Vec3::new(1.0, 1.0, 4.0));
        assert_relative_eq!(local_plane.xyz().dot(&local_point) + local_plane.w, 0.0);
    }

    #[test]
    fn test_identity_bake_is_noop() {
        let s = Plane::new(0.5, 0.0, 0.0, 0.5);
        let t = Plane::new(0.0, 0.5, 0.0, 0.5);
        let q = Plane::new(0.0, 0.0, 1.0, 0.0);
        let (new_s, new_t) = TexMatrix::identity().bake_into_planes(&s, &t, &q);
        assert_relative_eq!(new_s, s);
        assert_relative_eq!(new_t, t);
    }

    #[test]
    fn test_bake_applies_translation_through_q() {
        let s = Plane::new(1.0, 0.0, 0.0, 0.0);
        let t = Plane::new(0.0, 1.0, 0.0, 0.0);
        let q = Plane::new(0.0, 0.0, 0.0, 1.0);
        let scroll = TexMatrix::from_rows(Vec4::new(1.0, 0.0, 0.0, 0.25), Vec4::new(0.0, 1.0, 0.0, 0.0));
        let (new_s, _) = scroll.bake_into_planes(&s, &t, &q);
        assert_relative_eq!(new_s, Plane::new(1.0, 0.0, 0.0, 0.25));
    }
}
