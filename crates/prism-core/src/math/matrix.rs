// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Column-major `Mat3` and `Mat4`.

use super::{Quaternion, Vec3, Vec4, EPSILON};
use std::ops::Mul;

/// A 3x3 column-major matrix.
///
/// Used by the renderer for the rotation/scale block of a transform: the
/// 3x3 view matrix and the normal matrix of a mesh instance.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat3 {
    /// The columns of the matrix.
    pub cols: [Vec3; 3],
}

impl Mat3 {
    /// The 3x3 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    /// Creates a matrix from three column vectors.
    #[inline]
    pub fn from_cols(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self { cols: [c0, c1, c2] }
    }

    /// Extracts the upper-left 3x3 block of a `Mat4`.
    #[inline]
    pub fn from_mat4(m: &Mat4) -> Self {
        Self::from_cols(
            m.cols[0].truncate(),
            m.cols[1].truncate(),
            m.cols[2].truncate(),
        )
    }

    /// The inverse-transpose of the 3x3 block of `world`, used to transform normals.
    ///
    /// Falls back to the plain 3x3 block when the transform is singular.
    pub fn normal_matrix(world: &Mat4) -> Self {
        let m = Self::from_mat4(world);
        m.inverse().map(|inv| inv.transpose()).unwrap_or(m)
    }

    /// Computes the determinant.
    #[inline]
    pub fn determinant(&self) -> f32 {
        let [a, b, c] = self.cols;
        a.dot(b.cross(c))
    }

    /// Returns the transpose.
    #[inline]
    pub fn transpose(&self) -> Self {
        let [a, b, c] = self.cols;
        Self::from_cols(
            Vec3::new(a.x, b.x, c.x),
            Vec3::new(a.y, b.y, c.y),
            Vec3::new(a.z, b.z, c.z),
        )
    }

    /// Computes the inverse, or `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let [a, b, c] = self.cols;
        let r0 = b.cross(c);
        let r1 = c.cross(a);
        let r2 = a.cross(b);
        let det = a.dot(r0);
        if det.abs() < EPSILON * EPSILON {
            return None;
        }
        // Rows of the inverse are the cross products scaled by 1/det.
        Some(Self::from_cols(r0 / det, r1 / det, r2 / det).transpose())
    }

    /// Flattens the matrix to 9 floats in column order.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 9] {
        let [a, b, c] = self.cols;
        [a.x, a.y, a.z, b.x, b.y, b.z, c.x, c.y, c.z]
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z
    }
}

/// A 4x4 column-major matrix for affine transforms and projections.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[3]` holds the translation.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };

    /// Creates a matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns row `index` of the matrix.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = Vec4::from_vec3(v, 1.0);
        m
    }

    /// Creates a non-uniform scale matrix.
    #[inline]
    pub fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates a rotation matrix from a unit quaternion.
    pub fn from_quat(q: Quaternion) -> Self {
        let (x2, y2, z2) = (q.x + q.x, q.y + q.y, q.z + q.z);
        let (xx, yy, zz) = (q.x * x2, q.y * y2, q.z * z2);
        let (xy, xz, yz) = (q.x * y2, q.x * z2, q.y * z2);
        let (wx, wy, wz) = (q.w * x2, q.w * y2, q.w * z2);

        Self::from_cols(
            Vec4::new(1.0 - (yy + zz), xy + wz, xz - wy, 0.0),
            Vec4::new(xy - wz, 1.0 - (xx + zz), yz + wx, 0.0),
            Vec4::new(xz + wy, yz - wx, 1.0 - (xx + yy), 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Composes translation, rotation and scale into `T * R * S`.
    pub fn from_trs(translation: Vec3, rotation: Quaternion, scale: Vec3) -> Self {
        let mut m = Self::from_quat(rotation);
        m.cols[0] = m.cols[0] * scale.x;
        m.cols[1] = m.cols[1] * scale.y;
        m.cols[2] = m.cols[2] * scale.z;
        m.cols[3] = Vec4::from_vec3(translation, 1.0);
        m
    }

    /// Right-handed perspective projection mapping depth to `[-1, 1]`.
    ///
    /// # Arguments
    ///
    /// * `fov_y_radians`: Vertical field of view.
    /// * `aspect_ratio`: Width divided by height.
    /// * `z_near`, `z_far`: Clip distances, both positive.
    pub fn perspective_rh_gl(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        let f = 1.0 / (fov_y_radians * 0.5).tan();
        let range_inv = 1.0 / (z_near - z_far);
        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, (z_far + z_near) * range_inv, -1.0),
            Vec4::new(0.0, 0.0, 2.0 * z_far * z_near * range_inv, 0.0),
        )
    }

    /// Right-handed orthographic projection mapping depth to `[-1, 1]`.
    pub fn orthographic_rh_gl(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let w = 1.0 / (right - left);
        let h = 1.0 / (top - bottom);
        let d = 1.0 / (z_far - z_near);
        Self::from_cols(
            Vec4::new(2.0 * w, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * h, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -2.0 * d, 0.0),
            Vec4::new(
                -(right + left) * w,
                -(top + bottom) * h,
                -(z_far + z_near) * d,
                1.0,
            ),
        )
    }

    /// The translation part of an affine transform.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }

    /// The transformed X basis vector (including scale).
    #[inline]
    pub fn x_axis(&self) -> Vec3 {
        self.cols[0].truncate()
    }

    /// The transformed Y basis vector (including scale).
    #[inline]
    pub fn y_axis(&self) -> Vec3 {
        self.cols[1].truncate()
    }

    /// The transformed Z basis vector (including scale).
    #[inline]
    pub fn z_axis(&self) -> Vec3 {
        self.cols[2].truncate()
    }

    /// Transforms a point, treating `w` as 1 and ignoring the projective row.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        (self.cols[0] * p.x + self.cols[1] * p.y + self.cols[2] * p.z + self.cols[3]).truncate()
    }

    /// Transforms a direction, ignoring translation.
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        (self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z).truncate()
    }

    /// Returns the transpose.
    pub fn transpose(&self) -> Self {
        Self::from_cols(self.get_row(0), self.get_row(1), self.get_row(2), self.get_row(3))
    }

    /// Computes the inverse, or `None` for a singular matrix.
    ///
    /// Uses the 2x2 sub-determinant expansion (Laplace along pairs of columns).
    pub fn inverse(&self) -> Option<Self> {
        let [a, b, c, d] = self.cols;

        let s0 = a.x * b.y - b.x * a.y;
        let s1 = a.x * b.z - b.x * a.z;
        let s2 = a.x * b.w - b.x * a.w;
        let s3 = a.y * b.z - b.y * a.z;
        let s4 = a.y * b.w - b.y * a.w;
        let s5 = a.z * b.w - b.z * a.w;

        let c5 = c.z * d.w - d.z * c.w;
        let c4 = c.y * d.w - d.y * c.w;
        let c3 = c.y * d.z - d.y * c.z;
        let c2 = c.x * d.w - d.x * c.w;
        let c1 = c.x * d.z - d.x * c.z;
        let c0 = c.x * d.y - d.x * c.y;

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() < f32::MIN_POSITIVE {
            return None;
        }
        let inv = 1.0 / det;

        Some(Self::from_cols(
            Vec4::new(
                (b.y * c5 - b.z * c4 + b.w * c3) * inv,
                (-a.y * c5 + a.z * c4 - a.w * c3) * inv,
                (d.y * s5 - d.z * s4 + d.w * s3) * inv,
                (-c.y * s5 + c.z * s4 - c.w * s3) * inv,
            ),
            Vec4::new(
                (-b.x * c5 + b.z * c2 - b.w * c1) * inv,
                (a.x * c5 - a.z * c2 + a.w * c1) * inv,
                (-d.x * s5 + d.z * s2 - d.w * s1) * inv,
                (c.x * s5 - c.z * s2 + c.w * s1) * inv,
            ),
            Vec4::new(
                (b.x * c4 - b.y * c2 + b.w * c0) * inv,
                (-a.x * c4 + a.y * c2 - a.w * c0) * inv,
                (d.x * s4 - d.y * s2 + d.w * s0) * inv,
                (-c.x * s4 + c.y * s2 - c.w * s0) * inv,
            ),
            Vec4::new(
                (-b.x * c3 + b.y * c1 - b.z * c0) * inv,
                (a.x * c3 - a.y * c1 + a.z * c0) * inv,
                (-d.x * s3 + d.y * s1 - d.z * s0) * inv,
                (c.x * s3 - c.y * s1 + c.z * s0) * inv,
            ),
        ))
    }

    /// Inverse of an affine (translation, rotation, scale) transform.
    ///
    /// # Returns
    ///
    /// `None` when the 3x3 block is singular.
    pub fn affine_inverse(&self) -> Option<Self> {
        let inv3 = Mat3::from_mat4(self).inverse()?;
        let t = -(inv3 * self.translation());
        Some(Self::from_cols(
            Vec4::from_vec3(inv3.cols[0], 0.0),
            Vec4::from_vec3(inv3.cols[1], 0.0),
            Vec4::from_vec3(inv3.cols[2], 0.0),
            Vec4::from_vec3(t, 1.0),
        ))
    }

    /// Flattens the matrix to 16 floats in column order.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        bytemuck::cast(self.cols)
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self {
            cols: rhs.cols.map(|col| self * col),
        }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;

    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, degrees_to_radians};

    fn mat4_approx_eq(a: &Mat4, b: &Mat4) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn test_inverse_roundtrips_to_identity() {
        let m = Mat4::from_trs(
            Vec3::new(1.0, -2.0, 3.5),
            Quaternion::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7),
            Vec3::new(2.0, 0.5, 1.5),
        );
        let inv = m.inverse().expect("trs matrix is invertible");
        assert!(mat4_approx_eq(&(m * inv), &Mat4::IDENTITY));
        let affine = m.affine_inverse().expect("trs matrix is invertible");
        assert!(mat4_approx_eq(&inv, &affine));
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        assert!(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)).inverse().is_none());
    }

    #[test]
    fn test_perspective_maps_near_and_far_to_clip_bounds() {
        let p = Mat4::perspective_rh_gl(degrees_to_radians(90.0), 1.0, 1.0, 10.0);
        let near = p * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = p * Vec4::new(0.0, 0.0, -10.0, 1.0);
        assert!(approx_eq(near.z / near.w, -1.0));
        assert!(approx_eq(far.z / far.w, 1.0));
    }

    #[test]
    fn test_orthographic_maps_box_to_unit_cube() {
        let o = Mat4::orthographic_rh_gl(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let corner = o * Vec4::new(2.0, 1.0, -10.0, 1.0);
        assert!(approx_eq(corner.x, 1.0));
        assert!(approx_eq(corner.y, 1.0));
        assert!(approx_eq(corner.z, 1.0));
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale_is_scaled_rotation() {
        let n = Mat3::normal_matrix(&Mat4::from_scale(Vec3::splat(2.0)));
        assert!(approx_eq(n.cols[0].x, 0.5));
    }
}
