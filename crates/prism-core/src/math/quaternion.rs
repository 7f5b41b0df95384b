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

//! Unit quaternions for rotations.

use serde::{Deserialize, Serialize};

use super::{Vec3, DEG_TO_RAD, EPSILON};
use std::ops::Mul;

/// A rotation stored as `(x, y, z, w)` with `w` the scalar part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quaternion {
    /// The x component of the vector part.
    pub x: f32,
    /// The y component of the vector part.
    pub y: f32,
    /// The z component of the vector part.
    pub z: f32,
    /// The scalar part.
    pub w: f32,
}

impl Quaternion {
    /// No rotation.
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Creates a quaternion from raw components. The result is not normalized.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle_radians` around `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_radians: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_radians * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Rotation from Euler angles in degrees.
    ///
    /// The composed rotation applies X first, then Y, then Z (`q = qz * qy * qx`),
    /// which is the convention used by the shadow-camera face table.
    pub fn from_euler_degrees(x: f32, y: f32, z: f32) -> Self {
        let half = 0.5 * DEG_TO_RAD;
        let (sx, cx) = (x * half).sin_cos();
        let (sy, cy) = (y * half).sin_cos();
        let (sz, cz) = (z * half).sin_cos();

        Self::new(
            sx * cy * cz - cx * sy * sz,
            cx * sy * cz + sx * cy * sz,
            cx * cy * sz - sx * sy * cz,
            cx * cy * cz + sx * sy * sz,
        )
    }

    /// Squared magnitude.
    #[inline]
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Returns the unit quaternion, or identity for a degenerate input.
    pub fn normalize(&self) -> Self {
        let mag_sq = self.magnitude_squared();
        if mag_sq < EPSILON * EPSILON {
            return Self::IDENTITY;
        }
        let inv = 1.0 / mag_sq.sqrt();
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// The inverse rotation of a unit quaternion.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates a vector.
    pub fn rotate_vec3(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let s = self.w;
        2.0 * u.dot(v) * u + (s * s - u.dot(u)) * v + 2.0 * s * u.cross(v)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Self;
    /// Hamilton product: `self * rhs` applies `rhs` first.
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

impl Mul<Vec3> for Quaternion {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.rotate_vec3(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn test_euler_single_axis_matches_axis_angle() {
        let e = Quaternion::from_euler_degrees(0.0, 90.0, 0.0);
        let a = Quaternion::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_2);
        assert_relative_eq!(e.x, a.x, epsilon = 1e-6);
        assert_relative_eq!(e.y, a.y, epsilon = 1e-6);
        assert_relative_eq!(e.z, a.z, epsilon = 1e-6);
        assert_relative_eq!(e.w, a.w, epsilon = 1e-6);
        assert_vec3_eq(e * Vec3::Z, Vec3::X);
    }

    #[test]
    fn test_rotate_local_minus_ninety_about_x_points_down() {
        let q = Quaternion::from_euler_degrees(-90.0, 0.0, 0.0);
        // Camera forward (-Z) becomes -Y.
        assert_vec3_eq(q * -Vec3::Z, -Vec3::Y);
    }

    #[test]
    fn test_conjugate_undoes_rotation() {
        let q = Quaternion::from_euler_degrees(30.0, 45.0, 60.0);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_vec3_eq(q.conjugate() * (q * v), v);
    }
}
