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

//! The `Color` type used for light, ambient, fog and clear colours.

use serde::{Deserialize, Serialize};

use super::Vec3;
use std::ops::Mul;

/// The exponent of the approximate gamma curve used for light and fog colours.
pub const GAMMA: f32 = 2.2;

/// An RGBA colour with `f32` components as authored (gamma space unless stated).
///
/// Components may exceed `1.0` once scaled by an intensity.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Color {
    /// The red component.
    pub r: f32,
    /// The green component.
    pub g: f32,
    /// The blue component.
    pub b: f32,
    /// The alpha component.
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Creates a colour with explicit alpha.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque colour.
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Raises each colour channel to [`GAMMA`]. Alpha is unchanged.
    ///
    /// # Example
    /// ```
    /// use prism_core::math::Color;
    /// let c = Color::rgb(0.5, 1.0, 0.0).gamma_to_linear();
    /// assert!((c.r - 0.5f32.powf(2.2)).abs() < 1e-6);
    /// assert_eq!(c.g, 1.0);
    /// ```
    #[inline]
    pub fn gamma_to_linear(&self) -> Self {
        Self {
            r: self.r.powf(GAMMA),
            g: self.g.powf(GAMMA),
            b: self.b.powf(GAMMA),
            a: self.a,
        }
    }

    /// The RGB channels as a vector.
    #[inline]
    pub fn rgb_vec(&self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    /// The RGB channels as an array, for `vec3` uniforms.
    #[inline]
    pub fn to_rgb_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// All four channels as an array, for `vec4` uniforms and clears.
    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl Mul<f32> for Color {
    type Output = Self;
    /// Scales the RGB channels, leaving alpha untouched.
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self {
            r: self.r * rhs,
            g: self.g * rhs,
            b: self.b * rhs,
            a: self.a,
        }
    }
}
