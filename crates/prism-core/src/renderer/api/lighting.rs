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

//! Light and shadow enumerations shared by the light model, shader keys and the lanes.
//!
//! Discriminants are part of the light key and the shadow pass index, so they
//! are fixed.

/// The kind of light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum LightType {
    /// Infinitely distant light with parallel rays.
    #[default]
    Directional = 0,
    /// Omnidirectional light with a position and range.
    Point = 1,
    /// Cone light with a position, direction and range.
    Spot = 2,
}

impl LightType {
    /// All light types, in discriminant order.
    pub const ALL: [LightType; 3] = [LightType::Directional, LightType::Point, LightType::Spot];
}

/// The shadow filtering technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum ShadowType {
    /// Depth compare with 3x3 filtering. Encoded in RGBA8 without hardware compare.
    #[default]
    Pcf3 = 0,
    /// Variance shadow map in 8-bit RGBA.
    Vsm8 = 1,
    /// Variance shadow map in 16-bit float.
    Vsm16 = 2,
    /// Variance shadow map in 32-bit float.
    Vsm32 = 3,
    /// Hardware depth compare with 5x5 filtering.
    Pcf5 = 4,
}

impl ShadowType {
    /// The number of shadow types.
    pub const COUNT: u32 = 5;

    /// Returns `true` for the variance shadow map variants.
    pub fn is_vsm(self) -> bool {
        matches!(self, ShadowType::Vsm8 | ShadowType::Vsm16 | ShadowType::Vsm32)
    }

    /// Returns `true` for the percentage-closer variants.
    pub fn is_pcf(self) -> bool {
        matches!(self, ShadowType::Pcf3 | ShadowType::Pcf5)
    }
}

/// How often a light's shadow map is re-rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowUpdateMode {
    /// Never re-rendered. The existing map is kept.
    None = 0,
    /// Rendered once on the next frame, then reverts to `None`.
    ThisFrame = 1,
    /// Rendered every frame.
    #[default]
    Realtime = 2,
}

/// Distance attenuation curve for point and spot lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightFalloff {
    /// Linear falloff between attenuation start and end.
    #[default]
    Linear = 0,
    /// Physically based inverse-square falloff.
    InverseSquared = 1,
}

/// The kernel used to blur variance shadow maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VsmBlurMode {
    /// Uniform weights.
    Box = 0,
    /// Gaussian weights.
    #[default]
    Gaussian = 1,
}

/// A single texture channel, for cookies and opacity maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorChannel {
    /// Red.
    #[default]
    R = 0,
    /// Green.
    G = 1,
    /// Blue.
    B = 2,
    /// Alpha.
    A = 3,
}

impl ColorChannel {
    /// Parses `'r'`, `'g'`, `'b'` or `'a'`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(ColorChannel::R),
            'g' => Some(ColorChannel::G),
            'b' => Some(ColorChannel::B),
            'a' => Some(ColorChannel::A),
            _ => None,
        }
    }
}

/// Light mask bit: the light affects dynamic objects.
pub const MASK_DYNAMIC: u32 = 1;
/// Light mask bit: the light affects baked objects.
pub const MASK_BAKED: u32 = 2;
/// Light mask bit: the light only contributes to lightmaps.
pub const MASK_LIGHTMAP: u32 = 4;
