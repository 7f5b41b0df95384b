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

//! Shader program keys.
//!
//! The renderer never builds shader source. It asks a [`ProgramLibrary`]
//! for a compiled program using a structured [`ShaderRequest`] and caches the
//! returned handle per material under a [`VariantKey`].
//!
//! [`ProgramLibrary`]: crate::renderer::traits::ProgramLibrary

use super::lighting::{ColorChannel, LightType, ShadowType, VsmBlurMode};
use crate::prism_bitflags;

/// An opaque handle to a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u64);

/// The render pass a shader variant is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderPass {
    /// Lit forward rendering into an LDR target.
    Forward,
    /// Lit forward rendering into an HDR target.
    ForwardHdr,
    /// Depth-only rendering.
    Depth,
    /// Shadow map rendering for a light type and shadow technique.
    Shadow {
        /// The type of the light rendering the map.
        light: LightType,
        /// The shadow technique.
        shadow: ShadowType,
    },
}

impl ShaderPass {
    /// Index of the first shadow pass.
    pub const SHADOW_BASE: u32 = 3;
    /// One past the largest pass index.
    pub const COUNT: u32 = Self::SHADOW_BASE + ShadowType::COUNT * 3;

    /// The numeric pass index. Shadow passes occupy `3..18`.
    pub const fn index(self) -> u32 {
        match self {
            ShaderPass::Forward => 0,
            ShaderPass::ForwardHdr => 1,
            ShaderPass::Depth => 2,
            ShaderPass::Shadow { light, shadow } => {
                Self::SHADOW_BASE + shadow as u32 + light as u32 * ShadowType::COUNT
            }
        }
    }

    /// The bit selecting this pass in a parameter's pass mask.
    ///
    /// All shadow passes share the bit of index [`Self::SHADOW_BASE`].
    pub const fn flag(self) -> u32 {
        match self {
            ShaderPass::Shadow { .. } => 1 << Self::SHADOW_BASE,
            other => 1 << other.index(),
        }
    }
}

prism_bitflags! {
    /// Per-instance shader feature toggles (low 16 bits) and light mask (high 16 bits).
    pub struct ShaderDefs: u32 {
        /// The instance does not receive shadows.
        const NO_SHADOW = 1 << 0;
        /// Skinned vertices.
        const SKIN = 1 << 1;
        /// First UV set present.
        const UV0 = 1 << 2;
        /// Second UV set present.
        const UV1 = 1 << 3;
        /// Vertex colours present.
        const VCOLOR = 1 << 4;
        /// Hardware instancing.
        const INSTANCING = 1 << 5;
        /// Lightmapped.
        const LIGHTMAP = 1 << 6;
        /// Directional lightmap.
        const DIR_LIGHTMAP = 1 << 7;
        /// Screen-space rendering.
        const SCREEN_SPACE = 1 << 8;
        /// Tangents present.
        const TANGENTS = 1 << 9;
        /// Morphed positions.
        const MORPH_POSITION = 1 << 10;
        /// Morphed normals.
        const MORPH_NORMAL = 1 << 11;
        /// Texture-based morphing.
        const MORPH_TEXTURE_BASED = 1 << 12;
    }
}

impl ShaderDefs {
    const TOGGLE_BITS: u32 = 0xffff;

    /// The light mask stored in the high 16 bits.
    pub const fn mask(&self) -> u32 {
        self.bits() >> 16
    }

    /// Replaces the light mask stored in the high 16 bits.
    pub const fn with_mask(self, mask: u32) -> Self {
        Self::from_bits((self.bits() & Self::TOGGLE_BITS) | ((mask & 0xffff) << 16))
    }
}

/// Key of a cached shader variant inside a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    /// The pass index.
    pub pass: u32,
    /// The instance shader defs, including the light mask.
    pub defs: ShaderDefs,
    /// The light hash of the layer being rendered.
    pub light_hash: u32,
}

/// Everything a [`ProgramLibrary`] needs to produce a variant.
///
/// [`ProgramLibrary`]: crate::renderer::traits::ProgramLibrary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderRequest {
    /// The material requesting the program.
    pub material_id: u32,
    /// The pass the program is for.
    pub pass: ShaderPass,
    /// Instance feature toggles and light mask.
    pub defs: ShaderDefs,
    /// Keys of the lights affecting the variant, grouped by type in sorted order.
    pub light_keys: Vec<u32>,
    /// Channel of the opacity map, when the material has one.
    pub opacity_channel: Option<ColorChannel>,
    /// Whether the material uses alpha testing.
    pub alpha_test: bool,
}

/// Identifies a separable VSM blur program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlurProgramKey {
    /// Box or gaussian weights.
    pub mode: VsmBlurMode,
    /// The kernel size in taps.
    pub kernel_size: u32,
    /// Whether the source encodes moments in RGBA8.
    pub packed: bool,
}
