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

//! Materials: render state, uniform parameters and shader variants.

use ahash::AHashMap;

use crate::renderer::api::{
    BlendState, BlendType, ColorChannel, ColorWriteMask, CullMode, ShaderHandle,
    StencilParameters, TextureId, UniformValue, VariantKey,
};

/// Index of a material in the render world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);

/// A named uniform value restricted to a set of passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParameter {
    /// The uniform name.
    pub name: String,
    /// The value bound before drawing.
    pub value: UniformValue,
    /// Bitmask of [`ShaderPass::flag`](crate::renderer::api::ShaderPass::flag) values.
    pub pass_flags: u32,
}

/// Parameters bound on every pass.
pub const ALL_PASSES: u32 = 0xFFFF_FFFF;

/// An ordered set of [`ShaderParameter`]s, unique by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: Vec<ShaderParameter>,
}

impl ParameterSet {
    /// Inserts or replaces a parameter.
    pub fn set(&mut self, name: &str, value: UniformValue, pass_flags: u32) {
        if let Some(p) = self.params.iter_mut().find(|p| p.name == name) {
            p.value = value;
            p.pass_flags = pass_flags;
        } else {
            self.params.push(ShaderParameter {
                name: name.to_owned(),
                value,
                pass_flags,
            });
        }
    }

    /// Looks a parameter up by name.
    pub fn get(&self, name: &str) -> Option<&ShaderParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Removes a parameter by name.
    pub fn remove(&mut self, name: &str) -> Option<ShaderParameter> {
        let idx = self.params.iter().position(|p| p.name == name)?;
        Some(self.params.remove(idx))
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ShaderParameter> {
        self.params.iter()
    }

    /// Parameters that apply to a pass.
    pub fn for_pass(&self, pass_flag: u32) -> impl Iterator<Item = &ShaderParameter> {
        self.params.iter().filter(move |p| p.pass_flags & pass_flag != 0)
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Render state and shader inputs shared by mesh instances.
///
/// Compiled programs are cached per [`VariantKey`]. The cache is cleared when
/// lights or shader-affecting settings change.
#[derive(Debug, Clone)]
pub struct Material {
    /// Identity, also the low bits of the forward sort key.
    pub id: MaterialId,
    /// A debug name.
    pub name: String,
    blend_type: BlendType,
    /// The blend state derived from the blend type, editable for custom setups.
    pub blend: BlendState,
    /// Colour channels written.
    pub color_write: ColorWriteMask,
    /// Whether depth is written.
    pub depth_write: bool,
    /// Whether depth is tested.
    pub depth_test: bool,
    /// Fragments with alpha below this are discarded. Zero disables the test.
    pub alpha_test: f32,
    /// Whether alpha-to-coverage is enabled.
    pub alpha_to_coverage: bool,
    /// Constant depth bias.
    pub depth_bias: f32,
    /// Slope-scaled depth bias.
    pub slope_depth_bias: f32,
    /// The culled face.
    pub cull: CullMode,
    /// Front face stencil state.
    pub stencil_front: Option<StencilParameters>,
    /// Back face stencil state.
    pub stencil_back: Option<StencilParameters>,
    /// A texture whose channel provides opacity.
    pub opacity_map: Option<TextureId>,
    /// The channel of [`Material::opacity_map`] read.
    pub opacity_channel: ColorChannel,
    /// Whether lit shader variants are generated.
    pub use_lighting: bool,
    /// Uniform values bound before drawing.
    pub parameters: ParameterSet,
    /// The program used by the last draw with this material.
    pub shader: Option<ShaderHandle>,
    variants: AHashMap<VariantKey, ShaderHandle>,
    dirty_blend: bool,
}

impl Material {
    /// Creates an opaque, lit, back-face culled material.
    pub fn new(id: MaterialId) -> Self {
        Self {
            id,
            name: String::from("Untitled"),
            blend_type: BlendType::None,
            blend: BlendType::None.blend_state(),
            color_write: ColorWriteMask::ALL,
            depth_write: true,
            depth_test: true,
            alpha_test: 0.0,
            alpha_to_coverage: false,
            depth_bias: 0.0,
            slope_depth_bias: 0.0,
            cull: CullMode::Back,
            stencil_front: None,
            stencil_back: None,
            opacity_map: None,
            opacity_channel: ColorChannel::A,
            use_lighting: true,
            parameters: ParameterSet::default(),
            shader: None,
            variants: AHashMap::new(),
            dirty_blend: false,
        }
    }

    /// The blend preset.
    pub fn blend_type(&self) -> BlendType {
        self.blend_type
    }

    /// Applies a blend preset. Moving between opaque and blended marks the material
    /// so the layers re-sort it into the right list.
    pub fn set_blend_type(&mut self, blend_type: BlendType) {
        let was_opaque = self.is_opaque();
        self.blend_type = blend_type;
        self.blend = blend_type.blend_state();
        if was_opaque != self.is_opaque() {
            self.dirty_blend = true;
        }
    }

    /// Whether the material draws with blending off.
    pub fn is_opaque(&self) -> bool {
        self.blend_type == BlendType::None
    }

    /// The blend type used for sorting: alpha-tested materials sort as blended.
    pub fn sort_blend_type(&self) -> BlendType {
        if self.alpha_to_coverage || self.alpha_test > 0.0 {
            BlendType::Normal
        } else {
            self.blend_type
        }
    }

    /// Returns and clears the opaque/blended change flag.
    pub fn take_dirty_blend(&mut self) -> bool {
        std::mem::take(&mut self.dirty_blend)
    }

    /// A cached variant.
    pub fn variant(&self, key: &VariantKey) -> Option<ShaderHandle> {
        self.variants.get(key).copied()
    }

    /// Caches a variant.
    pub fn insert_variant(&mut self, key: VariantKey, shader: ShaderHandle) {
        self.variants.insert(key, shader);
    }

    /// The number of cached variants.
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Forgets all compiled variants.
    pub fn clear_variants(&mut self) {
        self.variants.clear();
        self.shader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::ShaderDefs;

    #[test]
    fn test_blend_switch_marks_dirty_only_across_opacity() {
        let mut mat = Material::new(MaterialId(1));
        mat.set_blend_type(BlendType::Additive);
        assert!(mat.take_dirty_blend());
        mat.set_blend_type(BlendType::Normal);
        assert!(!mat.take_dirty_blend());
        assert!(mat.blend.enabled);
    }

    #[test]
    fn test_alpha_tested_sorts_as_normal() {
        let mut mat = Material::new(MaterialId(1));
        assert_eq!(mat.sort_blend_type(), BlendType::None);
        mat.alpha_test = 0.5;
        assert_eq!(mat.sort_blend_type(), BlendType::Normal);
    }

    #[test]
    fn test_variant_cache() {
        let mut mat = Material::new(MaterialId(1));
        let key = VariantKey {
            pass: 0,
            defs: ShaderDefs::empty(),
            light_hash: 7,
        };
        mat.insert_variant(key, ShaderHandle(3));
        assert_eq!(mat.variant(&key), Some(ShaderHandle(3)));
        mat.clear_variants();
        assert_eq!(mat.variant_count(), 0);
    }

    #[test]
    fn test_parameters_replace_by_name() {
        let mut params = ParameterSet::default();
        params.set("tint", UniformValue::Float(1.0), ALL_PASSES);
        params.set("tint", UniformValue::Float(2.0), 1);
        assert_eq!(params.iter().count(), 1);
        assert_eq!(params.for_pass(1 << 3).count(), 0);
        assert_eq!(params.get("tint").map(|p| &p.value), Some(&UniformValue::Float(2.0)));
    }
}
