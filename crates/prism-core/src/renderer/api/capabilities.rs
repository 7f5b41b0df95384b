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

//! What the graphics device can do.

/// Feature and limit flags reported by a [`GraphicsDevice`].
///
/// Light setters and the shadow resource manager consult these to pick
/// formats and to downgrade unsupported shadow techniques.
///
/// [`GraphicsDevice`]: crate::renderer::traits::GraphicsDevice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Depth textures with hardware comparison sampling.
    pub hardware_depth_compare: bool,
    /// 32-bit float textures can be rendered to.
    pub float_renderable: bool,
    /// 32-bit float textures can be filtered.
    pub float_linear: bool,
    /// 16-bit float textures can be rendered to.
    pub half_float_renderable: bool,
    /// 16-bit float textures can be filtered.
    pub half_float_linear: bool,
    /// Shader derivatives are available, enabling polygon-offset emulation.
    pub standard_derivatives: bool,
    /// Bone matrices can be stored in a float texture.
    pub bone_textures: bool,
    /// The largest 2D texture side.
    pub max_texture_size: u32,
    /// The largest cube map face side.
    pub max_cube_map_size: u32,
    /// The backbuffer width in pixels.
    pub width: u32,
    /// The backbuffer height in pixels.
    pub height: u32,
}

impl Default for DeviceCapabilities {
    /// A modern device with every feature.
    fn default() -> Self {
        Self {
            hardware_depth_compare: true,
            float_renderable: true,
            float_linear: true,
            half_float_renderable: true,
            half_float_linear: true,
            standard_derivatives: true,
            bone_textures: true,
            max_texture_size: 8192,
            max_cube_map_size: 4096,
            width: 1280,
            height: 720,
        }
    }
}

impl DeviceCapabilities {
    /// A device without float render targets or hardware depth compare.
    pub fn minimal() -> Self {
        Self {
            hardware_depth_compare: false,
            float_renderable: false,
            float_linear: false,
            half_float_renderable: false,
            half_float_linear: false,
            standard_derivatives: true,
            bone_textures: false,
            max_texture_size: 2048,
            max_cube_map_size: 1024,
            ..Self::default()
        }
    }
}
