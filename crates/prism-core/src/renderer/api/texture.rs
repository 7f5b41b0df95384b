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

//! Handles and descriptors for GPU textures and render targets.

use super::state::CompareFunc;

/// An opaque handle to a texture owned by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// An opaque handle to a render target (framebuffer) owned by the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u64);

/// The pixel formats the renderer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA. Also used for RGBA-encoded depth.
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// A depth texture that can be sampled.
    Depth,
}

/// Whether a texture is a single 2D image or a six-face cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// A 2D texture.
    D2,
    /// A cube map.
    Cube,
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Point sampling.
    Nearest,
    /// Bilinear sampling.
    Linear,
}

/// Describes a texture to create.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// A debug label.
    pub label: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// The pixel format.
    pub format: TextureFormat,
    /// 2D or cube.
    pub kind: TextureKind,
    /// Filter used for both minification and magnification.
    pub filter: FilterMode,
    /// When set, sampling performs a hardware depth comparison with this function.
    pub compare: Option<CompareFunc>,
    /// Whether to allocate a mip chain.
    pub mipmaps: bool,
}

impl TextureDescriptor {
    /// A clamped, mip-less 2D texture of the given size and format.
    pub fn new_2d(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            kind: TextureKind::D2,
            filter: FilterMode::Linear,
            compare: None,
            mipmaps: false,
        }
    }
}

/// Describes a render target to create.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDescriptor {
    /// A debug label.
    pub label: String,
    /// The colour attachment, if any.
    pub color: Option<TextureId>,
    /// A sampled depth texture attachment, if any.
    pub depth_texture: Option<TextureId>,
    /// Whether to allocate an internal (non-sampled) depth buffer.
    pub depth: bool,
    /// For cube colour attachments, the face rendered into (`0..6`).
    pub face: Option<u32>,
}

/// The identity and dimensions of a render target, as tracked by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetInfo {
    /// The target handle.
    pub id: RenderTargetId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}
