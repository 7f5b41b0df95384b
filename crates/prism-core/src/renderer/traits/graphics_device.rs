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

//! The `GraphicsDevice` contract consumed by the renderer.

use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use std::fmt::Debug;

/// A stateful immediate-mode graphics device.
///
/// The renderer drives the device with state setters followed by draws and
/// never issues driver calls directly. Every method takes `&mut self`: a
/// frame is recorded on a single thread.
pub trait GraphicsDevice: Debug {
    /// The features and limits of the device.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Creates a texture.
    /// ## Arguments
    /// * `descriptor` - The size, format, kind and sampling of the texture.
    /// ## Returns
    /// The handle of the new texture.
    /// ## Errors
    /// * `ResourceError` - If the allocation fails.
    fn create_texture(&mut self, descriptor: &TextureDescriptor)
        -> Result<TextureId, ResourceError>;

    /// Destroys a texture. Destroying an unknown handle is an error.
    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError>;

    /// Uploads raw pixel data into mip 0 of a 2D texture.
    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a render target.
    /// ## Arguments
    /// * `descriptor` - The attachments of the target.
    /// ## Returns
    /// The handle of the new render target.
    /// ## Errors
    /// * `ResourceError` - If the allocation fails or an attachment is invalid.
    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError>;

    /// Destroys a render target. Attachments are not destroyed.
    fn destroy_render_target(&mut self, id: RenderTargetId) -> Result<(), ResourceError>;

    /// Uploads vertex data into a dynamic vertex buffer.
    fn write_vertex_buffer(&mut self, id: VertexBufferId, data: &[u8])
        -> Result<(), ResourceError>;

    /// Binds a render target, or the backbuffer for `None`.
    fn set_render_target(&mut self, target: Option<RenderTargetId>);

    /// Sets the viewport in pixels.
    fn set_viewport(&mut self, rect: PixelRect);

    /// Sets the scissor rectangle in pixels.
    fn set_scissor(&mut self, rect: PixelRect);

    /// Clears the bound target.
    fn clear(&mut self, options: &ClearOptions);

    /// Binds a shader program.
    /// ## Errors
    /// * `ShaderError::BindFailed` - If the program cannot be used (e.g. it failed to link).
    fn set_shader(&mut self, shader: ShaderHandle) -> Result<(), ShaderError>;

    /// Sets a named uniform for subsequent draws.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    /// Binds a vertex buffer to a stream slot.
    fn set_vertex_buffer(&mut self, buffer: VertexBufferId, slot: u32, offset: u32);

    /// Binds an index buffer, or unbinds with `None`.
    fn set_index_buffer(&mut self, buffer: Option<IndexBufferId>);

    /// Draws a primitive range, instanced when `instances` is set.
    fn draw(&mut self, primitive: &Primitive, instances: Option<u32>);

    /// Sets the blend state.
    fn set_blend_state(&mut self, state: &BlendState);

    /// Sets the colour write mask.
    fn set_color_write(&mut self, mask: ColorWriteMask);

    /// Enables or disables depth writes.
    fn set_depth_write(&mut self, enabled: bool);

    /// Enables or disables the depth test.
    fn set_depth_test(&mut self, enabled: bool);

    /// Enables or disables alpha-to-coverage.
    fn set_alpha_to_coverage(&mut self, enabled: bool);

    /// Sets the face culling mode.
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Sets the depth bias, or disables it with `None`.
    fn set_depth_bias(&mut self, bias: Option<DepthBias>);

    /// Enables or disables the stencil test.
    fn set_stencil_test(&mut self, enabled: bool);

    /// Sets the stencil function and operations for one or both faces.
    fn set_stencil(&mut self, face: StencilFace, params: &StencilParameters);

    /// Signals the end of a batch of draws for a pass.
    fn update_end(&mut self) {}
}
