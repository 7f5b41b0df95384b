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

//! Shared fixtures for the renderer integration tests: a device that records
//! every call it receives and a program library that hands out fake handles.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use prism_core::math::{Aabb, Mat4, Vec3};
use prism_core::renderer::{
    Camera, Light, MaterialId, MeshInstanceId,
    BlendState, BlurProgramKey, ClearOptions, ColorWriteMask, CullMode, DepthBias,
    DeviceCapabilities, GraphicsDevice, IndexBufferId, Mesh, MeshId, PixelRect, Primitive,
    PrimitiveTopology, ProgramLibrary, RenderTargetDescriptor, RenderTargetId, ResourceError,
    ShaderError, ShaderHandle, ShaderRequest, StencilFace, StencilParameters, TextureDescriptor,
    TextureId, UniformValue, VertexBufferId,
};
use prism_lanes::{CameraId, ForwardRenderer, Layer, LayerComposition, LightId, RenderWorld, RendererConfig};

/// One call received by [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateTexture(TextureId),
    DestroyTexture(TextureId),
    WriteTexture(TextureId, usize),
    CreateRenderTarget(RenderTargetId),
    DestroyRenderTarget(RenderTargetId),
    WriteVertexBuffer(VertexBufferId, usize),
    SetRenderTarget(Option<RenderTargetId>),
    Viewport(PixelRect),
    Scissor(PixelRect),
    Clear(ClearOptions),
    SetShader(ShaderHandle),
    Uniform(String, UniformValue),
    VertexBuffer(VertexBufferId, u32),
    IndexBuffer(Option<IndexBufferId>),
    Draw(Primitive, Option<u32>),
    Blend(BlendState),
    ColorWrite(ColorWriteMask),
    DepthWrite(bool),
    DepthTest(bool),
    AlphaToCoverage(bool),
    Cull(CullMode),
    DepthBias(Option<DepthBias>),
    StencilTest(bool),
    Stencil(StencilFace, StencilParameters),
}

/// A graphics device that records calls instead of talking to a GPU.
#[derive(Debug)]
pub struct RecordingDevice {
    pub caps: DeviceCapabilities,
    pub calls: Vec<DeviceCall>,
    pub uniforms: HashMap<String, UniformValue>,
    pub textures: HashSet<TextureId>,
    pub render_targets: HashSet<RenderTargetId>,
    pub texture_descriptors: HashMap<TextureId, TextureDescriptor>,
    pub failing_shaders: HashSet<ShaderHandle>,
    next_id: u64,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_caps(DeviceCapabilities::default())
    }

    pub fn with_caps(caps: DeviceCapabilities) -> Self {
        Self {
            caps,
            calls: Vec::new(),
            uniforms: HashMap::new(),
            textures: HashSet::new(),
            render_targets: HashSet::new(),
            texture_descriptors: HashMap::new(),
            failing_shaders: HashSet::new(),
            next_id: 1,
        }
    }

    pub fn clear_log(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> Vec<(Primitive, Option<u32>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Draw(p, n) => Some((*p, *n)),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> Vec<ClearOptions> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Clear(o) => Some(*o),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    /// The values a uniform received, in order.
    pub fn uniform_history(&self, name: &str) -> Vec<UniformValue> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Uniform(n, v) if n == name => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// The position of the first call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&DeviceCall) -> bool) -> Option<usize> {
        self.calls.iter().position(predicate)
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsDevice for RecordingDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = TextureId(self.allocate());
        self.textures.insert(id);
        self.texture_descriptors.insert(id, descriptor.clone());
        self.calls.push(DeviceCall::CreateTexture(id));
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError> {
        if !self.textures.remove(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        self.calls.push(DeviceCall::DestroyTexture(id));
        Ok(())
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        if !self.textures.contains(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        self.calls.push(DeviceCall::WriteTexture(id, data.len()));
        Ok(())
    }

    fn create_render_target(
        &mut self,
        _descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError> {
        let id = RenderTargetId(self.allocate());
        self.render_targets.insert(id);
        self.calls.push(DeviceCall::CreateRenderTarget(id));
        Ok(id)
    }

    fn destroy_render_target(&mut self, id: RenderTargetId) -> Result<(), ResourceError> {
        if !self.render_targets.remove(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        self.calls.push(DeviceCall::DestroyRenderTarget(id));
        Ok(())
    }

    fn write_vertex_buffer(&mut self, id: VertexBufferId, data: &[u8]) -> Result<(), ResourceError> {
        self.calls.push(DeviceCall::WriteVertexBuffer(id, data.len()));
        Ok(())
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.calls.push(DeviceCall::SetRenderTarget(target));
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.calls.push(DeviceCall::Viewport(rect));
    }

    fn set_scissor(&mut self, rect: PixelRect) {
        self.calls.push(DeviceCall::Scissor(rect));
    }

    fn clear(&mut self, options: &ClearOptions) {
        self.calls.push(DeviceCall::Clear(*options));
    }

    fn set_shader(&mut self, shader: ShaderHandle) -> Result<(), ShaderError> {
        if self.failing_shaders.contains(&shader) {
            return Err(ShaderError::BindFailed {
                details: format!("program {} failed to link", shader.0),
            });
        }
        self.calls.push(DeviceCall::SetShader(shader));
        Ok(())
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.uniforms.insert(name.to_string(), value.clone());
        self.calls.push(DeviceCall::Uniform(name.to_string(), value));
    }

    fn set_vertex_buffer(&mut self, buffer: VertexBufferId, slot: u32, _offset: u32) {
        self.calls.push(DeviceCall::VertexBuffer(buffer, slot));
    }

    fn set_index_buffer(&mut self, buffer: Option<IndexBufferId>) {
        self.calls.push(DeviceCall::IndexBuffer(buffer));
    }

    fn draw(&mut self, primitive: &Primitive, instances: Option<u32>) {
        self.calls.push(DeviceCall::Draw(*primitive, instances));
    }

    fn set_blend_state(&mut self, state: &BlendState) {
        self.calls.push(DeviceCall::Blend(*state));
    }

    fn set_color_write(&mut self, mask: ColorWriteMask) {
        self.calls.push(DeviceCall::ColorWrite(mask));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::DepthWrite(enabled));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::DepthTest(enabled));
    }

    fn set_alpha_to_coverage(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::AlphaToCoverage(enabled));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.calls.push(DeviceCall::Cull(mode));
    }

    fn set_depth_bias(&mut self, bias: Option<DepthBias>) {
        self.calls.push(DeviceCall::DepthBias(bias));
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::StencilTest(enabled));
    }

    fn set_stencil(&mut self, face: StencilFace, params: &StencilParameters) {
        self.calls.push(DeviceCall::Stencil(face, *params));
    }
}

/// A program library that returns one handle per distinct request.
#[derive(Debug, Default)]
pub struct MockLibrary {
    pub requests: Vec<ShaderRequest>,
    pub blur_requests: Vec<BlurProgramKey>,
    pub failing_materials: HashSet<u32>,
    handles: HashMap<String, ShaderHandle>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(materials: &[u32]) -> Self {
        Self {
            failing_materials: materials.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn handle_for(&mut self, key: String) -> ShaderHandle {
        let next = ShaderHandle(100 + self.handles.len() as u64);
        *self.handles.entry(key).or_insert(next)
    }
}

impl ProgramLibrary for MockLibrary {
    fn get_program(&mut self, request: &ShaderRequest) -> Result<ShaderHandle, ShaderError> {
        self.requests.push(request.clone());
        if self.failing_materials.contains(&request.material_id) {
            return Err(ShaderError::CompilationFailed {
                material_id: request.material_id,
                pass: request.pass,
                details: "syntax error".to_string(),
            });
        }
        Ok(self.handle_for(format!("{request:?}")))
    }

    fn get_blur_program(&mut self, key: &BlurProgramKey) -> Result<ShaderHandle, ShaderError> {
        self.blur_requests.push(*key);
        Ok(self.handle_for(format!("{key:?}")))
    }
}

/// A unit cube drawn as 36 non-indexed vertices.
pub fn cube_mesh(id: u32) -> Mesh {
    Mesh::new(
        MeshId(id),
        VertexBufferId(id as u64),
        Primitive {
            topology: PrimitiveTopology::Triangles,
            base: 0,
            count: 36,
            indexed: false,
        },
        Aabb::new(Vec3::ZERO, Vec3::new(0.5, 0.5, 0.5)),
    )
}

/// Routes `log` output to the test harness, once per binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub type TestRenderer = ForwardRenderer<RecordingDevice, MockLibrary>;

pub fn renderer() -> TestRenderer {
    renderer_with(RecordingDevice::new(), MockLibrary::new())
}

pub fn renderer_with(device: RecordingDevice, library: MockLibrary) -> TestRenderer {
    init_logging();
    ForwardRenderer::new(device, library, RendererConfig::default())
        .expect("default config is valid")
}

/// Composition id of the layer every [`Scene`] starts with.
pub const WORLD_LAYER: u32 = 0;

/// A world with one camera at the origin looking down `-Z`, rendered by one layer.
pub struct Scene {
    pub world: RenderWorld,
    pub composition: LayerComposition,
    pub camera: CameraId,
    next_mesh: u32,
}

impl Scene {
    pub fn new() -> Self {
        let mut world = RenderWorld::new();
        let camera = world.add_camera(Camera::new());
        let mut layer = Layer::new(WORLD_LAYER, "World");
        layer.add_camera(camera);
        let mut composition = LayerComposition::new();
        composition.push(layer);
        Self {
            world,
            composition,
            camera,
            next_mesh: 1,
        }
    }

    pub fn layer(&mut self) -> &mut Layer {
        self.composition
            .layer_mut(WORLD_LAYER)
            .expect("the world layer exists")
    }

    /// Adds a cube at `position` to the world layer.
    pub fn add_cube(&mut self, material: MaterialId, position: Vec3) -> MeshInstanceId {
        self.add_cube_with(material, position, false)
    }

    /// Adds a shadow-casting cube at `position` to the world layer.
    pub fn add_caster(&mut self, material: MaterialId, position: Vec3) -> MeshInstanceId {
        self.add_cube_with(material, position, true)
    }

    fn add_cube_with(&mut self, material: MaterialId, position: Vec3, cast_shadow: bool) -> MeshInstanceId {
        let id = self.world.add_mesh_instance(cube_mesh(self.next_mesh), material);
        self.next_mesh += 1;
        let instance = self.world.mesh_instance_mut(id).expect("just added");
        instance.set_world_transform(Mat4::from_translation(position));
        instance.cast_shadow = cast_shadow;
        let layer = self
            .composition
            .layer_mut(WORLD_LAYER)
            .expect("the world layer exists");
        layer.add_mesh_instances(&self.world, &[id], false);
        id
    }

    /// Enables `light`, adds it to the world and to the world layer.
    pub fn add_light(&mut self, mut light: Light) -> LightId {
        light.set_enabled(true);
        let id = self.world.add_light(light);
        self.layer().add_light(id);
        id
    }

    pub fn render(&mut self, renderer: &mut TestRenderer) -> Result<(), prism_core::renderer::RenderError> {
        renderer.render_composition(&mut self.world, &mut self.composition)
    }
}
