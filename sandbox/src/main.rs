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

// Prism Sandbox
// Renders a small scene through a device that only logs what it is asked to do.

use std::collections::HashMap;

use anyhow::{Context, Result};
use prism_core::math::{Aabb, Color, Mat4, Quaternion, Vec3};
use prism_core::renderer::{
    BlendState, BlendType, BlurProgramKey, Camera, ClearOptions, ColorWriteMask, CullMode,
    DepthBias, DeviceCapabilities, GraphicsDevice, IndexBufferId, Light, LightType, Material,
    MaterialId, Mesh, MeshId, PixelRect, Primitive, PrimitiveTopology, ProgramLibrary,
    RenderTargetDescriptor, RenderTargetId, ResourceError, ShaderError, ShaderHandle,
    ShaderRequest, ShadowType, StencilFace, StencilParameters, TextureDescriptor, TextureId,
    UniformValue, VertexBufferId,
};
use prism_lanes::{ForwardRenderer, Layer, LayerComposition, RenderLane, RenderWorld, RendererConfig};

const FRAMES: usize = 8;

/// A device with no GPU behind it. Resources are plain counters and every
/// draw is logged at trace level.
#[derive(Debug)]
struct LoggingDevice {
    caps: DeviceCapabilities,
    next_id: u64,
    live_textures: usize,
    live_targets: usize,
    draws: usize,
}

impl LoggingDevice {
    fn new() -> Self {
        Self {
            caps: DeviceCapabilities::default(),
            next_id: 1,
            live_textures: 0,
            live_targets: 0,
            draws: 0,
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsDevice for LoggingDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.live_textures += 1;
        let id = TextureId(self.allocate());
        log::debug!(
            "LoggingDevice: texture {:?} '{}' {}x{} {:?}",
            id,
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError> {
        self.live_textures = self.live_textures.saturating_sub(1);
        log::debug!("LoggingDevice: destroyed texture {id:?}");
        Ok(())
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        log::trace!("LoggingDevice: {} bytes to {id:?}", data.len());
        Ok(())
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError> {
        self.live_targets += 1;
        let id = RenderTargetId(self.allocate());
        log::debug!("LoggingDevice: render target {id:?} '{}'", descriptor.label);
        Ok(id)
    }

    fn destroy_render_target(&mut self, id: RenderTargetId) -> Result<(), ResourceError> {
        self.live_targets = self.live_targets.saturating_sub(1);
        log::debug!("LoggingDevice: destroyed render target {id:?}");
        Ok(())
    }

    fn write_vertex_buffer(&mut self, id: VertexBufferId, data: &[u8]) -> Result<(), ResourceError> {
        log::trace!("LoggingDevice: {} bytes to {id:?}", data.len());
        Ok(())
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        log::trace!("LoggingDevice: bind target {target:?}");
    }

    fn set_viewport(&mut self, _rect: PixelRect) {}

    fn set_scissor(&mut self, _rect: PixelRect) {}

    fn clear(&mut self, options: &ClearOptions) {
        log::trace!("LoggingDevice: clear {:?}", options.flags);
    }

    fn set_shader(&mut self, shader: ShaderHandle) -> Result<(), ShaderError> {
        log::trace!("LoggingDevice: program {}", shader.0);
        Ok(())
    }

    fn set_uniform(&mut self, _name: &str, _value: UniformValue) {}

    fn set_vertex_buffer(&mut self, _buffer: VertexBufferId, _slot: u32, _offset: u32) {}

    fn set_index_buffer(&mut self, _buffer: Option<IndexBufferId>) {}

    fn draw(&mut self, primitive: &Primitive, instances: Option<u32>) {
        self.draws += 1;
        log::trace!(
            "LoggingDevice: draw {} {:?} vertices, instances {:?}",
            primitive.count,
            primitive.topology,
            instances
        );
    }

    fn set_blend_state(&mut self, _state: &BlendState) {}

    fn set_color_write(&mut self, _mask: ColorWriteMask) {}

    fn set_depth_write(&mut self, _enabled: bool) {}

    fn set_depth_test(&mut self, _enabled: bool) {}

    fn set_alpha_to_coverage(&mut self, _enabled: bool) {}

    fn set_cull_mode(&mut self, _mode: CullMode) {}

    fn set_depth_bias(&mut self, _bias: Option<DepthBias>) {}

    fn set_stencil_test(&mut self, _enabled: bool) {}

    fn set_stencil(&mut self, _face: StencilFace, _params: &StencilParameters) {}
}

/// Hands out one program handle per distinct request.
#[derive(Debug, Default)]
struct DemoLibrary {
    programs: HashMap<String, ShaderHandle>,
}

impl DemoLibrary {
    fn handle(&mut self, key: String) -> ShaderHandle {
        let next = ShaderHandle(self.programs.len() as u64 + 1);
        *self.programs.entry(key).or_insert_with(|| {
            log::info!("DemoLibrary: compiled program {}", next.0);
            next
        })
    }
}

impl ProgramLibrary for DemoLibrary {
    fn get_program(&mut self, request: &ShaderRequest) -> Result<ShaderHandle, ShaderError> {
        Ok(self.handle(format!("{request:?}")))
    }

    fn get_blur_program(&mut self, key: &BlurProgramKey) -> Result<ShaderHandle, ShaderError> {
        Ok(self.handle(format!("{key:?}")))
    }
}

fn cube(id: u32) -> Mesh {
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

/// A ground slab, a ring of shadow-casting cubes, a few glass cubes, a sun
/// and a spot light.
fn build_scene(world: &mut RenderWorld) -> (LayerComposition, prism_lanes::CameraId) {
    let mut stone = Material::new(MaterialId(0));
    stone.name = "Stone".to_string();
    let stone = world.add_material(stone);

    let mut glass = Material::new(MaterialId(0));
    glass.name = "Glass".to_string();
    glass.set_blend_type(BlendType::Normal);
    glass.depth_write = false;
    let glass = world.add_material(glass);

    let mut camera = Camera::new();
    camera.position = Vec3::new(0.0, 4.0, 12.0);
    camera.clear.color = Color::rgb(0.1, 0.1, 0.15);
    camera.frustum_culling = true;
    let camera = world.add_camera(camera);

    let mut layer = Layer::new(0, "World");
    layer.add_camera(camera);

    let ground = world.add_mesh_instance(cube(0), stone);
    if let Some(instance) = world.mesh_instance_mut(ground) {
        instance.set_world_transform(Mat4::from_trs(
            Vec3::new(0.0, -0.5, 0.0),
            Quaternion::IDENTITY,
            Vec3::new(30.0, 1.0, 30.0),
        ));
    }
    let mut instances = vec![ground];

    for i in 0..12u32 {
        let angle = i as f32 / 12.0 * std::f32::consts::TAU;
        let material = if i % 3 == 0 { glass } else { stone };
        let id = world.add_mesh_instance(cube(i + 1), material);
        if let Some(instance) = world.mesh_instance_mut(id) {
            instance.set_world_transform(Mat4::from_translation(Vec3::new(
                angle.cos() * 6.0,
                0.5,
                angle.sin() * 6.0,
            )));
            instance.cast_shadow = true;
        }
        instances.push(id);
    }
    layer.add_mesh_instances(world, &instances, false);

    let mut sun = Light::new(LightType::Directional);
    sun.rotation = Quaternion::from_euler_degrees(-50.0, 30.0, 0.0);
    sun.set_intensity(0.8);
    sun.set_cast_shadows(true);
    sun.set_enabled(true);
    layer.add_light(world.add_light(sun));

    let caps = DeviceCapabilities::default();
    let mut spot = Light::new(LightType::Spot);
    spot.position = Vec3::new(0.0, 8.0, 0.0);
    spot.attenuation_end = 20.0;
    spot.set_color(Color::rgb(1.0, 0.8, 0.6));
    spot.set_cast_shadows(true);
    spot.set_shadow_type(ShadowType::Vsm16, &caps);
    spot.set_shadow_resolution(512, &caps);
    spot.set_enabled(true);
    layer.add_light(world.add_light(spot));

    let mut composition = LayerComposition::new();
    composition.push(layer);
    (composition, camera)
}

fn load_config() -> Result<RendererConfig> {
    match std::env::args().nth(1) {
        Some(path) => RendererConfig::load(&path)
            .with_context(|| format!("failed to load renderer config from '{path}'")),
        None => Ok(RendererConfig::default()),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let mut renderer = ForwardRenderer::new(LoggingDevice::new(), DemoLibrary::default(), config)?;
    let mut world = RenderWorld::new();
    renderer.configure_world(&mut world);
    let (mut composition, camera) = build_scene(&mut world);

    log::info!("Sandbox: rendering {FRAMES} frames with the {} lane", renderer.strategy_name());
    for frame in 0..FRAMES {
        if let Some(camera) = world.camera_mut(camera) {
            let angle = frame as f32 * 10.0;
            camera.rotation = Quaternion::from_euler_degrees(-15.0, angle, 0.0);
        }
        renderer.reset_stats();
        renderer.render(&mut world, &mut composition)?;

        let stats = renderer.stats();
        log::info!(
            "Sandbox: frame {} - {} forward draws, {} shadow draws, {} culled, {} shadow map updates",
            stats.frame_number,
            stats.forward_draw_calls,
            stats.shadow_draw_calls,
            stats.culled_draw_calls,
            stats.shadow_map_updates
        );
    }

    let device = renderer.device();
    log::info!(
        "Sandbox: {} draws issued, {} textures and {} render targets live",
        device.draws,
        device.live_textures,
        device.live_targets
    );
    renderer.destroy(&mut world)?;
    log::info!(
        "Sandbox: after shutdown, {} textures and {} render targets live",
        renderer.device().live_textures,
        renderer.device().live_targets
    );
    Ok(())
}
