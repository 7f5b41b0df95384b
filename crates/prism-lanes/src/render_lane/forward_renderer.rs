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

//! The forward renderer: per-frame sequencing of every lane.
//!
//! A frame runs, in order: composition update, begin-frame bookkeeping,
//! scene constants, camera and layer culling, shadow caster culling, skin
//! and morph uploads, local light shadow maps, and finally the render list,
//! where each (sub-layer, camera) pair renders the directional shadow maps
//! it needs and then its sorted visible list.

use ahash::AHashSet;
use prism_core::math::Mat3;
use prism_core::renderer::{
    Camera, ClearOptions, ColorWriteMask, FilterMode, GraphicsDevice, LightType,
    PixelRect, ProgramLibrary, RenderError, RenderTargetId, RenderTargetInfo, ResourceError,
    ShadowUpdateMode, TextureDescriptor, TextureFormat, UniformValue,
};
use prism_core::Stopwatch;

use super::composition::{CompositionUpdate, LayerComposition};
use super::cull_lane::cull_lights;
use super::light_dispatch::LightUniformNames;
use super::shadow_fitter::{cull_directional, cull_local};
use super::shadow_map_cache::ShadowResourceManager;
use super::stats::RendererStats;
use super::world::{LightId, RenderWorld};
use super::RenderLane;
use crate::config::{ConfigError, FogMode, RendererConfig};

/// Renders a [`LayerComposition`] through a [`GraphicsDevice`], with shader
/// programs from a [`ProgramLibrary`].
pub struct ForwardRenderer<D: GraphicsDevice, L: ProgramLibrary> {
    pub(super) device: D,
    pub(super) library: L,
    pub(super) config: RendererConfig,
    pub(super) shadows: ShadowResourceManager,
    pub(super) stats: RendererStats,
    pub(super) light_uniforms: Vec<LightUniformNames>,
    shaders_dirty: bool,
    lit_shaders_dirty: bool,
}

impl<D: GraphicsDevice, L: ProgramLibrary> ForwardRenderer<D, L> {
    /// Creates a renderer.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration does not validate.
    pub fn new(device: D, library: L, config: RendererConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "ForwardRenderer: created ({}x{} backbuffer, hardware depth compare: {})",
            device.capabilities().width,
            device.capabilities().height,
            device.capabilities().hardware_depth_compare,
        );
        Ok(Self {
            device,
            library,
            config,
            shadows: ShadowResourceManager::new(),
            stats: RendererStats::default(),
            light_uniforms: Vec::new(),
            shaders_dirty: false,
            lit_shaders_dirty: false,
        })
    }

    /// The graphics device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The graphics device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The program library.
    pub fn library(&self) -> &L {
        &self.library
    }

    /// The program library, mutably.
    pub fn library_mut(&mut self) -> &mut L {
        &mut self.library
    }

    /// The active configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] and keeps the old configuration if the new one
    /// does not validate.
    pub fn set_config(&mut self, config: RendererConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.gamma_correction != self.config.gamma_correction {
            self.shaders_dirty = true;
        }
        self.config = config;
        Ok(())
    }

    /// Applies the configuration defaults that live in the world.
    pub fn configure_world(&self, world: &mut RenderWorld) {
        world.set_default_cache_shadow_map(self.config.cache_shadow_maps);
    }

    /// The accumulated statistics.
    pub fn stats(&self) -> &RendererStats {
        &self.stats
    }

    /// Zeroes the statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// The shadow map pools.
    pub fn shadow_resources(&self) -> &ShadowResourceManager {
        &self.shadows
    }

    /// Drops every cached shader variant at the start of the next frame.
    pub fn mark_shaders_dirty(&mut self) {
        self.shaders_dirty = true;
    }

    /// Drops the cached variants of lit materials at the start of the next frame.
    pub fn mark_lit_shaders_dirty(&mut self) {
        self.lit_shaders_dirty = true;
    }

    /// Releases the shadow map and camera of a light, e.g. before removing it.
    ///
    /// # Errors
    ///
    /// Propagates device errors.
    pub fn release_light_shadows(
        &mut self,
        world: &mut RenderWorld,
        light: LightId,
    ) -> Result<(), ResourceError> {
        match world.lights.get_mut(light.0 as usize) {
            Some(light) => self.shadows.release_light(&mut self.device, light),
            None => Ok(()),
        }
    }

    /// Releases every shadow map, dedicated and pooled.
    ///
    /// # Errors
    ///
    /// Propagates device errors.
    pub fn destroy(&mut self, world: &mut RenderWorld) -> Result<(), ResourceError> {
        for light in &mut world.lights {
            self.shadows.release_light(&mut self.device, light)?;
        }
        self.shadows.destroy(&mut self.device)
    }

    /// Renders one frame of a composition.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if a device resource cannot be allocated, or
    /// if a program cannot be found even for the fallback material.
    pub fn render_composition(
        &mut self,
        world: &mut RenderWorld,
        composition: &mut LayerComposition,
    ) -> Result<(), RenderError> {
        self.stats.frame_number += 1;

        let updated = composition.update(world);
        if updated.contains(CompositionUpdate::LIGHTS) {
            self.lit_shaders_dirty = true;
        }

        self.begin_frame(world, composition);
        self.set_scene_constants();

        let timer = Stopwatch::new();
        self.cull_composition(world, composition);
        self.cull_shadow_casters(world, composition)?;
        self.stats.cull_time_ms += timer.elapsed_ms();

        self.gpu_update(world, composition)?;

        self.render_shadows(world, &composition.sorted_lights[LightType::Spot as usize], None)?;
        self.render_shadows(world, &composition.sorted_lights[LightType::Point as usize], None)?;

        self.render_layers(world, composition)?;

        self.stats.log_frame();
        Ok(())
    }

    /// Resets per-frame state before anything reads it.
    ///
    /// Shader caches flagged dirty are dropped, skin palettes and morph
    /// blends are recomputed for every instance, visibility flags are cleared
    /// (directional lights start visible) and caster lists are emptied.
    pub fn begin_frame(&mut self, world: &mut RenderWorld, composition: &mut LayerComposition) {
        if self.shaders_dirty {
            world.clear_shader_variants();
            self.shaders_dirty = false;
            self.lit_shaders_dirty = false;
        } else if self.lit_shaders_dirty {
            world.clear_lit_shader_variants();
            self.lit_shaders_dirty = false;
        }

        let timer = Stopwatch::new();
        for id in &composition.mesh_instances {
            if let Some(skin) = world
                .instances
                .get_mut(id.0 as usize)
                .and_then(|mi| mi.skin_mut())
            {
                skin.update_matrices();
            }
        }
        self.stats.skin_time_ms += timer.elapsed_ms();

        let timer = Stopwatch::new();
        for id in &composition.mesh_instances {
            let Some(instance) = world.instances.get_mut(id.0 as usize) else {
                continue;
            };
            if let Some(morph) = instance.morph_mut() {
                morph.update();
                instance.refresh_aabb();
            }
        }
        self.stats.morph_time_ms += timer.elapsed_ms();

        for instance in &mut world.instances {
            instance.visible_this_frame = false;
        }
        for id in &composition.lights {
            if let Some(light) = world.lights.get_mut(id.0 as usize) {
                light.visible_this_frame = light.light_type() == LightType::Directional;
                light.reset_caster_passes();
            }
        }
        for layer in composition.layers_mut() {
            layer.begin_frame();
        }
    }

    /// Uploads the frame-wide uniforms: ambient, exposure, skybox, fog and screen size.
    pub fn set_scene_constants(&mut self) {
        let config = self.config;
        let gamma = |c: prism_core::math::Color| {
            if config.gamma_correction {
                c.gamma_to_linear()
            } else {
                c
            }
        };
        let device = &mut self.device;
        device.set_uniform(
            "light_globalAmbient",
            UniformValue::Vec3(gamma(config.ambient_light).to_rgb_array()),
        );
        device.set_uniform("exposure", UniformValue::Float(config.exposure));
        device.set_uniform("skyboxIntensity", UniformValue::Float(config.skybox_intensity));

        match config.fog.mode {
            FogMode::None => {}
            FogMode::Linear => {
                device.set_uniform("fog_color", UniformValue::Vec3(gamma(config.fog.color).to_rgb_array()));
                device.set_uniform("fog_start", UniformValue::Float(config.fog.start));
                device.set_uniform("fog_end", UniformValue::Float(config.fog.end));
            }
            FogMode::Exp | FogMode::Exp2 => {
                device.set_uniform("fog_color", UniformValue::Vec3(gamma(config.fog.color).to_rgb_array()));
                device.set_uniform("fog_density", UniformValue::Float(config.fog.density));
            }
        }

        let caps = *device.capabilities();
        let (w, h) = (caps.width.max(1) as f32, caps.height.max(1) as f32);
        device.set_uniform("uScreenSize", UniformValue::Vec4([w, h, 1.0 / w, 1.0 / h]));
    }

    /// Binds a camera: its matrices and clip planes, the target, the viewport
    /// and the scissor.
    ///
    /// # Arguments
    ///
    /// * `camera`: The camera to render from
    /// * `target`: The render target, or `None` for the backbuffer
    /// * `clear`: Whether to clear the target with the camera clear options
    /// * `cull_border`: Whether to keep a one-pixel border out of the scissor
    pub fn set_camera(
        &mut self,
        camera: &Camera,
        target: Option<RenderTargetInfo>,
        clear: bool,
        cull_border: bool,
    ) {
        let projection = camera.projection_matrix();
        let view = camera.view_matrix();
        let device = &mut self.device;
        device.set_uniform("matrix_projection", UniformValue::Mat4(projection.to_cols_array()));
        device.set_uniform(
            "matrix_viewInverse",
            UniformValue::Mat4(camera.world_transform().to_cols_array()),
        );
        device.set_uniform("matrix_view", UniformValue::Mat4(view.to_cols_array()));
        device.set_uniform(
            "matrix_view3",
            UniformValue::Mat3(Mat3::from_mat4(&view).to_cols_array()),
        );
        device.set_uniform(
            "matrix_viewProjection",
            UniformValue::Mat4((projection * view).to_cols_array()),
        );
        let p = camera.position;
        device.set_uniform("view_position", UniformValue::Vec3([p.x, p.y, p.z]));
        device.set_uniform("camera_near", UniformValue::Float(camera.near_clip));
        device.set_uniform("camera_far", UniformValue::Float(camera.far_clip));
        device.set_uniform("camera_params", UniformValue::Vec4(camera.shader_params()));

        let (w, h) = self.bind_target(camera, target);
        if clear {
            self.device.clear(&camera.clear);
        }
        self.device.set_scissor(camera.scissor_rect.to_pixels(w, h));
        if cull_border {
            self.device
                .set_scissor(PixelRect::new(1, 1, w as i32 - 2, h as i32 - 2));
        }
    }

    /// Clears the camera viewport of a target with colour and depth writes enabled.
    ///
    /// `options` defaults to the camera clear options.
    pub fn clear_view(
        &mut self,
        camera: &Camera,
        target: Option<RenderTargetInfo>,
        options: Option<&ClearOptions>,
    ) {
        self.device.set_render_target(target.map(|t| t.id));
        self.device.set_color_write(ColorWriteMask::ALL);
        self.device.set_depth_write(true);
        self.bind_target(camera, target);
        self.device.clear(options.unwrap_or(&camera.clear));
    }

    /// Binds the target and sets viewport and scissor from the camera rect.
    /// Returns the target size.
    fn bind_target(&mut self, camera: &Camera, target: Option<RenderTargetInfo>) -> (u32, u32) {
        let caps = self.device.capabilities();
        let (w, h) = target.map_or((caps.width, caps.height), |t| (t.width, t.height));
        self.device.set_render_target(target.map(|t| t.id));
        let viewport = camera.rect.to_pixels(w, h);
        self.device.set_viewport(viewport);
        self.device.set_scissor(viewport);
        (w, h)
    }

    fn cull_composition(&mut self, world: &mut RenderWorld, composition: &mut LayerComposition) {
        let mut frustum_updated = vec![false; composition.cameras.len()];
        let mut lights_culled: AHashSet<(usize, usize)> = AHashSet::new();

        for sub_index in 0..composition.sub_layers().len() {
            if !composition.sub_layer_active(sub_index) {
                continue;
            }
            let sub = composition.sub_layers()[sub_index];
            let camera_ids = composition.layer_at(sub.layer).cameras().to_vec();
            for (camera_pass, camera_id) in camera_ids.into_iter().enumerate() {
                let Some(camera_index) = composition.camera_index(camera_id) else {
                    continue;
                };
                let Some(camera) = world.cameras.get_mut(camera_id.0 as usize) else {
                    continue;
                };
                if !frustum_updated[camera_index] {
                    camera.update_frustum();
                    frustum_updated[camera_index] = true;
                    self.stats.cameras_rendered += 1;
                }

                let layer = composition.layer_at_mut(sub.layer);
                if lights_culled.insert((camera_index, sub.layer)) {
                    cull_lights(camera, layer.lights(), &mut world.lights);
                }
                let rejected =
                    layer.cull_visible(sub.transparent, camera_pass, camera, &mut world.instances);
                self.stats.culled_draw_calls += rejected as u32;
            }
        }
    }

    fn cull_shadow_casters(
        &mut self,
        world: &mut RenderWorld,
        composition: &LayerComposition,
    ) -> Result<(), RenderError> {
        for (index, id) in composition.lights.iter().enumerate() {
            let Some(light) = world.lights.get_mut(id.0 as usize) else {
                continue;
            };
            if light.light_type() == LightType::Directional
                || !light.visible_this_frame
                || !light.cast_shadows()
                || !light.enabled()
                || light.shadow_update_mode == ShadowUpdateMode::None
            {
                continue;
            }
            self.shadows.prepare(&mut self.device, light)?;
            cull_local(light, composition.light_shadow_casters(index), &mut world.instances);
        }

        let directional = &composition.sorted_lights[LightType::Directional as usize];
        for (slot, id) in directional.iter().enumerate() {
            let Some(light) = world.lights.get_mut(id.0 as usize) else {
                continue;
            };
            if !light.cast_shadows()
                || !light.enabled()
                || light.shadow_update_mode == ShadowUpdateMode::None
            {
                continue;
            }
            self.shadows.prepare(&mut self.device, light)?;
            let casters = composition
                .lights
                .iter()
                .position(|l| l == id)
                .map_or(&[][..], |i| composition.light_shadow_casters(i));
            let Some(camera_indices) = composition.global_light_camera_ids.get(slot) else {
                continue;
            };
            for &camera_index in camera_indices {
                let Some(camera) = composition
                    .cameras
                    .get(camera_index)
                    .and_then(|c| world.cameras.get(c.0 as usize))
                else {
                    continue;
                };
                cull_directional(light, casters, &mut world.instances, camera, camera_index);
            }
        }
        Ok(())
    }

    /// Uploads skin palettes and morphed positions of the instances that are
    /// visible this frame.
    fn gpu_update(
        &mut self,
        world: &mut RenderWorld,
        composition: &LayerComposition,
    ) -> Result<(), RenderError> {
        let bone_textures = self.device.capabilities().bone_textures;
        for id in &composition.mesh_instances {
            let Some(instance) = world.instances.get_mut(id.0 as usize) else {
                continue;
            };
            if !instance.visible_this_frame {
                continue;
            }
            if let Some(skin) = instance.skin_mut() {
                if skin.is_dirty() {
                    if bone_textures {
                        let texture = match skin.bone_texture {
                            Some(texture) => texture,
                            None => {
                                let mut descriptor = TextureDescriptor::new_2d(
                                    "BoneTexture",
                                    (skin.bone_count() as u32 * 4).max(1),
                                    1,
                                    TextureFormat::Rgba32Float,
                                );
                                descriptor.filter = FilterMode::Nearest;
                                let texture = self.device.create_texture(&descriptor)?;
                                skin.bone_texture = Some(texture);
                                texture
                            }
                        };
                        self.device
                            .write_texture(texture, bytemuck::cast_slice(&skin.palette))?;
                    }
                    skin.mark_uploaded();
                }
            }
            if let Some(morph) = instance.morph() {
                self.device.write_vertex_buffer(
                    morph.vertex_buffer,
                    bytemuck::cast_slice(morph.blended_positions()),
                )?;
            }
        }
        Ok(())
    }

    fn render_layers(
        &mut self,
        world: &mut RenderWorld,
        composition: &mut LayerComposition,
    ) -> Result<(), RenderError> {
        let mut cleared_targets: AHashSet<(usize, Option<RenderTargetId>)> = AHashSet::new();
        let mut cleared_layers: AHashSet<(usize, usize)> = AHashSet::new();

        for entry in 0..composition.render_list.len() {
            let action = composition.render_list[entry];
            if !composition.sub_layer_active(action.sub_layer) {
                continue;
            }
            let sub = composition.sub_layers()[action.sub_layer];
            let Some(camera_id) = composition.cameras.get(action.camera_index).copied() else {
                continue;
            };
            let Some(camera) = world.cameras.get(camera_id.0 as usize) else {
                continue;
            };

            let layer = composition.layer_at(sub.layer);
            let target = layer.render_target.or(camera.render_target);
            let first_for_target = cleared_targets.insert((action.camera_index, target.map(|t| t.id)));
            if layer.override_clear && cleared_layers.insert((sub.layer, action.camera_index)) {
                let options = layer.clear;
                let camera = camera.clone();
                self.clear_view(&camera, target, Some(&options));
            }
            let clear = first_for_target && !layer.override_clear;

            self.render_shadows(
                world,
                &composition.layer_at(sub.layer).sorted_lights[LightType::Directional as usize],
                Some(action.camera_index),
            )?;

            let timer = Stopwatch::new();
            let Some(camera) = world.cameras.get(camera_id.0 as usize) else {
                continue;
            };
            composition.layer_at_mut(sub.layer).sort_visible(
                sub.transparent,
                action.camera_pass,
                camera,
                &mut world.instances,
                &world.commands,
            );
            self.stats.sort_time_ms += timer.elapsed_ms();

            let camera = camera.clone();
            self.set_camera(&camera, target, clear, false);

            let layer = composition.layer_at(sub.layer);
            if let Some(visible) = layer.visible_list(sub.transparent, action.camera_pass) {
                self.render_forward(
                    world,
                    camera_id,
                    &visible.list,
                    &layer.sorted_lights,
                    layer.shader_pass,
                    camera.culling_mask & layer.culling_mask,
                    layer.light_hash(),
                )?;
            }

            self.device.set_color_write(ColorWriteMask::ALL);
            self.device.set_stencil_test(false);
            self.device.set_alpha_to_coverage(false);
            self.device.set_depth_bias(None);
        }
        Ok(())
    }
}

impl<D: GraphicsDevice, L: ProgramLibrary> RenderLane for ForwardRenderer<D, L> {
    fn strategy_name(&self) -> &'static str {
        "Forward"
    }

    fn render(
        &mut self,
        world: &mut RenderWorld,
        composition: &mut LayerComposition,
    ) -> Result<(), RenderError> {
        self.render_composition(world, composition)
    }
}
