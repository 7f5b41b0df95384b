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

//! The forward pass: binds programs, material state, lights and per-instance
//! uniforms, and issues the draws of a sorted visible list.

use prism_core::math::Mat3;
use prism_core::renderer::{
    CullMode, DepthBias, DeviceCapabilities, DrawCall, GraphicsDevice, Light, Material,
    MaterialId, MeshInstance, ProgramLibrary, RenderError, ShaderDefs, ShaderHandle, ShaderPass,
    ShaderRequest, StencilFace, UniformValue, VariantKey,
};
use prism_core::Stopwatch;

use super::forward_renderer::ForwardRenderer;
use super::world::{CameraId, LightId, RenderWorld, FALLBACK_MATERIAL};

/// Index of a material in the world's material list, falling back to the
/// fallback material for unknown ids.
pub(super) fn material_index(materials: &[Material], id: MaterialId) -> usize {
    let index = id.0 as usize;
    if index < materials.len() {
        index
    } else {
        FALLBACK_MATERIAL.0 as usize
    }
}

/// The cull mode a draw is issued with.
///
/// Nothing is culled when the camera disables face culling. A single-sided
/// mode is flipped once for each of: the instance flips its faces, the
/// camera flips its faces, the world transform mirrors the geometry.
pub fn resolve_cull_mode(
    cull_faces: bool,
    camera_flip: bool,
    material_cull: CullMode,
    instance: &MeshInstance,
) -> CullMode {
    if !cull_faces {
        return CullMode::None;
    }
    if !matches!(material_cull, CullMode::Back | CullMode::Front) {
        return material_cull;
    }
    let world = instance.world_transform();
    let mirrored = world.x_axis().cross(world.y_axis()).dot(world.z_axis()) < 0.0;
    if instance.flip_faces ^ camera_flip ^ mirrored {
        material_cull.flipped()
    } else {
        material_cull
    }
}

/// Shader keys of the enabled lights, grouped by type in sorted order.
fn light_keys(sorted: &[Vec<LightId>; 3], lights: &[Light]) -> Vec<u32> {
    sorted
        .iter()
        .flatten()
        .filter_map(|id| lights.get(id.0 as usize))
        .filter(|light| light.enabled())
        .map(|light| light.key().0)
        .collect()
}

impl<D: GraphicsDevice, L: ProgramLibrary> ForwardRenderer<D, L> {
    /// Finds the program of an instance for a pass.
    ///
    /// The material variant cache is consulted first, then the program
    /// library. When the library fails, the instance is switched to the
    /// fallback material and the lookup is retried once.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the library fails for the fallback material too.
    pub(super) fn lookup_program(
        &mut self,
        instance: &mut MeshInstance,
        materials: &mut [Material],
        pass: ShaderPass,
        light_hash: u32,
        light_keys: &[u32],
    ) -> Result<ShaderHandle, RenderError> {
        let key = VariantKey {
            pass: pass.index(),
            defs: instance.shader_defs(),
            light_hash,
        };
        let index = material_index(materials, instance.material());
        if let Some(shader) = materials[index].variant(&key) {
            return Ok(shader);
        }

        let material = &materials[index];
        let request = ShaderRequest {
            material_id: material.id.0,
            pass,
            defs: instance.shader_defs(),
            light_keys: if material.use_lighting {
                light_keys.to_vec()
            } else {
                Vec::new()
            },
            opacity_channel: material.opacity_map.map(|_| material.opacity_channel),
            alpha_test: material.alpha_test > 0.0,
        };
        match self.library.get_program(&request) {
            Ok(shader) => {
                materials[index].insert_variant(key, shader);
                Ok(shader)
            }
            Err(err) if index != FALLBACK_MATERIAL.0 as usize => {
                log::error!(
                    "ForwardRenderer: {err}. Material '{}' is replaced by the fallback material",
                    materials[index].name
                );
                let fallback = &materials[FALLBACK_MATERIAL.0 as usize];
                instance.set_material(fallback);
                instance.update_depth_key(fallback);
                self.lookup_program(instance, materials, pass, light_hash, light_keys)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Binds the alpha test and opacity map of a material.
    pub(super) fn set_base_constants(&mut self, material: &Material) {
        if let Some(opacity) = material.opacity_map {
            self.device
                .set_uniform("texture_opacityMap", UniformValue::Texture(opacity));
        }
        if material.alpha_test > 0.0 {
            self.device
                .set_uniform("alpha_ref", UniformValue::Float(material.alpha_test));
        }
    }

    fn apply_material_state(&mut self, material: &Material, caps: &DeviceCapabilities) {
        self.set_base_constants(material);
        self.device.set_blend_state(&material.blend);
        self.device.set_color_write(material.color_write);
        self.device.set_depth_write(material.depth_write);
        self.device.set_depth_test(material.depth_test);
        self.device.set_alpha_to_coverage(material.alpha_to_coverage);

        let biased = material.depth_bias != 0.0 || material.slope_depth_bias != 0.0;
        if caps.hardware_depth_compare {
            self.device.set_depth_bias(biased.then_some(DepthBias {
                constant: material.depth_bias,
                slope_scale: material.slope_depth_bias,
            }));
        } else if caps.standard_derivatives {
            let offset = if biased {
                [material.slope_depth_bias, material.depth_bias]
            } else {
                [0.0, 0.0]
            };
            self.device
                .set_uniform("polygonOffset", UniformValue::Vec2(offset));
        }
    }

    /// Binds the bone palette of a skinned instance, as a texture when the
    /// device supports bone textures and as a uniform array otherwise.
    pub(super) fn set_skinning(&mut self, instance: &MeshInstance) {
        let Some(skin) = instance.skin() else {
            return;
        };
        self.stats.skin_draw_calls += 1;
        let texture = skin
            .bone_texture
            .filter(|_| self.device.capabilities().bone_textures);
        match texture {
            Some(texture) => {
                let width = (skin.bone_count() * 4).max(1) as f32;
                self.device
                    .set_uniform("texture_poseMap", UniformValue::Texture(texture));
                self.device.set_uniform(
                    "texture_poseMapSize",
                    UniformValue::Vec4([width, 1.0, 1.0 / width, 1.0]),
                );
            }
            None => {
                self.device
                    .set_uniform("matrix_pose[0]", UniformValue::FloatArray(skin.palette.clone()));
            }
        }
    }

    /// Issues the draw of an instance.
    ///
    /// Instanced draws bind the transform buffer on slot 1. An automatic
    /// instancing batch is consumed by its draw and stands in for the
    /// `count - 1` draw calls that follow it.
    ///
    /// # Returns
    ///
    /// The number of following draw calls to skip.
    pub(super) fn draw_instance(&mut self, instance: &mut MeshInstance, normal: bool) -> usize {
        let primitive = *instance.mesh.primitive(instance.render_style);
        if let Some(data) = instance.instancing {
            if data.count > 0 {
                self.stats.instanced_draw_calls += 1;
                self.device.set_vertex_buffer(data.vertex_buffer, 1, data.offset);
                self.device.draw(&primitive, Some(data.count));
            }
            if data.auto {
                instance.instancing = None;
                let skipped = data.count.saturating_sub(1);
                self.stats.removed_by_instancing += skipped;
                return skipped as usize;
            }
            return 0;
        }

        let model = instance.world_transform();
        self.device
            .set_uniform("matrix_model", UniformValue::Mat4(model.to_cols_array()));
        if normal {
            self.device.set_uniform(
                "matrix_normal",
                UniformValue::Mat3(Mat3::normal_matrix(model).to_cols_array()),
            );
        }
        self.device.draw(&primitive, None);
        0
    }

    /// Draws a sorted visible list for a camera.
    ///
    /// Programs, material state and lights are only rebound when the
    /// material, the shader defs or the light mask change between
    /// consecutive draws. Commands run in place.
    ///
    /// # Arguments
    ///
    /// * `world`: The scene
    /// * `camera`: The camera the list was culled and sorted for
    /// * `draw_calls`: The sorted visible list
    /// * `lights`: The layer lights, grouped by type
    /// * `pass`: The shader pass of the layer
    /// * `culling_mask`: Camera and layer masks combined
    /// * `light_hash`: The layer light hash, part of the variant key
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if no program can be found even for the
    /// fallback material.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn render_forward(
        &mut self,
        world: &mut RenderWorld,
        camera: CameraId,
        draw_calls: &[DrawCall],
        lights: &[Vec<LightId>; 3],
        pass: ShaderPass,
        culling_mask: u32,
        light_hash: u32,
    ) -> Result<(), RenderError> {
        let timer = Stopwatch::new();
        let Some(camera) = world.cameras.get(camera.0 as usize) else {
            return Ok(());
        };
        let (cull_faces, camera_flip) = (camera.cull_faces, camera.flip_faces);
        let caps = *self.device.capabilities();
        let pass_flag = pass.flag();
        let light_keys = light_keys(lights, &world.lights);

        let mut previous: Option<(MaterialId, ShaderDefs)> = None;
        let mut previous_mask: Option<u32> = None;
        let mut i = 0;
        while i < draw_calls.len() {
            let draw_call = draw_calls[i];
            i += 1;
            let id = match draw_call {
                DrawCall::Command(command) => {
                    if let Some(command) = world.commands.get_mut(command.0 as usize) {
                        command.execute(&mut self.device);
                    }
                    continue;
                }
                DrawCall::Mesh(id) => id,
            };
            let Some(instance) = world.instances.get_mut(id.0 as usize) else {
                continue;
            };
            if instance.mask() & culling_mask == 0 {
                continue;
            }

            self.set_skinning(instance);

            let material_changed = previous != Some((instance.material(), instance.shader_defs()));
            if material_changed {
                self.stats.material_switches += 1;
                let shader = self.lookup_program(
                    instance,
                    &mut world.materials,
                    pass,
                    light_hash,
                    &light_keys,
                )?;
                if let Err(err) = self.device.set_shader(shader) {
                    let material = &world.materials[material_index(&world.materials, instance.material())];
                    log::error!(
                        "ForwardRenderer: cannot bind program of material '{}': {err}",
                        material.name
                    );
                    if instance.material() != FALLBACK_MATERIAL {
                        instance.set_material(&world.materials[FALLBACK_MATERIAL.0 as usize]);
                    }
                    previous = None;
                    continue;
                }
                let material = &world.materials[material_index(&world.materials, instance.material())];
                for param in material.parameters.for_pass(pass_flag) {
                    self.device.set_uniform(&param.name, param.value.clone());
                }
                self.apply_material_state(material, &caps);
                previous = Some((instance.material(), instance.shader_defs()));
            }

            let mask = instance.mask();
            if material_changed || previous_mask != Some(mask) {
                self.dispatch_lights(&world.lights, lights, mask);
                previous_mask = Some(mask);
            }

            let material = &world.materials[material_index(&world.materials, instance.material())];
            self.device.set_cull_mode(resolve_cull_mode(
                cull_faces,
                camera_flip,
                material.cull,
                instance,
            ));
            let front = instance.stencil_front.or(material.stencil_front);
            let back = instance.stencil_back.or(material.stencil_back);
            if front.is_none() && back.is_none() {
                self.device.set_stencil_test(false);
            } else {
                self.device.set_stencil_test(true);
                if front == back {
                    self.device
                        .set_stencil(StencilFace::FrontAndBack, &front.unwrap_or_default());
                } else {
                    self.device
                        .set_stencil(StencilFace::Front, &front.unwrap_or_default());
                    self.device
                        .set_stencil(StencilFace::Back, &back.unwrap_or_default());
                }
            }

            for param in instance.parameters.for_pass(pass_flag) {
                self.device.set_uniform(&param.name, param.value.clone());
            }
            self.device.set_vertex_buffer(instance.vertex_buffer(), 0, 0);
            self.device
                .set_index_buffer(instance.mesh.index_buffer(instance.render_style));
            let skip = self.draw_instance(instance, true);
            self.stats.forward_draw_calls += 1;
            i += skip;

            // Undo this instance's overrides when the next draw keeps the material bound.
            let next_shares_material = match draw_calls.get(i) {
                Some(DrawCall::Mesh(next)) => world
                    .instances
                    .get(next.0 as usize)
                    .is_some_and(|n| Some((n.material(), n.shader_defs())) == previous),
                _ => false,
            };
            if next_shares_material {
                if let Some(instance) = world.instances.get(id.0 as usize) {
                    let material = &world.materials[material_index(&world.materials, instance.material())];
                    for param in instance.parameters.for_pass(pass_flag) {
                        if let Some(original) = material.parameters.get(&param.name) {
                            self.device.set_uniform(&original.name, original.value.clone());
                        }
                    }
                }
            }
        }

        self.device.update_end();
        self.stats.forward_time_ms += timer.elapsed_ms();
        Ok(())
    }
}
