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

//! The shadow pass: renders the casters of each light into its shadow map
//! and blurs variance maps.

use prism_core::math::{Mat4, Vec3};
use prism_core::renderer::{
    BlendState, BlurProgramKey, ColorWriteMask, CullMode, DepthBias, GraphicsDevice, Light,
    LightType, Material, MeshInstance, MeshInstanceId, PixelRect, ProgramLibrary, RenderError,
    ShaderPass, ShadowType, ShadowUpdateMode, UniformValue, VsmBlurMode, QUAD_PRIMITIVE,
};
use prism_core::Stopwatch;

use super::forward_lane::{material_index, resolve_cull_mode};
use super::forward_renderer::ForwardRenderer;
use super::shadow_fitter::point_face_rotation;
use super::shadow_map_cache::{uses_hardware_depth, MAX_BLUR_SIZE};
use super::world::{LightId, RenderWorld};

/// Maps clip space `[-1, 1]` to texture space `[0, 1]`.
pub(super) fn shadow_scale_shift() -> Mat4 {
    Mat4::from_translation(Vec3::splat(0.5)) * Mat4::from_scale(Vec3::splat(0.5))
}

impl<D: GraphicsDevice, L: ProgramLibrary> ForwardRenderer<D, L> {
    /// Renders the shadow maps of `lights`.
    ///
    /// Spot and point lights are rendered with `camera_pass` set to `None`.
    /// Directional lights need the composition index of the camera they were
    /// fitted to, and are rendered at most once per camera and frame.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if a shadow map cannot be allocated or if no
    /// shadow program can be found for a caster.
    pub(super) fn render_shadows(
        &mut self,
        world: &mut RenderWorld,
        lights: &[LightId],
        camera_pass: Option<usize>,
    ) -> Result<(), RenderError> {
        let timer = Stopwatch::new();
        let caps = *self.device.capabilities();

        for id in lights {
            let Some(light) = world.lights.get_mut(id.0 as usize) else {
                continue;
            };
            if !light.cast_shadows() || !light.enabled() {
                continue;
            }
            self.shadows.prepare(&mut self.device, light)?;

            let light_type = light.light_type();
            let passes = match light_type {
                LightType::Directional => {
                    let Some(pass) = camera_pass else {
                        continue;
                    };
                    if light.caster_pass(pass).is_none_or(|p| p.rendered) {
                        continue;
                    }
                    pass..pass + 1
                }
                LightType::Spot => 0..1,
                LightType::Point => 0..6,
            };

            let needs_render =
                light.shadow_update_mode != ShadowUpdateMode::None && light.visible_this_frame;
            if !needs_render {
                continue;
            }
            if light.shadow_update_mode == ShadowUpdateMode::ThisFrame {
                light.shadow_update_mode = ShadowUpdateMode::None;
            }
            let Some(targets) = light.shadow_map().map(|map| map.targets.clone()) else {
                continue;
            };
            let Some(mut camera) = light.shadow_camera.take() else {
                continue;
            };
            self.stats.shadow_map_updates += passes.len() as u32;

            if light_type == LightType::Directional {
                if let Some(cascade) = light.cascade(passes.start) {
                    camera.position = cascade.position;
                    camera.ortho_height = cascade.ortho_height;
                    camera.far_clip = cascade.far_clip;
                }
            }
            if light_type != LightType::Directional {
                self.device
                    .set_uniform("light_radius", UniformValue::Float(light.attenuation_end));
            }
            if light_type != LightType::Point {
                light.shadow_matrix =
                    shadow_scale_shift() * camera.projection_matrix() * camera.view_matrix();
            }

            self.set_shadow_bias(light, caps.hardware_depth_compare, caps.standard_derivatives);
            self.device.set_blend_state(&BlendState::OPAQUE);
            self.device.set_depth_write(true);
            self.device.set_depth_test(true);
            self.device.set_color_write(
                if uses_hardware_depth(light_type, light.shadow_type(), &caps) {
                    ColorWriteMask::NONE
                } else {
                    ColorWriteMask::ALL
                },
            );

            let shader_pass = ShaderPass::Shadow {
                light: light_type,
                shadow: light.shadow_type(),
            };
            for pass in passes {
                if light_type == LightType::Point {
                    camera.rotation = point_face_rotation(pass);
                }
                let target_index = if light_type == LightType::Point { pass } else { 0 };
                let Some(target) = targets.get(target_index).copied() else {
                    continue;
                };
                self.set_camera(&camera, Some(target), true, light_type != LightType::Point);

                let casters = light.caster_pass(pass).map_or(&[][..], |p| &p.casters[..]);
                self.draw_shadow_casters(
                    casters,
                    &mut world.instances,
                    &mut world.materials,
                    shader_pass,
                )?;
                if light_type == LightType::Directional {
                    light.caster_pass_mut(pass).rendered = true;
                }
            }
            light.shadow_camera = Some(camera);

            if caps.hardware_depth_compare {
                self.device.set_depth_bias(None);
            } else if caps.standard_derivatives {
                self.device
                    .set_uniform("polygonOffset", UniformValue::Vec2([0.0, 0.0]));
            }

            if light.is_vsm() && light.vsm_blur_size() > 1 && light_type != LightType::Point {
                self.blur_vsm(light)?;
            }
        }

        self.stats.shadow_time_ms += timer.elapsed_ms();
        Ok(())
    }

    fn set_shadow_bias(&mut self, light: &Light, hardware: bool, derivatives: bool) {
        let is_point = light.light_type() == LightType::Point;
        let bias = light.shadow_bias * -1000.0;
        if hardware {
            self.device.set_depth_bias(if is_point {
                None
            } else {
                Some(DepthBias {
                    constant: bias,
                    slope_scale: bias,
                })
            });
        } else if derivatives {
            let offset = if is_point { 0.0 } else { bias };
            self.device
                .set_uniform("polygonOffset", UniformValue::Vec2([offset, offset]));
        }
    }

    /// Draws depth-sorted casters with their shadow programs.
    ///
    /// A caster whose program fails to bind is logged and skipped.
    fn draw_shadow_casters(
        &mut self,
        casters: &[MeshInstanceId],
        instances: &mut [MeshInstance],
        materials: &mut [Material],
        pass: ShaderPass,
    ) -> Result<(), RenderError> {
        let pass_flag = pass.flag();
        let mut i = 0;
        while i < casters.len() {
            let id = casters[i];
            i += 1;
            let Some(instance) = instances.get_mut(id.0 as usize) else {
                continue;
            };

            let shader = match instance.shader(pass) {
                Some(shader) => shader,
                None => {
                    let shader = self.lookup_program(instance, materials, pass, 0, &[])?;
                    instance.set_shader(pass, shader);
                    let material = &materials[material_index(materials, instance.material())];
                    instance.update_depth_key(material);
                    shader
                }
            };
            let material = &materials[material_index(materials, instance.material())];
            if let Err(err) = self.device.set_shader(shader) {
                log::error!(
                    "ShadowRenderer: cannot bind shadow program of material '{}' for {pass:?}: {err}",
                    material.name
                );
                continue;
            }

            self.set_base_constants(material);
            self.set_skinning(instance);
            self.device
                .set_cull_mode(resolve_cull_mode(true, false, material.cull, instance));
            for param in material.parameters.for_pass(pass_flag) {
                self.device.set_uniform(&param.name, param.value.clone());
            }
            for param in instance.parameters.for_pass(pass_flag) {
                self.device.set_uniform(&param.name, param.value.clone());
            }

            self.device.set_vertex_buffer(instance.vertex_buffer(), 0, 0);
            self.device
                .set_index_buffer(instance.mesh.index_buffer(instance.render_style));
            let skip = self.draw_instance(instance, false);
            self.stats.shadow_draw_calls += 1;
            i += skip;
        }
        Ok(())
    }

    /// Blurs a variance shadow map with a separable kernel: horizontally into
    /// a pooled intermediate map, then vertically back into the light's map.
    fn blur_vsm(&mut self, light: &Light) -> Result<(), RenderError> {
        let Some(map) = light.shadow_map() else {
            return Ok(());
        };
        let Some(map_target) = map.targets.first().copied() else {
            return Ok(());
        };
        let (source, resolution, shadow_type) = (map.texture, map.resolution, map.shadow_type);
        let temp = self
            .shadows
            .blur_target(&mut self.device, shadow_type, resolution)?;
        let Some(temp_target) = temp.targets.first().copied() else {
            return Ok(());
        };

        let kernel_size = light.vsm_blur_size().min(MAX_BLUR_SIZE);
        let program = self.library.get_blur_program(&BlurProgramKey {
            mode: light.vsm_blur_mode,
            kernel_size,
            packed: shadow_type == ShadowType::Vsm8,
        })?;
        let weights = (light.vsm_blur_mode == VsmBlurMode::Gaussian)
            .then(|| self.shadows.blur_weights(kernel_size).to_vec());

        self.device.set_blend_state(&BlendState::OPAQUE);
        self.device.set_color_write(ColorWriteMask::ALL);
        self.device.set_depth_test(false);
        self.device.set_depth_write(false);
        self.device.set_cull_mode(CullMode::None);
        self.device.set_shader(program)?;

        let res = resolution as i32;
        let texel = 1.0 / resolution.max(1) as f32;
        let passes = [
            (temp_target, source, [texel, 0.0]),
            (map_target, temp.texture, [0.0, texel]),
        ];
        for (target, input, offset) in passes {
            self.device.set_render_target(Some(target.id));
            self.device.set_viewport(PixelRect::new(0, 0, res, res));
            self.device.set_scissor(PixelRect::new(1, 1, res - 2, res - 2));
            self.device.set_uniform("source", UniformValue::Texture(input));
            self.device.set_uniform("pixelOffset", UniformValue::Vec2(offset));
            if let Some(weights) = &weights {
                self.device
                    .set_uniform("weight[0]", UniformValue::FloatArray(weights.clone()));
            }
            self.device.draw(&QUAD_PRIMITIVE, None);
        }
        Ok(())
    }
}
