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

//! Light uniforms of the forward pass.
//!
//! Lights are dispatched into numbered slots (`light0_*`, `light1_*`, ...):
//! directional lights first, then point lights, then spot lights, each group
//! in its sorted order and filtered by the mask of the instance being drawn.

use prism_core::math::Vec3;
use prism_core::renderer::{
    Camera, DeviceCapabilities, GraphicsDevice, Light, LightType, ProgramLibrary, Projection,
    UniformValue,
};

use super::forward_renderer::ForwardRenderer;
use super::shadow_pass_lane::shadow_scale_shift;
use super::world::LightId;

/// Shadow bias of VSM lights, in depth units.
const VSM_SHADOW_BIAS: f32 = -0.0002;

/// The uniform names of one light slot.
#[derive(Debug, Clone)]
pub(super) struct LightUniformNames {
    color: String,
    direction: String,
    shadow_map: String,
    shadow_matrix: String,
    shadow_params: String,
    shadow_matrix_vs: String,
    shadow_params_vs: String,
    direction_vs: String,
    radius: String,
    position: String,
    inner_cone_angle: String,
    outer_cone_angle: String,
    cookie: String,
    cookie_intensity: String,
    cookie_matrix: String,
    cookie_offset: String,
}

impl LightUniformNames {
    pub(super) fn new(slot: usize) -> Self {
        let name = |suffix: &str| format!("light{slot}_{suffix}");
        Self {
            color: name("color"),
            direction: name("direction"),
            shadow_map: name("shadowMap"),
            shadow_matrix: name("shadowMatrix"),
            shadow_params: name("shadowParams"),
            shadow_matrix_vs: name("shadowMatrixVS"),
            shadow_params_vs: name("shadowParamsVS"),
            direction_vs: name("directionVS"),
            radius: name("radius"),
            position: name("position"),
            inner_cone_angle: name("innerConeAngle"),
            outer_cone_angle: name("outerConeAngle"),
            cookie: name("cookie"),
            cookie_intensity: name("cookieIntensity"),
            cookie_matrix: name("cookieMatrix"),
            cookie_offset: name("cookieOffset"),
        }
    }
}

fn vec3(v: Vec3) -> UniformValue {
    UniformValue::Vec3([v.x, v.y, v.z])
}

/// Remaps a PCF shadow bias for devices that emulate depth bias in the shader.
fn emulated_bias(bias: f32, caps: &DeviceCapabilities) -> f32 {
    if !caps.hardware_depth_compare && caps.standard_derivatives {
        bias * -100.0
    } else {
        bias
    }
}

/// The texture-space projection of a spot light cookie, for spot lights
/// without a shadow camera to borrow it from.
fn spot_cookie_matrix(light: &Light) -> [f32; 16] {
    let mut camera = Camera::new();
    camera.projection = Projection::Perspective;
    camera.fov = light.outer_cone_angle() * 2.0;
    camera.aspect_ratio = 1.0;
    camera.near_clip = light.attenuation_end / 1000.0;
    camera.far_clip = light.attenuation_end;
    camera.position = light.position;
    camera.rotation = light.rotation;
    camera.rotate_local(-90.0, 0.0, 0.0);
    (shadow_scale_shift() * camera.projection_matrix() * camera.view_matrix()).to_cols_array()
}

fn dispatch_directional(
    device: &mut dyn GraphicsDevice,
    names: &LightUniformNames,
    light: &Light,
    gamma_correction: bool,
    fill_vertex_uniforms: bool,
) -> bool {
    let caps = *device.capabilities();
    device.set_uniform(&names.color, UniformValue::Vec3(light.uniform_color(gamma_correction)));
    let direction = light.direction();
    device.set_uniform(&names.direction, vec3(direction));

    let Some(map) = light.shadow_map().filter(|_| light.cast_shadows()) else {
        return false;
    };
    let far = light
        .shadow_camera
        .as_ref()
        .map_or(1.0, |camera| camera.far_clip)
        .max(f32::EPSILON);
    let bias = if light.is_vsm() {
        VSM_SHADOW_BIAS
    } else {
        emulated_bias(light.shadow_bias / far * 100.0, &caps)
    };
    let normal_bias = if light.is_vsm() {
        light.vsm_bias / (far / 7.0)
    } else {
        light.normal_offset_bias()
    };
    let params = [light.shadow_resolution() as f32, normal_bias, bias];
    let matrix = light.shadow_matrix.to_cols_array();

    device.set_uniform(&names.shadow_map, UniformValue::Texture(map.texture));
    device.set_uniform(&names.shadow_matrix, UniformValue::Mat4(matrix));
    device.set_uniform(&names.shadow_params, UniformValue::Vec3(params));
    if fill_vertex_uniforms {
        device.set_uniform(&names.shadow_matrix_vs, UniformValue::Mat4(matrix));
        device.set_uniform(&names.shadow_params_vs, UniformValue::Vec3(params));
        device.set_uniform(&names.direction_vs, vec3(direction));
    }
    true
}

fn dispatch_point(
    device: &mut dyn GraphicsDevice,
    names: &LightUniformNames,
    light: &Light,
    gamma_correction: bool,
) {
    device.set_uniform(&names.radius, UniformValue::Float(light.attenuation_end));
    device.set_uniform(&names.color, UniformValue::Vec3(light.uniform_color(gamma_correction)));
    device.set_uniform(&names.position, vec3(light.position));

    if let Some(map) = light.shadow_map().filter(|_| light.cast_shadows()) {
        device.set_uniform(&names.shadow_map, UniformValue::Texture(map.texture));
        device.set_uniform(
            &names.shadow_params,
            UniformValue::Vec4([
                light.shadow_resolution() as f32,
                light.normal_offset_bias(),
                light.shadow_bias,
                1.0 / light.attenuation_end,
            ]),
        );
    }
    if let Some(cookie) = light.cookie() {
        device.set_uniform(&names.cookie, UniformValue::Texture(cookie));
        device.set_uniform(
            &names.shadow_matrix,
            UniformValue::Mat4(light.world_transform().to_cols_array()),
        );
        device.set_uniform(&names.cookie_intensity, UniformValue::Float(light.cookie_intensity));
    }
}

fn dispatch_spot(
    device: &mut dyn GraphicsDevice,
    names: &LightUniformNames,
    light: &Light,
    gamma_correction: bool,
) {
    let caps = *device.capabilities();
    device.set_uniform(&names.inner_cone_angle, UniformValue::Float(light.inner_cone_cos()));
    device.set_uniform(&names.outer_cone_angle, UniformValue::Float(light.outer_cone_cos()));
    device.set_uniform(&names.radius, UniformValue::Float(light.attenuation_end));
    device.set_uniform(&names.color, UniformValue::Vec3(light.uniform_color(gamma_correction)));
    device.set_uniform(&names.position, vec3(light.position));
    device.set_uniform(&names.direction, vec3(light.direction()));

    let mut cookie_matrix = None;
    if let Some(map) = light.shadow_map().filter(|_| light.cast_shadows()) {
        let bias = if light.is_vsm() {
            VSM_SHADOW_BIAS
        } else {
            emulated_bias(light.shadow_bias * 20.0, &caps)
        };
        let normal_bias = if light.is_vsm() {
            light.vsm_bias / (light.attenuation_end / 7.0)
        } else {
            light.normal_offset_bias()
        };
        let matrix = light.shadow_matrix.to_cols_array();
        device.set_uniform(&names.shadow_map, UniformValue::Texture(map.texture));
        device.set_uniform(&names.shadow_matrix, UniformValue::Mat4(matrix));
        device.set_uniform(
            &names.shadow_params,
            UniformValue::Vec4([
                light.shadow_resolution() as f32,
                normal_bias,
                bias,
                1.0 / light.attenuation_end,
            ]),
        );
        cookie_matrix = Some(matrix);
    }

    if let Some(cookie) = light.cookie() {
        let matrix = cookie_matrix.unwrap_or_else(|| spot_cookie_matrix(light));
        device.set_uniform(&names.cookie, UniformValue::Texture(cookie));
        device.set_uniform(&names.shadow_matrix, UniformValue::Mat4(matrix));
        device.set_uniform(&names.cookie_intensity, UniformValue::Float(light.cookie_intensity));
        if let Some(transform) = light.cookie_transform() {
            device.set_uniform(
                &names.cookie_matrix,
                UniformValue::Vec4([transform.x, transform.y, transform.z, transform.w]),
            );
            let offset = light.cookie_offset().unwrap_or_default();
            device.set_uniform(&names.cookie_offset, UniformValue::Vec2([offset.x, offset.y]));
        }
    }
}

impl<D: GraphicsDevice, L: ProgramLibrary> ForwardRenderer<D, L> {
    /// Binds the uniforms of every enabled light whose mask intersects `mask`.
    ///
    /// # Returns
    ///
    /// The number of light slots filled.
    pub(super) fn dispatch_lights(
        &mut self,
        lights: &[Light],
        sorted: &[Vec<LightId>; 3],
        mask: u32,
    ) -> usize {
        let gamma = self.config.gamma_correction;
        let mut slot = 0;
        let mut vertex_uniforms_filled = false;

        for light_type in LightType::ALL {
            for id in &sorted[light_type as usize] {
                let Some(light) = lights.get(id.0 as usize) else {
                    continue;
                };
                if !light.enabled() || light.mask & mask == 0 {
                    continue;
                }
                while self.light_uniforms.len() <= slot {
                    self.light_uniforms
                        .push(LightUniformNames::new(self.light_uniforms.len()));
                }
                let names = &self.light_uniforms[slot];
                match light_type {
                    LightType::Directional => {
                        let shadowed = dispatch_directional(
                            &mut self.device,
                            names,
                            light,
                            gamma,
                            !vertex_uniforms_filled,
                        );
                        vertex_uniforms_filled |= shadowed;
                    }
                    LightType::Point => dispatch_point(&mut self.device, names, light, gamma),
                    LightType::Spot => dispatch_spot(&mut self.device, names, light, gamma),
                }
                slot += 1;
            }
        }
        slot
    }
}
