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

//! Scene lights, their shader key and the shadow-map state they own.

use crate::math::{
    degrees_to_radians, Aabb, BoundingSphere, Color, Mat4, Quaternion, Vec2, Vec3, Vec4,
};
use crate::renderer::api::{
    ColorChannel, DeviceCapabilities, LightFalloff, LightType, RenderTargetInfo, ShadowType,
    ShadowUpdateMode, TextureId, VsmBlurMode, MASK_DYNAMIC, MASK_LIGHTMAP,
};
use crate::renderer::camera::Camera;
use crate::renderer::mesh_instance::MeshInstanceId;

/// A packed 32-bit light key.
///
/// Lights with equal keys produce identical shader code, and the numeric value
/// orders lights deterministically inside a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LightKey(pub u32);

impl LightKey {
    const TYPE_SHIFT: u32 = 29;
    const CAST_SHADOWS_BIT: u32 = 28;
    const SHADOW_TYPE_SHIFT: u32 = 25;
    const FALLOFF_SHIFT: u32 = 23;
    const NORMAL_OFFSET_BIT: u32 = 22;
    const COOKIE_BIT: u32 = 21;
    const COOKIE_FALLOFF_BIT: u32 = 20;
    const CHANNEL_SHIFTS: [u32; 3] = [18, 16, 14];
    const COOKIE_TRANSFORM_BIT: u32 = 12;

    /// The light type stored in bits 29-30.
    pub fn light_type(self) -> u32 {
        (self.0 >> Self::TYPE_SHIFT) & 0x3
    }

    /// Whether the light casts shadows (bit 28).
    pub fn cast_shadows(self) -> bool {
        self.0 & (1 << Self::CAST_SHADOWS_BIT) != 0
    }

    /// The shadow type stored in bits 25-27.
    pub fn shadow_type(self) -> u32 {
        (self.0 >> Self::SHADOW_TYPE_SHIFT) & 0x7
    }

    /// The falloff mode stored in bits 23-24.
    pub fn falloff(self) -> u32 {
        (self.0 >> Self::FALLOFF_SHIFT) & 0x3
    }

    /// Whether a normal offset bias is applied (bit 22).
    pub fn normal_offset(self) -> bool {
        self.0 & (1 << Self::NORMAL_OFFSET_BIT) != 0
    }

    /// Whether a cookie texture is bound (bit 21).
    pub fn cookie(self) -> bool {
        self.0 & (1 << Self::COOKIE_BIT) != 0
    }

    /// Whether the cookie fades with the cone falloff (bit 20).
    pub fn cookie_falloff(self) -> bool {
        self.0 & (1 << Self::COOKIE_FALLOFF_BIT) != 0
    }

    /// The cookie channel at `index` (`0..3`), two bits each.
    pub fn cookie_channel(self, index: usize) -> u32 {
        (self.0 >> Self::CHANNEL_SHIFTS[index]) & 0x3
    }

    /// Whether the cookie has a UV transform (bit 12).
    pub fn cookie_transform(self) -> bool {
        self.0 & (1 << Self::COOKIE_TRANSFORM_BIT) != 0
    }
}

/// GPU resources a light renders its shadows into.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMap {
    /// The texture sampled by lit shaders.
    pub texture: TextureId,
    /// One target for 2D maps, six (one per face) for cube maps.
    pub targets: Vec<RenderTargetInfo>,
    /// Edge length in pixels.
    pub resolution: u32,
    /// The technique the map was allocated for.
    pub shadow_type: ShadowType,
    /// Whether the map belongs to the shared pool rather than to this light.
    pub cached: bool,
}

impl ShadowMap {
    /// Whether the map is a six-face cube.
    pub fn is_cube(&self) -> bool {
        self.targets.len() == 6
    }
}

/// The fitted shadow camera placement of a directional light for one view camera.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CascadeSettings {
    /// Shadow camera world position.
    pub position: Vec3,
    /// Half height of the orthographic projection.
    pub ortho_height: f32,
    /// Far clip of the orthographic projection.
    pub far_clip: f32,
}

/// Shadow casters culled for one shadow pass (a cube face, a spot light, or a view camera).
#[derive(Debug, Clone, Default)]
pub struct ShadowCasterPass {
    /// Visible casters in culling order.
    pub casters: Vec<MeshInstanceId>,
    /// Set once the pass has been drawn this frame.
    pub rendered: bool,
}

/// A directional, point or spot light.
///
/// Fields that feed the generated shader code are private and go through
/// setters so the [`LightKey`] stays current. Any key change raises a flag
/// read by [`Light::take_key_changed`], which the layer composition turns into
/// "lights dirty".
#[derive(Debug)]
pub struct Light {
    light_type: LightType,
    color: Color,
    intensity: f32,
    final_color: Color,
    linear_final_color: Color,
    enabled: bool,
    /// Bitmask matched against mesh instance masks.
    pub mask: u32,
    cast_shadows: bool,
    shadow_type: ShadowType,
    shadow_resolution: u32,
    /// Directional shadow coverage distance from the view camera.
    pub shadow_distance: f32,
    /// Depth bias applied while rendering and sampling the shadow map.
    pub shadow_bias: f32,
    normal_offset_bias: f32,
    /// When the shadow map is refreshed.
    pub shadow_update_mode: ShadowUpdateMode,
    /// Distance at which attenuation begins.
    pub attenuation_start: f32,
    /// Range of point and spot lights.
    pub attenuation_end: f32,
    falloff: LightFalloff,
    inner_cone_angle: f32,
    outer_cone_angle: f32,
    inner_cone_cos: f32,
    outer_cone_cos: f32,
    vsm_blur_size: u32,
    /// Box or gaussian VSM blur.
    pub vsm_blur_mode: VsmBlurMode,
    /// Bias used when sampling variance maps.
    pub vsm_bias: f32,
    cookie: Option<TextureId>,
    /// Strength of the cookie modulation.
    pub cookie_intensity: f32,
    cookie_falloff: bool,
    cookie_channel: [ColorChannel; 3],
    cookie_transform: Option<Vec4>,
    cookie_offset: Option<Vec2>,
    /// Whether the shadow map is taken from the shared pool.
    pub cache_shadow_map: bool,
    /// World position.
    pub position: Vec3,
    /// World rotation. Lights shine along their local `-Y`.
    pub rotation: Quaternion,
    key: LightKey,
    key_changed: bool,

    /// Set during culling when the light affects the current frame.
    pub visible_this_frame: bool,
    /// The camera used to render the shadow map, created on first use.
    pub shadow_camera: Option<Camera>,
    /// Transform from world space into shadow map texture space.
    pub shadow_matrix: Mat4,
    shadow_map: Option<ShadowMap>,
    retired_shadow_maps: Vec<ShadowMap>,
    caster_passes: Vec<ShadowCasterPass>,
    cascades: Vec<Option<CascadeSettings>>,
}

impl Default for Light {
    fn default() -> Self {
        Self::new(LightType::Directional)
    }
}

impl Light {
    /// Creates a disabled light of the given type with default settings.
    pub fn new(light_type: LightType) -> Self {
        let mut light = Self {
            light_type,
            color: Color::rgb(0.8, 0.8, 0.8),
            intensity: 1.0,
            final_color: Color::BLACK,
            linear_final_color: Color::BLACK,
            enabled: false,
            mask: MASK_DYNAMIC,
            cast_shadows: false,
            shadow_type: ShadowType::Pcf3,
            shadow_resolution: 1024,
            shadow_distance: 40.0,
            shadow_bias: -0.0005,
            normal_offset_bias: 0.0,
            shadow_update_mode: ShadowUpdateMode::Realtime,
            attenuation_start: 10.0,
            attenuation_end: 10.0,
            falloff: LightFalloff::Linear,
            inner_cone_angle: 40.0,
            outer_cone_angle: 45.0,
            inner_cone_cos: 0.0,
            outer_cone_cos: 0.0,
            vsm_blur_size: 11,
            vsm_blur_mode: VsmBlurMode::Gaussian,
            vsm_bias: 0.01 * 0.25,
            cookie: None,
            cookie_intensity: 1.0,
            cookie_falloff: true,
            cookie_channel: [ColorChannel::R, ColorChannel::G, ColorChannel::B],
            cookie_transform: None,
            cookie_offset: None,
            cache_shadow_map: false,
            position: Vec3::ZERO,
            rotation: Quaternion::IDENTITY,
            key: LightKey::default(),
            key_changed: false,
            visible_this_frame: false,
            shadow_camera: None,
            shadow_matrix: Mat4::IDENTITY,
            shadow_map: None,
            retired_shadow_maps: Vec::new(),
            caster_passes: Vec::new(),
            cascades: Vec::new(),
        };
        light.inner_cone_cos = degrees_to_radians(light.inner_cone_angle).cos();
        light.outer_cone_cos = degrees_to_radians(light.outer_cone_angle).cos();
        light.update_final_color();
        light.update_key();
        light.key_changed = false;
        light
    }

    /// Creates a light with the same settings but none of the GPU resources or cookie.
    pub fn clone_settings(&self) -> Self {
        let mut light = Self::new(self.light_type);
        light.color = self.color;
        light.intensity = self.intensity;
        light.enabled = self.enabled;
        light.mask = self.mask;
        light.cast_shadows = self.cast_shadows;
        light.shadow_type = self.shadow_type;
        light.shadow_resolution = self.shadow_resolution;
        light.shadow_distance = self.shadow_distance;
        light.shadow_bias = self.shadow_bias;
        light.normal_offset_bias = self.normal_offset_bias;
        light.shadow_update_mode = self.shadow_update_mode;
        light.attenuation_start = self.attenuation_start;
        light.attenuation_end = self.attenuation_end;
        light.falloff = self.falloff;
        light.inner_cone_angle = self.inner_cone_angle;
        light.outer_cone_angle = self.outer_cone_angle;
        light.inner_cone_cos = self.inner_cone_cos;
        light.outer_cone_cos = self.outer_cone_cos;
        light.vsm_blur_size = self.vsm_blur_size;
        light.vsm_blur_mode = self.vsm_blur_mode;
        light.vsm_bias = self.vsm_bias;
        light.cache_shadow_map = self.cache_shadow_map;
        light.position = self.position;
        light.rotation = self.rotation;
        light.update_final_color();
        light.update_key();
        light.key_changed = false;
        light
    }

    // --- Shader key ---

    /// The current shader key.
    pub fn key(&self) -> LightKey {
        self.key
    }

    /// Returns whether the key changed since the last call, and clears the flag.
    pub fn take_key_changed(&mut self) -> bool {
        std::mem::take(&mut self.key_changed)
    }

    fn update_key(&mut self) {
        let mut key = (self.light_type as u32) << LightKey::TYPE_SHIFT
            | u32::from(self.cast_shadows) << LightKey::CAST_SHADOWS_BIT
            | (self.shadow_type as u32) << LightKey::SHADOW_TYPE_SHIFT
            | (self.falloff as u32) << LightKey::FALLOFF_SHIFT
            | u32::from(self.normal_offset_bias != 0.0) << LightKey::NORMAL_OFFSET_BIT
            | u32::from(self.cookie.is_some()) << LightKey::COOKIE_BIT
            | u32::from(self.cookie_falloff) << LightKey::COOKIE_FALLOFF_BIT
            | u32::from(self.cookie_transform.is_some()) << LightKey::COOKIE_TRANSFORM_BIT;
        for (channel, shift) in self.cookie_channel.iter().zip(LightKey::CHANNEL_SHIFTS) {
            key |= (*channel as u32) << shift;
        }

        if key != self.key.0 {
            self.key = LightKey(key);
            self.key_changed = true;
        }
    }

    // --- Type and colour ---

    /// The light type.
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// Changes the light type. Drops the shadow map and re-validates the shadow type.
    pub fn set_type(&mut self, light_type: LightType, caps: &DeviceCapabilities) {
        if self.light_type == light_type {
            return;
        }
        self.light_type = light_type;
        self.destroy_shadow_map();

        let requested = self.shadow_type;
        self.shadow_type = ShadowType::Pcf3;
        self.set_shadow_type(requested, caps);
        self.update_key();
    }

    /// Whether the light is switched on.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Switches the light on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.key_changed = true;
        }
    }

    /// The authored (gamma space) colour.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Sets the authored colour. Alpha is ignored.
    pub fn set_color(&mut self, color: Color) {
        self.color = Color::rgb(color.r, color.g, color.b);
        self.update_final_color();
    }

    /// The intensity multiplier.
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Sets the intensity multiplier.
    pub fn set_intensity(&mut self, intensity: f32) {
        if self.intensity != intensity {
            self.intensity = intensity;
            self.update_final_color();
        }
    }

    /// `color * intensity`, in gamma space.
    pub fn final_color(&self) -> Color {
        self.final_color
    }

    /// The final colour converted to linear space.
    pub fn linear_final_color(&self) -> Color {
        self.linear_final_color
    }

    fn update_final_color(&mut self) {
        let i = self.intensity;
        self.final_color = self.color * i;
        self.linear_final_color = if i >= 1.0 {
            self.color.gamma_to_linear() * i
        } else {
            self.final_color.gamma_to_linear()
        };
    }

    /// How attenuation falls off with distance.
    pub fn falloff(&self) -> LightFalloff {
        self.falloff
    }

    /// Sets the falloff mode.
    pub fn set_falloff(&mut self, falloff: LightFalloff) {
        if self.falloff != falloff {
            self.falloff = falloff;
            self.update_key();
        }
    }

    /// Spot inner cone angle in degrees.
    pub fn inner_cone_angle(&self) -> f32 {
        self.inner_cone_angle
    }

    /// Sets the spot inner cone angle in degrees.
    pub fn set_inner_cone_angle(&mut self, degrees: f32) {
        self.inner_cone_angle = degrees;
        self.inner_cone_cos = degrees_to_radians(degrees).cos();
    }

    /// Spot outer cone angle in degrees.
    pub fn outer_cone_angle(&self) -> f32 {
        self.outer_cone_angle
    }

    /// Sets the spot outer cone angle in degrees.
    pub fn set_outer_cone_angle(&mut self, degrees: f32) {
        self.outer_cone_angle = degrees;
        self.outer_cone_cos = degrees_to_radians(degrees).cos();
    }

    /// Cosine of the inner cone angle.
    pub fn inner_cone_cos(&self) -> f32 {
        self.inner_cone_cos
    }

    /// Cosine of the outer cone angle.
    pub fn outer_cone_cos(&self) -> f32 {
        self.outer_cone_cos
    }

    // --- Shadows ---

    /// Whether the light renders shadows.
    ///
    /// A light that only affects lightmaps never casts realtime shadows.
    pub fn cast_shadows(&self) -> bool {
        self.cast_shadows && self.mask != MASK_LIGHTMAP && self.mask != 0
    }

    /// Enables or disables shadow casting.
    pub fn set_cast_shadows(&mut self, cast: bool) {
        if self.cast_shadows != cast {
            self.cast_shadows = cast;
            self.update_key();
        }
    }

    /// The shadow technique after capability fallbacks.
    pub fn shadow_type(&self) -> ShadowType {
        self.shadow_type
    }

    /// Whether the shadow technique is a variance map.
    pub fn is_vsm(&self) -> bool {
        self.shadow_type.is_vsm()
    }

    /// Whether the shadow technique is percentage-closer filtering.
    pub fn is_pcf(&self) -> bool {
        self.shadow_type.is_pcf()
    }

    /// Requests a shadow technique, downgrading it to what the device supports.
    pub fn set_shadow_type(&mut self, requested: ShadowType, caps: &DeviceCapabilities) {
        if self.shadow_type == requested {
            return;
        }

        let mut shadow_type = requested;
        if self.light_type == LightType::Point {
            shadow_type = ShadowType::Pcf3;
        }
        if shadow_type == ShadowType::Pcf5 && !caps.hardware_depth_compare {
            shadow_type = ShadowType::Pcf3;
        }
        if shadow_type == ShadowType::Vsm32 && !caps.float_renderable {
            shadow_type = ShadowType::Vsm16;
        }
        if shadow_type == ShadowType::Vsm16 && !caps.half_float_renderable {
            shadow_type = ShadowType::Vsm8;
        }
        if shadow_type != requested {
            log::warn!(
                "Light: shadow type {:?} is not available for a {:?} light here, using {:?}",
                requested,
                self.light_type,
                shadow_type
            );
        }

        if self.shadow_type != shadow_type {
            self.shadow_type = shadow_type;
            self.destroy_shadow_map();
            self.update_key();
        }
    }

    /// Shadow map edge length in pixels.
    pub fn shadow_resolution(&self) -> u32 {
        self.shadow_resolution
    }

    /// Sets the shadow resolution, clamped to the device limits.
    pub fn set_shadow_resolution(&mut self, resolution: u32, caps: &DeviceCapabilities) {
        let limit = if self.light_type == LightType::Point {
            caps.max_cube_map_size
        } else {
            caps.max_texture_size
        };
        let clamped = resolution.clamp(1, limit.max(1));
        if clamped != resolution {
            log::warn!(
                "Light: shadow resolution {} clamped to {}",
                resolution,
                clamped
            );
        }
        if self.shadow_resolution != clamped {
            self.shadow_resolution = clamped;
            self.destroy_shadow_map();
        }
    }

    /// Normal offset bias applied when sampling.
    pub fn normal_offset_bias(&self) -> f32 {
        self.normal_offset_bias
    }

    /// Sets the normal offset bias. Toggling between zero and non-zero changes the key.
    pub fn set_normal_offset_bias(&mut self, bias: f32) {
        if self.normal_offset_bias == bias {
            return;
        }
        let toggled = (self.normal_offset_bias == 0.0) != (bias == 0.0);
        self.normal_offset_bias = bias;
        if toggled {
            self.update_key();
        }
    }

    /// The VSM blur kernel size in taps. Always odd.
    pub fn vsm_blur_size(&self) -> u32 {
        self.vsm_blur_size
    }

    /// Sets the VSM blur kernel size, rounding even sizes up.
    pub fn set_vsm_blur_size(&mut self, size: u32) {
        self.vsm_blur_size = if size % 2 == 0 { size + 1 } else { size };
    }

    /// Requests a one-off re-render of a non-realtime shadow map.
    pub fn update_shadow(&mut self) {
        if self.shadow_update_mode != ShadowUpdateMode::Realtime {
            self.shadow_update_mode = ShadowUpdateMode::ThisFrame;
        }
    }

    /// The shadow map, once allocated.
    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    /// Installs a newly allocated shadow map.
    pub fn attach_shadow_map(&mut self, map: ShadowMap) {
        if let Some(old) = self.shadow_map.replace(map) {
            if !old.cached {
                self.retired_shadow_maps.push(old);
            }
        }
    }

    /// Drops the shadow map and camera.
    ///
    /// A dedicated map is queued for release by the shadow resource manager.
    /// A pooled map stays with the pool. A map that was never going to be
    /// refreshed gets one more render so the next map is not left empty.
    pub fn destroy_shadow_map(&mut self) {
        if let Some(map) = self.shadow_map.take() {
            if !map.cached {
                self.retired_shadow_maps.push(map);
            }
        }
        self.shadow_camera = None;
        if self.shadow_update_mode == ShadowUpdateMode::None {
            self.shadow_update_mode = ShadowUpdateMode::ThisFrame;
        }
    }

    /// Takes the maps waiting to be released.
    pub fn drain_retired_shadow_maps(&mut self) -> Vec<ShadowMap> {
        std::mem::take(&mut self.retired_shadow_maps)
    }

    /// The caster list of a shadow pass, created on demand.
    pub fn caster_pass_mut(&mut self, pass: usize) -> &mut ShadowCasterPass {
        if self.caster_passes.len() <= pass {
            self.caster_passes.resize_with(pass + 1, ShadowCasterPass::default);
        }
        &mut self.caster_passes[pass]
    }

    /// The caster list of a shadow pass, if it was ever culled.
    pub fn caster_pass(&self, pass: usize) -> Option<&ShadowCasterPass> {
        self.caster_passes.get(pass)
    }

    /// Empties all caster lists and clears their rendered flags.
    pub fn reset_caster_passes(&mut self) {
        for pass in &mut self.caster_passes {
            pass.casters.clear();
            pass.rendered = false;
        }
    }

    /// The fitted placement for a view camera, by composition camera index.
    pub fn cascade(&self, camera_index: usize) -> Option<&CascadeSettings> {
        self.cascades.get(camera_index).and_then(Option::as_ref)
    }

    /// Stores the fitted placement for a view camera.
    pub fn set_cascade(&mut self, camera_index: usize, settings: CascadeSettings) {
        if self.cascades.len() <= camera_index {
            self.cascades.resize(camera_index + 1, None);
        }
        self.cascades[camera_index] = Some(settings);
    }

    // --- Cookie ---

    /// The projected cookie texture.
    pub fn cookie(&self) -> Option<TextureId> {
        self.cookie
    }

    /// Sets or clears the cookie texture.
    pub fn set_cookie(&mut self, cookie: Option<TextureId>) {
        if self.cookie != cookie {
            self.cookie = cookie;
            self.update_key();
        }
    }

    /// Whether the cookie is attenuated by the cone falloff.
    pub fn cookie_falloff(&self) -> bool {
        self.cookie_falloff
    }

    /// Sets cookie falloff.
    pub fn set_cookie_falloff(&mut self, falloff: bool) {
        if self.cookie_falloff != falloff {
            self.cookie_falloff = falloff;
            self.update_key();
        }
    }

    /// The cookie texture channels sampled, as three entries.
    pub fn cookie_channel(&self) -> [ColorChannel; 3] {
        self.cookie_channel
    }

    /// Sets the sampled channels from a string such as `"rgb"` or `"a"`.
    ///
    /// Fewer than three channels are padded with the last one. Unknown
    /// channel letters leave the setting unchanged.
    pub fn set_cookie_channel(&mut self, channels: &str) {
        let parsed: Option<Vec<ColorChannel>> =
            channels.chars().take(3).map(ColorChannel::from_char).collect();
        let Some(parsed) = parsed.filter(|p| !p.is_empty()) else {
            log::warn!("Light: ignoring invalid cookie channel '{}'", channels);
            return;
        };
        let last = parsed[parsed.len() - 1];
        let mut channel = [last; 3];
        channel[..parsed.len()].copy_from_slice(&parsed);
        self.cookie_channel = channel;
        self.update_key();
    }

    /// The cookie UV transform `(scale x, scale y, skew x, skew y)`.
    pub fn cookie_transform(&self) -> Option<Vec4> {
        self.cookie_transform
    }

    /// Sets the cookie UV transform. An offset of `(0, 0)` is implied.
    pub fn set_cookie_transform(&mut self, transform: Option<Vec4>) {
        self.cookie_transform = transform;
        if transform.is_some() && self.cookie_offset.is_none() {
            self.cookie_offset = Some(Vec2::new(0.0, 0.0));
        }
        self.update_key();
    }

    /// The cookie UV offset.
    pub fn cookie_offset(&self) -> Option<Vec2> {
        self.cookie_offset
    }

    /// Sets the cookie UV offset. An identity transform is implied.
    pub fn set_cookie_offset(&mut self, offset: Option<Vec2>) {
        let had_transform = self.cookie_transform.is_some();
        self.cookie_offset = offset;
        if offset.is_some() && !had_transform {
            self.cookie_transform = Some(Vec4::new(1.0, 1.0, 0.0, 0.0));
            self.update_key();
        }
    }

    // --- Placement and bounds ---

    /// The world transform at unit scale.
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_trs(self.position, self.rotation, Vec3::ONE)
    }

    /// The direction the light shines in (its local `-Y`).
    pub fn direction(&self) -> Vec3 {
        (self.rotation * -Vec3::Y).normalize()
    }

    /// A sphere enclosing the lit volume of a point or spot light.
    ///
    /// Directional lights are unbounded and return `None`.
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        match self.light_type {
            LightType::Directional => None,
            LightType::Point => Some(BoundingSphere::new(self.position, self.attenuation_end)),
            LightType::Spot => {
                let range = self.attenuation_end;
                let angle = degrees_to_radians(self.outer_cone_angle);
                let up = self.rotation * Vec3::Y;
                let right = self.rotation * Vec3::X;
                let center = self.position + up * (-range * 0.5 * angle.cos());
                let end = up * -range + right * (angle.sin() * range);
                Some(BoundingSphere::new(center, end.length() * 0.5))
            }
        }
    }

    /// A world box enclosing the lit volume of a point or spot light.
    pub fn bounding_box(&self) -> Option<Aabb> {
        match self.light_type {
            LightType::Directional => None,
            LightType::Point => {
                let r = self.attenuation_end;
                Some(Aabb::new(self.position, Vec3::new(r, r, r)))
            }
            LightType::Spot => {
                let range = self.attenuation_end;
                let scl = (degrees_to_radians(self.outer_cone_angle).sin() * range).abs();
                let local = Aabb::new(
                    Vec3::new(0.0, -range * 0.5, 0.0),
                    Vec3::new(scl, range * 0.5, scl),
                );
                Some(local.transform(&self.world_transform()))
            }
        }
    }

    /// Colour to upload for this light.
    pub fn uniform_color(&self, gamma_correction: bool) -> [f32; 3] {
        if gamma_correction {
            self.linear_final_color.to_rgb_array()
        } else {
            self.final_color.to_rgb_array()
        }
    }
}
