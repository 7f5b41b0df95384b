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

//! Shadow map targets, shadow cameras and blur weights.
//!
//! A light either owns a dedicated shadow map or, when `cache_shadow_map`
//! is set, borrows one from a pool shared by every light with the same
//! resolution and technique. Dedicated maps that a light drops (because its
//! resolution or technique changed) are queued on the light and released here
//! before anything new is allocated, so at most one generation of targets is
//! alive per light.

use ahash::AHashMap;
use prism_core::math::Color;
use prism_core::renderer::{
    Camera, ClearFlags, CompareFunc, DeviceCapabilities, FilterMode, GraphicsDevice, Light,
    LightType, Projection, RenderTargetDescriptor, RenderTargetInfo, ResourceError, ShadowMap,
    ShadowType, TextureDescriptor, TextureFormat, TextureKind,
};

/// The largest VSM blur kernel, in texels.
pub const MAX_BLUR_SIZE: u32 = 25;

/// Pool slot used for the intermediate target of the VSM blur.
const BLUR_LAYER: u32 = 1;

/// Texture format and filter of a 2D shadow map.
pub fn shadow_texture_format(
    shadow_type: ShadowType,
    caps: &DeviceCapabilities,
) -> (TextureFormat, FilterMode) {
    let format = match shadow_type {
        ShadowType::Vsm32 => TextureFormat::Rgba32Float,
        ShadowType::Vsm16 => TextureFormat::Rgba16Float,
        ShadowType::Pcf5 => TextureFormat::Depth,
        ShadowType::Pcf3 if caps.hardware_depth_compare => TextureFormat::Depth,
        ShadowType::Pcf3 | ShadowType::Vsm8 => TextureFormat::Rgba8,
    };
    let linear = match shadow_type {
        ShadowType::Pcf3 => caps.hardware_depth_compare,
        ShadowType::Vsm32 => caps.float_linear,
        ShadowType::Vsm16 => caps.half_float_linear,
        ShadowType::Vsm8 | ShadowType::Pcf5 => true,
    };
    let filter = if linear {
        FilterMode::Linear
    } else {
        FilterMode::Nearest
    };
    (format, filter)
}

/// Whether a light renders its shadow map as a hardware-compared depth texture.
///
/// Point lights never do: they store distance in an RGBA8 cube map.
pub fn uses_hardware_depth(
    light_type: LightType,
    shadow_type: ShadowType,
    caps: &DeviceCapabilities,
) -> bool {
    light_type != LightType::Point
        && (shadow_type == ShadowType::Pcf5
            || (shadow_type == ShadowType::Pcf3 && caps.hardware_depth_compare))
}

/// Creates the camera a light renders its shadow map with.
///
/// Depth is always cleared to 1. Colour is cleared too unless the map is a
/// pure depth texture, to white for encoded depth and to transparent black
/// for variance maps.
pub fn create_shadow_camera(
    light_type: LightType,
    shadow_type: ShadowType,
    caps: &DeviceCapabilities,
) -> Camera {
    let mut camera = Camera::new();
    camera.projection = if light_type == LightType::Directional {
        Projection::Orthographic
    } else {
        Projection::Perspective
    };
    camera.clear.flags = ClearFlags::DEPTH;
    if !uses_hardware_depth(light_type, shadow_type, caps) {
        camera.clear.flags |= ClearFlags::COLOR;
    }
    camera.clear.color = if shadow_type.is_vsm() {
        Color::new(0.0, 0.0, 0.0, 0.0)
    } else {
        Color::new(1.0, 1.0, 1.0, 1.0)
    };
    camera.clear.depth = 1.0;
    camera
}

/// Normalised Gaussian weights for a separable blur of `kernel_size` taps.
///
/// The size is clamped to `1..=MAX_BLUR_SIZE`; sigma is a sixth of the span
/// so the kernel covers three standard deviations on each side.
pub fn gauss_weights(kernel_size: u32) -> Vec<f32> {
    let size = kernel_size.clamp(1, MAX_BLUR_SIZE);
    if size == 1 {
        return vec![1.0];
    }
    let sigma = (size - 1) as f32 / 6.0;
    let half_width = (size - 1) as f32 * 0.5;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - half_width;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Allocates a shadow map on the device.
///
/// Point lights get a six-face RGBA8 cube with one colour target per face.
/// Other lights get a 2D map whose format follows [`shadow_texture_format`];
/// depth maps are attached as the depth texture of a colourless target.
///
/// # Errors
///
/// Returns the device error if the texture or a target cannot be created.
pub fn create_shadow_map(
    device: &mut dyn GraphicsDevice,
    light_type: LightType,
    shadow_type: ShadowType,
    resolution: u32,
) -> Result<ShadowMap, ResourceError> {
    let caps = *device.capabilities();
    let map = if light_type == LightType::Point {
        let texture = device.create_texture(&TextureDescriptor {
            label: "ShadowMapCube".to_string(),
            width: resolution,
            height: resolution,
            format: TextureFormat::Rgba8,
            kind: TextureKind::Cube,
            filter: FilterMode::Nearest,
            compare: None,
            mipmaps: false,
        })?;
        let mut targets = Vec::with_capacity(6);
        for face in 0..6 {
            let id = device.create_render_target(&RenderTargetDescriptor {
                label: format!("ShadowMapCube{face}"),
                color: Some(texture),
                depth_texture: None,
                depth: true,
                face: Some(face),
            })?;
            targets.push(RenderTargetInfo {
                id,
                width: resolution,
                height: resolution,
            });
        }
        ShadowMap {
            texture,
            targets,
            resolution,
            shadow_type: ShadowType::Pcf3,
            cached: false,
        }
    } else {
        let (format, filter) = shadow_texture_format(shadow_type, &caps);
        let depth_texture = format == TextureFormat::Depth;
        let mut descriptor = TextureDescriptor::new_2d("ShadowMap2D", resolution, resolution, format);
        descriptor.filter = filter;
        if depth_texture {
            descriptor.compare = Some(CompareFunc::Less);
        }
        let texture = device.create_texture(&descriptor)?;
        let id = device.create_render_target(&RenderTargetDescriptor {
            label: "ShadowMap2D".to_string(),
            color: (!depth_texture).then_some(texture),
            depth_texture: depth_texture.then_some(texture),
            depth: !depth_texture,
            face: None,
        })?;
        ShadowMap {
            texture,
            targets: vec![RenderTargetInfo {
                id,
                width: resolution,
                height: resolution,
            }],
            resolution,
            shadow_type,
            cached: false,
        }
    };
    log::debug!(
        "ShadowRenderer: allocated {res}x{res} {shadow_type:?} shadow map for a {light_type:?} light",
        res = resolution,
    );
    Ok(map)
}

/// Owns the shared shadow map pools and the blur weight cache.
#[derive(Debug, Default)]
pub struct ShadowResourceManager {
    pools: [AHashMap<u32, ShadowMap>; ShadowType::COUNT as usize],
    cube_pool: AHashMap<u32, ShadowMap>,
    blur_weights: AHashMap<u32, Vec<f32>>,
    live_dedicated: usize,
}

impl ShadowResourceManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure a shadow-casting light has a camera and an up to date map.
    ///
    /// Targets the light dropped since the last call are destroyed first. A
    /// missing camera is created; a missing map, or one whose resolution or
    /// technique no longer matches the light, is replaced.
    ///
    /// # Errors
    ///
    /// Propagates device allocation failures.
    pub fn prepare(
        &mut self,
        device: &mut dyn GraphicsDevice,
        light: &mut Light,
    ) -> Result<(), ResourceError> {
        self.release_retired(device, light)?;

        if light.shadow_camera.is_none() {
            let caps = *device.capabilities();
            light.shadow_camera = Some(create_shadow_camera(
                light.light_type(),
                light.shadow_type(),
                &caps,
            ));
        }

        let stale = light.shadow_map().is_none_or(|map| {
            map.resolution != light.shadow_resolution()
                || map.is_cube() != (light.light_type() == LightType::Point)
                || (!map.is_cube() && map.shadow_type != light.shadow_type())
        });
        if stale {
            if light.shadow_map().is_some_and(|map| !map.cached) {
                light.destroy_shadow_map();
                self.release_retired(device, light)?;
                let caps = *device.capabilities();
                light.shadow_camera = Some(create_shadow_camera(
                    light.light_type(),
                    light.shadow_type(),
                    &caps,
                ));
            }
            let map = self.allocate(device, light)?;
            light.attach_shadow_map(map);
        }
        Ok(())
    }

    fn allocate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        light: &Light,
    ) -> Result<ShadowMap, ResourceError> {
        if light.cache_shadow_map {
            self.cached_map(
                device,
                light.light_type(),
                light.shadow_type(),
                light.shadow_resolution(),
                0,
            )
        } else {
            let map = create_shadow_map(
                device,
                light.light_type(),
                light.shadow_type(),
                light.shadow_resolution(),
            )?;
            self.live_dedicated += 1;
            Ok(map)
        }
    }

    /// Returns the pooled map for a resolution, technique and pool layer,
    /// allocating it on first use.
    ///
    /// Cube maps are pooled by resolution alone.
    ///
    /// # Errors
    ///
    /// Propagates device allocation failures.
    pub fn cached_map(
        &mut self,
        device: &mut dyn GraphicsDevice,
        light_type: LightType,
        shadow_type: ShadowType,
        resolution: u32,
        layer: u32,
    ) -> Result<ShadowMap, ResourceError> {
        let (pool, key) = if light_type == LightType::Point {
            (&mut self.cube_pool, resolution)
        } else {
            (
                &mut self.pools[shadow_type as usize],
                layer * 10000 + resolution,
            )
        };
        if let Some(map) = pool.get(&key) {
            return Ok(map.clone());
        }
        let mut map = create_shadow_map(device, light_type, shadow_type, resolution)?;
        map.cached = true;
        pool.insert(key, map.clone());
        Ok(map)
    }

    /// The intermediate target the VSM blur renders its horizontal pass into.
    ///
    /// # Errors
    ///
    /// Propagates device allocation failures.
    pub fn blur_target(
        &mut self,
        device: &mut dyn GraphicsDevice,
        shadow_type: ShadowType,
        resolution: u32,
    ) -> Result<ShadowMap, ResourceError> {
        self.cached_map(device, LightType::Spot, shadow_type, resolution, BLUR_LAYER)
    }

    /// Cached Gaussian weights for a blur kernel size.
    pub fn blur_weights(&mut self, kernel_size: u32) -> &[f32] {
        let size = kernel_size.clamp(1, MAX_BLUR_SIZE);
        self.blur_weights
            .entry(size)
            .or_insert_with(|| gauss_weights(size))
    }

    /// Destroys the dedicated maps a light has dropped.
    ///
    /// Returns how many maps were released.
    ///
    /// # Errors
    ///
    /// Propagates device errors.
    pub fn release_retired(
        &mut self,
        device: &mut dyn GraphicsDevice,
        light: &mut Light,
    ) -> Result<usize, ResourceError> {
        let retired = light.drain_retired_shadow_maps();
        let count = retired.len();
        for map in retired {
            self.live_dedicated = self.live_dedicated.saturating_sub(1);
            release_map(device, map)?;
        }
        Ok(count)
    }

    /// Drops a light's shadow map and camera for good, e.g. before the light is removed.
    ///
    /// # Errors
    ///
    /// Propagates device errors.
    pub fn release_light(
        &mut self,
        device: &mut dyn GraphicsDevice,
        light: &mut Light,
    ) -> Result<(), ResourceError> {
        light.destroy_shadow_map();
        self.release_retired(device, light)?;
        Ok(())
    }

    /// Destroys every pooled map.
    ///
    /// # Errors
    ///
    /// Propagates device errors.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), ResourceError> {
        let mut pooled = Vec::new();
        for pool in self.pools.iter_mut().chain(std::iter::once(&mut self.cube_pool)) {
            pooled.extend(pool.drain().map(|(_, map)| map));
        }
        for map in pooled {
            release_map(device, map)?;
        }
        Ok(())
    }

    /// The number of maps in the shared pools.
    pub fn pooled_count(&self) -> usize {
        self.pools.iter().map(|pool| pool.len()).sum::<usize>() + self.cube_pool.len()
    }

    /// The number of dedicated maps currently attached to lights.
    pub fn dedicated_count(&self) -> usize {
        self.live_dedicated
    }
}

fn release_map(device: &mut dyn GraphicsDevice, map: ShadowMap) -> Result<(), ResourceError> {
    for target in &map.targets {
        device.destroy_render_target(target.id)?;
    }
    device.destroy_texture(map.texture)?;
    log::debug!(
        "ShadowRenderer: released {res}x{res} {kind} shadow map",
        res = map.resolution,
        kind = if map.is_cube() { "cube" } else { "2D" },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn caps(hardware_depth_compare: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            hardware_depth_compare,
            ..DeviceCapabilities::default()
        }
    }

    #[test]
    fn test_format_table() {
        let hw = caps(true);
        let basic = DeviceCapabilities::minimal();
        assert_eq!(shadow_texture_format(ShadowType::Vsm32, &hw).0, TextureFormat::Rgba32Float);
        assert_eq!(shadow_texture_format(ShadowType::Vsm16, &hw).0, TextureFormat::Rgba16Float);
        assert_eq!(shadow_texture_format(ShadowType::Vsm8, &hw).0, TextureFormat::Rgba8);
        assert_eq!(shadow_texture_format(ShadowType::Pcf5, &hw).0, TextureFormat::Depth);
        assert_eq!(
            shadow_texture_format(ShadowType::Pcf3, &hw),
            (TextureFormat::Depth, FilterMode::Linear)
        );
        assert_eq!(
            shadow_texture_format(ShadowType::Pcf3, &basic),
            (TextureFormat::Rgba8, FilterMode::Nearest)
        );
    }

    #[test]
    fn test_float_filtering_follows_caps() {
        let mut c = caps(false);
        c.float_linear = false;
        c.half_float_linear = true;
        assert_eq!(shadow_texture_format(ShadowType::Vsm32, &c).1, FilterMode::Nearest);
        assert_eq!(shadow_texture_format(ShadowType::Vsm16, &c).1, FilterMode::Linear);
    }

    #[test]
    fn test_shadow_camera_clears() {
        let hw = caps(true);
        let depth_only = create_shadow_camera(LightType::Spot, ShadowType::Pcf3, &hw);
        assert_eq!(depth_only.clear.flags, ClearFlags::DEPTH);
        assert_eq!(depth_only.projection, Projection::Perspective);

        let point = create_shadow_camera(LightType::Point, ShadowType::Pcf3, &hw);
        assert!(point.clear.flags.contains(ClearFlags::COLOR));
        assert_eq!(point.clear.color, Color::new(1.0, 1.0, 1.0, 1.0));

        let vsm = create_shadow_camera(LightType::Directional, ShadowType::Vsm16, &hw);
        assert_eq!(vsm.projection, Projection::Orthographic);
        assert_eq!(vsm.clear.color, Color::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(vsm.clear.depth, 1.0);
    }

    #[test]
    fn test_gauss_weights_are_normalised_and_symmetric() {
        let w = gauss_weights(11);
        assert_eq!(w.len(), 11);
        assert_relative_eq!(w.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        for i in 0..5 {
            assert_relative_eq!(w[i], w[10 - i], epsilon = 1e-7);
            assert!(w[i] < w[i + 1]);
        }
        assert_eq!(gauss_weights(99).len(), MAX_BLUR_SIZE as usize);
        assert_eq!(gauss_weights(0), vec![1.0]);
    }

    #[test]
    fn test_blur_weights_are_cached_per_size() {
        let mut manager = ShadowResourceManager::new();
        let a = manager.blur_weights(7).to_vec();
        assert_eq!(a, gauss_weights(7));
        assert_eq!(manager.blur_weights(40).len(), 25);
        assert_eq!(manager.blur_weights.len(), 2);
    }
}
