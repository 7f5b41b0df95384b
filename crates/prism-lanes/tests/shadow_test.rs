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

//! Shadow map allocation, refresh policy and the shadow passes of local and
//! directional lights, observed through a recording device.

mod common;

use approx::assert_relative_eq;
use common::{renderer, DeviceCall, Scene};
use prism_core::math::{Quaternion, Vec3};
use prism_core::renderer::{
    BlurProgramKey, ColorWriteMask, DeviceCapabilities, Light, LightType, Material, MaterialId,
    ShadowType, ShadowUpdateMode, TextureKind, UniformValue, VsmBlurMode, QUAD_PRIMITIVE,
};
use prism_lanes::LightId;

/// A spot light five units above a caster, pointing straight down.
fn spot_scene() -> (Scene, LightId) {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_caster(material, Vec3::new(0.0, 0.0, -10.0));
    let mut spot = Light::new(LightType::Spot);
    spot.position = Vec3::new(0.0, 5.0, -10.0);
    spot.set_cast_shadows(true);
    let light = scene.add_light(spot);
    (scene, light)
}

#[test]
fn test_spot_light_renders_its_casters_into_a_depth_map() {
    // --- 1. Setup ---
    let (mut scene, light) = spot_scene();
    let mut renderer = renderer();

    // --- 2. Action ---
    scene.render(&mut renderer).expect("frame renders");

    // --- 3. Assertions ---
    let stats = renderer.stats();
    assert_eq!(stats.shadow_map_updates, 1);
    assert_eq!(stats.shadow_draw_calls, 1);
    assert_eq!(stats.forward_draw_calls, 1);

    let map = scene
        .world
        .light(light)
        .and_then(Light::shadow_map)
        .expect("shadow map allocated");
    assert_eq!(map.targets.len(), 1);
    assert_eq!(map.resolution, 1024);

    let device = renderer.device();
    assert_eq!(device.render_targets.len(), 1);
    assert!(device.calls.contains(&DeviceCall::ColorWrite(ColorWriteMask::NONE)));
    let bias = device
        .calls
        .iter()
        .find_map(|c| match c {
            DeviceCall::DepthBias(Some(bias)) => Some(*bias),
            _ => None,
        })
        .expect("hardware depth maps use a depth bias");
    assert_relative_eq!(bias.constant, 0.5, epsilon = 1e-4);
    assert_eq!(
        device.uniform("light0_shadowMap"),
        Some(&UniformValue::Texture(map.texture))
    );
    assert_eq!(device.uniform("light_radius"), Some(&UniformValue::Float(10.0)));
}

#[test]
fn test_this_frame_update_renders_once() {
    let (mut scene, light) = spot_scene();
    scene.world.light_mut(light).unwrap().shadow_update_mode = ShadowUpdateMode::ThisFrame;
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();
    assert_eq!(renderer.stats().shadow_map_updates, 1);
    assert_eq!(
        scene.world.light(light).unwrap().shadow_update_mode,
        ShadowUpdateMode::None
    );

    renderer.reset_stats();
    scene.render(&mut renderer).unwrap();
    assert_eq!(renderer.stats().shadow_map_updates, 0);
    assert_eq!(renderer.stats().shadow_draw_calls, 0);
    assert!(scene.world.light(light).unwrap().shadow_map().is_some());
}

#[test]
fn test_this_frame_update_waits_until_the_light_is_visible() {
    // --- 1. Setup ---
    let (mut scene, light) = spot_scene();
    {
        let spot = scene.world.light_mut(light).unwrap();
        spot.position = Vec3::new(0.0, 5.0, 100.0);
        spot.shadow_update_mode = ShadowUpdateMode::ThisFrame;
    }
    let mut renderer = renderer();

    // --- 2. Behind the camera: nothing renders and the request survives ---
    scene.render(&mut renderer).unwrap();
    assert_eq!(renderer.stats().shadow_map_updates, 0);
    assert_eq!(
        scene.world.light(light).unwrap().shadow_update_mode,
        ShadowUpdateMode::ThisFrame
    );

    // --- 3. Back in view: renders once, then settles ---
    scene.world.light_mut(light).unwrap().position = Vec3::new(0.0, 5.0, -10.0);
    renderer.reset_stats();
    scene.render(&mut renderer).unwrap();
    assert_eq!(renderer.stats().shadow_map_updates, 1);
    assert_eq!(renderer.stats().shadow_draw_calls, 1);
    assert_eq!(
        scene.world.light(light).unwrap().shadow_update_mode,
        ShadowUpdateMode::None
    );
}

#[test]
fn test_resolution_change_destroys_old_map_before_allocating() {
    let (mut scene, light) = spot_scene();
    let mut renderer = renderer();
    scene.render(&mut renderer).unwrap();
    let old = scene.world.light(light).unwrap().shadow_map().unwrap().clone();

    let caps = DeviceCapabilities::default();
    scene
        .world
        .light_mut(light)
        .unwrap()
        .set_shadow_resolution(512, &caps);
    renderer.device_mut().clear_log();
    scene.render(&mut renderer).unwrap();

    let device = renderer.device();
    let destroyed = device
        .position(|c| *c == DeviceCall::DestroyRenderTarget(old.targets[0].id))
        .expect("old target destroyed");
    let created = device
        .position(|c| matches!(c, DeviceCall::CreateRenderTarget(_)))
        .expect("new target created");
    assert!(destroyed < created);
    assert!(!device.textures.contains(&old.texture));
    assert_eq!(device.render_targets.len(), 1);
    assert_eq!(
        scene.world.light(light).unwrap().shadow_map().unwrap().resolution,
        512
    );
}

#[test]
fn test_point_light_renders_six_faces_with_pcf() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_caster(material, Vec3::new(3.0, 0.0, -10.0));
    let mut point = Light::new(LightType::Point);
    point.position = Vec3::new(0.0, 0.0, -10.0);
    point.set_cast_shadows(true);
    point.set_shadow_type(ShadowType::Vsm16, &DeviceCapabilities::default());
    assert_eq!(point.shadow_type(), ShadowType::Pcf3);
    let light = scene.add_light(point);
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(renderer.stats().shadow_map_updates, 6);
    assert_eq!(renderer.stats().shadow_draw_calls, 1, "the caster sits in one face only");
    let map = scene.world.light(light).unwrap().shadow_map().unwrap().clone();
    assert_eq!(map.targets.len(), 6);
    let device = renderer.device();
    assert_eq!(device.render_targets.len(), 6);
    assert_eq!(device.texture_descriptors[&map.texture].kind, TextureKind::Cube);
    assert!(
        !device
            .calls
            .iter()
            .any(|c| matches!(c, DeviceCall::DepthBias(Some(_)))),
        "cube maps are rendered without a depth bias"
    );
}

#[test]
fn test_vsm_map_is_blurred_in_two_passes() {
    let (mut scene, light) = spot_scene();
    scene
        .world
        .light_mut(light)
        .unwrap()
        .set_shadow_type(ShadowType::Vsm16, &DeviceCapabilities::default());
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(
        renderer.library().blur_requests,
        vec![BlurProgramKey {
            mode: VsmBlurMode::Gaussian,
            kernel_size: 11,
            packed: false,
        }]
    );
    let device = renderer.device();
    let quads = device.draws().iter().filter(|(p, _)| *p == QUAD_PRIMITIVE).count();
    assert_eq!(quads, 2);
    match device.uniform("weight[0]") {
        Some(UniformValue::FloatArray(weights)) => {
            assert_eq!(weights.len(), 11);
            assert_relative_eq!(weights.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
        other => panic!("expected blur weights, got {other:?}"),
    }
    assert_eq!(renderer.shadow_resources().pooled_count(), 1, "the blur target is pooled");
}

#[test]
fn test_directional_shadows_are_deterministic_and_rendered_once_per_camera() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_caster(material, Vec3::new(0.0, 0.0, -10.0));
    scene.add_cube(material, Vec3::new(0.0, -2.0, -10.0));
    let mut sun = Light::new(LightType::Directional);
    sun.rotation = Quaternion::from_euler_degrees(-60.0, 30.0, 0.0);
    sun.set_cast_shadows(true);
    let light = scene.add_light(sun);
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();
    let first = scene.world.light(light).unwrap().shadow_matrix;
    assert_eq!(renderer.stats().shadow_map_updates, 1);
    assert_eq!(renderer.stats().shadow_draw_calls, 1);

    renderer.reset_stats();
    scene.render(&mut renderer).unwrap();
    let second = scene.world.light(light).unwrap().shadow_matrix;
    assert_eq!(renderer.stats().shadow_map_updates, 1);
    assert_eq!(first, second);
    assert!(renderer.device().uniform("light0_shadowMatrix").is_some());
}

#[test]
fn test_release_and_destroy_free_every_shadow_resource() {
    let (mut scene, light) = spot_scene();
    let mut renderer = renderer();
    scene.render(&mut renderer).unwrap();
    assert_eq!(renderer.shadow_resources().dedicated_count(), 1);

    renderer.release_light_shadows(&mut scene.world, light).unwrap();
    assert!(scene.world.light(light).unwrap().shadow_map().is_none());
    assert!(renderer.device().render_targets.is_empty());
    assert_eq!(renderer.shadow_resources().dedicated_count(), 0);

    scene.world.set_default_cache_shadow_map(true);
    let mut cached = Light::new(LightType::Spot);
    cached.position = Vec3::new(2.0, 5.0, -10.0);
    cached.set_cast_shadows(true);
    scene.add_light(cached);
    scene.render(&mut renderer).unwrap();
    assert!(renderer.shadow_resources().pooled_count() >= 1);

    renderer.destroy(&mut scene.world).unwrap();
    assert_eq!(renderer.shadow_resources().pooled_count(), 0);
    assert!(renderer.device().render_targets.is_empty());
    assert!(renderer.device().textures.is_empty());
}
