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

//! End-to-end forward frames driven through a recording device: culling,
//! sorting, program lookup, clears and per-draw state.

mod common;

use approx::assert_relative_eq;
use common::{renderer, renderer_with, DeviceCall, MockLibrary, RecordingDevice, Scene, WORLD_LAYER};
use prism_core::math::{Mat4, Vec3};
use prism_core::renderer::{
    BlendType, ClearFlags, Command, CullMode, DeviceCapabilities, InstancingData, Light,
    LightType, Material, MaterialId, RenderError, RenderTargetId, RenderTargetInfo, ShaderError,
    SkinInstance, UniformValue, VertexBufferId, LAYER_WORLD,
};
use prism_lanes::{Layer, RenderLane, SortMode, FALLBACK_MATERIAL};

fn translation_z(value: &UniformValue) -> f32 {
    match value {
        UniformValue::Mat4(m) => m[14],
        other => panic!("expected a matrix, got {other:?}"),
    }
}

#[test]
fn test_frame_draws_every_visible_instance_with_one_program() {
    // --- 1. Setup ---
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    for z in [-5.0, -10.0, -15.0] {
        scene.add_cube(material, Vec3::new(0.0, 0.0, z));
    }
    scene.add_light(Light::new(LightType::Directional));
    let mut renderer = renderer();

    // --- 2. Action ---
    scene.render(&mut renderer).expect("frame renders");

    // --- 3. Assertions ---
    let device = renderer.device();
    assert_eq!(device.draws().len(), 3);
    assert_eq!(device.clears().len(), 1, "one camera on one target clears once");
    assert_eq!(renderer.library().requests.len(), 1, "variants are cached on the material");
    assert_eq!(renderer.stats().forward_draw_calls, 3);
    assert_eq!(renderer.stats().material_switches, 1);
    assert_eq!(renderer.stats().frame_number, 1);
    assert!(device.uniform("light0_color").is_some());
    assert!(device.uniform("matrix_viewProjection").is_some());
    assert_eq!(device.uniform_history("matrix_model").len(), 3);
}

#[test]
fn test_camera_mask_rejects_instances() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    let tagged = scene.add_cube(material, Vec3::new(1.0, 0.0, -5.0));
    scene.world.mesh_instance_mut(tagged).unwrap().set_mask(0b10);
    scene.world.camera_mut(scene.camera).unwrap().culling_mask = 0b10;
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(renderer.device().draws().len(), 1);
    assert_eq!(renderer.stats().culled_draw_calls, 1);
    assert!(scene.world.mesh_instance(tagged).unwrap().visible_this_frame);
}

#[test]
fn test_frustum_culling_honours_instance_opt_out() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -10.0));
    let behind = scene.add_cube(material, Vec3::new(0.0, 0.0, 10.0));
    let always = scene.add_cube(material, Vec3::new(0.0, 0.0, 20.0));
    scene.world.mesh_instance_mut(always).unwrap().cull = false;
    scene.world.camera_mut(scene.camera).unwrap().frustum_culling = true;
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(renderer.device().draws().len(), 2);
    assert!(!scene.world.mesh_instance(behind).unwrap().visible_this_frame);
    assert!(scene.world.mesh_instance(always).unwrap().visible_this_frame);
}

#[test]
fn test_transparent_instances_draw_back_to_front() {
    let mut scene = Scene::new();
    let mut glass = Material::new(MaterialId(0));
    glass.set_blend_type(BlendType::Normal);
    let glass = scene.world.add_material(glass);
    for i in 0..100 {
        let z = -1.0 - ((i * 37) % 100) as f32;
        scene.add_cube(glass, Vec3::new(0.0, 0.0, z));
    }
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    let depths: Vec<f32> = renderer
        .device()
        .uniform_history("matrix_model")
        .iter()
        .map(translation_z)
        .collect();
    assert_eq!(depths.len(), 100);
    assert!(
        depths.windows(2).all(|w| w[0] < w[1]),
        "farthest instance must be drawn first: {depths:?}"
    );
    assert_relative_eq!(depths[0], -100.0);
}

#[test]
fn test_opaque_instances_are_grouped_by_material() {
    let mut scene = Scene::new();
    let red = scene.world.add_material(Material::new(MaterialId(0)));
    let blue = scene.world.add_material(Material::new(MaterialId(0)));
    for i in 0..100 {
        let material = if i % 2 == 0 { red } else { blue };
        scene.add_cube(material, Vec3::new(i as f32 * 0.1, 0.0, -20.0));
    }
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(renderer.device().draws().len(), 100);
    assert_eq!(renderer.stats().material_switches, 2);
    assert_eq!(renderer.library().requests.len(), 2);
    assert_eq!(
        renderer.device().count(|c| matches!(c, DeviceCall::SetShader(_))),
        2
    );
}

#[test]
fn test_failed_program_falls_back_to_fallback_material() {
    let mut scene = Scene::new();
    let broken = scene.world.add_material(Material::new(MaterialId(0)));
    let id = scene.add_cube(broken, Vec3::new(0.0, 0.0, -5.0));
    let mut renderer = renderer_with(RecordingDevice::new(), MockLibrary::failing(&[broken.0]));

    scene.render(&mut renderer).expect("the fallback program keeps the frame alive");

    assert_eq!(scene.world.mesh_instance(id).unwrap().material(), FALLBACK_MATERIAL);
    assert_eq!(renderer.device().draws().len(), 1);
    let asked: Vec<u32> = renderer.library().requests.iter().map(|r| r.material_id).collect();
    assert_eq!(asked, vec![broken.0, FALLBACK_MATERIAL.0]);
}

#[test]
fn test_failed_fallback_program_aborts_the_frame() {
    let mut scene = Scene::new();
    let broken = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(broken, Vec3::new(0.0, 0.0, -5.0));
    let library = MockLibrary::failing(&[broken.0, FALLBACK_MATERIAL.0]);
    let mut renderer = renderer_with(RecordingDevice::new(), library);

    let result = scene.render(&mut renderer);

    assert!(matches!(
        result,
        Err(RenderError::Shader(ShaderError::CompilationFailed { material_id: 0, .. }))
    ));
}

#[test]
fn test_commands_run_in_the_sorted_stream() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    let command = scene.world.add_command(Command::new(
        LAYER_WORLD,
        BlendType::None,
        Box::new(|device| device.set_uniform("command_ran", UniformValue::Float(1.0))),
    ));
    let world = &scene.world;
    scene
        .composition
        .layer_mut(WORLD_LAYER)
        .unwrap()
        .add_command(world, command);
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(
        renderer.device().uniform("command_ran"),
        Some(&UniformValue::Float(1.0))
    );
    assert_eq!(renderer.device().draws().len(), 1);
}

#[test]
fn test_instanced_draw_binds_the_instance_stream() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    let id = scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    scene
        .world
        .mesh_instance_mut(id)
        .unwrap()
        .set_instancing(Some(InstancingData {
            vertex_buffer: VertexBufferId(99),
            count: 8,
            offset: 0,
            auto: false,
        }));
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    let device = renderer.device();
    assert_eq!(device.draws().len(), 1);
    assert_eq!(device.draws()[0].1, Some(8));
    assert!(device.calls.contains(&DeviceCall::VertexBuffer(VertexBufferId(99), 1)));
    assert_eq!(renderer.stats().instanced_draw_calls, 1);
    assert!(device.uniform("matrix_model").is_none());
}

#[test]
fn test_auto_instancing_skips_the_batched_draws() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    let batch = scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    scene.add_cube(material, Vec3::new(1.0, 0.0, -5.0));
    scene.add_cube(material, Vec3::new(2.0, 0.0, -5.0));
    scene
        .world
        .mesh_instance_mut(batch)
        .unwrap()
        .set_instancing(Some(InstancingData {
            vertex_buffer: VertexBufferId(7),
            count: 3,
            offset: 0,
            auto: true,
        }));
    // The batch leads the draw order and stands in for the two cubes after it.
    scene.layer().opaque_sort_mode = SortMode::None;
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert_eq!(renderer.device().draws().len(), 1);
    assert_eq!(renderer.stats().removed_by_instancing, 2);
    assert!(scene.world.mesh_instance(batch).unwrap().instancing.is_none());
}

#[test]
fn test_camera_target_is_cleared_once_per_frame() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));

    let mut overlay = Layer::new(1, "Overlay");
    overlay.add_camera(scene.camera);
    scene.composition.push(overlay);

    let mut mirror_camera = prism_core::renderer::Camera::new();
    mirror_camera.render_target = Some(RenderTargetInfo {
        id: RenderTargetId(500),
        width: 256,
        height: 256,
    });
    let mirror_camera = scene.world.add_camera(mirror_camera);
    let mut mirror = Layer::new(2, "Mirror");
    mirror.add_camera(mirror_camera);
    scene.composition.push(mirror);
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    let device = renderer.device();
    assert_eq!(device.clears().len(), 2, "one clear per (camera, target)");
    assert!(device
        .calls
        .contains(&DeviceCall::SetRenderTarget(Some(RenderTargetId(500)))));
}

#[test]
fn test_layer_clear_override_runs_once_per_camera() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    let mut hud = Layer::new(1, "Hud");
    hud.add_camera(scene.camera);
    hud.override_clear = true;
    hud.clear.flags = ClearFlags::DEPTH;
    scene.composition.push(hud);
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    let clears = renderer.device().clears();
    assert_eq!(clears.len(), 2);
    assert_eq!(clears[1].flags, ClearFlags::DEPTH);
}

#[test]
fn test_disabled_layer_draws_nothing() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    scene.layer().enabled = false;
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert!(renderer.device().draws().is_empty());
    assert!(renderer.device().clears().is_empty());
}

#[test]
fn test_skinned_instance_uploads_its_palette_to_a_bone_texture() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    let id = scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    scene
        .world
        .mesh_instance_mut(id)
        .unwrap()
        .set_skin(Some(SkinInstance::new(vec![Mat4::IDENTITY; 4])));
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    let texture = scene
        .world
        .mesh_instance(id)
        .and_then(|i| i.skin())
        .and_then(|s| s.bone_texture)
        .expect("bone texture allocated on first upload");
    let device = renderer.device();
    assert_eq!(device.texture_descriptors[&texture].width, 16);
    assert!(device.calls.contains(&DeviceCall::WriteTexture(texture, 4 * 16 * 4)));
    assert_eq!(device.uniform("texture_poseMap"), Some(&UniformValue::Texture(texture)));
    assert_eq!(renderer.stats().skin_draw_calls, 1);
}

#[test]
fn test_skinning_without_bone_textures_uses_uniform_palette() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    let id = scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    scene
        .world
        .mesh_instance_mut(id)
        .unwrap()
        .set_skin(Some(SkinInstance::new(vec![Mat4::IDENTITY; 2])));
    let caps = DeviceCapabilities {
        bone_textures: false,
        ..DeviceCapabilities::default()
    };
    let mut renderer = renderer_with(RecordingDevice::with_caps(caps), MockLibrary::new());

    scene.render(&mut renderer).unwrap();

    match renderer.device().uniform("matrix_pose[0]") {
        Some(UniformValue::FloatArray(palette)) => assert_eq!(palette.len(), 32),
        other => panic!("expected a palette, got {other:?}"),
    }
    assert!(renderer.device().textures.is_empty());
}

#[test]
fn test_flipped_camera_inverts_material_culling() {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    scene.world.camera_mut(scene.camera).unwrap().flip_faces = true;
    let mut renderer = renderer();

    scene.render(&mut renderer).unwrap();

    assert!(renderer.device().calls.contains(&DeviceCall::Cull(CullMode::Front)));
}

#[test]
fn test_renderer_is_usable_as_a_render_lane() -> anyhow::Result<()> {
    let mut scene = Scene::new();
    let material = scene.world.add_material(Material::new(MaterialId(0)));
    scene.add_cube(material, Vec3::new(0.0, 0.0, -5.0));
    let mut lane: Box<dyn RenderLane> = Box::new(renderer());

    assert_eq!(lane.strategy_name(), "Forward");
    lane.render(&mut scene.world, &mut scene.composition)?;
    lane.render(&mut scene.world, &mut scene.composition)?;
    Ok(())
}

#[test]
fn test_scene_constants_follow_the_config() -> anyhow::Result<()> {
    let config = prism_lanes::RendererConfig::from_ron_str(
        "(exposure: 2.0, fog: (mode: Linear, start: 5.0, end: 50.0))",
    )?;
    let mut renderer = renderer();
    renderer.set_config(config)?;
    let mut scene = Scene::new();

    scene.render(&mut renderer)?;

    let device = renderer.device();
    assert_eq!(device.uniform("exposure"), Some(&UniformValue::Float(2.0)));
    assert_eq!(device.uniform("fog_end"), Some(&UniformValue::Float(50.0)));
    assert_eq!(
        device.uniform("uScreenSize"),
        Some(&UniformValue::Vec4([1280.0, 720.0, 1.0 / 1280.0, 1.0 / 720.0]))
    );

    let mut invalid = *renderer.config();
    invalid.exposure = -1.0;
    assert!(renderer.set_config(invalid).is_err());
    assert_eq!(renderer.config().exposure, 2.0);
    Ok(())
}
