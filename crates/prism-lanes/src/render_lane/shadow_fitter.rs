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

//! Shadow camera placement and shadow caster culling.
//!
//! Local lights get one perspective shadow camera (six for point lights, one
//! per cube face) sized by their attenuation range. Directional lights get an
//! orthographic camera fitted to the view frustum of each camera that sees
//! them. The fit is texel snapped: the footprint has a constant size and its
//! origin only moves in whole shadow-map texels, so the rasterised shadow
//! does not shimmer when the view camera moves or turns.

use prism_core::math::{degrees_to_radians, Aabb, Mat4, Quaternion, Vec3};
use prism_core::renderer::{
    Camera, CascadeSettings, Light, LightType, MeshInstance, MeshInstanceId, Projection,
};

use super::cull_lane::cull_casters;
use super::draw_sort::sort_casters;

/// Gap left between the fitted directional camera and the nearest caster.
pub const DIRECTIONAL_SHADOW_EPSILON: f32 = 0.01;

/// Distance the provisional directional camera is pulled back along its view axis.
const PROVISIONAL_DISTANCE: f32 = 100_000.0;

/// Euler angles, in degrees, of the six cube-face shadow cameras of a point light.
const POINT_FACE_ANGLES: [[f32; 3]; 6] = [
    [0.0, 90.0, 180.0],
    [0.0, -90.0, 180.0],
    [90.0, 0.0, 0.0],
    [-90.0, 0.0, 0.0],
    [0.0, 180.0, 180.0],
    [0.0, 0.0, 180.0],
];

/// Rotation of the shadow camera rendering cube face `face` of a point light.
pub fn point_face_rotation(face: usize) -> Quaternion {
    let [x, y, z] = POINT_FACE_ANGLES[face % 6];
    Quaternion::from_euler_degrees(x, y, z)
}

/// The outcome of fitting a directional shadow camera to one view camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeFit {
    /// The placement stored on the light for the shadow pass.
    pub settings: CascadeSettings,
    /// Snapped minimum X of the footprint, in shadow camera space.
    pub min_x: f32,
    /// Snapped minimum Y of the footprint, in shadow camera space.
    pub min_y: f32,
    /// Edge length of the square footprint.
    pub frustum_size: f32,
    /// World size of one shadow-map texel.
    pub texel_size: f32,
    /// Number of casters that survived culling.
    pub caster_count: usize,
}

/// The eight corners of `camera`'s frustum, with the far plane moved to `far`.
///
/// Corners 0 to 3 lie on the near plane and 4 to 7 on the far plane, each
/// quad ordered (+x, -y), (+x, +y), (-x, +y), (-x, -y) in camera space.
pub fn frustum_points(camera: &Camera, far: f32) -> [Vec3; 8] {
    let near = camera.near_clip;
    let (near_y, far_y) = match camera.projection {
        Projection::Perspective => {
            let t = (degrees_to_radians(camera.fov) * 0.5).tan();
            (near * t, far * t)
        }
        Projection::Orthographic => (camera.ortho_height, camera.ortho_height),
    };
    let near_x = near_y * camera.aspect_ratio;
    let far_x = far_y * camera.aspect_ratio;
    let quad = |x: f32, y: f32, z: f32| {
        [
            Vec3::new(x, -y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, -z),
            Vec3::new(-x, -y, -z),
        ]
    };
    let n = quad(near_x, near_y, near);
    let f = quad(far_x, far_y, far);
    let world = camera.world_transform();
    let mut points = [Vec3::ZERO; 8];
    for (dst, src) in points.iter_mut().zip(n.iter().chain(f.iter())) {
        *dst = world.transform_point(*src);
    }
    points
}

/// Min and max Z of a world box once transformed into shadow camera space.
fn z_range(world_to_shadow: &Mat4, aabb: &Aabb) -> (f32, f32) {
    aabb.corners()
        .iter()
        .map(|&c| world_to_shadow.transform_point(c).z)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), z| {
            (lo.min(z), hi.max(z))
        })
}

/// Places the shadow camera of a spot or point light and culls its casters.
///
/// The camera sits at the light, looks down the light direction (or along
/// each cube face) and spans the attenuation range. Casters of every pass
/// are depth-key sorted. Directional lights are ignored.
pub fn cull_local(light: &mut Light, casters: &[MeshInstanceId], instances: &mut [MeshInstance]) {
    let light_type = light.light_type();
    if light_type == LightType::Directional {
        return;
    }
    light.visible_this_frame = true;

    let mut camera = light.shadow_camera.take().unwrap_or_default();
    camera.projection = Projection::Perspective;
    camera.near_clip = light.attenuation_end / 1000.0;
    camera.far_clip = light.attenuation_end;
    camera.aspect_ratio = 1.0;
    camera.position = light.position;

    let passes = if light_type == LightType::Spot {
        camera.fov = light.outer_cone_angle() * 2.0;
        camera.rotation = light.rotation;
        camera.rotate_local(-90.0, 0.0, 0.0);
        1
    } else {
        camera.fov = 90.0;
        6
    };

    let mut survivors = Vec::new();
    for pass in 0..passes {
        if light_type == LightType::Point {
            camera.rotation = point_face_rotation(pass);
        }
        camera.update_frustum();
        cull_casters(&camera, casters, instances, &mut survivors);
        sort_casters(&mut survivors, instances);
        let slot = light.caster_pass_mut(pass);
        slot.casters.clone_from(&survivors);
        slot.rendered = false;
    }
    light.shadow_camera = Some(camera);
}

/// Fits the shadow camera of a directional light to `view`, culls its
/// casters into pass `pass` and stores the placement as cascade `pass`.
///
/// The shadow distance of the light, when positive, replaces the far clip of
/// the view camera. With no caster in the footprint, the depth range falls
/// back to the one spanned by the view frustum.
pub fn cull_directional(
    light: &mut Light,
    casters: &[MeshInstanceId],
    instances: &mut [MeshInstance],
    view: &Camera,
    pass: usize,
) -> CascadeFit {
    light.visible_this_frame = true;
    let mut camera = light.shadow_camera.take().unwrap_or_default();
    camera.position = light.position;
    camera.rotation = light.rotation;
    camera.rotate_local(-90.0, 0.0, 0.0);

    let far = if light.shadow_distance > 0.0 {
        light.shadow_distance
    } else {
        view.far_clip
    };
    let points = frustum_points(view, far);
    let frustum_size = (points[0] - points[6])
        .length()
        .max((points[4] - points[6]).length());

    let world_to_shadow = camera.view_matrix();
    let (mut min, mut max) = (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY));
    for p in points {
        let local = world_to_shadow.transform_point(p);
        min = min.min(local);
        max = max.max(local);
    }

    let texel_size = frustum_size / light.shadow_resolution() as f32;
    let delta_x = (frustum_size - (max.x - min.x)) * 0.5;
    let min_x = ((min.x - delta_x) / texel_size).floor() * texel_size;
    let delta_y = (frustum_size - (max.y - min.y)) * 0.5;
    let min_y = ((min.y - delta_y) / texel_size).floor() * texel_size;
    let center_x = min_x + frustum_size * 0.5;
    let center_y = min_y + frustum_size * 0.5;

    camera.translate_local(center_x, center_y, PROVISIONAL_DISTANCE);
    camera.projection = Projection::Orthographic;
    camera.near_clip = 0.0;
    camera.far_clip = PROVISIONAL_DISTANCE * 2.0;
    camera.aspect_ratio = 1.0;
    camera.ortho_height = frustum_size * 0.5;
    camera.update_frustum();

    let mut survivors = Vec::new();
    let bounds = cull_casters(&camera, casters, instances, &mut survivors);
    sort_casters(&mut survivors, instances);
    let caster_count = survivors.len();
    let slot = light.caster_pass_mut(pass);
    slot.casters = survivors;
    slot.rendered = false;

    let (mut min_z, mut max_z) = (min.z, max.z);
    if let Some(bounds) = bounds {
        let (lo, hi) = z_range(&world_to_shadow, &bounds);
        max_z = hi;
        if lo > min_z {
            min_z = lo;
        }
    }

    camera.position = light.position;
    camera.translate_local(center_x, center_y, max_z + DIRECTIONAL_SHADOW_EPSILON);
    camera.far_clip = max_z - min_z;

    let settings = CascadeSettings {
        position: camera.position,
        ortho_height: camera.ortho_height,
        far_clip: camera.far_clip,
    };
    light.set_cascade(pass, settings);
    light.shadow_camera = Some(camera);

    CascadeFit {
        settings,
        min_x,
        min_y,
        frustum_size,
        texel_size,
        caster_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use prism_core::renderer::{
        Material, MaterialId, Mesh, MeshId, Primitive, PrimitiveTopology, VertexBufferId,
    };

    fn caster_at(position: Vec3) -> MeshInstance {
        let mesh = Mesh::new(
            MeshId(1),
            VertexBufferId(1),
            Primitive {
                topology: PrimitiveTopology::Triangles,
                base: 0,
                count: 3,
                indexed: false,
            },
            Aabb::new(Vec3::ZERO, Vec3::ONE),
        );
        let mut instance = MeshInstance::new(mesh, &Material::new(MaterialId(1)));
        instance.cast_shadow = true;
        instance.set_world_transform(Mat4::from_translation(position));
        instance
    }

    #[test]
    fn test_frustum_points_of_default_camera() {
        let mut camera = Camera::new();
        camera.fov = 90.0;
        camera.aspect_ratio = 1.0;
        camera.near_clip = 1.0;
        let p = frustum_points(&camera, 10.0);
        assert_relative_eq!(p[0].x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(p[0].y, -1.0, epsilon = 1e-5);
        assert_relative_eq!(p[0].z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(p[6].x, -10.0, epsilon = 1e-4);
        assert_relative_eq!(p[6].y, 10.0, epsilon = 1e-4);
        assert_relative_eq!(p[6].z, -10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_point_faces_look_along_the_axes() {
        let forward = |face: usize| point_face_rotation(face) * -Vec3::Z;
        let expected = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
        for (face, axis) in expected.iter().enumerate() {
            let f = forward(face);
            assert_relative_eq!(f.dot(*axis), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_spot_light_fills_one_pass() {
        let mut light = Light::new(LightType::Spot);
        light.attenuation_end = 20.0;
        light.position = Vec3::new(0.0, 10.0, 0.0);
        let mut instances = vec![
            caster_at(Vec3::new(0.0, 0.0, 0.0)),
            caster_at(Vec3::new(0.0, 40.0, 0.0)),
        ];
        let ids = [MeshInstanceId(0), MeshInstanceId(1)];
        cull_local(&mut light, &ids, &mut instances);

        let camera = light.shadow_camera.as_ref().unwrap();
        assert_relative_eq!(camera.fov, 90.0);
        assert_relative_eq!(camera.near_clip, 0.02);
        assert_relative_eq!(camera.forward().dot(-Vec3::Y), 1.0, epsilon = 1e-5);
        assert_eq!(light.caster_pass(0).unwrap().casters, vec![MeshInstanceId(0)]);
        assert!(light.caster_pass(1).is_none());
        assert!(light.visible_this_frame);
    }

    #[test]
    fn test_point_light_culls_each_face() {
        let mut light = Light::new(LightType::Point);
        light.attenuation_end = 20.0;
        let mut instances = vec![
            caster_at(Vec3::new(10.0, 0.0, 0.0)),
            caster_at(Vec3::new(0.0, -10.0, 0.0)),
        ];
        let ids = [MeshInstanceId(0), MeshInstanceId(1)];
        cull_local(&mut light, &ids, &mut instances);
        assert_eq!(light.caster_pass(0).unwrap().casters, vec![MeshInstanceId(0)]);
        assert!(light.caster_pass(1).unwrap().casters.is_empty());
        assert_eq!(light.caster_pass(3).unwrap().casters, vec![MeshInstanceId(1)]);
    }

    fn sun() -> Light {
        let mut light = Light::new(LightType::Directional);
        light.shadow_distance = 40.0;
        light.rotation = Quaternion::from_euler_degrees(30.0, 20.0, 0.0);
        light
    }

    #[test]
    fn test_directional_fit_is_deterministic() {
        let mut light = sun();
        let mut view = Camera::new();
        view.position = Vec3::new(3.0, 2.0, 7.5);
        view.rotation = Quaternion::from_euler_degrees(-10.0, 35.0, 0.0);
        let mut instances = vec![caster_at(view.position + view.forward() * 10.0)];
        let ids = [MeshInstanceId(0)];

        let first = cull_directional(&mut light, &ids, &mut instances, &view, 0);
        let second = cull_directional(&mut light, &ids, &mut instances, &view, 0);
        assert_eq!(first.settings.position.x.to_bits(), second.settings.position.x.to_bits());
        assert_eq!(first.settings.position.y.to_bits(), second.settings.position.y.to_bits());
        assert_eq!(first.settings.position.z.to_bits(), second.settings.position.z.to_bits());
        assert_eq!(first.settings.ortho_height.to_bits(), second.settings.ortho_height.to_bits());
        assert_eq!(first.settings.far_clip.to_bits(), second.settings.far_clip.to_bits());
        assert_eq!(light.cascade(0), Some(&first.settings));
        assert_eq!(first.caster_count, 1);
    }

    #[test]
    fn test_directional_fit_snaps_to_texels() {
        let mut instances: Vec<MeshInstance> = Vec::new();
        for yaw in [0.0, 17.0, 45.0, 90.0, 133.0, 271.0] {
            for pitch in [-60.0, -15.0, 0.0, 25.0] {
                let mut light = sun();
                let mut view = Camera::new();
                view.position = Vec3::new(yaw * 0.37, 1.5, pitch * 0.11);
                view.rotation = Quaternion::from_euler_degrees(pitch, yaw, 0.0);
                let fit = cull_directional(&mut light, &[], &mut instances, &view, 0);
                let kx = fit.min_x / fit.texel_size;
                let ky = fit.min_y / fit.texel_size;
                assert_relative_eq!(kx, kx.round(), epsilon = 1e-3);
                assert_relative_eq!(ky, ky.round(), epsilon = 1e-3);
                assert_relative_eq!(fit.settings.ortho_height, fit.frustum_size * 0.5);
            }
        }
    }

    #[test]
    fn test_snapped_origin_moves_in_whole_texels() {
        // Sun straight down: shadow space X follows world X.
        let mut light = Light::new(LightType::Directional);
        light.shadow_distance = 40.0;
        assert_eq!(light.shadow_resolution(), 1024);
        let mut view = Camera::new();
        view.far_clip = 100.0;
        let mut instances: Vec<MeshInstance> = Vec::new();

        let base = cull_directional(&mut light, &[], &mut instances, &view, 0);
        let texel = base.texel_size;
        assert_relative_eq!(texel, base.frustum_size / 1024.0);

        // Tenth-of-a-texel steps: the origin holds, then jumps by one texel.
        let mut previous = base.min_x;
        let (mut holds, mut jumps) = (0, 0);
        for step in 1..=30 {
            view.position = Vec3::new(step as f32 * texel * 0.1, 0.0, 0.0);
            let fit = cull_directional(&mut light, &[], &mut instances, &view, 0);
            let moved = fit.min_x - previous;
            if moved.abs() < texel * 1e-3 {
                holds += 1;
            } else {
                assert_relative_eq!(moved, texel, epsilon = texel * 1e-3);
                jumps += 1;
            }
            assert_relative_eq!(fit.min_y, base.min_y, epsilon = texel * 1e-3);
            previous = fit.min_x;
        }
        assert!(holds >= 24);
        assert!((2..=4).contains(&jumps));
    }

    #[test]
    fn test_casters_tighten_the_depth_range() {
        let mut light = Light::new(LightType::Directional);
        light.shadow_distance = 40.0;
        let view = Camera::new();
        let mut instances = vec![caster_at(Vec3::new(0.0, 0.0, -10.0))];

        let empty = cull_directional(&mut light, &[], &mut instances, &view, 0);
        let with_caster =
            cull_directional(&mut light, &[MeshInstanceId(0)], &mut instances, &view, 0);
        assert_eq!(with_caster.caster_count, 1);
        assert!(with_caster.settings.far_clip < empty.settings.far_clip);
        assert_relative_eq!(with_caster.settings.far_clip, 2.0, epsilon = 1e-3);
        assert_relative_eq!(
            with_caster.settings.position.y,
            1.0 + DIRECTIONAL_SHADOW_EPSILON,
            epsilon = 1e-3
        );
    }
}
