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

//! Visibility culling of draw calls, shadow casters and lights.
//!
//! Culling never reorders: survivors keep their input order and sorting is
//! left to [`super::sort_visible`]. Every survivor is flagged
//! `visible_this_frame`, which gates the skin and morph uploads later in the
//! frame.

use prism_core::math::Aabb;
use prism_core::renderer::{
    Camera, DrawCall, Light, LightType, MeshInstance, MeshInstanceId, ShadowUpdateMode,
};

use super::world::LightId;

/// Whether an instance survives the geometric test of `camera`.
///
/// A custom visibility callback replaces the sphere test.
pub fn is_visible(camera: &Camera, instance: &mut MeshInstance) -> bool {
    if !instance.visible {
        return false;
    }
    if let Some(test) = instance.is_visible {
        return test(instance, camera);
    }
    let sphere = instance.bounding_sphere();
    camera.contains_sphere(&sphere).is_visible()
}

/// Whether the instance mask shares a bit with the camera culling mask.
#[inline]
pub fn mask_visible(camera: &Camera, instance: &MeshInstance) -> bool {
    instance.mask() & camera.culling_mask != 0
}

/// Culls `draw_calls` for `camera`, appending the survivors to `visible`.
///
/// Commands always survive. Mesh instances must be visible and pass the mask
/// test; when the camera has frustum culling enabled, instances that opt into
/// culling must also pass the sphere test.
///
/// Returns the number of mesh instances rejected.
pub fn cull(
    camera: &Camera,
    draw_calls: &[DrawCall],
    instances: &mut [MeshInstance],
    visible: &mut Vec<DrawCall>,
) -> usize {
    let mut rejected = 0;
    for &draw_call in draw_calls {
        let DrawCall::Mesh(id) = draw_call else {
            visible.push(draw_call);
            continue;
        };
        let Some(instance) = instances.get_mut(id.0 as usize) else {
            continue;
        };
        let passes = instance.visible
            && mask_visible(camera, instance)
            && (!camera.frustum_culling || !instance.cull || is_visible(camera, instance));
        if passes {
            instance.visible_this_frame = true;
            visible.push(draw_call);
        } else {
            rejected += 1;
        }
    }
    rejected
}

/// Marks the shadowed local lights whose volume touches the camera frustum.
///
/// Directional lights are left alone: they are visible from every camera and
/// are flagged at the start of the frame.
pub fn cull_lights(camera: &Camera, ids: &[LightId], lights: &mut [Light]) {
    for id in ids {
        let Some(light) = lights.get_mut(id.0 as usize) else {
            continue;
        };
        if !light.cast_shadows()
            || !light.enabled()
            || light.shadow_update_mode == ShadowUpdateMode::None
            || light.light_type() == LightType::Directional
        {
            continue;
        }
        if let Some(sphere) = light.bounding_sphere() {
            if camera.contains_sphere(&sphere).is_visible() {
                light.visible_this_frame = true;
            }
        }
    }
}

/// Culls shadow casters against a shadow camera into `out`.
///
/// Returns the union of the survivors' world bounds, or `None` when nothing
/// survived.
pub(crate) fn cull_casters(
    camera: &Camera,
    casters: &[MeshInstanceId],
    instances: &mut [MeshInstance],
    out: &mut Vec<MeshInstanceId>,
) -> Option<Aabb> {
    out.clear();
    let mut bounds: Option<Aabb> = None;
    for &id in casters {
        let Some(instance) = instances.get_mut(id.0 as usize) else {
            continue;
        };
        if instance.cull && !is_visible(camera, instance) {
            continue;
        }
        instance.visible_this_frame = true;
        out.push(id);
        match bounds.as_mut() {
            Some(b) => b.add(instance.aabb()),
            None => bounds = Some(*instance.aabb()),
        }
    }
    bounds
}
