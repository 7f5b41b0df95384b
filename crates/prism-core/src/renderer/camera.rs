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

//! The camera used for culling, shadow fitting and rendering.

use crate::math::{
    degrees_to_radians, BoundingSphere, Frustum, Mat4, Quaternion, SphereContainment, Vec3,
};
use crate::renderer::api::{ClearOptions, Rect, RenderTargetInfo};

/// How a camera projects the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Perspective projection with a vertical field of view.
    #[default]
    Perspective,
    /// Orthographic projection with a half height.
    Orthographic,
}

/// A view into the scene.
///
/// The camera owns its world placement (`position`, `rotation`) directly.
/// The frustum is a cached value refreshed by [`Camera::update_frustum`],
/// which the renderer calls at most once per camera per frame.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Perspective or orthographic.
    pub projection: Projection,
    /// Vertical field of view in degrees (perspective only).
    pub fov: f32,
    /// Half the view height in world units (orthographic only).
    pub ortho_height: f32,
    /// Width divided by height.
    pub aspect_ratio: f32,
    /// Near clip distance.
    pub near_clip: f32,
    /// Far clip distance.
    pub far_clip: f32,
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quaternion,
    /// Clear values and flags.
    pub clear: ClearOptions,
    /// Only instances whose mask intersects this are rendered.
    pub culling_mask: u32,
    /// Whether instances are tested against the frustum.
    pub frustum_culling: bool,
    /// The viewport, normalized to the target.
    pub rect: Rect,
    /// The scissor rectangle, normalized to the target.
    pub scissor_rect: Rect,
    /// The target rendered into, or the backbuffer for `None`.
    pub render_target: Option<RenderTargetInfo>,
    /// Whether material face culling is honoured.
    pub cull_faces: bool,
    /// Whether the culled face is inverted (e.g. for mirrored views).
    pub flip_faces: bool,
    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            fov: 45.0,
            ortho_height: 10.0,
            aspect_ratio: 16.0 / 9.0,
            near_clip: 0.1,
            far_clip: 10000.0,
            position: Vec3::ZERO,
            rotation: Quaternion::IDENTITY,
            clear: ClearOptions::default(),
            culling_mask: 0xFFFF_FFFF,
            frustum_culling: false,
            rect: Rect::FULL,
            scissor_rect: Rect::FULL,
            render_target: None,
            cull_faces: true,
            flip_faces: false,
            frustum: Frustum::default(),
        }
    }
}

impl Camera {
    /// Creates a camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The projection matrix (OpenGL clip space).
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective => Mat4::perspective_rh_gl(
                degrees_to_radians(self.fov),
                self.aspect_ratio,
                self.near_clip,
                self.far_clip,
            ),
            Projection::Orthographic => {
                let y = self.ortho_height;
                let x = y * self.aspect_ratio;
                Mat4::orthographic_rh_gl(-x, x, -y, y, self.near_clip, self.far_clip)
            }
        }
    }

    /// The camera-to-world transform (unit scale).
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_trs(self.position, self.rotation, Vec3::ONE)
    }

    /// The world-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        self.world_transform()
            .affine_inverse()
            .unwrap_or(Mat4::IDENTITY)
    }

    /// `projection * view`.
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Depth linearization parameters `[1/far, far, (1 - far/near)/2, (1 + far/near)/2]`.
    pub fn shader_params(&self) -> [f32; 4] {
        let (n, f) = (self.near_clip, self.far_clip);
        [1.0 / f, f, (1.0 - f / n) / 2.0, (1.0 + f / n) / 2.0]
    }

    /// Recomputes the cached frustum from the current projection and placement.
    pub fn update_frustum(&mut self) {
        self.frustum = Frustum::from_view_projection(&self.view_projection());
    }

    /// The frustum as of the last [`Camera::update_frustum`].
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Tests a sphere against the cached frustum.
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> SphereContainment {
        self.frustum.contains_sphere(sphere)
    }

    /// The viewing direction (`-Z` in camera space).
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// The camera up vector.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// The camera right vector.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Rotates around the camera's own axes by Euler angles in degrees.
    pub fn rotate_local(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = self.rotation * Quaternion::from_euler_degrees(x, y, z);
    }

    /// Moves along the camera's own axes.
    pub fn translate_local(&mut self, x: f32, y: f32, z: f32) {
        self.position += self.rotation * Vec3::new(x, y, z);
    }

    /// The size of the bound target, falling back to the backbuffer size.
    pub fn target_size(&self, backbuffer: (u32, u32)) -> (u32, u32) {
        self.render_target
            .map(|rt| (rt.width, rt.height))
            .unwrap_or(backbuffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn test_default_camera_sees_in_front_only() {
        let mut cam = Camera::new();
        cam.update_frustum();
        let front = BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
        let behind = BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0);
        assert!(cam.contains_sphere(&front).is_visible());
        assert!(!cam.contains_sphere(&behind).is_visible());
    }

    #[test]
    fn test_translate_local_uses_rotation() {
        let mut cam = Camera::new();
        cam.rotate_local(0.0, 90.0, 0.0);
        cam.translate_local(0.0, 0.0, -1.0);
        // Yaw of +90 degrees turns -Z into -X.
        assert!(approx_eq(cam.position.x, -1.0));
        assert!(approx_eq(cam.position.z, 0.0));
    }

    #[test]
    fn test_frustum_follows_camera_after_update() {
        let mut cam = Camera::new();
        cam.position = Vec3::new(100.0, 0.0, 0.0);
        cam.update_frustum();
        let at_origin = BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
        assert!(!cam.contains_sphere(&at_origin).is_visible());
        let ahead = BoundingSphere::new(Vec3::new(100.0, 0.0, -10.0), 1.0);
        assert!(cam.contains_sphere(&ahead).is_visible());
    }

    #[test]
    fn test_shader_params() {
        let mut cam = Camera::new();
        cam.near_clip = 1.0;
        cam.far_clip = 100.0;
        let p = cam.shader_params();
        assert!(approx_eq(p[0], 0.01));
        assert!(approx_eq(p[2], -49.5));
    }
}
