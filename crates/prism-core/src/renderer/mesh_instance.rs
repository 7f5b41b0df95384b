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

//! Mesh instances, command draw calls and their sort keys.

use std::fmt;

use crate::math::{Aabb, BoundingSphere, Mat4, Vec3};
use crate::renderer::api::{
    BlendType, ColorChannel, ShaderDefs, ShaderHandle, ShaderPass, StencilParameters, TextureId,
    VertexBufferId, MASK_DYNAMIC,
};
use crate::renderer::camera::Camera;
use crate::renderer::material::{Material, MaterialId, ParameterSet};
use crate::renderer::mesh::{Mesh, RenderStyle};
use crate::renderer::traits::GraphicsDevice;

/// Index of a mesh instance in the render world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshInstanceId(pub u32);

/// Index of a command in the render world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u32);

/// Screen overlay layer.
pub const LAYER_HUD: u32 = 0;
/// Editor gizmo layer.
pub const LAYER_GIZMO: u32 = 1;
/// Effects layer.
pub const LAYER_FX: u32 = 2;
/// The main world layer.
pub const LAYER_WORLD: u32 = 15;

/// Packed forward-pass ordering key.
///
/// Bits 27-30 hold the layer, bit 26 is set for opaque draws, bit 25 for
/// commands and bits 0-24 hold the material id. Sorting descending on this
/// value groups draws by material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ForwardSortKey(pub u32);

impl ForwardSortKey {
    const LAYER_SHIFT: u32 = 27;
    const OPAQUE_BIT: u32 = 26;
    const COMMAND_BIT: u32 = 25;
    const MATERIAL_MASK: u32 = 0x01ff_ffff;

    /// Packs a key.
    pub fn new(layer: u32, blend: BlendType, is_command: bool, material: MaterialId) -> Self {
        Self(
            (layer & 0x0f) << Self::LAYER_SHIFT
                | u32::from(blend == BlendType::None) << Self::OPAQUE_BIT
                | u32::from(is_command) << Self::COMMAND_BIT
                | (material.0 & Self::MATERIAL_MASK),
        )
    }

    /// The layer field.
    pub fn layer(self) -> u32 {
        (self.0 >> Self::LAYER_SHIFT) & 0x0f
    }

    /// Whether the draw is opaque.
    pub fn is_opaque(self) -> bool {
        self.0 & (1 << Self::OPAQUE_BIT) != 0
    }

    /// Whether the key belongs to a command.
    pub fn is_command(self) -> bool {
        self.0 & (1 << Self::COMMAND_BIT) != 0
    }

    /// The material id field.
    pub fn material(self) -> u32 {
        self.0 & Self::MATERIAL_MASK
    }
}

/// Custom visibility test replacing the bounding sphere check.
pub type VisibilityTest = fn(&MeshInstance, &Camera) -> bool;

/// Skeleton state for a skinned mesh instance.
#[derive(Debug, Clone, Default)]
pub struct SkinInstance {
    /// Current world transform of each bone, set by the animation system.
    pub bone_transforms: Vec<Mat4>,
    /// Inverse bind pose of each bone.
    pub inverse_bind: Vec<Mat4>,
    /// Bone matrices in column-major order, 16 floats per bone.
    pub palette: Vec<f32>,
    /// The texture the palette is uploaded into, when bone textures are used.
    pub bone_texture: Option<TextureId>,
    dirty: bool,
}

impl SkinInstance {
    /// Creates a skin for the given inverse bind poses, with bones at bind pose.
    pub fn new(inverse_bind: Vec<Mat4>) -> Self {
        let bone_transforms = inverse_bind
            .iter()
            .map(|m| m.inverse().unwrap_or(Mat4::IDENTITY))
            .collect();
        Self {
            bone_transforms,
            palette: vec![0.0; inverse_bind.len() * 16],
            inverse_bind,
            bone_texture: None,
            dirty: true,
        }
    }

    /// The number of bones.
    pub fn bone_count(&self) -> usize {
        self.inverse_bind.len()
    }

    /// Recomputes the palette on the CPU.
    pub fn update_matrices(&mut self) {
        self.palette.resize(self.inverse_bind.len() * 16, 0.0);
        for (i, (bone, inv)) in self
            .bone_transforms
            .iter()
            .zip(&self.inverse_bind)
            .enumerate()
        {
            let m = *bone * *inv;
            self.palette[i * 16..(i + 1) * 16].copy_from_slice(&m.to_cols_array());
        }
        self.dirty = true;
    }

    /// Whether the palette changed since the last upload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the palette as uploaded.
    pub fn mark_uploaded(&mut self) {
        self.dirty = false;
    }
}

/// One blend shape.
#[derive(Debug, Clone, Default)]
pub struct MorphTarget {
    /// Per-vertex position offsets.
    pub deltas: Vec<Vec3>,
}

/// Blend shape state for a morphed mesh instance.
#[derive(Debug, Clone)]
pub struct MorphInstance {
    /// Unmorphed positions.
    pub base_positions: Vec<Vec3>,
    /// The blend shapes.
    pub targets: Vec<MorphTarget>,
    /// One weight per target.
    pub weights: Vec<f32>,
    /// The dynamic vertex buffer receiving blended positions.
    pub vertex_buffer: VertexBufferId,
    blended: Vec<Vec3>,
    aabb: Aabb,
    dirty: bool,
}

impl MorphInstance {
    /// Creates a morph with all weights at zero.
    pub fn new(base_positions: Vec<Vec3>, targets: Vec<MorphTarget>, vertex_buffer: VertexBufferId) -> Self {
        let aabb = Aabb::from_points(&base_positions).unwrap_or_default();
        Self {
            blended: base_positions.clone(),
            weights: vec![0.0; targets.len()],
            base_positions,
            targets,
            vertex_buffer,
            aabb,
            dirty: true,
        }
    }

    /// Sets a target weight.
    pub fn set_weight(&mut self, target: usize, weight: f32) {
        if let Some(w) = self.weights.get_mut(target) {
            if *w != weight {
                *w = weight;
                self.dirty = true;
            }
        }
    }

    /// Blends positions and recomputes the object-space bounds if any weight changed.
    pub fn update(&mut self) {
        if !self.dirty {
            return;
        }
        self.blended.clone_from(&self.base_positions);
        for (target, &w) in self.targets.iter().zip(&self.weights) {
            if w == 0.0 {
                continue;
            }
            for (p, d) in self.blended.iter_mut().zip(&target.deltas) {
                *p += *d * w;
            }
        }
        if let Some(aabb) = Aabb::from_points(&self.blended) {
            self.aabb = aabb;
        }
        self.dirty = false;
    }

    /// Blended positions, ready for upload.
    pub fn blended_positions(&self) -> &[Vec3] {
        &self.blended
    }

    /// Object-space bounds of the blended positions.
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }
}

/// Per-instance transforms for hardware instancing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstancingData {
    /// The buffer holding one transform per instance.
    pub vertex_buffer: VertexBufferId,
    /// The number of instances.
    pub count: u32,
    /// Byte offset of the first transform.
    pub offset: u32,
    /// Built by the batcher for one draw. Consumed by that draw, which also
    /// stands in for the `count - 1` draw calls that follow it.
    pub auto: bool,
}

/// A renderable instance of a mesh with a material.
#[derive(Debug, Clone)]
pub struct MeshInstance {
    /// The geometry.
    pub mesh: Mesh,
    material: MaterialId,
    world_transform: Mat4,
    custom_aabb: Option<Aabb>,
    aabb: Aabb,
    aabb_version: u32,
    radius_cache: (u32, f32),
    /// Whether the instance is drawn at all.
    pub visible: bool,
    layer: u32,
    /// How the mesh is rasterized.
    pub render_style: RenderStyle,
    /// Whether the instance renders into shadow maps.
    pub cast_shadow: bool,
    /// Whether frustum culling applies.
    pub cull: bool,
    /// Explicit draw order. Zero means unset.
    pub draw_order: i32,
    /// Distance along the camera forward axis, set by back/front sorting.
    pub zdist: Option<f32>,
    /// Secondary front-to-back distance.
    pub zdist2: Option<f32>,
    /// Inverts the culled face.
    pub flip_faces: bool,
    /// Overrides the material's front stencil.
    pub stencil_front: Option<StencilParameters>,
    /// Overrides the material's back stencil.
    pub stencil_back: Option<StencilParameters>,
    /// Replaces the bounding sphere test.
    pub is_visible: Option<VisibilityTest>,
    /// Uniform overrides bound after the material's.
    pub parameters: ParameterSet,
    /// Hardware instancing data.
    pub instancing: Option<InstancingData>,
    /// Set by culling when the instance is seen by any camera or light.
    pub visible_this_frame: bool,
    skin: Option<SkinInstance>,
    morph: Option<MorphInstance>,
    defs: ShaderDefs,
    sort_key: ForwardSortKey,
    depth_key: u32,
    shaders: [Option<ShaderHandle>; ShaderPass::COUNT as usize],
}

impl MeshInstance {
    /// Creates a visible world-layer instance.
    pub fn new(mesh: Mesh, material: &Material) -> Self {
        let format = mesh.vertex_format;
        let mut defs = ShaderDefs::empty().with_mask(MASK_DYNAMIC);
        defs.set(ShaderDefs::UV0, format.has_uv0);
        defs.set(ShaderDefs::UV1, format.has_uv1);
        defs.set(ShaderDefs::VCOLOR, format.has_color);
        defs.set(ShaderDefs::TANGENTS, format.has_tangents);
        let aabb = mesh.aabb;

        let mut instance = Self {
            mesh,
            material: material.id,
            world_transform: Mat4::IDENTITY,
            custom_aabb: None,
            aabb,
            aabb_version: 0,
            radius_cache: (u32::MAX, 0.0),
            visible: true,
            layer: LAYER_WORLD,
            render_style: RenderStyle::Solid,
            cast_shadow: false,
            cull: true,
            draw_order: 0,
            zdist: None,
            zdist2: None,
            flip_faces: false,
            stencil_front: None,
            stencil_back: None,
            is_visible: None,
            parameters: ParameterSet::default(),
            instancing: None,
            visible_this_frame: false,
            skin: None,
            morph: None,
            defs,
            sort_key: ForwardSortKey::default(),
            depth_key: 0,
            shaders: [None; ShaderPass::COUNT as usize],
        };
        instance.update_key(material);
        instance
    }

    // --- Material and keys ---

    /// The material.
    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Switches material, dropping cached programs.
    pub fn set_material(&mut self, material: &Material) {
        self.material = material.id;
        self.clear_shaders();
        self.update_key(material);
    }

    /// The legacy layer id stored in the sort key.
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Sets the legacy layer id.
    pub fn set_layer(&mut self, layer: u32, material: &Material) {
        self.layer = layer;
        self.update_key(material);
    }

    /// Recomputes the forward sort key after a material blend change.
    pub fn update_key(&mut self, material: &Material) {
        self.sort_key =
            ForwardSortKey::new(self.layer, material.sort_blend_type(), false, material.id);
    }

    /// The forward sort key.
    pub fn sort_key(&self) -> ForwardSortKey {
        self.sort_key
    }

    /// The depth/shadow pass sort key.
    pub fn depth_key(&self) -> u32 {
        self.depth_key
    }

    /// Recomputes the depth sort key: skinning adds 10, an opacity map adds its channel (1-4).
    pub fn update_depth_key(&mut self, material: &Material) {
        let skin = if self.skin.is_some() { 10 } else { 0 };
        let alpha = if material.opacity_map.is_some() {
            match material.opacity_channel {
                ColorChannel::R => 1,
                ColorChannel::G => 2,
                ColorChannel::B => 3,
                ColorChannel::A => 4,
            }
        } else {
            0
        };
        self.depth_key = skin + alpha;
    }

    // --- Shader defs and cache ---

    /// The shader feature toggles and light mask.
    pub fn shader_defs(&self) -> ShaderDefs {
        self.defs
    }

    /// The light mask.
    pub fn mask(&self) -> u32 {
        self.defs.mask()
    }

    /// Sets the light mask.
    pub fn set_mask(&mut self, mask: u32) {
        self.update_defs(self.defs.with_mask(mask));
    }

    /// Whether the instance samples shadow maps.
    pub fn receive_shadow(&self) -> bool {
        !self.defs.contains(ShaderDefs::NO_SHADOW)
    }

    /// Enables or disables shadow receiving.
    pub fn set_receive_shadow(&mut self, receive: bool) {
        let mut defs = self.defs;
        defs.set(ShaderDefs::NO_SHADOW, !receive);
        self.update_defs(defs);
    }

    /// Whether the instance is rendered in screen space.
    pub fn screen_space(&self) -> bool {
        self.defs.contains(ShaderDefs::SCREEN_SPACE)
    }

    /// Toggles screen-space rendering.
    pub fn set_screen_space(&mut self, screen_space: bool) {
        let mut defs = self.defs;
        defs.set(ShaderDefs::SCREEN_SPACE, screen_space);
        self.update_defs(defs);
    }

    /// The skin, if skinned.
    pub fn skin(&self) -> Option<&SkinInstance> {
        self.skin.as_ref()
    }

    /// Mutable access to the skin.
    pub fn skin_mut(&mut self) -> Option<&mut SkinInstance> {
        self.skin.as_mut()
    }

    /// Attaches or removes a skin.
    pub fn set_skin(&mut self, skin: Option<SkinInstance>) {
        let mut defs = self.defs;
        defs.set(ShaderDefs::SKIN, skin.is_some());
        self.skin = skin;
        self.update_defs(defs);
    }

    /// The morph, if morphed.
    pub fn morph(&self) -> Option<&MorphInstance> {
        self.morph.as_ref()
    }

    /// Mutable access to the morph.
    pub fn morph_mut(&mut self) -> Option<&mut MorphInstance> {
        self.morph.as_mut()
    }

    /// Attaches or removes a morph.
    pub fn set_morph(&mut self, morph: Option<MorphInstance>) {
        let mut defs = self.defs;
        defs.set(ShaderDefs::MORPH_POSITION, morph.is_some());
        self.morph = morph;
        self.update_defs(defs);
        self.refresh_aabb();
    }

    /// Attaches or removes hardware instancing data.
    pub fn set_instancing(&mut self, data: Option<InstancingData>) {
        let mut defs = self.defs;
        defs.set(ShaderDefs::INSTANCING, data.is_some());
        self.instancing = data;
        self.update_defs(defs);
    }

    fn update_defs(&mut self, defs: ShaderDefs) {
        if defs != self.defs {
            self.defs = defs;
            self.clear_shaders();
        }
    }

    /// The cached program for a pass.
    pub fn shader(&self, pass: ShaderPass) -> Option<ShaderHandle> {
        self.shaders[pass.index() as usize]
    }

    /// Caches the program for a pass.
    pub fn set_shader(&mut self, pass: ShaderPass, shader: ShaderHandle) {
        self.shaders[pass.index() as usize] = Some(shader);
    }

    /// Drops every cached program.
    pub fn clear_shaders(&mut self) {
        self.shaders = [None; ShaderPass::COUNT as usize];
    }

    // --- Transform and bounds ---

    /// The world transform.
    pub fn world_transform(&self) -> &Mat4 {
        &self.world_transform
    }

    /// Moves the instance and refreshes its world bounds.
    pub fn set_world_transform(&mut self, transform: Mat4) {
        self.world_transform = transform;
        self.refresh_aabb();
    }

    /// Overrides the object-space bounds, e.g. for skinned meshes.
    pub fn set_custom_aabb(&mut self, aabb: Option<Aabb>) {
        self.custom_aabb = aabb;
        self.refresh_aabb();
    }

    /// Recomputes the world bounds from the local bounds and transform.
    pub fn refresh_aabb(&mut self) {
        let local = self
            .custom_aabb
            .or_else(|| self.morph.as_ref().map(MorphInstance::aabb))
            .unwrap_or(self.mesh.aabb);
        self.aabb = local.transform(&self.world_transform);
        self.aabb_version = self.aabb_version.wrapping_add(1);
    }

    /// World-space bounds.
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Bumped every time the world bounds change.
    pub fn aabb_version(&self) -> u32 {
        self.aabb_version
    }

    /// The culling sphere. Its radius is cached until the bounds change.
    pub fn bounding_sphere(&mut self) -> BoundingSphere {
        if self.radius_cache.0 != self.aabb_version {
            self.radius_cache = (self.aabb_version, self.aabb.bounding_radius());
        }
        BoundingSphere::new(self.aabb.center, self.radius_cache.1)
    }

    /// The vertex buffer to draw, the morphed one when morphing.
    pub fn vertex_buffer(&self) -> VertexBufferId {
        self.morph
            .as_ref()
            .map_or(self.mesh.vertex_buffer, |m| m.vertex_buffer)
    }
}

/// A callback invoked in draw order instead of a mesh draw.
pub type CommandFn = Box<dyn FnMut(&mut dyn GraphicsDevice)>;

/// A pseudo draw call running custom device commands in the sorted stream.
pub struct Command {
    /// The legacy layer id stored in the sort key.
    pub layer: u32,
    key: ForwardSortKey,
    callback: CommandFn,
}

impl Command {
    /// Creates a command sorted as if it were a material-less draw of `blend_type`.
    pub fn new(layer: u32, blend_type: BlendType, callback: CommandFn) -> Self {
        Self {
            layer,
            key: ForwardSortKey::new(layer, blend_type, true, MaterialId(0)),
            callback,
        }
    }

    /// The forward sort key.
    pub fn sort_key(&self) -> ForwardSortKey {
        self.key
    }

    /// Runs the callback.
    pub fn execute(&mut self, device: &mut dyn GraphicsDevice) {
        (self.callback)(device)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("layer", &self.layer)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// An entry of a visible list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawCall {
    /// Draw a mesh instance.
    Mesh(MeshInstanceId),
    /// Run a command.
    Command(CommandId),
}
