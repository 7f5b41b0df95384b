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

//! Defines the `RenderWorld`, the arena the render lanes read and mutate.
//!
//! Mesh instances, materials, lights, cameras and commands live in flat
//! vectors and are addressed by typed indices. Layers and the composition
//! only ever hold those indices, so a frame can borrow disjoint parts of the
//! world (the camera being rendered and the instances being culled) without
//! any shared ownership.

use prism_core::renderer::{
    Camera, Command, DrawCall, Light, LightType, Material, MaterialId, Mesh, MeshInstance,
    MeshInstanceId,
};
use prism_core::renderer::CommandId;

/// Index of a light in the [`RenderWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

/// Index of a camera in the [`RenderWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u32);

/// The material every world starts with, used when a shader variant cannot be built.
pub const FALLBACK_MATERIAL: MaterialId = MaterialId(0);

/// Everything the renderer draws, stored by index.
#[derive(Debug)]
pub struct RenderWorld {
    pub(crate) instances: Vec<MeshInstance>,
    pub(crate) materials: Vec<Material>,
    pub(crate) lights: Vec<Light>,
    pub(crate) cameras: Vec<Camera>,
    pub(crate) commands: Vec<Command>,
    default_cache_shadow_map: bool,
}

impl Default for RenderWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderWorld {
    /// Creates a world holding only the fallback material.
    pub fn new() -> Self {
        let mut fallback = Material::new(FALLBACK_MATERIAL);
        fallback.name = "Fallback".to_string();
        fallback.use_lighting = false;
        Self {
            instances: Vec::new(),
            materials: vec![fallback],
            lights: Vec::new(),
            cameras: Vec::new(),
            commands: Vec::new(),
            default_cache_shadow_map: false,
        }
    }

    /// Sets the `cache_shadow_map` value given to lights added from now on.
    pub fn set_default_cache_shadow_map(&mut self, cache: bool) {
        self.default_cache_shadow_map = cache;
    }

    // --- Materials ---

    /// Adds a material, assigning it the next id.
    pub fn add_material(&mut self, mut material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        material.id = id;
        self.materials.push(material);
        id
    }

    /// Returns a material.
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Returns a material for modification.
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    /// The fallback material.
    pub fn fallback_material(&self) -> &Material {
        &self.materials[FALLBACK_MATERIAL.0 as usize]
    }

    // --- Mesh instances ---

    /// Creates a mesh instance. An unknown material resolves to the fallback material.
    pub fn add_mesh_instance(&mut self, mesh: Mesh, material: MaterialId) -> MeshInstanceId {
        let material = self
            .materials
            .get(material.0 as usize)
            .unwrap_or(&self.materials[FALLBACK_MATERIAL.0 as usize]);
        let mut instance = MeshInstance::new(mesh, material);
        instance.update_depth_key(material);
        let id = MeshInstanceId(self.instances.len() as u32);
        self.instances.push(instance);
        id
    }

    /// Returns a mesh instance.
    pub fn mesh_instance(&self, id: MeshInstanceId) -> Option<&MeshInstance> {
        self.instances.get(id.0 as usize)
    }

    /// Returns a mesh instance for modification.
    pub fn mesh_instance_mut(&mut self, id: MeshInstanceId) -> Option<&mut MeshInstance> {
        self.instances.get_mut(id.0 as usize)
    }

    /// Switches the material of an instance, dropping its cached programs.
    ///
    /// Returns `false` if either id is unknown.
    pub fn set_instance_material(&mut self, id: MeshInstanceId, material: MaterialId) -> bool {
        let (Some(instance), Some(material)) = (
            self.instances.get_mut(id.0 as usize),
            self.materials.get(material.0 as usize),
        ) else {
            return false;
        };
        instance.set_material(material);
        instance.update_depth_key(material);
        true
    }

    /// The number of mesh instances.
    pub fn mesh_instance_count(&self) -> usize {
        self.instances.len()
    }

    // --- Commands ---

    /// Adds a command draw call.
    pub fn add_command(&mut self, command: Command) -> CommandId {
        let id = CommandId(self.commands.len() as u32);
        self.commands.push(command);
        id
    }

    /// Returns a command.
    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0 as usize)
    }

    // --- Lights ---

    /// Adds a light. Its `cache_shadow_map` takes the world default.
    pub fn add_light(&mut self, mut light: Light) -> LightId {
        light.cache_shadow_map = self.default_cache_shadow_map;
        let id = LightId(self.lights.len() as u32);
        self.lights.push(light);
        id
    }

    /// Returns a light.
    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0 as usize)
    }

    /// Returns a light for modification.
    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id.0 as usize)
    }

    /// The type of a light, if it exists.
    pub fn light_type(&self, id: LightId) -> Option<LightType> {
        self.light(id).map(Light::light_type)
    }

    // --- Cameras ---

    /// Adds a camera.
    pub fn add_camera(&mut self, camera: Camera) -> CameraId {
        let id = CameraId(self.cameras.len() as u32);
        self.cameras.push(camera);
        id
    }

    /// Returns a camera.
    pub fn camera(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(id.0 as usize)
    }

    /// Returns a camera for modification.
    pub fn camera_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.get_mut(id.0 as usize)
    }

    // --- Frame bookkeeping ---

    /// Whether a draw call is opaque for layer partitioning.
    pub fn is_opaque(&self, draw_call: DrawCall) -> bool {
        match draw_call {
            DrawCall::Mesh(id) => self
                .mesh_instance(id)
                .and_then(|mi| self.material(mi.material()))
                .is_none_or(Material::is_opaque),
            DrawCall::Command(id) => self.command(id).is_none_or(|c| c.sort_key().is_opaque()),
        }
    }

    /// Consumes pending material blend changes and refreshes the sort keys
    /// of the affected instances.
    ///
    /// Returns whether any material changed its blending.
    pub fn take_dirty_blend(&mut self) -> bool {
        let mut changed = Vec::new();
        for material in &mut self.materials {
            if material.take_dirty_blend() {
                changed.push(material.id);
            }
        }
        if changed.is_empty() {
            return false;
        }
        for instance in &mut self.instances {
            if changed.contains(&instance.material()) {
                let material = &self.materials[instance.material().0 as usize];
                instance.update_key(material);
            }
        }
        true
    }

    /// Returns the lights whose shader key changed since the last call.
    pub fn take_light_key_changes(&mut self) -> Vec<LightId> {
        self.lights
            .iter_mut()
            .enumerate()
            .filter_map(|(i, light)| light.take_key_changed().then_some(LightId(i as u32)))
            .collect()
    }

    /// Drops every cached shader variant of every material and instance.
    pub fn clear_shader_variants(&mut self) {
        for material in &mut self.materials {
            material.clear_variants();
        }
        for instance in &mut self.instances {
            instance.clear_shaders();
        }
    }

    /// Drops the cached variants of lit materials only.
    pub fn clear_lit_shader_variants(&mut self) {
        for material in &mut self.materials {
            if material.use_lighting {
                material.clear_variants();
            }
        }
        for instance in &mut self.instances {
            let lit = self
                .materials
                .get(instance.material().0 as usize)
                .is_some_and(|m| m.use_lighting);
            if lit {
                instance.clear_shaders();
            }
        }
    }
}
