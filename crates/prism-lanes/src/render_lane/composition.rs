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

//! Layers and the layer composition.
//!
//! A [`Layer`] groups draw calls, lights and cameras with their render
//! settings. The [`LayerComposition`] orders layers as sub-layers (the
//! opaque and transparent half of a layer) and, in [`LayerComposition::update`],
//! derives the flattened frame data the renderer walks: deduplicated
//! instances, lights and cameras, per-light shadow casters and the render
//! list of (sub-layer, camera) pairs.

use ahash::AHashSet;
use prism_core::math::Color;
use prism_core::prism_bitflags;
use prism_core::renderer::{
    Camera, ClearFlags, ClearOptions, Command, CommandId, DrawCall, Light, LightType,
    MeshInstance, MeshInstanceId, RenderTargetInfo, ShaderPass,
};

use super::cull_lane::cull;
use super::draw_sort::{sort_visible, CustomSort, SortMode};
use super::world::{CameraId, LightId, RenderWorld};

prism_bitflags! {
    /// What a [`LayerComposition::update`] rebuilt.
    pub struct CompositionUpdate: u32 {
        /// The instance list.
        const INSTANCES = 1 << 0;
        /// The light lists and shadow casters.
        const LIGHTS = 1 << 1;
        /// The camera list and the render list.
        const CAMERAS = 1 << 2;
        /// Instances moved between the opaque and transparent lists.
        const BLEND = 1 << 3;
    }
}

/// Draw calls found visible for one camera, reused across frames.
#[derive(Debug, Clone, Default)]
pub struct VisibleList {
    /// Visible draw calls in culling (later sorted) order.
    pub list: Vec<DrawCall>,
    /// Set once the list was culled this frame.
    pub done: bool,
}

fn hash_keys(values: impl Iterator<Item = u32>) -> u32 {
    let mut any = false;
    let hash = values.fold(17u32, |h, v| {
        any = true;
        h.wrapping_mul(31).wrapping_add(v)
    });
    if any {
        hash
    } else {
        0
    }
}

/// A renderable subset of the scene with its render settings.
#[derive(Debug)]
pub struct Layer {
    id: u32,
    /// A name for lookups and logs.
    pub name: String,
    /// Disabled layers are neither culled nor drawn.
    pub enabled: bool,
    /// Ordering of the opaque visible lists.
    pub opaque_sort_mode: SortMode,
    /// Ordering of the transparent visible lists.
    pub transparent_sort_mode: SortMode,
    /// Used by [`SortMode::Custom`].
    pub custom_sort: Option<CustomSort>,
    /// The shader pass draw calls of this layer use.
    pub shader_pass: ShaderPass,
    /// Combined with the camera culling mask when drawing.
    pub culling_mask: u32,
    /// Overrides the camera target.
    pub render_target: Option<RenderTargetInfo>,
    /// Clear with [`Layer::clear`] before the layer's first draw for each camera,
    /// instead of the once-per-target camera clear.
    pub override_clear: bool,
    /// The layer clear values and flags.
    pub clear: ClearOptions,

    pub(crate) opaque: Vec<DrawCall>,
    pub(crate) transparent: Vec<DrawCall>,
    pub(crate) shadow_casters: Vec<MeshInstanceId>,
    pub(crate) lights: Vec<LightId>,
    pub(crate) sorted_lights: [Vec<LightId>; 3],
    cameras: Vec<CameraId>,
    pub(crate) visible_opaque: Vec<VisibleList>,
    pub(crate) visible_transparent: Vec<VisibleList>,
    light_hash: u32,
    camera_hash: u32,
    dirty: bool,
    dirty_lights: bool,
    dirty_cameras: bool,
}

impl Layer {
    /// Creates an enabled, empty layer.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            opaque_sort_mode: SortMode::MaterialMesh,
            transparent_sort_mode: SortMode::BackToFront,
            custom_sort: None,
            shader_pass: ShaderPass::Forward,
            culling_mask: 0xFFFF_FFFF,
            render_target: None,
            override_clear: false,
            clear: ClearOptions {
                color: Color::new(0.0, 0.0, 0.0, 1.0),
                depth: 1.0,
                stencil: 0,
                flags: ClearFlags::empty(),
            },
            opaque: Vec::new(),
            transparent: Vec::new(),
            shadow_casters: Vec::new(),
            lights: Vec::new(),
            sorted_lights: [Vec::new(), Vec::new(), Vec::new()],
            cameras: Vec::new(),
            visible_opaque: Vec::new(),
            visible_transparent: Vec::new(),
            light_hash: 0,
            camera_hash: 0,
            dirty: false,
            dirty_lights: false,
            dirty_cameras: false,
        }
    }

    /// The layer id.
    pub fn id(&self) -> u32 {
        self.id
    }

    // --- Draw calls ---

    /// Adds mesh instances to the opaque or transparent list according to
    /// their material, and to the shadow casters unless `skip_shadow_casters`.
    pub fn add_mesh_instances(
        &mut self,
        world: &RenderWorld,
        instances: &[MeshInstanceId],
        skip_shadow_casters: bool,
    ) {
        for &id in instances {
            let Some(instance) = world.mesh_instance(id) else {
                log::warn!("Layer '{}': ignoring unknown mesh instance {:?}", self.name, id);
                continue;
            };
            let draw_call = DrawCall::Mesh(id);
            let list = if world.is_opaque(draw_call) {
                &mut self.opaque
            } else {
                &mut self.transparent
            };
            if !list.contains(&draw_call) {
                list.push(draw_call);
            }
            if !skip_shadow_casters && instance.cast_shadow && !self.shadow_casters.contains(&id) {
                self.shadow_casters.push(id);
            }
        }
        self.dirty = true;
    }

    /// Removes mesh instances from both lists and, unless `skip_shadow_casters`,
    /// from the shadow casters.
    pub fn remove_mesh_instances(&mut self, instances: &[MeshInstanceId], skip_shadow_casters: bool) {
        for &id in instances {
            let draw_call = DrawCall::Mesh(id);
            self.opaque.retain(|dc| *dc != draw_call);
            self.transparent.retain(|dc| *dc != draw_call);
            if !skip_shadow_casters {
                self.shadow_casters.retain(|c| *c != id);
            }
        }
        self.dirty = true;
    }

    /// Removes every draw call.
    pub fn clear_mesh_instances(&mut self, skip_shadow_casters: bool) {
        if self.opaque.is_empty()
            && self.transparent.is_empty()
            && (skip_shadow_casters || self.shadow_casters.is_empty())
        {
            return;
        }
        self.opaque.clear();
        self.transparent.clear();
        if !skip_shadow_casters {
            self.shadow_casters.clear();
        }
        self.dirty = true;
    }

    /// Adds a command to the list its sort key belongs to.
    pub fn add_command(&mut self, world: &RenderWorld, command: CommandId) {
        if world.command(command).is_none() {
            log::warn!("Layer '{}': ignoring unknown command {:?}", self.name, command);
            return;
        }
        let draw_call = DrawCall::Command(command);
        let list = if world.is_opaque(draw_call) {
            &mut self.opaque
        } else {
            &mut self.transparent
        };
        if !list.contains(&draw_call) {
            list.push(draw_call);
            self.dirty = true;
        }
    }

    /// The opaque draw calls.
    pub fn opaque_draw_calls(&self) -> &[DrawCall] {
        &self.opaque
    }

    /// The transparent draw calls.
    pub fn transparent_draw_calls(&self) -> &[DrawCall] {
        &self.transparent
    }

    /// Adds instances as shadow casters only. Instances that do not cast
    /// shadows are skipped.
    pub fn add_shadow_casters(&mut self, world: &RenderWorld, instances: &[MeshInstanceId]) {
        for &id in instances {
            let casts = world.mesh_instance(id).is_some_and(|mi| mi.cast_shadow);
            if casts && !self.shadow_casters.contains(&id) {
                self.shadow_casters.push(id);
            }
        }
        self.dirty_lights = true;
    }

    /// Stops instances from casting shadows in this layer.
    pub fn remove_shadow_casters(&mut self, instances: &[MeshInstanceId]) {
        self.shadow_casters.retain(|c| !instances.contains(c));
        self.dirty_lights = true;
    }

    /// The shadow casters.
    pub fn shadow_casters(&self) -> &[MeshInstanceId] {
        &self.shadow_casters
    }

    // --- Lights ---

    /// Adds a light.
    pub fn add_light(&mut self, light: LightId) {
        if self.lights.contains(&light) {
            return;
        }
        self.lights.push(light);
        self.dirty_lights = true;
    }

    /// Removes a light.
    pub fn remove_light(&mut self, light: LightId) {
        let before = self.lights.len();
        self.lights.retain(|l| *l != light);
        if self.lights.len() != before {
            self.dirty_lights = true;
        }
    }

    /// Removes every light.
    pub fn clear_lights(&mut self) {
        self.lights.clear();
        self.dirty_lights = true;
    }

    /// The lights, ordered by key (descending) after the last composition update.
    pub fn lights(&self) -> &[LightId] {
        &self.lights
    }

    /// The enabled lights of one type.
    pub fn sorted_lights(&self, light_type: LightType) -> &[LightId] {
        &self.sorted_lights[light_type as usize]
    }

    /// A hash over the keys of the enabled lights, zero without any.
    pub fn light_hash(&self) -> u32 {
        self.light_hash
    }

    pub(crate) fn mark_lights_dirty(&mut self) {
        self.dirty_lights = true;
    }

    /// Orders the lights by key, refreshes the light hash and the per-type lists.
    pub(crate) fn refresh_lights(&mut self, lights: &[Light]) {
        let key = |id: &LightId| lights.get(id.0 as usize).map(Light::key);
        self.lights.sort_by(|a, b| key(b).cmp(&key(a)));
        self.light_hash = hash_keys(
            self.lights
                .iter()
                .filter_map(|id| lights.get(id.0 as usize))
                .filter(|l| l.enabled())
                .map(|l| l.key().0),
        );
        for sorted in &mut self.sorted_lights {
            sorted.clear();
        }
        for id in &self.lights {
            let Some(light) = lights.get(id.0 as usize) else {
                continue;
            };
            if light.enabled() {
                self.sorted_lights[light.light_type() as usize].push(*id);
            }
        }
        self.dirty_lights = false;
    }

    // --- Cameras ---

    /// Adds a camera. Cameras are kept ordered by id.
    pub fn add_camera(&mut self, camera: CameraId) {
        if self.cameras.contains(&camera) {
            return;
        }
        self.cameras.push(camera);
        self.generate_camera_hash();
    }

    /// Removes a camera and empties the visible lists at its index.
    pub fn remove_camera(&mut self, camera: CameraId) {
        let Some(index) = self.cameras.iter().position(|c| *c == camera) else {
            return;
        };
        self.cameras.remove(index);
        self.generate_camera_hash();
        for visible in [self.visible_opaque.get_mut(index), self.visible_transparent.get_mut(index)]
            .into_iter()
            .flatten()
        {
            visible.list.clear();
        }
    }

    /// Removes every camera.
    pub fn clear_cameras(&mut self) {
        self.cameras.clear();
        self.camera_hash = 0;
        self.dirty_cameras = true;
    }

    /// The cameras, ordered by id.
    pub fn cameras(&self) -> &[CameraId] {
        &self.cameras
    }

    /// A hash identifying the camera set, zero for at most one camera.
    pub fn camera_hash(&self) -> u32 {
        self.camera_hash
    }

    fn generate_camera_hash(&mut self) {
        self.cameras.sort();
        self.camera_hash = if self.cameras.len() > 1 {
            hash_keys(self.cameras.iter().map(|c| c.0))
        } else {
            0
        };
        self.dirty_cameras = true;
    }

    // --- Visible lists ---

    /// The visible list of a half for a layer camera index.
    pub fn visible_list(&self, transparent: bool, camera_pass: usize) -> Option<&VisibleList> {
        if transparent {
            self.visible_transparent.get(camera_pass)
        } else {
            self.visible_opaque.get(camera_pass)
        }
    }

    pub(crate) fn visible_list_mut(
        &mut self,
        transparent: bool,
        camera_pass: usize,
    ) -> Option<&mut VisibleList> {
        if transparent {
            self.visible_transparent.get_mut(camera_pass)
        } else {
            self.visible_opaque.get_mut(camera_pass)
        }
    }

    /// Makes sure every camera has a pair of visible lists and marks them not
    /// culled. One surplus pair (left behind by a removed camera) is dropped per call.
    pub(crate) fn begin_frame(&mut self) {
        let count = self.cameras.len();
        for lists in [&mut self.visible_opaque, &mut self.visible_transparent] {
            if lists.len() < count {
                lists.resize_with(count, VisibleList::default);
            }
            for visible in lists.iter_mut().take(count) {
                visible.done = false;
            }
            if lists.len() > count {
                lists.remove(count);
            }
        }
    }

    /// Culls one half of the layer for a camera, unless it was already culled
    /// this frame.
    ///
    /// Returns the number of mesh instances rejected.
    pub(crate) fn cull_visible(
        &mut self,
        transparent: bool,
        camera_pass: usize,
        camera: &Camera,
        instances: &mut [MeshInstance],
    ) -> usize {
        let (source, lists) = if transparent {
            (&self.transparent, &mut self.visible_transparent)
        } else {
            (&self.opaque, &mut self.visible_opaque)
        };
        let Some(visible) = lists.get_mut(camera_pass) else {
            return 0;
        };
        if visible.done {
            return 0;
        }
        visible.list.clear();
        let rejected = cull(camera, source, instances, &mut visible.list);
        visible.done = true;
        rejected
    }

    /// Orders a visible list for its camera.
    pub(crate) fn sort_visible(
        &mut self,
        transparent: bool,
        camera_pass: usize,
        camera: &Camera,
        instances: &mut [MeshInstance],
        commands: &[Command],
    ) {
        let mode = if transparent {
            self.transparent_sort_mode
        } else {
            self.opaque_sort_mode
        };
        let custom = self.custom_sort;
        if let Some(visible) = self.visible_list_mut(transparent, camera_pass) {
            sort_visible(&mut visible.list, mode, custom.as_ref(), camera, instances, commands);
        }
    }
}

/// One half of a layer in the composition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubLayer {
    pub(crate) layer: usize,
    /// Whether this is the transparent half.
    pub transparent: bool,
    /// Disabled sub-layers are skipped, on top of the layer's own flag.
    pub enabled: bool,
}

/// One entry of the render list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderAction {
    /// Index into the sub-layer list.
    pub sub_layer: usize,
    /// Index of the camera within the layer.
    pub camera_pass: usize,
    /// Index of the camera within the composition.
    pub camera_index: usize,
}

/// The ordered set of layers rendered in a frame.
#[derive(Debug, Default)]
pub struct LayerComposition {
    layers: Vec<Layer>,
    sub_layers: Vec<SubLayer>,
    dirty: bool,
    dirty_blend: bool,
    dirty_lights: bool,
    dirty_cameras: bool,
    pub(crate) mesh_instances: Vec<MeshInstanceId>,
    pub(crate) lights: Vec<LightId>,
    pub(crate) sorted_lights: [Vec<LightId>; 3],
    pub(crate) light_shadow_casters: Vec<Vec<MeshInstanceId>>,
    pub(crate) cameras: Vec<CameraId>,
    pub(crate) global_light_cameras: Vec<Vec<CameraId>>,
    pub(crate) global_light_camera_ids: Vec<Vec<usize>>,
    pub(crate) render_list: Vec<RenderAction>,
}

impl LayerComposition {
    /// Creates an empty composition.
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_all_dirty(&mut self) {
        self.dirty = true;
        self.dirty_lights = true;
        self.dirty_cameras = true;
    }

    fn layer_index(&self, id: u32) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    fn has_sub_layer(&self, layer: usize, transparent: bool) -> bool {
        self.sub_layers
            .iter()
            .any(|s| s.layer == layer && s.transparent == transparent)
    }

    fn register(&mut self, layer: Layer) -> Option<usize> {
        if self.layer_index(layer.id).is_some() {
            log::error!("LayerComposition: layer {} is already added", layer.id);
            return None;
        }
        self.layers.push(layer);
        Some(self.layers.len() - 1)
    }

    fn insert_sub_layer(&mut self, index: usize, layer: usize, transparent: bool) {
        let index = index.min(self.sub_layers.len());
        self.sub_layers.insert(
            index,
            SubLayer {
                layer,
                transparent,
                enabled: true,
            },
        );
        self.mark_all_dirty();
    }

    // --- Whole layers ---

    /// Appends both halves of a new layer.
    pub fn push(&mut self, layer: Layer) {
        let end = self.sub_layers.len();
        self.insert(layer, end);
    }

    /// Inserts both halves of a new layer at a sub-layer index.
    pub fn insert(&mut self, layer: Layer, index: usize) {
        let Some(layer) = self.register(layer) else { return };
        let index = index.min(self.sub_layers.len());
        self.insert_sub_layer(index, layer, false);
        self.insert_sub_layer(index + 1, layer, true);
    }

    /// Removes a layer and all of its sub-layers.
    pub fn remove(&mut self, id: u32) -> Option<Layer> {
        let index = self.layer_index(id)?;
        self.sub_layers.retain(|s| s.layer != index);
        for sub in &mut self.sub_layers {
            if sub.layer > index {
                sub.layer -= 1;
            }
        }
        self.mark_all_dirty();
        Some(self.layers.remove(index))
    }

    // --- Sub-layers ---

    /// Appends the opaque half of a layer, registering the layer if it is new.
    pub fn push_opaque(&mut self, layer: Layer) {
        let end = self.sub_layers.len();
        self.insert_half(layer, end, false);
    }

    /// Appends the transparent half of a layer, registering the layer if it is new.
    pub fn push_transparent(&mut self, layer: Layer) {
        let end = self.sub_layers.len();
        self.insert_half(layer, end, true);
    }

    /// Inserts the opaque half of a layer at a sub-layer index.
    pub fn insert_opaque(&mut self, layer: Layer, index: usize) {
        self.insert_half(layer, index, false);
    }

    /// Inserts the transparent half of a layer at a sub-layer index.
    pub fn insert_transparent(&mut self, layer: Layer, index: usize) {
        self.insert_half(layer, index, true);
    }

    fn insert_half(&mut self, layer: Layer, index: usize, transparent: bool) {
        let Some(layer) = self.register(layer) else { return };
        self.insert_sub_layer(index, layer, transparent);
    }

    /// Places the other half of an already added layer at a sub-layer index.
    pub fn insert_existing(&mut self, id: u32, index: usize, transparent: bool) -> bool {
        let Some(layer) = self.layer_index(id) else {
            log::error!("LayerComposition: layer {} is not in the composition", id);
            return false;
        };
        if self.has_sub_layer(layer, transparent) {
            log::error!("LayerComposition: sub-layer of layer {} is already added", id);
            return false;
        }
        self.insert_sub_layer(index, layer, transparent);
        true
    }

    /// Removes one half of a layer. The layer itself stays registered.
    pub fn remove_sub_layer(&mut self, id: u32, transparent: bool) {
        let Some(layer) = self.layer_index(id) else { return };
        let before = self.sub_layers.len();
        self.sub_layers
            .retain(|s| !(s.layer == layer && s.transparent == transparent));
        if self.sub_layers.len() != before {
            self.mark_all_dirty();
        }
    }

    /// The sub-layer index of a layer half.
    pub fn sub_layer_index(&self, id: u32, transparent: bool) -> Option<usize> {
        let layer = self.layer_index(id)?;
        self.sub_layers
            .iter()
            .position(|s| s.layer == layer && s.transparent == transparent)
    }

    /// Enables or disables a sub-layer.
    pub fn set_sub_layer_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(sub) = self.sub_layers.get_mut(index) {
            sub.enabled = enabled;
        }
    }

    /// The sub-layers in render order.
    pub fn sub_layers(&self) -> &[SubLayer] {
        &self.sub_layers
    }

    /// The layer a sub-layer belongs to.
    pub fn sub_layer_layer(&self, index: usize) -> Option<&Layer> {
        self.sub_layers.get(index).map(|s| &self.layers[s.layer])
    }

    pub(crate) fn sub_layer_active(&self, index: usize) -> bool {
        self.sub_layers
            .get(index)
            .is_some_and(|s| s.enabled && self.layers[s.layer].enabled)
    }

    // --- Layer access ---

    /// Looks a layer up by id.
    pub fn layer(&self, id: u32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Looks a layer up by id for modification.
    pub fn layer_mut(&mut self, id: u32) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Looks a layer up by name.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Looks a layer up by name for modification.
    pub fn layer_by_name_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub(crate) fn layer_at(&self, index: usize) -> &Layer {
        &self.layers[index]
    }

    pub(crate) fn layer_at_mut(&mut self, index: usize) -> &mut Layer {
        &mut self.layers[index]
    }

    // --- Derived frame data ---

    /// All mesh instances of the composition, deduplicated.
    pub fn mesh_instances(&self) -> &[MeshInstanceId] {
        &self.mesh_instances
    }

    /// All lights of the composition, deduplicated.
    pub fn lights(&self) -> &[LightId] {
        &self.lights
    }

    /// The enabled lights of one type.
    pub fn sorted_lights(&self, light_type: LightType) -> &[LightId] {
        &self.sorted_lights[light_type as usize]
    }

    /// The shadow casters of a light, by its index in [`LayerComposition::lights`].
    pub fn light_shadow_casters(&self, light_index: usize) -> &[MeshInstanceId] {
        self.light_shadow_casters
            .get(light_index)
            .map_or(&[], Vec::as_slice)
    }

    /// All cameras of the composition, deduplicated.
    pub fn cameras(&self) -> &[CameraId] {
        &self.cameras
    }

    /// The composition index of a camera.
    pub fn camera_index(&self, camera: CameraId) -> Option<usize> {
        self.cameras.iter().position(|c| *c == camera)
    }

    /// The composition camera indices each directional light is fitted for,
    /// in the order of [`LayerComposition::sorted_lights`].
    pub fn global_light_camera_ids(&self) -> &[Vec<usize>] {
        &self.global_light_camera_ids
    }

    /// The (sub-layer, camera) pairs in render order.
    pub fn render_list(&self) -> &[RenderAction] {
        &self.render_list
    }

    fn sort_lights_by_type(&mut self, lights: &[Light]) {
        for sorted in &mut self.sorted_lights {
            sorted.clear();
        }
        for id in &self.lights {
            let Some(light) = lights.get(id.0 as usize) else {
                continue;
            };
            if light.enabled() {
                self.sorted_lights[light.light_type() as usize].push(*id);
            }
        }
    }

    /// Brings the derived frame data up to date with the layers.
    ///
    /// Light key changes in the world mark the layers holding those lights
    /// as lights-dirty. Material blend changes move instances between the
    /// opaque and transparent lists.
    pub fn update(&mut self, world: &mut RenderWorld) -> CompositionUpdate {
        let mut result = CompositionUpdate::empty();

        for changed in world.take_light_key_changes() {
            for layer in &mut self.layers {
                if layer.lights.contains(&changed) {
                    layer.mark_lights_dirty();
                }
            }
        }

        for layer in &self.layers {
            self.dirty |= layer.dirty;
            self.dirty_lights |= layer.dirty_lights;
            self.dirty_cameras |= layer.dirty_cameras;
        }

        if world.take_dirty_blend() {
            self.dirty_blend = true;
        }

        if self.dirty {
            result |= CompositionUpdate::INSTANCES;
            self.mesh_instances.clear();
            let mut seen = AHashSet::new();
            for sub in &self.sub_layers {
                let layer = &self.layers[sub.layer];
                for dc in layer.opaque.iter().chain(&layer.transparent) {
                    if let DrawCall::Mesh(id) = *dc {
                        if seen.insert(id) {
                            self.mesh_instances.push(id);
                        }
                    }
                }
            }
            for layer in &mut self.layers {
                layer.dirty = false;
            }
            self.dirty = false;
            log::debug!(
                "LayerComposition: rebuilt instance list ({} instances)",
                self.mesh_instances.len()
            );
        }

        if self.dirty_blend {
            result |= CompositionUpdate::BLEND;
            for layer in &mut self.layers {
                let (opaque, transparent): (Vec<DrawCall>, Vec<DrawCall>) = layer
                    .opaque
                    .iter()
                    .chain(&layer.transparent)
                    .partition(|dc| world.is_opaque(**dc));
                layer.opaque = opaque;
                layer.transparent = transparent;
            }
            self.dirty_blend = false;
        }

        if self.dirty_lights {
            result |= CompositionUpdate::LIGHTS;
            self.lights.clear();
            for sub in &self.sub_layers {
                for light in &self.layers[sub.layer].lights {
                    if !self.lights.contains(light) {
                        self.lights.push(*light);
                    }
                }
            }
            self.light_shadow_casters = vec![Vec::new(); self.lights.len()];
            self.sort_lights_by_type(&world.lights);
            for layer in &mut self.layers {
                layer.refresh_lights(&world.lights);
            }
            self.dirty_lights = false;
            log::debug!("LayerComposition: rebuilt light lists ({} lights)", self.lights.len());
        }

        if !result.is_empty() {
            let instances: AHashSet<MeshInstanceId> = self.mesh_instances.iter().copied().collect();
            for sub in &self.sub_layers {
                let layer = &self.layers[sub.layer];
                for light in &layer.lights {
                    let Some(lid) = self.lights.iter().position(|l| l == light) else {
                        continue;
                    };
                    let casters = &mut self.light_shadow_casters[lid];
                    let mut k = 0;
                    while k < casters.len() {
                        if instances.contains(&casters[k]) {
                            k += 1;
                        } else {
                            casters.swap_remove(k);
                        }
                    }
                    for caster in &layer.shadow_casters {
                        if !casters.contains(caster) {
                            casters.push(*caster);
                        }
                    }
                }
            }
        }

        if result.contains(CompositionUpdate::LIGHTS) || self.dirty_cameras {
            self.global_light_cameras.clear();
            for light in &self.sorted_lights[LightType::Directional as usize] {
                let mut cameras = Vec::new();
                for sub in &self.sub_layers {
                    let layer = &self.layers[sub.layer];
                    if !layer.sorted_lights[LightType::Directional as usize].contains(light) {
                        continue;
                    }
                    for camera in &layer.cameras {
                        if !cameras.contains(camera) {
                            cameras.push(*camera);
                        }
                    }
                }
                self.global_light_cameras.push(cameras);
            }
        }

        if self.dirty_cameras {
            result |= CompositionUpdate::CAMERAS;
            self.cameras.clear();
            for sub in &self.sub_layers {
                for camera in &self.layers[sub.layer].cameras {
                    if !self.cameras.contains(camera) {
                        self.cameras.push(*camera);
                    }
                }
            }
            self.build_render_list();
            for layer in &mut self.layers {
                layer.dirty_cameras = false;
            }
            self.dirty_cameras = false;
            log::debug!(
                "LayerComposition: rebuilt render list ({} cameras, {} entries)",
                self.cameras.len(),
                self.render_list.len()
            );
        }

        if result.intersects(CompositionUpdate::LIGHTS | CompositionUpdate::CAMERAS) {
            self.global_light_camera_ids = self
                .global_light_cameras
                .iter()
                .map(|cameras| {
                    cameras
                        .iter()
                        .filter_map(|c| self.cameras.iter().position(|x| x == c))
                        .collect()
                })
                .collect();
        }

        result
    }

    /// Consecutive sub-layers sharing a multi-camera set are rendered as a
    /// run once per camera, so each camera completes the whole run before the next.
    fn build_render_list(&mut self) {
        self.render_list.clear();
        let count = self.sub_layers.len();
        let mut i = 0;
        while i < count {
            let layer = &self.layers[self.sub_layers[i].layer];
            if layer.cameras.is_empty() {
                i += 1;
                continue;
            }
            let hash = layer.camera_hash;
            let mut end = i + 1;
            if hash != 0 {
                while end < count && self.layers[self.sub_layers[end].layer].camera_hash == hash {
                    end += 1;
                }
            }
            for (camera_pass, camera) in layer.cameras.iter().enumerate() {
                let camera_index = self.cameras.iter().position(|c| c == camera).unwrap_or(0);
                for sub_layer in i..end {
                    self.render_list.push(RenderAction {
                        sub_layer,
                        camera_pass,
                        camera_index,
                    });
                }
            }
            i = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::{Aabb, Vec3};
    use prism_core::renderer::{
        BlendType, Material, MaterialId, Mesh, MeshId, Primitive, PrimitiveTopology,
        VertexBufferId,
    };

    fn mesh() -> Mesh {
        Mesh::new(
            MeshId(1),
            VertexBufferId(1),
            Primitive {
                topology: PrimitiveTopology::Triangles,
                base: 0,
                count: 3,
                indexed: false,
            },
            Aabb::new(Vec3::ZERO, Vec3::ONE),
        )
    }

    fn world_with_instances(n: usize) -> (RenderWorld, MaterialId, Vec<MeshInstanceId>) {
        let mut world = RenderWorld::new();
        let mat = world.add_material(Material::new(MaterialId(0)));
        let ids = (0..n)
            .map(|_| {
                let id = world.add_mesh_instance(mesh(), mat);
                world.mesh_instance_mut(id).unwrap().cast_shadow = true;
                id
            })
            .collect();
        (world, mat, ids)
    }

    #[test]
    fn test_add_partitions_by_blend_and_dedupes() {
        let (mut world, _, ids) = world_with_instances(2);
        let mut blended = Material::new(MaterialId(0));
        blended.set_blend_type(BlendType::Normal);
        let blended = world.add_material(blended);
        world.set_instance_material(ids[1], blended);

        let mut layer = Layer::new(1, "World");
        layer.add_mesh_instances(&world, &ids, false);
        layer.add_mesh_instances(&world, &ids, false);
        assert_eq!(layer.opaque_draw_calls(), &[DrawCall::Mesh(ids[0])]);
        assert_eq!(layer.transparent_draw_calls(), &[DrawCall::Mesh(ids[1])]);
        assert_eq!(layer.shadow_casters().len(), 2);

        layer.remove_mesh_instances(&[ids[0]], true);
        assert!(layer.opaque_draw_calls().is_empty());
        assert_eq!(layer.shadow_casters().len(), 2);
    }

    #[test]
    fn test_update_dedupes_instances_across_layers() {
        let (mut world, _, ids) = world_with_instances(3);
        let mut a = Layer::new(1, "A");
        a.add_mesh_instances(&world, &ids[..2], false);
        let mut b = Layer::new(2, "B");
        b.add_mesh_instances(&world, &ids[1..], false);
        let mut comp = LayerComposition::new();
        comp.push(a);
        comp.push(b);

        let updated = comp.update(&mut world);
        assert!(updated.contains(CompositionUpdate::INSTANCES));
        assert_eq!(comp.mesh_instances(), &ids[..]);
        assert!(comp.update(&mut world).is_empty());
    }

    #[test]
    fn test_blend_change_moves_instances() {
        let (mut world, mat, ids) = world_with_instances(1);
        let mut layer = Layer::new(1, "World");
        layer.add_mesh_instances(&world, &ids, false);
        let mut comp = LayerComposition::new();
        comp.push(layer);
        comp.update(&mut world);

        world.material_mut(mat).unwrap().set_blend_type(BlendType::Additive);
        let updated = comp.update(&mut world);
        assert!(updated.contains(CompositionUpdate::BLEND));
        let layer = comp.layer(1).unwrap();
        assert!(layer.opaque_draw_calls().is_empty());
        assert_eq!(layer.transparent_draw_calls(), &[DrawCall::Mesh(ids[0])]);
    }

    #[test]
    fn test_lights_are_shared_with_union_of_casters() {
        let (mut world, _, ids) = world_with_instances(3);
        let mut light = Light::new(LightType::Spot);
        light.set_enabled(true);
        let light = world.add_light(light);

        let mut a = Layer::new(1, "A");
        a.add_mesh_instances(&world, &ids[..1], false);
        a.add_light(light);
        let mut b = Layer::new(2, "B");
        b.add_mesh_instances(&world, &ids[1..], false);
        b.add_light(light);
        let mut comp = LayerComposition::new();
        comp.push(a);
        comp.push(b);

        let updated = comp.update(&mut world);
        assert!(updated.contains(CompositionUpdate::LIGHTS));
        assert_eq!(comp.lights(), &[light]);
        assert_eq!(comp.sorted_lights(LightType::Spot), &[light]);
        let mut casters = comp.light_shadow_casters(0).to_vec();
        casters.sort();
        assert_eq!(casters, ids);
        assert_ne!(comp.layer(1).unwrap().light_hash(), 0);
    }

    #[test]
    fn test_light_key_change_marks_lights_dirty() {
        let (mut world, _, _) = world_with_instances(0);
        let light = world.add_light(Light::new(LightType::Point));
        let mut layer = Layer::new(1, "World");
        layer.add_light(light);
        let mut comp = LayerComposition::new();
        comp.push(layer);
        comp.update(&mut world);
        assert_eq!(comp.layer(1).unwrap().light_hash(), 0);

        world.light_mut(light).unwrap().set_enabled(true);
        let updated = comp.update(&mut world);
        assert!(updated.contains(CompositionUpdate::LIGHTS));
        assert_eq!(comp.sorted_lights(LightType::Point), &[light]);
        assert_ne!(comp.layer(1).unwrap().light_hash(), 0);
    }

    #[test]
    fn test_single_camera_layers_render_in_order() {
        let (mut world, _, _) = world_with_instances(0);
        let cam = world.add_camera(Camera::new());
        let mut a = Layer::new(1, "A");
        a.add_camera(cam);
        let mut b = Layer::new(2, "B");
        b.add_camera(cam);
        let mut comp = LayerComposition::new();
        comp.push(a);
        comp.push(Layer::new(3, "No camera"));
        comp.push(b);
        comp.update(&mut world);

        let subs: Vec<usize> = comp.render_list().iter().map(|r| r.sub_layer).collect();
        assert_eq!(subs, vec![0, 1, 4, 5]);
        assert!(comp.render_list().iter().all(|r| r.camera_index == 0));
    }

    #[test]
    fn test_shared_camera_runs_render_camera_by_camera() {
        let (mut world, _, _) = world_with_instances(0);
        let c0 = world.add_camera(Camera::new());
        let c1 = world.add_camera(Camera::new());
        let mut a = Layer::new(1, "A");
        a.add_camera(c1);
        a.add_camera(c0);
        let mut b = Layer::new(2, "B");
        b.add_camera(c0);
        b.add_camera(c1);
        let mut comp = LayerComposition::new();
        comp.push(a);
        comp.push(b);
        comp.update(&mut world);

        let list: Vec<(usize, usize)> = comp
            .render_list()
            .iter()
            .map(|r| (r.sub_layer, r.camera_pass))
            .collect();
        assert_eq!(
            list,
            vec![(0, 0), (1, 0), (2, 0), (3, 0), (0, 1), (1, 1), (2, 1), (3, 1)]
        );
        assert_eq!(comp.layer(1).unwrap().cameras(), &[c0, c1]);
    }

    #[test]
    fn test_directional_light_cameras_map_to_composition_indices() {
        let (mut world, _, _) = world_with_instances(0);
        let c0 = world.add_camera(Camera::new());
        let c1 = world.add_camera(Camera::new());
        let mut sun = Light::new(LightType::Directional);
        sun.set_enabled(true);
        let sun = world.add_light(sun);

        let mut a = Layer::new(1, "A");
        a.add_camera(c0);
        let mut b = Layer::new(2, "B");
        b.add_camera(c1);
        b.add_light(sun);
        let mut comp = LayerComposition::new();
        comp.push(a);
        comp.push(b);
        comp.update(&mut world);

        assert_eq!(comp.cameras(), &[c0, c1]);
        assert_eq!(comp.global_light_camera_ids(), &[vec![1]]);
    }

    #[test]
    fn test_removed_camera_visible_lists_are_trimmed_one_per_frame() {
        let mut layer = Layer::new(1, "A");
        layer.add_camera(CameraId(0));
        layer.add_camera(CameraId(1));
        layer.begin_frame();
        layer.visible_list_mut(false, 1).unwrap().list.push(DrawCall::Mesh(MeshInstanceId(0)));
        layer.remove_camera(CameraId(1));
        assert!(layer.visible_list(false, 1).unwrap().list.is_empty());
        layer.begin_frame();
        assert!(layer.visible_list(false, 1).is_none());
        assert!(!layer.visible_list(false, 0).unwrap().done);
    }

    #[test]
    fn test_sub_layer_api() {
        let mut comp = LayerComposition::new();
        comp.push_opaque(Layer::new(1, "World"));
        comp.push(Layer::new(2, "UI"));
        assert!(comp.insert_existing(1, 3, true));
        assert!(!comp.insert_existing(1, 0, true));
        assert_eq!(comp.sub_layer_index(1, true), Some(3));
        comp.push(Layer::new(2, "Duplicate"));
        assert_eq!(comp.sub_layers().len(), 4);

        let removed = comp.remove(1).unwrap();
        assert_eq!(removed.name, "World");
        assert_eq!(comp.sub_layers().len(), 2);
        assert_eq!(comp.sub_layer_layer(0).unwrap().id(), 2);
        assert!(comp.layer_by_name("UI").is_some());
    }
}
