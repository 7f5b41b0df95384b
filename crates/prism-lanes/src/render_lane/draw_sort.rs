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

//! Draw-call ordering.
//!
//! Two families of orderings live here. The renderer comparators
//! ([`sort_compare`], [`sort_compare_mesh`], [`depth_sort_compare`]) order
//! draw calls for the forward and shadow passes. The layer sort modes
//! ([`SortMode`]) order a layer's visible list for one camera right before
//! it is drawn. All sorts are stable and only ever reorder a single list,
//! so draw calls of different layers are never interleaved.
//!
//! Ids that do not resolve in the world storage sort after every valid draw
//! call and are skipped by the distance passes, like the culler skips them.

use std::cmp::Ordering;

use prism_core::renderer::{
    Camera, Command, DrawCall, ForwardSortKey, MeshId, MeshInstance, MeshInstanceId, LAYER_FX,
};

/// A resolved draw call, as seen by comparators.
#[derive(Debug, Clone, Copy)]
pub enum DrawCallRef<'a> {
    /// A mesh instance.
    Mesh(&'a MeshInstance),
    /// A command.
    Command(&'a Command),
}

impl<'a> DrawCallRef<'a> {
    /// Resolves a draw call against the world storage, `None` for an unknown id.
    pub fn resolve(
        draw_call: DrawCall,
        instances: &'a [MeshInstance],
        commands: &'a [Command],
    ) -> Option<Self> {
        match draw_call {
            DrawCall::Mesh(id) => instances.get(id.0 as usize).map(DrawCallRef::Mesh),
            DrawCall::Command(id) => commands.get(id.0 as usize).map(DrawCallRef::Command),
        }
    }

    /// The forward sort key.
    pub fn sort_key(self) -> ForwardSortKey {
        match self {
            DrawCallRef::Mesh(mi) => mi.sort_key(),
            DrawCallRef::Command(c) => c.sort_key(),
        }
    }

    /// The legacy layer id.
    pub fn layer(self) -> u32 {
        match self {
            DrawCallRef::Mesh(mi) => mi.layer(),
            DrawCallRef::Command(c) => c.layer,
        }
    }

    /// The mesh id, for mesh instances.
    pub fn mesh_id(self) -> Option<MeshId> {
        match self {
            DrawCallRef::Mesh(mi) => Some(mi.mesh.id),
            DrawCallRef::Command(_) => None,
        }
    }

    /// The explicit draw order. Commands have none.
    pub fn draw_order(self) -> i32 {
        match self {
            DrawCallRef::Mesh(mi) => mi.draw_order,
            DrawCallRef::Command(_) => 0,
        }
    }

    /// The back-to-front distance, if set and nonzero.
    fn zdist(self) -> Option<f32> {
        match self {
            DrawCallRef::Mesh(mi) => mi.zdist.filter(|d| *d != 0.0 && !d.is_nan()),
            DrawCallRef::Command(_) => None,
        }
    }

    /// The front-to-back distance, if set and nonzero.
    fn zdist2(self) -> Option<f32> {
        match self {
            DrawCallRef::Mesh(mi) => mi.zdist2.filter(|d| *d != 0.0 && !d.is_nan()),
            DrawCallRef::Command(_) => None,
        }
    }
}

/// Default forward pass ordering.
///
/// Within one layer: explicit draw order when both calls set one, then
/// back-to-front distance when both have one, then front-to-back distance.
/// Everything else falls back to the forward key, descending.
pub fn sort_compare(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
    if a.layer() == b.layer() {
        let (da, db) = (a.draw_order(), b.draw_order());
        if da != 0 && db != 0 {
            return da.cmp(&db);
        }
        if let (Some(za), Some(zb)) = (a.zdist(), b.zdist()) {
            return zb.total_cmp(&za);
        }
        if let (Some(za), Some(zb)) = (a.zdist2(), b.zdist2()) {
            return za.total_cmp(&zb);
        }
    }
    b.sort_key().cmp(&a.sort_key())
}

/// Forward pass ordering that keeps draws of the same mesh adjacent.
///
/// Same as [`sort_compare`] without the front-to-back stage; key ties
/// between two mesh instances order by mesh id, descending.
pub fn sort_compare_mesh(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
    if a.layer() == b.layer() {
        let (da, db) = (a.draw_order(), b.draw_order());
        if da != 0 && db != 0 {
            return da.cmp(&db);
        }
        if let (Some(za), Some(zb)) = (a.zdist(), b.zdist()) {
            return zb.total_cmp(&za);
        }
    }
    let (ka, kb) = (a.sort_key(), b.sort_key());
    if ka == kb {
        if let (Some(ma), Some(mb)) = (a.mesh_id(), b.mesh_id()) {
            return mb.cmp(&ma);
        }
    }
    kb.cmp(&ka)
}

/// Shadow and depth pass ordering: depth key descending, then mesh id descending.
pub fn depth_sort_compare(a: &MeshInstance, b: &MeshInstance) -> Ordering {
    b.depth_key()
        .cmp(&a.depth_key())
        .then_with(|| b.mesh.id.cmp(&a.mesh.id))
}

/// The comparator a forward list is sorted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// [`sort_compare`].
    #[default]
    Forward,
    /// [`sort_compare_mesh`].
    ForwardMesh,
}

fn compare_resolved(
    compare: fn(DrawCallRef<'_>, DrawCallRef<'_>) -> Ordering,
    a: DrawCall,
    b: DrawCall,
    instances: &[MeshInstance],
    commands: &[Command],
) -> Ordering {
    match (
        DrawCallRef::resolve(a, instances, commands),
        DrawCallRef::resolve(b, instances, commands),
    ) {
        (Some(a), Some(b)) => compare(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts a forward draw list in place.
pub fn sort_draw_calls(
    list: &mut [DrawCall],
    mode: CompareMode,
    instances: &[MeshInstance],
    commands: &[Command],
) {
    let compare = match mode {
        CompareMode::Forward => sort_compare,
        CompareMode::ForwardMesh => sort_compare_mesh,
    };
    list.sort_by(|a, b| compare_resolved(compare, *a, *b, instances, commands));
}

/// Sorts shadow casters with [`depth_sort_compare`].
pub fn sort_casters(casters: &mut [MeshInstanceId], instances: &[MeshInstance]) {
    casters.sort_by(|a, b| {
        match (instances.get(a.0 as usize), instances.get(b.0 as usize)) {
            (Some(a), Some(b)) => depth_sort_compare(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// Sets the sort values of an instance before a custom sort.
pub type CalculateSortValues = fn(&mut MeshInstance, &Camera);

/// Compares two draw calls for a custom sort.
pub type CustomCompare = fn(DrawCallRef<'_>, DrawCallRef<'_>) -> Ordering;

/// User-supplied ordering for [`SortMode::Custom`].
#[derive(Debug, Clone, Copy)]
pub struct CustomSort {
    /// Called on every visible mesh instance before sorting.
    pub calculate: Option<CalculateSortValues>,
    /// The comparator.
    pub compare: CustomCompare,
}

/// How a layer orders its visible list for a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Keep culling order.
    None,
    /// Explicit draw order, ascending.
    Manual,
    /// Forward key descending, then mesh id descending.
    #[default]
    MaterialMesh,
    /// Distance along the camera forward axis, furthest first.
    BackToFront,
    /// Distance along the camera forward axis, nearest first.
    FrontToBack,
    /// The layer's [`CustomSort`].
    Custom,
}

fn sort_manual(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
    a.draw_order().cmp(&b.draw_order())
}

fn sort_material_mesh(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
    let (ka, kb) = (a.sort_key(), b.sort_key());
    if ka == kb {
        if let (Some(ma), Some(mb)) = (a.mesh_id(), b.mesh_id()) {
            return mb.cmp(&ma);
        }
    }
    kb.cmp(&ka)
}

fn raw_zdist(dc: DrawCallRef<'_>) -> f32 {
    match dc {
        DrawCallRef::Mesh(mi) => mi.zdist.unwrap_or(0.0),
        DrawCallRef::Command(_) => 0.0,
    }
}

fn sort_back_to_front(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
    raw_zdist(b).total_cmp(&raw_zdist(a))
}

fn sort_front_to_back(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
    raw_zdist(a).total_cmp(&raw_zdist(b))
}

/// Stores the distance from `camera` along its forward axis in `zdist` for
/// every world-layer mesh instance of the list.
pub fn calculate_sort_distances(list: &[DrawCall], camera: &Camera, instances: &mut [MeshInstance]) {
    let position = camera.position;
    let forward = camera.forward();
    for dc in list {
        let DrawCall::Mesh(id) = *dc else { continue };
        let Some(instance) = instances.get_mut(id.0 as usize) else {
            continue;
        };
        if instance.layer() <= LAYER_FX {
            continue;
        }
        instance.zdist = Some((instance.aabb().center - position).dot(forward));
    }
}

/// Orders a layer's visible list for a camera.
pub fn sort_visible(
    list: &mut [DrawCall],
    mode: SortMode,
    custom: Option<&CustomSort>,
    camera: &Camera,
    instances: &mut [MeshInstance],
    commands: &[Command],
) {
    let compare: fn(DrawCallRef<'_>, DrawCallRef<'_>) -> Ordering = match mode {
        SortMode::None => return,
        SortMode::Custom => {
            let Some(custom) = custom else {
                log::warn!("DrawSort: custom sort mode without a custom sort, keeping culling order");
                return;
            };
            if let Some(calculate) = custom.calculate {
                for dc in list.iter() {
                    if let DrawCall::Mesh(id) = *dc {
                        if let Some(instance) = instances.get_mut(id.0 as usize) {
                            calculate(instance, camera);
                        }
                    }
                }
            }
            custom.compare
        }
        SortMode::BackToFront | SortMode::FrontToBack => {
            calculate_sort_distances(list, camera, instances);
            if mode == SortMode::BackToFront {
                sort_back_to_front
            } else {
                sort_front_to_back
            }
        }
        SortMode::Manual => sort_manual,
        SortMode::MaterialMesh => sort_material_mesh,
    };
    let instances: &[MeshInstance] = instances;
    list.sort_by(|a, b| compare_resolved(compare, *a, *b, instances, commands));
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::{Aabb, Mat4, Vec3};
    use prism_core::renderer::{
        BlendType, GraphicsDevice, Material, MaterialId, Mesh, Primitive, PrimitiveTopology,
        VertexBufferId, LAYER_HUD,
    };

    fn instance(mesh: u32, material: u32) -> MeshInstance {
        let mesh = Mesh::new(
            MeshId(mesh),
            VertexBufferId(1),
            Primitive {
                topology: PrimitiveTopology::Triangles,
                base: 0,
                count: 3,
                indexed: false,
            },
            Aabb::new(Vec3::ZERO, Vec3::ONE),
        );
        MeshInstance::new(mesh, &Material::new(MaterialId(material)))
    }

    fn ids(n: usize) -> Vec<DrawCall> {
        (0..n).map(|i| DrawCall::Mesh(MeshInstanceId(i as u32))).collect()
    }

    #[test]
    fn test_draw_order_wins_when_both_set() {
        let mut a = instance(1, 1);
        let mut b = instance(2, 1);
        a.draw_order = 5;
        b.draw_order = 2;
        a.zdist = Some(1.0);
        b.zdist = Some(10.0);
        assert_eq!(
            sort_compare(DrawCallRef::Mesh(&a), DrawCallRef::Mesh(&b)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_fallback_chain_skips_draw_order_set_on_one_side() {
        let mut a = instance(1, 1);
        let mut b = instance(2, 1);
        a.draw_order = 1;
        a.zdist = Some(2.0);
        b.zdist = Some(8.0);
        // b is further away and therefore drawn first.
        assert_eq!(
            sort_compare(DrawCallRef::Mesh(&a), DrawCallRef::Mesh(&b)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_zero_distance_falls_through_to_key() {
        let mut a = instance(1, 3);
        let mut b = instance(2, 7);
        a.zdist = Some(0.0);
        b.zdist = Some(4.0);
        assert_eq!(
            sort_compare(DrawCallRef::Mesh(&a), DrawCallRef::Mesh(&b)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_different_layers_compare_by_key_only() {
        let mut a = instance(1, 1);
        let mut b = instance(2, 1);
        let mat = Material::new(MaterialId(1));
        b.set_layer(LAYER_HUD, &mat);
        a.draw_order = 1;
        b.draw_order = 9;
        // World layer keys are larger, so `a` comes first despite draw order.
        assert_eq!(
            sort_compare(DrawCallRef::Mesh(&a), DrawCallRef::Mesh(&b)),
            Ordering::Less
        );
    }

    #[test]
    fn test_forward_sort_of_mixed_orders_and_depths() {
        // Every third instance carries an explicit draw order. Draw orders and
        // distances agree on one ranking, so the comparator stays consistent.
        let mut instances: Vec<MeshInstance> = (0..100).map(|_| instance(1, 1)).collect();
        for (rank, mi) in instances.iter_mut().enumerate() {
            mi.zdist = Some(1000.0 - rank as f32);
            if rank % 3 == 0 {
                mi.draw_order = rank as i32 + 1;
            }
        }
        let mut list: Vec<DrawCall> = (0..100u32)
            .map(|i| DrawCall::Mesh(MeshInstanceId(i * 37 % 100)))
            .collect();

        sort_draw_calls(&mut list, CompareMode::Forward, &instances, &[]);

        let sorted: Vec<&MeshInstance> = list
            .iter()
            .map(|dc| match dc {
                DrawCall::Mesh(id) => &instances[id.0 as usize],
                DrawCall::Command(_) => unreachable!(),
            })
            .collect();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                if a.draw_order != 0 && b.draw_order != 0 {
                    assert!(a.draw_order < b.draw_order);
                } else {
                    assert!(a.zdist > b.zdist);
                }
            }
        }
    }

    #[test]
    fn test_unknown_ids_sort_last() {
        let instances = vec![instance(1, 1), instance(2, 1)];
        let mut list = vec![
            DrawCall::Mesh(MeshInstanceId(7)),
            DrawCall::Mesh(MeshInstanceId(1)),
            DrawCall::Mesh(MeshInstanceId(0)),
        ];
        sort_draw_calls(&mut list, CompareMode::ForwardMesh, &instances, &[]);
        assert_eq!(list[2], DrawCall::Mesh(MeshInstanceId(7)));

        let mut casters = vec![MeshInstanceId(9), MeshInstanceId(0)];
        sort_casters(&mut casters, &instances);
        assert_eq!(casters, vec![MeshInstanceId(0), MeshInstanceId(9)]);

        let mut instances = instances;
        calculate_sort_distances(&list, &Camera::new(), &mut instances);
        assert!(instances[0].zdist.is_some());
    }

    #[test]
    fn test_mesh_comparator_breaks_key_ties_by_mesh() {
        let a = instance(1, 4);
        let b = instance(9, 4);
        assert_eq!(
            sort_compare_mesh(DrawCallRef::Mesh(&a), DrawCallRef::Mesh(&b)),
            Ordering::Greater
        );
        assert_eq!(
            sort_compare(DrawCallRef::Mesh(&a), DrawCallRef::Mesh(&b)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_depth_sort_groups_skinned_first() {
        let mut instances = vec![instance(1, 1), instance(2, 1), instance(3, 1)];
        let mat = Material::new(MaterialId(1));
        instances[0].set_skin(Some(prism_core::renderer::SkinInstance::new(vec![Mat4::IDENTITY])));
        instances[0].update_depth_key(&mat);
        let mut casters = vec![MeshInstanceId(1), MeshInstanceId(0), MeshInstanceId(2)];
        sort_casters(&mut casters, &instances);
        assert_eq!(casters, vec![MeshInstanceId(0), MeshInstanceId(2), MeshInstanceId(1)]);
    }

    #[test]
    fn test_back_to_front_uses_camera_axis() {
        let mut instances = vec![instance(1, 1), instance(2, 1), instance(3, 1)];
        for (i, z) in [-5.0, -20.0, -10.0].into_iter().enumerate() {
            instances[i].set_world_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, z)));
        }
        let camera = Camera::new();
        let mut list = ids(3);
        sort_visible(&mut list, SortMode::BackToFront, None, &camera, &mut instances, &[]);
        assert_eq!(
            list,
            vec![
                DrawCall::Mesh(MeshInstanceId(1)),
                DrawCall::Mesh(MeshInstanceId(2)),
                DrawCall::Mesh(MeshInstanceId(0)),
            ]
        );
        assert_eq!(instances[1].zdist, Some(20.0));

        sort_visible(&mut list, SortMode::FrontToBack, None, &camera, &mut instances, &[]);
        assert_eq!(list[0], DrawCall::Mesh(MeshInstanceId(0)));
    }

    #[test]
    fn test_overlay_layers_get_no_distance() {
        let mut instances = vec![instance(1, 1)];
        instances[0].set_layer(LAYER_HUD, &Material::new(MaterialId(1)));
        calculate_sort_distances(&ids(1), &Camera::new(), &mut instances);
        assert_eq!(instances[0].zdist, None);
    }

    #[test]
    fn test_material_mesh_mode_groups_commands_and_meshes() {
        let mut instances = vec![instance(4, 2), instance(7, 2), instance(1, 9)];
        let commands = vec![Command::new(15, BlendType::None, Box::new(|_: &mut dyn GraphicsDevice| {}))];
        let mut list = ids(3);
        list.insert(1, DrawCall::Command(prism_core::renderer::CommandId(0)));
        sort_visible(
            &mut list,
            SortMode::MaterialMesh,
            None,
            &Camera::new(),
            &mut instances,
            &commands,
        );
        assert_eq!(
            list,
            vec![
                DrawCall::Command(prism_core::renderer::CommandId(0)),
                DrawCall::Mesh(MeshInstanceId(2)),
                DrawCall::Mesh(MeshInstanceId(1)),
                DrawCall::Mesh(MeshInstanceId(0)),
            ]
        );
    }

    #[test]
    fn test_custom_sort_runs_calculate_then_compare() {
        fn by_mesh(a: DrawCallRef<'_>, b: DrawCallRef<'_>) -> Ordering {
            a.draw_order().cmp(&b.draw_order())
        }
        fn calc(mi: &mut MeshInstance, _: &Camera) {
            mi.draw_order = -(mi.mesh.id.0 as i32);
        }
        let custom = CustomSort {
            calculate: Some(calc),
            compare: by_mesh,
        };
        let mut instances = vec![instance(1, 1), instance(3, 1), instance(2, 1)];
        let mut list = ids(3);
        sort_visible(
            &mut list,
            SortMode::Custom,
            Some(&custom),
            &Camera::new(),
            &mut instances,
            &[],
        );
        assert_eq!(
            list,
            vec![
                DrawCall::Mesh(MeshInstanceId(1)),
                DrawCall::Mesh(MeshInstanceId(2)),
                DrawCall::Mesh(MeshInstanceId(0)),
            ]
        );
    }
}
