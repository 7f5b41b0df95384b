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

//! The renderer data model and the contracts of its collaborators.

pub mod api;
pub mod camera;
pub mod error;
pub mod light;
pub mod material;
pub mod mesh;
pub mod mesh_instance;
pub mod traits;

pub use self::api::*;
pub use self::camera::{Camera, Projection};
pub use self::error::{RenderError, ResourceError, ShaderError};
pub use self::light::{CascadeSettings, Light, LightKey, ShadowCasterPass, ShadowMap};
pub use self::material::{Material, MaterialId, ParameterSet, ShaderParameter, ALL_PASSES};
pub use self::mesh::{Mesh, MeshId, RenderStyle, VertexFormat};
pub use self::mesh_instance::{
    Command, CommandFn, CommandId, DrawCall, ForwardSortKey, InstancingData, MeshInstance,
    MeshInstanceId, MorphInstance, MorphTarget, SkinInstance, VisibilityTest, LAYER_FX,
    LAYER_GIZMO, LAYER_HUD, LAYER_WORLD,
};
pub use self::traits::{GraphicsDevice, ProgramLibrary};
