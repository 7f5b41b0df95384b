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

//! Geometry shared between mesh instances.

use crate::math::Aabb;
use crate::renderer::api::{IndexBufferId, Primitive, VertexBufferId};

/// A unique mesh identifier, used to batch draws of the same geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MeshId(pub u32);

/// How a mesh is rasterized. Each style has its own index buffer and primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderStyle {
    /// Filled triangles.
    #[default]
    Solid = 0,
    /// Triangle edges as lines.
    Wireframe = 1,
    /// Vertices as points.
    Points = 2,
}

/// The optional vertex attributes a mesh carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexFormat {
    /// First UV set.
    pub has_uv0: bool,
    /// Second UV set.
    pub has_uv1: bool,
    /// Per-vertex colours.
    pub has_color: bool,
    /// Tangent frames.
    pub has_tangents: bool,
}

/// A vertex buffer plus per-style index buffers and draw ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Identity used for sorting and instancing.
    pub id: MeshId,
    /// The vertex stream.
    pub vertex_buffer: VertexBufferId,
    /// Attributes present in [`Mesh::vertex_buffer`].
    pub vertex_format: VertexFormat,
    /// Index buffer per [`RenderStyle`].
    pub index_buffers: [Option<IndexBufferId>; 3],
    /// Draw range per [`RenderStyle`].
    pub primitives: [Primitive; 3],
    /// Object-space bounds.
    pub aabb: Aabb,
}

impl Mesh {
    /// A mesh drawing `primitive` in every style.
    pub fn new(id: MeshId, vertex_buffer: VertexBufferId, primitive: Primitive, aabb: Aabb) -> Self {
        Self {
            id,
            vertex_buffer,
            vertex_format: VertexFormat::default(),
            index_buffers: [None; 3],
            primitives: [primitive; 3],
            aabb,
        }
    }

    /// The index buffer for a style.
    pub fn index_buffer(&self, style: RenderStyle) -> Option<IndexBufferId> {
        self.index_buffers[style as usize]
    }

    /// The draw range for a style.
    pub fn primitive(&self, style: RenderStyle) -> &Primitive {
        &self.primitives[style as usize]
    }
}
