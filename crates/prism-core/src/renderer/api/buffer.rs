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

//! Vertex/index buffer handles and primitive descriptions.

/// An opaque handle to a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexBufferId(pub u64);

/// An opaque handle to an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexBufferId(pub u64);

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// Independent points.
    Points,
    /// Independent line segments.
    Lines,
    /// A connected line strip.
    LineStrip,
    /// Independent triangles.
    Triangles,
    /// A connected triangle strip.
    TriangleStrip,
}

/// A range of vertices or indices to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    /// The topology of the range.
    pub topology: PrimitiveTopology,
    /// The first vertex or index.
    pub base: u32,
    /// The number of vertices or indices.
    pub count: u32,
    /// Whether `base`/`count` refer to the bound index buffer.
    pub indexed: bool,
}

/// A full-screen triangle strip, used by the blur passes.
pub const QUAD_PRIMITIVE: Primitive = Primitive {
    topology: PrimitiveTopology::TriangleStrip,
    base: 0,
    count: 4,
    indexed: false,
};
