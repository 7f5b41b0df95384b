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

//! Values bound to named shader uniforms.

use super::texture::TextureId;
use crate::math::{Mat3, Mat4, Vec3};

/// A value for a named uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// A single float.
    Float(f32),
    /// A `vec2`.
    Vec2([f32; 2]),
    /// A `vec3`.
    Vec3([f32; 3]),
    /// A `vec4`.
    Vec4([f32; 4]),
    /// A column-major `mat3`.
    Mat3([f32; 9]),
    /// A column-major `mat4`.
    Mat4([f32; 16]),
    /// An array of floats, such as a matrix palette or blur weights.
    FloatArray(Vec<f32>),
    /// A texture sampler binding.
    Texture(TextureId),
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v.to_array())
    }
}

impl From<&Mat4> for UniformValue {
    fn from(m: &Mat4) -> Self {
        UniformValue::Mat4(m.to_cols_array())
    }
}

impl From<&Mat3> for UniformValue {
    fn from(m: &Mat3) -> Self {
        UniformValue::Mat3(m.to_cols_array())
    }
}

impl From<TextureId> for UniformValue {
    fn from(t: TextureId) -> Self {
        UniformValue::Texture(t)
    }
}
