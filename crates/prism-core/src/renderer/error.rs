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

//! Error types of the rendering subsystem.

use crate::renderer::api::{ShaderPass, TextureFormat};
use std::fmt;

/// A shader variant could not be produced or bound.
#[derive(Debug)]
pub enum ShaderError {
    /// The program library failed to generate or compile a variant.
    CompilationFailed {
        /// The material that requested the variant.
        material_id: u32,
        /// The pass the variant was for.
        pass: ShaderPass,
        /// Details from the library.
        details: String,
    },
    /// The device refused to bind a program (e.g. it failed to link).
    BindFailed {
        /// Details from the device.
        details: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationFailed {
                material_id,
                pass,
                details,
            } => write!(
                f,
                "Shader variant for material {material_id} in pass {pass:?} failed: {details}"
            ),
            ShaderError::BindFailed { details } => {
                write!(f, "Failed to bind shader program: {details}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// A GPU resource could not be created, found or used.
#[derive(Debug)]
pub enum ResourceError {
    /// The device ran out of memory for the requested allocation.
    OutOfMemory {
        /// What was being allocated.
        label: String,
    },
    /// The requested format is not supported by the device.
    UnsupportedFormat(TextureFormat),
    /// The handle used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::OutOfMemory { label } => {
                write!(f, "Out of GPU memory while allocating '{label}'")
            }
            ResourceError::UnsupportedFormat(format) => {
                write!(f, "Texture format {format:?} is not supported")
            }
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// A frame could not be rendered.
#[derive(Debug)]
pub enum RenderError {
    /// A shader failed and no fallback could be used.
    Shader(ShaderError),
    /// A GPU resource operation failed.
    Resource(ResourceError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Shader(err) => write!(f, "Shader error: {err}"),
            RenderError::Resource(err) => write!(f, "Graphics resource operation failed: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Shader(err) => Some(err),
            RenderError::Resource(err) => Some(err),
        }
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::Shader(err)
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}
