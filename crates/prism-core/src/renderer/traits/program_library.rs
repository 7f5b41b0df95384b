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

//! The shader program provider.

use crate::renderer::api::{BlurProgramKey, ShaderHandle, ShaderRequest};
use crate::renderer::error::ShaderError;

/// Produces compiled shader programs from structured keys.
///
/// Implementations are expected to cache internally. The renderer caches
/// the returned handles per material and per mesh instance on top of that.
pub trait ProgramLibrary {
    /// Returns the program for a material variant.
    /// ## Errors
    /// * `ShaderError::CompilationFailed` - If the variant cannot be produced.
    fn get_program(&mut self, request: &ShaderRequest) -> Result<ShaderHandle, ShaderError>;

    /// Returns the separable VSM blur program for a kernel.
    fn get_blur_program(&mut self, key: &BlurProgramKey) -> Result<ShaderHandle, ShaderError>;
}
