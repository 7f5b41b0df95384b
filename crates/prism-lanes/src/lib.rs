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

//! # Prism Lanes
//!
//! The hot-path stages of the Prism forward renderer.
//!
//! A frame flows through the lanes in a fixed order: the layer composition is
//! brought up to date, instances and lights are culled per camera, shadow
//! casters are culled and fitted per light, shadow maps are rendered, and
//! finally every (sub-layer, camera) pair of the render list is sorted and
//! drawn by the forward lane. [`ForwardRenderer`] owns that sequencing.
//!
//! All GPU work goes through the [`prism_core::renderer::GraphicsDevice`]
//! trait and every shader comes from a [`prism_core::renderer::ProgramLibrary`],
//! so the lanes can be driven by any backend, including the recording mocks
//! used by the integration tests.

#![warn(missing_docs)]

pub mod config;
pub mod render_lane;

pub use config::{ConfigError, FogConfig, FogMode, RendererConfig};
pub use render_lane::*;
