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

//! Rendering lanes of the forward renderer.
//!
//! Each file holds one stage of the frame: culling, the layer composition,
//! draw-call sorting, shadow resource management, shadow fitting, the shadow
//! pass, light dispatch and the forward pass. [`ForwardRenderer`] strings them
//! together and is the only [`RenderLane`] this crate ships.

use prism_core::renderer::RenderError;

mod composition;
mod cull_lane;
mod draw_sort;
mod forward_lane;
mod forward_renderer;
mod light_dispatch;
mod shadow_fitter;
mod shadow_map_cache;
mod shadow_pass_lane;
mod stats;
mod world;

pub use composition::*;
pub use cull_lane::*;
pub use draw_sort::*;
pub use forward_renderer::*;
pub use shadow_fitter::*;
pub use shadow_map_cache::*;
pub use stats::*;
pub use world::*;

/// A trait defining the behavior of a rendering lane.
///
/// A rendering lane turns the content of a [`RenderWorld`], as organised by a
/// [`LayerComposition`], into device commands. Different implementations
/// provide different rendering strategies; the application only deals with
/// this trait and stays decoupled from any specific implementation.
pub trait RenderLane {
    /// Returns a human-readable identifier for this rendering strategy.
    ///
    /// # Returns
    ///
    /// A static string identifying the rendering strategy (e.g., "Forward").
    fn strategy_name(&self) -> &'static str;

    /// Renders one frame.
    ///
    /// # Arguments
    ///
    /// * `world`: The instances, materials, lights and cameras of the scene
    /// * `composition`: The ordered layers to draw, refreshed as part of the frame
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] when a device resource cannot be allocated or
    /// when no shader, not even the fallback one, can be bound.
    fn render(
        &mut self,
        world: &mut RenderWorld,
        composition: &mut LayerComposition,
    ) -> Result<(), RenderError>;
}
