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

//! Per-frame counters and timings of the forward renderer.

/// Counters and CPU timings accumulated by the renderer.
///
/// Values accumulate across frames until [`RendererStats::reset`] is called,
/// so an application can sample them at whatever rate it likes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// Draw calls issued into shadow maps.
    pub shadow_draw_calls: u32,
    /// Draw calls issued by forward passes.
    pub forward_draw_calls: u32,
    /// Draw calls of skinned instances.
    pub skin_draw_calls: u32,
    /// Hardware-instanced draw calls.
    pub instanced_draw_calls: u32,
    /// Instances folded into instanced draw calls.
    pub removed_by_instancing: u32,
    /// Mesh instances rejected by culling.
    pub culled_draw_calls: u32,
    /// Cameras whose frustum was updated.
    pub cameras_rendered: u32,
    /// Material changes between consecutive forward draw calls.
    pub material_switches: u32,
    /// Shadow map passes rendered (six per point light).
    pub shadow_map_updates: u32,
    /// The CPU time spent culling, in milliseconds.
    pub cull_time_ms: f64,
    /// The CPU time spent rendering shadow maps, in milliseconds.
    pub shadow_time_ms: f64,
    /// The CPU time spent in forward passes, in milliseconds.
    pub forward_time_ms: f64,
    /// The CPU time spent sorting visible lists, in milliseconds.
    pub sort_time_ms: f64,
    /// The CPU time spent on skin palettes, in milliseconds.
    pub skin_time_ms: f64,
    /// The CPU time spent on morph blending, in milliseconds.
    pub morph_time_ms: f64,
}

impl RendererStats {
    /// Zeroes every counter and timing. The frame number keeps counting.
    pub fn reset(&mut self) {
        *self = Self {
            frame_number: self.frame_number,
            ..Self::default()
        };
    }

    /// Logs the current values at trace level.
    pub fn log_frame(&self) {
        log::trace!(
            "ForwardRenderer: frame {} | draws: {} forward, {} shadow, {} skinned, {} instanced ({} folded), {} culled | {} cameras, {} material switches, {} shadow map updates | cull {:.3} ms, sort {:.3} ms, shadow {:.3} ms, forward {:.3} ms, skin {:.3} ms, morph {:.3} ms",
            self.frame_number,
            self.forward_draw_calls,
            self.shadow_draw_calls,
            self.skin_draw_calls,
            self.instanced_draw_calls,
            self.removed_by_instancing,
            self.culled_draw_calls,
            self.cameras_rendered,
            self.material_switches,
            self.shadow_map_updates,
            self.cull_time_ms,
            self.sort_time_ms,
            self.shadow_time_ms,
            self.forward_time_ms,
            self.skin_time_ms,
            self.morph_time_ms,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_frame_number() {
        let mut stats = RendererStats {
            frame_number: 12,
            forward_draw_calls: 40,
            shadow_time_ms: 1.5,
            ..RendererStats::default()
        };
        stats.reset();
        assert_eq!(stats.frame_number, 12);
        assert_eq!(stats.forward_draw_calls, 0);
        assert_eq!(stats.shadow_time_ms, 0.0);
    }
}
