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

//! Fixed-function pipeline state: blending, depth, culling, stencil and clears.

use crate::math::Color;
use crate::prism_bitflags;

/// A blend factor applied to the source or destination colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// How the weighted source and destination are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// One blend component (colour or alpha): `op(src * src_factor, dst * dst_factor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// The equation.
    pub op: BlendEquation,
    /// The source factor.
    pub src: BlendFactor,
    /// The destination factor.
    pub dst: BlendFactor,
}

impl BlendComponent {
    /// `src * 1 + dst * 0`.
    pub const REPLACE: Self = Self {
        op: BlendEquation::Add,
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
    };
}

/// Complete blend state of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Whether blending is enabled at all.
    pub enabled: bool,
    /// The colour blend.
    pub color: BlendComponent,
    /// The alpha blend.
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Blending disabled.
    pub const OPAQUE: Self = Self {
        enabled: false,
        color: BlendComponent::REPLACE,
        alpha: BlendComponent::REPLACE,
    };

    /// Returns `true` when colour and alpha use different factors or equations.
    pub fn is_separate(&self) -> bool {
        self.color != self.alpha
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// The named blend presets a material can use.
///
/// The discriminants are stable: `Normal` and `None` feed the forward sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendType {
    /// Reverse-subtract the source from the destination.
    Subtractive = 0,
    /// Add source to destination.
    Additive = 1,
    /// Classic alpha blending.
    Normal = 2,
    /// Blending disabled.
    #[default]
    None = 3,
    /// Alpha blending with premultiplied source.
    Premultiplied = 4,
    /// Multiply source by destination.
    Multiplicative = 5,
    /// Additive, weighted by source alpha.
    AdditiveAlpha = 6,
    /// Multiply and double.
    Multiplicative2x = 7,
    /// Soft additive.
    Screen = 8,
    /// Component-wise minimum.
    Min = 9,
    /// Component-wise maximum.
    Max = 10,
}

impl BlendType {
    /// The blend state this preset expands to.
    pub fn blend_state(self) -> BlendState {
        use BlendEquation as E;
        use BlendFactor as F;
        let (op, src, dst) = match self {
            BlendType::Subtractive => (E::ReverseSubtract, F::One, F::One),
            BlendType::Additive => (E::Add, F::One, F::One),
            BlendType::Normal => (E::Add, F::SrcAlpha, F::OneMinusSrcAlpha),
            BlendType::None => (E::Add, F::One, F::Zero),
            BlendType::Premultiplied => (E::Add, F::One, F::OneMinusSrcAlpha),
            BlendType::Multiplicative => (E::Add, F::DstColor, F::Zero),
            BlendType::AdditiveAlpha => (E::Add, F::SrcAlpha, F::One),
            BlendType::Multiplicative2x => (E::Add, F::DstColor, F::SrcColor),
            BlendType::Screen => (E::Add, F::OneMinusDstColor, F::One),
            BlendType::Min => (E::Min, F::One, F::One),
            BlendType::Max => (E::Max, F::One, F::One),
        };
        let component = BlendComponent { op, src, dst };
        BlendState {
            enabled: self != BlendType::None,
            color: component,
            alpha: component,
        }
    }
}

/// Comparison function for depth tests, stencil tests and shadow samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    #[default]
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Which triangle faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Nothing is culled.
    None = 0,
    /// Back faces are culled.
    #[default]
    Back = 1,
    /// Front faces are culled.
    Front = 2,
    /// Everything is culled.
    FrontAndBack = 3,
}

impl CullMode {
    /// Swaps `Front` and `Back`. `None` and `FrontAndBack` are unchanged.
    pub fn flipped(self) -> Self {
        match self {
            CullMode::Back => CullMode::Front,
            CullMode::Front => CullMode::Back,
            other => other,
        }
    }
}

/// Action applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    IncrementWrap,
    Decrement,
    DecrementWrap,
    Invert,
}

/// Stencil test and operations for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilParameters {
    /// The comparison against the reference value.
    pub func: CompareFunc,
    /// The reference value.
    pub reference: u32,
    /// The mask applied before comparing.
    pub read_mask: u32,
    /// Applied when the stencil test fails.
    pub fail: StencilOp,
    /// Applied when the stencil test passes and the depth test fails.
    pub zfail: StencilOp,
    /// Applied when both tests pass.
    pub zpass: StencilOp,
    /// The mask applied when writing.
    pub write_mask: u32,
}

impl Default for StencilParameters {
    /// Always passes and never modifies the buffer.
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            reference: 0,
            read_mask: 0xff,
            fail: StencilOp::Keep,
            zfail: StencilOp::Keep,
            zpass: StencilOp::Keep,
            write_mask: 0xff,
        }
    }
}

/// Which faces a stencil call applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StencilFace {
    Front,
    Back,
    FrontAndBack,
}

/// Per-channel colour write enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct ColorWriteMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl ColorWriteMask {
    /// All channels written.
    pub const ALL: Self = Self {
        red: true,
        green: true,
        blue: true,
        alpha: true,
    };
    /// No channel written.
    pub const NONE: Self = Self {
        red: false,
        green: false,
        blue: false,
        alpha: false,
    };
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Constant and slope-scaled depth offset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant offset in depth units.
    pub constant: f32,
    /// Offset scaled by the polygon's depth slope.
    pub slope_scale: f32,
}

prism_bitflags! {
    /// Which buffers a clear touches.
    pub struct ClearFlags: u32 {
        /// The colour buffer.
        const COLOR = 1 << 0;
        /// The depth buffer.
        const DEPTH = 1 << 1;
        /// The stencil buffer.
        const STENCIL = 1 << 2;
    }
}

/// Values and flags for a render target clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearOptions {
    /// The colour written to the colour buffer.
    pub color: Color,
    /// The value written to the depth buffer.
    pub depth: f32,
    /// The value written to the stencil buffer.
    pub stencil: u32,
    /// Which buffers are cleared.
    pub flags: ClearFlags,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            color: Color::new(0.5, 0.5, 0.5, 1.0),
            depth: 1.0,
            stencil: 0,
            flags: ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL,
        }
    }
}

/// A rectangle in normalized `[0, 1]` target coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Bottom edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// The whole target.
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Converts to pixels for a target of the given size, flooring each value.
    pub fn to_pixels(&self, target_width: u32, target_height: u32) -> PixelRect {
        let (w, h) = (target_width as f32, target_height as f32);
        PixelRect {
            x: (self.x * w).floor() as i32,
            y: (self.y * h).floor() as i32,
            width: (self.width * w).floor() as i32,
            height: (self.height * h).floor() as i32,
        }
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::FULL
    }
}

/// A rectangle in pixels, used for viewports and scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    /// Creates a pixel rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
