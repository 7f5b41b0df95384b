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

//! Renderer configuration loaded from RON.

use prism_core::math::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading or saving a [`RendererConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not a valid configuration.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The configuration could not be written out.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A value is out of range.
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Distance fog model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FogMode {
    /// No fog.
    #[default]
    None,
    /// Linear ramp between `start` and `end`.
    Linear,
    /// `exp(-density * d)`.
    Exp,
    /// `exp(-(density * d)^2)`.
    Exp2,
}

/// Fog parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    /// The fog model.
    pub mode: FogMode,
    /// Fog colour, gamma space.
    pub color: Color,
    /// Start distance for linear fog.
    pub start: f32,
    /// End distance for linear fog.
    pub end: f32,
    /// Density for exponential fog.
    pub density: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            mode: FogMode::None,
            color: Color::rgb(0.0, 0.0, 0.0),
            start: 1.0,
            end: 1000.0,
            density: 0.0,
        }
    }
}

/// Scene-wide settings consumed by the forward renderer.
///
/// Every field has a default, so a RON file only needs to list what it
/// overrides:
///
/// ```
/// let config = prism_lanes::RendererConfig::from_ron_str("(exposure: 1.5)").unwrap();
/// assert_eq!(config.exposure, 1.5);
/// assert!(config.gamma_correction);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Converts authored colours to linear space before lighting.
    pub gamma_correction: bool,
    /// Ambient light colour, gamma space.
    pub ambient_light: Color,
    /// Exposure multiplier.
    pub exposure: f32,
    /// Distance fog.
    pub fog: FogConfig,
    /// Skybox intensity multiplier.
    pub skybox_intensity: f32,
    /// Default for [`prism_core::renderer::Light::cache_shadow_map`] on lights
    /// created through the render world.
    pub cache_shadow_maps: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            gamma_correction: true,
            ambient_light: Color::rgb(0.0, 0.0, 0.0),
            exposure: 1.0,
            fog: FogConfig::default(),
            skybox_intensity: 1.0,
            cache_shadow_maps: false,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from RON text and validates it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Serializes the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Writes the configuration to a RON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = self.to_ron_string()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Rejects values the renderer cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.exposure.is_finite() && self.exposure >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "exposure",
                reason: format!("must be a non-negative number, got {}", self.exposure),
            });
        }
        if self.fog.mode == FogMode::Linear && self.fog.end <= self.fog.start {
            return Err(ConfigError::Invalid {
                field: "fog.end",
                reason: format!(
                    "linear fog end ({}) must be greater than start ({})",
                    self.fog.end, self.fog.start
                ),
            });
        }
        if self.fog.density < 0.0 {
            return Err(ConfigError::Invalid {
                field: "fog.density",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}
