//! Configuration types for frameresize

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Resize configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// How the crop and scale are carried out
    pub strategy: StrategyKind,
    /// Timing attached to the produced frame
    pub timing: TimingPolicy,
    /// Resource limits
    pub limits: Limits,
}

impl ResizeConfig {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timing(mut self, timing: TimingPolicy) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.limits.max_dimension = max_dimension;
        self
    }

    pub fn with_max_allocation_bytes(mut self, bytes: usize) -> Self {
        self.limits.max_allocation_bytes = bytes;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!("Loaded resize config from {}", path.display());
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check the config is usable
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_dimension == 0 {
            return Err(Error::Config("limits.max_dimension must be positive".into()));
        }
        if self.limits.max_allocation_bytes == 0 {
            return Err(Error::Config(
                "limits.max_allocation_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Resize strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Offset arithmetic into the source plus area resampling straight into
    /// the destination
    #[default]
    DirectResample,
    /// Crop through the image graph renderer, scale as a second step
    RenderedCrop,
}

impl StrategyKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::DirectResample => "direct-resample",
            StrategyKind::RenderedCrop => "rendered-crop",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// What timing the resized frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingPolicy {
    /// Copy presentation, decode and duration from the source frame
    #[default]
    Preserve,
    /// Presentation at zero, decode and duration invalid
    Reset,
}

/// Resource limits applied per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest width or height a produced frame may have
    pub max_dimension: u32,
    /// Largest destination allocation in bytes
    pub max_allocation_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dimension: 16_384,
            max_allocation_bytes: 256 * 1024 * 1024,
        }
    }
}
