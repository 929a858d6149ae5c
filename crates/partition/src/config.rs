use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, PartitionError};
use crate::layout::TessellationRule;

/// Static description of the partitioned world, supplied once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Extent along x; the world spans `[-world_width / 2, world_width / 2)`.
    pub world_width: f32,
    /// Extent along y; the world spans `[-world_height / 2, world_height / 2)`.
    pub world_height: f32,
    /// Padding added around each owned cell when building the interest query.
    pub interest_border: f32,
    pub tessellation: TessellationRule,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            world_width: 1_000_000.0,
            world_height: 1_000_000.0,
            interest_border: 0.0,
            tessellation: TessellationRule::default(),
        }
    }
}

impl StrategyConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "loaded strategy config");
        Ok(config)
    }

    /// Checks that need no geometry. Cell-level checks happen when the
    /// partition table is built.
    pub fn validate(&self) -> Result<(), PartitionError> {
        let (width, height) = (self.world_width, self.world_height);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PartitionError::InvalidWorld { width, height });
        }
        if !self.interest_border.is_finite() {
            return Err(PartitionError::InvalidInterestBorder {
                border: self.interest_border,
            });
        }
        self.tessellation.validate()?;
        Ok(())
    }
}
