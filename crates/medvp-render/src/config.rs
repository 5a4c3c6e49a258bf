//! Rendering Engine Configuration
//!
//! Sizing of the shared surface pool and the limits the frame loop
//! enforces on viewport geometry.

use crate::Color;
use serde::{Deserialize, Serialize};

/// Smallest width/height (physical pixels) a viewport is rendered at.
pub const VIEWPORT_MIN_SIZE: u32 = 2;

/// Default number of shared rendering surfaces
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of shared offscreen surfaces
    pub surface_pool_size: usize,

    /// Minimum viewport dimension in physical pixels
    pub min_viewport_size: u32,

    /// Device pixel ratio used to turn layout sizes into physical sizes
    pub device_pixel_ratio: f64,

    /// Whether a GPU pipeline exists in this environment.
    /// GPU-driven viewports fail every render when false.
    pub gpu_available: bool,

    /// Background color given to every sub-renderer
    pub background: Color,

    /// Largest surface width/height the device accepts; `None` is unbounded
    pub max_surface_size: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            surface_pool_size: DEFAULT_POOL_SIZE,
            min_viewport_size: VIEWPORT_MIN_SIZE,
            device_pixel_ratio: 1.0,
            gpu_available: true,
            background: Color::BLACK,
            max_surface_size: None,
        }
    }
}

impl EngineConfig {
    /// One surface shared by every GPU viewport.
    /// Lowest memory, every draw serializes on the same target.
    pub fn single_surface() -> Self {
        Self {
            surface_pool_size: 1,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.surface_pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if self.min_viewport_size == 0 {
            return Err(ConfigError::ZeroMinimumSize);
        }
        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err(ConfigError::InvalidPixelRatio(self.device_pixel_ratio));
        }
        if let Some(max) = self.max_surface_size {
            if max < self.min_viewport_size {
                return Err(ConfigError::SurfaceLimitBelowMinimum {
                    max,
                    min: self.min_viewport_size,
                });
            }
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Surface pool must hold at least one surface")]
    EmptyPool,

    #[error("Minimum viewport size must be at least 1 pixel")]
    ZeroMinimumSize,

    #[error("Device pixel ratio must be positive (got {0})")]
    InvalidPixelRatio(f64),

    #[error("Surface limit {max} is below the minimum viewport size {min}")]
    SurfaceLimitBelowMinimum { max: u32, min: u32 },

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.surface_pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.min_viewport_size, VIEWPORT_MIN_SIZE);
        assert!(config.gpu_available);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::single_surface();
        assert!(config.validate().is_ok());

        config.surface_pool_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPool)));

        config.surface_pool_size = 2;
        config.device_pixel_ratio = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPixelRatio(_))
        ));

        config.device_pixel_ratio = 2.0;
        config.max_surface_size = Some(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SurfaceLimitBelowMinimum { max: 1, min: 2 })
        ));
        config.max_surface_size = Some(4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{ "surface_pool_size": 2 }"#).unwrap();
        assert_eq!(config.surface_pool_size, 2);
        assert_eq!(config.device_pixel_ratio, 1.0);
        assert_eq!(config.max_surface_size, None);

        assert!(EngineConfig::from_json(r#"{ "surface_pool_size": 0 }"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
