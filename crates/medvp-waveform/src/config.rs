//! Waveform Configuration
//!
//! Geometry constants for laying out and gridding multi-channel traces.

use crate::error::WaveformError;
use serde::{Deserialize, Serialize};

/// Extra vertical room around each channel's amplitude range
pub const DEFAULT_HEADROOM: f64 = 1.25;

/// Complete waveform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Horizontal content pixels per second of signal
    pub pixels_per_second: f64,

    /// Fixed gap below each channel band (content pixels)
    pub channel_gap: f64,

    /// Band height as a multiple of the scaled amplitude range
    pub headroom: f64,

    /// Smallest spacing of horizontal grid lines (content pixels)
    pub min_grid_spacing: f64,

    /// Time between vertical grid lines (seconds)
    pub grid_minor_seconds: f64,

    /// Every n-th grid line is major
    pub major_every: u32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            pixels_per_second: 250.0,
            channel_gap: 10.0,
            headroom: DEFAULT_HEADROOM,
            min_grid_spacing: 8.0,
            grid_minor_seconds: 0.04,
            major_every: 5,
        }
    }
}

impl WaveformConfig {
    /// Denser preset for small thumbnails
    pub fn compact() -> Self {
        Self {
            pixels_per_second: 100.0,
            channel_gap: 4.0,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, WaveformError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WaveformError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WaveformError> {
        if !(self.pixels_per_second > 0.0) {
            return Err(WaveformError::InvalidConfig(
                "pixels_per_second must be positive".into(),
            ));
        }
        if self.channel_gap < 0.0 {
            return Err(WaveformError::InvalidConfig(
                "channel_gap must not be negative".into(),
            ));
        }
        if !(self.headroom >= 1.0) {
            return Err(WaveformError::InvalidConfig(
                "headroom must be at least 1".into(),
            ));
        }
        if !(self.min_grid_spacing > 0.0) || !(self.grid_minor_seconds > 0.0) {
            return Err(WaveformError::InvalidConfig(
                "grid spacing must be positive".into(),
            ));
        }
        if self.major_every == 0 {
            return Err(WaveformError::InvalidConfig(
                "major_every must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Content pixels between vertical grid lines
    pub fn vertical_grid_spacing(&self) -> f64 {
        self.grid_minor_seconds * self.pixels_per_second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = WaveformConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.headroom, 1.25);
        assert_eq!(config.vertical_grid_spacing(), 10.0);
        assert!(WaveformConfig::compact().validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = WaveformConfig::from_json(r#"{"channel_gap": 4.0}"#).unwrap();
        assert_eq!(config.channel_gap, 4.0);
        assert_eq!(config.pixels_per_second, 250.0);

        assert!(WaveformConfig::from_json(r#"{"headroom": 0.5}"#).is_err());
        assert!(WaveformConfig::from_json("not json").is_err());
    }
}
