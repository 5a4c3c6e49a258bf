//! Viewer configuration, loaded from an optional JSON file.

use anyhow::{Context, Result};
use medvp_render::{EngineConfig, ViewportType};
use medvp_waveform::{SyntheticProvider, WaveformConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One viewport to open at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportSpec {
    pub id: String,
    /// Viewport type name, e.g. `stack` or `ecg`
    pub kind: String,
    pub width: f64,
    pub height: f64,
}

impl ViewportSpec {
    fn new(id: &str, kind: ViewportType, width: f64, height: f64) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.name().to_string(),
            width,
            height,
        }
    }
}

/// Complete viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Max log level when `RUST_LOG` is unset
    pub log_level: String,
    pub engine: EngineConfig,
    pub waveform: WaveformConfig,
    /// Data for every waveform viewport
    pub synthetic: SyntheticProvider,
    pub viewports: Vec<ViewportSpec>,
    /// Upper bound on frames driven before exit
    pub max_frames: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
            waveform: WaveformConfig::default(),
            synthetic: SyntheticProvider::default(),
            viewports: vec![
                ViewportSpec::new("axial", ViewportType::Stack, 512.0, 512.0),
                ViewportSpec::new("sagittal", ViewportType::Stack, 256.0, 512.0),
                ViewportSpec::new("volume", ViewportType::Volume3d, 512.0, 384.0),
                ViewportSpec::new("ecg", ViewportType::Ecg, 800.0, 300.0),
            ],
            max_frames: 16,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.waveform.validate()?;
        for entry in &self.viewports {
            entry.kind.parse::<ViewportType>()?;
        }
        Ok(())
    }
}
