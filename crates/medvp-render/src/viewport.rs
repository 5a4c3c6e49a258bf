//! Viewport identity and kinds.
//!
//! Every viewport kind resolves to one of three render pipelines. The
//! engine branches once on [`PipelineKind`]; adding a kind means adding a
//! [`ViewportType`] and mapping it here.

use crate::camera::Camera;
use crate::canvas::Canvas;
use crate::error::RenderError;
use crate::Color;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a viewport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewportId(String);

impl ViewportId {
    /// Create a new viewport ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ViewportId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Viewport kinds known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportType {
    /// Stack of 2D image slices
    Stack,
    /// Multiplanar reformat of a volume
    Orthographic,
    /// 3D volume rendering
    Volume3d,
    /// Video playback
    Video,
    /// Whole-slide microscopy
    Wsi,
    /// Multi-channel waveform (ECG)
    Ecg,
}

impl ViewportType {
    /// Render pipeline this kind runs through
    pub fn pipeline(&self) -> PipelineKind {
        match self {
            Self::Stack => PipelineKind::DistributableGpu,
            Self::Orthographic | Self::Volume3d => PipelineKind::PinnedGpu,
            Self::Video | Self::Wsi | Self::Ecg => PipelineKind::CustomPipeline,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Orthographic => "orthographic",
            Self::Volume3d => "volume3d",
            Self::Video => "video",
            Self::Wsi => "wsi",
            Self::Ecg => "ecg",
        }
    }
}

impl fmt::Display for ViewportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewportType {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stack" => Ok(Self::Stack),
            "orthographic" => Ok(Self::Orthographic),
            "volume3d" => Ok(Self::Volume3d),
            "video" => Ok(Self::Video),
            "wsi" => Ok(Self::Wsi),
            "ecg" => Ok(Self::Ecg),
            other => Err(RenderError::Configuration(format!(
                "unsupported viewport type '{other}'"
            ))),
        }
    }
}

/// How a viewport gets its pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Shared surface, round-robin across the pool
    DistributableGpu,
    /// Shared surface, always surface 0
    PinnedGpu,
    /// Draws into its own canvas; never touches the pool
    CustomPipeline,
}

impl PipelineKind {
    pub fn uses_pool(&self) -> bool {
        !matches!(self, Self::CustomPipeline)
    }
}

/// Lifecycle of a viewport's content, reported in completion events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewportStatus {
    NoData,
    Loading,
    PreRender,
    Rendered,
}

/// Per-viewport defaults supplied at enable time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportOptions {
    /// Sub-renderer background; falls back to the engine background
    pub background: Option<Color>,
    /// Suppress completion events for this viewport
    pub suppress_events: bool,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            background: None,
            suppress_events: false,
        }
    }
}

/// Everything needed to enable a viewport
#[derive(Debug)]
pub struct ViewportInput {
    pub id: ViewportId,
    pub kind: ViewportType,
    pub canvas: Canvas,
    pub default_options: ViewportOptions,
}

impl ViewportInput {
    pub fn new(id: impl Into<String>, kind: ViewportType, canvas: Canvas) -> Self {
        Self {
            id: ViewportId::new(id),
            kind,
            canvas,
            default_options: ViewportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ViewportOptions) -> Self {
        self.default_options = options;
        self
    }
}

/// A viewport that draws itself instead of going through the surface pool.
///
/// The engine owns the canvas and hands it over for the duration of one
/// render; implementations size it and draw synchronously.
pub trait CustomPipelineViewport: Any {
    /// Draw the current state into `canvas`, sized to its displayed size.
    fn custom_render_viewport_to_canvas(
        &mut self,
        canvas: &mut Canvas,
        camera: &Camera,
    ) -> Result<(), RenderError>;

    /// Content status reported in completion events
    fn status(&self) -> ViewportStatus;

    /// Returns and clears a pending request to be re-rendered.
    fn take_render_request(&mut self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_mapping() {
        assert_eq!(ViewportType::Stack.pipeline(), PipelineKind::DistributableGpu);
        assert_eq!(ViewportType::Volume3d.pipeline(), PipelineKind::PinnedGpu);
        assert_eq!(ViewportType::Orthographic.pipeline(), PipelineKind::PinnedGpu);
        assert_eq!(ViewportType::Ecg.pipeline(), PipelineKind::CustomPipeline);
        assert!(!PipelineKind::CustomPipeline.uses_pool());
    }

    #[test]
    fn test_parse_viewport_type() {
        assert_eq!("STACK".parse::<ViewportType>().unwrap(), ViewportType::Stack);
        assert_eq!("ecg".parse::<ViewportType>().unwrap(), ViewportType::Ecg);

        let err = "hologram".parse::<ViewportType>().unwrap_err();
        assert!(matches!(err, RenderError::Configuration(_)));
    }

    #[test]
    fn test_viewport_id_display() {
        let id = ViewportId::from("ct-axial");
        assert_eq!(id.to_string(), "ct-axial");
        assert_eq!(id.as_str(), "ct-axial");
    }
}
