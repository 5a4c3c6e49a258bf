//! Render errors
//!
//! Everything the engine can fail with. `Size` failures are absorbed by the
//! frame loop (logged and retried on the next trigger); every other variant
//! surfaces to the caller of enable/render.

use crate::viewport::ViewportId;
use thiserror::Error;

/// Errors raised by the rendering engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("Unsupported viewport configuration: {0}")]
    Configuration(String),

    #[error("Rendering resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Viewport {viewport} has unusable size {width}x{height} (minimum {min})")]
    Size {
        viewport: ViewportId,
        width: u32,
        height: u32,
        min: u32,
    },

    #[error("No usable data source: {0}")]
    DataSource(String),

    #[error("Unknown viewport: {0}")]
    Lookup(ViewportId),

    #[error("Surface error: {0}")]
    Surface(String),
}

impl RenderError {
    /// Whether the error must fail the calling operation.
    ///
    /// Size errors are transient: the viewport stays dirty and renders once
    /// its canvas has a usable size again.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Size { .. })
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        Self::Surface(err.to_string())
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
