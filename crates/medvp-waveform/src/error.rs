//! Waveform errors

use medvp_render::RenderError;
use thiserror::Error;

/// Errors raised while loading or manipulating a waveform
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WaveformError {
    /// The provider had no usable samples
    #[error("Waveform data source: {0}")]
    DataSource(String),

    #[error("Waveform is not loaded")]
    NotLoaded,

    #[error("Channel {index} out of range ({count} channels)")]
    ChannelOutOfRange { index: usize, count: usize },

    #[error("Invalid waveform configuration: {0}")]
    InvalidConfig(String),
}

impl From<WaveformError> for RenderError {
    fn from(err: WaveformError) -> Self {
        match err {
            WaveformError::DataSource(msg) => RenderError::DataSource(msg),
            WaveformError::InvalidConfig(msg) => RenderError::Configuration(msg),
            other => RenderError::DataSource(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_render_error() {
        let err: RenderError = WaveformError::DataSource("empty".into()).into();
        assert_eq!(err, RenderError::DataSource("empty".into()));

        let err: RenderError = WaveformError::InvalidConfig("gap".into()).into();
        assert!(matches!(err, RenderError::Configuration(_)));
        assert!(err.is_fatal());
    }
}
