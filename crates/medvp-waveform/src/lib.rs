//! medvp Waveform - Multi-channel Waveform Viewport
//!
//! Draws ECG-style recordings through the custom pipeline of
//! `medvp-render`: channels are stacked in bands with a uniform amplitude
//! scale over a paper grid, and points map between signal coordinates
//! `(sample, amplitude, channel)` and canvas pixels.

mod channel;
mod config;
mod error;
mod grid;
mod layout;
mod provider;
mod raster;
mod transform;
mod viewport;

pub use channel::Channel;
pub use config::{WaveformConfig, DEFAULT_HEADROOM};
pub use error::WaveformError;
pub use grid::{grid_lines, horizontal_unit, GridLine, Orientation};
pub use layout::{content_width, Band, Layout};
pub use provider::{ChannelData, StaticProvider, SyntheticProvider, WaveformData, WaveformProvider};
pub use raster::{rasterize, DrawCommand};
pub use transform::{ViewTransform, WaveformTransform, WorldPoint};
pub use viewport::{load_waveform, ChannelLabel, WaveformViewport};
