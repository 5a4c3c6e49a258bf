//! World/canvas transforms
//!
//! World coordinates are `(sample, amplitude, channel)`. Content space is
//! the laid-out waveform in pixels; canvas space adds a uniform pan/zoom.

use crate::layout::Layout;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A point in the signal domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// Fractional sample index
    pub sample: f64,
    pub amplitude: f64,
    pub channel: usize,
}

impl WorldPoint {
    pub fn new(sample: f64, amplitude: f64, channel: usize) -> Self {
        Self {
            sample,
            amplitude,
            channel,
        }
    }
}

/// Uniform pan/zoom from content to canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub pan: DVec2,
    pub zoom: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pan: DVec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl ViewTransform {
    /// Zoom so the full content width spans `canvas_width`.
    pub fn fit_width(content_width: f64, canvas_width: u32) -> Self {
        let zoom = if content_width > 0.0 && canvas_width > 0 {
            canvas_width as f64 / content_width
        } else {
            1.0
        };
        Self {
            pan: DVec2::ZERO,
            zoom,
        }
    }

    pub fn content_to_canvas(&self, p: DVec2) -> DVec2 {
        p * self.zoom + self.pan
    }

    pub fn canvas_to_content(&self, p: DVec2) -> DVec2 {
        (p - self.pan) / self.zoom
    }
}

/// Maps between world, content and canvas space for one layout
#[derive(Debug, Clone, Copy)]
pub struct WaveformTransform<'a> {
    pub layout: &'a Layout,
    pub view: ViewTransform,
    pub sampling_frequency: f64,
    pub pixels_per_second: f64,
}

impl WaveformTransform<'_> {
    /// Content x of a (fractional) sample index
    pub fn sample_to_x(&self, sample: f64) -> f64 {
        sample / self.sampling_frequency * self.pixels_per_second
    }

    pub fn x_to_sample(&self, x: f64) -> f64 {
        x / self.pixels_per_second * self.sampling_frequency
    }

    /// Content position; `None` for hidden or unknown channels.
    pub fn world_to_content(&self, p: WorldPoint) -> Option<DVec2> {
        let band = self.layout.band_for_channel(p.channel)?;
        Some(DVec2::new(
            self.sample_to_x(p.sample),
            band.baseline - p.amplitude * self.layout.scale,
        ))
    }

    pub fn world_to_canvas(&self, p: WorldPoint) -> Option<DVec2> {
        self.world_to_content(p)
            .map(|c| self.view.content_to_canvas(c))
    }

    /// Inverse of [`world_to_canvas`](Self::world_to_canvas); `None`
    /// outside every visible band.
    pub fn canvas_to_world(&self, p: DVec2) -> Option<WorldPoint> {
        let content = self.view.canvas_to_content(p);
        let band = self.layout.band_at(content.y)?;
        Some(WorldPoint {
            sample: self.x_to_sample(content.x),
            amplitude: (band.baseline - content.y) / self.layout.scale,
            channel: band.channel,
        })
    }
}
