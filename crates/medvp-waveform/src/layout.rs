//! Channel layout
//!
//! Visible channels stack top to bottom as bands in content space. Every
//! band uses the same amplitude scale, chosen from the largest visible
//! range so the stacked height matches the target height.

use crate::channel::Channel;
use crate::config::WaveformConfig;
use serde::Serialize;

/// Placement of one visible channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    /// Index into the full channel list
    pub channel: usize,
    /// Top edge in content pixels
    pub top: f64,
    /// `range × scale × headroom`
    pub height: f64,
    /// Content y of amplitude zero
    pub baseline: f64,
}

impl Band {
    /// Band plus the gap below it
    pub fn contains(&self, y: f64, gap: f64) -> bool {
        y >= self.top && y < self.top + self.height + gap
    }
}

/// Geometry of the loaded waveform in content pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    /// Content pixels per amplitude unit
    pub scale: f64,
    pub max_range: f64,
    pub bands: Vec<Band>,
    pub total_height: f64,
    pub content_width: f64,
    /// Gap below each band
    pub gap: f64,
}

impl Layout {
    /// Lay out the visible channels.
    ///
    /// `target_height` is the content height the bands should fill,
    /// normally `content_width / aspect` of the canvas at load time.
    pub fn compute(
        channels: &[Channel],
        target_height: f64,
        content_width: f64,
        config: &WaveformConfig,
    ) -> Self {
        let visible: Vec<(usize, &Channel)> = channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.visible)
            .collect();
        let n = visible.len() as f64;
        let gap = config.channel_gap;

        let max_range = visible
            .iter()
            .map(|(_, c)| c.range())
            .fold(0.0, f64::max);

        let scale = if visible.is_empty() {
            1.0
        } else {
            // Flat signals still need a finite scale
            let range = if max_range > 0.0 { max_range } else { 1.0 };
            let available = (target_height - n * gap).max(n);
            available / (n * range * config.headroom)
        };

        let mut top = 0.0;
        let bands = visible
            .iter()
            .map(|&(channel, c)| {
                let height = c.range() * scale * config.headroom;
                let margin = (height - c.range() * scale) / 2.0;
                let band = Band {
                    channel,
                    top,
                    height,
                    baseline: top + margin + c.max() * scale,
                };
                top += height + gap;
                band
            })
            .collect();

        Self {
            scale,
            max_range,
            bands,
            total_height: top,
            content_width,
            gap,
        }
    }

    pub fn band_for_channel(&self, channel: usize) -> Option<&Band> {
        self.bands.iter().find(|b| b.channel == channel)
    }

    /// Band under a content y coordinate
    pub fn band_at(&self, y: f64) -> Option<&Band> {
        self.bands.iter().find(|b| b.contains(y, self.gap))
    }
}

/// Content width of a recording
pub fn content_width(sample_count: usize, sampling_frequency: f64, config: &WaveformConfig) -> f64 {
    sample_count as f64 / sampling_frequency * config.pixels_per_second
}
