//! Paper grid
//!
//! Horizontal lines mark amplitude units inside each band, vertical lines
//! mark fixed time steps. Every `major_every`-th line is major.

use crate::config::WaveformConfig;
use crate::layout::Layout;
use crate::transform::ViewTransform;
use glam::DVec2;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One grid line in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLine {
    pub orientation: Orientation,
    /// y for horizontal lines, x for vertical lines
    pub position: f64,
    /// Extent along the line
    pub start: f64,
    pub end: f64,
    pub major: bool,
}

/// Amplitude units between horizontal lines.
///
/// Starts at one unit and doubles until the lines are at least
/// `min_spacing` content pixels apart.
pub fn horizontal_unit(scale: f64, min_spacing: f64) -> f64 {
    let mut unit = 1.0;
    if !(scale > 0.0) {
        return unit;
    }
    while unit * scale < min_spacing {
        unit *= 2.0;
    }
    unit
}

/// Grid lines covering the visible part of the layout on a canvas of
/// `canvas_size` pixels.
pub fn grid_lines(
    layout: &Layout,
    view: &ViewTransform,
    canvas_size: (u32, u32),
    config: &WaveformConfig,
) -> Vec<GridLine> {
    let mut lines = Vec::new();
    let (cw, ch) = (canvas_size.0 as f64, canvas_size.1 as f64);
    let major_every = config.major_every.max(1) as i64;

    let left = view.content_to_canvas(DVec2::ZERO).x.max(0.0);
    let right = view
        .content_to_canvas(DVec2::new(layout.content_width, 0.0))
        .x
        .min(cw);
    if right <= left {
        return lines;
    }

    // Amplitude lines, counted from each band's baseline
    let unit = horizontal_unit(layout.scale, config.min_grid_spacing);
    let step = unit * layout.scale;
    for band in &layout.bands {
        let top = band.top;
        let bottom = band.top + band.height;
        let first = ((top - band.baseline) / step).ceil() as i64;
        let last = ((bottom - band.baseline) / step).floor() as i64;
        for k in first..=last {
            let y = view
                .content_to_canvas(DVec2::new(0.0, band.baseline + k as f64 * step))
                .y;
            if (0.0..ch).contains(&y) {
                lines.push(GridLine {
                    orientation: Orientation::Horizontal,
                    position: y,
                    start: left,
                    end: right,
                    major: k % major_every == 0,
                });
            }
        }
    }

    // Time lines across the full stack
    let spacing = config.vertical_grid_spacing();
    let top = view.content_to_canvas(DVec2::ZERO).y.max(0.0);
    let bottom = view
        .content_to_canvas(DVec2::new(0.0, layout.total_height))
        .y
        .min(ch);
    if spacing > 0.0 && bottom > top {
        let first = (view.canvas_to_content(DVec2::new(left, 0.0)).x / spacing).ceil() as i64;
        let last = (view.canvas_to_content(DVec2::new(right, 0.0)).x / spacing).floor() as i64;
        for i in first.max(0)..=last {
            let x = view
                .content_to_canvas(DVec2::new(i as f64 * spacing, 0.0))
                .x;
            if x < cw {
                lines.push(GridLine {
                    orientation: Orientation::Vertical,
                    position: x,
                    start: top,
                    end: bottom,
                    major: i % major_every == 0,
                });
            }
        }
    }

    lines
}
