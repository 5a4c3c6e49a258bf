//! Immediate-mode drawing onto a canvas pixel buffer.
//!
//! The viewport builds a list of [`DrawCommand`]s per frame; [`rasterize`]
//! executes them in order. Coordinates are canvas pixels, origin top-left.

use glam::DVec2;
use medvp_render::{Color, PixelBuffer};

/// Draw command for the waveform canvas
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Fill the whole buffer
    Clear(Color),
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },
    /// Axis-aligned or diagonal segment; `width` in whole pixels
    Line {
        from: DVec2,
        to: DVec2,
        width: u32,
        color: Color,
    },
    /// Connected 1px segments
    Polyline { points: Vec<DVec2>, color: Color },
}

/// Execute commands in order.
pub fn rasterize(commands: &[DrawCommand], buf: &mut PixelBuffer) {
    for command in commands {
        match command {
            DrawCommand::Clear(color) => buf.fill(*color),
            DrawCommand::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                let x0 = x.round().max(0.0) as u32;
                let y0 = y.round().max(0.0) as u32;
                let x1 = (x + width).round().max(0.0) as u32;
                let y1 = (y + height).round().max(0.0) as u32;
                buf.fill_rect(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0), *color);
            }
            DrawCommand::Line {
                from,
                to,
                width,
                color,
            } => thick_line(buf, *from, *to, *width, color.to_rgba8()),
            DrawCommand::Polyline { points, color } => {
                let rgba = color.to_rgba8();
                for pair in points.windows(2) {
                    line(buf, pair[0], pair[1], rgba);
                }
            }
        }
    }
}

/// Bresenham segment, clipped to the buffer first.
fn line(buf: &mut PixelBuffer, from: DVec2, to: DVec2, rgba: [u8; 4]) {
    let bounds = DVec2::new(buf.width() as f64, buf.height() as f64);
    let Some((from, to)) = clip_segment(from, to, bounds) else {
        return;
    };
    let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
    let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        buf.set(x0, y0, rgba);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Liang-Barsky clip against `[-1, bounds]` on both axes; `None` when the
/// segment misses or an endpoint is not finite.
fn clip_segment(from: DVec2, to: DVec2, bounds: DVec2) -> Option<(DVec2, DVec2)> {
    if !(from.is_finite() && to.is_finite()) {
        return None;
    }
    let d = to - from;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-d.x, from.x + 1.0),
        (d.x, bounds.x - from.x),
        (-d.y, from.y + 1.0),
        (d.y, bounds.y - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    let low = DVec2::splat(-1.0);
    Some((
        (from + d * t0).clamp(low, bounds),
        (from + d * t1).clamp(low, bounds),
    ))
}

/// Segment widened across its dominant axis
fn thick_line(buf: &mut PixelBuffer, from: DVec2, to: DVec2, width: u32, rgba: [u8; 4]) {
    let d = to - from;
    let offset = if d.x.abs() >= d.y.abs() {
        DVec2::Y
    } else {
        DVec2::X
    };
    for i in 0..width.max(1) {
        let shift = offset * i as f64;
        line(buf, from + shift, to + shift, rgba);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: Color = Color::rgb(0.0, 0.0, 0.0);

    #[test]
    fn test_clear_and_rect() {
        let mut buf = PixelBuffer::new(4, 4);
        rasterize(
            &[
                DrawCommand::Clear(Color::WHITE),
                DrawCommand::Rect {
                    x: 1.0,
                    y: 1.0,
                    width: 2.0,
                    height: 2.0,
                    color: INK,
                },
            ],
            &mut buf,
        );
        assert_eq!(buf.get(0, 0), Some(Color::WHITE.to_rgba8()));
        assert_eq!(buf.get(1, 1), Some(INK.to_rgba8()));
        assert_eq!(buf.get(2, 2), Some(INK.to_rgba8()));
        assert_eq!(buf.get(3, 3), Some(Color::WHITE.to_rgba8()));
    }

    #[test]
    fn test_diagonal_line() {
        let mut buf = PixelBuffer::new(5, 5);
        buf.fill(Color::WHITE);
        rasterize(
            &[DrawCommand::Line {
                from: DVec2::new(0.0, 0.0),
                to: DVec2::new(4.0, 4.0),
                width: 1,
                color: INK,
            }],
            &mut buf,
        );
        for i in 0..5 {
            assert_eq!(buf.get(i, i), Some(INK.to_rgba8()));
        }
        assert_eq!(buf.get(1, 0), Some(Color::WHITE.to_rgba8()));
    }

    #[test]
    fn test_thick_horizontal_line() {
        let mut buf = PixelBuffer::new(6, 6);
        buf.fill(Color::WHITE);
        rasterize(
            &[DrawCommand::Line {
                from: DVec2::new(0.0, 2.0),
                to: DVec2::new(5.0, 2.0),
                width: 2,
                color: INK,
            }],
            &mut buf,
        );
        assert_eq!(buf.get(3, 2), Some(INK.to_rgba8()));
        assert_eq!(buf.get(3, 3), Some(INK.to_rgba8()));
        assert_eq!(buf.get(3, 4), Some(Color::WHITE.to_rgba8()));
    }

    #[test]
    fn test_polyline_clipped() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill(Color::WHITE);
        rasterize(
            &[DrawCommand::Polyline {
                points: vec![
                    DVec2::new(-3.0, 1.0),
                    DVec2::new(2.0, 1.0),
                    DVec2::new(2.0, 10.0),
                ],
                color: INK,
            }],
            &mut buf,
        );
        assert_eq!(buf.get(0, 1), Some(INK.to_rgba8()));
        assert_eq!(buf.get(2, 3), Some(INK.to_rgba8()));
        assert_eq!(buf.get(3, 1), Some(Color::WHITE.to_rgba8()));
    }

    #[test]
    fn test_non_finite_segments_skipped() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill(Color::WHITE);
        rasterize(
            &[DrawCommand::Polyline {
                points: vec![
                    DVec2::new(0.0, 0.0),
                    DVec2::new(1.0, f64::NEG_INFINITY),
                    DVec2::new(2.0, f64::NAN),
                    DVec2::new(3.0, 3.0),
                ],
                color: INK,
            }],
            &mut buf,
        );
        assert!((0..4).all(|x| (0..4).all(|y| buf.get(x, y) == Some(Color::WHITE.to_rgba8()))));
    }

    #[test]
    fn test_far_endpoints_clipped() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill(Color::WHITE);
        rasterize(
            &[
                DrawCommand::Line {
                    from: DVec2::new(-1e6, 1.0),
                    to: DVec2::new(1e6, 1.0),
                    width: 1,
                    color: INK,
                },
                DrawCommand::Line {
                    from: DVec2::new(10.0, 10.0),
                    to: DVec2::new(1e200, 1e200),
                    width: 1,
                    color: INK,
                },
            ],
            &mut buf,
        );
        assert!((0..4).all(|x| buf.get(x, 1) == Some(INK.to_rgba8())));
        assert_eq!(buf.get(3, 3), Some(Color::WHITE.to_rgba8()));
    }
}
