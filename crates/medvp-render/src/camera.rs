//! Viewport cameras

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Pan/zoom/orientation state of a viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Offset in canvas pixels
    pub pan: DVec2,
    /// Magnification relative to the fitted view
    pub zoom: f64,
    /// Half-height of the view in world units
    pub parallel_scale: f64,
    /// In-plane rotation, degrees
    pub rotation: f64,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: DVec2::ZERO,
            zoom: 1.0,
            parallel_scale: 1.0,
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

impl Camera {
    /// Copy rotation and flips from `other`, keeping pan/zoom.
    pub fn with_orientation_of(mut self, other: &Camera) -> Self {
        self.rotation = other.rotation;
        self.flip_horizontal = other.flip_horizontal;
        self.flip_vertical = other.flip_vertical;
        self
    }

    /// Fitted camera for a canvas of the given aspect ratio.
    ///
    /// Wide canvases keep the unit vertical extent; tall canvases widen it
    /// so the unit square still fits horizontally.
    pub fn fitted(aspect_ratio: f64) -> Self {
        let parallel_scale = if aspect_ratio > 0.0 && aspect_ratio < 1.0 {
            1.0 / aspect_ratio
        } else {
            1.0
        };
        Self {
            parallel_scale,
            ..Self::default()
        }
    }
}

/// Fit constraint: how much of the canvas the image should cover.
///
/// When present, pan and zoom are derived from it after every resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayArea {
    /// Fraction of the fitted view the image spans (1.0 = exact fit)
    pub image_area: f64,
    /// Pan as a fraction of canvas size
    pub pan_fraction: DVec2,
}

impl Default for DisplayArea {
    fn default() -> Self {
        Self {
            image_area: 1.0,
            pan_fraction: DVec2::ZERO,
        }
    }
}

impl DisplayArea {
    /// Derive pan/zoom for a canvas of `size` physical pixels.
    pub fn apply(&self, camera: &mut Camera, size: (u32, u32)) {
        camera.zoom = if self.image_area > 0.0 {
            1.0 / self.image_area
        } else {
            1.0
        };
        camera.pan = self.pan_fraction * DVec2::new(size.0 as f64, size.1 as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_copy_keeps_pan_zoom() {
        let prior = Camera {
            pan: DVec2::new(10.0, 5.0),
            zoom: 3.0,
            rotation: 90.0,
            flip_horizontal: true,
            ..Camera::default()
        };
        let fresh = Camera::fitted(2.0).with_orientation_of(&prior);

        assert_eq!(fresh.rotation, 90.0);
        assert!(fresh.flip_horizontal);
        assert_eq!(fresh.zoom, 1.0);
        assert_eq!(fresh.pan, DVec2::ZERO);
    }

    #[test]
    fn test_display_area_derives_pan_zoom() {
        let area = DisplayArea {
            image_area: 0.5,
            pan_fraction: DVec2::new(0.1, 0.0),
        };
        let mut camera = Camera::default();
        area.apply(&mut camera, (200, 100));

        assert_eq!(camera.zoom, 2.0);
        assert_eq!(camera.pan, DVec2::new(20.0, 0.0));
    }

    #[test]
    fn test_fitted_tall_canvas() {
        assert_eq!(Camera::fitted(0.5).parallel_scale, 2.0);
        assert_eq!(Camera::fitted(2.0).parallel_scale, 1.0);
    }
}
