//! On-screen canvases and pixel buffers.
//!
//! A [`Canvas`] has two sizes: the layout box the host gives it (logical
//! units, changed by the host at any time) and the physical backing size,
//! which the render pipeline changes only together with new content.

use crate::Color;
use serde::Serialize;

/// Top-down RGBA8 pixel storage
#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<[u8; 4]>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0; 4]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize, discarding contents
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width as usize * height as usize, [0; 4]);
    }

    pub fn fill(&mut self, color: Color) {
        self.data.fill(color.to_rgba8());
    }

    /// Fill a rectangle, clipped to the buffer.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Color) {
        let rgba = color.to_rgba8();
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for row in y.min(y_end)..y_end {
            let start = self.index(x.min(x_end), row);
            let end = self.index(x_end, row);
            self.data[start..end].fill(rgba);
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width && y < self.height).then(|| self.data[self.index(x, y)])
    }

    /// Write one pixel; out-of-bounds writes are dropped.
    pub fn set(&mut self, x: i64, y: i64, rgba: [u8; 4]) {
        if x >= 0 && y >= 0 && (x as u64) < self.width as u64 && (y as u64) < self.height as u64 {
            let idx = self.index(x as u32, y as u32);
            self.data[idx] = rgba;
        }
    }

    /// Copy a `width`x`height` block from `src` at `(sx, sy)` to `(dx, dy)`.
    /// The block is clipped against both buffers.
    pub fn copy_region_from(
        &mut self,
        src: &PixelBuffer,
        sx: u32,
        sy: u32,
        width: u32,
        height: u32,
        dx: u32,
        dy: u32,
    ) {
        let w = width
            .min(src.width.saturating_sub(sx))
            .min(self.width.saturating_sub(dx));
        let h = height
            .min(src.height.saturating_sub(sy))
            .min(self.height.saturating_sub(dy));
        for row in 0..h {
            let s = src.index(sx, sy + row);
            let d = self.index(dx, dy + row);
            self.data[d..d + w as usize].copy_from_slice(&src.data[s..s + w as usize]);
        }
    }

    /// Raw RGBA bytes, row-major, top row first
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Physical size of a canvas as last presented
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanvasDescriptor {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
}

/// A visible canvas owned by one viewport
#[derive(Debug)]
pub struct Canvas {
    /// Host element identifier
    element: String,
    /// Layout box width (logical units)
    client_width: f64,
    /// Layout box height (logical units)
    client_height: f64,
    device_pixel_ratio: f64,
    /// Presented pixels; its size is the physical backing size
    pixels: PixelBuffer,
}

impl Canvas {
    pub fn new(element: impl Into<String>, client_width: f64, client_height: f64) -> Self {
        Self {
            element: element.into(),
            client_width,
            client_height,
            device_pixel_ratio: 1.0,
            pixels: PixelBuffer::new(0, 0),
        }
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    /// Host layout change. Does not touch the presented pixels.
    pub fn set_client_size(&mut self, width: f64, height: f64) {
        self.client_width = width;
        self.client_height = height;
    }

    pub fn client_size(&self) -> (f64, f64) {
        (self.client_width, self.client_height)
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        self.device_pixel_ratio = ratio;
    }

    /// Layout box scaled to physical pixels
    pub fn displayed_size(&self) -> (u32, u32) {
        let scale = |v: f64| (v.max(0.0) * self.device_pixel_ratio).round() as u32;
        (scale(self.client_width), scale(self.client_height))
    }

    /// Current physical backing size
    pub fn size(&self) -> (u32, u32) {
        (self.pixels.width(), self.pixels.height())
    }

    pub fn descriptor(&self) -> CanvasDescriptor {
        let (width, height) = self.size();
        CanvasDescriptor {
            width,
            height,
            aspect_ratio: if height == 0 {
                0.0
            } else {
                width as f64 / height as f64
            },
        }
    }

    /// Change the physical backing size.
    ///
    /// Only render pipelines call this, immediately before writing the
    /// matching content. Returns true when the size changed.
    pub fn set_size(&mut self, width: u32, height: u32) -> bool {
        if self.size() == (width, height) {
            return false;
        }
        self.pixels.resize(width, height);
        true
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }
}
