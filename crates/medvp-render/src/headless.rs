//! Headless scene backend
//!
//! A CPU stand-in for the GPU scene library. Each drawing renderer fills
//! its rectangle with its background color, which is enough to check
//! isolation, sub-rectangles and copy offsets without a GPU.

use crate::canvas::PixelBuffer;
use crate::scene::{SceneBackend, SceneSurface, SubRenderer};
use crate::Color;
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Counters shared by every surface of one backend
#[derive(Debug, Default)]
pub struct HeadlessStats {
    resizes: AtomicU64,
    renders: AtomicU64,
    /// `(surface index, renderer id)` for every renderer drawn
    draws: Mutex<Vec<(usize, String)>>,
}

impl HeadlessStats {
    pub fn resizes(&self) -> u64 {
        self.resizes.load(Ordering::Relaxed)
    }

    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    /// Everything drawn so far, in order
    pub fn draws(&self) -> Vec<(usize, String)> {
        self.draws.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn record_draw(&self, surface: usize, id: &str) {
        if let Ok(mut draws) = self.draws.lock() {
            draws.push((surface, id.to_string()));
        }
    }
}

/// Backend producing [`HeadlessSurface`]s
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    stats: Arc<HeadlessStats>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<HeadlessStats> {
        self.stats.clone()
    }
}

impl SceneBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_surface(&mut self, index: usize) -> Result<Box<dyn SceneSurface>> {
        Ok(Box::new(HeadlessSurface::new(index, self.stats.clone())))
    }
}

#[derive(Debug, Clone)]
struct HeadlessRenderer {
    background: Color,
    viewport: [f64; 4],
    draw: bool,
}

impl SubRenderer for HeadlessRenderer {
    fn set_viewport(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.viewport = [x0, y0, x1, y1];
    }

    fn viewport(&self) -> [f64; 4] {
        self.viewport
    }

    fn set_draw(&mut self, draw: bool) {
        self.draw = draw;
    }

    fn draw(&self) -> bool {
        self.draw
    }
}

/// CPU surface with bottom-left renderer origin
pub struct HeadlessSurface {
    index: usize,
    renderers: Vec<(String, HeadlessRenderer)>,
    pixels: PixelBuffer,
    stats: Arc<HeadlessStats>,
}

impl HeadlessSurface {
    fn new(index: usize, stats: Arc<HeadlessStats>) -> Self {
        Self {
            index,
            renderers: Vec::new(),
            pixels: PixelBuffer::new(0, 0),
            stats,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.renderers.iter().position(|(rid, _)| rid == id)
    }
}

impl SceneSurface for HeadlessSurface {
    fn add_renderer(&mut self, id: &str, background: Color) -> Result<()> {
        let renderer = HeadlessRenderer {
            background,
            viewport: [0.0, 0.0, 1.0, 1.0],
            draw: false,
        };
        match self.position(id) {
            Some(pos) => self.renderers[pos].1 = renderer,
            None => self.renderers.push((id.to_string(), renderer)),
        }
        Ok(())
    }

    fn renderer(&self, id: &str) -> Option<&dyn SubRenderer> {
        self.position(id)
            .map(|pos| &self.renderers[pos].1 as &dyn SubRenderer)
    }

    fn renderer_mut(&mut self, id: &str) -> Option<&mut dyn SubRenderer> {
        let pos = self.position(id)?;
        Some(&mut self.renderers[pos].1 as &mut dyn SubRenderer)
    }

    fn remove_renderer(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.renderers.remove(pos);
                true
            }
            None => false,
        }
    }

    fn renderer_ids(&self) -> Vec<String> {
        self.renderers.iter().map(|(id, _)| id.clone()).collect()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            bail!("cannot resize surface {} to {}x{}", self.index, width, height);
        }
        self.pixels.resize(width, height);
        self.stats.resizes.fetch_add(1, Ordering::Relaxed);
        trace!("Headless surface {} resized to {}x{}", self.index, width, height);
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (self.pixels.width(), self.pixels.height())
    }

    fn render(&mut self) -> Result<()> {
        let (width, height) = self.size();
        let (w, h) = (width as f64, height as f64);

        for (id, renderer) in self.renderers.iter().filter(|(_, r)| r.draw) {
            let [x0, y0, x1, y1] = renderer.viewport;
            let left = (x0 * w).round() as u32;
            let right = (x1 * w).round() as u32;
            // Bottom-left origin: y1 is the top edge
            let top = height - ((y1 * h).round() as u32).min(height);
            let bottom = height - ((y0 * h).round() as u32).min(height);

            self.pixels.fill_rect(
                left,
                top,
                right.saturating_sub(left),
                bottom.saturating_sub(top),
                renderer.background,
            );
            self.stats.record_draw(self.index, id);
        }

        self.stats.renders.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_pixels(&self) -> &PixelBuffer {
        &self.pixels
    }
}
