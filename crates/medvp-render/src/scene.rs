//! Scene collaborator contract.
//!
//! Rasterization is not done here. A [`SceneBackend`] creates offscreen
//! [`SceneSurface`]s; each surface hosts named [`SubRenderer`]s and renders
//! every renderer whose draw flag is set.
//!
//! Coordinate conventions:
//! - renderer viewports are normalized `[x0, y0, x1, y1]` with the origin at
//!   the bottom-left of the surface
//! - [`SceneSurface::read_pixels`] returns rows top row first

use crate::canvas::PixelBuffer;
use crate::Color;
use anyhow::Result;

/// One named drawing scope inside a surface
pub trait SubRenderer {
    /// Set the normalized drawing rectangle (bottom-left origin)
    fn set_viewport(&mut self, x0: f64, y0: f64, x1: f64, y1: f64);

    /// Current normalized rectangle `[x0, y0, x1, y1]`
    fn viewport(&self) -> [f64; 4];

    fn set_draw(&mut self, draw: bool);

    fn draw(&self) -> bool;
}

/// A physical offscreen rendering target
pub trait SceneSurface {
    /// Add a renderer; replaces any renderer with the same id.
    fn add_renderer(&mut self, id: &str, background: Color) -> Result<()>;

    fn renderer(&self, id: &str) -> Option<&dyn SubRenderer>;

    fn renderer_mut(&mut self, id: &str) -> Option<&mut dyn SubRenderer>;

    /// Returns false if no such renderer existed
    fn remove_renderer(&mut self, id: &str) -> bool;

    /// Ids of every hosted renderer, overlays included, in insertion order
    fn renderer_ids(&self) -> Vec<String>;

    /// Resize the backing storage, discarding its contents
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn size(&self) -> (u32, u32);

    /// Draw every renderer whose draw flag is set
    fn render(&mut self) -> Result<()>;

    fn read_pixels(&self) -> &PixelBuffer;
}

/// Factory for surfaces
pub trait SceneBackend {
    fn name(&self) -> &str;

    fn create_surface(&mut self, index: usize) -> Result<Box<dyn SceneSurface>>;
}
