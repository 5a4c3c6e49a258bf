//! Surface Pool - shared offscreen rendering targets
//!
//! A fixed number of physical surfaces host any number of viewports. Each
//! surface is sized to the bounding footprint of the viewports it hosts:
//! - growing one viewport grows the surface, and every co-resident viewport
//!   gets its normalized rectangle recomputed
//! - only one viewport draws per pass, enforced by [`DrawToken`]

use crate::error::{RenderError, Result};
use crate::scene::{SceneBackend, SceneSurface};
use crate::viewport::ViewportId;
use crate::Color;
use std::collections::HashMap;
use tracing::{debug, info};

/// Where a viewport lives and how much room it asked for
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceAssignment {
    pub surface_index: usize,
    pub requested_width: u32,
    pub requested_height: u32,
    background: Color,
}

impl SurfaceAssignment {
    pub fn requested_size(&self) -> (u32, u32) {
        (self.requested_width, self.requested_height)
    }
}

/// One physical surface plus the footprint it must cover
pub struct PooledSurface {
    index: usize,
    surface: Box<dyn SceneSurface>,
    max_width: u32,
    max_height: u32,
}

impl PooledSurface {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bounding footprint of every hosted viewport
    pub fn max_size(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    pub fn surface(&self) -> &dyn SceneSurface {
        self.surface.as_ref()
    }
}

impl std::fmt::Debug for PooledSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSurface")
            .field("index", &self.index)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("renderers", &self.surface.renderer_ids())
            .finish()
    }
}

/// Normalized rectangle of a `requested` footprint inside a `max` surface
pub fn normalized_rect(requested: (u32, u32), max: (u32, u32)) -> [f64; 4] {
    let fraction = |r: u32, m: u32| {
        if m == 0 {
            0.0
        } else {
            (r as f64 / m as f64).min(1.0)
        }
    };
    [
        0.0,
        0.0,
        fraction(requested.0, max.0),
        fraction(requested.1, max.1),
    ]
}

/// Fixed-size pool of shared surfaces
pub struct SurfacePool {
    surfaces: Vec<PooledSurface>,
    assignments: HashMap<ViewportId, SurfaceAssignment>,
    /// Assignment order, used when re-adding renderers
    order: Vec<ViewportId>,
    /// Device limit on either surface dimension
    max_dimension: Option<u32>,
}

impl SurfacePool {
    /// Create `size` surfaces from `backend`.
    pub fn new(backend: &mut dyn SceneBackend, size: usize) -> Result<Self> {
        let surfaces = (0..size)
            .map(|index| {
                Ok(PooledSurface {
                    index,
                    surface: backend.create_surface(index)?,
                    max_width: 0,
                    max_height: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Created surface pool: {} x {}", size, backend.name());

        Ok(Self {
            surfaces,
            assignments: HashMap::new(),
            order: Vec::new(),
            max_dimension: None,
        })
    }

    /// Reject footprints wider or taller than `max`.
    pub fn with_max_dimension(mut self, max: Option<u32>) -> Self {
        self.max_dimension = max;
        self
    }

    /// Number of surfaces
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Number of viewports currently assigned
    pub fn assigned_count(&self) -> usize {
        self.order.len()
    }

    pub fn acquire_surface(&mut self, index: usize) -> Result<&mut PooledSurface> {
        self.surfaces.get_mut(index).ok_or_else(|| {
            RenderError::ResourceUnavailable(format!("surface {index} is not in the pool"))
        })
    }

    pub fn surface(&self, index: usize) -> Option<&PooledSurface> {
        self.surfaces.get(index)
    }

    pub fn assignment(&self, id: &ViewportId) -> Result<&SurfaceAssignment> {
        self.assignments
            .get(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))
    }

    /// Viewports hosted by surface `index`, in assignment order
    pub fn viewports_on(&self, index: usize) -> Vec<ViewportId> {
        self.order
            .iter()
            .filter(|id| {
                self.assignments
                    .get(*id)
                    .is_some_and(|a| a.surface_index == index)
            })
            .cloned()
            .collect()
    }

    /// Bind a viewport to a surface with an empty footprint.
    pub fn assign(&mut self, id: ViewportId, surface_index: usize, background: Color) -> Result<()> {
        if self.assignments.contains_key(&id) {
            return Err(RenderError::Configuration(format!(
                "viewport {id} is already assigned"
            )));
        }
        let pooled = self.acquire_surface(surface_index)?;
        if pooled.surface.renderer(id.as_str()).is_some() {
            return Err(RenderError::Configuration(format!(
                "surface {surface_index} already hosts a renderer named {id}"
            )));
        }
        pooled.surface.add_renderer(id.as_str(), background)?;

        debug!("Assigned {} to surface {}", id, surface_index);
        self.assignments.insert(
            id.clone(),
            SurfaceAssignment {
                surface_index,
                requested_width: 0,
                requested_height: 0,
                background,
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Record a viewport's requested size and refit its surface.
    ///
    /// Returns true when the surface footprint changed; in that case the
    /// surface has been resized and every hosted renderer re-added with a
    /// fresh rectangle.
    pub fn update_footprint(&mut self, id: &ViewportId, width: u32, height: u32) -> Result<bool> {
        if let Some(max) = self.max_dimension {
            if width > max || height > max {
                return Err(RenderError::ResourceUnavailable(format!(
                    "{width}x{height} footprint for {id} exceeds the {max}px surface limit"
                )));
            }
        }
        let assignment = self
            .assignments
            .get_mut(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))?;
        assignment.requested_width = width;
        assignment.requested_height = height;
        let index = assignment.surface_index;

        let changed = self.refit(index)?;
        if !changed {
            self.apply_rect(id)?;
        }
        Ok(changed)
    }

    /// Normalized rectangle of a viewport within its surface
    pub fn rect_for(&self, id: &ViewportId) -> Result<[f64; 4]> {
        let assignment = self.assignment(id)?;
        let pooled = self
            .surfaces
            .get(assignment.surface_index)
            .ok_or_else(|| RenderError::Lookup(id.clone()))?;
        Ok(normalized_rect(assignment.requested_size(), pooled.max_size()))
    }

    /// Unbind a viewport. The surface shrinks to the remaining footprint.
    pub fn release(&mut self, id: &ViewportId) -> Result<()> {
        let assignment = self
            .assignments
            .remove(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))?;
        self.order.retain(|other| other != id);

        if let Some(pooled) = self.surfaces.get_mut(assignment.surface_index) {
            pooled.surface.remove_renderer(id.as_str());
        }
        self.refit(assignment.surface_index)?;

        debug!("Released {} from surface {}", id, assignment.surface_index);
        Ok(())
    }

    /// Host an auxiliary renderer on surface `index`.
    ///
    /// Overlays stay undrawn: a draw token only enables its own viewport.
    pub fn add_overlay(&mut self, index: usize, id: &str, background: Color) -> Result<()> {
        if self.assignments.keys().any(|vp| vp.as_str() == id) {
            return Err(RenderError::Configuration(format!(
                "overlay {id} clashes with a viewport"
            )));
        }
        let pooled = self.acquire_surface(index)?;
        pooled.surface.add_renderer(id, background)?;
        debug!("Added overlay {} to surface {}", id, index);
        Ok(())
    }

    /// Remove an overlay; returns false if surface `index` had none by that
    /// name. Viewport renderers are released through [`Self::release`].
    pub fn remove_overlay(&mut self, index: usize, id: &str) -> Result<bool> {
        if self.assignments.keys().any(|vp| vp.as_str() == id) {
            return Err(RenderError::Configuration(format!(
                "{id} is a viewport, not an overlay"
            )));
        }
        Ok(self.acquire_surface(index)?.surface.remove_renderer(id))
    }

    /// Take the exclusive draw token for one viewport.
    ///
    /// While the token lives only that viewport's renderer draws; every
    /// flag is cleared again when it drops.
    pub fn isolate(&mut self, id: &ViewportId) -> Result<DrawToken<'_>> {
        let index = self.assignment(id)?.surface_index;
        let pooled = self.acquire_surface(index)?;

        for rid in pooled.surface.renderer_ids() {
            if let Some(renderer) = pooled.surface.renderer_mut(&rid) {
                renderer.set_draw(rid == id.as_str());
            }
        }

        Ok(DrawToken { pooled })
    }

    /// Drop every surface and assignment.
    pub fn destroy(&mut self) {
        info!(
            "Destroying surface pool ({} surfaces, {} viewports)",
            self.surfaces.len(),
            self.order.len()
        );
        self.surfaces.clear();
        self.assignments.clear();
        self.order.clear();
    }

    /// Recompute a surface's footprint; resize and reset it on change.
    fn refit(&mut self, index: usize) -> Result<bool> {
        let (max_width, max_height) = self
            .assignments
            .values()
            .filter(|a| a.surface_index == index)
            .fold((0, 0), |(w, h), a| {
                (w.max(a.requested_width), h.max(a.requested_height))
            });

        let pooled = self.acquire_surface(index)?;
        if (max_width, max_height) == pooled.max_size() {
            return Ok(false);
        }

        pooled.max_width = max_width;
        pooled.max_height = max_height;
        if max_width > 0 && max_height > 0 {
            pooled.surface.resize(max_width, max_height)?;
        }
        debug!(
            "Surface {} footprint now {}x{}",
            index, max_width, max_height
        );

        self.reset_surface(index)?;
        Ok(true)
    }

    /// Clear a surface's viewport renderers and re-add them with rectangles
    /// recomputed against the current footprint.
    fn reset_surface(&mut self, index: usize) -> Result<()> {
        let hosted = self.viewports_on(index);
        let pooled = self
            .surfaces
            .get_mut(index)
            .ok_or_else(|| RenderError::ResourceUnavailable(format!("surface {index}")))?;
        let max = pooled.max_size();

        for id in &hosted {
            pooled.surface.remove_renderer(id.as_str());
        }
        for id in &hosted {
            let Some(assignment) = self.assignments.get(id) else {
                continue;
            };
            pooled
                .surface
                .add_renderer(id.as_str(), assignment.background)?;
            let [x0, y0, x1, y1] = normalized_rect(assignment.requested_size(), max);
            if let Some(renderer) = pooled.surface.renderer_mut(id.as_str()) {
                renderer.set_viewport(x0, y0, x1, y1);
            }
        }
        Ok(())
    }

    /// Push a viewport's current normalized rectangle to its renderer.
    pub fn apply_rect(&mut self, id: &ViewportId) -> Result<[f64; 4]> {
        let rect = self.rect_for(id)?;
        let [x0, y0, x1, y1] = rect;
        let index = self.assignment(id)?.surface_index;
        let pooled = self.acquire_surface(index)?;
        if let Some(renderer) = pooled.surface.renderer_mut(id.as_str()) {
            renderer.set_viewport(x0, y0, x1, y1);
        }
        Ok(rect)
    }
}

/// Exclusive right to draw one viewport on its surface.
pub struct DrawToken<'a> {
    pooled: &'a mut PooledSurface,
}

impl DrawToken<'_> {
    /// Render the isolated viewport
    pub fn render(&mut self) -> Result<()> {
        self.pooled.surface.render()?;
        Ok(())
    }

    pub fn surface_index(&self) -> usize {
        self.pooled.index
    }
}

impl Drop for DrawToken<'_> {
    fn drop(&mut self) {
        for rid in self.pooled.surface.renderer_ids() {
            if let Some(renderer) = self.pooled.surface.renderer_mut(&rid) {
                renderer.set_draw(false);
            }
        }
    }
}
