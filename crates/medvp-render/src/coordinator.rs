//! Render/Resize Coordinator
//!
//! The per-viewport steps of a frame:
//!
//! 1. resize check: displayed size vs rendered size
//! 2. resize (footprint, camera preservation)
//! 3. draw: isolated pass on the shared surface, or the custom pipeline
//! 4. copy: size the on-screen canvas, then copy the sub-rectangle
//!
//! The canvas backing size changes only in step 4, after a successful draw,
//! so observers never see a resized canvas without matching content.

use crate::camera::Camera;
use crate::engine::{Pipeline, Viewport};
use crate::error::{RenderError, Result};
use crate::pool::SurfacePool;
use crate::viewport::ViewportStatus;
use tracing::{debug, trace};

/// Outcome of comparing displayed and rendered sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDecision {
    Unchanged,
    Resize { width: u32, height: u32 },
}

/// Decide whether a viewport needs a new render size.
///
/// Sizes below `min` are clamped up to it. A canvas with a zero dimension
/// is not laid out yet and keeps its current size.
pub fn check_resize(viewport: &Viewport, min: u32) -> ResizeDecision {
    let (dw, dh) = viewport.canvas.displayed_size();
    if dw == 0 || dh == 0 {
        return ResizeDecision::Unchanged;
    }
    let width = dw.max(min);
    let height = dh.max(min);
    if (width, height) == viewport.rendered_size {
        return ResizeDecision::Unchanged;
    }
    ResizeDecision::Resize { width, height }
}

/// Apply a new render size to a viewport.
///
/// Returns true if the shared surface had to be reset.
pub fn apply_resize(
    pool: &mut SurfacePool,
    viewport: &mut Viewport,
    width: u32,
    height: u32,
    keep_camera: bool,
) -> Result<bool> {
    let surface_reset = match viewport.pipeline {
        Pipeline::Gpu { .. } => pool.update_footprint(&viewport.id, width, height)?,
        Pipeline::Custom(_) => false,
    };

    debug!(
        "Resized {} from {}x{} to {}x{}",
        viewport.id, viewport.rendered_size.0, viewport.rendered_size.1, width, height
    );
    viewport.rendered_size = (width, height);

    let prior = viewport.camera;
    viewport.reset_camera_for_resize();
    if keep_camera {
        restore_camera(viewport, &prior);
    }
    Ok(surface_reset)
}

/// Re-apply a camera after a resize reset the view.
///
/// A display-area constraint already re-derived pan and zoom, so only the
/// orientation carries over; without one the prior camera is kept verbatim.
pub fn restore_camera(viewport: &mut Viewport, prior: &Camera) {
    viewport.camera = if viewport.display_area.is_some() {
        viewport.camera.with_orientation_of(prior)
    } else {
        *prior
    };
}

/// Reject sizes that cannot be drawn. The viewport stays dirty.
pub fn check_renderable(viewport: &Viewport, min: u32) -> Result<()> {
    let (dw, dh) = viewport.canvas.displayed_size();
    let (rw, rh) = viewport.rendered_size;
    if dw == 0 || dh == 0 || rw < min || rh < min {
        return Err(RenderError::Size {
            viewport: viewport.id.clone(),
            width: if dw == 0 || dh == 0 { dw } else { rw },
            height: if dw == 0 || dh == 0 { dh } else { rh },
            min,
        });
    }
    Ok(())
}

/// Draw a pooled viewport and copy the result to its canvas.
pub fn render_gpu(pool: &mut SurfacePool, viewport: &mut Viewport) -> Result<()> {
    let Pipeline::Gpu { surface_index } = viewport.pipeline else {
        return Err(RenderError::Configuration(format!(
            "viewport {} does not render through the surface pool",
            viewport.id
        )));
    };

    pool.apply_rect(&viewport.id)?;
    {
        let mut token = pool.isolate(&viewport.id)?;
        token.render()?;
    }

    let pooled = pool
        .surface(surface_index)
        .ok_or_else(|| RenderError::ResourceUnavailable(format!("surface {surface_index}")))?;
    let (width, height) = viewport.rendered_size;
    let (_, max_height) = pooled.max_size();
    // Renderers are anchored bottom-left; the readback is top row first.
    let src_y = max_height.saturating_sub(height);

    viewport.canvas.set_size(width, height);
    viewport
        .canvas
        .pixels_mut()
        .copy_region_from(pooled.surface().read_pixels(), 0, src_y, width, height, 0, 0);

    trace!(
        "Copied {}x{} from surface {} (y offset {}) to {}",
        width, height, surface_index, src_y, viewport.id
    );
    viewport.status = ViewportStatus::Rendered;
    Ok(())
}

/// Let a custom pipeline draw itself.
pub fn render_custom(viewport: &mut Viewport) -> Result<()> {
    let Pipeline::Custom(pipeline) = &mut viewport.pipeline else {
        return Err(RenderError::Configuration(format!(
            "viewport {} has no custom pipeline",
            viewport.id
        )));
    };
    pipeline.custom_render_viewport_to_canvas(&mut viewport.canvas, &viewport.camera)?;
    viewport.status = pipeline.status();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DisplayArea;
    use crate::canvas::Canvas;
    use crate::viewport::{ViewportId, ViewportOptions, ViewportType};

    fn viewport(client: (f64, f64), rendered: (u32, u32)) -> Viewport {
        Viewport {
            id: ViewportId::new("vp"),
            kind: ViewportType::Stack,
            canvas: Canvas::new("vp-canvas", client.0, client.1),
            options: ViewportOptions::default(),
            camera: Camera::default(),
            display_area: None,
            rendered_size: rendered,
            status: ViewportStatus::PreRender,
            pipeline: Pipeline::Gpu { surface_index: 0 },
        }
    }

    #[test]
    fn test_check_resize() {
        assert_eq!(check_resize(&viewport((10.0, 10.0), (10, 10)), 2), ResizeDecision::Unchanged);
        assert_eq!(
            check_resize(&viewport((12.0, 10.0), (10, 10)), 2),
            ResizeDecision::Resize { width: 12, height: 10 }
        );
        assert_eq!(
            check_resize(&viewport((1.0, 10.0), (10, 10)), 2),
            ResizeDecision::Resize { width: 2, height: 10 }
        );
        assert_eq!(check_resize(&viewport((1.0, 10.0), (2, 10)), 2), ResizeDecision::Unchanged);
        assert_eq!(check_resize(&viewport((0.0, 10.0), (10, 10)), 2), ResizeDecision::Unchanged);
    }

    #[test]
    fn test_check_renderable() {
        assert!(check_renderable(&viewport((10.0, 10.0), (10, 10)), 2).is_ok());

        let err = check_renderable(&viewport((0.0, 0.0), (0, 0)), 2).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, RenderError::Size { width: 0, height: 0, .. }));
    }

    #[test]
    fn test_restore_camera() {
        let prior = Camera {
            zoom: 4.0,
            rotation: 180.0,
            flip_vertical: true,
            ..Camera::default()
        };

        let mut plain = viewport((10.0, 10.0), (10, 10));
        restore_camera(&mut plain, &prior);
        assert_eq!(plain.camera, prior);

        let mut constrained = viewport((10.0, 10.0), (10, 10));
        constrained.display_area = Some(DisplayArea::default());
        constrained.reset_camera_for_resize();
        restore_camera(&mut constrained, &prior);
        assert_eq!(constrained.camera.zoom, 1.0);
        assert_eq!(constrained.camera.rotation, 180.0);
        assert!(constrained.camera.flip_vertical);
    }
}
