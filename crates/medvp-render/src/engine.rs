//! Rendering engine - owns the pool, the scheduler and every viewport.
//!
//! All state lives in one [`RenderingEngine`] value; there are no globals.
//! The engine is single-owner and not internally synchronized: a host with
//! several threads keeps it on one of them.

use crate::assignment::SurfaceAssigner;
use crate::camera::{Camera, DisplayArea};
use crate::canvas::Canvas;
use crate::color::Color;
use crate::config::EngineConfig;
use crate::coordinator::{self, ResizeDecision};
use crate::error::{RenderError, Result};
use crate::event::{EventBus, RenderEvent};
use crate::pool::SurfacePool;
use crate::scene::SceneBackend;
use crate::scheduler::{FrameHost, FrameScheduler, SchedulerState};
use crate::viewport::{
    CustomPipelineViewport, PipelineKind, ViewportId, ViewportInput, ViewportOptions,
    ViewportStatus, ViewportType,
};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Render path of an enabled viewport
pub(crate) enum Pipeline {
    Gpu { surface_index: usize },
    Custom(Box<dyn CustomPipelineViewport>),
}

/// An enabled viewport
pub struct Viewport {
    pub(crate) id: ViewportId,
    pub(crate) kind: ViewportType,
    pub(crate) canvas: Canvas,
    pub(crate) options: ViewportOptions,
    pub(crate) camera: Camera,
    pub(crate) display_area: Option<DisplayArea>,
    /// Size the viewport renders at (physical pixels)
    pub(crate) rendered_size: (u32, u32),
    pub(crate) status: ViewportStatus,
    pub(crate) pipeline: Pipeline,
}

impl Viewport {
    pub fn id(&self) -> &ViewportId {
        &self.id
    }

    pub fn kind(&self) -> ViewportType {
        self.kind
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Rendered width in physical pixels
    pub fn s_width(&self) -> u32 {
        self.rendered_size.0
    }

    /// Rendered height in physical pixels
    pub fn s_height(&self) -> u32 {
        self.rendered_size.1
    }

    pub fn default_options(&self) -> &ViewportOptions {
        &self.options
    }

    pub fn suppress_events(&self) -> bool {
        self.options.suppress_events
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn display_area(&self) -> Option<&DisplayArea> {
        self.display_area.as_ref()
    }

    pub fn status(&self) -> ViewportStatus {
        self.status
    }

    /// Surface index for pooled viewports
    pub fn surface_index(&self) -> Option<usize> {
        match self.pipeline {
            Pipeline::Gpu { surface_index } => Some(surface_index),
            Pipeline::Custom(_) => None,
        }
    }

    /// Restore the fitted camera for the current render size, then apply
    /// the display-area constraint if there is one.
    pub fn reset_camera_for_resize(&mut self) {
        let (w, h) = self.rendered_size;
        let aspect = if h == 0 { 0.0 } else { w as f64 / h as f64 };
        self.camera = Camera::fitted(aspect);
        if let Some(area) = self.display_area {
            area.apply(&mut self.camera, self.rendered_size);
        }
    }
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("rendered_size", &self.rendered_size)
            .field("status", &self.status)
            .field("surface", &self.surface_index())
            .finish()
    }
}

/// Engine counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    /// Frame passes run (host callbacks and flushes)
    pub frames: u64,
    /// Viewports rendered and copied
    pub renders: u64,
    /// Renders skipped for size
    pub skipped: u64,
    /// Renders failed fatally
    pub failed: u64,
    /// Viewport resizes applied
    pub resizes_applied: u64,
    /// Resize requests deferred behind an in-flight frame
    pub resizes_deferred: u64,
    /// Shared surfaces reset after a footprint change
    pub surface_resets: u64,
}

/// What happened during one frame pass
#[derive(Debug, Default)]
pub struct FrameReport {
    pub rendered: Vec<ViewportId>,
    /// Skipped for size; still dirty
    pub skipped: Vec<ViewportId>,
    pub failed: Vec<(ViewportId, RenderError)>,
}

impl FrameReport {
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }

    /// First fatal failure, if any
    pub fn into_result(self) -> Result<Vec<ViewportId>> {
        match self.failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(self.rendered),
        }
    }
}

/// Result of a resize request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// A frame is in flight; the resize runs at the start of the next pass
    Deferred,
    /// Applied now; these viewports changed size
    Applied(Vec<ViewportId>),
}

/// The rendering engine
pub struct RenderingEngine {
    id: String,
    config: EngineConfig,
    pool: SurfacePool,
    assigner: SurfaceAssigner,
    scheduler: FrameScheduler,
    viewports: HashMap<ViewportId, Viewport>,
    events: EventBus,
    stats: EngineStats,
    /// Deferred resize, holding its keep-camera flag
    pending_resize: Option<bool>,
    destroyed: bool,
}

impl RenderingEngine {
    /// Create an engine with a pool of surfaces from `backend`.
    pub fn new(
        id: impl Into<String>,
        config: EngineConfig,
        backend: &mut dyn SceneBackend,
        host: Box<dyn FrameHost>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RenderError::Configuration(e.to_string()))?;

        let id = id.into();
        info!(
            "Creating rendering engine '{}' ({} surfaces, gpu: {})",
            id, config.surface_pool_size, config.gpu_available
        );

        let pool = SurfacePool::new(backend, config.surface_pool_size)?
            .with_max_dimension(config.max_surface_size);
        Ok(Self {
            id,
            assigner: SurfaceAssigner::new(config.surface_pool_size),
            config,
            pool,
            scheduler: FrameScheduler::new(host),
            viewports: HashMap::new(),
            events: EventBus::new(),
            stats: EngineStats::default(),
            pending_resize: None,
            destroyed: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    /// Host an auxiliary renderer on pool surface `index`.
    pub fn add_overlay(&mut self, index: usize, id: &str, background: Color) -> Result<()> {
        self.pool.add_overlay(index, id, background)
    }

    pub fn remove_overlay(&mut self, index: usize, id: &str) -> Result<bool> {
        self.pool.remove_overlay(index, id)
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_dirty(&self, id: &ViewportId) -> bool {
        self.scheduler.is_dirty(id)
    }

    /// Viewports waiting for the next frame, in marking order
    pub fn dirty_viewports(&self) -> &[ViewportId] {
        self.scheduler.dirty()
    }

    /// Receive a [`RenderEvent`] after every successful render.
    pub fn subscribe(&mut self) -> Receiver<RenderEvent> {
        self.events.subscribe()
    }

    /// Enable a GPU-driven viewport.
    ///
    /// Fails with a configuration error for custom-pipeline kinds (use
    /// [`enable_custom_viewport`](Self::enable_custom_viewport)) and leaves
    /// the pool untouched.
    pub fn enable_viewport(&mut self, input: ViewportInput) -> Result<()> {
        self.enable(input, None)
    }

    /// Enable a viewport that draws through its own pipeline.
    pub fn enable_custom_viewport(
        &mut self,
        input: ViewportInput,
        pipeline: Box<dyn CustomPipelineViewport>,
    ) -> Result<()> {
        self.enable(input, Some(pipeline))
    }

    fn enable(
        &mut self,
        input: ViewportInput,
        custom: Option<Box<dyn CustomPipelineViewport>>,
    ) -> Result<()> {
        self.ensure_alive()?;
        let ViewportInput {
            id,
            kind,
            mut canvas,
            default_options,
        } = input;

        if self.viewports.contains_key(&id) {
            return Err(RenderError::Configuration(format!(
                "viewport {id} is already enabled"
            )));
        }

        let kind_pipeline = kind.pipeline();
        let pipeline = match (kind_pipeline, custom) {
            (PipelineKind::CustomPipeline, Some(custom)) => Pipeline::Custom(custom),
            (PipelineKind::CustomPipeline, None) => {
                return Err(RenderError::Configuration(format!(
                    "{kind} viewports need a custom pipeline"
                )));
            }
            (_, Some(_)) => {
                return Err(RenderError::Configuration(format!(
                    "{kind} viewports render through the surface pool"
                )));
            }
            (gpu, None) => {
                let surface_index = self
                    .assigner
                    .surface_for(gpu, self.pool.assigned_count())
                    .ok_or_else(|| {
                        RenderError::Configuration(format!("no surface policy for {kind}"))
                    })?;
                Pipeline::Gpu { surface_index }
            }
        };

        canvas.set_device_pixel_ratio(self.config.device_pixel_ratio);
        let rendered_size = match canvas.displayed_size() {
            (w, h) if w > 0 && h > 0 => {
                let min = self.config.min_viewport_size;
                (w.max(min), h.max(min))
            }
            size => size,
        };

        if let Pipeline::Gpu { surface_index } = pipeline {
            let background = default_options.background.unwrap_or(self.config.background);
            self.pool.assign(id.clone(), surface_index, background)?;
            if rendered_size.0 > 0 && rendered_size.1 > 0 {
                match self
                    .pool
                    .update_footprint(&id, rendered_size.0, rendered_size.1)
                {
                    Ok(true) => self.stats.surface_resets += 1,
                    Ok(false) => {}
                    Err(err) => {
                        let _ = self.pool.release(&id);
                        return Err(err);
                    }
                }
            }
        }

        let mut viewport = Viewport {
            id: id.clone(),
            kind,
            canvas,
            options: default_options,
            camera: Camera::default(),
            display_area: None,
            rendered_size,
            status: ViewportStatus::PreRender,
            pipeline,
        };
        viewport.reset_camera_for_resize();
        if let Pipeline::Custom(custom) = &viewport.pipeline {
            viewport.status = custom.status();
        }

        info!(
            "Enabled {} viewport {} ({}x{}, surface {:?})",
            kind,
            id,
            rendered_size.0,
            rendered_size.1,
            viewport.surface_index()
        );
        self.viewports.insert(id.clone(), viewport);
        self.scheduler.mark_dirty(&id);
        Ok(())
    }

    /// Disable a viewport and release its surface assignment.
    pub fn disable_viewport(&mut self, id: &ViewportId) -> Result<()> {
        let viewport = self
            .viewports
            .remove(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))?;
        if let Pipeline::Gpu { .. } = viewport.pipeline {
            self.pool.release(id)?;
        }
        self.scheduler.clear(id);
        info!("Disabled viewport {}", id);
        Ok(())
    }

    pub fn viewport(&self, id: &ViewportId) -> Result<&Viewport> {
        self.viewports
            .get(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))
    }

    /// All enabled viewport ids, sorted
    pub fn viewport_ids(&self) -> Vec<ViewportId> {
        let mut ids: Vec<_> = self.viewports.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Canvas of a viewport, for host layout changes.
    pub fn canvas_mut(&mut self, id: &ViewportId) -> Result<&mut Canvas> {
        Ok(&mut self.viewport_mut(id)?.canvas)
    }

    pub fn surface_for(&self, id: &ViewportId) -> Result<Option<usize>> {
        Ok(self.viewport(id)?.surface_index())
    }

    pub fn camera(&self, id: &ViewportId) -> Result<Camera> {
        Ok(self.viewport(id)?.camera)
    }

    pub fn set_camera(&mut self, id: &ViewportId, camera: Camera) -> Result<()> {
        self.viewport_mut(id)?.camera = camera;
        self.scheduler.mark_dirty(id);
        Ok(())
    }

    /// Set or clear the display-area constraint and re-derive the camera.
    pub fn set_display_area(&mut self, id: &ViewportId, area: Option<DisplayArea>) -> Result<()> {
        let viewport = self.viewport_mut(id)?;
        viewport.display_area = area;
        if let Some(area) = area {
            area.apply(&mut viewport.camera, viewport.rendered_size);
        }
        self.scheduler.mark_dirty(id);
        Ok(())
    }

    /// Content status changes from the data layer
    pub fn set_status(&mut self, id: &ViewportId, status: ViewportStatus) -> Result<()> {
        self.viewport_mut(id)?.status = status;
        Ok(())
    }

    /// Schedule one viewport for the next frame.
    pub fn render_viewport(&mut self, id: &ViewportId) -> Result<()> {
        self.ensure_alive()?;
        if !self.viewports.contains_key(id) {
            return Err(RenderError::Lookup(id.clone()));
        }
        self.scheduler.mark_dirty(id);
        Ok(())
    }

    /// Schedule several viewports; unknown ids fail before anything is marked.
    pub fn render_viewports(&mut self, ids: &[ViewportId]) -> Result<()> {
        self.ensure_alive()?;
        if let Some(missing) = ids.iter().find(|id| !self.viewports.contains_key(*id)) {
            return Err(RenderError::Lookup(missing.clone()));
        }
        for id in ids {
            self.scheduler.mark_dirty(id);
        }
        Ok(())
    }

    /// Schedule every enabled viewport.
    pub fn render(&mut self) -> Result<()> {
        let ids = self.viewport_ids();
        self.render_viewports(&ids)
    }

    /// Run a custom pipeline's own API, downcast to its concrete type.
    ///
    /// If the pipeline asks for a re-render during `f` the viewport is
    /// marked dirty.
    pub fn modify_custom<T, R>(&mut self, id: &ViewportId, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: CustomPipelineViewport,
    {
        let viewport = self.viewport_mut(id)?;
        let Pipeline::Custom(custom) = &mut viewport.pipeline else {
            return Err(RenderError::Configuration(format!(
                "viewport {id} has no custom pipeline"
            )));
        };
        let typed = custom.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
            RenderError::Configuration(format!(
                "viewport {id} is not a {}",
                std::any::type_name::<T>()
            ))
        })?;

        let out = f(typed);
        let requested = custom.take_render_request();
        viewport.status = custom.status();
        if requested {
            self.scheduler.mark_dirty(id);
        }
        Ok(out)
    }

    /// Read-only access to a custom pipeline
    pub fn custom<T: CustomPipelineViewport>(&self, id: &ViewportId) -> Result<&T> {
        let typed = match &self.viewport(id)?.pipeline {
            Pipeline::Custom(custom) => custom.as_any().downcast_ref::<T>(),
            Pipeline::Gpu { .. } => None,
        };
        typed.ok_or_else(|| {
            RenderError::Configuration(format!(
                "viewport {id} is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Re-check every viewport's size against its canvas.
    ///
    /// While a frame is in flight the resize is deferred to the start of
    /// the next pass and uses the sizes current at that time. With
    /// `immediate` an applied resize is flushed right away.
    pub fn resize(&mut self, immediate: bool, keep_camera: bool) -> Result<ResizeOutcome> {
        self.ensure_alive()?;
        if self.scheduler.frame_in_flight() {
            if self.pending_resize.is_none() {
                debug!("Frame in flight; deferring resize");
            }
            self.pending_resize = Some(keep_camera);
            self.stats.resizes_deferred += 1;
            return Ok(ResizeOutcome::Deferred);
        }

        let ids = self.viewport_ids();
        let resized = self.resize_viewports(&ids, keep_camera, true)?;
        if immediate && !resized.is_empty() {
            self.flush().into_result()?;
        }
        Ok(ResizeOutcome::Applied(resized))
    }

    /// Host frame callback: render everything marked dirty.
    pub fn on_frame(&mut self) -> FrameReport {
        self.run_pass()
    }

    /// Render dirty viewports now, cancelling any pending frame callback.
    pub fn flush(&mut self) -> FrameReport {
        self.scheduler.cancel();
        self.run_pass()
    }

    /// Release every viewport and surface. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        info!("Destroying rendering engine '{}'", self.id);
        self.scheduler.reset();
        self.viewports.clear();
        self.pool.destroy();
        self.pending_resize = None;
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(RenderError::ResourceUnavailable(format!(
                "rendering engine '{}' has been destroyed",
                self.id
            )));
        }
        Ok(())
    }

    fn viewport_mut(&mut self, id: &ViewportId) -> Result<&mut Viewport> {
        self.viewports
            .get_mut(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))
    }

    /// Collect resize decisions for `ids`, then apply them.
    ///
    /// With `mark` the resized viewports are scheduled for the next frame.
    fn resize_viewports(
        &mut self,
        ids: &[ViewportId],
        keep_camera: bool,
        mark: bool,
    ) -> Result<Vec<ViewportId>> {
        let min = self.config.min_viewport_size;
        let decisions: Vec<(ViewportId, u32, u32)> = ids
            .iter()
            .filter_map(|id| {
                let viewport = self.viewports.get(id)?;
                match coordinator::check_resize(viewport, min) {
                    ResizeDecision::Unchanged => None,
                    ResizeDecision::Resize { width, height } => Some((id.clone(), width, height)),
                }
            })
            .collect();

        let mut resized = Vec::with_capacity(decisions.len());
        for (id, width, height) in decisions {
            let Some(viewport) = self.viewports.get_mut(&id) else {
                continue;
            };
            if coordinator::apply_resize(&mut self.pool, viewport, width, height, keep_camera)? {
                self.stats.surface_resets += 1;
            }
            self.stats.resizes_applied += 1;
            if mark {
                self.scheduler.mark_dirty(&id);
            }
            resized.push(id);
        }
        Ok(resized)
    }

    fn run_pass(&mut self) -> FrameReport {
        let mut report = FrameReport::default();
        if self.destroyed {
            return report;
        }
        self.stats.frames += 1;

        let mut batch = self.scheduler.begin_frame();

        // Resize strictly before drawing
        if let Some(keep_camera) = self.pending_resize.take() {
            let ids = self.viewport_ids();
            match self.resize_viewports(&ids, keep_camera, false) {
                Ok(resized) => {
                    for id in resized {
                        if !batch.contains(&id) {
                            batch.push(id);
                        }
                    }
                }
                Err(err) => warn!("Deferred resize failed: {}", err),
            }
        }

        if batch.is_empty() {
            self.scheduler.end_frame();
            return report;
        }
        debug!("Frame {}: {} viewports", self.stats.frames, batch.len());

        if let Err(err) = self.resize_viewports(&batch, true, false) {
            warn!("Resize check failed: {}", err);
        }

        for id in batch {
            match self.render_one(&id) {
                Ok(()) => {
                    self.scheduler.clear(&id);
                    self.stats.renders += 1;
                    self.notify(&id);
                    report.rendered.push(id);
                }
                Err(err) if !err.is_fatal() => {
                    warn!("Skipping render: {}", err);
                    self.scheduler.keep_dirty(&id);
                    self.stats.skipped += 1;
                    report.skipped.push(id);
                }
                Err(err) => {
                    warn!("Render of {} failed: {}", id, err);
                    self.scheduler.clear(&id);
                    self.stats.failed += 1;
                    report.failed.push((id, err));
                }
            }
        }

        self.scheduler.end_frame();
        report
    }

    fn render_one(&mut self, id: &ViewportId) -> Result<()> {
        let min = self.config.min_viewport_size;
        let gpu_available = self.config.gpu_available;
        let viewport = self
            .viewports
            .get_mut(id)
            .ok_or_else(|| RenderError::Lookup(id.clone()))?;

        match viewport.pipeline {
            Pipeline::Gpu { .. } => {
                if !gpu_available {
                    return Err(RenderError::ResourceUnavailable(format!(
                        "{} viewport {} needs a GPU pipeline",
                        viewport.kind, viewport.id
                    )));
                }
                coordinator::check_renderable(viewport, min)?;
                coordinator::render_gpu(&mut self.pool, viewport)
            }
            Pipeline::Custom(_) => {
                coordinator::check_renderable(viewport, min)?;
                coordinator::render_custom(viewport)
            }
        }
    }

    fn notify(&mut self, id: &ViewportId) {
        let Some(viewport) = self.viewports.get(id) else {
            return;
        };
        if viewport.options.suppress_events {
            return;
        }
        self.events.emit(RenderEvent::ImageRendered {
            element: viewport.canvas.element().to_string(),
            viewport_id: id.clone(),
            rendering_engine_id: self.id.clone(),
            viewport_status: viewport.status,
        });
    }
}

impl Drop for RenderingEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for RenderingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingEngine")
            .field("id", &self.id)
            .field("viewports", &self.viewports.len())
            .field("scheduler", &self.scheduler)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::headless::HeadlessBackend;
    use crate::scheduler::RecordingFrameHost;
    use std::any::Any;

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    fn engine(config: EngineConfig) -> (RenderingEngine, RecordingFrameHost) {
        let host = RecordingFrameHost::new();
        let mut backend = HeadlessBackend::new();
        let engine =
            RenderingEngine::new("engine", config, &mut backend, Box::new(host.clone())).unwrap();
        (engine, host)
    }

    fn pool_of(size: usize) -> EngineConfig {
        EngineConfig {
            surface_pool_size: size,
            ..EngineConfig::default()
        }
    }

    fn stack(id: &str, width: f64, height: f64) -> ViewportInput {
        ViewportInput::new(id, ViewportType::Stack, Canvas::new(format!("{id}-canvas"), width, height))
    }

    /// Fills its canvas with one color
    struct FillPipeline {
        color: Color,
        fail: bool,
        dirty: bool,
    }

    impl FillPipeline {
        fn new(color: Color) -> Self {
            Self {
                color,
                fail: false,
                dirty: false,
            }
        }
    }

    impl CustomPipelineViewport for FillPipeline {
        fn custom_render_viewport_to_canvas(
            &mut self,
            canvas: &mut Canvas,
            _camera: &Camera,
        ) -> Result<()> {
            if self.fail {
                return Err(RenderError::DataSource("no samples".into()));
            }
            let (w, h) = canvas.displayed_size();
            canvas.set_size(w, h);
            canvas.pixels_mut().fill(self.color);
            Ok(())
        }

        fn status(&self) -> ViewportStatus {
            ViewportStatus::Rendered
        }

        fn take_render_request(&mut self) -> bool {
            std::mem::take(&mut self.dirty)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_round_robin_assignment() {
        let (mut engine, _) = engine(pool_of(2));
        for id in ["a", "b", "c"] {
            engine.enable_viewport(stack(id, 10.0, 10.0)).unwrap();
        }

        assert_eq!(engine.surface_for(&"a".into()).unwrap(), Some(0));
        assert_eq!(engine.surface_for(&"b".into()).unwrap(), Some(1));
        assert_eq!(engine.surface_for(&"c".into()).unwrap(), Some(0));
    }

    #[test]
    fn test_pinned_and_custom_assignment() {
        let (mut engine, _) = engine(pool_of(3));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        engine
            .enable_viewport(ViewportInput::new(
                "vol",
                ViewportType::Volume3d,
                Canvas::new("vol-canvas", 10.0, 10.0),
            ))
            .unwrap();
        engine
            .enable_custom_viewport(
                ViewportInput::new("ecg", ViewportType::Ecg, Canvas::new("ecg-canvas", 10.0, 10.0)),
                Box::new(FillPipeline::new(RED)),
            )
            .unwrap();

        assert_eq!(engine.surface_for(&"vol".into()).unwrap(), Some(0));
        assert_eq!(engine.surface_for(&"ecg".into()).unwrap(), None);
        assert_eq!(engine.pool().assigned_count(), 2);
    }

    #[test]
    fn test_unsupported_kind_leaves_pool_untouched() {
        let (mut engine, host) = engine(pool_of(2));
        let input = ViewportInput::new("ecg", ViewportType::Ecg, Canvas::new("c", 10.0, 10.0));

        let err = engine.enable_viewport(input).unwrap_err();
        assert!(matches!(err, RenderError::Configuration(_)));
        assert_eq!(engine.pool().assigned_count(), 0);
        assert!(engine.viewport_ids().is_empty());
        assert_eq!(host.requests(), 0);

        let err = "hologram".parse::<ViewportType>().unwrap_err();
        assert!(matches!(err, RenderError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_viewport_rejected() {
        let (mut engine, _) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        let err = engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap_err();
        assert!(matches!(err, RenderError::Configuration(_)));
        assert_eq!(engine.pool().assigned_count(), 1);
    }

    #[test]
    fn test_many_marks_one_frame() {
        let host = RecordingFrameHost::new();
        let mut backend = HeadlessBackend::new();
        let draws = backend.stats();
        let mut engine =
            RenderingEngine::new("engine", pool_of(2), &mut backend, Box::new(host.clone()))
                .unwrap();
        for id in ["a", "b", "c"] {
            engine.enable_viewport(stack(id, 10.0, 10.0)).unwrap();
        }
        engine.on_frame();
        let requests = host.requests();

        engine.render_viewport(&"c".into()).unwrap();
        engine.render_viewport(&"a".into()).unwrap();
        engine.render().unwrap();
        engine.render_viewport(&"c".into()).unwrap();
        assert_eq!(host.requests(), requests + 1);
        assert_eq!(engine.scheduler_state(), SchedulerState::FramePending);

        let report = engine.on_frame();
        let order: Vec<ViewportId> = ["c", "a", "b"].into_iter().map(ViewportId::new).collect();
        assert_eq!(report.rendered, order);
        assert_eq!(
            draws.draws()[3..],
            [(0, "c".to_string()), (0, "a".to_string()), (1, "b".to_string())]
        );
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
        assert!(engine.dirty_viewports().is_empty());
        assert_eq!(host.requests(), requests + 1);
        assert_eq!(engine.stats().renders, 6);
    }

    #[test]
    fn test_render_unknown_viewport() {
        let (mut engine, host) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        engine.flush();

        let err = engine
            .render_viewports(&["a".into(), "missing".into()])
            .unwrap_err();
        assert_eq!(err, RenderError::Lookup("missing".into()));
        assert!(engine.dirty_viewports().is_empty());
        assert_eq!(host.requests(), 1);
    }

    #[test]
    fn test_zero_size_canvas_is_skipped() {
        let (mut engine, _) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 0.0, 0.0)).unwrap();

        let report = engine.on_frame();
        assert!(report.rendered.is_empty());
        assert_eq!(report.skipped, vec![ViewportId::new("a")]);
        assert!(engine.is_dirty(&"a".into()));
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);

        // Once laid out it renders on the next frame
        engine.canvas_mut(&"a".into()).unwrap().set_client_size(8.0, 4.0);
        engine.render_viewport(&"a".into()).unwrap();
        let report = engine.on_frame();
        assert_eq!(report.rendered, vec![ViewportId::new("a")]);
        assert_eq!(engine.viewport(&"a".into()).unwrap().canvas().size(), (8, 4));
    }

    #[test]
    fn test_size_clamped_to_minimum() {
        let host = RecordingFrameHost::new();
        let mut backend = HeadlessBackend::new();
        let stats = backend.stats();
        let mut engine =
            RenderingEngine::new("engine", pool_of(1), &mut backend, Box::new(host)).unwrap();
        engine.enable_viewport(stack("a", 1.0, 10.0)).unwrap();
        assert_eq!(engine.pool().surface(0).unwrap().max_size(), (2, 10));
        assert_eq!(stats.resizes(), 1);

        let report = engine.on_frame();
        assert_eq!(report.rendered, vec![ViewportId::new("a")]);
        let viewport = engine.viewport(&"a".into()).unwrap();
        assert_eq!((viewport.s_width(), viewport.s_height()), (2, 10));
        assert_eq!(viewport.canvas().size(), (2, 10));
        // The clamp happened at enable; the frame did not resize again
        assert_eq!(stats.resizes(), 1);
        assert_eq!(engine.stats().resizes_applied, 0);
    }

    #[test]
    fn test_surface_size_limit() {
        let (mut engine, _) = engine(EngineConfig {
            max_surface_size: Some(32),
            ..pool_of(1)
        });
        assert!(matches!(
            engine.enable_viewport(stack("big", 40.0, 10.0)),
            Err(RenderError::ResourceUnavailable(_))
        ));
        assert!(engine.viewport(&"big".into()).is_err());
        assert_eq!(engine.pool().assigned_count(), 0);

        engine.enable_viewport(stack("a", 32.0, 32.0)).unwrap();
        engine.on_frame();
        engine.canvas_mut(&"a".into()).unwrap().set_client_size(48.0, 32.0);
        assert!(matches!(
            engine.resize(false, true),
            Err(RenderError::ResourceUnavailable(_))
        ));
        let viewport = engine.viewport(&"a".into()).unwrap();
        assert_eq!((viewport.s_width(), viewport.s_height()), (32, 32));
        assert_eq!(engine.pool().surface(0).unwrap().max_size(), (32, 32));
    }

    #[test]
    fn test_resize_deferred_while_frame_pending() {
        let (mut engine, _) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        assert!(engine.scheduler.frame_in_flight());

        engine.canvas_mut(&"a".into()).unwrap().set_client_size(20.0, 10.0);
        assert_eq!(engine.resize(false, true).unwrap(), ResizeOutcome::Deferred);
        engine.canvas_mut(&"a".into()).unwrap().set_client_size(30.0, 12.0);
        assert_eq!(engine.resize(false, true).unwrap(), ResizeOutcome::Deferred);
        assert_eq!(engine.viewport(&"a".into()).unwrap().s_width(), 10);

        let report = engine.on_frame();
        assert_eq!(report.rendered, vec![ViewportId::new("a")]);
        let viewport = engine.viewport(&"a".into()).unwrap();
        assert_eq!((viewport.s_width(), viewport.s_height()), (30, 12));
        assert_eq!(engine.stats().resizes_applied, 1);
        assert_eq!(engine.stats().resizes_deferred, 2);
    }

    #[test]
    fn test_immediate_resize_renders() {
        let (mut engine, host) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        engine.on_frame();

        engine.canvas_mut(&"a".into()).unwrap().set_client_size(16.0, 8.0);
        let outcome = engine.resize(true, false).unwrap();
        assert_eq!(outcome, ResizeOutcome::Applied(vec![ViewportId::new("a")]));
        assert_eq!(engine.viewport(&"a".into()).unwrap().canvas().size(), (16, 8));
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
        assert_eq!(host.cancels(), 1);

        // Nothing changed: nothing to do
        assert_eq!(engine.resize(true, false).unwrap(), ResizeOutcome::Applied(vec![]));
    }

    #[test]
    fn test_resize_keeps_camera() {
        let (mut engine, _) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        engine.on_frame();

        let mut camera = engine.camera(&"a".into()).unwrap();
        camera.zoom = 3.0;
        camera.rotation = 90.0;
        engine.set_camera(&"a".into(), camera).unwrap();
        engine.on_frame();

        engine.canvas_mut(&"a".into()).unwrap().set_client_size(20.0, 10.0);
        engine.resize(true, true).unwrap();
        assert_eq!(engine.camera(&"a".into()).unwrap(), camera);

        engine.canvas_mut(&"a".into()).unwrap().set_client_size(30.0, 10.0);
        engine.resize(true, false).unwrap();
        let reset = engine.camera(&"a".into()).unwrap();
        assert_eq!(reset.zoom, 1.0);
        assert_eq!(reset.rotation, 0.0);
    }

    #[test]
    fn test_display_area_survives_resize() {
        let (mut engine, _) = engine(pool_of(1));
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();
        engine
            .set_display_area(
                &"a".into(),
                Some(DisplayArea {
                    image_area: 0.5,
                    pan_fraction: glam::DVec2::new(0.1, 0.0),
                }),
            )
            .unwrap();
        let mut camera = engine.camera(&"a".into()).unwrap();
        camera.flip_horizontal = true;
        camera.zoom = 7.0;
        engine.set_camera(&"a".into(), camera).unwrap();
        engine.on_frame();

        engine.canvas_mut(&"a".into()).unwrap().set_client_size(40.0, 10.0);
        engine.resize(true, true).unwrap();
        let camera = engine.camera(&"a".into()).unwrap();
        assert_eq!(camera.zoom, 2.0);
        assert!((camera.pan.x - 4.0).abs() < 1e-9);
        assert!(camera.flip_horizontal);
    }

    #[test]
    fn test_copy_takes_bottom_anchored_region() {
        let (mut engine, _) = engine(pool_of(1));
        let tall = stack("tall", 4.0, 6.0).with_options(ViewportOptions {
            background: Some(RED),
            suppress_events: false,
        });
        let short = stack("short", 4.0, 2.0).with_options(ViewportOptions {
            background: Some(BLUE),
            suppress_events: false,
        });
        engine.enable_viewport(tall).unwrap();
        engine.enable_viewport(short).unwrap();
        assert_eq!(engine.pool().surface(0).unwrap().max_size(), (4, 6));

        let report = engine.on_frame();
        assert_eq!(report.rendered.len(), 2);

        let short = engine.viewport(&"short".into()).unwrap().canvas().pixels();
        assert_eq!((short.width(), short.height()), (4, 2));
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(short.get(x, y), Some(BLUE.to_rgba8()));
            }
        }
        let tall = engine.viewport(&"tall".into()).unwrap().canvas().pixels();
        assert_eq!(tall.get(0, 0), Some(RED.to_rgba8()));
        assert_eq!(tall.get(3, 5), Some(RED.to_rgba8()));
    }

    #[test]
    fn test_canvas_resized_only_after_draw() {
        let config = EngineConfig {
            gpu_available: false,
            ..pool_of(1)
        };
        let (mut engine, _) = engine(config);
        engine.enable_viewport(stack("a", 10.0, 10.0)).unwrap();

        let report = engine.on_frame();
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, RenderError::ResourceUnavailable(_)));
        assert_eq!(engine.viewport(&"a".into()).unwrap().canvas().size(), (0, 0));
        assert!(!engine.is_dirty(&"a".into()));
        assert_eq!(engine.stats().failed, 1);
    }

    #[test]
    fn test_custom_pipeline_without_gpu() {
        let config = EngineConfig {
            gpu_available: false,
            ..pool_of(1)
        };
        let (mut engine, _) = engine(config);
        engine
            .enable_custom_viewport(
                ViewportInput::new("ecg", ViewportType::Ecg, Canvas::new("c", 5.0, 3.0)),
                Box::new(FillPipeline::new(RED)),
            )
            .unwrap();

        let rendered = engine.flush().into_result().unwrap();
        assert_eq!(rendered, vec![ViewportId::new("ecg")]);
        let canvas = engine.viewport(&"ecg".into()).unwrap().canvas();
        assert_eq!(canvas.size(), (5, 3));
        assert_eq!(canvas.pixels().get(4, 2), Some(RED.to_rgba8()));
    }

    #[test]
    fn test_custom_failure_reported() {
        let (mut engine, _) = engine(pool_of(1));
        let mut pipeline = FillPipeline::new(RED);
        pipeline.fail = true;
        engine
            .enable_custom_viewport(
                ViewportInput::new("ecg", ViewportType::Ecg, Canvas::new("c", 5.0, 3.0)),
                Box::new(pipeline),
            )
            .unwrap();

        let err = engine.flush().into_result().unwrap_err();
        assert!(matches!(err, RenderError::DataSource(_)));
    }

    #[test]
    fn test_modify_custom_requests_render() {
        let (mut engine, host) = engine(pool_of(1));
        engine
            .enable_custom_viewport(
                ViewportInput::new("ecg", ViewportType::Ecg, Canvas::new("c", 5.0, 3.0)),
                Box::new(FillPipeline::new(RED)),
            )
            .unwrap();
        engine.on_frame();
        assert_eq!(host.requests(), 1);

        engine
            .modify_custom::<FillPipeline, _>(&"ecg".into(), |p| {
                p.color = BLUE;
                p.dirty = true;
            })
            .unwrap();
        assert!(engine.is_dirty(&"ecg".into()));
        assert_eq!(host.requests(), 2);
        assert_eq!(engine.custom::<FillPipeline>(&"ecg".into()).unwrap().color, BLUE);

        engine.on_frame();
        let canvas = engine.viewport(&"ecg".into()).unwrap().canvas();
        assert_eq!(canvas.pixels().get(0, 0), Some(BLUE.to_rgba8()));
    }

    #[test]
    fn test_completion_events() {
        let (mut engine, _) = engine(pool_of(1));
        let rx = engine.subscribe();
        engine.enable_viewport(stack("a", 4.0, 4.0)).unwrap();
        engine
            .enable_viewport(stack("quiet", 4.0, 4.0).with_options(ViewportOptions {
                background: None,
                suppress_events: true,
            }))
            .unwrap();
        engine.on_frame();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            RenderEvent::ImageRendered {
                element: "a-canvas".to_string(),
                viewport_id: "a".into(),
                rendering_engine_id: "engine".to_string(),
                viewport_status: ViewportStatus::Rendered,
            }
        );
    }

    #[test]
    fn test_disable_releases_surface() {
        let (mut engine, _) = engine(pool_of(1));
        engine.enable_viewport(stack("big", 10.0, 10.0)).unwrap();
        engine.enable_viewport(stack("small", 4.0, 4.0)).unwrap();

        engine.disable_viewport(&"big".into()).unwrap();
        assert_eq!(engine.pool().surface(0).unwrap().max_size(), (4, 4));
        assert!(!engine.is_dirty(&"big".into()));
        assert_eq!(
            engine.disable_viewport(&"big".into()).unwrap_err(),
            RenderError::Lookup("big".into())
        );
    }

    #[test]
    fn test_destroy() {
        let (mut engine, host) = engine(pool_of(2));
        engine.enable_viewport(stack("a", 4.0, 4.0)).unwrap();
        engine.destroy();
        engine.destroy();

        assert!(engine.is_destroyed());
        assert!(engine.viewport_ids().is_empty());
        assert_eq!(host.cancels(), 1);
        assert!(matches!(
            engine.enable_viewport(stack("b", 4.0, 4.0)),
            Err(RenderError::ResourceUnavailable(_))
        ));
        assert!(engine.on_frame().is_empty());
    }
}
