//! Waveform viewport
//!
//! A custom-pipeline viewport that draws multi-channel traces on a paper
//! grid straight into its canvas. Lifecycle:
//!
//! ```text
//! Empty --begin_load--> Loading --apply_samples--> Loaded
//!   ^                      |
//!   +------fail_load-------+
//! ```
//!
//! Pan and zoom belong to the waveform view; the engine camera is not used.

use crate::channel::Channel;
use crate::config::WaveformConfig;
use crate::error::WaveformError;
use crate::grid::{self, GridLine};
use crate::layout::{self, Layout};
use crate::provider::{WaveformData, WaveformProvider};
use crate::raster::{self, DrawCommand};
use crate::transform::{ViewTransform, WaveformTransform, WorldPoint};
use glam::DVec2;
use medvp_render::{
    Camera, Canvas, Color, CustomPipelineViewport, RenderError, RenderingEngine, ViewportId,
    ViewportStatus,
};
use serde::Serialize;
use std::any::Any;
use tracing::{debug, info, warn};

/// Width of major grid strokes in pixels
const MAJOR_STROKE: u32 = 2;

/// Loaded samples and their layout
#[derive(Debug, Clone)]
struct LoadedWaveform {
    channels: Vec<Channel>,
    sampling_frequency: f64,
    /// Content height fixed at load time from the canvas aspect ratio
    target_height: f64,
    layout: Layout,
}

#[derive(Debug, Clone)]
enum WaveformState {
    Empty,
    Loading,
    Loaded(LoadedWaveform),
}

/// Channel label anchored at its band's top-left corner (canvas pixels)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelLabel {
    pub channel: usize,
    pub label: String,
    pub position: DVec2,
}

/// Multi-channel waveform drawn through its own pipeline
#[derive(Debug)]
pub struct WaveformViewport {
    config: WaveformConfig,
    state: WaveformState,
    view: ViewTransform,
    /// View follows the canvas width until the user pans or zooms
    fitted: bool,
    canvas_size: (u32, u32),
    render_requested: bool,
    rendered: bool,
    pub background: Color,
    pub trace_color: Color,
}

impl WaveformViewport {
    pub fn new(config: WaveformConfig) -> Result<Self, WaveformError> {
        config.validate()?;
        Ok(Self {
            config,
            state: WaveformState::Empty,
            view: ViewTransform::default(),
            fitted: true,
            canvas_size: (0, 0),
            render_requested: false,
            rendered: false,
            background: Color::PAPER,
            trace_color: Color::TRACE,
        })
    }

    pub fn config(&self) -> &WaveformConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, WaveformState::Loaded(_))
    }

    /// Fetch samples from `provider` and lay them out for a canvas of
    /// `canvas_size` pixels. On failure the viewport is left empty.
    pub async fn load<P: WaveformProvider>(
        &mut self,
        provider: &P,
        canvas_size: (u32, u32),
    ) -> Result<(), WaveformError> {
        self.begin_load();
        match provider.fetch().await {
            Ok(data) => self.apply_samples(data, canvas_size),
            Err(err) => {
                self.fail_load(&err);
                Err(err)
            }
        }
    }

    /// Enter the loading state while a fetch is outstanding.
    pub fn begin_load(&mut self) {
        debug!("Waveform load started");
        self.state = WaveformState::Loading;
        self.rendered = false;
        self.render_requested = true;
    }

    pub fn fail_load(&mut self, err: &WaveformError) {
        warn!("Waveform load failed: {}", err);
        self.state = WaveformState::Empty;
        self.render_requested = true;
    }

    /// Build channels and layout from fetched samples.
    pub fn apply_samples(
        &mut self,
        data: WaveformData,
        canvas_size: (u32, u32),
    ) -> Result<(), WaveformError> {
        if let Err(err) = data.validate() {
            self.fail_load(&err);
            return Err(err);
        }

        let sample_count = data.sample_count();
        let channels: Vec<Channel> = data
            .channels
            .into_iter()
            .map(|c| Channel::new(c.label, c.samples))
            .collect();

        let content_width =
            layout::content_width(sample_count, data.sampling_frequency, &self.config);
        let (w, h) = canvas_size;
        let aspect = if w > 0 && h > 0 {
            w as f64 / h as f64
        } else {
            1.0
        };
        let target_height = content_width / aspect;
        let layout = Layout::compute(&channels, target_height, content_width, &self.config);

        info!(
            "Loaded waveform: {} channels, {} samples at {} Hz (scale {:.4})",
            channels.len(),
            sample_count,
            data.sampling_frequency,
            layout.scale
        );

        self.state = WaveformState::Loaded(LoadedWaveform {
            channels,
            sampling_frequency: data.sampling_frequency,
            target_height,
            layout,
        });
        self.canvas_size = canvas_size;
        self.reset_camera();
        self.rendered = false;
        self.render_requested = true;
        Ok(())
    }

    fn loaded(&self) -> Result<&LoadedWaveform, WaveformError> {
        match &self.state {
            WaveformState::Loaded(loaded) => Ok(loaded),
            _ => Err(WaveformError::NotLoaded),
        }
    }

    pub fn channels(&self) -> &[Channel] {
        match &self.state {
            WaveformState::Loaded(loaded) => &loaded.channels,
            _ => &[],
        }
    }

    /// Indices of visible channels, top to bottom
    pub fn visible_channels(&self) -> Vec<usize> {
        self.layout()
            .map(|l| l.bands.iter().map(|b| b.channel).collect())
            .unwrap_or_default()
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.loaded().ok().map(|l| &l.layout)
    }

    /// Show or hide a channel; scale and height follow the visible set.
    pub fn set_channel_visibility(
        &mut self,
        index: usize,
        visible: bool,
    ) -> Result<(), WaveformError> {
        let config = &self.config;
        let WaveformState::Loaded(loaded) = &mut self.state else {
            return Err(WaveformError::NotLoaded);
        };
        let count = loaded.channels.len();
        let channel = loaded
            .channels
            .get_mut(index)
            .ok_or(WaveformError::ChannelOutOfRange { index, count })?;
        if channel.visible == visible {
            return Ok(());
        }
        channel.visible = visible;

        loaded.layout = Layout::compute(
            &loaded.channels,
            loaded.target_height,
            loaded.layout.content_width,
            config,
        );
        debug!(
            "Channel {} {}; scale now {:.4}",
            index,
            if visible { "shown" } else { "hidden" },
            loaded.layout.scale
        );
        self.render_requested = true;
        Ok(())
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Set an explicit pan/zoom. Non-positive zoom is ignored.
    pub fn set_pan_zoom(&mut self, pan: DVec2, zoom: f64) {
        if !(zoom > 0.0 && zoom.is_finite() && pan.is_finite()) {
            return;
        }
        self.view = ViewTransform { pan, zoom };
        self.fitted = false;
        self.render_requested = true;
    }

    /// Fit the full content width to the canvas again.
    pub fn reset_camera(&mut self) {
        self.fitted = true;
        self.refit();
        self.render_requested = true;
    }

    fn refit(&mut self) {
        if let WaveformState::Loaded(loaded) = &self.state {
            self.view = ViewTransform::fit_width(loaded.layout.content_width, self.canvas_size.0);
        }
    }

    fn transform(&self) -> Option<WaveformTransform<'_>> {
        let loaded = self.loaded().ok()?;
        Some(WaveformTransform {
            layout: &loaded.layout,
            view: self.view,
            sampling_frequency: loaded.sampling_frequency,
            pixels_per_second: self.config.pixels_per_second,
        })
    }

    /// Canvas position of a world point; `None` if not loaded or hidden.
    pub fn world_to_canvas(&self, p: WorldPoint) -> Option<DVec2> {
        self.transform()?.world_to_canvas(p)
    }

    /// World point under a canvas position; `None` off the visible bands.
    pub fn canvas_to_world(&self, p: DVec2) -> Option<WorldPoint> {
        self.transform()?.canvas_to_world(p)
    }

    pub fn grid_lines(&self) -> Vec<GridLine> {
        match self.layout() {
            Some(layout) => grid::grid_lines(layout, &self.view, self.canvas_size, &self.config),
            None => Vec::new(),
        }
    }

    pub fn labels(&self) -> Vec<ChannelLabel> {
        let Ok(loaded) = self.loaded() else {
            return Vec::new();
        };
        loaded
            .layout
            .bands
            .iter()
            .map(|band| ChannelLabel {
                channel: band.channel,
                label: loaded.channels[band.channel].label.clone(),
                position: self.view.content_to_canvas(DVec2::new(0.0, band.top)),
            })
            .collect()
    }

    /// Commands for the current state at the last canvas size.
    pub fn draw_commands(&self) -> Vec<DrawCommand> {
        let mut commands = vec![DrawCommand::Clear(self.background)];
        let Some(transform) = self.transform() else {
            return commands;
        };

        let lines = self.grid_lines();
        // Minor strokes first so majors sit on top; each line is drawn once
        for major in [false, true] {
            for line in lines.iter().filter(|l| l.major == major) {
                commands.push(grid_command(line));
            }
        }

        let loaded = match self.loaded() {
            Ok(loaded) => loaded,
            Err(_) => return commands,
        };
        let canvas_width = self.canvas_size.0 as f64;
        let first = transform
            .x_to_sample(self.view.canvas_to_content(DVec2::ZERO).x)
            .floor();
        let last = transform
            .x_to_sample(self.view.canvas_to_content(DVec2::new(canvas_width, 0.0)).x)
            .ceil();

        for band in &loaded.layout.bands {
            let samples = loaded.channels[band.channel].samples();
            let len = samples.len() as f64;
            // NaN casts to 0, so an undefined range draws nothing
            let start = first.clamp(0.0, len) as usize;
            let end = (last + 1.0).clamp(0.0, len) as usize;
            if start >= end {
                continue;
            }
            let stride = ((end - start) / (2 * self.canvas_size.0.max(1) as usize)).max(1);
            let mut points = Vec::new();
            for i in (start..end).step_by(stride) {
                let point = samples[i]
                    .is_finite()
                    .then(|| {
                        transform.world_to_canvas(WorldPoint::new(
                            i as f64,
                            samples[i] as f64,
                            band.channel,
                        ))
                    })
                    .flatten();
                match point {
                    Some(point) => points.push(point),
                    // Gaps break the trace
                    None => flush_trace(&mut commands, &mut points, self.trace_color),
                }
            }
            flush_trace(&mut commands, &mut points, self.trace_color);
        }
        commands
    }
}

fn flush_trace(commands: &mut Vec<DrawCommand>, points: &mut Vec<DVec2>, color: Color) {
    if !points.is_empty() {
        commands.push(DrawCommand::Polyline {
            points: std::mem::take(points),
            color,
        });
    }
}

fn grid_command(line: &GridLine) -> DrawCommand {
    let (from, to) = match line.orientation {
        grid::Orientation::Horizontal => (
            DVec2::new(line.start, line.position),
            DVec2::new(line.end, line.position),
        ),
        grid::Orientation::Vertical => (
            DVec2::new(line.position, line.start),
            DVec2::new(line.position, line.end),
        ),
    };
    let (width, color) = if line.major {
        (MAJOR_STROKE, Color::GRID_MAJOR)
    } else {
        (1, Color::GRID_MINOR)
    };
    DrawCommand::Line {
        from,
        to,
        width,
        color,
    }
}

impl CustomPipelineViewport for WaveformViewport {
    fn custom_render_viewport_to_canvas(
        &mut self,
        canvas: &mut Canvas,
        _camera: &Camera,
    ) -> Result<(), RenderError> {
        let (width, height) = canvas.displayed_size();
        self.canvas_size = (width, height);
        if self.fitted {
            self.refit();
        }

        let commands = self.draw_commands();
        canvas.set_size(width, height);
        raster::rasterize(&commands, canvas.pixels_mut());

        if self.is_loaded() {
            self.rendered = true;
        }
        debug!("Waveform drew {} commands at {}x{}", commands.len(), width, height);
        Ok(())
    }

    fn status(&self) -> ViewportStatus {
        match self.state {
            WaveformState::Empty => ViewportStatus::NoData,
            WaveformState::Loading => ViewportStatus::Loading,
            WaveformState::Loaded(_) if self.rendered => ViewportStatus::Rendered,
            WaveformState::Loaded(_) => ViewportStatus::PreRender,
        }
    }

    fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Load a waveform viewport enabled in `engine` and schedule its render.
///
/// The engine stays usable while the fetch is outstanding; the viewport
/// reports `Loading` until it completes.
pub async fn load_waveform<P: WaveformProvider>(
    engine: &mut RenderingEngine,
    id: &ViewportId,
    provider: &P,
) -> Result<(), RenderError> {
    let canvas_size = engine.viewport(id)?.canvas().displayed_size();
    engine.modify_custom::<WaveformViewport, _>(id, |w| w.begin_load())?;

    let fetched = provider.fetch().await;
    engine.modify_custom::<WaveformViewport, _>(id, |w| match fetched {
        Ok(data) => w.apply_samples(data, canvas_size),
        Err(err) => {
            w.fail_load(&err);
            Err(err)
        }
    })??;
    Ok(())
}
