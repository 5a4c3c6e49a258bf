//! medvp Render - Viewport Rendering Core
//!
//! Renders many medical-image viewports through a small pool of shared
//! offscreen surfaces and copies each result to its own on-screen canvas.
//! Work is coalesced into one frame callback supplied by the host.
//!
//! Viewports whose content is not GPU-driven (e.g. waveforms) plug in
//! through [`CustomPipelineViewport`] and draw directly to their canvas.

mod assignment;
mod camera;
mod canvas;
mod color;
mod config;
mod coordinator;
mod engine;
mod error;
mod event;
mod headless;
mod pool;
mod scene;
mod scheduler;
mod viewport;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use assignment::SurfaceAssigner;
pub use camera::{Camera, DisplayArea};
pub use canvas::{Canvas, CanvasDescriptor, PixelBuffer};
pub use color::Color;
pub use config::{ConfigError, EngineConfig, DEFAULT_POOL_SIZE, VIEWPORT_MIN_SIZE};
pub use coordinator::ResizeDecision;
pub use engine::{EngineStats, FrameReport, RenderingEngine, ResizeOutcome, Viewport};
pub use error::{RenderError, Result};
pub use event::{EventBus, RenderEvent};
pub use headless::{HeadlessBackend, HeadlessStats, HeadlessSurface};
pub use pool::{normalized_rect, DrawToken, PooledSurface, SurfaceAssignment, SurfacePool};
pub use scene::{SceneBackend, SceneSurface, SubRenderer};
pub use scheduler::{FrameHost, FrameScheduler, RecordingFrameHost, SchedulerState};
pub use viewport::{
    CustomPipelineViewport, PipelineKind, ViewportId, ViewportInput, ViewportOptions,
    ViewportStatus, ViewportType,
};
