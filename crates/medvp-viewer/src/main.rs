//! medvp Viewer: headless viewport rendering driver
//!
//! Opens the configured viewports on a headless scene backend, loads a
//! synthetic waveform, and drives the frame loop the way a windowing host
//! would: run `on_frame` whenever the engine has asked for a frame.
//!
//! Usage: `medvp-viewer [config.json]`

mod config;

use anyhow::{Context, Result};
use config::ViewerConfig;
use medvp_render::{
    Canvas, HeadlessBackend, RecordingFrameHost, RenderEvent, RenderingEngine, SchedulerState,
    ViewportId, ViewportInput, ViewportType,
};
use medvp_waveform::{load_waveform, WaveformViewport};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => ViewerConfig::load(&path)?,
        None => ViewerConfig::default(),
    };

    init_logging(&config.log_level);
    info!("medvp viewer starting...");

    // The engine is single-owner; keep it on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(config))?;

    info!("medvp viewer shutting down");
    Ok(())
}

fn init_logging(level: &str) {
    let builder = FmtSubscriber::builder().with_target(false).compact();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        let level = level.parse::<Level>().unwrap_or(Level::INFO);
        builder.with_max_level(level).init();
    }
}

#[cfg(feature = "gpu")]
async fn probe_gpu(mut config: ViewerConfig) -> ViewerConfig {
    let options = medvp_render::gpu::GpuProbeOptions::default();
    if let Err(err) = medvp_render::gpu::configure(&mut config.engine, &options).await {
        warn!("GPU unavailable: {}", err);
    }
    config
}

async fn run(config: ViewerConfig) -> Result<()> {
    #[cfg(feature = "gpu")]
    let config = probe_gpu(config).await;

    let host = RecordingFrameHost::new();
    let mut backend = HeadlessBackend::new();
    let stats = backend.stats();
    let mut engine = RenderingEngine::new(
        "medvp-viewer",
        config.engine.clone(),
        &mut backend,
        Box::new(host.clone()),
    )?;
    let events = engine.subscribe();

    let mut waveforms = Vec::new();
    for entry in &config.viewports {
        let kind: ViewportType = entry.kind.parse()?;
        let input = ViewportInput::new(
            entry.id.as_str(),
            kind,
            Canvas::new(format!("{}-canvas", entry.id), entry.width, entry.height),
        );
        if kind == ViewportType::Ecg {
            let waveform = WaveformViewport::new(config.waveform.clone())?;
            engine.enable_custom_viewport(input, Box::new(waveform))?;
            waveforms.push(ViewportId::new(entry.id.as_str()));
        } else {
            engine.enable_viewport(input)?;
        }
    }

    for id in &waveforms {
        if let Err(err) = load_waveform(&mut engine, id, &config.synthetic).await {
            warn!("Waveform {} not loaded: {}", id, err);
        }
    }

    let mut frames = drive(&mut engine, config.max_frames);

    // Simulate a layout change on every viewport
    let ids = engine.viewport_ids();
    for id in &ids {
        let canvas = engine.canvas_mut(id)?;
        let (w, h) = canvas.client_size();
        canvas.set_client_size(w * 0.75, h * 0.75);
    }
    engine.resize(false, true)?;
    frames += drive(&mut engine, config.max_frames.saturating_sub(frames));

    for event in events.try_iter() {
        let RenderEvent::ImageRendered {
            viewport_id,
            viewport_status,
            ..
        } = &event;
        info!("{} rendered ({:?})", viewport_id, viewport_status);
    }

    info!(
        "{} frames, {} frame requests, {} surface renders, {} surface resizes",
        frames,
        host.requests(),
        stats.renders(),
        stats.resizes()
    );
    info!("Engine stats: {}", serde_json::to_string(engine.stats())?);

    engine.destroy();
    Ok(())
}

/// Run frames while one is pending, up to `limit`.
fn drive(engine: &mut RenderingEngine, limit: u32) -> u32 {
    let mut frames = 0;
    while frames < limit && engine.scheduler_state() == SchedulerState::FramePending {
        let report = engine.on_frame();
        for (id, err) in &report.failed {
            warn!("{} failed: {}", id, err);
        }
        frames += 1;
    }
    frames
}
