//! GPU probe
//!
//! Detects whether a wgpu adapter and device can be created in this
//! environment. The result decides `EngineConfig::gpu_available`; the
//! engine itself never talks to wgpu.

use crate::config::EngineConfig;
use thiserror::Error;
use tracing::{debug, info, warn};
use wgpu::{
    DeviceDescriptor, Features, Instance, InstanceDescriptor, Limits, PowerPreference,
    RequestAdapterOptions,
};

/// GPU probe errors
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
}

/// Probe options
#[derive(Debug, Clone)]
pub struct GpuProbeOptions {
    /// Prefer an integrated GPU over a discrete one
    pub low_power: bool,
    /// Allow the software fallback adapter
    pub allow_fallback: bool,
}

impl Default for GpuProbeOptions {
    fn default() -> Self {
        Self {
            low_power: true,
            allow_fallback: false,
        }
    }
}

/// What the probe found
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    pub adapter_name: String,
    pub backend: String,
    /// Largest 2D texture the device accepts
    pub max_texture_dimension: u32,
}

impl GpuCapabilities {
    /// Mark the GPU pipeline available in `config` and bound surface
    /// footprints by the device texture limit.
    pub fn apply(&self, config: &mut EngineConfig) {
        config.gpu_available = true;
        config.max_surface_size = Some(self.max_texture_dimension);
    }
}

/// Request an adapter and a device, then drop both.
pub async fn probe(options: &GpuProbeOptions) -> Result<GpuCapabilities, GpuError> {
    info!("Probing GPU (low_power: {})", options.low_power);

    let instance = Instance::new(&InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let power_preference = if options.low_power {
        PowerPreference::LowPower
    } else {
        PowerPreference::HighPerformance
    };

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: options.allow_fallback,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    let adapter_info = adapter.get_info();
    debug!(
        "GPU driver: {} (vendor: {})",
        adapter_info.driver, adapter_info.vendor
    );

    let limits = adapter.limits();
    let (device, _queue) = adapter
        .request_device(
            &DeviceDescriptor {
                label: Some("medvp probe device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        )
        .await
        .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

    device.on_uncaptured_error(Box::new(|error| {
        warn!("wgpu error: {}", error);
    }));

    let capabilities = GpuCapabilities {
        adapter_name: adapter_info.name,
        backend: format!("{:?}", adapter_info.backend),
        max_texture_dimension: limits.max_texture_dimension_2d,
    };
    info!(
        "GPU adapter: {} ({}), max texture {}",
        capabilities.adapter_name, capabilities.backend, capabilities.max_texture_dimension
    );
    Ok(capabilities)
}

/// Probe and update `config`; on failure the GPU pipeline is marked
/// unavailable and the error is returned for logging.
pub async fn configure(config: &mut EngineConfig, options: &GpuProbeOptions) -> Result<(), GpuError> {
    match probe(options).await {
        Ok(capabilities) => {
            capabilities.apply(config);
            Ok(())
        }
        Err(err) => {
            config.gpu_available = false;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_bound_surfaces() {
        let caps = GpuCapabilities {
            adapter_name: "test".into(),
            backend: "Vulkan".into(),
            max_texture_dimension: 2048,
        };
        let mut config = EngineConfig {
            gpu_available: false,
            ..EngineConfig::default()
        };
        caps.apply(&mut config);
        assert!(config.gpu_available);
        assert_eq!(config.max_surface_size, Some(2048));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_gpu_probe() {
        let mut config = EngineConfig::default();
        let result = pollster::block_on(configure(&mut config, &GpuProbeOptions::default()));
        assert!(result.is_ok());
        assert!(config.gpu_available);
    }
}
