//! Waveform data providers
//!
//! Loading is the only async step in the rendering core: a provider hands
//! back one sample buffer per channel, or a data-source error.

use crate::error::WaveformError;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Samples of one channel as delivered by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    pub label: String,
    pub samples: Vec<f32>,
}

/// A complete multi-channel recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformData {
    /// Samples per second, identical for every channel
    pub sampling_frequency: f64,
    pub channels: Vec<ChannelData>,
}

impl WaveformData {
    /// Samples in the longest channel
    pub fn sample_count(&self) -> usize {
        self.channels.iter().map(|c| c.samples.len()).max().unwrap_or(0)
    }

    /// Reject recordings the viewport cannot lay out.
    pub fn validate(&self) -> Result<(), WaveformError> {
        if !(self.sampling_frequency > 0.0) {
            return Err(WaveformError::DataSource(format!(
                "invalid sampling frequency {}",
                self.sampling_frequency
            )));
        }
        if self.channels.is_empty() || self.sample_count() == 0 {
            return Err(WaveformError::DataSource("no samples".into()));
        }
        Ok(())
    }
}

/// Async source of waveform samples
pub trait WaveformProvider {
    fn fetch(&self) -> impl Future<Output = Result<WaveformData, WaveformError>> + Send;
}

/// Provider over an in-memory recording
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    data: Option<WaveformData>,
}

impl StaticProvider {
    pub fn new(data: WaveformData) -> Self {
        Self { data: Some(data) }
    }

    /// A provider with nothing to deliver
    pub fn empty() -> Self {
        Self { data: None }
    }
}

impl WaveformProvider for StaticProvider {
    async fn fetch(&self) -> Result<WaveformData, WaveformError> {
        self.data
            .clone()
            .ok_or_else(|| WaveformError::DataSource("no waveform source".into()))
    }
}

/// Generates an ECG-like recording, optionally after a simulated delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticProvider {
    pub channels: usize,
    pub seconds: f64,
    pub sampling_frequency: f64,
    /// Peak amplitude of the R wave
    pub amplitude: f64,
    pub heart_rate_bpm: f64,
    #[serde(skip)]
    pub latency: Duration,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            channels: 3,
            seconds: 4.0,
            sampling_frequency: 500.0,
            amplitude: 900.0,
            heart_rate_bpm: 72.0,
            latency: Duration::ZERO,
        }
    }
}

impl SyntheticProvider {
    pub fn generate(&self) -> WaveformData {
        let count = (self.seconds * self.sampling_frequency).round().max(0.0) as usize;
        let beat = 60.0 / self.heart_rate_bpm.max(1.0);

        let channels = (0..self.channels)
            .map(|ch| {
                // Leads differ in gain and polarity
                let gain = 1.0 - 0.25 * (ch % 3) as f64;
                let sign = if ch % 4 == 3 { -1.0 } else { 1.0 };
                let samples = (0..count)
                    .map(|i| {
                        let t = i as f64 / self.sampling_frequency;
                        let phase = (t % beat) / beat;
                        (sign * gain * self.amplitude * heartbeat(phase)) as f32
                    })
                    .collect();
                ChannelData {
                    label: format!("Lead {}", ch + 1),
                    samples,
                }
            })
            .collect();

        WaveformData {
            sampling_frequency: self.sampling_frequency,
            channels,
        }
    }
}

/// One normalized beat: P wave, QRS complex, T wave
fn heartbeat(phase: f64) -> f64 {
    let bump = |center: f64, width: f64, height: f64| {
        let d = (phase - center) / width;
        height * (-d * d).exp()
    };
    bump(0.15, 0.03, 0.12) - bump(0.28, 0.008, 0.1) + bump(0.3, 0.012, 1.0)
        - bump(0.32, 0.008, 0.25)
        + bump(0.55, 0.05, 0.3)
        + 0.01 * (TAU * phase).sin()
}

impl WaveformProvider for SyntheticProvider {
    async fn fetch(&self) -> Result<WaveformData, WaveformError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let data = self.generate();
        debug!(
            "Generated {} channels x {} samples",
            data.channels.len(),
            data.sample_count()
        );
        data.validate()?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let data = WaveformData {
            sampling_frequency: 100.0,
            channels: vec![ChannelData {
                label: "I".into(),
                samples: vec![0.0, 1.0],
            }],
        };
        assert_eq!(StaticProvider::new(data.clone()).fetch().await.unwrap(), data);

        let err = StaticProvider::empty().fetch().await.unwrap_err();
        assert!(matches!(err, WaveformError::DataSource(_)));
    }

    #[tokio::test]
    async fn test_synthetic_provider() {
        let provider = SyntheticProvider {
            channels: 2,
            seconds: 2.0,
            sampling_frequency: 250.0,
            latency: Duration::from_millis(1),
            ..SyntheticProvider::default()
        };
        let data = provider.fetch().await.unwrap();
        assert_eq!(data.channels.len(), 2);
        assert_eq!(data.sample_count(), 500);

        let peak = data.channels[0]
            .samples
            .iter()
            .fold(f32::MIN, |a, &b| a.max(b));
        assert!(peak > 800.0 && peak < 1000.0);
    }

    #[tokio::test]
    async fn test_synthetic_without_samples() {
        let provider = SyntheticProvider {
            seconds: 0.0,
            ..SyntheticProvider::default()
        };
        assert!(matches!(
            provider.fetch().await,
            Err(WaveformError::DataSource(_))
        ));
    }

    #[test]
    fn test_validate_frequency() {
        let data = WaveformData {
            sampling_frequency: 0.0,
            channels: vec![ChannelData {
                label: "I".into(),
                samples: vec![1.0],
            }],
        };
        assert!(data.validate().is_err());
    }
}
