//! Channel descriptors

use serde::{Deserialize, Serialize};

/// One channel's samples with cached extrema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub label: String,
    samples: Vec<f32>,
    min: f64,
    max: f64,
    pub visible: bool,
}

impl Channel {
    pub fn new(label: impl Into<String>, samples: Vec<f32>) -> Self {
        let (min, max) = samples
            .iter()
            .filter(|s| s.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, &s| {
                let s = s as f64;
                Some(match acc {
                    Some((lo, hi)) => (lo.min(s), hi.max(s)),
                    None => (s, s),
                })
            })
            .unwrap_or((0.0, 0.0));

        Self {
            label: label.into(),
            samples,
            min,
            max,
            visible: true,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Amplitude span, `max - min`
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extrema() {
        let channel = Channel::new("I", vec![3.0, -2.0, 7.5, f32::NAN]);
        assert_eq!(channel.min(), -2.0);
        assert_eq!(channel.max(), 7.5);
        assert_eq!(channel.range(), 9.5);
        assert!(channel.visible);
        assert_eq!(channel.len(), 4);
    }

    #[test]
    fn test_empty_channel() {
        let channel = Channel::new("II", Vec::new());
        assert!(channel.is_empty());
        assert_eq!(channel.range(), 0.0);
    }
}
