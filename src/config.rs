//! Pipeline configuration
//!
//! All tunables of the filtering, smoothing, selection and learning stages
//! live here so that one JSON document fully describes a pipeline.

use crate::error::NeuroError;
use crate::types::{Band, Metric};
use serde::{Deserialize, Serialize};

/// Default sampling rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 256.0;
/// Filtered samples per band needed before power is emitted
pub const DEFAULT_POWER_WINDOW: usize = 128;
/// Raw values kept per metric for smoothing
pub const DEFAULT_SMOOTHING_WINDOW: usize = 10;
/// Per-step decay of older raw values in the smoothing average
pub const DEFAULT_SMOOTHING_DECAY: f64 = 0.8;
/// Minimum similarity for a profile to fire
pub const DEFAULT_ACTIVATION_THRESHOLD: f64 = 0.6;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
/// Maximum retained adaptation events
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_CALIBRATION_INTERVAL_MS: u64 = 100;

/// Per-metric weights used by the similarity score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub attention: f64,
    pub relaxation: f64,
    pub meditation: f64,
    pub engagement: f64,
    pub cognitive_load: f64,
    pub fatigue: f64,
    pub stress: f64,
    pub flow: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            attention: 1.2,
            relaxation: 1.0,
            meditation: 0.8,
            engagement: 1.1,
            cognitive_load: 1.3,
            fatigue: 1.1,
            stress: 1.2,
            flow: 1.4,
        }
    }
}

impl MetricWeights {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Attention => self.attention,
            Metric::Relaxation => self.relaxation,
            Metric::Meditation => self.meditation,
            Metric::Engagement => self.engagement,
            Metric::CognitiveLoad => self.cognitive_load,
            Metric::Fatigue => self.fatigue,
            Metric::Stress => self.stress,
            Metric::Flow => self.flow,
        }
    }

    pub fn total(&self) -> f64 {
        Metric::ALL.iter().map(|m| self.get(*m)).sum()
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate_hz: f64,
    /// Channels averaged into the filter bank input; empty means all present
    pub channels: Vec<String>,
    pub power_window: usize,
    pub smoothing_window: usize,
    pub smoothing_decay: f64,
    pub activation_threshold: f64,
    pub learning_rate: f64,
    pub history_capacity: usize,
    pub calibration_interval_ms: u64,
    pub weights: MetricWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            channels: ["TP9", "AF7", "AF8", "TP10"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            power_window: DEFAULT_POWER_WINDOW,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            smoothing_decay: DEFAULT_SMOOTHING_DECAY,
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            learning_rate: DEFAULT_LEARNING_RATE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            calibration_interval_ms: DEFAULT_CALIBRATION_INTERVAL_MS,
            weights: MetricWeights::default(),
        }
    }
}

impl PipelineConfig {
    /// Check that every tunable is usable
    pub fn validate(&self) -> Result<(), NeuroError> {
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(NeuroError::InvalidConfig(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }

        let nyquist = self.sample_rate_hz / 2.0;
        let (_, gamma_high) = Band::Gamma.range_hz();
        if gamma_high >= nyquist {
            return Err(NeuroError::InvalidConfig(format!(
                "sample rate {} Hz cannot represent the gamma band (needs > {} Hz)",
                self.sample_rate_hz,
                gamma_high * 2.0
            )));
        }

        if self.power_window == 0 {
            return Err(NeuroError::InvalidConfig("power_window must be > 0".into()));
        }
        if self.smoothing_window == 0 {
            return Err(NeuroError::InvalidConfig(
                "smoothing_window must be > 0".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(NeuroError::InvalidConfig(
                "history_capacity must be > 0".into(),
            ));
        }
        if self.calibration_interval_ms == 0 {
            return Err(NeuroError::InvalidConfig(
                "calibration_interval_ms must be > 0".into(),
            ));
        }
        if !(self.smoothing_decay > 0.0 && self.smoothing_decay <= 1.0) {
            return Err(NeuroError::InvalidConfig(format!(
                "smoothing_decay must be in (0, 1], got {}",
                self.smoothing_decay
            )));
        }
        if !(0.0..=1.0).contains(&self.activation_threshold) {
            return Err(NeuroError::InvalidConfig(format!(
                "activation_threshold must be in [0, 1], got {}",
                self.activation_threshold
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(NeuroError::InvalidConfig(format!(
                "learning_rate must be a non-negative number, got {}",
                self.learning_rate
            )));
        }

        for metric in Metric::ALL {
            let w = self.weights.get(metric);
            if !w.is_finite() || w < 0.0 {
                return Err(NeuroError::InvalidConfig(format!(
                    "weight for {} must be a non-negative number, got {}",
                    metric.as_str(),
                    w
                )));
            }
        }
        if self.weights.total() <= 0.0 {
            return Err(NeuroError::InvalidConfig(
                "metric weights must not all be zero".into(),
            ));
        }

        Ok(())
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, NeuroError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, NeuroError> {
        serde_json::to_string_pretty(self).map_err(|e| NeuroError::EncodingError(e.to_string()))
    }
}
