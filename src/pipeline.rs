//! Pipeline orchestration
//!
//! `NeuroProcessor` chains the per-sample stages and owns all of their state:
//!
//! 1. Channel mixing - average the configured channels into one scalar
//! 2. FilterBank - split the scalar into the five EEG bands
//! 3. BandPowerEstimator - windowed RMS power per band
//! 4. MetricComputer - eight smoothed cognitive metrics
//! 5. AdaptationSelector - best matching catalog profile, if any
//!
//! The processor is single-writer: feed it one stream, in order.

use crate::catalog::AdaptationCatalog;
use crate::config::PipelineConfig;
use crate::error::NeuroError;
use crate::filters::FilterBank;
use crate::history::AdaptationHistory;
use crate::learner::FeedbackLearner;
use crate::metrics::MetricComputer;
use crate::power::BandPowerEstimator;
use crate::selector::{AdaptationSelector, ProfileScore};
use crate::types::{AdaptationEvent, AdaptationProfile, MetricVector, Sample, SignalFrame};
use tracing::{debug, warn};

/// Stateful per-stream processor
pub struct NeuroProcessor {
    config: PipelineConfig,
    filter_bank: FilterBank,
    power: BandPowerEstimator,
    metrics: MetricComputer,
    selector: AdaptationSelector,
    learner: FeedbackLearner,
    catalog: AdaptationCatalog,
    history: AdaptationHistory,
    current_metrics: MetricVector,
    current_adaptation: Option<AdaptationProfile>,
    samples_processed: u64,
}

impl Default for NeuroProcessor {
    fn default() -> Self {
        Self::build(PipelineConfig::default(), AdaptationCatalog::default())
    }
}

impl NeuroProcessor {
    /// Create a processor with default settings and the default catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor from a validated configuration
    pub fn with_config(config: PipelineConfig) -> Result<Self, NeuroError> {
        Self::with_catalog(config, AdaptationCatalog::default())
    }

    /// Create a processor with a custom catalog
    pub fn with_catalog(
        config: PipelineConfig,
        catalog: AdaptationCatalog,
    ) -> Result<Self, NeuroError> {
        config.validate()?;
        Ok(Self::build(config, catalog))
    }

    fn build(config: PipelineConfig, catalog: AdaptationCatalog) -> Self {
        Self {
            filter_bank: FilterBank::new(config.sample_rate_hz),
            power: BandPowerEstimator::new(config.power_window),
            metrics: MetricComputer::new(config.smoothing_window, config.smoothing_decay),
            selector: AdaptationSelector::new(config.weights, config.activation_threshold),
            learner: FeedbackLearner::new(config.learning_rate),
            history: AdaptationHistory::new(config.history_capacity),
            catalog,
            config,
            current_metrics: MetricVector::default(),
            current_adaptation: None,
            samples_processed: 0,
        }
    }

    /// Run one sample through every stage
    pub fn process(&mut self, sample: &Sample) -> SignalFrame {
        if sample.is_malformed() {
            warn!(
                timestamp = %sample.timestamp,
                "malformed sample: non-finite channels or quality out of range, substituting defaults"
            );
        }

        let input = self.mix_channels(sample);
        let filtered = self.filter_bank.process_sample(input);
        let band_powers = self.power.estimate_all(&filtered);
        let metrics = self.metrics.compute_metrics(&band_powers);
        self.current_metrics = metrics;
        self.samples_processed += 1;

        let selection = self
            .selector
            .select(&metrics, &self.catalog)
            .map(|(profile, score)| (profile.clone(), score));

        let (adaptation, score) = match selection {
            Some((profile, score)) => {
                let changed = self
                    .current_adaptation
                    .as_ref()
                    .map_or(true, |current| current.id != profile.id);
                if changed {
                    debug!(profile = %profile.id, score, "adaptation selected");
                }

                self.history.push(AdaptationEvent {
                    profile: profile.clone(),
                    metrics,
                    score,
                    timestamp: sample.timestamp,
                });
                self.current_adaptation = Some(profile.clone());
                (Some(profile), Some(score))
            }
            None => (None, None),
        };

        SignalFrame {
            timestamp: sample.timestamp,
            quality: sample.sanitized_quality(),
            input,
            band_powers,
            metrics,
            adaptation,
            score,
        }
    }

    /// Average of the configured channels (missing or non-finite count as 0).
    /// With no configured channels, averages every finite reading present.
    fn mix_channels(&self, sample: &Sample) -> f64 {
        if self.config.channels.is_empty() {
            let finite: Vec<f64> = sample
                .channels
                .values()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            if finite.is_empty() {
                return 0.0;
            }
            return finite.iter().sum::<f64>() / finite.len() as f64;
        }

        let sum: f64 = self
            .config
            .channels
            .iter()
            .map(|name| sample.channel(name))
            .sum();
        let mixed = sum / self.config.channels.len() as f64;
        if mixed.is_finite() {
            mixed
        } else {
            0.0
        }
    }

    /// Apply effectiveness feedback to a profile; unknown ids are ignored
    pub fn provide_feedback(&mut self, profile_id: &str, effectiveness: f64) -> Option<f64> {
        let updated = self
            .learner
            .apply_feedback(&mut self.catalog, profile_id, effectiveness)?;
        if let Some(current) = self.current_adaptation.as_mut() {
            if current.id == profile_id {
                current.confidence = updated;
            }
        }
        Some(updated)
    }

    /// Drop all signal state (filters, power buffers, smoothing) and rebuild
    /// it fresh. Catalog confidence and adaptation history are kept.
    pub fn reset_signal_state(&mut self) {
        self.filter_bank = FilterBank::new(self.config.sample_rate_hz);
        self.power = BandPowerEstimator::new(self.config.power_window);
        self.metrics = MetricComputer::new(self.config.smoothing_window, self.config.smoothing_decay);
        self.current_metrics = MetricVector::default();
        self.current_adaptation = None;
        self.samples_processed = 0;
    }

    pub fn current_metrics(&self) -> MetricVector {
        self.current_metrics
    }

    pub fn current_adaptation(&self) -> Option<&AdaptationProfile> {
        self.current_adaptation.as_ref()
    }

    pub fn history(&self) -> &AdaptationHistory {
        &self.history
    }

    pub fn catalog(&self) -> &AdaptationCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Scores of every profile against the current metrics, best first
    pub fn rank_current(&self) -> Vec<ProfileScore> {
        self.selector.rank(&self.current_metrics, &self.catalog)
    }

    /// True once every band has a full power window
    pub fn is_warm(&self) -> bool {
        self.power.is_warm()
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::AdaptationSelector;
    use crate::types::{AdaptationDescriptor, Band, MAX_CONFIDENCE};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn sample_at(i: i64, value: f64) -> Sample {
        let mut channels = BTreeMap::new();
        for name in ["TP9", "AF7", "AF8", "TP10"] {
            channels.insert(name.to_string(), value);
        }
        Sample::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(i * 4),
            channels,
            0.9,
        )
    }

    fn sine_stream(n: usize, freq: f64, amplitude: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let t = i as f64 / 256.0;
                sample_at(
                    i as i64,
                    amplitude * (2.0 * std::f64::consts::PI * freq * t).sin(),
                )
            })
            .collect()
    }

    #[test]
    fn test_power_gated_until_window_full() {
        let mut processor = NeuroProcessor::new();
        let stream = sine_stream(200, 10.0, 1.0);

        for (i, sample) in stream.iter().enumerate() {
            let frame = processor.process(sample);
            if i < 127 {
                assert_eq!(frame.band_powers.get(Band::Alpha), 0.0);
            }
        }
        assert!(processor.is_warm());
        assert_eq!(processor.samples_processed(), 200);
    }

    #[test]
    fn test_metrics_always_in_range() {
        let mut processor = NeuroProcessor::new();
        let mut stream = sine_stream(400, 20.0, 50.0);
        stream[150].channels.insert("TP9".into(), f64::INFINITY);
        stream[151].channels.insert("AF7".into(), f64::NAN);
        stream[152].channels.clear();
        stream[153].quality = f64::NAN;

        for sample in &stream {
            let frame = processor.process(sample);
            for (_, v) in frame.metrics.iter() {
                assert!((0.0..=1.0).contains(&v));
            }
            assert!((0.0..=1.0).contains(&frame.quality));
            assert!(frame.input.is_finite());
        }
    }

    #[test]
    fn test_missing_channels_count_as_zero() {
        let processor = NeuroProcessor::new();
        let mut channels = BTreeMap::new();
        channels.insert("TP9".to_string(), 8.0);
        let sample = Sample::new(Utc::now(), channels, 1.0);
        assert_eq!(processor.mix_channels(&sample), 2.0);
    }

    #[test]
    fn test_empty_channel_list_averages_present_readings() {
        let config = PipelineConfig {
            channels: Vec::new(),
            ..Default::default()
        };
        let processor = NeuroProcessor::with_config(config).unwrap();
        let mut channels = BTreeMap::new();
        channels.insert("C3".to_string(), 4.0);
        channels.insert("C4".to_string(), 2.0);
        channels.insert("Cz".to_string(), f64::NAN);
        let sample = Sample::new(Utc::now(), channels, 1.0);
        assert_eq!(processor.mix_channels(&sample), 3.0);
    }

    #[test]
    fn test_current_metrics_idempotent() {
        let mut processor = NeuroProcessor::new();
        for sample in sine_stream(150, 6.0, 0.5) {
            processor.process(&sample);
        }
        assert_eq!(processor.current_metrics(), processor.current_metrics());
    }

    #[test]
    fn test_identical_streams_are_reproducible() {
        let stream = sine_stream(300, 12.0, 0.8);
        let mut a = NeuroProcessor::new();
        let mut b = NeuroProcessor::new();
        for sample in &stream {
            assert_eq!(a.process(sample), b.process(sample));
        }
    }

    #[test]
    fn test_selection_records_history_and_current() {
        let trigger = MetricVector::uniform(0.0);
        let catalog = AdaptationCatalog::from_profiles(vec![AdaptationProfile::new(
            "quiet",
            trigger,
            AdaptationDescriptor::default(),
            0.6,
        )]);
        let mut processor =
            NeuroProcessor::with_catalog(PipelineConfig::default(), catalog).unwrap();

        // A flat signal has zero power everywhere, so every metric reads 0
        let frame = processor.process(&sample_at(0, 0.0));
        assert_eq!(frame.adaptation.as_ref().unwrap().id, "quiet");
        assert_eq!(frame.score, Some(1.0));
        assert_eq!(processor.current_adaptation().unwrap().id, "quiet");
        assert_eq!(processor.history().len(), 1);
        assert_eq!(processor.history().latest().unwrap().timestamp, frame.timestamp);
    }

    #[test]
    fn test_no_selection_keeps_previous_adaptation() {
        let catalog = AdaptationCatalog::from_profiles(vec![AdaptationProfile::new(
            "quiet",
            MetricVector::uniform(0.0),
            AdaptationDescriptor::default(),
            0.6,
        )]);
        let mut processor =
            NeuroProcessor::with_catalog(PipelineConfig::default(), catalog).unwrap();
        processor.process(&sample_at(0, 0.0));
        let history_len = processor.history().len();

        // Swap in an unreachable threshold: nothing fires, prior adaptation stays
        processor.selector = AdaptationSelector::new(processor.config.weights, 1.0);
        let frame = processor.process(&sample_at(1, 0.0));
        assert!(frame.adaptation.is_none());
        assert_eq!(processor.current_adaptation().unwrap().id, "quiet");
        assert_eq!(processor.history().len(), history_len);
    }

    #[test]
    fn test_feedback_updates_catalog_and_current_snapshot() {
        let catalog = AdaptationCatalog::from_profiles(vec![AdaptationProfile::new(
            "quiet",
            MetricVector::uniform(0.0),
            AdaptationDescriptor::default(),
            0.9,
        )]);
        let mut processor =
            NeuroProcessor::with_catalog(PipelineConfig::default(), catalog).unwrap();
        processor.process(&sample_at(0, 0.0));

        for _ in 0..10 {
            processor.provide_feedback("quiet", 1.0);
        }
        assert_eq!(processor.catalog().get("quiet").unwrap().confidence, MAX_CONFIDENCE);
        assert_eq!(processor.current_adaptation().unwrap().confidence, MAX_CONFIDENCE);
        assert!(processor.provide_feedback("unknown", 1.0).is_none());
    }

    #[test]
    fn test_reset_rebuilds_signal_state() {
        let stream = sine_stream(200, 10.0, 1.0);
        let mut used = NeuroProcessor::new();
        for sample in &stream {
            used.process(sample);
        }
        used.reset_signal_state();
        assert!(!used.is_warm());
        assert_eq!(used.current_metrics(), MetricVector::default());

        let mut fresh = NeuroProcessor::new();
        for sample in &stream {
            assert_eq!(used.process(sample).metrics, fresh.process(sample).metrics);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            power_window: 0,
            ..Default::default()
        };
        assert!(NeuroProcessor::with_config(config).is_err());
    }

    #[test]
    fn test_rank_current_covers_catalog() {
        let processor = NeuroProcessor::new();
        let ranking = processor.rank_current();
        assert_eq!(ranking.len(), 5);
        assert!(ranking.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(ranking.iter().all(|r| r.score < 0.6));
    }

    #[test]
    fn test_null_reading_from_json_counts_as_zero() {
        let with_null: Sample = serde_json::from_str(
            r#"{"timestamp":"2024-01-15T10:00:00Z","channels":{"TP9":1.0,"AF7":null,"AF8":1.0,"TP10":1.0},"quality":0.9}"#,
        )
        .unwrap();
        let with_zero: Sample = serde_json::from_str(
            r#"{"timestamp":"2024-01-15T10:00:00Z","channels":{"TP9":1.0,"AF7":0.0,"AF8":1.0,"TP10":1.0},"quality":0.9}"#,
        )
        .unwrap();

        let mut a = NeuroProcessor::new();
        let mut b = NeuroProcessor::new();
        for _ in 0..150 {
            let left = a.process(&with_null);
            let right = b.process(&with_zero);
            assert_eq!(left.input, 0.75);
            assert_eq!(left.metrics, right.metrics);
            for (_, v) in left.metrics.iter() {
                assert!((0.0..=1.0).contains(&v));
            }
        }
        assert_eq!(a.samples_processed(), 150);
    }
}
