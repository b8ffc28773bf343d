//! Core types for the Synheart Neuro pipeline
//!
//! This module defines the records that flow through each stage of the
//! pipeline: raw samples, band powers, metric vectors, adaptation profiles
//! and the events recorded when a profile is selected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Clamp a value into [0, 1], mapping NaN to 0.
pub fn unit_clamp(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A single multi-channel reading produced by the ingestion collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Capture time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Named channel readings (e.g. "TP9" -> microvolts). A JSON `null`
    /// reading is kept as NaN and read back as 0.
    #[serde(default, deserialize_with = "deserialize_readings")]
    pub channels: BTreeMap<String, f64>,
    /// Signal quality reported by the device (0-1)
    #[serde(default = "default_quality", deserialize_with = "deserialize_reading")]
    pub quality: f64,
}

fn default_quality() -> f64 {
    1.0
}

// JSON null stands for a non-finite reading
fn deserialize_reading<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn deserialize_readings<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name, value.unwrap_or(f64::NAN)))
        .collect())
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, channels: BTreeMap<String, f64>, quality: f64) -> Self {
        Self {
            timestamp,
            channels,
            quality,
        }
    }

    /// Reading for a channel, with missing or non-finite values treated as 0.
    pub fn channel(&self, name: &str) -> f64 {
        match self.channels.get(name) {
            Some(v) if v.is_finite() => *v,
            _ => 0.0,
        }
    }

    /// Quality clamped into [0, 1]; non-finite quality reads as 0.
    pub fn sanitized_quality(&self) -> f64 {
        if self.quality.is_finite() {
            self.quality.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// True when any channel is non-finite or the quality is out of range.
    pub fn is_malformed(&self) -> bool {
        self.channels.values().any(|v| !v.is_finite())
            || !(0.0..=1.0).contains(&self.quality)
    }
}

/// EEG frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    /// Pass band edges in Hz
    pub fn range_hz(&self) -> (f64, f64) {
        match self {
            Band::Delta => (0.5, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 13.0),
            Band::Beta => (13.0, 30.0),
            Band::Gamma => (30.0, 100.0),
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Per-band values (filtered scalars or powers)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandPowers {
    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    pub fn set(&mut self, band: Band, value: f64) {
        match band {
            Band::Delta => self.delta = value,
            Band::Theta => self.theta = value,
            Band::Alpha => self.alpha = value,
            Band::Beta => self.beta = value,
            Band::Gamma => self.gamma = value,
        }
    }
}

/// Cognitive/affective metric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Attention,
    Relaxation,
    Meditation,
    Engagement,
    CognitiveLoad,
    Fatigue,
    Stress,
    Flow,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Attention,
        Metric::Relaxation,
        Metric::Meditation,
        Metric::Engagement,
        Metric::CognitiveLoad,
        Metric::Fatigue,
        Metric::Stress,
        Metric::Flow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Attention => "attention",
            Metric::Relaxation => "relaxation",
            Metric::Meditation => "meditation",
            Metric::Engagement => "engagement",
            Metric::CognitiveLoad => "cognitive_load",
            Metric::Fatigue => "fatigue",
            Metric::Stress => "stress",
            Metric::Flow => "flow",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// The canonical "neural state": eight metrics, each held in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricVector {
    pub attention: f64,
    pub relaxation: f64,
    pub meditation: f64,
    pub engagement: f64,
    pub cognitive_load: f64,
    pub fatigue: f64,
    pub stress: f64,
    pub flow: f64,
}

impl Default for MetricVector {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

impl MetricVector {
    /// Vector with every metric set to `value` (clamped)
    pub fn uniform(value: f64) -> Self {
        let v = unit_clamp(value);
        Self {
            attention: v,
            relaxation: v,
            meditation: v,
            engagement: v,
            cognitive_load: v,
            fatigue: v,
            stress: v,
            flow: v,
        }
    }

    /// Build a vector from a per-metric function; every value is clamped.
    pub fn from_fn(mut f: impl FnMut(Metric) -> f64) -> Self {
        let mut out = Self::uniform(0.0);
        for metric in Metric::ALL {
            out.set(metric, f(metric));
        }
        out
    }

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

    /// Set a metric; the value is clamped into [0, 1].
    pub fn set(&mut self, metric: Metric, value: f64) {
        let v = unit_clamp(value);
        match metric {
            Metric::Attention => self.attention = v,
            Metric::Relaxation => self.relaxation = v,
            Metric::Meditation => self.meditation = v,
            Metric::Engagement => self.engagement = v,
            Metric::CognitiveLoad => self.cognitive_load = v,
            Metric::Fatigue => self.fatigue = v,
            Metric::Stress => self.stress = v,
            Metric::Flow => self.flow = v,
        }
    }

    /// Builder-style setter used to declare trigger vectors
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.iter().map(move |m| (*m, self.get(*m)))
    }

    /// Metric name -> value map, keyed by the snake_case metric names
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter().map(|(m, v)| (m.as_str().to_string(), v)).collect()
    }
}

/// How much UI chrome to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiComplexity {
    Minimal,
    Standard,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    HighContrast,
    Normal,
    LowContrast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationIntensity {
    None,
    Subtle,
    Normal,
    Enhanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionStyle {
    Passive,
    Standard,
    Proactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentDensity {
    Sparse,
    Normal,
    Dense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CognitiveSupport {
    High,
    Medium,
    Low,
}

/// Concrete UI-adaptation policy attached to a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationDescriptor {
    pub ui_complexity: UiComplexity,
    pub color_scheme: ColorScheme,
    pub animation_intensity: AnimationIntensity,
    pub interaction_style: InteractionStyle,
    pub content_density: ContentDensity,
    pub cognitive_support: CognitiveSupport,
}

impl Default for AdaptationDescriptor {
    fn default() -> Self {
        Self {
            ui_complexity: UiComplexity::Standard,
            color_scheme: ColorScheme::Normal,
            animation_intensity: AnimationIntensity::Normal,
            interaction_style: InteractionStyle::Standard,
            content_density: ContentDensity::Normal,
            cognitive_support: CognitiveSupport::Medium,
        }
    }
}

/// Lowest confidence a profile may reach
pub const MIN_CONFIDENCE: f64 = 0.1;
/// Highest confidence a profile may reach
pub const MAX_CONFIDENCE: f64 = 0.95;

/// A rule mapping a target mental state to a UI adaptation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationProfile {
    pub id: String,
    pub trigger: MetricVector,
    pub adaptation: AdaptationDescriptor,
    /// Learned reliability, always within [0.1, 0.95]
    #[serde(deserialize_with = "deserialize_confidence")]
    pub confidence: f64,
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(clamp_confidence(f64::deserialize(deserializer)?))
}

impl AdaptationProfile {
    pub fn new(
        id: impl Into<String>,
        trigger: MetricVector,
        adaptation: AdaptationDescriptor,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            trigger,
            adaptation,
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Clamp a confidence into [MIN_CONFIDENCE, MAX_CONFIDENCE], mapping NaN to the floor.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        MIN_CONFIDENCE
    } else {
        value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }
}

/// Record of a profile selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationEvent {
    /// Profile snapshot at selection time
    pub profile: AdaptationProfile,
    /// Metrics that triggered the selection
    pub metrics: MetricVector,
    /// Similarity score that won the selection
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Kind of device the transport collaborator connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Bluetooth,
    Usb,
    Simulated,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Bluetooth => "bluetooth",
            DeviceKind::Usb => "usb",
            DeviceKind::Simulated => "simulated",
        }
    }
}

/// Device description reported by the transport on connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    pub channel_count: usize,
}

/// Session connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything one pass of the pipeline produced for a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFrame {
    pub timestamp: DateTime<Utc>,
    /// Sanitized sample quality (0-1)
    pub quality: f64,
    /// Scalar fed into the filter bank
    pub input: f64,
    pub band_powers: BandPowers,
    pub metrics: MetricVector,
    /// Profile selected for this sample, if any scored above threshold
    pub adaptation: Option<AdaptationProfile>,
    /// Score of the selected profile
    pub score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_clamp_handles_non_finite() {
        assert_eq!(unit_clamp(f64::NAN), 0.0);
        assert_eq!(unit_clamp(f64::INFINITY), 1.0);
        assert_eq!(unit_clamp(f64::NEG_INFINITY), 0.0);
        assert_eq!(unit_clamp(0.42), 0.42);
    }

    #[test]
    fn test_metric_vector_set_clamps() {
        let mut v = MetricVector::default();
        v.set(Metric::Stress, 3.0);
        v.set(Metric::Flow, -1.0);
        v.set(Metric::Fatigue, f64::NAN);
        assert_eq!(v.stress, 1.0);
        assert_eq!(v.flow, 0.0);
        assert_eq!(v.fatigue, 0.0);
        assert_eq!(v.attention, 0.5);
    }

    #[test]
    fn test_sample_channel_defaults() {
        let mut channels = BTreeMap::new();
        channels.insert("TP9".to_string(), 12.0);
        channels.insert("AF7".to_string(), f64::NAN);
        let sample = Sample::new(Utc::now(), channels, 1.5);

        assert_eq!(sample.channel("TP9"), 12.0);
        assert_eq!(sample.channel("AF7"), 0.0);
        assert_eq!(sample.channel("missing"), 0.0);
        assert_eq!(sample.sanitized_quality(), 1.0);
        assert!(sample.is_malformed());
    }

    #[test]
    fn test_descriptor_serializes_kebab_case() {
        let descriptor = AdaptationDescriptor {
            color_scheme: ColorScheme::HighContrast,
            ..Default::default()
        };
        let json = serde_json::to_value(descriptor).unwrap();
        assert_eq!(json["color_scheme"], "high-contrast");
        assert_eq!(json["ui_complexity"], "standard");
    }

    #[test]
    fn test_profile_confidence_clamped_on_construction() {
        let profile = AdaptationProfile::new(
            "p",
            MetricVector::default(),
            AdaptationDescriptor::default(),
            2.0,
        );
        assert_eq!(profile.confidence, MAX_CONFIDENCE);
    }

    #[test]
    fn test_sample_deserializes_with_defaults() {
        let sample: Sample =
            serde_json::from_str(r#"{"timestamp":"2024-01-15T14:00:00Z"}"#).unwrap();
        assert!(sample.channels.is_empty());
        assert_eq!(sample.quality, 1.0);
    }

    #[test]
    fn test_sample_null_readings_become_non_finite() {
        let sample: Sample = serde_json::from_str(
            r#"{"timestamp":"2024-01-15T10:00:00Z","channels":{"TP9":1.0,"AF7":null},"quality":null}"#,
        )
        .unwrap();
        assert_eq!(sample.channel("TP9"), 1.0);
        assert!(sample.channels["AF7"].is_nan());
        assert_eq!(sample.channel("AF7"), 0.0);
        assert_eq!(sample.sanitized_quality(), 0.0);
        assert!(sample.is_malformed());

        // and a sample holding NaN survives its own JSON form
        let json = serde_json::to_string(&sample).unwrap();
        let reparsed: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed.channel("AF7"), 0.0);
    }

    #[test]
    fn test_profile_confidence_clamped_on_deserialize() {
        let mut json = serde_json::to_value(AdaptationProfile::new(
            "p",
            MetricVector::default(),
            AdaptationDescriptor::default(),
            0.5,
        ))
        .unwrap();
        json["confidence"] = serde_json::json!(-4.0);
        let profile: AdaptationProfile = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(profile.confidence, MIN_CONFIDENCE);

        json["confidence"] = serde_json::json!(3.0);
        let profile: AdaptationProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.confidence, MAX_CONFIDENCE);
    }
}
