//! Synthetic signal source
//!
//! Development collaborator that produces multi-channel EEG-like samples
//! shaped toward a target mental state, plus a `DeviceLink` that "connects"
//! to it. Output is fully determined by the seed.

use crate::device::DeviceLink;
use crate::error::NeuroError;
use crate::types::{Band, DeviceInfo, DeviceKind, Sample};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// Default channel montage
pub const DEFAULT_CHANNELS: [&str; 4] = ["TP9", "AF7", "AF8", "TP10"];

/// Mental state the generator imitates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentalState {
    Neutral,
    Focused,
    Relaxed,
    Fatigued,
    Stressed,
}

impl MentalState {
    /// Sine amplitude per band, in `Band::ALL` order
    fn band_amplitudes(&self) -> [f64; 5] {
        match self {
            MentalState::Neutral => [0.3, 0.3, 0.3, 0.3, 0.1],
            MentalState::Focused => [0.1, 0.15, 0.3, 0.6, 0.4],
            MentalState::Relaxed => [0.2, 0.4, 0.9, 0.15, 0.05],
            MentalState::Fatigued => [0.9, 0.5, 0.2, 0.15, 0.05],
            MentalState::Stressed => [0.1, 0.1, 0.1, 0.9, 0.6],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MentalState::Neutral => "neutral",
            MentalState::Focused => "focused",
            MentalState::Relaxed => "relaxed",
            MentalState::Fatigued => "fatigued",
            MentalState::Stressed => "stressed",
        }
    }
}

impl FromStr for MentalState {
    type Err = NeuroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" => Ok(MentalState::Neutral),
            "focused" => Ok(MentalState::Focused),
            "relaxed" => Ok(MentalState::Relaxed),
            "fatigued" => Ok(MentalState::Fatigued),
            "stressed" => Ok(MentalState::Stressed),
            other => Err(NeuroError::ParseError(format!(
                "unknown mental state '{}' (expected neutral, focused, relaxed, fatigued or stressed)",
                other
            ))),
        }
    }
}

/// Seeded multi-channel sample generator
pub struct SyntheticSource {
    rng: StdRng,
    state: MentalState,
    sample_rate_hz: f64,
    channels: Vec<String>,
    noise: f64,
    start: DateTime<Utc>,
    index: u64,
}

impl SyntheticSource {
    pub fn new(seed: u64, state: MentalState, sample_rate_hz: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            state,
            sample_rate_hz,
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            noise: 0.05,
            start: Utc::now(),
            index: 0,
        }
    }

    /// Fix the timestamp of the first sample
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    pub fn set_state(&mut self, state: MentalState) {
        self.state = state;
    }

    pub fn state(&self) -> MentalState {
        self.state
    }

    /// Produce the next sample
    pub fn next_sample(&mut self) -> Sample {
        let t = self.index as f64 / self.sample_rate_hz;
        let amplitudes = self.state.band_amplitudes();

        let mut clean = 0.0;
        for band in Band::ALL {
            let (low, high) = band.range_hz();
            let centre = (low * high).sqrt();
            clean += amplitudes[band.index()] * (2.0 * std::f64::consts::PI * centre * t).sin();
        }

        let mut channels = BTreeMap::new();
        for name in &self.channels {
            let noise = if self.noise > 0.0 {
                self.rng.gen_range(-self.noise..self.noise)
            } else {
                0.0
            };
            channels.insert(name.clone(), clean + noise);
        }

        let quality = self.rng.gen_range(0.85..1.0);
        let micros = (self.index as f64 * 1_000_000.0 / self.sample_rate_hz) as i64;
        let timestamp = self.start + Duration::microseconds(micros);
        self.index += 1;

        Sample::new(timestamp, channels, quality)
    }

    /// Produce `n` consecutive samples
    pub fn take(&mut self, n: usize) -> Vec<Sample> {
        (0..n).map(|_| self.next_sample()).collect()
    }
}

/// `DeviceLink` for the synthetic source
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    name: String,
    channel_count: usize,
    latency: StdDuration,
    fail_with: Option<String>,
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self {
            name: "Synthetic EEG".to_string(),
            channel_count: DEFAULT_CHANNELS.len(),
            latency: StdDuration::from_millis(0),
            fail_with: None,
        }
    }
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before `open` resolves
    pub fn with_latency(mut self, latency: StdDuration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every `open` fail with this message
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

#[async_trait]
impl DeviceLink for SimulatedLink {
    async fn open(&self, kind: DeviceKind) -> Result<DeviceInfo, NeuroError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(NeuroError::ConnectionFailed(message.clone()));
        }
        Ok(DeviceInfo {
            name: self.name.clone(),
            kind,
            channel_count: self.channel_count,
        })
    }
}
