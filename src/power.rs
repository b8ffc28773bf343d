//! Band power estimation
//!
//! Power is the RMS deviation of the last `window` filtered samples from
//! their mean. Until a band's window is full its power reads as 0.

use crate::config::DEFAULT_POWER_WINDOW;
use crate::types::{Band, BandPowers};
use std::collections::VecDeque;

/// Windowed RMS power estimator for the five bands
#[derive(Debug, Clone)]
pub struct BandPowerEstimator {
    buffers: [VecDeque<f64>; 5],
    window: usize,
}

impl Default for BandPowerEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_POWER_WINDOW)
    }
}

impl BandPowerEstimator {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            buffers: std::array::from_fn(|_| VecDeque::with_capacity(window + 1)),
            window,
        }
    }

    /// Add a filtered sample to `band` and return its current power
    pub fn estimate_power(&mut self, filtered: f64, band: Band) -> f64 {
        let buffer = &mut self.buffers[band.index()];
        buffer.push_back(if filtered.is_finite() { filtered } else { 0.0 });
        while buffer.len() > self.window {
            buffer.pop_front();
        }

        if buffer.len() < self.window {
            return 0.0;
        }

        let n = buffer.len() as f64;
        let mean = buffer.iter().sum::<f64>() / n;
        let variance = buffer.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let power = variance.sqrt();

        if power.is_finite() {
            power
        } else {
            0.0
        }
    }

    /// Feed one filter-bank output through every band
    pub fn estimate_all(&mut self, filtered: &BandPowers) -> BandPowers {
        let mut powers = BandPowers::default();
        for band in Band::ALL {
            powers.set(band, self.estimate_power(filtered.get(band), band));
        }
        powers
    }

    /// Samples currently buffered for `band`
    pub fn buffered(&self, band: Band) -> usize {
        self.buffers[band.index()].len()
    }

    pub fn is_warm(&self) -> bool {
        self.buffers.iter().all(|b| b.len() >= self.window)
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
