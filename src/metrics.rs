//! Cognitive metric derivation
//!
//! Maps band powers into eight metrics, then smooths each metric with a
//! decaying weighted average over its own recent raw values.

use crate::config::{DEFAULT_SMOOTHING_DECAY, DEFAULT_SMOOTHING_WINDOW};
use crate::types::{unit_clamp, BandPowers, Metric, MetricVector};
use std::collections::VecDeque;

/// Guard added to every denominator
pub const EPSILON: f64 = 0.001;

/// Raw (unsmoothed) metrics from one set of band powers, each clamped to [0, 1]
pub fn raw_metrics(p: &BandPowers) -> MetricVector {
    let attention = p.beta / (p.theta + EPSILON);
    let relaxation = p.alpha / (p.beta + p.gamma + EPSILON);
    let meditation = (p.theta + p.alpha) / (p.beta + EPSILON);
    let engagement = (p.beta + p.gamma) / 2.0;
    let cognitive_load = p.gamma + 0.5 * p.beta;
    let fatigue = p.delta / (p.alpha + p.beta + EPSILON);
    let stress = (p.beta - p.alpha).max(0.0);
    let flow = ((p.alpha + p.theta) / 2.0) * (1.0 - (p.beta - 0.3).abs());

    MetricVector {
        attention: unit_clamp(attention),
        relaxation: unit_clamp(relaxation),
        meditation: unit_clamp(meditation),
        engagement: unit_clamp(engagement),
        cognitive_load: unit_clamp(cognitive_load),
        fatigue: unit_clamp(fatigue),
        stress: unit_clamp(stress),
        flow: unit_clamp(flow),
    }
}

/// Stateful metric computer with per-metric smoothing history
#[derive(Debug, Clone)]
pub struct MetricComputer {
    history: [VecDeque<f64>; 8],
    window: usize,
    decay: f64,
}

impl Default for MetricComputer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_WINDOW, DEFAULT_SMOOTHING_DECAY)
    }
}

impl MetricComputer {
    pub fn new(window: usize, decay: f64) -> Self {
        let window = window.max(1);
        Self {
            history: std::array::from_fn(|_| VecDeque::with_capacity(window + 1)),
            window,
            decay,
        }
    }

    /// Compute smoothed metrics for the given band powers
    pub fn compute_metrics(&mut self, powers: &BandPowers) -> MetricVector {
        let raw = raw_metrics(powers);
        MetricVector::from_fn(|metric| self.smooth(metric, raw.get(metric)))
    }

    /// Record a raw value for `metric` and return the weighted average of its history.
    ///
    /// With n values held, the i-th oldest weighs `decay^(n-1-i)`.
    pub fn smooth(&mut self, metric: Metric, raw: f64) -> f64 {
        let history = &mut self.history[metric.index()];
        history.push_back(unit_clamp(raw));
        while history.len() > self.window {
            history.pop_front();
        }

        let n = history.len();
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (i, value) in history.iter().enumerate() {
            let weight = self.decay.powi((n - 1 - i) as i32);
            weighted += weight * value;
            total += weight;
        }

        if total > 0.0 {
            unit_clamp(weighted / total)
        } else {
            0.0
        }
    }

    /// Raw values currently held for `metric`
    pub fn history_len(&self, metric: Metric) -> usize {
        self.history[metric.index()].len()
    }
}
