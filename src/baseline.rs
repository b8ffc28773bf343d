//! Calibration baseline
//!
//! Accumulates metric readings during a calibration window and reduces
//! them to per-metric arithmetic means. The stored baseline is exposed to
//! callers but not consumed by the metric formulas or the selector.

use crate::types::{Metric, MetricVector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-metric baseline averages captured by a finished calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBaseline {
    /// Metric name -> mean over the calibration window
    pub averages: BTreeMap<String, f64>,
    /// Number of readings averaged
    pub sample_count: usize,
    pub captured_at: DateTime<Utc>,
}

impl CalibrationBaseline {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.averages.get(metric.as_str()).copied()
    }

    /// Baseline as a metric vector (missing metrics read as neutral 0.5)
    pub fn as_vector(&self) -> MetricVector {
        let mut vector = MetricVector::default();
        for metric in Metric::ALL {
            if let Some(v) = self.get(metric) {
                vector.set(metric, v);
            }
        }
        vector
    }
}

/// Running per-metric sums for an in-flight calibration
#[derive(Debug, Clone, Default)]
pub struct BaselineAccumulator {
    sums: [f64; 8],
    count: usize,
}

impl BaselineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, metrics: &MetricVector) {
        for (metric, value) in metrics.iter() {
            self.sums[metric.index()] += value;
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Reduce to a baseline; `None` when nothing was collected
    pub fn finish(&self, captured_at: DateTime<Utc>) -> Option<CalibrationBaseline> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let averages = Metric::ALL
            .iter()
            .map(|m| (m.as_str().to_string(), self.sums[m.index()] / n))
            .collect();

        Some(CalibrationBaseline {
            averages,
            sample_count: self.count,
            captured_at,
        })
    }
}
