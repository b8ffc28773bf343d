//! Feedback learning
//!
//! Online confidence updates driven by externally reported effectiveness.

use crate::catalog::AdaptationCatalog;
use crate::config::DEFAULT_LEARNING_RATE;
use tracing::debug;

/// Nudges profile confidence toward observed effectiveness
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackLearner {
    learning_rate: f64,
}

impl Default for FeedbackLearner {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE)
    }
}

impl FeedbackLearner {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Apply `(effectiveness - 0.5) * learning_rate` to the profile's confidence.
    ///
    /// Effectiveness is clamped to [0, 1]. Unknown ids and NaN effectiveness
    /// are ignored. Returns the new confidence when an update happened.
    pub fn apply_feedback(
        &self,
        catalog: &mut AdaptationCatalog,
        profile_id: &str,
        effectiveness: f64,
    ) -> Option<f64> {
        if effectiveness.is_nan() {
            debug!(profile_id, "ignoring NaN effectiveness");
            return None;
        }

        let current = match catalog.get(profile_id) {
            Some(profile) => profile.confidence,
            None => {
                debug!(profile_id, "feedback for unknown profile ignored");
                return None;
            }
        };

        let delta = (effectiveness.clamp(0.0, 1.0) - 0.5) * self.learning_rate;
        let updated = catalog.set_confidence(profile_id, current + delta)?;
        debug!(profile_id, effectiveness, confidence = updated, "profile confidence updated");
        Some(updated)
    }
}
