//! Adaptation selection
//!
//! Scores the current metric vector against every catalog trigger:
//!
//! ```text
//! score = sum(w_m * (1 - |current_m - trigger_m|)) / sum(w_m)
//! ```
//!
//! The best profile fires only when its score is strictly above the
//! activation threshold. Ties go to the profile declared first.

use crate::catalog::AdaptationCatalog;
use crate::config::{MetricWeights, DEFAULT_ACTIVATION_THRESHOLD};
use crate::types::{AdaptationProfile, Metric, MetricVector};
use serde::{Deserialize, Serialize};

/// A profile id with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileScore {
    pub id: String,
    pub score: f64,
}

/// Weighted-similarity profile selector
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSelector {
    weights: MetricWeights,
    threshold: f64,
}

impl Default for AdaptationSelector {
    fn default() -> Self {
        Self::new(MetricWeights::default(), DEFAULT_ACTIVATION_THRESHOLD)
    }
}

impl AdaptationSelector {
    pub fn new(weights: MetricWeights, threshold: f64) -> Self {
        Self { weights, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Weighted similarity between `current` and `trigger`, in [0, 1]
    pub fn score(&self, current: &MetricVector, trigger: &MetricVector) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for metric in Metric::ALL {
            let weight = self.weights.get(metric);
            weighted += weight * (1.0 - (current.get(metric) - trigger.get(metric)).abs());
            total += weight;
        }
        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    /// Best profile scoring above threshold, with its score
    pub fn select<'a>(
        &self,
        current: &MetricVector,
        catalog: &'a AdaptationCatalog,
    ) -> Option<(&'a AdaptationProfile, f64)> {
        let mut best: Option<(&AdaptationProfile, f64)> = None;
        for profile in catalog.profiles() {
            let score = self.score(current, &profile.trigger);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((profile, score)),
            }
        }
        best.filter(|(_, score)| *score > self.threshold)
    }

    /// Select and return an owned snapshot of the winning profile
    pub fn select_adaptation(
        &self,
        current: &MetricVector,
        catalog: &AdaptationCatalog,
    ) -> Option<AdaptationProfile> {
        self.select(current, catalog).map(|(p, _)| p.clone())
    }

    /// Every profile's score, best first (declaration order among ties)
    pub fn rank(&self, current: &MetricVector, catalog: &AdaptationCatalog) -> Vec<ProfileScore> {
        let mut scores: Vec<ProfileScore> = catalog
            .profiles()
            .iter()
            .map(|p| ProfileScore {
                id: p.id.clone(),
                score: self.score(current, &p.trigger),
            })
            .collect();
        // stable sort keeps declaration order for equal scores
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdaptationDescriptor;

    fn profile(id: &str, trigger: MetricVector) -> AdaptationProfile {
        AdaptationProfile::new(id, trigger, AdaptationDescriptor::default(), 0.7)
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let selector = AdaptationSelector::default();
        let v = MetricVector::uniform(0.3);
        assert!((selector.score(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_opposite_vectors_score_zero() {
        let selector = AdaptationSelector::default();
        let score = selector.score(&MetricVector::uniform(0.0), &MetricVector::uniform(1.0));
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn test_high_cognitive_load_scenario() {
        let catalog = AdaptationCatalog::from_profiles(vec![
            profile(
                "relaxed",
                MetricVector::default()
                    .with(Metric::Relaxation, 0.8)
                    .with(Metric::Meditation, 0.7)
                    .with(Metric::CognitiveLoad, 0.2)
                    .with(Metric::Stress, 0.2),
            ),
            profile(
                "high-cognitive-load",
                MetricVector::default()
                    .with(Metric::CognitiveLoad, 0.8)
                    .with(Metric::Stress, 0.7),
            ),
        ]);
        let current = MetricVector::default()
            .with(Metric::Attention, 0.9)
            .with(Metric::CognitiveLoad, 0.85)
            .with(Metric::Stress, 0.8);

        let selector = AdaptationSelector::default();
        let (selected, score) = selector.select(&current, &catalog).unwrap();
        assert_eq!(selected.id, "high-cognitive-load");
        assert!(score > 0.6);

        let ranking = selector.rank(&current, &catalog);
        assert_eq!(ranking[0].id, "high-cognitive-load");
    }

    #[test]
    fn test_flow_state_beats_fatigue() {
        let catalog = AdaptationCatalog::from_profiles(vec![
            profile("fatigue", MetricVector::default().with(Metric::Fatigue, 0.7)),
            profile(
                "flow-state",
                MetricVector::default()
                    .with(Metric::Attention, 0.8)
                    .with(Metric::Engagement, 0.8)
                    .with(Metric::Flow, 0.9),
            ),
        ]);
        let current = MetricVector::default()
            .with(Metric::Flow, 0.85)
            .with(Metric::Attention, 0.75)
            .with(Metric::Engagement, 0.8);

        let selected = AdaptationSelector::default()
            .select_adaptation(&current, &catalog)
            .unwrap();
        assert_eq!(selected.id, "flow-state");
    }

    #[test]
    fn test_default_catalog_selects_high_cognitive_load() {
        let current = MetricVector::default()
            .with(Metric::Attention, 0.9)
            .with(Metric::CognitiveLoad, 0.85)
            .with(Metric::Stress, 0.8);

        let selector = AdaptationSelector::default();
        let catalog = AdaptationCatalog::default();
        let (selected, score) = selector
            .select(&current, &catalog)
            .unwrap();
        assert_eq!(selected.id, "high-cognitive-load");
        assert!(score > 0.7, "scored {}", score);
    }

    #[test]
    fn test_default_catalog_prefers_flow_over_fatigue() {
        let catalog = AdaptationCatalog::default();
        let current = MetricVector::default()
            .with(Metric::Flow, 0.85)
            .with(Metric::Attention, 0.75)
            .with(Metric::Engagement, 0.8);

        let selector = AdaptationSelector::default();
        let selected = selector.select_adaptation(&current, &catalog).unwrap();
        assert_eq!(selected.id, "flow-state");

        let flow = selector.score(&current, &catalog.get("flow-state").unwrap().trigger);
        let fatigue = selector.score(&current, &catalog.get("fatigue").unwrap().trigger);
        assert!(flow > fatigue);
    }

    #[test]
    fn test_neutral_vector_selects_nothing_from_default_catalog() {
        let selector = AdaptationSelector::default();
        let catalog = AdaptationCatalog::default();
        let neutral = MetricVector::default();

        for ranked in selector.rank(&neutral, &catalog) {
            assert!(ranked.score > 0.5, "{} scored {}", ranked.id, ranked.score);
            assert!(ranked.score < 0.6, "{} scored {}", ranked.id, ranked.score);
        }
        assert!(selector.select_adaptation(&neutral, &catalog).is_none());
    }

    #[test]
    fn test_default_flow_profile_matches_flow_metrics() {
        let catalog = AdaptationCatalog::default();
        let flow = catalog.get("flow-state").unwrap().trigger;
        let selected = AdaptationSelector::default()
            .select_adaptation(&flow, &catalog)
            .unwrap();
        assert_eq!(selected.id, "flow-state");
    }

    #[test]
    fn test_ties_go_to_first_declared() {
        let trigger = MetricVector::uniform(0.4);
        let catalog = AdaptationCatalog::from_profiles(vec![
            profile("first", trigger),
            profile("second", trigger),
        ]);
        let selector = AdaptationSelector::default();
        let selected = selector.select_adaptation(&trigger, &catalog).unwrap();
        assert_eq!(selected.id, "first");

        let ranking = selector.rank(&trigger, &catalog);
        assert_eq!(ranking[0].id, "first");
        assert_eq!(ranking[1].id, "second");
    }

    #[test]
    fn test_threshold_is_strict() {
        let catalog =
            AdaptationCatalog::from_profiles(vec![profile("exact", MetricVector::uniform(1.0))]);
        // Every metric off by exactly 0.5 scores exactly 0.5
        let selector = AdaptationSelector::new(MetricWeights::default(), 0.5);
        assert!(selector
            .select_adaptation(&MetricVector::uniform(0.5), &catalog)
            .is_none());
    }

    #[test]
    fn test_empty_catalog_selects_nothing() {
        let catalog = AdaptationCatalog::from_profiles(Vec::new());
        assert!(AdaptationSelector::default()
            .select_adaptation(&MetricVector::default(), &catalog)
            .is_none());
    }
}
