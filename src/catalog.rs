//! Adaptation catalog
//!
//! A fixed, ordered list of adaptation profiles. Order matters: it is the
//! tie-break order used by the selector. Only profile confidence changes
//! after construction.

use crate::types::{
    clamp_confidence, AdaptationDescriptor, AdaptationProfile, AnimationIntensity,
    CognitiveSupport, ColorScheme, ContentDensity, InteractionStyle, Metric, MetricVector,
    UiComplexity,
};
use serde::{Deserialize, Serialize};

/// Ordered, fixed-size set of adaptation profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationCatalog {
    profiles: Vec<AdaptationProfile>,
}

impl Default for AdaptationCatalog {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
        }
    }
}

impl AdaptationCatalog {
    /// Build a catalog from custom profiles, keeping their order.
    /// Confidences are clamped into [0.1, 0.95].
    pub fn from_profiles(mut profiles: Vec<AdaptationProfile>) -> Self {
        for profile in &mut profiles {
            profile.confidence = clamp_confidence(profile.confidence);
        }
        Self { profiles }
    }

    pub fn profiles(&self) -> &[AdaptationProfile] {
        &self.profiles
    }

    pub fn get(&self, id: &str) -> Option<&AdaptationProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Overwrite a profile's confidence (clamped). Returns the stored value,
    /// or `None` when no profile has that id.
    pub(crate) fn set_confidence(&mut self, id: &str, confidence: f64) -> Option<f64> {
        let profile = self.profiles.iter_mut().find(|p| p.id == id)?;
        profile.confidence = clamp_confidence(confidence);
        Some(profile.confidence)
    }
}

fn trigger(values: [f64; 8]) -> MetricVector {
    MetricVector::from_fn(|metric| values[metric.index()])
}

/// The seeded profiles.
///
/// Triggers sit near the extremes of each metric so a neutral reading
/// (everything at 0.5) matches none of them above the default threshold.
/// Trigger arrays follow `Metric::ALL` order: attention, relaxation,
/// meditation, engagement, cognitive_load, fatigue, stress, flow.
fn default_profiles() -> Vec<AdaptationProfile> {
    vec![
        AdaptationProfile::new(
            "high-cognitive-load",
            trigger([0.9, 0.1, 0.1, 0.9, 0.95, 0.1, 0.9, 0.1]),
            AdaptationDescriptor {
                ui_complexity: UiComplexity::Minimal,
                color_scheme: ColorScheme::HighContrast,
                animation_intensity: AnimationIntensity::None,
                interaction_style: InteractionStyle::Passive,
                content_density: ContentDensity::Sparse,
                cognitive_support: CognitiveSupport::High,
            },
            0.8,
        ),
        AdaptationProfile::new(
            "flow-state",
            trigger([0.95, 0.1, 0.1, 0.95, 0.1, 0.05, 0.05, 0.95]),
            AdaptationDescriptor {
                ui_complexity: UiComplexity::Standard,
                color_scheme: ColorScheme::Normal,
                animation_intensity: AnimationIntensity::Subtle,
                interaction_style: InteractionStyle::Passive,
                content_density: ContentDensity::Normal,
                cognitive_support: CognitiveSupport::Low,
            },
            0.9,
        ),
        AdaptationProfile::new(
            "low-attention",
            trigger([0.05, 0.9, 0.1, 0.05, 0.1, 0.9, 0.1, 0.05]),
            AdaptationDescriptor {
                ui_complexity: UiComplexity::Standard,
                color_scheme: ColorScheme::HighContrast,
                animation_intensity: AnimationIntensity::Enhanced,
                interaction_style: InteractionStyle::Proactive,
                content_density: ContentDensity::Sparse,
                cognitive_support: CognitiveSupport::High,
            },
            0.7,
        ),
        AdaptationProfile::new(
            "fatigue",
            trigger([0.05, 0.1, 0.1, 0.05, 0.9, 0.95, 0.9, 0.1]),
            AdaptationDescriptor {
                ui_complexity: UiComplexity::Minimal,
                color_scheme: ColorScheme::LowContrast,
                animation_intensity: AnimationIntensity::None,
                interaction_style: InteractionStyle::Passive,
                content_density: ContentDensity::Sparse,
                cognitive_support: CognitiveSupport::High,
            },
            0.75,
        ),
        AdaptationProfile::new(
            "relaxed",
            trigger([0.1, 0.95, 0.9, 0.1, 0.05, 0.1, 0.05, 0.9]),
            AdaptationDescriptor {
                ui_complexity: UiComplexity::Detailed,
                color_scheme: ColorScheme::Normal,
                animation_intensity: AnimationIntensity::Normal,
                interaction_style: InteractionStyle::Standard,
                content_density: ContentDensity::Dense,
                cognitive_support: CognitiveSupport::Low,
            },
            0.7,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MAX_CONFIDENCE, MIN_CONFIDENCE};

    #[test]
    fn test_default_catalog_contents() {
        let catalog = AdaptationCatalog::default();
        let ids: Vec<&str> = catalog.profiles().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "high-cognitive-load",
                "flow-state",
                "low-attention",
                "fatigue",
                "relaxed"
            ]
        );
        for profile in catalog.profiles() {
            assert!(profile.confidence >= MIN_CONFIDENCE && profile.confidence <= MAX_CONFIDENCE);
        }
    }

    #[test]
    fn test_trigger_order_matches_metrics() {
        let catalog = AdaptationCatalog::default();
        let fatigue = catalog.get("fatigue").unwrap();
        assert_eq!(fatigue.trigger.get(Metric::Fatigue), 0.95);
        assert_eq!(fatigue.trigger.get(Metric::Attention), 0.05);
    }

    #[test]
    fn test_set_confidence_clamps_and_ignores_unknown() {
        let mut catalog = AdaptationCatalog::default();
        assert_eq!(catalog.set_confidence("relaxed", 5.0), Some(MAX_CONFIDENCE));
        assert_eq!(catalog.set_confidence("relaxed", -5.0), Some(MIN_CONFIDENCE));
        assert_eq!(catalog.set_confidence("nope", 0.5), None);
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_custom_profiles_are_clamped() {
        let mut wild = AdaptationProfile::new(
            "wild",
            MetricVector::default(),
            AdaptationDescriptor::default(),
            0.5,
        );
        wild.confidence = 3.0;
        let mut broken = wild.clone();
        broken.id = "broken".into();
        broken.confidence = f64::NAN;

        let catalog = AdaptationCatalog::from_profiles(vec![wild, broken]);
        assert_eq!(catalog.get("wild").unwrap().confidence, MAX_CONFIDENCE);
        assert_eq!(catalog.get("broken").unwrap().confidence, MIN_CONFIDENCE);
    }

    #[test]
    fn test_deserialized_catalog_is_clamped() {
        let mut json = serde_json::to_value(AdaptationCatalog::default()).unwrap();
        json["profiles"][0]["confidence"] = serde_json::json!(-4.0);
        let catalog: AdaptationCatalog = serde_json::from_value(json).unwrap();
        assert_eq!(catalog.profiles()[0].confidence, MIN_CONFIDENCE);
    }
}
