use super::face_analyzer::FaceAnalyzer;
use super::feature::FeatureVector;
use super::feature_store::FeatureMap;

/// Best candidate for a probe. An empty `name` means nothing scored above 0.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchResult {
    pub name: String,
    pub score: f32,
}

impl MatchResult {
    /// Strictly above `threshold`: a score equal to the threshold is rejected.
    pub fn is_confident(&self, threshold: f32) -> bool {
        !self.name.is_empty() && self.score > threshold
    }
}

/// Scans every stored feature and keeps the highest score.
///
/// Ties go to the entry seen first; an entry must beat the running best
/// (starting at 0.0) to be taken.
pub fn best_match(probe: &FeatureVector, map: &FeatureMap, analyzer: &dyn FaceAnalyzer) -> MatchResult {
    let mut best = MatchResult::default();
    for (name, stored) in map.iter() {
        let score = analyzer.compare(probe, stored);
        if score > best.score {
            best.score = score;
            best.name = name.to_string();
        }
    }
    best
}
