use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::feature::{FaceAttributes, FeatureVector};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("face region {0:?} lies outside the frame")]
    EmptyRegion(Region),
    #[error("{0} model is not configured")]
    ModelUnavailable(&'static str),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Per-face capabilities of the recognition provider.
///
/// Shared by the enrichment workers and enrollment, so implementations
/// take `&self` and serialize internally where the backend requires it.
pub trait FaceAnalyzer: Send + Sync {
    fn extract_feature(&self, frame: &Frame, region: &Region)
        -> Result<FeatureVector, AnalysisError>;

    fn compute_attributes(
        &self,
        frame: &Frame,
        region: &Region,
    ) -> Result<FaceAttributes, AnalysisError>;

    /// Similarity in `[0, 1]`; higher means more alike.
    fn compare(&self, a: &FeatureVector, b: &FeatureVector) -> f32;
}
