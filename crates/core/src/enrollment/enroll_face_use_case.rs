use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::face_detector::FaceDetector;
use crate::recognition::domain::face_analyzer::FaceAnalyzer;
use crate::recognition::domain::feature::FeatureVector;
use crate::shared::frame::Frame;
use crate::video::infrastructure::image_file_loader::load_frame;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("failed to load image {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("face detection failed: {0}")]
    Detection(Box<dyn std::error::Error>),
}

/// Names for `count` enrolled faces: the base name alone for a single face,
/// `base-<i>` for several, and just `<i>` when the base name is empty.
pub fn assign_names(base: &str, count: usize) -> Vec<String> {
    match count {
        1 if !base.is_empty() => vec![base.to_string()],
        _ if base.is_empty() => (0..count).map(|i| i.to_string()).collect(),
        _ => (0..count).map(|i| format!("{base}-{i}")).collect(),
    }
}

/// Every face found in an image, with the ones whose feature extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Faces detected, including those whose extraction failed.
    pub face_count: usize,
    pub features: Vec<(String, FeatureVector)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Accepted {
        face_count: usize,
        name: String,
        encoded_feature: String,
    },
    Rejected {
        face_count: usize,
    },
}

impl EnrollmentOutcome {
    pub fn face_count(&self) -> usize {
        match self {
            EnrollmentOutcome::Accepted { face_count, .. }
            | EnrollmentOutcome::Rejected { face_count } => *face_count,
        }
    }

    /// The base64 feature to store, present only for an accepted enrollment.
    pub fn payload(&self) -> Option<&str> {
        match self {
            EnrollmentOutcome::Accepted {
                encoded_feature, ..
            } => Some(encoded_feature),
            EnrollmentOutcome::Rejected { .. } => None,
        }
    }
}

/// Turns a still photo into a feature the web application can store.
pub struct EnrollFaceUseCase {
    detector: Box<dyn FaceDetector>,
    analyzer: Arc<dyn FaceAnalyzer>,
}

impl EnrollFaceUseCase {
    pub fn new(detector: Box<dyn FaceDetector>, analyzer: Arc<dyn FaceAnalyzer>) -> Self {
        Self { detector, analyzer }
    }

    /// Detects every face and extracts a feature for each, dropping faces
    /// whose extraction failed before names are assigned.
    pub fn extract_features(&mut self, frame: &Frame, name: &str) -> Result<Extraction, EnrollError> {
        let faces = self.detector.detect(frame).map_err(EnrollError::Detection)?;
        let features: Vec<FeatureVector> = faces
            .iter()
            .filter_map(|face| match self.analyzer.extract_feature(frame, &face.region) {
                Ok(feature) => Some(feature),
                Err(e) => {
                    log::warn!("Skipping face {}: {e}", face.track_id);
                    None
                }
            })
            .collect();
        let names = assign_names(name, features.len());
        Ok(Extraction {
            face_count: faces.len(),
            features: names.into_iter().zip(features).collect(),
        })
    }

    /// Accepts the photo only when it shows exactly one usable face.
    pub fn enroll(&mut self, frame: &Frame, name: &str) -> Result<EnrollmentOutcome, EnrollError> {
        let extraction = self.extract_features(frame, name)?;
        log::info!(
            "Found {} face(s), {} usable",
            extraction.face_count,
            extraction.features.len()
        );
        if extraction.face_count != 1 {
            return Ok(EnrollmentOutcome::Rejected {
                face_count: extraction.face_count,
            });
        }
        match extraction.features.into_iter().next() {
            Some((name, feature)) => Ok(EnrollmentOutcome::Accepted {
                face_count: 1,
                name,
                encoded_feature: feature.to_base64(),
            }),
            None => Ok(EnrollmentOutcome::Rejected { face_count: 1 }),
        }
    }

    pub fn enroll_file(&mut self, path: &Path, name: &str) -> Result<EnrollmentOutcome, EnrollError> {
        let frame = load_frame(path).map_err(|source| EnrollError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        self.enroll(&frame, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::DetectedFace;
    use crate::recognition::domain::face_analyzer::AnalysisError;
    use crate::recognition::domain::feature::FaceAttributes;
    use crate::shared::region::Region;
    use rstest::rstest;

    struct StubDetector {
        faces: Vec<DetectedFace>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, _: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
            Ok(self.faces.clone())
        }
    }

    /// Encodes the region's x offset as the feature; fails for x < 0.
    struct StubAnalyzer;

    impl FaceAnalyzer for StubAnalyzer {
        fn extract_feature(&self, _: &Frame, region: &Region) -> Result<FeatureVector, AnalysisError> {
            if region.x < 0 {
                return Err(AnalysisError::EmptyRegion(*region));
            }
            Ok(FeatureVector::new(vec![region.x as u8]))
        }

        fn compute_attributes(&self, _: &Frame, _: &Region) -> Result<FaceAttributes, AnalysisError> {
            Err(AnalysisError::ModelUnavailable("attributes"))
        }

        fn compare(&self, _: &FeatureVector, _: &FeatureVector) -> f32 {
            0.0
        }
    }

    fn use_case(xs: &[i32]) -> EnrollFaceUseCase {
        let faces = xs
            .iter()
            .enumerate()
            .map(|(i, &x)| DetectedFace {
                track_id: i as u32 + 1,
                region: Region::new(x, 10, 60, 60),
            })
            .collect();
        EnrollFaceUseCase::new(Box::new(StubDetector { faces }), Arc::new(StubAnalyzer))
    }

    fn photo() -> Frame {
        Frame::filled(200, 200, [120, 120, 120], 0)
    }

    #[rstest]
    #[case::single("alice", 1, vec!["alice"])]
    #[case::several("bob", 2, vec!["bob-0", "bob-1"])]
    #[case::unnamed_single("", 1, vec!["0"])]
    #[case::unnamed_several("", 3, vec!["0", "1", "2"])]
    #[case::none("carol", 0, vec![])]
    fn test_assign_names(#[case] base: &str, #[case] count: usize, #[case] expected: Vec<&str>) {
        assert_eq!(assign_names(base, count), expected);
    }

    #[test]
    fn test_single_face_is_accepted_with_payload() {
        let outcome = use_case(&[7]).enroll(&photo(), "alice").unwrap();

        assert_eq!(outcome.face_count(), 1);
        assert_eq!(outcome.payload(), Some(FeatureVector::new(vec![7]).to_base64().as_str()));
        assert!(matches!(outcome, EnrollmentOutcome::Accepted { ref name, .. } if name == "alice"));
    }

    #[test]
    fn test_no_face_is_rejected() {
        let outcome = use_case(&[]).enroll(&photo(), "alice").unwrap();
        assert_eq!(outcome, EnrollmentOutcome::Rejected { face_count: 0 });
        assert_eq!(outcome.payload(), None);
    }

    #[test]
    fn test_two_faces_are_rejected() {
        let outcome = use_case(&[7, 90]).enroll(&photo(), "bob").unwrap();
        assert_eq!(outcome, EnrollmentOutcome::Rejected { face_count: 2 });
    }

    #[test]
    fn test_two_faces_get_suffixed_names() {
        let extraction = use_case(&[7, 90]).extract_features(&photo(), "bob").unwrap();

        assert_eq!(extraction.face_count, 2);
        let names: Vec<&str> = extraction.features.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["bob-0", "bob-1"]);
        assert_eq!(extraction.features[1].1, FeatureVector::new(vec![90]));
    }

    #[test]
    fn test_failed_extraction_still_counts_as_detected() {
        let extraction = use_case(&[-5, 40]).extract_features(&photo(), "dan").unwrap();

        assert_eq!(extraction.face_count, 2);
        assert_eq!(extraction.features.len(), 1);
        assert_eq!(extraction.features[0].0, "dan");
    }

    #[test]
    fn test_single_face_with_failed_extraction_is_rejected() {
        let outcome = use_case(&[-5]).enroll(&photo(), "erin").unwrap();
        assert_eq!(outcome, EnrollmentOutcome::Rejected { face_count: 1 });
    }

    #[test]
    fn test_enroll_file_reads_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.png");
        image::RgbImage::new(64, 64).save(&path).unwrap();

        let outcome = use_case(&[3]).enroll_file(&path, "alice").unwrap();

        assert!(outcome.payload().is_some());
    }

    #[test]
    fn test_enroll_missing_file_is_load_error() {
        let err = use_case(&[3])
            .enroll_file(Path::new("/nonexistent/alice.png"), "alice")
            .unwrap_err();
        assert!(matches!(err, EnrollError::Load { .. }));
    }
}
