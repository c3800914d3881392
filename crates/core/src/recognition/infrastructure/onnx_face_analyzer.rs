/// Face analysis backed by ONNX Runtime.
///
/// Identity features come from an ArcFace embedding model. Gender and age
/// come from an InsightFace-style `genderage` model and liveness from a
/// MiniFASNet-style anti-spoofing classifier. The two attribute models are
/// optional; without them `compute_attributes` reports the missing model.
use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;

use crate::recognition::domain::face_analyzer::{AnalysisError, FaceAnalyzer};
use crate::recognition::domain::feature::{FaceAttributes, FeatureVector, Gender};
use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::onnx_session::load_session;
use crate::shared::region::Region;

const EMBEDDING_INPUT_SIZE: usize = 112;
const EMBEDDING_MEAN: f32 = 127.5;
const EMBEDDING_STD: f32 = 127.5;

const GENDERAGE_INPUT_SIZE: usize = 96;
const LIVENESS_INPUT_SIZE: usize = 80;

/// Index of the "real face" class in the liveness classifier output.
const LIVE_CLASS: usize = 1;

pub struct OnnxFaceAnalyzer {
    embedding: Mutex<Session>,
    genderage: Option<Mutex<Session>>,
    liveness: Option<Mutex<Session>>,
}

impl OnnxFaceAnalyzer {
    pub fn new(embedding_model: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            embedding: Mutex::new(load_session(embedding_model)?),
            genderage: None,
            liveness: None,
        })
    }

    pub fn with_genderage(mut self, model: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        self.genderage = Some(Mutex::new(load_session(model)?));
        Ok(self)
    }

    pub fn with_liveness(mut self, model: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        self.liveness = Some(Mutex::new(load_session(model)?));
        Ok(self)
    }

    pub fn has_attribute_models(&self) -> bool {
        self.genderage.is_some() && self.liveness.is_some()
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn extract_feature(
        &self,
        frame: &Frame,
        region: &Region,
    ) -> Result<FeatureVector, AnalysisError> {
        let crop = frame.crop(region).ok_or(AnalysisError::EmptyRegion(*region))?;
        let tensor = preprocess(&crop, EMBEDDING_INPUT_SIZE, EMBEDDING_MEAN, EMBEDDING_STD);
        let mut embedding = run(&self.embedding, tensor)?;
        l2_normalize(&mut embedding);
        Ok(FeatureVector::from_embedding(&embedding))
    }

    fn compute_attributes(
        &self,
        frame: &Frame,
        region: &Region,
    ) -> Result<FaceAttributes, AnalysisError> {
        let genderage = self
            .genderage
            .as_ref()
            .ok_or(AnalysisError::ModelUnavailable("genderage"))?;
        let liveness = self
            .liveness
            .as_ref()
            .ok_or(AnalysisError::ModelUnavailable("liveness"))?;
        let crop = frame.crop(region).ok_or(AnalysisError::EmptyRegion(*region))?;

        let (gender, age) =
            decode_genderage(&run(genderage, preprocess(&crop, GENDERAGE_INPUT_SIZE, 0.0, 1.0))?)?;
        let live =
            decode_liveness(&run(liveness, preprocess(&crop, LIVENESS_INPUT_SIZE, 0.0, 255.0))?)?;

        Ok(FaceAttributes {
            liveness: live,
            age,
            gender,
        })
    }

    fn compare(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
        match (a.to_embedding(), b.to_embedding()) {
            (Some(a), Some(b)) => cosine_similarity(&a, &b),
            _ => 0.0,
        }
    }
}

fn inference_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Inference(e.to_string())
}

fn run(session: &Mutex<Session>, tensor: Array4<f32>) -> Result<Vec<f32>, AnalysisError> {
    let input = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
    let mut session = session.lock().unwrap_or_else(|e| e.into_inner());
    let outputs = session.run(ort::inputs![input]).map_err(inference_error)?;
    if outputs.len() == 0 {
        return Err(AnalysisError::Inference("model produced no outputs".into()));
    }
    let array = outputs[0]
        .try_extract_array::<f32>()
        .map_err(inference_error)?;
    Ok(array.iter().copied().collect())
}

/// Nearest-neighbour resize to `size`x`size`, `(v - mean) / std`, NCHW.
fn preprocess(crop: &Frame, size: usize, mean: f32, std: f32) -> Array4<f32> {
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let data = crop.data();

    let mut tensor = Array4::<f32>::zeros((1, CHANNELS, size, size));
    if src_w == 0 || src_h == 0 {
        return tensor;
    }

    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * CHANNELS;
            for c in 0..CHANNELS {
                tensor[[0, c, y, x]] = (data[offset + c] as f32 - mean) / std;
            }
        }
    }

    tensor
}

/// Output layout `[female_logit, male_logit, age / 100]`.
fn decode_genderage(output: &[f32]) -> Result<(Gender, u32), AnalysisError> {
    if output.len() < 3 {
        return Err(AnalysisError::Inference(format!(
            "genderage output has {} values, expected 3",
            output.len()
        )));
    }
    let gender = if output[1] > output[0] {
        Gender::Male
    } else {
        Gender::Female
    };
    let age = (output[2] * 100.0).round().max(0.0) as u32;
    Ok((gender, age))
}

fn decode_liveness(output: &[f32]) -> Result<bool, AnalysisError> {
    if output.len() <= LIVE_CLASS {
        return Err(AnalysisError::Inference(format!(
            "liveness output has {} classes",
            output.len()
        )));
    }
    let probs = softmax(output);
    let best = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i);
    Ok(best == Some(LIVE_CLASS))
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|v| v / sum).collect()
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity clamped to `[0, 1]`. Mismatched or empty vectors
/// score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    ((dot / (norm_a * norm_b)) as f32).clamp(0.0, 1.0)
}
