use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{FEATURE_REFRESH_INTERVAL_SECS, MATCH_THRESHOLD};

/// How the tracker loop maintains its track set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Follow at most one face, picked nearest the frame center.
    Single,
    /// Follow every detected face.
    Multi,
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingMode::Single => write!(f, "single"),
            TrackingMode::Multi => write!(f, "multi"),
        }
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(TrackingMode::Single),
            "multi" => Ok(TrackingMode::Multi),
            other => Err(format!("tracking mode must be 'single' or 'multi', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSourceConfig {
    pub enabled: bool,
    /// Endpoint returning the enrolled feature records as JSON.
    pub url: String,
}

impl Default for FeatureSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://127.0.0.1:8000/features/".to_string(),
        }
    }
}

/// Model file locations. Unset detector/embedding paths fall back to the
/// model cache; unset attribute models disable that capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPaths {
    pub detector: Option<PathBuf>,
    pub embedding: Option<PathBuf>,
    pub genderage: Option<PathBuf>,
    pub liveness: Option<PathBuf>,
}

/// Runtime profile, re-read while the session runs.
///
/// `server_on` is the shared stop signal: once it reads `false` the tracker
/// loop and the feature refresher each stop on their next check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub server_on: bool,
    pub mode: TrackingMode,
    /// Capture source: file path, device path, or stream URL.
    pub camera: String,
    pub feature_source: FeatureSourceConfig,
    pub notifier_url: Option<String>,
    pub refresh_interval_secs: u64,
    pub match_threshold: f32,
    pub detection_confidence: f64,
    pub models: ModelPaths,
    pub font_path: Option<PathBuf>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            server_on: true,
            mode: TrackingMode::Multi,
            camera: "/dev/video0".to_string(),
            feature_source: FeatureSourceConfig::default(),
            notifier_url: Some("http://127.0.0.1:8000/checkedface/".to_string()),
            refresh_interval_secs: FEATURE_REFRESH_INTERVAL_SECS,
            match_threshold: MATCH_THRESHOLD,
            detection_confidence: 0.5,
            models: ModelPaths::default(),
            font_path: None,
        }
    }
}

impl Profile {
    /// True when the refresher should keep fetching features.
    pub fn refresh_enabled(&self) -> bool {
        self.server_on && self.feature_source.enabled
    }
}
