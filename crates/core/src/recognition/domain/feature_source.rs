use thiserror::Error;

use crate::config::profile::FeatureSourceConfig;

use super::feature::FeatureVector;

/// One enrolled face as stored by the web application.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRecord {
    pub name: String,
    pub feature: FeatureVector,
}

#[derive(Error, Debug)]
pub enum FeatureSourceError {
    #[error("feature request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feature payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feature for {name} is not valid base64: {source}")]
    Base64 {
        name: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// External store of enrolled features, queried by the refresher.
///
/// `settings` is re-read from the profile before every fetch.
pub trait FeatureSource: Send {
    fn fetch_all(
        &mut self,
        settings: &FeatureSourceConfig,
    ) -> Result<Vec<FeatureRecord>, FeatureSourceError>;
}
