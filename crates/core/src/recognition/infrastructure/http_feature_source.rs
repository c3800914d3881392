use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::profile::FeatureSourceConfig;
use crate::recognition::domain::feature::FeatureVector;
use crate::recognition::domain::feature_source::{
    FeatureRecord, FeatureSourceError, FeatureSource,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Row of the web application's feature table.
#[derive(Deserialize)]
struct FeatureRow {
    id: String,
    value: String,
}

/// Pulls every enrolled feature from the web application over HTTP.
pub struct HttpFeatureSource {
    client: Client,
}

impl HttpFeatureSource {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

impl FeatureSource for HttpFeatureSource {
    fn fetch_all(
        &mut self,
        settings: &FeatureSourceConfig,
    ) -> Result<Vec<FeatureRecord>, FeatureSourceError> {
        let http_err = |e: reqwest::Error| FeatureSourceError::Http {
            url: settings.url.clone(),
            source: e,
        };
        let body = self
            .client
            .get(&settings.url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(http_err)?;
        parse_features(&body)
    }
}

/// Decodes a JSON array of `{"id": name, "value": base64}` rows.
pub fn parse_features(body: &str) -> Result<Vec<FeatureRecord>, FeatureSourceError> {
    let rows: Vec<FeatureRow> = serde_json::from_str(body)?;
    rows.into_iter()
        .map(|row| {
            let feature = FeatureVector::from_base64(&row.value).map_err(|source| {
                FeatureSourceError::Base64 {
                    name: row.id.clone(),
                    source,
                }
            })?;
            Ok(FeatureRecord {
                name: row.id,
                feature,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_features_in_order() {
        let body = r#"[{"id": "alice", "value": "AQID"}, {"id": "bob", "value": "BAUG"}]"#;
        let records = parse_features(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "alice");
        assert_eq!(records[0].feature.as_bytes(), &[1, 2, 3]);
        assert_eq!(records[1].name, "bob");
        assert_eq!(records[1].feature.as_bytes(), &[4, 5, 6]);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_features("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let body = r#"[{"id": "alice", "value": "AQID", "created": "2024-01-01"}]"#;
        assert_eq!(parse_features(body).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            parse_features("not json"),
            Err(FeatureSourceError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_base64_names_the_row() {
        let body = r#"[{"id": "mallory", "value": "!!!"}]"#;
        match parse_features(body) {
            Err(FeatureSourceError::Base64 { name, .. }) => assert_eq!(name, "mallory"),
            other => panic!("expected base64 error, got {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_server_is_http_error() {
        let mut source = HttpFeatureSource::new().unwrap();
        let settings = FeatureSourceConfig {
            enabled: true,
            url: "http://127.0.0.1:9/features/".to_string(),
        };
        assert!(matches!(
            source.fetch_all(&settings),
            Err(FeatureSourceError::Http { .. })
        ));
    }
}
