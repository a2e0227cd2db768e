//! HTTP Record Source
//!
//! `RecordSource` adapter for the dashboard backend REST API.
//!
//! - `GET {base}/api/{endpoint}?date=..&sector_codes=..&new_stock_code=..`
//!   returns a JSON array of records.
//! - `POST {base}/api/save_stock_codes` with `{"stock_codes": [..]}` saves a
//!   watch list.
//!
//! The backend answers "no data" and errors with a JSON object carrying a
//! `message` or `error` field, so any non-array payload is reported as
//! malformed with that text.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

use crate::application::ports::{FetchQuery, RecordSource, SourceError};
use crate::domain::record::Record;
use crate::infrastructure::config::SourceSettings;

/// Path of the watch list save endpoint.
const SAVE_KEYS_ENDPOINT: &str = "save_stock_codes";

/// Record source backed by the dashboard REST API.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct SaveKeysBody<'a> {
    stock_codes: &'a [String],
}

impl HttpRecordSource {
    /// Create a source from settings.
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, SourceError> {
        let raw = format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| SourceError::Transport(format!("invalid URL {raw}: {e}")))
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<Record>, SourceError> {
        let url = self.endpoint_url(&query.endpoint)?;
        tracing::debug!(url = %url, params = ?query.query_pairs(), "Fetching records");

        let response = self
            .client
            .get(url)
            .query(&query.query_pairs())
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: backend_message(&body).unwrap_or(body),
            });
        }

        decode_records(&body)
    }

    async fn save_keys(&self, keys: &[String]) -> Result<(), SourceError> {
        let url = self.endpoint_url(SAVE_KEYS_ENDPOINT)?;
        let response = self
            .client
            .post(url)
            .json(&SaveKeysBody { stock_codes: keys })
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SourceError::Status {
            status: status.as_u16(),
            message: backend_message(&body).unwrap_or(body),
        })
    }
}

/// Decode a records payload. Anything but a JSON array is malformed.
pub fn decode_records(body: &str) -> Result<Vec<Record>, SourceError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;
    if !value.is_array() {
        let detail = backend_message(body).unwrap_or_else(|| "expected a JSON array".to_string());
        return Err(SourceError::Malformed(detail));
    }
    serde_json::from_value(value).map_err(|e| SourceError::Malformed(e.to_string()))
}

fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    ["message", "error"]
        .iter()
        .find_map(|k| object.get(*k).and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_array() {
        let records = decode_records(r#"[{"StockCode":"1"},{"StockCode":"2"}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn object_payload_is_malformed_with_message() {
        let err = decode_records(r#"{"message":"No data for date"}"#).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(m) if m == "No data for date"));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            decode_records("<html>"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn endpoint_url_joins_paths() {
        let settings = SourceSettings {
            base_url: Url::parse("http://127.0.0.1:5000/").unwrap(),
            request_timeout: std::time::Duration::from_secs(1),
        };
        let source = HttpRecordSource::new(&settings).unwrap();
        assert_eq!(
            source.endpoint_url("stock_data").unwrap().as_str(),
            "http://127.0.0.1:5000/api/stock_data"
        );
    }
}
