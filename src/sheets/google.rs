//! Google Sheets values API reader

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::range::SheetRange;
use super::reader::{snapshot_from_grid, ReadError, SnapshotReader};
use super::value::{CellValue, Snapshot};

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Credentials for the values endpoint
#[derive(Debug, Clone)]
pub enum GoogleAuth {
    /// API key, for sheets shared by link
    ApiKey(String),
    /// OAuth bearer token obtained by the (external) auth flow
    AccessToken(String),
}

/// Reads ranges through `GET /v4/spreadsheets/{id}/values/{range}`
#[derive(Debug, Clone)]
pub struct GoogleSheetsReader {
    client: reqwest::Client,
    base_url: String,
    auth: GoogleAuth,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<CellValue>>,
}

impl GoogleSheetsReader {
    pub fn new(auth: GoogleAuth, timeout: Duration) -> Result<Self, ReadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReadError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            auth,
        })
    }

    /// Point the reader at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn values_url(&self, spreadsheet_id: &str, range: &SheetRange) -> Result<Url, ReadError> {
        let range_a1 = range.to_string();
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ReadError::Http(format!("Invalid base URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| ReadError::Http(format!("Base URL cannot hold a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range_a1.as_str()]);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("majorDimension", "ROWS")
                .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
            if let GoogleAuth::ApiKey(key) = &self.auth {
                query.append_pair("key", key);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl SnapshotReader for GoogleSheetsReader {
    async fn read(&self, data_source_id: &str, range: &SheetRange) -> Result<Snapshot, ReadError> {
        let url = self.values_url(data_source_id, range)?;

        let mut request = self.client.get(url);
        if let GoogleAuth::AccessToken(token) = &self.auth {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReadError::Http(format!("Failed to fetch range: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ReadError::NotFound(data_source_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| ReadError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            spreadsheet_id = %data_source_id,
            range = %range,
            rows = body.values.len(),
            "Fetched sheet range"
        );

        Ok(snapshot_from_grid(range, &body.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_url_encodes_range_and_key() {
        let reader = GoogleSheetsReader::new(GoogleAuth::ApiKey("k123".into()), Duration::from_secs(5))
            .unwrap();
        let range = SheetRange::parse("'Q1 Budget'!A1:B2").unwrap();

        let url = reader.values_url("sheet-id", &range).unwrap();
        let text = url.as_str();
        assert!(text.starts_with("https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/"));
        assert!(text.contains("Q1%20Budget"));
        assert!(text.contains("key=k123"));
        assert!(text.contains("valueRenderOption=UNFORMATTED_VALUE"));
    }

    #[test]
    fn test_values_url_with_token_has_no_key() {
        let reader = GoogleSheetsReader::new(GoogleAuth::AccessToken("t".into()), Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999/");
        let range = SheetRange::parse("A1").unwrap();

        let url = reader.values_url("abc", &range).unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc/values/A1");
        assert!(!url.as_str().contains("key="));
    }

    #[test]
    fn test_value_range_parsing() {
        let body: ValueRange = serde_json::from_str(
            r#"{"range": "Sheet1!A1:B2", "majorDimension": "ROWS", "values": [[1, "x"], [true]]}"#,
        )
        .unwrap();
        let range = SheetRange::parse("Sheet1!A1:B2").unwrap();
        let snapshot = snapshot_from_grid(&range, &body.values);

        assert_eq!(snapshot.get("A1"), CellValue::Number(1.0));
        assert_eq!(snapshot.get("B1").as_text(), "x");
        assert_eq!(snapshot.get("A2"), CellValue::Bool(true));
        assert_eq!(snapshot.get("B2"), CellValue::Empty);

        let empty: ValueRange = serde_json::from_str(r#"{"range": "Sheet1!A1"}"#).unwrap();
        assert!(empty.values.is_empty());
    }
}
