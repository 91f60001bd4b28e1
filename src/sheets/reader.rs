//! Snapshot reader abstraction and data-source dispatch

use async_trait::async_trait;

use super::google::GoogleSheetsReader;
use super::range::SheetRange;
use super::value::{CellValue, Snapshot};
use super::workbook::WorkbookReader;

/// Prefix marking a data source id as an uploaded workbook file
pub const FILE_SOURCE_PREFIX: &str = "file:";

/// Fetches the current values of a range from a data source
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    async fn read(&self, data_source_id: &str, range: &SheetRange) -> Result<Snapshot, ReadError>;
}

/// Build a snapshot from a row-major grid anchored at the range's top-left cell.
///
/// Every cell of the range is present in the result; cells the provider
/// omitted (trailing empties) are stored as empty.
pub fn snapshot_from_grid(range: &SheetRange, grid: &[Vec<CellValue>]) -> Snapshot {
    range
        .cells()
        .map(|cell| {
            let row = (cell.row - range.start.row) as usize;
            let col = (cell.col - range.start.col) as usize;
            let value = grid
                .get(row)
                .and_then(|r| r.get(col))
                .cloned()
                .unwrap_or_default();
            (cell.to_a1(), value)
        })
        .collect()
}

/// Routes `file:<name>` sources to uploaded workbooks and everything else to Google Sheets
pub struct DataSourceRouter {
    google: Option<GoogleSheetsReader>,
    workbooks: WorkbookReader,
}

impl DataSourceRouter {
    pub fn new(google: Option<GoogleSheetsReader>, workbooks: WorkbookReader) -> Self {
        Self { google, workbooks }
    }
}

#[async_trait]
impl SnapshotReader for DataSourceRouter {
    async fn read(&self, data_source_id: &str, range: &SheetRange) -> Result<Snapshot, ReadError> {
        if let Some(file_name) = data_source_id.strip_prefix(FILE_SOURCE_PREFIX) {
            return self.workbooks.read(file_name, range).await;
        }

        match &self.google {
            Some(reader) => reader.read(data_source_id, range).await,
            None => Err(ReadError::Unconfigured(
                "Google Sheets credentials are not configured".to_string(),
            )),
        }
    }
}

/// Snapshot read errors
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Data source not found: {0}")]
    NotFound(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Data source not configured: {0}")]
    Unconfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_grid_offsets_and_padding() {
        let range = SheetRange::parse("Sheet1!B2:C3").unwrap();
        let grid = vec![
            vec![CellValue::from("a"), CellValue::from("b")],
            vec![CellValue::from("c")],
        ];

        let snapshot = snapshot_from_grid(&range, &grid);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.get("B2").as_text(), "a");
        assert_eq!(snapshot.get("C2").as_text(), "b");
        assert_eq!(snapshot.get("B3").as_text(), "c");
        assert_eq!(snapshot.cells.get("C3"), Some(&CellValue::Empty));
    }

    #[tokio::test]
    async fn test_router_without_google_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let router = DataSourceRouter::new(None, WorkbookReader::new(dir.path()));
        let range = SheetRange::parse("A1").unwrap();

        let err = router.read("1AbCdEf", &range).await.unwrap_err();
        assert!(matches!(err, ReadError::Unconfigured(_)));

        let err = router.read("file:missing.xlsx", &range).await.unwrap_err();
        assert!(matches!(err, ReadError::NotFound(_)));
    }
}
