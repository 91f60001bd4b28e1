//! Uploaded workbook reader (xlsx, xls, ods)

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Range, Reader};

use super::range::SheetRange;
use super::reader::{ReadError, SnapshotReader};
use super::value::{CellValue, Snapshot};

/// Reads ranges from workbook files stored in an upload directory
#[derive(Debug, Clone)]
pub struct WorkbookReader {
    upload_dir: PathBuf,
}

impl WorkbookReader {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Resolve a file name inside the upload directory, rejecting traversal
    fn resolve(&self, file_name: &str) -> Result<PathBuf, ReadError> {
        let relative = Path::new(file_name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if file_name.is_empty() || !plain {
            return Err(ReadError::NotFound(file_name.to_string()));
        }

        let path = self.upload_dir.join(relative);
        if !path.is_file() {
            return Err(ReadError::NotFound(file_name.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl SnapshotReader for WorkbookReader {
    async fn read(&self, data_source_id: &str, range: &SheetRange) -> Result<Snapshot, ReadError> {
        let path = self.resolve(data_source_id)?;
        let range = range.clone();

        tokio::task::spawn_blocking(move || read_workbook_range(&path, &range))
            .await
            .map_err(|e| ReadError::Workbook(format!("Workbook read task failed: {}", e)))?
    }
}

fn read_workbook_range(path: &Path, range: &SheetRange) -> Result<Snapshot, ReadError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ReadError::Workbook(format!("Failed to open workbook: {}", e)))?;

    let sheet_name = match &range.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReadError::Workbook("Workbook has no sheets".to_string()))?,
    };

    let sheet = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ReadError::Workbook(format!("Failed to read sheet '{}': {}", sheet_name, e)))?;

    Ok(snapshot_from_sheet(&sheet, range))
}

/// Extract the cells of `range` from a calamine sheet (absolute positions)
pub(crate) fn snapshot_from_sheet(sheet: &Range<Data>, range: &SheetRange) -> Snapshot {
    range
        .cells()
        .map(|cell| {
            let value = sheet
                .get_value((cell.row, cell.col))
                .map(convert_cell)
                .unwrap_or_default();
            (cell.to_a1(), value)
        })
        .collect()
}

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_sheet_absolute_positions() {
        let mut sheet: Range<Data> = Range::new((0, 0), (2, 2));
        sheet.set_value((1, 1), Data::Float(12.5));
        sheet.set_value((1, 2), Data::String("ok".to_string()));
        sheet.set_value((2, 1), Data::Bool(false));

        let range = SheetRange::parse("B2:C3").unwrap();
        let snapshot = snapshot_from_sheet(&sheet, &range);

        assert_eq!(snapshot.get("B2"), CellValue::Number(12.5));
        assert_eq!(snapshot.get("C2").as_text(), "ok");
        assert_eq!(snapshot.get("B3"), CellValue::Bool(false));
        assert_eq!(snapshot.get("C3"), CellValue::Empty);
    }

    #[test]
    fn test_cells_outside_sheet_are_empty() {
        let sheet: Range<Data> = Range::new((0, 0), (0, 0));
        let range = SheetRange::parse("D10").unwrap();
        let snapshot = snapshot_from_sheet(&sheet, &range);
        assert_eq!(snapshot.get("D10"), CellValue::Empty);
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.xlsx"), b"not really a workbook").unwrap();
        let reader = WorkbookReader::new(dir.path());

        assert!(reader.resolve("report.xlsx").is_ok());
        assert!(matches!(reader.resolve("../report.xlsx"), Err(ReadError::NotFound(_))));
        assert!(matches!(reader.resolve("/etc/passwd"), Err(ReadError::NotFound(_))));
        assert!(matches!(reader.resolve(""), Err(ReadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupt_workbook_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.xlsx"), b"not really a workbook").unwrap();
        let reader = WorkbookReader::new(dir.path());
        let range = SheetRange::parse("A1").unwrap();

        let err = reader.read("broken.xlsx", &range).await.unwrap_err();
        assert!(matches!(err, ReadError::Workbook(_)));
    }
}
