//! Spreadsheet data sources
//!
//! Reads the current values of an A1 range from Google Sheets or from an
//! uploaded workbook file and returns them as a [`Snapshot`].

pub mod google;
pub mod range;
pub mod reader;
pub mod value;
pub mod workbook;

pub use google::{GoogleAuth, GoogleSheetsReader};
pub use range::{CellRef, RangeError, SheetRange, MAX_RANGE_CELLS};
pub use reader::{snapshot_from_grid, DataSourceRouter, ReadError, SnapshotReader, FILE_SOURCE_PREFIX};
pub use value::{CellValue, Snapshot};
pub use workbook::WorkbookReader;
