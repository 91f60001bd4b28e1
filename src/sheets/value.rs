//! Cell values and point-in-time snapshots of a range

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw value of a single cell as returned by a data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Canonical string form used for every comparison
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Numeric view; text is parsed after trimming
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => parse_number(s),
            CellValue::Empty | CellValue::Bool(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Parse a finite number from user or sheet text
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Values of a range at one point in time, keyed by A1 cell reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cells: BTreeMap<String, CellValue>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(cells: BTreeMap<String, CellValue>) -> Self {
        Self {
            cells,
            taken_at: Utc::now(),
        }
    }

    /// Value of a cell; cells outside the read grid are empty
    pub fn get(&self, cell: &str) -> CellValue {
        self.cells.get(cell).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, CellValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Snapshot::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_form() {
        assert_eq!(CellValue::Empty.as_text(), "");
        assert_eq!(CellValue::Number(42.0).as_text(), "42");
        assert_eq!(CellValue::Number(1.5).as_text(), "1.5");
        assert_eq!(CellValue::Bool(true).as_text(), "true");
        assert_eq!(CellValue::from("abc").as_text(), "abc");
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(CellValue::from(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(CellValue::from("n/a").as_f64(), None);
        assert_eq!(CellValue::from("NaN").as_f64(), None);
        assert_eq!(CellValue::Empty.as_f64(), None);
    }

    #[test]
    fn test_untagged_deserialize() {
        let values: Vec<CellValue> = serde_json::from_str(r#"[null, true, 3, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                CellValue::Empty,
                CellValue::Bool(true),
                CellValue::Number(3.0),
                CellValue::Text("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_snapshot_missing_cell_is_empty() {
        let snapshot: Snapshot = vec![("A1".to_string(), CellValue::from("1"))]
            .into_iter()
            .collect();
        assert_eq!(snapshot.get("A1").as_text(), "1");
        assert_eq!(snapshot.get("B9"), CellValue::Empty);
    }
}
