//! A1-notation cell and range parsing

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Largest column index accepted (`XFD`, the spreadsheet column limit)
const MAX_COLUMN: u32 = 16_383;

/// Largest number of cells a monitored range may cover
pub const MAX_RANGE_CELLS: u64 = 10_000;

fn cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]{1,7})$").expect("static cell pattern is valid")
    })
}

/// A single cell address, zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1 reference such as `B7` or `$C$12`
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let input = input.trim();
        let caps = cell_pattern()
            .captures(input)
            .ok_or_else(|| RangeError::InvalidCell(input.to_string()))?;

        let col = column_letters_to_index(&caps[1])
            .ok_or_else(|| RangeError::InvalidCell(input.to_string()))?;
        let row: u32 = caps[2]
            .parse()
            .map_err(|_| RangeError::InvalidCell(input.to_string()))?;
        if row == 0 {
            return Err(RangeError::InvalidCell(input.to_string()));
        }

        Ok(Self { row: row - 1, col })
    }

    /// Parse a cell that may carry a sheet prefix (`Sheet1!B2`), dropping the sheet
    pub fn parse_unqualified(input: &str) -> Result<Self, RangeError> {
        Self::parse_qualified(input).map(|(_, cell)| cell)
    }

    /// Parse a cell with its optional sheet prefix
    pub fn parse_qualified(input: &str) -> Result<(Option<String>, Self), RangeError> {
        let (sheet, cell) = split_sheet(input.trim())?;
        Ok((sheet, Self::parse(cell)?))
    }

    /// A1 form of this cell
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_index_to_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// A rectangular range with an optional sheet name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: Option<String>,
    pub start: CellRef,
    pub end: CellRef,
}

impl SheetRange {
    /// Parse `A1`, `A1:C10`, `Sheet1!A1:C10` or `'My Sheet'!B2`.
    ///
    /// Ranges covering more than [`MAX_RANGE_CELLS`] cells are rejected.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RangeError::Empty);
        }

        let (sheet, cells) = split_sheet(input)?;

        let (start, end) = match cells.split_once(':') {
            Some((a, b)) => (CellRef::parse(a)?, CellRef::parse(b)?),
            None => {
                let cell = CellRef::parse(cells)?;
                (cell, cell)
            }
        };

        // Normalise so that start is the top-left corner
        let top_left = CellRef::new(start.row.min(end.row), start.col.min(end.col));
        let bottom_right = CellRef::new(start.row.max(end.row), start.col.max(end.col));

        let range = Self {
            sheet,
            start: top_left,
            end: bottom_right,
        };
        let cells = range.cell_count();
        if cells > MAX_RANGE_CELLS {
            return Err(RangeError::TooLarge(cells));
        }

        Ok(range)
    }

    pub fn rows(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn cols(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Number of cells covered
    pub fn cell_count(&self) -> u64 {
        u64::from(self.rows()) * u64::from(self.cols())
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col)))
    }

    /// Range part without the sheet name, e.g. `A1:C10`
    pub fn cells_a1(&self) -> String {
        if self.start == self.end {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) if sheet.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_') => {
                write!(f, "'{}'!{}", sheet.replace('\'', "''"), self.cells_a1())
            }
            Some(sheet) => write!(f, "{}!{}", sheet, self.cells_a1()),
            None => write!(f, "{}", self.cells_a1()),
        }
    }
}

/// Split an optional `Sheet!` prefix from the cell part
fn split_sheet(input: &str) -> Result<(Option<String>, &str), RangeError> {
    let Some(idx) = input.rfind('!') else {
        return Ok((None, input));
    };

    let (raw_sheet, cells) = (&input[..idx], &input[idx + 1..]);
    let sheet = if raw_sheet.len() >= 2 && raw_sheet.starts_with('\'') && raw_sheet.ends_with('\'') {
        raw_sheet[1..raw_sheet.len() - 1].replace("''", "'")
    } else {
        raw_sheet.to_string()
    };

    if sheet.is_empty() {
        return Err(RangeError::InvalidSheet(input.to_string()));
    }

    Ok((Some(sheet), cells))
}

/// Convert column letters (A, Z, AA, ...) to a zero-based index
pub fn column_letters_to_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }

    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }

    let index = index - 1;
    (index <= MAX_COLUMN).then_some(index)
}

/// Convert a zero-based column index to letters (0 -> A, 26 -> AA)
pub fn column_index_to_letters(index: u32) -> String {
    let mut result = String::new();
    let mut n = index + 1;

    while n > 0 {
        n -= 1;
        let c = (b'A' + (n % 26) as u8) as char;
        result.insert(0, c);
        n /= 26;
    }

    result
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Range is empty")]
    Empty,

    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    #[error("Invalid sheet name in: {0}")]
    InvalidSheet(String),

    #[error("Range covers {0} cells, more than the limit of {}", MAX_RANGE_CELLS)]
    TooLarge(u64),
}
