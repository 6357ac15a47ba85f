use crate::error::RustyFillError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use regex::Regex;
use std::fmt::Display;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors related to Excel-style range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid range format '{0}', expected 'Sheet!A1:C9'")]
    FormatError(String),

    #[error("Missing sheet name in range '{0}'")]
    MissingSheetError(String),
}

/// A rectangular cell range with 0-based inclusive bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Range {
    pub(crate) row_lower_bound: usize,
    pub(crate) row_upper_bound: usize,
    pub(crate) col_lower_bound: usize,
    pub(crate) col_upper_bound: usize,
}

impl Range {
    /// Creates a range from two corners given in any order.
    pub(crate) fn new(first: (usize, usize), second: (usize, usize)) -> Range {
        Range {
            row_lower_bound: first.0.min(second.0),
            row_upper_bound: first.0.max(second.0),
            col_lower_bound: first.1.min(second.1),
            col_upper_bound: first.1.max(second.1),
        }
    }

    /// Number of rows, header row included.
    pub(crate) fn height(&self) -> usize {
        self.row_upper_bound - self.row_lower_bound + 1
    }

    /// Number of columns.
    pub(crate) fn width(&self) -> usize {
        self.col_upper_bound - self.col_lower_bound + 1
    }

    /// Checks if a cell at (row, col) lies within the range.
    pub(crate) fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_lower_bound..=self.row_upper_bound).contains(&row)
            && (self.col_lower_bound..=self.col_upper_bound).contains(&col)
    }

    /// Checks if the two ranges share at least one cell.
    pub(crate) fn overlaps(&self, other: &Range) -> bool {
        self.row_lower_bound <= other.row_upper_bound
            && other.row_lower_bound <= self.row_upper_bound
            && self.col_lower_bound <= other.col_upper_bound
            && other.col_lower_bound <= self.col_upper_bound
    }

    /// Smallest range covering both ranges.
    pub(crate) fn union(&self, other: &Range) -> Range {
        Range {
            row_lower_bound: self.row_lower_bound.min(other.row_lower_bound),
            row_upper_bound: self.row_upper_bound.max(other.row_upper_bound),
            col_lower_bound: self.col_lower_bound.min(other.col_lower_bound),
            col_upper_bound: self.col_upper_bound.max(other.col_upper_bound),
        }
    }
}

impl TryFrom<&str> for Range {
    type Error = RustyFillError;

    /// Parses a cell range without sheet name ("A1", "B2:C5", "$A$1:$D$9").
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)(:\$?([A-Za-z]{1,3})\$?(\d+))?$").expect("Hardcode regex pattern")
        });
        let captures = pattern
            .captures(value.trim())
            .ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let corner = |col: usize, row: usize| {
            captures
                .get(col)
                .zip(captures.get(row))
                .and_then(|(col, row)| reference_to_index(&format!("{}{}", col.as_str(), row.as_str())))
        };
        let first = corner(1, 2).ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let second = match captures.get(3) {
            Some(_) => corner(4, 5).ok_or_else(|| RangeError::FormatError(value.to_owned()))?,
            None => first,
        };
        Ok(Range::new(first, second))
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            index_to_reference(self.row_lower_bound, self.col_lower_bound),
            index_to_reference(self.row_upper_bound, self.col_upper_bound)
        )
    }
}

/// A cell range on a named worksheet, e.g. `Data!A1:C9` or `'My Sheet'!B2:D10`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SheetRange {
    pub(crate) sheet: String,
    pub(crate) range: Range,
}

impl SheetRange {
    /// Checks if both ranges are on the same sheet and share a cell.
    /// Sheet names compare case-insensitively, as they do in Excel.
    pub(crate) fn overlaps(&self, other: &SheetRange) -> bool {
        self.sheet.to_lowercase() == other.sheet.to_lowercase() && self.range.overlaps(&other.range)
    }
}

impl TryFrom<&str> for SheetRange {
    type Error = RustyFillError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        let (sheet, cells) = value
            .rsplit_once('!')
            .ok_or_else(|| RangeError::MissingSheetError(value.to_owned()))?;
        let sheet = match sheet.strip_prefix('\'').and_then(|sheet| sheet.strip_suffix('\'')) {
            Some(quoted) => quoted.replace("''", "'"),
            None => sheet.to_owned(),
        };
        if sheet.is_empty() {
            Err(RangeError::MissingSheetError(value.to_owned()))?
        }
        let range = Range::try_from(cells).map_err(|_| RangeError::FormatError(value.to_owned()))?;
        Ok(SheetRange { sheet, range })
    }
}

impl Display for SheetRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.sheet.chars().all(|character| character.is_alphanumeric() || character == '_') {
            write!(f, "{}!{}", self.sheet, self.range)
        } else {
            write!(f, "'{}'!{}", self.sheet.replace('\'', "''"), self.range)
        }
    }
}
