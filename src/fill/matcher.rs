//! # Row Matcher
//!
//! Indexes the source rows by their composite key and resolves every key row
//! to the one source row it names.
use crate::fill::FillSummary;
use crate::spreadsheet::cell::describe_key;
use crate::spreadsheet::cell::KeyPart;
use crate::spreadsheet::Cell;
use crate::spreadsheet::Range;
use crate::spreadsheet::Sheet;
use log::debug;
use log::warn;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while matching key rows to source rows.
/// Row numbers are worksheet row numbers (1-based).
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Rows {first_row} and {second_row} in source range of sheet '{sheet}' have the same key {key}")]
    DuplicateKeyError {
        sheet: String,
        first_row: usize,
        second_row: usize,
        key: String,
    },

    #[error("Row {row} in key range of sheet '{sheet}' has no correspondence in source range, key {key}")]
    NoMatchError {
        sheet: String,
        row: usize,
        key: String,
    },
}

/// Cells to write into the target region together with the outcome per row.
#[derive(Debug)]
pub(crate) struct Fill {
    pub(crate) cells: Vec<Cell>,
    pub(crate) summary: FillSummary,
}

/// Source data rows indexed by composite key.
pub(crate) struct RowMatcher {
    /// Source data rows, header excluded
    rows: Vec<Vec<Cell>>,
    /// Composite key to position in `rows`
    index: HashMap<Vec<KeyPart>, usize>,
}

impl RowMatcher {
    /// Indexes every data row of `source` by the cells at `key_in_source`.
    /// Two rows with the same key are an error.
    pub(crate) fn build(source: &Sheet, key_in_source: &[usize]) -> Result<RowMatcher, MatchError> {
        let rows: Vec<Vec<Cell>> = source.table().into_iter().skip(1).collect();
        let mut index = HashMap::<Vec<KeyPart>, usize>::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            let key: Vec<KeyPart> = key_in_source.iter().map(|col| row[*col].key_part()).collect();
            if let Some(first) = index.insert(key, position) {
                let cells: Vec<&Cell> = key_in_source.iter().map(|col| &row[*col]).collect();
                return Err(MatchError::DuplicateKeyError {
                    sheet: source.name.to_owned(),
                    first_row: rows[first][0].row + 1,
                    second_row: row[0].row + 1,
                    key: describe_key(&cells),
                });
            }
        }
        debug!("Indexed {} source row(s) of '{}'", index.len(), source.name);
        Ok(RowMatcher { rows, index })
    }

    /// Finds the source row whose key equals the given cells.
    pub(crate) fn find(&self, key: &[&Cell]) -> Option<&[Cell]> {
        let key: Vec<KeyPart> = key.iter().map(|cell| cell.key_part()).collect();
        self.index.get(&key).map(|position| self.rows[*position].as_slice())
    }

    /// Resolves every data row of `key` and lays the matched source cells out
    /// over the data rows of `target`, row by row.
    ///
    /// An unmatched row is an error unless `allow_missing` is set, in which case
    /// the row is reported and its target cells are left alone.
    pub(crate) fn fill(
        &self,
        key: &Sheet,
        target: &Range,
        target_in_source: &[usize],
        allow_missing: bool,
    ) -> Result<Fill, MatchError> {
        let mut cells = Vec::<Cell>::with_capacity(key.data_height() * target_in_source.len());
        let mut summary = FillSummary::default();
        for (offset, record) in key.table().iter().enumerate().skip(1) {
            let key_cells: Vec<&Cell> = record.iter().collect();
            let key_row = key.range.row_lower_bound + offset + 1;
            let row = target.row_lower_bound + offset;
            match self.find(&key_cells) {
                Some(source) => {
                    debug!("Key row {} matches source row {}", key_row, source[0].row + 1);
                    cells.extend(target_in_source
                        .iter()
                        .enumerate()
                        .map(|(col, source_col)| source[*source_col].copy_to(row, target.col_lower_bound + col)));
                    summary.filled += 1;
                }
                None if allow_missing => {
                    warn!(
                        "Row {} in key range of sheet '{}' has no correspondence in source range, key {}",
                        key_row,
                        key.name,
                        describe_key(&key_cells)
                    );
                    summary.missing.push(key_row);
                }
                None => {
                    return Err(MatchError::NoMatchError {
                        sheet: key.name.to_owned(),
                        row: key_row,
                        key: describe_key(&key_cells),
                    })
                }
            }
        }
        Ok(Fill { cells, summary })
    }
}
