use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::SpreadsheetError;

/// A rectangular region read from one worksheet: a header row followed by data rows.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// Region of the worksheet held by this sheet
    pub(crate) range: Range,
    /// Non-empty cells inside the range, in row-major order once finished
    pub(crate) cells: Vec<Cell>,
}

impl Sheet {
    pub(super) fn new(file_name: &str, name: &str, range: Range) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            range,
            cells: Vec::new(),
        }
    }

    /// Checks if a row is after the upper bound of the range.
    pub(super) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.range.row_upper_bound < row
    }

    /// Checks if a cell at (row, col) is within the range.
    pub(super) fn contains(&self, row: usize, col: usize) -> bool {
        self.range.contains(row, col)
    }

    pub(super) fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    /// Restores row-major order; worksheets normally store cells that way already.
    pub(super) fn finish(&mut self) {
        self.cells.sort_by_key(|cell| (cell.row, cell.col));
        self.cells.dedup_by_key(|cell| (cell.row, cell.col));
    }

    /// Number of data rows (the header row excluded).
    pub(crate) fn data_height(&self) -> usize {
        self.range.height() - 1
    }

    /// Builds the dense table of the region, filling gaps with empty cells.
    pub(crate) fn table(&self) -> Vec<Vec<Cell>> {
        let mut index = 0usize;
        let mut table = Vec::<Vec<Cell>>::with_capacity(self.range.height());
        for row in self.range.row_lower_bound..=self.range.row_upper_bound {
            let mut record = Vec::<Cell>::with_capacity(self.range.width());
            for col in self.range.col_lower_bound..=self.range.col_upper_bound {
                match self.cells.get(index) {
                    Some(cell) if cell.row == row && cell.col == col => {
                        record.push(cell.clone());
                        index += 1;
                    }
                    _ => record.push(Cell::empty(row, col)),
                }
            }
            table.push(record);
        }
        table
    }

    /// Reads the header row as column names.
    /// Every header cell must hold a value.
    pub(crate) fn header(&self) -> Result<Vec<String>, SpreadsheetError> {
        let header_row = self.range.row_lower_bound;
        (self.range.col_lower_bound..=self.range.col_upper_bound)
            .map(|col| {
                self.cells
                    .iter()
                    .find(|cell| cell.row == header_row && cell.col == col)
                    .filter(|cell| !cell.value.trim().is_empty())
                    .map(|cell| cell.to_string())
                    .ok_or_else(|| SpreadsheetError::MissingHeaderError(
                        self.file_name.to_owned(),
                        self.name.to_owned(),
                        Cell::empty(header_row, col).reference(),
                    ))
            })
            .collect()
    }
}
