//! # Spreadsheet Module
//!
//! Reading regions out of Excel XLSX workbooks and writing a patched copy of the package.
//! Cells keep their stored type and lexical value so they can be copied verbatim.
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod range;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod writer;
pub(crate) mod xlsx;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use cell::Cell;
pub(crate) use range::Range;
pub(crate) use range::SheetRange;
pub(crate) use sheet::Sheet;
pub(crate) use xlsx::XlsxWorkbook;

/// Errors raised while reading or writing a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing '{0}' in the workbook package")]
    FileError(String),

    #[error("Workbook '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    #[error("Workbook '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFoundError(String, String),

    #[error("Missing column name at '{1}'!{2} in '{0}'")]
    MissingHeaderError(String, String, String),

    #[error("Invalid cell value at '{1}'!{2} in '{0}': {3}")]
    CellValueError(String, String, String, String),

    #[error("Formula in {0} is shared with cells {1} the target range does not fully cover")]
    SharedFormulaError(String, String),
}
