//! # Fill Module
//!
//! Looks up every row of the key region in the source region and copies the
//! requested columns of the matching source row into the target region.
//!
//! ```text
//!   source              key        target
//!   ID  Name  Age       ID         Name  Age
//!   1   A     30   <--  2    -->   B     40
//!   2   B     40
//! ```
//!
//! The output workbook is a copy of the input where only the data cells of the
//! target region differ.
use crate::error::ResultMessage;
use crate::error::RustyFillError;
use crate::spreadsheet::writer;
use crate::spreadsheet::Range;
use crate::spreadsheet::SheetRange;
use crate::spreadsheet::XlsxWorkbook;
use log::info;
use std::fmt::Display;
use thiserror::Error;

pub(crate) mod layout;
pub mod matcher;
pub(crate) mod options;

pub use options::FillOptions;

/// Configuration errors found before any row is matched.
#[derive(Error, Debug)]
pub enum FillError {
    #[error("Not an Excel XLSX file: {0}")]
    FileExtensionError(String),

    #[error("File does not exist: {0}")]
    InputNotFoundError(String),

    #[error("File already exists: {0}")]
    OutputExistsError(String),

    #[error("Output file is the input file: {0}")]
    SameFileError(String),

    #[error("Key and target ranges have different heights ({0} and {1} rows)")]
    RowCountMismatchError(usize, usize),

    #[error("Key range {0} and target range {1} overlap")]
    KeyTargetOverlapError(String, String),

    #[error("Source range {0} and target range {1} overlap")]
    SourceTargetOverlapError(String, String),

    #[error("Column(s) missing from source range: {0:?}")]
    MissingColumnsError(Vec<String>),

    #[error("Duplicate column names in key range: {0:?}")]
    DuplicateKeyColumnsError(Vec<String>),

    #[error("Duplicate column names in source range: {0:?}")]
    DuplicateSourceColumnsError(Vec<String>),
}

/// Outcome of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillSummary {
    /// Number of target rows filled
    pub filled: usize,
    /// Worksheet rows (1-based) of key rows without a matching source row
    pub missing: Vec<usize>,
}

impl Display for FillSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} row(s) filled, {} row(s) missing", self.filled, self.missing.len())
    }
}

/// Fills the target region of `options.input_file` and writes the result to `options.output_file`.
///
/// Every configuration check runs before the output file is created; on error
/// no output is left behind.
pub fn run(options: &FillOptions) -> Result<FillSummary, RustyFillError> {
    options.validate_files()?;
    let source_range = SheetRange::try_from(options.source_range.as_str()).with_prefix("Source range")?;
    let key_range = SheetRange::try_from(options.key_range.as_str()).with_prefix("Key range")?;
    let target_range = SheetRange::try_from(options.target_range.as_str()).with_prefix("Target range")?;
    layout::check_regions(&source_range, &key_range, &target_range)?;

    let mut workbook = XlsxWorkbook::open(&options.input_file)?;
    let source = workbook.read_sheet(&source_range)?;
    let key = workbook.read_sheet(&key_range)?;
    let target = workbook.read_sheet(&header_row(&target_range))?;
    let layout = layout::Layout::new(&source.header()?, &key.header()?, &target.header()?)?;
    info!(
        "Source {} has {} row(s), key {} has {} row(s), target {} has {} column(s)",
        source_range,
        source.data_height(),
        key_range,
        key.data_height(),
        target_range,
        layout.target_in_source.len()
    );

    let matcher = matcher::RowMatcher::build(&source, &layout.key_in_source)?;
    let fill = matcher.fill(&key, &target_range.range, &layout.target_in_source, options.allow_missing)?;
    let patch = writer::to_patch(fill.cells);
    writer::save(&mut workbook, &target_range.sheet, &patch, &options.output_file, options.overwrite)?;
    info!("{}", fill.summary);
    Ok(fill.summary)
}

/// The first row of a region, which holds its column names.
fn header_row(sheet_range: &SheetRange) -> SheetRange {
    let range = sheet_range.range;
    SheetRange {
        sheet: sheet_range.sheet.to_owned(),
        range: Range::new(
            (range.row_lower_bound, range.col_lower_bound),
            (range.row_lower_bound, range.col_upper_bound),
        ),
    }
}
