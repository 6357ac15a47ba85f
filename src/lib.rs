//! # Rusty Fill
//!
//! Fills columns of an Excel workbook by looking rows up in another region of
//! the same workbook, typically to re-add columns that were deleted from a
//! filtered or sorted copy of a table.
//!
//! Three regions take part, each given as `Sheet!A1:C9` with the column names
//! in its first row:
//!
//! - **source**: the complete table
//! - **key**: the columns identifying a source row, one key row per target row
//! - **target**: the columns to copy from the matching source row
//!
//! Every key row must match exactly one source row. Values are copied with
//! their type; the rest of the workbook is written back unchanged.
//!
//! ```no_run
//! use rusty_fill::FillOptions;
//!
//! let options = FillOptions {
//!     input_file: "people.xlsx".into(),
//!     output_file: "people-filled.xlsx".into(),
//!     source_range: "All!A1:D200".to_owned(),
//!     key_range: "Filtered!A1:A40".to_owned(),
//!     target_range: "Filtered!B1:C40".to_owned(),
//!     ..FillOptions::default()
//! };
//! let summary = rusty_fill::run(&options)?;
//! println!("{summary}");
//! # Ok::<(), rusty_fill::RustyFillError>(())
//! ```

pub mod error;
pub mod fill;
mod helpers;
mod spreadsheet;

pub use error::RustyFillError;
pub use fill::matcher::MatchError;
pub use fill::run;
pub use fill::FillError;
pub use fill::FillOptions;
pub use fill::FillSummary;
pub use helpers::xml::XmlError;
pub use spreadsheet::range::RangeError;
pub use spreadsheet::SpreadsheetError;
