use crate::fill::FillError;
use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;

/// Extensions accepted for input and output workbooks
const EXCEL_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Configuration of one fill run.
#[derive(Clone, Debug, Default)]
pub struct FillOptions {
    /// Workbook to read
    pub input_file: PathBuf,
    /// Workbook to write; a patched copy of the input
    pub output_file: PathBuf,
    /// Region holding the complete rows, e.g. `Data!A1:F200`
    pub source_range: String,
    /// Region holding the key columns of the rows to fill
    pub key_range: String,
    /// Region whose data rows get filled, aligned row by row with the key region
    pub target_range: String,
    /// Replace the output file if it already exists
    pub overwrite: bool,
    /// Leave unmatched rows untouched instead of failing
    pub allow_missing: bool,
}

impl FillOptions {
    /// Checks file names and existence before anything is read.
    pub(crate) fn validate_files(&self) -> Result<(), FillError> {
        check_extension(&self.input_file)?;
        check_extension(&self.output_file)?;
        if !self.input_file.is_file() {
            return Err(FillError::InputNotFoundError(self.input_file.display().to_string()));
        }
        if is_same_file(&self.input_file, &self.output_file) {
            return Err(FillError::SameFileError(self.output_file.display().to_string()));
        }
        if !self.overwrite && self.output_file.exists() {
            return Err(FillError::OutputExistsError(self.output_file.display().to_string()));
        }
        Ok(())
    }
}

fn check_extension(path: &Path) -> Result<(), FillError> {
    let is_excel = path
        .extension()
        .and_then(OsStr::to_str)
        .map(|extension| EXCEL_EXTENSIONS.iter().any(|it| it.eq_ignore_ascii_case(extension)))
        .unwrap_or(false);
    if is_excel {
        Ok(())
    } else {
        Err(FillError::FileExtensionError(path.display().to_string()))
    }
}

/// An output that does not exist yet can never be the input.
fn is_same_file(input: &Path, output: &Path) -> bool {
    match (input.canonicalize(), output.canonicalize()) {
        (Ok(input), Ok(output)) => input == output,
        _ => false,
    }
}
