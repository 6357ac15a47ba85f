use thiserror::Error;

/// Main error type for Rusty Fill.
/// Aggregates errors from the standard library, dependencies and the internal modules.
#[derive(Error, Debug)]
pub enum RustyFillError {
    #[error("{0}: {1}")]
    WithContextError(String, Box<RustyFillError>),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    PersistError(#[from] tempfile::PersistError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    RangeError(#[from] crate::spreadsheet::range::RangeError),

    // Fill module errors
    #[error("{0}")]
    FillError(#[from] crate::fill::FillError),

    #[error("{0}")]
    MatchError(#[from] crate::fill::matcher::MatchError),
}

impl RustyFillError {
    /// Process exit code for this error.
    ///
    /// * `1` - configuration error (bad arguments, ranges, headers or files)
    /// * `2` - two source rows share the same key
    /// * `3` - a key row has no matching source row
    /// * `4` - I/O or file format error
    pub fn exit_code(&self) -> i32 {
        use crate::fill::matcher::MatchError;
        use crate::spreadsheet::SpreadsheetError;
        match self {
            Self::WithContextError(_, error) => error.exit_code(),
            Self::FillError(_) | Self::RangeError(_) => 1,
            Self::SpreadsheetError(
                SpreadsheetError::SheetNotFoundError(..)
                | SpreadsheetError::MissingHeaderError(..)
                | SpreadsheetError::SpreadsheetPasswordProtectedError(_)
                | SpreadsheetError::SharedFormulaError(..),
            ) => 1,
            Self::MatchError(MatchError::DuplicateKeyError { .. }) => 2,
            Self::MatchError(MatchError::NoMatchError { .. }) => 3,
            _ => 4,
        }
    }
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RustyFillError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RustyFillError::WithContextError(message.to_owned(), Box::new(e)))
    }
}
