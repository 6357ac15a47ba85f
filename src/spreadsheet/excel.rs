//! Package-level pieces of the Office Open XML format
use crate::error::RustyFillError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Relationship type suffix of worksheet parts
const WORKSHEET_RELATIONSHIP: &str = "/worksheet";

/// Magic number of OLE compound files, the container of encrypted packages
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Opens a workbook file as a ZIP archive.
///
/// A password protected workbook is an encrypted compound file, not a ZIP
/// archive; it gets its own error instead of a ZIP format error.
pub(super) fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, RustyFillError> {
    let mut reader = BufReader::new(File::open(path)?);
    if is_password_protected(&mut reader)? {
        Err(SpreadsheetError::SpreadsheetPasswordProtectedError(path.display().to_string()))?;
    }
    Ok(ZipArchive::new(reader)?)
}

/// Reads a `.rels` part into relationship id -> archive path of the worksheets it targets.
pub(super) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, RustyFillError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
    let mut worksheets = HashMap::<String, String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let is_worksheet = event.get_attribute_value("Type")?
                .map(|kind| kind.ends_with(WORKSHEET_RELATIONSHIP))
                .unwrap_or(true);
            let id = event.get_attribute_value("Id")?;
            let target = event.get_attribute_value("Target")?;
            match (id, target) {
                (Some(id), Some(target)) if is_worksheet => {
                    worksheets.insert(id.into_owned(), to_zip_path(target));
                }
                _ => (),
            }
        }
    });
    Ok(worksheets)
}

/// Resolves the number format of every cell style to a cell type.
///
/// `format_ids` holds the `numFmtId` of each `<xf>` in style order; custom formats
/// take precedence over built-in ids, anything unknown is a plain number.
pub(super) fn classify_number_formats(format_ids: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_ids
        .iter()
        .map(|id| match custom_formats.get(id) {
            Some(kind) => *kind,
            None => CellType::parse_builtin_number_format_id(id, is_1904).unwrap_or(CellType::Number),
        })
        .collect()
}

/// Turns a relationship target into an archive path.
/// Targets are relative to `xl/` unless they start with `/`.
pub(crate) fn to_zip_path(target: Cow<'_, str>) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_owned(),
        None if target.starts_with("xl/") => target.into_owned(),
        None => format!("xl/{target}"),
    }
}

/// Sniffs the compound file signature, then rewinds the reader.
fn is_password_protected<R: Read + Seek>(reader: &mut R) -> Result<bool, RustyFillError> {
    let mut signature = [0u8; CFB_SIGNATURE.len()];
    let protected = match reader.read_exact(&mut signature) {
        Ok(()) => signature == CFB_SIGNATURE,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(error) => return Err(error.into()),
    };
    reader.rewind()?;
    Ok(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path(Cow::Borrowed("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("/xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn number_formats() {
        let mut custom = HashMap::new();
        custom.insert("164".to_owned(), CellType::NumberDate1900);
        let formats = classify_number_formats(vec!["0".into(), "164".into(), "22".into()], custom, false);
        assert_eq!(formats, vec![CellType::Number, CellType::NumberDate1900, CellType::NumberDateTime1900]);
    }

    #[test]
    fn password_protected_signature() {
        let mut encrypted = Cursor::new([CFB_SIGNATURE.to_vec(), vec![0u8; 16]].concat());
        assert!(is_password_protected(&mut encrypted).unwrap());
        assert_eq!(encrypted.position(), 0);

        let mut zip = Cursor::new(b"PK\x03\x04rest-of-archive".to_vec());
        assert!(!is_password_protected(&mut zip).unwrap());

        let mut short = Cursor::new(b"PK".to_vec());
        assert!(!is_password_protected(&mut short).unwrap());
    }
}
