use crate::error::ResultOptionChain;
use crate::error::RustyFillError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::range::SheetRange;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use log::info;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use zip::ZipArchive;

const WORKBOOK_PATH: &str = "xl/workbook.xml";
pub(super) const WORKBOOK_RELATIONSHIPS_PATH: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PATH: &str = "xl/styles.xml";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

// workbook.xml
const TAG_SHEET: &[u8] = b"sheet";
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
// styles.xml
const TAG_NUMBER_FORMATS: &[u8] = b"numFmts";
const TAG_NUMBER_FORMAT: &[u8] = b"numFmt";
const TAG_CELL_FORMATS: &[u8] = b"cellXfs";
const TAG_CELL_FORMAT: &[u8] = b"xf";
// sharedStrings.xml and inline strings
const TAG_STRING_ITEM: &[u8] = b"si";
const TAG_TEXT: &[u8] = b"t";
const TAG_PHONETIC_RUN: &[u8] = b"rPh";
// worksheets
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

/// An opened Excel XLSX workbook
pub(crate) struct XlsxWorkbook<RS: Read + Seek = BufReader<File>> {
    /// File name, used in messages
    pub(crate) name: String,
    /// The package itself
    pub(crate) zip: ZipArchive<RS>,
    /// Cell type implied by each cell style, by style index
    number_formats: Vec<CellType>,
    /// Worksheet names and their archive paths, in workbook order
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
}

impl XlsxWorkbook {
    pub(crate) fn open(path: &Path) -> Result<XlsxWorkbook, RustyFillError> {
        let zip = excel::open_archive(path)?;
        let workbook = XlsxWorkbook::from_archive(&path.display().to_string(), zip)?;
        info!("Opened workbook '{}' with {} sheet(s)", workbook.name, workbook.sheets.len());
        Ok(workbook)
    }
}

impl<RS: Read + Seek> XlsxWorkbook<RS> {
    /// Reads the sheet list, cell styles and shared strings of a package.
    pub(crate) fn from_archive(name: &str, mut zip: ZipArchive<RS>) -> Result<XlsxWorkbook<RS>, RustyFillError> {
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        debug!(
            "Workbook '{}': sheets {:?}, {} cell style(s), {} shared string(s), 1904 date system: {}",
            name,
            sheets,
            number_formats.len(),
            shared_strings.len(),
            is_1904
        );
        Ok(XlsxWorkbook {
            name: name.to_owned(),
            zip,
            number_formats,
            sheets,
            shared_strings,
        })
    }

    /// Finds the archive path of a worksheet by name.
    /// An exact match wins, otherwise names compare case-insensitively like Excel does.
    pub(crate) fn sheet_path(&self, sheet_name: &str) -> Result<String, RustyFillError> {
        let exact: Result<Option<String>, RustyFillError> = Ok(self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned()));
        exact
            .ok_none_else(|| Ok(self.sheets
                .iter()
                .find(|(name, _)| name.to_lowercase() == sheet_name.to_lowercase())
                .map(|(_, path)| path.to_owned())))?
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()).into())
    }

    /// Reads the cells of a worksheet region.
    ///
    /// Only cells inside the range are kept; parsing stops once the worksheet
    /// moves past the last row of the range.
    pub(crate) fn read_sheet(&mut self, sheet_range: &SheetRange) -> Result<Sheet, RustyFillError> {
        let zip_path = self.sheet_path(&sheet_range.sheet)?;
        debug!("Reading {} from '{}'", sheet_range, zip_path);

        let mut sheet = Sheet::new(&self.name, &sheet_range.sheet, sheet_range.range);
        // Position implied for rows and cells without an `r` attribute
        let mut next_row = 0usize;
        let mut next_col = 0usize;
        // Cell being read; Empty while outside the region
        let (mut row, mut col) = (0usize, 0usize);
        let mut kind = CellType::Empty;
        let mut style = None::<usize>;
        let mut is_shared = false;
        let mut value = String::new();

        let mut reader = self.zip.xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                next_row = event.get_attribute_value("r")?
                    .and_then(|r| row_to_index(&r))
                    .unwrap_or(next_row);
                next_col = 0;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_ROW => next_row += 1,
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((next_row, next_col));
                next_col = col + 1;
                value.clear();
                is_shared = false;
                kind = CellType::Empty;
                if sheet.after_row_upper_bound(row) {
                    break;
                }
                if sheet.contains(row, col) {
                    kind = match event.get_attribute_value("t")?.as_deref() {
                        Some("s") => {
                            is_shared = true;
                            CellType::String
                        }
                        Some("inlineStr") | Some("str") => CellType::String,
                        Some("b") => CellType::Boolean,
                        Some("e") => CellType::Error,
                        Some("d") => CellType::IsoDateTime,
                        _ => CellType::Number,
                    };
                    style = event.parse_attribute_value::<usize>("s")?;
                    if kind == CellType::Number {
                        kind = style
                            .and_then(|index| self.number_formats.get(index).copied())
                            .unwrap_or(CellType::Number);
                    }
                }
            }
            Event::Start(event) if kind != CellType::Empty && event.local_name().as_ref() == TAG_VALUE => {
                value = read_text(&mut reader, TAG_VALUE, true)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.local_name().as_ref() == TAG_INLINE_STRING => {
                value = read_text(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::End(event) if kind != CellType::Empty && event.local_name().as_ref() == TAG_CELL => {
                if is_shared {
                    let index = value.trim().parse::<usize>()?;
                    value = self.shared_strings
                        .get(index)
                        .cloned()
                        .ok_or_else(|| SpreadsheetError::CellValueError(
                            sheet.file_name.to_owned(),
                            sheet.name.to_owned(),
                            Cell::empty(row, col).reference(),
                            format!("shared string {index} does not exist"),
                        ))?;
                }
                // A cell without a value reads like a missing one
                if !value.is_empty() {
                    sheet.push(Cell {
                        row,
                        col,
                        kind,
                        value: std::mem::take(&mut value),
                        style,
                    });
                }
                kind = CellType::Empty;
            },
        });
        sheet.finish();
        debug!("Read {} non-empty cell(s) from {}", sheet.cells.len(), sheet_range);
        Ok(sheet)
    }
}

/// Lists the worksheets (name, archive path) and tells whether dates count from 1904.
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), RustyFillError> {
    let worksheets = excel::load_relationships(zip, WORKBOOK_RELATIONSHIPS_PATH)?;
    let mut reader = zip.xml_reader(WORKBOOK_PATH)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PATH.to_owned()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            // The relationship id is `r:id`, whatever the prefix is called
            let mut name = None;
            let mut id = None;
            for attribute in event.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.get_value()?.into_owned()),
                    b"id" => id = Some(attribute.get_value()?.into_owned()),
                    _ => (),
                }
            }
            let path = id.and_then(|id| worksheets.get(&id));
            if let Some((name, path)) = name.zip(path) {
                sheets.push((name, path.to_owned()));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = matches!(event.get_attribute_value("date1904")?.as_deref(), Some("1") | Some("true"));
        }
    });
    Ok((sheets, is_1904))
}

/// Reads the cell styles of styles.xml and classifies their number formats.
/// Without styles every number is a plain number.
fn load_number_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>, is_1904: bool) -> Result<Vec<CellType>, RustyFillError> {
    let Some(mut reader) = zip.xml_reader(STYLES_PATH)? else {
        return Ok(Vec::new());
    };

    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_ids = Vec::<String>::new();
    let mut in_number_formats = false;
    let mut in_cell_formats = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_NUMBER_FORMATS => in_number_formats = true,
        Event::End(event) if event.local_name().as_ref() == TAG_NUMBER_FORMATS => in_number_formats = false,
        Event::Start(event) if event.local_name().as_ref() == TAG_CELL_FORMATS => in_cell_formats = true,
        // cellXfs comes after numFmts; nothing further is needed
        Event::End(event) if event.local_name().as_ref() == TAG_CELL_FORMATS => break,
        Event::Start(event) if in_number_formats && event.local_name().as_ref() == TAG_NUMBER_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id.into_owned(), CellType::parse_custom_number_format(&code, is_1904));
            }
        }
        Event::Start(event) if in_cell_formats && event.local_name().as_ref() == TAG_CELL_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            format_ids.push(id.map(|id| id.into_owned()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::classify_number_formats(format_ids, custom_formats, is_1904))
}

/// Loads the shared string table; a package without one has no shared strings.
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, RustyFillError> {
    let mut shared_strings = Vec::<String>::new();
    if let Some(mut reader) = zip.xml_reader(SHARED_STRINGS_PATH)? {
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_STRING_ITEM => {
                shared_strings.push(read_text(&mut reader, TAG_STRING_ITEM, false)?);
            }
        });
    }
    Ok(shared_strings)
}

/// Collects the text up to the closing `end_tag`.
///
/// Rich text runs are concatenated and phonetic runs (`<rPh>`) skipped. With
/// `is_text_content` the element holds text directly (`<v>`); otherwise only
/// `<t>` children count (`<si>`, `<is>`).
fn read_text<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, RustyFillError> {
    let mut text = String::new();
    let mut in_text = is_text_content;
    let mut in_phonetic_run = false;
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_RUN => in_phonetic_run = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_RUN => in_phonetic_run = false,
        Event::Start(event) if event.local_name().as_ref() == TAG_TEXT => in_text = !in_phonetic_run,
        Event::End(event) if event.local_name().as_ref() == TAG_TEXT => in_text = is_text_content,
        Event::Text(event) if in_text => text.push_bytes_text(&event)?,
        Event::GeneralRef(event) if in_text => text.push_bytes_ref(&event)?,
        Event::CData(event) if in_text => text.push_str(&event.xml_content()?),
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::testing::WorkbookBuilder;
    use crate::spreadsheet::testing::Value;

    fn workbook() -> XlsxWorkbook<std::io::Cursor<Vec<u8>>> {
        let bytes = WorkbookBuilder::new()
            .sheet("Data", vec![
                vec![Value::Shared("ID"), Value::Shared("Name"), Value::Inline("Joined"), Value::Inline("Active")],
                vec![Value::Number("1"), Value::Shared("Alice"), Value::Date("45000"), Value::Bool(true)],
                vec![Value::Number("2"), Value::Rich(&["B", "ob"]), Value::Date("45001.5"), Value::Bool(false)],
                vec![Value::Number("3"), Value::Blank, Value::Error("#N/A"), Value::Formula("SUM(A1:A3)", "6")],
            ])
            .sheet("My Keys", vec![vec![Value::Inline("ID")]])
            .to_bytes();
        XlsxWorkbook::from_archive("book.xlsx", ZipArchive::new(std::io::Cursor::new(bytes)).unwrap()).unwrap()
    }

    #[test]
    fn read_sheet_region() {
        let mut workbook = workbook();
        let sheet = workbook.read_sheet(&SheetRange::try_from("Data!A1:D4").unwrap()).unwrap();
        assert_eq!(sheet.header().unwrap(), vec!["ID", "Name", "Joined", "Active"]);

        let table = sheet.table();
        assert_eq!(table[1][0].kind, CellType::Number);
        assert_eq!(table[1][1].value, "Alice");
        assert_eq!(table[1][1].kind, CellType::String);
        assert_eq!(table[1][2].kind, CellType::NumberDate1900);
        assert_eq!(table[1][2].style, Some(1));
        assert_eq!(table[1][2].to_string(), "2023-03-15");
        assert_eq!(table[1][3].kind, CellType::Boolean);
        assert!(table[1][3].to_boolean());
        assert_eq!(table[2][1].value, "Bob");
        assert!(table[3][1].is_empty());
        assert_eq!(table[3][2].kind, CellType::Error);
        assert_eq!(table[3][2].value, "#N/A");
        assert_eq!(table[3][3].kind, CellType::Number);
        assert_eq!(table[3][3].value, "6");
    }

    #[test]
    fn read_sheet_partial_region() {
        let mut workbook = workbook();
        let sheet = workbook.read_sheet(&SheetRange::try_from("data!B2:C3").unwrap()).unwrap();
        assert_eq!(sheet.cells.len(), 4);
        assert!(sheet.cells.iter().all(|cell| (1..=2).contains(&cell.row) && (1..=2).contains(&cell.col)));
    }

    #[test]
    fn read_sheet_with_quoted_name() {
        let mut workbook = workbook();
        let sheet = workbook.read_sheet(&SheetRange::try_from("'My Keys'!A1:A3").unwrap()).unwrap();
        assert_eq!(sheet.header().unwrap(), vec!["ID"]);
        assert_eq!(sheet.data_height(), 2);
    }

    #[test]
    fn read_1904_dates() {
        let bytes = WorkbookBuilder::new()
            .sheet("Data", vec![vec![Value::Inline("Joined")], vec![Value::Date("0")], vec![Value::Date("43538")]])
            .date1904()
            .to_bytes();
        let mut workbook = XlsxWorkbook::from_archive("book.xlsx", ZipArchive::new(std::io::Cursor::new(bytes)).unwrap()).unwrap();
        let table = workbook.read_sheet(&SheetRange::try_from("Data!A1:A3").unwrap()).unwrap().table();
        assert_eq!(table[1][0].kind, CellType::NumberDate1904);
        assert_eq!(table[1][0].to_string(), "1904-01-01");
        assert_eq!(table[2][0].to_string(), "2023-03-15");
    }

    #[test]
    fn read_missing_sheet() {
        let mut workbook = workbook();
        let result = workbook.read_sheet(&SheetRange::try_from("Nope!A1:A3").unwrap());
        assert!(matches!(
            result,
            Err(RustyFillError::SpreadsheetError(SpreadsheetError::SheetNotFoundError(_, _)))
        ));
    }
}
