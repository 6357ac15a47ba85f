//! Writes a copy of an XLSX package with cells of one worksheet replaced.
//!
//! Every archive entry other than the patched worksheet is copied raw, so its
//! compressed bytes and timestamps are untouched. The worksheet XML itself is
//! streamed event by event; only the patched cells (and rows that did not
//! exist yet) are written anew.
//!
//! Overwriting a formula leaves the calculation chain pointing at a cell
//! without one, so the chain is then dropped along with its relationship and
//! content type. Excel rebuilds it on the next recalculation.

use crate::error::RustyFillError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use crate::spreadsheet::xlsx::WORKBOOK_RELATIONSHIPS_PATH;
use crate::spreadsheet::SpreadsheetError;
use log::debug;
use log::info;
use log::warn;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

const TAG_SHEET_DATA: &[u8] = b"sheetData";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_FORMULA: &[u8] = b"f";
const TAG_DIMENSION: &[u8] = b"dimension";
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_OVERRIDE: &[u8] = b"Override";

const CALC_CHAIN_PATH: &str = "xl/calcChain.xml";
const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
const CALC_CHAIN_RELATIONSHIP: &str = "/relationships/calcChain";

/// Cells to write, keyed by 0-based row then column.
pub(crate) type CellPatch = BTreeMap<usize, BTreeMap<usize, Cell>>;

/// A worksheet document with a patch applied.
#[derive(Debug)]
pub(crate) struct PatchedSheet {
    pub(crate) xml: Vec<u8>,
    /// Set when an existing formula was overwritten
    pub(crate) removed_formula: bool,
}

/// Groups cells by position; a later cell at the same position replaces an earlier one.
pub(crate) fn to_patch(cells: impl IntoIterator<Item = Cell>) -> CellPatch {
    let mut patch = CellPatch::new();
    for cell in cells {
        patch.entry(cell.row).or_default().insert(cell.col, cell);
    }
    patch
}

/// Writes the workbook to `output` with `patch` applied to one worksheet.
///
/// The package is assembled in a temporary file next to `output` and only moved
/// into place once complete. Without `overwrite` an existing `output` is an error.
pub(crate) fn save<RS: Read + Seek>(
    workbook: &mut XlsxWorkbook<RS>,
    sheet_name: &str,
    patch: &CellPatch,
    output: &Path,
    overwrite: bool,
) -> Result<(), RustyFillError> {
    let sheet_path = workbook.sheet_path(sheet_name)?;
    let xml = workbook.zip.read_bytes(&sheet_path)?
        .ok_or_else(|| SpreadsheetError::FileError(sheet_path.to_owned()))?;
    let patched = patch_sheet(&xml, patch)?;
    if patched.removed_formula {
        info!("Formulas were overwritten, dropping the calculation chain");
    }

    let directory = output.parent()
        .filter(|directory| !directory.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = write_package(&mut workbook.zip, &sheet_path, &patched, NamedTempFile::new_in(directory)?)?;
    file.as_file().sync_all()?;
    if overwrite {
        file.persist(output)?;
    } else {
        file.persist_noclobber(output)?;
    }
    info!("Wrote '{}'", output.display());
    Ok(())
}

/// Copies every entry of `zip` into `output`, replacing the content of `sheet_path`.
pub(crate) fn write_package<RS: Read + Seek, W: Write + Seek>(
    zip: &mut ZipArchive<RS>,
    sheet_path: &str,
    sheet: &PatchedSheet,
    output: W,
) -> Result<W, RustyFillError> {
    let mut writer = ZipWriter::new(output);
    for index in 0..zip.len() {
        let (name, compression, modified) = {
            let file = zip.by_index_raw(index)?;
            (file.name().to_owned(), file.compression(), file.last_modified().unwrap_or_default())
        };
        let path = name.replace('\\', "/");
        let content: Option<Cow<[u8]>> = if path.eq_ignore_ascii_case(sheet_path) {
            Some(Cow::Borrowed(sheet.xml.as_slice()))
        } else if !sheet.removed_formula {
            None
        } else if path.eq_ignore_ascii_case(CALC_CHAIN_PATH) {
            debug!("Dropping '{}'", name);
            continue;
        } else if path.eq_ignore_ascii_case(WORKBOOK_RELATIONSHIPS_PATH) {
            Some(Cow::Owned(remove_elements(&read_entry(zip, index)?, TAG_RELATIONSHIP, is_calc_chain_relationship)?))
        } else if path.eq_ignore_ascii_case(CONTENT_TYPES_PATH) {
            Some(Cow::Owned(remove_elements(&read_entry(zip, index)?, TAG_OVERRIDE, is_calc_chain_override)?))
        } else {
            None
        };

        match content {
            Some(content) => {
                let compression = match compression {
                    CompressionMethod::Stored => CompressionMethod::Stored,
                    _ => CompressionMethod::Deflated,
                };
                let options = SimpleFileOptions::default()
                    .compression_method(compression)
                    .last_modified_time(modified);
                debug!("Rewriting '{}'", name);
                writer.start_file(name, options)?;
                writer.write_all(&content)?;
            }
            None => writer.raw_copy_file(zip.by_index_raw(index)?)?,
        }
    }
    Ok(writer.finish()?)
}

fn read_entry<RS: Read + Seek>(zip: &mut ZipArchive<RS>, index: usize) -> Result<Vec<u8>, RustyFillError> {
    let mut bytes = Vec::new();
    zip.by_index(index)?.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Copies an XML document without the `tag` elements `is_removed` selects.
fn remove_elements(
    xml: &[u8],
    tag: &[u8],
    is_removed: fn(&BytesStart) -> Result<bool, RustyFillError>,
) -> Result<Vec<u8>, RustyFillError> {
    let mut reader = XmlReader::verbatim(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut skipping = false;
    while let Some(event) = reader.next()? {
        let removed = match &event {
            Event::Start(element) | Event::Empty(element) if element.local_name().as_ref() == tag => is_removed(element)?,
            _ => false,
        };
        match event {
            Event::Start(_) if removed => skipping = true,
            Event::Empty(_) if removed => (),
            Event::End(element) if skipping && element.local_name().as_ref() == tag => skipping = false,
            _ if skipping => (),
            event => writer.write_event(event)?,
        }
    }
    Ok(writer.into_inner())
}

fn is_calc_chain_relationship(element: &BytesStart) -> Result<bool, RustyFillError> {
    let kind = element.get_attribute_value("Type")?;
    Ok(kind.is_some_and(|kind| kind.ends_with(CALC_CHAIN_RELATIONSHIP)))
}

fn is_calc_chain_override(element: &BytesStart) -> Result<bool, RustyFillError> {
    let part = element.get_attribute_value("PartName")?;
    Ok(part.is_some_and(|part| part.trim_start_matches('/').eq_ignore_ascii_case(CALC_CHAIN_PATH)))
}

/// Applies `patch` to a worksheet XML document.
///
/// A cell holding the master of a shared or array formula is only overwritten
/// when the patch covers every cell the formula spans.
pub(crate) fn patch_sheet(xml: &[u8], patch: &CellPatch) -> Result<PatchedSheet, RustyFillError> {
    if patch.is_empty() {
        return Ok(PatchedSheet { xml: xml.to_vec(), removed_formula: false });
    }
    let mut patcher = SheetPatcher::new(patch, xml.len());
    let mut reader = XmlReader::verbatim(xml);
    let mut in_sheet_data = false;
    while let Some(event) = reader.next()? {
        match event.into_owned() {
            Event::Start(element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                patcher.use_prefix_of(&element);
                in_sheet_data = true;
                patcher.write(Event::Start(element))?;
            }
            Event::Empty(element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                patcher.use_prefix_of(&element);
                let end = element.to_end().into_owned();
                patcher.write(Event::Start(element))?;
                patcher.write_rows_before(None)?;
                patcher.write(Event::End(end))?;
            }
            Event::End(element) if element.local_name().as_ref() == TAG_SHEET_DATA => {
                patcher.write_rows_before(None)?;
                in_sheet_data = false;
                patcher.write(Event::End(element))?;
            }
            Event::Start(element) if in_sheet_data && element.local_name().as_ref() == TAG_ROW => {
                let row = patcher.row_index(&element)?;
                patcher.write_rows_before(Some(row))?;
                patcher.write(Event::Start(element))?;
                patcher.open_row(row);
            }
            Event::Empty(element) if in_sheet_data && element.local_name().as_ref() == TAG_ROW => {
                let row = patcher.row_index(&element)?;
                patcher.write_rows_before(Some(row))?;
                if patcher.open_row(row) {
                    let end = element.to_end().into_owned();
                    patcher.write(Event::Start(element))?;
                    patcher.close_row()?;
                    patcher.write(Event::End(end))?;
                } else {
                    patcher.write(Event::Empty(element))?;
                }
            }
            Event::End(element) if in_sheet_data && element.local_name().as_ref() == TAG_ROW => {
                patcher.close_row()?;
                patcher.write(Event::End(element))?;
            }
            Event::Start(element) if patcher.in_patched_row() && element.local_name().as_ref() == TAG_CELL => {
                let col = patcher.col_index(&element)?;
                if patcher.replaces(col)? {
                    let style = element.get_attribute_value("s")?.map(|style| style.into_owned());
                    let reference = element.get_attribute_value("r")?.unwrap_or_default().into_owned();
                    match skip_cell(&mut reader)? {
                        SkippedFormula::None => (),
                        SkippedFormula::Single => patcher.drop_formula(&reference),
                        SkippedFormula::Master(span) if covers(patch, &span) => patcher.drop_formula(&reference),
                        SkippedFormula::Master(span) => Err(SpreadsheetError::SharedFormulaError(reference, span))?,
                    }
                    patcher.write_replacement(style)?;
                } else {
                    patcher.write(Event::Start(element))?;
                }
            }
            Event::Empty(element) if patcher.in_patched_row() && element.local_name().as_ref() == TAG_CELL => {
                let col = patcher.col_index(&element)?;
                if patcher.replaces(col)? {
                    let style = element.get_attribute_value("s")?.map(|style| style.into_owned());
                    patcher.write_replacement(style)?;
                } else {
                    patcher.write(Event::Empty(element))?;
                }
            }
            Event::Empty(element) if !in_sheet_data && element.local_name().as_ref() == TAG_DIMENSION => {
                let element = patcher.widen_dimension(element)?;
                patcher.write(Event::Empty(element))?;
            }
            event => patcher.write(event)?,
        }
    }
    Ok(PatchedSheet {
        removed_formula: patcher.removed_formula,
        xml: patcher.writer.into_inner(),
    })
}

/// Formula found in a skipped `<c>` element.
enum SkippedFormula {
    None,
    /// A formula of this cell alone, or one that refers to a shared formula elsewhere
    Single,
    /// Master of a shared or array formula spanning the given range
    Master(String),
}

/// Skips the rest of a `<c>` element.
fn skip_cell(reader: &mut XmlReader<&[u8]>) -> Result<SkippedFormula, RustyFillError> {
    let mut formula = SkippedFormula::None;
    while let Some(event) = reader.next()? {
        match event {
            Event::End(element) if element.local_name().as_ref() == TAG_CELL => break,
            Event::Start(element) | Event::Empty(element) if element.local_name().as_ref() == TAG_FORMULA => {
                let kind = element.get_attribute_value("t")?;
                let span = element.get_attribute_value("ref")?;
                formula = match (kind.as_deref(), span) {
                    (Some("shared") | Some("array"), Some(span)) => SkippedFormula::Master(span.into_owned()),
                    _ => SkippedFormula::Single,
                };
            }
            _ => (),
        }
    }
    Ok(formula)
}

/// Checks if the patch writes every cell of `span`; an unreadable span is never covered.
fn covers(patch: &CellPatch, span: &str) -> bool {
    match Range::try_from(span) {
        Ok(span) => (span.row_lower_bound..=span.row_upper_bound).all(|row| {
            patch
                .get(&row)
                .is_some_and(|cells| (span.col_lower_bound..=span.col_upper_bound).all(|col| cells.contains_key(&col)))
        }),
        Err(_) => false,
    }
}

/// Streaming state of [`patch_sheet`].
struct SheetPatcher<'a> {
    writer: Writer<Vec<u8>>,
    /// Patched rows in ascending order
    rows: Vec<(usize, Vec<&'a Cell>)>,
    /// First row of `rows` not written yet
    next_row: usize,
    /// Open `<row>` being patched: index into `rows` and first cell not written yet
    current: Option<(usize, usize)>,
    /// Row index assumed for a `<row>` without `r`
    sheet_row: usize,
    /// Column index assumed for a `<c>` without `r`
    sheet_col: usize,
    /// Cells the patch spans, used to widen `<dimension>`
    bounds: Range,
    /// Namespace prefix of the worksheet elements, e.g. "x:"
    prefix: String,
    removed_formula: bool,
}

impl<'a> SheetPatcher<'a> {
    fn new(patch: &'a CellPatch, capacity: usize) -> Self {
        let rows: Vec<(usize, Vec<&Cell>)> = patch
            .iter()
            .map(|(row, cells)| (*row, cells.values().collect()))
            .collect();
        let bounds = rows
            .iter()
            .flat_map(|(_, cells)| cells.iter().map(|cell| Range::new((cell.row, cell.col), (cell.row, cell.col))))
            .reduce(|bounds, cell| bounds.union(&cell))
            .unwrap_or(Range::new((0, 0), (0, 0)));
        SheetPatcher {
            writer: Writer::new(Vec::with_capacity(capacity + 64 * patch.len())),
            rows,
            next_row: 0,
            current: None,
            sheet_row: 0,
            sheet_col: 0,
            bounds,
            prefix: String::new(),
            removed_formula: false,
        }
    }

    fn write(&mut self, event: Event) -> Result<(), RustyFillError> {
        self.writer.write_event(event)?;
        Ok(())
    }

    fn use_prefix_of(&mut self, element: &BytesStart) {
        self.prefix = element
            .name()
            .prefix()
            .map(|prefix| format!("{}:", String::from_utf8_lossy(prefix.as_ref())))
            .unwrap_or_default();
    }

    fn drop_formula(&mut self, reference: &str) {
        warn!("Overwriting formula in {}", reference);
        self.removed_formula = true;
    }

    fn tag(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn row_index(&mut self, element: &BytesStart) -> Result<usize, RustyFillError> {
        let row = element.get_attribute_value("r")?
            .and_then(|r| row_to_index(&r))
            .unwrap_or(self.sheet_row);
        self.sheet_row = row + 1;
        self.sheet_col = 0;
        Ok(row)
    }

    fn col_index(&mut self, element: &BytesStart) -> Result<usize, RustyFillError> {
        let col = element.get_attribute_value("r")?
            .and_then(|reference| reference_to_index(&reference))
            .map(|(_, col)| col)
            .unwrap_or(self.sheet_col);
        self.sheet_col = col + 1;
        Ok(col)
    }

    fn in_patched_row(&self) -> bool {
        self.current.is_some()
    }

    /// Writes every patched row that comes before `row` (all of them for None).
    fn write_rows_before(&mut self, row: Option<usize>) -> Result<(), RustyFillError> {
        while let Some((index, cells)) = self.rows.get(self.next_row) {
            if row.map(|row| row <= *index).unwrap_or(false) {
                break;
            }
            // Nothing to write into a row that does not exist yet
            if cells.iter().all(|cell| cell.is_empty() && cell.style.is_none()) {
                self.next_row += 1;
                continue;
            }
            let row_number = (index + 1).to_string();
            let tag = self.tag("row");
            let mut element = BytesStart::new(tag.as_str());
            element.push_attribute(("r", row_number.as_str()));
            self.write(Event::Start(element))?;
            self.current = Some((self.next_row, 0));
            self.next_row += 1;
            self.close_row()?;
            self.write(Event::End(BytesEnd::new(tag)))?;
        }
        Ok(())
    }

    /// Starts patching an existing row; returns false if the row has no patched cells.
    fn open_row(&mut self, row: usize) -> bool {
        match self.rows.get(self.next_row) {
            Some((index, _)) if *index == row => {
                self.current = Some((self.next_row, 0));
                self.next_row += 1;
                true
            }
            _ => false,
        }
    }

    /// Writes the patched cells left in the open row.
    fn close_row(&mut self) -> Result<(), RustyFillError> {
        self.write_cells_before(None)?;
        self.current = None;
        Ok(())
    }

    /// Writes the patched cells of the open row that come before `col` (all of them for None).
    fn write_cells_before(&mut self, col: Option<usize>) -> Result<(), RustyFillError> {
        while let Some((row, position)) = self.current {
            let cell = match self.rows[row].1.get(position) {
                Some(cell) if col.map(|col| cell.col < col).unwrap_or(true) => *cell,
                _ => break,
            };
            self.current = Some((row, position + 1));
            self.write_cell(cell, None)?;
        }
        Ok(())
    }

    /// Flushes the cells before `col`; returns true if the existing cell at `col` gets replaced.
    fn replaces(&mut self, col: usize) -> Result<bool, RustyFillError> {
        self.write_cells_before(Some(col))?;
        Ok(self.current
            .and_then(|(row, position)| self.rows[row].1.get(position))
            .map(|cell| cell.col == col)
            .unwrap_or(false))
    }

    /// Writes the patched cell in place of an existing one, inheriting its style.
    fn write_replacement(&mut self, style: Option<String>) -> Result<(), RustyFillError> {
        if let Some((row, position)) = self.current {
            let cell = self.rows[row].1[position];
            self.current = Some((row, position + 1));
            self.write_cell(cell, style)?;
        }
        Ok(())
    }

    fn write_cell(&mut self, cell: &Cell, existing_style: Option<String>) -> Result<(), RustyFillError> {
        let reference = cell.reference();
        let style = cell.style.map(|style| style.to_string()).or(existing_style);
        let tag = self.tag("c");
        let mut element = BytesStart::new(tag.as_str());
        element.push_attribute(("r", reference.as_str()));
        if let Some(style) = &style {
            element.push_attribute(("s", style.as_str()));
        }
        let (kind, value) = match cell.kind {
            CellType::Empty => {
                // Clearing an unstyled cell removes it altogether
                if style.is_some() {
                    self.write(Event::Empty(element))?;
                }
                return Ok(());
            }
            CellType::String => return self.write_inline_string(element, &cell.value),
            CellType::Boolean => (Some("b"), if cell.to_boolean() { "1" } else { "0" }),
            CellType::IsoDateTime => (Some("d"), cell.value.as_str()),
            CellType::Error => (Some("e"), cell.value.as_str()),
            _ => (None, cell.value.as_str()),
        };
        if let Some(kind) = kind {
            element.push_attribute(("t", kind));
        }
        self.write(Event::Start(element))?;
        self.write(Event::Start(BytesStart::new(self.tag("v"))))?;
        self.write(Event::Text(BytesText::new(value)))?;
        self.write(Event::End(BytesEnd::new(self.tag("v"))))?;
        self.write(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn write_inline_string(&mut self, mut element: BytesStart, text: &str) -> Result<(), RustyFillError> {
        let tag = self.tag("c");
        element.push_attribute(("t", "inlineStr"));
        self.write(Event::Start(element))?;
        self.write(Event::Start(BytesStart::new(self.tag("is"))))?;
        let mut text_element = BytesStart::new(self.tag("t"));
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            text_element.push_attribute(("xml:space", "preserve"));
        }
        self.write(Event::Start(text_element))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.write(Event::End(BytesEnd::new(self.tag("t"))))?;
        self.write(Event::End(BytesEnd::new(self.tag("is"))))?;
        self.write(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    /// Widens the `ref` of `<dimension>` so it covers the patched cells.
    fn widen_dimension(&self, element: BytesStart<'static>) -> Result<BytesStart<'static>, RustyFillError> {
        let current = element.get_attribute_value("ref")?
            .and_then(|reference| Range::try_from(&*reference).ok());
        let widened = match current {
            Some(current) if current.union(&self.bounds) != current => current.union(&self.bounds),
            _ => return Ok(element),
        };
        let widened = widened.to_string();
        let mut dimension = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
        for attribute in element.attributes() {
            let attribute = attribute?;
            if attribute.key.local_name().as_ref() == b"ref" {
                dimension.push_attribute(("ref", widened.as_str()));
            } else {
                dimension.push_attribute(attribute);
            }
        }
        Ok(dimension)
    }
}
