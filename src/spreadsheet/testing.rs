//! Builds small XLSX packages in memory for tests.

use crate::spreadsheet::reference::index_to_reference;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// A cell written by [`WorkbookBuilder`].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Value<'a> {
    Blank,
    Number(&'a str),
    /// Number styled with the `yyyy-mm-dd` format (style 1)
    Date(&'a str),
    Bool(bool),
    Shared(&'a str),
    /// Shared string made of several rich text runs
    Rich(&'a [&'a str]),
    Inline(&'a str),
    Error(&'a str),
    /// Formula with its cached numeric result
    Formula(&'a str, &'a str),
}

#[derive(Default)]
pub(crate) struct WorkbookBuilder {
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
    /// Formula cells of the first sheet listed in `xl/calcChain.xml`
    calc_chain: Vec<String>,
    date1904: bool,
}

impl WorkbookBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a worksheet whose rows start at A1.
    pub(crate) fn sheet(mut self, name: &str, rows: Vec<Vec<Value>>) -> Self {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
        xml.push_str("<sheetData>");
        for (row, values) in rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, value) in values.iter().enumerate() {
                let reference = index_to_reference(row, col);
                let cell = match value {
                    Value::Blank => continue,
                    Value::Number(number) => format!(r#"<c r="{reference}"><v>{number}</v></c>"#),
                    Value::Date(serial) => format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#),
                    Value::Bool(flag) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*flag)),
                    Value::Shared(text) => {
                        let index = self.shared_string(&format!("<t>{text}</t>"));
                        format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#)
                    }
                    Value::Rich(runs) => {
                        let runs: String = runs.iter().map(|run| format!("<r><t>{run}</t></r>")).collect();
                        let index = self.shared_string(&runs);
                        format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#)
                    }
                    Value::Inline(text) => format!(r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#),
                    Value::Error(code) => format!(r#"<c r="{reference}" t="e"><v>{code}</v></c>"#),
                    Value::Formula(formula, cached) => format!(r#"<c r="{reference}"><f>{formula}</f><v>{cached}</v></c>"#),
                };
                xml.push_str(&cell);
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        self.sheets.push((name.to_owned(), xml));
        self
    }

    /// Adds a worksheet with the given raw XML.
    pub(crate) fn raw_sheet(mut self, name: &str, xml: &str) -> Self {
        self.sheets.push((name.to_owned(), xml.to_owned()));
        self
    }

    /// Counts dates from 1904-01-01.
    pub(crate) fn date1904(mut self) -> Self {
        self.date1904 = true;
        self
    }

    /// Lists formula cells of the first sheet in a calculation chain.
    pub(crate) fn calc_chain(mut self, references: &[&str]) -> Self {
        self.calc_chain.extend(references.iter().map(|reference| reference.to_string()));
        self
    }

    fn shared_string(&mut self, content: &str) -> usize {
        self.shared_strings.push(format!("<si>{content}</si>"));
        self.shared_strings.len() - 1
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut entry = |name: &str, content: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        let mut content_types = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        for index in 1..=self.sheets.len() {
            content_types.push_str(&format!(r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#));
        }
        if !self.calc_chain.is_empty() {
            content_types.push_str(r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#);
        }
        content_types.push_str("</Types>");
        entry("[Content_Types].xml", &content_types);

        entry("_rels/.rels", r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#);

        let mut workbook = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
        if self.date1904 {
            workbook.push_str(r#"<workbookPr date1904="1"/>"#);
        }
        workbook.push_str("<sheets>");
        let mut relationships = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let id = index + 1;
            let name = name.replace('&', "&amp;").replace('\'', "&apos;");
            workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#));
            relationships.push_str(&format!(r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#));
        }
        let styles_id = self.sheets.len() + 1;
        relationships.push_str(&format!(r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#));
        relationships.push_str(&format!(r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#, styles_id + 1));
        if !self.calc_chain.is_empty() {
            relationships.push_str(&format!(r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/>"#, styles_id + 2));
            let cells: String = self.calc_chain.iter().map(|reference| format!(r#"<c r="{reference}" i="1"/>"#)).collect();
            entry("xl/calcChain.xml", &format!(r#"<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{cells}</calcChain>"#));
        }
        workbook.push_str("</sheets></workbook>");
        relationships.push_str("</Relationships>");
        entry("xl/workbook.xml", &workbook);
        entry("xl/_rels/workbook.xml.rels", &relationships);

        entry("xl/styles.xml", r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#);

        let shared_strings = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">{1}</sst>"#,
            self.shared_strings.len(),
            self.shared_strings.concat()
        );
        entry("xl/sharedStrings.xml", &shared_strings);

        for (index, (_, xml)) in self.sheets.iter().enumerate() {
            entry(&format!("xl/worksheets/sheet{}.xml", index + 1), xml);
        }
        zip.finish().unwrap().into_inner()
    }

    pub(crate) fn write_to(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}
