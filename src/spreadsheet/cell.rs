use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use std::fmt::Display;

/// What a stored cell value means.
///
/// A date is a number whose style applies a date or time format, so dates keep
/// the date system of their workbook.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// `t="b"`, stored as 0 or 1
    Boolean,
    Number,
    NumberDateTime1900,
    NumberDate1900,
    NumberTime1900,
    NumberDateTime1904,
    NumberDate1904,
    NumberTime1904,
    /// `t="d"`, an ISO 8601 date and/or time
    IsoDateTime,
    /// Text, whether inline, shared or a cached formula result
    String,
    /// `t="e"`, e.g. `#N/A`
    Error,
}

impl CellType {
    fn date_time(is_date: bool, is_time: bool, is_1904: bool) -> Self {
        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, false, false) => Self::NumberDate1900,
            (false, true, false) => Self::NumberTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, true) => Self::NumberDate1904,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    /// Cell type of the built-in number formats that show dates or times.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        let (is_date, is_time) = match id {
            "14" | "15" | "16" | "17" => (true, false),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => (false, true),
            "22" => (true, true),
            _ => return None,
        };
        Some(Self::date_time(is_date, is_time, is_1904))
    }

    /// Cell type implied by a custom format code such as `yyyy-mm-dd hh:mm`.
    ///
    /// Quoted literals, bracketed sections (`[Red]`, `[$-409]`) and escaped
    /// characters are skipped; `m` alone is ambiguous and decides nothing.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_date = false;
        let mut is_time = false;
        let mut characters = format.chars();
        while let Some(character) = characters.next() {
            match character {
                '\\' | '_' | '*' => {
                    characters.next();
                }
                '"' => {
                    characters.by_ref().find(|character| *character == '"');
                }
                '[' => {
                    characters.by_ref().find(|character| *character == ']');
                }
                'y' | 'Y' | 'd' | 'D' => is_date = true,
                'h' | 'H' | 's' | 'S' => is_time = true,
                _ => (),
            }
        }
        Self::date_time(is_date, is_time, is_1904)
    }

    /// True for numbers that only mean something together with their date/time number format.
    pub(crate) fn is_date_time(&self) -> bool {
        matches!(
            self,
            Self::NumberDateTime1900 | Self::NumberDate1900 | Self::NumberTime1900
                | Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904
        )
    }

    /// True for every numeric representation, date/time serials included.
    pub(crate) fn is_number(&self) -> bool {
        *self == Self::Number || self.is_date_time()
    }
}

/// Normalized, hashable view of a cell value used to build composite keys.
///
/// Numbers compare by value (`1` equals `1.0`, and a date equals its serial number);
/// text compares exactly, so the text `"1"` never equals the number `1`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum KeyPart {
    Empty,
    Boolean(bool),
    Number(u64),
    Text(String),
    IsoDateTime(String),
    Error(String),
}

/// A cell value at its worksheet position.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Cell {
    /// 0-based
    pub(crate) row: usize,
    /// 0-based
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Cell value in its stored lexical form
    pub(crate) value: String,
    /// Style index (`s` attribute) into the workbook's cell formats
    pub(crate) style: Option<usize>,
}

impl Cell {
    /// Creates an empty cell at (row, col).
    pub(crate) fn empty(row: usize, col: usize) -> Self {
        Cell {
            row,
            col,
            kind: CellType::Empty,
            value: String::new(),
            style: None,
        }
    }

    /// A1-style reference of the cell position.
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.kind == CellType::Empty
    }

    pub(crate) fn to_boolean(&self) -> bool {
        self.value == "1" || self.value.eq_ignore_ascii_case("true")
    }

    pub(crate) fn to_double(&self) -> Result<f64, String> {
        self.value.trim().parse::<f64>().map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    /// Projects the cell onto its key representation.
    pub(crate) fn key_part(&self) -> KeyPart {
        match self.kind {
            CellType::Empty => KeyPart::Empty,
            CellType::Boolean => KeyPart::Boolean(self.to_boolean()),
            kind if kind.is_number() => match self.to_double() {
                // -0.0 and 0.0 are the same key
                Ok(number) => KeyPart::Number((number + 0.0).to_bits()),
                Err(_) => KeyPart::Text(self.value.to_owned()),
            },
            CellType::IsoDateTime => KeyPart::IsoDateTime(self.value.to_owned()),
            CellType::Error => KeyPart::Error(self.value.to_owned()),
            _ => KeyPart::Text(self.value.to_owned()),
        }
    }

    /// Copies the value to another position.
    ///
    /// Date/time cells carry their style along since the number alone does not say it is a date;
    /// any other copy leaves the style to the destination cell.
    pub(crate) fn copy_to(&self, row: usize, col: usize) -> Cell {
        Cell {
            row,
            col,
            kind: self.kind,
            value: self.value.to_owned(),
            style: self.style.filter(|_| self.kind.is_date_time()),
        }
    }
}

/// Formats key values for messages, e.g. `(2, "Bob")`.
pub(crate) fn describe_key(cells: &[&Cell]) -> String {
    let values: Vec<String> = cells
        .iter()
        .map(|cell| match cell.kind {
            CellType::String | CellType::IsoDateTime => format!("{:?}", cell.value),
            _ => cell.to_string(),
        })
        .collect();
    format!("({})", values.join(", "))
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self.kind {
            CellType::Empty => Some("<empty>".to_owned()),
            CellType::Boolean => Some(if self.to_boolean() { "TRUE" } else { "FALSE" }.to_owned()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value),
            CellType::IsoDateTime => Some(self.value.replace('T', " ")),
            _ => Some(self.value.to_owned()),
        };
        write!(f, "{}", value.unwrap_or_else(|| self.value.to_owned()))
    }
}

/// Calendar date of a serial day number.
///
/// In the 1900 system serial 60 is the fictitious 1900-02-29, so serials
/// before it are shifted by one day.
fn to_date_string(value: &str, is_1904: bool) -> Option<String> {
    let serial = value.parse::<f64>().ok()?.trunc() as i64;
    let days = match (is_1904, serial) {
        (true, _) => serial.checked_add(1462)?,
        (false, serial) if serial < 60 => serial + 1,
        (false, serial) => serial,
    };
    // Serials past the calendar chrono supports render as plain numbers
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::try_days(days)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Time of day of the fractional part of a serial, to the millisecond.
fn to_time_string(value: &str) -> Option<String> {
    let fraction = value.parse::<f64>().ok()?.fract();
    let total = (fraction * 86_400_000f64).round() as i64;
    let (hours, minutes) = (total / 3_600_000, total / 60_000 % 60);
    let (seconds, milliseconds) = (total / 1_000 % 60, total % 1_000);
    Some(match milliseconds {
        0 => format!("{hours:02}:{minutes:02}:{seconds:02}"),
        _ => format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}"),
    })
}

fn to_datetime_string(value: &str, is_1904: bool) -> Option<String> {
    Some(format!("{} {}", to_date_string(value, is_1904)?, to_time_string(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell {
            row: 0,
            col: 0,
            kind,
            value: value.to_owned(),
            style: Some(3),
        }
    }

    #[test]
    fn custom_number_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("hh:mm:ss", false), CellType::NumberTime1900);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("0.00\"days\"", false), CellType::Number);
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("2", false), None);
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(cell(CellType::Number, "1").key_part(), cell(CellType::Number, "1.0").key_part());
        assert_eq!(cell(CellType::Number, "-0").key_part(), cell(CellType::Number, "0").key_part());
        assert_eq!(cell(CellType::NumberDate1900, "45000").key_part(), cell(CellType::Number, "45000").key_part());
        assert_ne!(cell(CellType::String, "1").key_part(), cell(CellType::Number, "1").key_part());
        assert_ne!(cell(CellType::String, "a").key_part(), cell(CellType::String, "A").key_part());
    }

    #[test]
    fn booleans_and_empties() {
        assert_eq!(cell(CellType::Boolean, "1").key_part(), KeyPart::Boolean(true));
        assert_eq!(cell(CellType::Boolean, "0").key_part(), KeyPart::Boolean(false));
        assert_eq!(Cell::empty(4, 2).key_part(), KeyPart::Empty);
    }

    #[test]
    fn copy_keeps_style_only_for_dates() {
        let date = cell(CellType::NumberDate1900, "45000").copy_to(7, 1);
        assert_eq!((date.row, date.col, date.style), (7, 1, Some(3)));
        let number = cell(CellType::Number, "40").copy_to(7, 2);
        assert_eq!((number.value.as_str(), number.style), ("40", None));
    }

    #[test]
    fn display_values() {
        assert_eq!(cell(CellType::NumberDate1900, "45000").to_string(), "2023-03-15");
        assert_eq!(cell(CellType::NumberDateTime1900, "45000.5").to_string(), "2023-03-15 12:00:00");
        assert_eq!(cell(CellType::NumberTime1900, "0.25").to_string(), "06:00:00");
        assert_eq!(cell(CellType::Boolean, "1").to_string(), "TRUE");
        assert_eq!(cell(CellType::NumberDate1900, "oops").to_string(), "oops");
        assert_eq!(Cell::empty(0, 0).to_string(), "<empty>");
    }

    #[test]
    fn display_1904_dates() {
        assert_eq!(cell(CellType::NumberDate1904, "0").to_string(), "1904-01-01");
        assert_eq!(cell(CellType::NumberDateTime1904, "43538.75").to_string(), "2023-03-15 18:00:00");
        assert_eq!(cell(CellType::NumberTime1904, "0.5").to_string(), "12:00:00");
    }

    #[test]
    fn display_dates_out_of_calendar() {
        assert_eq!(cell(CellType::NumberDate1900, "100000000").to_string(), "100000000");
        assert_eq!(cell(CellType::NumberDateTime1904, "1e300").to_string(), "1e300");
        assert_eq!(cell(CellType::NumberDate1900, "-1e20").to_string(), "-1e20");
        assert_eq!(describe_key(&[&cell(CellType::NumberDate1900, "100000000")]), "(100000000)");
    }

    #[test]
    fn describe_key_values() {
        let id = cell(CellType::Number, "2");
        let name = cell(CellType::String, "Bob");
        assert_eq!(describe_key(&[&id, &name]), "(2, \"Bob\")");
    }
}
