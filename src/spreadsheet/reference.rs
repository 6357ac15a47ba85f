//! Conversions between Excel-style references ("B7") and 0-based (row, col) indexes.

/// Largest 0-based row index an XLSX worksheet can address (row 1048576).
pub(crate) const MAX_ROW: usize = 1_048_575;

/// Largest 0-based column index an XLSX worksheet can address (column XFD).
pub(crate) const MAX_COL: usize = 16_383;

/// Converts column letters ("A", "AB", "xfd") to a 0-based column index.
/// Returns None for an empty string, non-letters or columns past XFD.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for character in letters.chars() {
        if !character.is_ascii_alphabetic() {
            return None;
        }
        let digit = (character.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COL + 1 {
            return None;
        }
    }
    Some(index - 1)
}

/// Converts a 1-based row number ("1", "42") to a 0-based row index.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    match digits.parse::<usize>() {
        Ok(row) if (1..=MAX_ROW + 1).contains(&row) => Some(row - 1),
        _ => None,
    }
}

/// Converts a cell reference ("C12", "$C$12") to a 0-based (row, col) pair.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|character: char| character.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// Converts a 0-based column index to column letters.
pub(crate) fn index_to_col(col: usize) -> String {
    let mut col = col + 1;
    let mut letters = Vec::<char>::new();
    while col > 0 {
        col -= 1;
        letters.push((b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    letters.iter().rev().collect()
}

/// Converts a 0-based (row, col) pair to a cell reference ("A1").
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}
