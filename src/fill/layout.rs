//! Alignment of the key and target columns with the source columns.
use crate::fill::FillError;
use crate::spreadsheet::SheetRange;
use std::collections::BTreeSet;

/// Positions of the key and target columns inside the source region.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    /// Source column of each key column, in key header order
    pub(crate) key_in_source: Vec<usize>,
    /// Source column of each target column, in target header order
    pub(crate) target_in_source: Vec<usize>,
}

impl Layout {
    /// Matches key and target columns to source columns by name.
    ///
    /// Every key and target column must appear exactly once in the source header,
    /// and key columns must not repeat. Other source columns may share a name.
    pub(crate) fn new(source: &[String], key: &[String], target: &[String]) -> Result<Layout, FillError> {
        let missing: BTreeSet<&String> = key
            .iter()
            .chain(target)
            .filter(|name| !source.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(FillError::MissingColumnsError(names(missing)));
        }

        let repeated: BTreeSet<&String> = key
            .iter()
            .filter(|name| key.iter().filter(|other| other == name).count() > 1)
            .collect();
        if !repeated.is_empty() {
            return Err(FillError::DuplicateKeyColumnsError(names(repeated)));
        }

        let ambiguous: BTreeSet<&String> = key
            .iter()
            .chain(target)
            .filter(|name| source.iter().filter(|other| other == name).count() > 1)
            .collect();
        if !ambiguous.is_empty() {
            return Err(FillError::DuplicateSourceColumnsError(names(ambiguous)));
        }

        let position = |name: &String| source.iter().position(|other| other == name).unwrap_or_default();
        Ok(Layout {
            key_in_source: key.iter().map(position).collect(),
            target_in_source: target.iter().map(position).collect(),
        })
    }
}

fn names(names: BTreeSet<&String>) -> Vec<String> {
    names.into_iter().cloned().collect()
}

/// Checks the regions against each other before any cell is read.
pub(crate) fn check_regions(source: &SheetRange, key: &SheetRange, target: &SheetRange) -> Result<(), FillError> {
    if key.range.height() != target.range.height() {
        return Err(FillError::RowCountMismatchError(key.range.height(), target.range.height()));
    }
    if target.overlaps(key) {
        return Err(FillError::KeyTargetOverlapError(key.to_string(), target.to_string()));
    }
    if target.overlaps(source) {
        return Err(FillError::SourceTargetOverlapError(source.to_string(), target.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn range(value: &str) -> SheetRange {
        SheetRange::try_from(value).unwrap()
    }

    #[test]
    fn columns_align_by_name() {
        let layout = Layout::new(
            &header(&["ID", "Name", "Age", "City"]),
            &header(&["City", "ID"]),
            &header(&["Age", "Name"]),
        ).unwrap();
        assert_eq!(layout.key_in_source, vec![3, 0]);
        assert_eq!(layout.target_in_source, vec![2, 1]);
    }

    #[test]
    fn missing_columns() {
        let result = Layout::new(&header(&["ID", "Name"]), &header(&["ID", "Zip"]), &header(&["Age"]));
        match result {
            Err(FillError::MissingColumnsError(names)) => assert_eq!(names, header(&["Age", "Zip"])),
            other => panic!("unexpected layout: {other:?}"),
        }
    }

    #[test]
    fn duplicate_columns() {
        let result = Layout::new(&header(&["ID", "Name"]), &header(&["ID", "ID"]), &header(&["Name"]));
        assert!(matches!(result, Err(FillError::DuplicateKeyColumnsError(names)) if names == header(&["ID"])));

        let result = Layout::new(&header(&["ID", "Name", "Name"]), &header(&["ID"]), &header(&["Name"]));
        assert!(matches!(result, Err(FillError::DuplicateSourceColumnsError(names)) if names == header(&["Name"])));

        // Repeated source columns nobody asks for are fine
        let layout = Layout::new(&header(&["ID", "Note", "Name", "Note"]), &header(&["ID"]), &header(&["Name"])).unwrap();
        assert_eq!(layout.target_in_source, vec![2]);
    }

    #[test]
    fn region_checks() {
        assert!(check_regions(&range("Data!A1:C10"), &range("Keys!A1:A4"), &range("Keys!B1:C4")).is_ok());
        assert!(check_regions(&range("Data!A1:C10"), &range("Data!A12:A15"), &range("Data!D1:E4")).is_ok());

        let result = check_regions(&range("Data!A1:C10"), &range("Keys!A1:A4"), &range("Keys!B1:C5"));
        assert!(matches!(result, Err(FillError::RowCountMismatchError(4, 5))));

        let result = check_regions(&range("Data!A1:C10"), &range("Keys!A1:B4"), &range("keys!B1:C4"));
        assert!(matches!(result, Err(FillError::KeyTargetOverlapError(_, _))));

        let result = check_regions(&range("Data!A1:C10"), &range("Keys!A1:A4"), &range("Data!C7:D10"));
        assert!(matches!(result, Err(FillError::SourceTargetOverlapError(_, _))));
    }
}
