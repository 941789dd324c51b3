//! In-memory tabular input: sheets of string cells.
//!
//! Workbooks are values. Every transformation here (`clean`,
//! `with_sheet_first`) returns a new workbook instead of editing one in place.

use crate::catalog::TechniqueId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A cell value; `None` for blank or missing cells.
pub type Cell = Option<String>;

/// Header text of the technique ID column
pub const TECHNIQUE_ID_HEADER: &str = "Technique ID";
/// Header text of the source column
pub const SOURCE_HEADER: &str = "Source";

/// Column positions of the two columns the engine reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub technique: usize,
    pub source: usize,
    /// Whether row 0 is a header row
    pub has_header: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new<S: Into<String>>(name: S, rows: Vec<Vec<Cell>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Build a sheet from string rows; blank strings become missing cells.
    pub fn from_strings<S, R, C>(name: S, rows: R) -> Self
    where
        S: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| cell(c.as_ref())).collect())
            .collect();
        Self::new(name, rows)
    }

    /// Width of the widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text, trimmed; `None` if missing or blank
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True when the first row is a literal header (`Technique ID` in column 0)
    pub fn has_header(&self) -> bool {
        self.value(0, 0)
            .is_some_and(|v| v.eq_ignore_ascii_case(TECHNIQUE_ID_HEADER))
    }

    /// Resolve which columns hold technique IDs and sources.
    ///
    /// Without a header the layout is fixed at columns 0 and 1. A header row
    /// that names a `Source` column moves the source column there, which is
    /// the shape of an annotated sheet.
    pub fn layout(&self) -> ColumnLayout {
        let has_header = self.has_header();
        let source = if has_header {
            self.rows[0]
                .iter()
                .position(|c| {
                    c.as_deref()
                        .is_some_and(|v| v.trim().eq_ignore_ascii_case(SOURCE_HEADER))
                })
                .unwrap_or(1)
        } else {
            1
        };
        ColumnLayout { technique: 0, source, has_header }
    }

    /// Data rows with their original row numbers, header excluded
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Vec<Cell>)> {
        let skip = usize::from(self.has_header());
        self.rows.iter().enumerate().skip(skip)
    }
}

/// Wrap a string as a cell, treating blank text as missing
pub fn cell(value: &str) -> Cell {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// New workbook with `sheet` pinned first, replacing any sheet of the same name.
    pub fn with_sheet_first(&self, sheet: Sheet) -> Self {
        let rest: Vec<Sheet> = self.sheets.iter().filter(|s| s.name != sheet.name).cloned().collect();
        let mut sheets = Vec::with_capacity(rest.len() + 1);
        sheets.push(sheet);
        sheets.extend(rest);
        Self { sheets }
    }
}

/// Consolidation pass: one row per technique ID per sheet.
///
/// All source values recorded for the same (case-folded) technique ID are
/// joined with `", "`, each distinct value kept once, in first-appearance
/// order. Sheets too narrow to hold a source column pass through untouched so
/// the index builder can report them.
pub fn clean(workbook: &Workbook) -> Workbook {
    Workbook {
        sheets: workbook.sheets.iter().map(clean_sheet).collect(),
    }
}

fn clean_sheet(sheet: &Sheet) -> Sheet {
    if sheet.column_count() < 2 {
        return sheet.clone();
    }

    let layout = sheet.layout();
    let mut groups: Vec<(TechniqueId, String, Vec<String>)> = Vec::new();
    let mut blank_rows = Vec::new();

    for (row_idx, row) in sheet.data_rows() {
        let raw_id = sheet.value(row_idx, layout.technique);
        let Some(id) = raw_id.and_then(TechniqueId::normalize) else {
            // Kept so the index builder can warn about it
            blank_rows.push(row.clone());
            continue;
        };
        let source = sheet.value(row_idx, layout.source).map(str::to_string);

        match groups.iter_mut().find(|(g, _, _)| *g == id) {
            Some((_, _, sources)) => {
                if let Some(source) = source {
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
            }
            None => {
                let label = raw_id.unwrap_or_default().to_string();
                groups.push((id, label, source.into_iter().collect()));
            }
        }
    }

    let before = sheet.rows.len();
    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(groups.len() + 1);
    if layout.has_header {
        rows.push(vec![
            Some(TECHNIQUE_ID_HEADER.to_string()),
            Some(SOURCE_HEADER.to_string()),
        ]);
    }
    rows.extend(groups.into_iter().map(|(_, label, sources)| {
        let joined = if sources.is_empty() { None } else { Some(sources.join(", ")) };
        vec![Some(label), joined]
    }));
    rows.extend(blank_rows);

    debug!(
        "Consolidated sheet '{}': {} rows -> {} rows",
        sheet.name,
        before,
        rows.len()
    );

    Sheet::new(sheet.name.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_count_uses_widest_row() {
        let sheet = Sheet::from_strings("s", vec![vec!["T1059"], vec!["T1059", "a", "b"]]);
        assert_eq!(sheet.column_count(), 3);
        assert_eq!(Sheet::new("empty", vec![]).column_count(), 0);
    }

    #[test]
    fn test_blank_strings_become_missing() {
        let sheet = Sheet::from_strings("s", vec![vec!["T1059", "   "]]);
        assert_eq!(sheet.rows[0][1], None);
        assert_eq!(sheet.value(0, 1), None);
        assert_eq!(sheet.value(5, 5), None);
    }

    #[test]
    fn test_header_detection_and_layout() {
        let plain = Sheet::from_strings("s", vec![vec!["T1059", "r1"]]);
        assert!(!plain.has_header());
        assert_eq!(plain.layout(), ColumnLayout { technique: 0, source: 1, has_header: false });

        let annotated = Sheet::from_strings(
            "s",
            vec![
                vec!["technique id", "Techniques", "Tactics", "Source"],
                vec!["T1059", "Command and Scripting Interpreter", "Execution", "r1"],
            ],
        );
        assert!(annotated.has_header());
        assert_eq!(annotated.layout().source, 3);
        assert_eq!(annotated.data_rows().count(), 1);
    }

    #[test]
    fn test_with_sheet_first_pins_and_replaces() {
        let wb = Workbook::new(vec![
            Sheet::from_strings("A", vec![vec!["T1", "x"]]),
            Sheet::from_strings("Summary", vec![vec!["old"]]),
            Sheet::from_strings("B", vec![vec!["T2", "y"]]),
        ]);
        let out = wb.with_sheet_first(Sheet::from_strings("Summary", vec![vec!["new"]]));
        assert_eq!(out.sheet_names(), vec!["Summary", "A", "B"]);
        assert_eq!(out.sheet("Summary").unwrap().value(0, 0), Some("new"));
        // input untouched
        assert_eq!(wb.sheet_names(), vec!["A", "Summary", "B"]);
    }

    #[test]
    fn test_clean_merges_sources_per_technique() {
        let wb = Workbook::new(vec![Sheet::from_strings(
            "APT29",
            vec![
                vec!["T1059", "report1"],
                vec!["T1566", "phish"],
                vec!["t1059", "report2"],
                vec!["T1059", "report1"],
            ],
        )]);
        let cleaned = clean(&wb);
        let sheet = &cleaned.sheets[0];
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.value(0, 0), Some("T1059"));
        assert_eq!(sheet.value(0, 1), Some("report1, report2"));
        assert_eq!(sheet.value(1, 0), Some("T1566"));
        assert_eq!(sheet.value(1, 1), Some("phish"));
    }

    #[test]
    fn test_clean_keeps_header_and_narrow_sheets() {
        let wb = Workbook::new(vec![
            Sheet::from_strings(
                "A",
                vec![vec!["Technique ID", "Source"], vec!["T1", "x"], vec!["T1", "y"]],
            ),
            Sheet::from_strings("narrow", vec![vec!["T1"]]),
        ]);
        let cleaned = clean(&wb);
        assert_eq!(cleaned.sheets[0].rows.len(), 2);
        assert!(cleaned.sheets[0].has_header());
        assert_eq!(cleaned.sheets[0].value(1, 1), Some("x, y"));
        assert_eq!(cleaned.sheets[1], wb.sheets[1]);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let wb = Workbook::new(vec![Sheet::from_strings(
            "A",
            vec![vec!["T1", "x"], vec!["T1", "y"], vec!["T2", "z"]],
        )]);
        let once = clean(&wb);
        assert_eq!(clean(&once), once);
    }
}
