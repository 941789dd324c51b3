//! Frequency-ranked technique/actor summary.

use crate::source_index::SourceIndex;
use crate::workbook::{Cell, Sheet};
use serde::Serialize;

/// Default name of the summary sheet
pub const SUMMARY_SHEET_NAME: &str = "Summary";

/// Column headers of the summary table
pub const SUMMARY_HEADERS: [&str; 3] = ["Technique ID", "Score", "Actor name"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    /// Technique ID as first written in the input
    pub technique_id: String,
    pub frequency: u32,
    /// Sheet (actor) of every citation, most frequent actor first
    pub actor_names: Vec<String>,
}

impl SummaryRow {
    pub fn actors_joined(&self) -> String {
        self.actor_names.join(", ")
    }
}

/// Rank every indexed technique by descending frequency.
///
/// Ties keep first-encountered order (the sort is stable over index order).
pub fn build(index: &SourceIndex) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = index
        .entries()
        .iter()
        .map(|entry| SummaryRow {
            technique_id: entry.label.clone(),
            frequency: entry.frequency,
            actor_names: rank_actors(entry.provenance.iter().map(|p| p.sheet.as_str())),
        })
        .collect();

    rows.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    rows
}

// One name per citation, grouped and ordered by citation count, ties by first appearance
fn rank_actors<'a>(sheets: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for sheet in sheets {
        match counts.iter_mut().find(|(name, _)| *name == sheet) {
            Some((_, n)) => *n += 1,
            None => counts.push((sheet, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .flat_map(|(name, n)| std::iter::repeat(name.to_string()).take(n))
        .collect()
}

/// Render the summary as a sheet with a header row.
pub fn to_sheet<S: Into<String>>(name: S, rows: &[SummaryRow]) -> Sheet {
    let mut cells: Vec<Vec<Cell>> = Vec::with_capacity(rows.len() + 1);
    cells.push(SUMMARY_HEADERS.iter().map(|h| Some(h.to_string())).collect());
    cells.extend(rows.iter().map(|row| {
        vec![
            Some(row.technique_id.clone()),
            Some(row.frequency.to_string()),
            Some(row.actors_joined()),
        ]
    }));
    Sheet::new(name, cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_index::CountingPolicy;
    use crate::workbook::Workbook;

    fn workbook() -> Workbook {
        Workbook::new(vec![
            Sheet::from_strings(
                "APT1",
                vec![vec!["T1566", "a"], vec!["T1059", "b"], vec!["T1059", "c"]],
            ),
            Sheet::from_strings("APT2", vec![vec!["T1003", "d"], vec!["T1059", "e"]]),
            Sheet::from_strings("APT3", vec![vec!["T1003", "f"], vec!["T1566", "g"]]),
        ])
    }

    #[test]
    fn test_sorted_by_descending_frequency() {
        let rows = build(&SourceIndex::build(&workbook()));
        for pair in rows.windows(2) {
            assert!(pair[0].frequency >= pair[1].frequency);
        }
        assert_eq!(rows[0].technique_id, "T1059");
        assert_eq!(rows[0].frequency, 3);
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let rows = build(&SourceIndex::build(&workbook()));
        let ids: Vec<&str> = rows.iter().map(|r| r.technique_id.as_str()).collect();
        assert_eq!(ids, vec!["T1059", "T1566", "T1003"]);
    }

    #[test]
    fn test_raw_counting_repeats_actor() {
        let rows = build(&SourceIndex::build(&workbook()));
        assert_eq!(rows[0].actor_names, vec!["APT1", "APT1", "APT2"]);
        assert_eq!(rows[0].actors_joined(), "APT1, APT1, APT2");
    }

    #[test]
    fn test_consolidated_counting_lists_each_actor_once() {
        let index = SourceIndex::build_with(&workbook(), CountingPolicy::Consolidated);
        let rows = build(&index);
        let t1059 = rows.iter().find(|r| r.technique_id == "T1059").unwrap();
        assert_eq!(t1059.frequency, 2);
        assert_eq!(t1059.actor_names, vec!["APT1", "APT2"]);
    }

    #[test]
    fn test_rank_actors_orders_by_count() {
        let ranked = rank_actors(["B", "A", "A", "C"].into_iter());
        assert_eq!(ranked, vec!["A", "A", "B", "C"]);
    }

    #[test]
    fn test_to_sheet_has_header() {
        let rows = build(&SourceIndex::build(&workbook()));
        let sheet = to_sheet(SUMMARY_SHEET_NAME, &rows);
        assert_eq!(sheet.name, "Summary");
        assert_eq!(sheet.rows.len(), rows.len() + 1);
        assert_eq!(sheet.value(0, 0), Some("Technique ID"));
        assert_eq!(sheet.value(1, 1), Some("3"));
        assert!(sheet.has_header());
    }

    #[test]
    fn test_empty_index() {
        assert!(build(&SourceIndex::build(&Workbook::default())).is_empty());
    }
}
