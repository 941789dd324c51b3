//! Frequency and provenance index over tabular input.

use crate::catalog::TechniqueId;
use crate::error::{NavError, Warning};
use crate::workbook::{self, Sheet, Workbook};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What one unit of "frequency" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingPolicy {
    /// Every data row counts once
    #[default]
    Raw,
    /// Rows are consolidated per sheet first, so frequency = number of observing sheets
    Consolidated,
}

/// One "sheet: source" citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Position of the sheet among the indexed sheets
    pub sheet_index: usize,
    pub sheet: String,
    pub source: String,
}

impl Provenance {
    /// Comment line form: `"{sheet}: {source}"`
    pub fn citation(&self) -> String {
        format!("{}: {}", self.sheet, self.source)
    }
}

/// Aggregate observations of one technique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    pub id: TechniqueId,
    /// First raw spelling encountered, for display
    pub label: String,
    pub frequency: u32,
    pub provenance: Vec<Provenance>,
}

impl SourceEntry {
    /// Newline-joined citations, optionally limited to a range of sheets
    pub fn comment_where<F>(&self, keep: F) -> String
    where
        F: Fn(&Provenance) -> bool,
    {
        self.provenance
            .iter()
            .filter(|p| keep(p))
            .map(Provenance::citation)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn comment(&self) -> String {
        self.comment_where(|_| true)
    }

    /// Whether the technique was cited in the given sheet
    pub fn seen_in(&self, sheet_index: usize) -> bool {
        self.provenance.iter().any(|p| p.sheet_index == sheet_index)
    }
}

/// Name and position of a sheet that contributed to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedSheet {
    pub index: usize,
    pub name: String,
}

/// Technique ID -> frequency and ordered provenance.
///
/// Entries keep first-encountered order.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    entries: Vec<SourceEntry>,
    positions: FxHashMap<TechniqueId, usize>,
    sheets: Vec<IndexedSheet>,
    warnings: Vec<Warning>,
    policy: CountingPolicy,
}

impl SourceIndex {
    /// Count raw rows of every sheet.
    pub fn build(workbook: &Workbook) -> Self {
        Self::build_with(workbook, CountingPolicy::Raw)
    }

    /// Build under an explicit counting policy.
    pub fn build_with(workbook: &Workbook, policy: CountingPolicy) -> Self {
        let mut index = Self { policy, ..Self::default() };

        match policy {
            CountingPolicy::Raw => index.ingest(workbook),
            CountingPolicy::Consolidated => index.ingest(&workbook::clean(workbook)),
        }

        if index.entries.is_empty() {
            index.warnings.push(Warning::NoTechniquesObserved);
        }

        debug!(
            "Indexed {} techniques from {} sheets ({:?} counting, {} warnings)",
            index.entries.len(),
            index.sheets.len(),
            policy,
            index.warnings.len()
        );
        index
    }

    fn ingest(&mut self, workbook: &Workbook) {
        for sheet in &workbook.sheets {
            if let Err(err) = check_structure(sheet) {
                warn!("{}", err);
                if let Some(w) = err.as_warning() {
                    self.warnings.push(w);
                }
                continue;
            }
            let sheet_index = self.sheets.len();
            self.sheets.push(IndexedSheet { index: sheet_index, name: sheet.name.clone() });
            self.ingest_sheet(sheet_index, sheet);
        }
    }

    fn ingest_sheet(&mut self, sheet_index: usize, sheet: &Sheet) {
        let layout = sheet.layout();

        for (row_idx, _) in sheet.data_rows() {
            let raw_id = sheet.value(row_idx, layout.technique);
            let Some(id) = raw_id.and_then(TechniqueId::normalize) else {
                if sheet.rows[row_idx].iter().any(Option::is_some) {
                    self.warn(Warning::MissingTechnique { sheet: sheet.name.clone(), row: row_idx + 1 });
                }
                continue;
            };
            let Some(source) = sheet.value(row_idx, layout.source) else {
                self.warn(Warning::MissingSource {
                    sheet: sheet.name.clone(),
                    row: row_idx + 1,
                    technique: raw_id.unwrap_or_default().to_string(),
                });
                continue;
            };

            let provenance = Provenance {
                sheet_index,
                sheet: sheet.name.clone(),
                source: source.to_string(),
            };

            match self.positions.get(&id) {
                Some(&pos) => {
                    let entry = &mut self.entries[pos];
                    entry.frequency += 1;
                    entry.provenance.push(provenance);
                }
                None => {
                    self.positions.insert(id.clone(), self.entries.len());
                    self.entries.push(SourceEntry {
                        id,
                        label: raw_id.unwrap_or_default().to_string(),
                        frequency: 1,
                        provenance: vec![provenance],
                    });
                }
            }
        }
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn get(&self, id: &TechniqueId) -> Option<&SourceEntry> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, id: &TechniqueId) -> bool {
        self.positions.contains_key(id)
    }

    /// Entries in first-encountered order
    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    /// Sheets that contributed, in input order (structurally invalid sheets excluded)
    pub fn sheets(&self) -> &[IndexedSheet] {
        &self.sheets
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn policy(&self) -> CountingPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_frequency(&self) -> u32 {
        self.entries.iter().map(|e| e.frequency).max().unwrap_or(0)
    }
}

/// A sheet needs a technique ID column and a source column.
pub fn check_structure(sheet: &Sheet) -> Result<(), NavError> {
    let columns = sheet.column_count();
    if columns < 2 {
        return Err(NavError::sheet_structure(sheet.name.clone(), columns));
    }
    Ok(())
}
