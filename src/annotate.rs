//! Technique name and tactic enrichment of tabular rows.

use crate::catalog::{Catalog, TechniqueId};
use crate::workbook::{Cell, Sheet, SOURCE_HEADER, TECHNIQUE_ID_HEADER};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Value written when a technique is unknown to the lookup table or catalog
pub const OUTDATED_SENTINEL: &str = "TTP Outdated In MITRE";

/// Technique code -> display name, keyed by upper-cased code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameLookup {
    names: HashMap<String, String>,
}

impl NameLookup {
    /// Parse `KEY: value` lines. Lines that don't split into exactly two parts are skipped.
    pub fn parse(text: &str) -> Self {
        let mut names = HashMap::new();
        let mut skipped = 0usize;
        for line in text.lines() {
            let parts: Vec<&str> = line.trim().split(':').collect();
            if let [key, value] = parts.as_slice() {
                names.insert(key.trim().to_uppercase(), value.trim().to_string());
            } else {
                skipped += 1;
            }
        }
        debug!("Parsed {} technique names ({} lines skipped)", names.len(), skipped);
        Self { names }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Case-insensitive lookup
    pub fn get(&self, raw_id: &str) -> Option<&str> {
        self.names.get(&raw_id.trim().to_uppercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row with its derived name and tactic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedRow {
    pub technique_id: String,
    pub technique_name: String,
    pub tactic_label: String,
    /// Remaining cells of the row, in order
    pub rest: Vec<Cell>,
}

/// Annotates rows from a name table and the catalog; misses resolve to a sentinel.
#[derive(Debug, Clone)]
pub struct TacticAnnotator<'a> {
    names: &'a NameLookup,
    catalog: &'a Catalog,
    sentinel: String,
}

impl<'a> TacticAnnotator<'a> {
    pub fn new(names: &'a NameLookup, catalog: &'a Catalog) -> Self {
        Self {
            names,
            catalog,
            sentinel: OUTDATED_SENTINEL.to_string(),
        }
    }

    pub fn with_sentinel<S: Into<String>>(mut self, sentinel: S) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn technique_name(&self, raw_id: &str) -> String {
        self.names
            .get(raw_id)
            .map(str::to_string)
            .unwrap_or_else(|| self.sentinel.clone())
    }

    pub fn tactic_label(&self, raw_id: &str) -> String {
        self.catalog
            .lookup_tactic(raw_id)
            .unwrap_or_else(|| self.sentinel.clone())
    }

    /// Annotate rows whose first cell is a technique ID. Rows without one are dropped.
    pub fn annotate(&self, rows: &[Vec<Cell>]) -> Vec<AnnotatedRow> {
        rows.iter()
            .filter_map(|row| {
                let raw = row.first()?.as_deref()?.trim();
                TechniqueId::normalize(raw)?;
                Some(AnnotatedRow {
                    technique_id: raw.to_string(),
                    technique_name: self.technique_name(raw),
                    tactic_label: self.tactic_label(raw),
                    rest: row.iter().skip(1).cloned().collect(),
                })
            })
            .collect()
    }

    /// New sheet with `Techniques` and `Tactics` columns after the technique ID column.
    ///
    /// A sheet without a header row gets `Technique ID, Source` first.
    pub fn annotate_sheet(&self, sheet: &Sheet) -> Sheet {
        let header: Vec<Cell> = if sheet.has_header() {
            sheet.rows[0].clone()
        } else {
            vec![
                Some(TECHNIQUE_ID_HEADER.to_string()),
                Some(SOURCE_HEADER.to_string()),
            ]
        };

        let mut rows = Vec::with_capacity(sheet.rows.len() + 1);
        rows.push(insert_pair(&header, Some("Techniques".to_string()), Some("Tactics".to_string())));

        for (_, row) in sheet.data_rows() {
            let annotated = match row.first().and_then(|c| c.as_deref()) {
                Some(raw) if TechniqueId::normalize(raw).is_some() => insert_pair(
                    row,
                    Some(self.technique_name(raw)),
                    Some(self.tactic_label(raw)),
                ),
                _ => insert_pair(row, None, None),
            };
            rows.push(annotated);
        }

        Sheet::new(sheet.name.clone(), rows)
    }
}

fn insert_pair(row: &[Cell], name: Cell, tactic: Cell) -> Vec<Cell> {
    let mut out = Vec::with_capacity(row.len() + 2);
    out.push(row.first().cloned().flatten());
    out.push(name);
    out.push(tactic);
    out.extend(row.iter().skip(1).cloned());
    out
}
