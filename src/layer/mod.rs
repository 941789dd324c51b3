//! Layer synthesis: scoring catalog techniques from a source index.
//!
//! One synthesizer serves every output mode:
//! - **per-sheet**: one layer per input sheet, presence scoring (score 1)
//! - **clubbed**: one layer for all sheets, score = aggregate frequency
//! - **summary-only**: no layer, a ranked summary table instead
//!
//! Every layer produced in a run shares a gradient computed from the highest
//! frequency among catalog-matched techniques, so colors compare across files.


use crate::catalog::{Catalog, TechniqueRecord};
use crate::error::Result;
use crate::gradient::{GradientSpec, HexColor, DEFAULT_END_COLOR, DEFAULT_START_COLOR};
use crate::source_index::{IndexedSheet, SourceEntry, SourceIndex};
use crate::summary::{self, SummaryRow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Which citations a per-sheet layer's comments include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentScope {
    /// Citations from this sheet and every sheet before it
    #[default]
    Cumulative,
    /// Citations from this sheet only
    CurrentSheet,
}

impl CommentScope {
    fn includes(self, provenance_sheet: usize, current_sheet: usize) -> bool {
        match self {
            CommentScope::Cumulative => provenance_sheet <= current_sheet,
            CommentScope::CurrentSheet => provenance_sheet == current_sheet,
        }
    }
}

/// Output mode of a synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    PerSheet(CommentScope),
    Clubbed,
    SummaryOnly,
}

impl SynthesisMode {
    pub fn name(&self) -> &'static str {
        match self {
            SynthesisMode::PerSheet(_) => "per-sheet",
            SynthesisMode::Clubbed => "clubbed",
            SynthesisMode::SummaryOnly => "summary-only",
        }
    }
}

/// A Navigator layer: catalog metadata, scored techniques and a gradient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDocument {
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
    pub techniques: Vec<TechniqueRecord>,
    pub gradient: GradientSpec,
}

impl LayerDocument {
    /// JSON with 4-space indentation, the layout Navigator exports use
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn technique(&self, raw_id: &str) -> Option<&TechniqueRecord> {
        let id = crate::catalog::TechniqueId::normalize(raw_id)?;
        self.techniques.iter().find(|t| t.id == id)
    }
}

/// A per-sheet layer tagged with the sheet it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLayer {
    pub sheet: String,
    pub document: LayerDocument,
}

/// Result of a synthesis run, shaped by the mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    PerSheet(Vec<NamedLayer>),
    Clubbed(LayerDocument),
    Summary(Vec<SummaryRow>),
}

impl Synthesis {
    /// All layer documents, in output order
    pub fn layers(&self) -> Vec<&LayerDocument> {
        match self {
            Synthesis::PerSheet(layers) => layers.iter().map(|l| &l.document).collect(),
            Synthesis::Clubbed(doc) => vec![doc],
            Synthesis::Summary(_) => Vec::new(),
        }
    }
}

/// Merges a source index into copies of the catalog.
pub struct LayerSynthesizer<'a> {
    catalog: &'a Catalog,
    start: HexColor,
    end: HexColor,
}

impl<'a> LayerSynthesizer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            start: DEFAULT_START_COLOR,
            end: DEFAULT_END_COLOR,
        }
    }

    pub fn with_colors(mut self, start: HexColor, end: HexColor) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn synthesize(&self, index: &SourceIndex, mode: SynthesisMode) -> Synthesis {
        debug!("Synthesizing {} output from {} techniques", mode.name(), index.len());
        match mode {
            SynthesisMode::PerSheet(scope) => Synthesis::PerSheet(self.per_sheet(index, scope)),
            SynthesisMode::Clubbed => Synthesis::Clubbed(self.clubbed(index)),
            SynthesisMode::SummaryOnly => Synthesis::Summary(summary::build(index)),
        }
    }

    /// One layer covering every sheet, scored by aggregate frequency.
    pub fn clubbed(&self, index: &SourceIndex) -> LayerDocument {
        let gradient = self.gradient(index);
        let techniques = self
            .matched(index)
            .map(|(record, entry)| {
                let mut record = record.clone();
                record.score = Some(entry.frequency);
                record.comment = Some(entry.comment());
                record
            })
            .collect::<Vec<_>>();

        info!(
            "Clubbed layer: {} technique entries, max score {}",
            techniques.len(),
            gradient.max_value
        );
        self.document(techniques, gradient)
    }

    /// One layer per contributing sheet; presence scores 1.
    pub fn per_sheet(&self, index: &SourceIndex, scope: CommentScope) -> Vec<NamedLayer> {
        let gradient = self.gradient(index);
        index
            .sheets()
            .iter()
            .map(|sheet| {
                let document = self.document(self.sheet_records(index, sheet, scope), gradient.clone());
                info!(
                    "Layer for sheet '{}': {} technique entries",
                    sheet.name,
                    document.techniques.len()
                );
                NamedLayer { sheet: sheet.name.clone(), document }
            })
            .collect()
    }

    fn sheet_records(
        &self,
        index: &SourceIndex,
        sheet: &IndexedSheet,
        scope: CommentScope,
    ) -> Vec<TechniqueRecord> {
        self.matched(index)
            .filter(|(_, entry)| entry.seen_in(sheet.index))
            .map(|(record, entry)| {
                let mut record = record.clone();
                record.score = Some(1);
                record.comment =
                    Some(entry.comment_where(|p| scope.includes(p.sheet_index, sheet.index)));
                record
            })
            .collect()
    }

    /// Catalog records with an observation, paired with that observation
    fn matched<'s>(
        &'s self,
        index: &'s SourceIndex,
    ) -> impl Iterator<Item = (&'a TechniqueRecord, &'s SourceEntry)> + 's {
        let catalog: &'a Catalog = self.catalog;
        catalog
            .techniques()
            .iter()
            .filter_map(move |record| index.get(&record.id).map(|entry| (record, entry)))
    }

    /// Gradient over the highest frequency among catalog-matched techniques
    fn gradient(&self, index: &SourceIndex) -> GradientSpec {
        let max = self.matched(index).map(|(_, e)| e.frequency).max().unwrap_or(0);
        GradientSpec::for_max_frequency(self.start, self.end, max)
    }

    fn document(&self, techniques: Vec<TechniqueRecord>, gradient: GradientSpec) -> LayerDocument {
        LayerDocument {
            metadata: self.catalog.metadata().clone(),
            techniques,
            gradient,
        }
    }
}
