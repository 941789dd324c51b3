//! End-to-end workflows over a workbook.
//!
//! A [`Pipeline`] binds configuration and reference data once and exposes the
//! individual stages (layers, summary, annotation) as well as [`Pipeline::run`],
//! which picks the outputs from the shape of the input:
//!
//! - a single sheet yields one presence layer per sheet,
//! - several sheets yield the clubbed heat-map layer and a summary sheet
//!   pinned first in the annotated workbook.
//!
//! The annotated workbook is written back from the cleaned input: one row per
//! technique per sheet, with sheets too narrow to carry a source dropped.

use crate::annotate::{NameLookup, TacticAnnotator};
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{NavError, Result, Warning};
use crate::layer::{LayerSynthesizer, Synthesis, SynthesisMode};
use crate::source_index::{check_structure, SourceIndex};
use crate::summary::{self, SummaryRow};
use crate::workbook::{clean, Workbook};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Layer output requested explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LayerMode {
    /// One layer per sheet, presence scoring
    PerSheet,
    /// One layer for the whole workbook, frequency scoring
    Clubbed,
    /// No layer, only the frequency-ranked summary
    SummaryOnly,
}

/// A stage result with the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Staged<T> {
    pub output: T,
    pub warnings: Vec<Warning>,
}

/// Everything produced by [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutput {
    /// Per-sheet layers for a single-sheet workbook, the clubbed layer otherwise
    pub layers: Synthesis,
    /// Present only for multi-sheet workbooks
    pub summary: Option<Vec<SummaryRow>>,
    /// Input sheets with name and tactic columns (summary sheet first, if any)
    pub annotated: Workbook,
    pub warnings: Vec<Warning>,
}

pub struct Pipeline<'a> {
    config: &'a EngineConfig,
    catalog: &'a Catalog,
    names: &'a NameLookup,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a EngineConfig, catalog: &'a Catalog, names: &'a NameLookup) -> Self {
        Self { config, catalog, names }
    }

    fn synthesizer(&self) -> LayerSynthesizer<'a> {
        LayerSynthesizer::new(self.catalog).with_colors(self.config.gradient.start, self.config.gradient.end)
    }

    fn annotator(&self) -> TacticAnnotator<'a> {
        TacticAnnotator::new(self.names, self.catalog).with_sentinel(self.config.sentinel.clone())
    }

    /// Build layers in the given mode, under that mode's counting policy.
    pub fn layers(&self, workbook: &Workbook, mode: LayerMode) -> Result<Staged<Synthesis>> {
        ensure_sheets(workbook)?;
        let (policy, synthesis_mode) = match mode {
            LayerMode::PerSheet => (
                self.config.counting.per_sheet,
                SynthesisMode::PerSheet(self.config.per_sheet_comments),
            ),
            LayerMode::Clubbed => (self.config.counting.clubbed, SynthesisMode::Clubbed),
            LayerMode::SummaryOnly => (self.config.counting.summary, SynthesisMode::SummaryOnly),
        };
        let index = SourceIndex::build_with(workbook, policy);
        Ok(Staged {
            output: self.synthesizer().synthesize(&index, synthesis_mode),
            warnings: index.warnings().to_vec(),
        })
    }

    /// Frequency-ranked summary table of the workbook.
    pub fn summary(&self, workbook: &Workbook) -> Result<Staged<Vec<SummaryRow>>> {
        summarize(self.config, workbook)
    }

    /// Annotate every sheet. Sheet order is kept.
    pub fn annotate(&self, workbook: &Workbook) -> Workbook {
        let annotator = self.annotator();
        Workbook::new(workbook.sheets.iter().map(|s| annotator.annotate_sheet(s)).collect())
    }

    pub fn run(&self, workbook: &Workbook) -> Result<WorkflowOutput> {
        ensure_sheets(workbook)?;
        info!("Processing workbook with {} sheets", workbook.len());

        let cleaned = write_back(workbook);

        if workbook.len() == 1 {
            let layers = self.layers(workbook, LayerMode::PerSheet)?;
            return Ok(WorkflowOutput {
                layers: layers.output,
                summary: None,
                annotated: self.annotate(&cleaned),
                warnings: layers.warnings,
            });
        }

        let layers = self.layers(workbook, LayerMode::Clubbed)?;
        let summary = self.summary(workbook)?;
        let summary_sheet = summary::to_sheet(self.config.summary_sheet.clone(), &summary.output);
        let annotated = self.annotate(&cleaned.with_sheet_first(summary_sheet));
        debug!("Annotated workbook order: {:?}", annotated.sheet_names());

        let mut warnings = layers.warnings;
        for warning in summary.warnings {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }

        Ok(WorkflowOutput {
            layers: layers.output,
            summary: Some(summary.output),
            annotated,
            warnings,
        })
    }
}

/// Frequency-ranked summary under the configured summary counting policy.
///
/// Needs no reference data, so the `summary` command calls it directly.
pub fn summarize(config: &EngineConfig, workbook: &Workbook) -> Result<Staged<Vec<SummaryRow>>> {
    ensure_sheets(workbook)?;
    let index = SourceIndex::build_with(workbook, config.counting.summary);
    Ok(Staged {
        output: summary::build(&index),
        warnings: index.warnings().to_vec(),
    })
}

/// Consolidated copy of the input with narrow sheets removed.
fn write_back(workbook: &Workbook) -> Workbook {
    let sheets = clean(workbook)
        .sheets
        .into_iter()
        .filter(|sheet| check_structure(sheet).is_ok())
        .collect();
    Workbook::new(sheets)
}

fn ensure_sheets(workbook: &Workbook) -> Result<()> {
    if workbook.is_empty() {
        return Err(NavError::empty_input("workbook has no sheets"));
    }
    Ok(())
}
