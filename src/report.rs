use crate::error::Warning;
use crate::fetch::FetchedReference;
use crate::summary::SummaryRow;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Layer,
    Workbook,
    Catalog,
    Names,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Layer => "layer",
            ArtifactKind::Workbook => "workbook",
            ArtifactKind::Catalog => "catalog",
            ArtifactKind::Names => "names",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    /// Sheet the artifact was built from, for per-sheet layers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

/// What a command read, wrote and complained about.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    pub sheets: Vec<String>,
    pub artifacts: Vec<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<SummaryRow>>,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_input<P: Into<PathBuf>>(mut self, input: P, sheets: Vec<String>) -> Self {
        self.input = Some(input.into());
        self.sheets = sheets;
        self
    }

    pub fn add_artifact(&mut self, kind: ArtifactKind, path: PathBuf) {
        self.artifacts.push(Artifact { kind, path, sheet: None });
    }

    pub fn add_sheet_layer(&mut self, sheet: String, path: PathBuf) {
        self.artifacts.push(Artifact {
            kind: ArtifactKind::Layer,
            path,
            sheet: Some(sheet),
        });
    }

    pub fn add_fetched(&mut self, fetched: &FetchedReference) {
        self.add_artifact(ArtifactKind::Catalog, fetched.catalog_path.clone());
        self.add_artifact(ArtifactKind::Names, fetched.names_path.clone());
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for warning in warnings {
            if !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn layers_written(&self) -> usize {
        self.artifacts.iter().filter(|a| a.kind == ArtifactKind::Layer).count()
    }
}
