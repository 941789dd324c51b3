use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the layer engine and its adapters.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog format error: {message}")]
    CatalogFormat { message: String },

    #[error("Sheet '{sheet}' has {columns} column(s), need at least technique ID and source")]
    SheetStructure { sheet: String, columns: usize },

    #[error("No input sheets: {message}")]
    EmptyInput { message: String },

    #[error("Invalid color '{value}': {reason}")]
    InvalidColor { value: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Malformed workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("Fetching {url} failed: {message}")]
    Fetch { url: String, message: String },
}

pub type Result<T> = std::result::Result<T, NavError>;

impl NavError {
    pub fn catalog_format<S: Into<String>>(message: S) -> Self {
        Self::CatalogFormat { message: message.into() }
    }

    pub fn sheet_structure<S: Into<String>>(sheet: S, columns: usize) -> Self {
        Self::SheetStructure { sheet: sheet.into(), columns }
    }

    pub fn empty_input<S: Into<String>>(message: S) -> Self {
        Self::EmptyInput { message: message.into() }
    }

    pub fn invalid_color<S1: Into<String>, S2: Into<String>>(value: S1, reason: S2) -> Self {
        Self::InvalidColor { value: value.into(), reason: reason.into() }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn workbook<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Workbook { path: path.into(), message: message.into() }
    }

    pub fn fetch<S1: Into<String>, S2: Into<String>>(url: S1, message: S2) -> Self {
        Self::Fetch { url: url.into(), message: message.into() }
    }

    /// Returns true if the run can continue after skipping the offending input
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SheetStructure { .. })
    }

    /// The warning to report when a recoverable error is skipped
    pub fn as_warning(&self) -> Option<Warning> {
        match self {
            Self::SheetStructure { sheet, columns } => {
                Some(Warning::SheetStructure { sheet: sheet.clone(), columns: *columns })
            }
            _ => None,
        }
    }
}

/// Data-level problems that are recovered locally and reported alongside results.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error("skipped sheet '{sheet}': {columns} column(s), need technique ID and source columns")]
    SheetStructure { sheet: String, columns: usize },

    #[error("sheet '{sheet}' row {row}: no source for technique '{technique}', row skipped")]
    MissingSource { sheet: String, row: usize, technique: String },

    #[error("sheet '{sheet}' row {row}: empty technique ID, row skipped")]
    MissingTechnique { sheet: String, row: usize },

    #[error("no techniques observed in any sheet")]
    NoTechniquesObserved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sheet_structure_is_recoverable() {
        assert!(NavError::sheet_structure("APT1", 1).is_recoverable());
        assert!(!NavError::catalog_format("missing techniques").is_recoverable());
        assert!(!NavError::empty_input("no sheets").is_recoverable());
    }

    #[test]
    fn test_sheet_structure_becomes_warning() {
        let err = NavError::sheet_structure("APT1", 1);
        assert_eq!(
            err.as_warning(),
            Some(Warning::SheetStructure { sheet: "APT1".to_string(), columns: 1 })
        );
        assert!(NavError::configuration("bad").as_warning().is_none());
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Warning::NoTechniquesObserved).unwrap();
        assert_eq!(json, r#"{"kind":"no_techniques_observed"}"#);
    }
}
