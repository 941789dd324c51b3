//! Engine configuration.
//!
//! Everything has a default, so a config file is optional. When one is given
//! (`--config navlayer.yaml`) it is YAML, missing keys keep their defaults and
//! unknown keys are rejected.

use crate::annotate::OUTDATED_SENTINEL;
use crate::error::{NavError, Result};
use crate::gradient::{HexColor, DEFAULT_END_COLOR, DEFAULT_START_COLOR};
use crate::layer::CommentScope;
use crate::source_index::CountingPolicy;
use crate::summary::SUMMARY_SHEET_NAME;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CATALOG_URL: &str = "https://gist.githubusercontent.com/th3hack3rwiz/a06b5d9096fd6ca1698033a0007c5902/raw/05ff8073d6b09226cbd2a5c7036cf494ae12cea1/gistfile1.txt";
pub const DEFAULT_NAMES_URL: &str = "https://gist.githubusercontent.com/th3hack3rwiz/1a03059bedbad5a3106ea10a1a2233b1/raw/e84e2c5c2cbdaa19518a7a22381af11d6d753924/gistfile1.txt";

/// File name the catalog is saved under
pub const CATALOG_FILE_NAME: &str = "layer.json";
/// File name the name index is saved under
pub const NAMES_FILE_NAME: &str = "TTP code-name index.txt";
pub const DEFAULT_CLUBBED_FILE_NAME: &str = "Heatmap.json";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradientConfig {
    pub start: HexColor,
    pub end: HexColor,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self { start: DEFAULT_START_COLOR, end: DEFAULT_END_COLOR }
    }
}

/// Counting policy used to build the index for each output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountingConfig {
    pub per_sheet: CountingPolicy,
    pub clubbed: CountingPolicy,
    pub summary: CountingPolicy,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            per_sheet: CountingPolicy::Consolidated,
            clubbed: CountingPolicy::Raw,
            summary: CountingPolicy::Consolidated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReferenceConfig {
    pub catalog_url: String,
    pub names_url: String,
    pub timeout_secs: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            names_url: DEFAULT_NAMES_URL.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

impl ReferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub gradient: GradientConfig,
    pub counting: CountingConfig,
    pub per_sheet_comments: CommentScope,
    /// Written in place of unknown technique names and tactics
    pub sentinel: String,
    pub summary_sheet: String,
    pub clubbed_file: String,
    pub reference: ReferenceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gradient: GradientConfig::default(),
            counting: CountingConfig::default(),
            per_sheet_comments: CommentScope::default(),
            sentinel: OUTDATED_SENTINEL.to_string(),
            summary_sheet: SUMMARY_SHEET_NAME.to_string(),
            clubbed_file: DEFAULT_CLUBBED_FILE_NAME.to_string(),
            reference: ReferenceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| NavError::configuration(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|e| {
                    NavError::configuration(format!("cannot read {}: {}", path.display(), e))
                })?;
                let config = Self::from_yaml(&yaml)?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sentinel.trim().is_empty() {
            return Err(NavError::configuration("sentinel must not be empty"));
        }
        validation::validate_filename(&self.summary_sheet)?;
        validation::validate_filename(&self.clubbed_file)?;
        if self.reference.timeout_secs == 0 {
            return Err(NavError::configuration("reference.timeout_secs must be greater than 0"));
        }
        for url in [&self.reference.catalog_url, &self.reference.names_url] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(NavError::configuration(format!("not an http(s) URL: {}", url)));
            }
        }
        Ok(())
    }
}

/// File name checks for output artifacts named after user data
pub mod validation {
    use crate::error::{NavError, Result};

    const DANGEROUS_CHARS: [char; 10] = ['<', '>', ':', '"', '|', '?', '*', '\0', '/', '\\'];

    const RESERVED_NAMES: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8", "COM9", "LPT1",
        "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    pub fn validate_filename(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(NavError::configuration("empty file name"));
        }

        if name.len() > 255 {
            return Err(NavError::configuration(format!("file name too long (> 255 bytes): {}", name)));
        }

        if let Some(ch) = name.chars().find(|c| DANGEROUS_CHARS.contains(c)) {
            return Err(NavError::configuration(format!(
                "file name '{}' contains forbidden character {:?}",
                name, ch
            )));
        }

        if is_reserved(name) {
            return Err(NavError::configuration(format!("reserved file name: {}", name)));
        }

        Ok(())
    }

    fn is_reserved(name: &str) -> bool {
        let upper = name.to_uppercase();
        RESERVED_NAMES
            .iter()
            .any(|r| upper == *r || upper.starts_with(&format!("{}.", r)))
    }

    /// File name for a sheet's layer: forbidden characters become `_`.
    pub fn sheet_file_name(sheet: &str, extension: &str) -> String {
        let mut stem: String = sheet
            .trim()
            .chars()
            .map(|c| if DANGEROUS_CHARS.contains(&c) || c.is_control() { '_' } else { c })
            .collect();
        if stem.is_empty() || stem.chars().all(|c| c == '.') {
            stem = "sheet".to_string();
        }
        if is_reserved(&stem) {
            stem.insert(0, '_');
        }
        // leave room for the extension
        let max = 255 - extension.len() - 1;
        if stem.len() > max {
            let mut cut = max;
            while !stem.is_char_boundary(cut) {
                cut -= 1;
            }
            stem.truncate(cut);
        }
        format!("{}.{}", stem, extension)
    }
}
