//! Reference technique catalog.
//!
//! The catalog is an ATT&CK Navigator layer listing every known technique
//! once per tactic it belongs to. It is loaded once per run and never mutated;
//! layer synthesis clones the records it needs.

use crate::error::{NavError, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Case-normalized technique identifier (e.g. "t1059.001").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TechniqueId(String);

impl TechniqueId {
    /// Trim and case-fold a raw cell value. Blank input yields `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-cased form, the key convention of the name-lookup table
    pub fn to_upper(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One technique entry of a layer document.
///
/// Fields the engine does not interpret (`color`, `enabled`, `metadata`,
/// `showSubtechniques`, ...) are carried verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechniqueRecord {
    #[serde(skip)]
    pub id: TechniqueId,
    /// Spelling used by the catalog, kept for Navigator compatibility
    #[serde(rename = "techniqueID")]
    pub technique_id: String,
    pub tactic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TechniqueRecord {
    fn from_value(index: usize, value: &Value) -> Result<Self> {
        let mut fields = match value {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(NavError::catalog_format(format!(
                    "techniques[{}] is not an object",
                    index
                )))
            }
        };

        let technique_id = take_string(&mut fields, "techniqueID", index)?;
        let tactic = take_string(&mut fields, "tactic", index)?;
        let id = TechniqueId::normalize(&technique_id).ok_or_else(|| {
            NavError::catalog_format(format!("techniques[{}].techniqueID is blank", index))
        })?;

        let score = fields
            .remove("score")
            .and_then(|s| s.as_u64())
            .and_then(|s| u32::try_from(s).ok());
        let comment = fields
            .remove("comment")
            .and_then(|c| c.as_str().map(str::to_string));

        Ok(Self {
            id,
            technique_id,
            tactic,
            score,
            comment,
            extra: fields,
        })
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str, index: usize) -> Result<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(NavError::catalog_format(format!(
            "techniques[{}].{} is not a string",
            index, key
        ))),
        None => Err(NavError::catalog_format(format!(
            "techniques[{}] is missing '{}'",
            index, key
        ))),
    }
}

/// Format a raw tactic shortname for display: "defense-evasion" -> "Defense Evasion"
pub fn format_tactic_label(tactic: &str) -> String {
    tactic
        .replace('-', " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

// Same rule as Python's str.capitalize: first char upper, rest lower
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Immutable index of known techniques.
#[derive(Debug, Clone)]
pub struct Catalog {
    metadata: Map<String, Value>,
    techniques: Vec<TechniqueRecord>,
    /// Position of the last entry for each technique
    last_entry: FxHashMap<TechniqueId, usize>,
}

impl Catalog {
    /// Parse a Navigator layer document used as the reference catalog.
    pub fn load(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| NavError::catalog_format(format!("not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::load(&raw)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut metadata = match value {
            Value::Object(map) => map,
            _ => return Err(NavError::catalog_format("top level is not an object")),
        };

        let entries = match metadata.remove("techniques") {
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(NavError::catalog_format("'techniques' is not an array")),
            None => return Err(NavError::catalog_format("missing 'techniques' array")),
        };

        // Always regenerated by the synthesizer
        metadata.remove("gradient");

        let techniques = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| TechniqueRecord::from_value(i, entry))
            .collect::<Result<Vec<_>>>()?;

        let mut last_entry = FxHashMap::default();
        for (pos, record) in techniques.iter().enumerate() {
            last_entry.insert(record.id.clone(), pos);
        }

        debug!(
            "Loaded catalog with {} technique entries ({} distinct)",
            techniques.len(),
            last_entry.len()
        );

        Ok(Self { metadata, techniques, last_entry })
    }

    /// Top-level layer fields passed through to every output document
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn techniques(&self) -> &[TechniqueRecord] {
        &self.techniques
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    pub fn contains(&self, id: &TechniqueId) -> bool {
        self.last_entry.contains_key(id)
    }

    /// Display label of the technique's tactic, matched case-insensitively.
    ///
    /// A technique listed under several tactics resolves to its last entry.
    pub fn lookup_tactic(&self, raw_id: &str) -> Option<String> {
        let id = TechniqueId::normalize(raw_id)?;
        let pos = *self.last_entry.get(&id)?;
        Some(format_tactic_label(&self.techniques[pos].tactic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"{
        "name": "layer",
        "domain": "enterprise-attack",
        "techniques": [
            {"techniqueID": "T1059", "tactic": "execution", "color": "", "score": 1, "enabled": true},
            {"techniqueID": "T1055", "tactic": "defense-evasion"},
            {"techniqueID": "T1055", "tactic": "privilege-escalation"}
        ],
        "gradient": {"colors": ["#ffffff"], "minValue": 0, "maxValue": 1}
    }"##;

    #[test]
    fn test_load_keeps_metadata_and_drops_gradient() {
        let catalog = Catalog::load(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.metadata()["name"], "layer");
        assert!(!catalog.metadata().contains_key("gradient"));
        assert!(!catalog.metadata().contains_key("techniques"));
    }

    #[test]
    fn test_record_fields_split_from_extra() {
        let catalog = Catalog::load(CATALOG).unwrap();
        let first = &catalog.techniques()[0];
        assert_eq!(first.id.as_str(), "t1059");
        assert_eq!(first.technique_id, "T1059");
        assert_eq!(first.score, Some(1));
        assert_eq!(first.extra["enabled"], true);
        assert!(!first.extra.contains_key("score"));
    }

    #[test]
    fn test_missing_techniques_is_format_error() {
        let err = Catalog::load(r#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, NavError::CatalogFormat { .. }));
    }

    #[test]
    fn test_missing_tactic_is_format_error() {
        let err = Catalog::load(r#"{"techniques": [{"techniqueID": "T1059"}]}"#).unwrap_err();
        assert!(err.to_string().contains("tactic"));
    }

    #[test]
    fn test_missing_technique_id_is_format_error() {
        let err = Catalog::load(r#"{"techniques": [{"tactic": "execution"}]}"#).unwrap_err();
        assert!(err.to_string().contains("techniqueID"));
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        assert!(matches!(
            Catalog::load("not json").unwrap_err(),
            NavError::CatalogFormat { .. }
        ));
    }

    #[test]
    fn test_lookup_tactic_case_insensitive() {
        let catalog = Catalog::load(CATALOG).unwrap();
        assert_eq!(catalog.lookup_tactic("t1059"), Some("Execution".to_string()));
        assert_eq!(catalog.lookup_tactic(" T1059 "), Some("Execution".to_string()));
        assert_eq!(catalog.lookup_tactic("T9999"), None);
    }

    #[test]
    fn test_lookup_tactic_last_entry_wins() {
        let catalog = Catalog::load(CATALOG).unwrap();
        assert_eq!(
            catalog.lookup_tactic("T1055"),
            Some("Privilege Escalation".to_string())
        );
    }

    #[test]
    fn test_index_follows_entries() {
        let catalog = Catalog::load(CATALOG).unwrap();
        assert!(catalog.contains(&TechniqueId::normalize("T1055").unwrap()));
        assert!(catalog.contains(&TechniqueId::normalize("t1059").unwrap()));
        assert!(!catalog.contains(&TechniqueId::normalize("T1059.001").unwrap()));

        // a third entry for the same technique takes over
        let catalog = Catalog::load(
            r#"{"techniques": [
                {"techniqueID": "T1055", "tactic": "defense-evasion"},
                {"techniqueID": "T1059", "tactic": "execution"},
                {"techniqueID": "t1055", "tactic": "privilege-escalation"},
                {"techniqueID": "T1055", "tactic": "persistence"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.lookup_tactic("T1055"), Some("Persistence".to_string()));
        assert_eq!(catalog.lookup_tactic("T1059"), Some("Execution".to_string()));
    }

    #[test]
    fn test_format_tactic_label() {
        assert_eq!(format_tactic_label("defense-evasion"), "Defense Evasion");
        assert_eq!(format_tactic_label("command-and-control"), "Command And Control");
        assert_eq!(format_tactic_label("EXECUTION"), "Execution");
        assert_eq!(format_tactic_label(""), "");
    }

    #[test]
    fn test_technique_id_normalize() {
        assert_eq!(TechniqueId::normalize(" T1059.001 ").unwrap().as_str(), "t1059.001");
        assert!(TechniqueId::normalize("   ").is_none());
        assert_eq!(TechniqueId::normalize("t1566").unwrap().to_upper(), "T1566");
    }
}
