//! Workbook and layer file I/O.
//!
//! Two workbook encodings are supported:
//! - a JSON file: `{"sheets": [{"name": "APT29", "rows": [["T1059", "report"]]}]}`
//! - a directory of tab-separated `<sheet>.tsv` files, ordered by an optional
//!   `sheets.txt` manifest (one sheet name per line) or else by file name
//!
//! The engine never touches the filesystem; these adapters do.

use crate::config::validation::sheet_file_name;
use crate::error::NavError;
use crate::layer::{LayerDocument, NamedLayer};
use crate::workbook::{cell, Cell, Sheet, Workbook};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Sheet order file inside a sheet directory
pub const MANIFEST_FILE: &str = "sheets.txt";
const SHEET_EXTENSION: &str = "tsv";

#[derive(Deserialize)]
struct RawWorkbook {
    sheets: Vec<RawSheet>,
}

#[derive(Deserialize)]
struct RawSheet {
    name: String,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

fn value_to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => None,
        Value::String(s) => cell(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Nested structures are not spreadsheet cells; keep their JSON text
        other => Some(other.to_string()),
    }
}

/// Parse a JSON workbook document.
pub fn parse_json_workbook(json: &str, origin: &Path) -> Result<Workbook> {
    let raw: RawWorkbook = serde_json::from_str(json)
        .map_err(|e| NavError::workbook(origin, e.to_string()))?;

    let sheets = raw
        .sheets
        .into_iter()
        .map(|s| Sheet::new(s.name, s.rows.iter().map(|r| r.iter().map(value_to_cell).collect()).collect()))
        .collect();
    Ok(Workbook::new(sheets))
}

/// Parse one tab-separated sheet. Trailing `\r` is dropped, blank lines are kept as empty rows.
pub fn parse_tsv_sheet(name: &str, text: &str) -> Sheet {
    let rows = text
        .lines()
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                Vec::new()
            } else {
                line.split('\t').map(cell).collect()
            }
        })
        .collect();
    Sheet::new(name, rows)
}

/// Read a workbook from a JSON file or a sheet directory.
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let workbook = if path.is_dir() {
        read_sheet_dir(path)?
    } else {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read workbook {}", path.display()))?;
        parse_json_workbook(&json, path)?
    };

    debug!(
        "Read workbook {} with {} sheets: {:?}",
        path.display(),
        workbook.len(),
        workbook.sheet_names()
    );
    Ok(workbook)
}

fn read_sheet_dir(dir: &Path) -> Result<Workbook> {
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == SHEET_EXTENSION))
        .collect();

    let manifest = dir.join(MANIFEST_FILE);
    let named = if manifest.is_file() {
        let order = fs::read_to_string(&manifest)
            .with_context(|| format!("Failed to read {}", manifest.display()))?;
        order_by_manifest(files, &order)
    } else {
        files.into_iter().map(|f| (file_stem(&f), f)).collect()
    };

    named
        .into_iter()
        .map(|(name, file)| {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read sheet {}", file.display()))?;
            Ok(parse_tsv_sheet(&name, &text))
        })
        .collect::<Result<Vec<_>>>()
        .map(Workbook::new)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// Manifest entries first, in manifest order and under their manifest names
// (file names may be sanitized); unlisted files after, by file name
fn order_by_manifest(files: Vec<PathBuf>, manifest: &str) -> Vec<(String, PathBuf)> {
    let mut ordered = Vec::with_capacity(files.len());
    let mut remaining = files;

    for name in manifest.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let expected = sheet_file_name(name, SHEET_EXTENSION);
        let found = remaining.iter().position(|p| {
            file_stem(p) == name || p.file_name().is_some_and(|f| f.to_string_lossy() == expected)
        });
        match found {
            Some(pos) => ordered.push((name.to_string(), remaining.remove(pos))),
            None => warn!("Sheet '{}' listed in {} but no file found", name, MANIFEST_FILE),
        }
    }
    ordered.extend(remaining.into_iter().map(|f| (file_stem(&f), f)));
    ordered
}

// Tabs and line breaks would split the cell; flatten them to spaces
fn cell_text(c: &Cell) -> String {
    c.as_deref()
        .unwrap_or("")
        .chars()
        .map(|ch| if matches!(ch, '\t' | '\n' | '\r') { ' ' } else { ch })
        .collect()
}

/// Serialize a workbook as JSON (2-space indentation).
pub fn workbook_to_json(workbook: &Workbook) -> Result<String> {
    let sheets: Vec<Value> = workbook
        .sheets
        .iter()
        .map(|s| {
            let rows: Vec<Vec<Value>> = s
                .rows
                .iter()
                .map(|r| r.iter().map(|c| c.clone().map_or(Value::Null, Value::String)).collect())
                .collect();
            serde_json::json!({ "name": s.name, "rows": rows })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&serde_json::json!({ "sheets": sheets }))?)
}

/// Write a workbook in the encoding implied by `path`: a `.json` file, otherwise a sheet directory.
pub fn write_workbook<P: AsRef<Path>>(path: P, workbook: &Workbook) -> Result<()> {
    let path = path.as_ref();
    if path.extension().is_some_and(|e| e == "json") {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, workbook_to_json(workbook)?)
            .with_context(|| format!("Failed to write workbook {}", path.display()))?;
    } else {
        write_sheet_dir(path, workbook)?;
    }
    debug!("Wrote workbook {} ({} sheets)", path.display(), workbook.len());
    Ok(())
}

fn write_sheet_dir(dir: &Path, workbook: &Workbook) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for sheet in &workbook.sheets {
        let file = dir.join(sheet_file_name(&sheet.name, SHEET_EXTENSION));
        let mut text = String::new();
        for row in &sheet.rows {
            let line: Vec<String> = row.iter().map(cell_text).collect();
            text.push_str(&line.join("\t"));
            text.push('\n');
        }
        fs::write(&file, text).with_context(|| format!("Failed to write sheet {}", file.display()))?;
    }

    let manifest: String = workbook.sheets.iter().map(|s| format!("{}\n", s.name)).collect();
    fs::write(dir.join(MANIFEST_FILE), manifest)
        .with_context(|| format!("Failed to write {} in {}", MANIFEST_FILE, dir.display()))?;
    Ok(())
}

/// Write one layer document; returns the path written.
pub fn write_layer<P: AsRef<Path>>(path: P, layer: &LayerDocument) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, layer.to_pretty_json()?)
        .with_context(|| format!("Failed to write layer {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Write per-sheet layers as `<out_dir>/<sheet>.json`.
///
/// A sheet whose file name is already taken, by an earlier sheet that
/// sanitizes to the same name or by one of the `reserved` paths, is written
/// as `<sheet>_2.json`, `<sheet>_3.json` and so on.
pub fn write_sheet_layers<P: AsRef<Path>>(
    out_dir: P,
    layers: &[NamedLayer],
    reserved: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut taken: FxHashSet<String> = reserved.iter().map(|p| path_key(p)).collect();
    layers
        .iter()
        .map(|layer| write_layer(unique_layer_path(out_dir, &layer.sheet, &mut taken), &layer.document))
        .collect()
}

fn unique_layer_path(out_dir: &Path, sheet: &str, taken: &mut FxHashSet<String>) -> PathBuf {
    let file = sheet_file_name(sheet, "json");
    let stem = file.strip_suffix(".json").unwrap_or(&file);

    let mut path = out_dir.join(&file);
    let mut suffix = 2;
    while !taken.insert(path_key(&path)) {
        path = out_dir.join(format!("{}_{}.json", stem, suffix));
        suffix += 1;
    }
    if suffix > 2 {
        warn!("Layer for sheet '{}' written to {} to avoid overwriting", sheet, path.display());
    }
    path
}

// Case-insensitive filesystems treat `APT1.json` and `apt1.json` as one file
fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
