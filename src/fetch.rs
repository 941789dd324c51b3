//! Download of the reference catalog and technique name index.

use crate::annotate::NameLookup;
use crate::catalog::Catalog;
use crate::config::{ReferenceConfig, CATALOG_FILE_NAME, NAMES_FILE_NAME};
use crate::error::{NavError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the reference files were saved and how much they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedReference {
    pub catalog_path: PathBuf,
    pub names_path: PathBuf,
    pub techniques: usize,
    pub names: usize,
}

/// Download both reference files into `out_dir`.
///
/// The catalog is parsed before anything is written, so a broken download
/// never replaces a working `layer.json`.
pub fn fetch_reference(config: &ReferenceConfig, out_dir: &Path) -> Result<FetchedReference> {
    let client = reqwest::blocking::Client::builder()
        .timeout(config.timeout())
        .user_agent(concat!("navlayer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| NavError::fetch(&config.catalog_url, e.to_string()))?;
    fetch_with(&client, config, out_dir)
}

fn fetch_with(
    client: &reqwest::blocking::Client,
    config: &ReferenceConfig,
    out_dir: &Path,
) -> Result<FetchedReference> {
    let catalog_text = download(client, &config.catalog_url)?;
    let catalog = Catalog::load(&catalog_text)?;
    let names_text = download(client, &config.names_url)?;
    let names = NameLookup::parse(&names_text);

    fs::create_dir_all(out_dir)?;
    let catalog_path = out_dir.join(CATALOG_FILE_NAME);
    let names_path = out_dir.join(NAMES_FILE_NAME);
    fs::write(&catalog_path, catalog_text)?;
    fs::write(&names_path, names_text)?;

    info!(
        "Saved catalog ({} entries) and name index ({} names) to {}",
        catalog.len(),
        names.len(),
        out_dir.display()
    );

    Ok(FetchedReference {
        catalog_path,
        names_path,
        techniques: catalog.len(),
        names: names.len(),
    })
}

fn download(client: &reqwest::blocking::Client, url: &str) -> Result<String> {
    debug!("GET {}", url);
    let response = client.get(url).send().map_err(|e| NavError::fetch(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(NavError::fetch(url, format!("HTTP {}", status)));
    }

    response.text().map_err(|e| NavError::fetch(url, e.to_string()))
}
