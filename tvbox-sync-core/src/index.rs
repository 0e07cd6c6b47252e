//! Generated index of the publish tree.
//!
//! Every immediate subdirectory that directly holds the manifest file
//! becomes one entry. Nested manifests are not discovered.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::contract::IndexError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexDocument {
    pub urls: Vec<IndexEntry>,
}

impl IndexDocument {
    /// Pretty JSON with two-space indentation.
    pub fn to_json(&self) -> Result<String, IndexError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Scans `dest` and builds the document. Entries are ordered by directory name.
pub fn generate_index(dest: &Path, domain: &str, manifest_file: &str) -> Result<IndexDocument, IndexError> {
    let scan_err = |e: std::io::Error| IndexError::Scan {
        path: dest.to_path_buf(),
        source: e,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dest).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        if !entry.file_type().map_err(scan_err)?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(name = ?raw, "Skipping directory with a non UTF-8 name"),
        }
    }
    names.sort();

    let urls = names
        .into_iter()
        .filter(|name| {
            let present = dest.join(name).join(manifest_file).is_file();
            if !present {
                debug!(dir = %name, manifest = manifest_file, "No manifest, leaving out of index");
            }
            present
        })
        .map(|name| IndexEntry {
            url: format!("https://{domain}/{name}/{manifest_file}"),
            name,
        })
        .collect();

    Ok(IndexDocument { urls })
}

/// Overwrites `{dest}/{index_file}` with `document`.
pub fn write_index(dest: &Path, index_file: &str, document: &IndexDocument) -> Result<PathBuf, IndexError> {
    let path = dest.join(index_file);
    let json = document.to_json()?;
    fs::write(&path, json).map_err(|e| IndexError::Write {
        path: path.clone(),
        source: e,
    })?;
    info!(path = %path.display(), entries = document.urls.len(), "Index written");
    Ok(path)
}

/// Generates and writes the index in one step.
pub fn regenerate_index(
    dest: &Path,
    domain: &str,
    manifest_file: &str,
    index_file: &str,
) -> Result<IndexDocument, IndexError> {
    info!(domain = %domain, "Generating index");
    let document = generate_index(dest, domain, manifest_file)?;
    write_index(dest, index_file, &document)?;
    Ok(document)
}
