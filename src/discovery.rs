//! Input document discovery

use crate::{Error, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// List the documents in `dir` whose extension matches `extension`
/// (case-insensitive, leading dot optional), sorted by file name.
///
/// Only the directory itself is scanned. A missing directory, a path that is
/// not a directory, or a directory without matching files is a
/// `DiscoveryError`.
pub fn discover_documents(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    if !dir.exists() {
        return Err(Error::DiscoveryError(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(Error::DiscoveryError(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::DiscoveryError(format!("cannot read {}: {}", dir.display(), e))
    })?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::DiscoveryError(format!("cannot read {}: {}", dir.display(), e)))?
            .path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(extension));
        if matches {
            debug!("found document {}", path.display());
            documents.push(path);
        }
    }

    if documents.is_empty() {
        return Err(Error::DiscoveryError(format!(
            "no .{} files found in {}",
            extension,
            dir.display()
        )));
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    info!("Found {} document(s) in {}", documents.len(), dir.display());
    Ok(documents)
}
