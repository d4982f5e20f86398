//! Shapefile discovery.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, glob_with};
use log::{debug, warn};

use crate::error::{IoError, Result};

/// Lists every `*.shp` file under `dir`, recursively, in lexicographic order.
///
/// Extension matching is case-insensitive. A missing directory yields an
/// empty list; unreadable entries are logged and skipped.
///
/// # Errors
///
/// Returns [`IoError::InvalidPath`] if `dir` is not valid UTF-8 or cannot be
/// turned into a glob pattern.
pub fn locate_shapefiles(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir_str = dir.to_str().ok_or_else(|| IoError::InvalidPath {
        path: dir.to_path_buf(),
        reason: "path is not valid UTF-8".to_string(),
    })?;
    let pattern = format!("{}/**/*.shp", Pattern::escape(dir_str.trim_end_matches('/')));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let entries = glob_with(&pattern, options).map_err(|e| IoError::InvalidPath {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {},
            Err(e) => warn!("Cannot read {}: {}", e.path().display(), e.error()),
        }
    }
    files.sort();
    debug!("Found {} shapefile(s) under {}", files.len(), dir.display());
    Ok(files)
}
