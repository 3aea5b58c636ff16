//! Locate and read the tool's own settings files.
//!
//! Each [`SearchPath`] resolves to one directory, checked for
//! `confpatch.toml`. Results come back lowest priority first so the caller can
//! merge them in order. Missing files are skipped; any other I/O error is
//! reported. An explicitly named settings file must exist.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfpatchError;
use crate::types::SearchPath;

pub const APP_NAME: &str = "confpatch";
pub const SETTINGS_FILE: &str = "confpatch.toml";

/// Resolve a [`SearchPath`] to a directory, or `None` when the platform has
/// no such location (e.g. no home directory).
pub fn resolve_search_path(sp: &SearchPath) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", APP_NAME)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// Read every `confpatch.toml` found in `search_paths`, in the given order.
pub fn load_settings_files(
    search_paths: &[SearchPath],
) -> Result<Vec<(PathBuf, String)>, ConfpatchError> {
    let mut found = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();
    for dir in search_paths.iter().filter_map(resolve_search_path) {
        let path = dir.join(SETTINGS_FILE);
        // Cwd may coincide with the platform directory.
        if seen.contains(&path) {
            continue;
        }
        seen.push(path.clone());
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "found settings file");
                found.push((path, content));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(ConfpatchError::ReadFailure { path, source: e }),
        }
    }
    Ok(found)
}

/// Read a settings file the user named explicitly.
pub fn load_explicit(path: &Path) -> Result<(PathBuf, String), ConfpatchError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok((path.to_path_buf(), content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfpatchError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(ConfpatchError::ReadFailure {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
