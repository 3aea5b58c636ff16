//! The patch operation: load, apply updates, render, write.
//!
//! Provides [`patch_file`] behind the binary and the [`PatchOutcome`] enum that
//! callers display as text or JSON.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::error::{ConfpatchError, FormatError};
use crate::parse::{load, parse_document};
use crate::render::{render, save};
use crate::update::{FieldUpdate, apply_updates};

/// Everything needed to patch one file.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRequest {
    pub path: PathBuf,
    pub updates: Vec<FieldUpdate>,
    /// Render without writing.
    pub dry_run: bool,
}

/// Result of a patch. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PatchOutcome {
    /// The file was rewritten.
    Written { path: PathBuf, changed: Vec<String> },
    /// Dry run: the content that would have been written.
    Preview { content: String, changed: Vec<String> },
}

impl PatchOutcome {
    pub fn changed(&self) -> &[String] {
        match self {
            PatchOutcome::Written { changed, .. } | PatchOutcome::Preview { changed, .. } => changed,
        }
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Written { changed, .. } => write!(
                f,
                "Configuration updated successfully. Changed: {}",
                changed.join(", ")
            ),
            PatchOutcome::Preview { content, .. } => write!(f, "{content}"),
        }
    }
}

/// Patch document text in memory. Returns the new text and the changed keys.
pub fn patch_document(
    content: &str,
    updates: &[FieldUpdate],
) -> Result<(String, Vec<String>), FormatError> {
    let mut map = parse_document(content)?;
    let changed = apply_updates(&mut map, updates);
    Ok((render(&map), changed))
}

/// Load `request.path`, apply its updates and write the result back (or
/// return it, for a dry run). Nothing is written unless every earlier step
/// succeeded.
pub fn patch_file(request: &PatchRequest) -> Result<PatchOutcome, ConfpatchError> {
    let mut map = load(&request.path)?;
    let changed = apply_updates(&mut map, &request.updates);
    info!(path = %request.path.display(), changed = ?changed, "applied updates");

    if request.dry_run {
        return Ok(PatchOutcome::Preview {
            content: render(&map),
            changed,
        });
    }
    save(&request.path, &map)?;
    Ok(PatchOutcome::Written {
        path: request.path.clone(),
        changed,
    })
}
