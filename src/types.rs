use std::path::PathBuf;

/// A directory searched for the tool's own `confpatch.toml`.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// Current working directory.
    Cwd,
    /// An explicit directory.
    Path(PathBuf),
}

/// How the binary prints a [`PatchOutcome`](crate::ops::PatchOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Result line, or the rendered file for a dry run.
    Text,
    /// One JSON object.
    Json,
}
