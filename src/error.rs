use std::path::PathBuf;
use thiserror::Error;

/// A syntax or shape problem in a PHP configuration document.
///
/// `offset` is a byte offset into the document; `line` and `column` are
/// 1-indexed and count characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct FormatError {
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl FormatError {
    /// Build an error at `offset`, computing line and column from `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..floor_char_boundary(source, offset)];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit_once('\n')
            .map_or(before, |(_, tail)| tail)
            .chars()
            .count()
            + 1;
        FormatError {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

fn floor_char_boundary(s: &str, mut offset: usize) -> usize {
    while !s.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[derive(Debug, Error)]
pub enum ConfpatchError {
    #[error("No configuration file given (usage: confpatch <config-file> [--flag=value ...])")]
    MissingArgument,

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration file format in {path}: {source}")]
    InvalidFormat {
        path: PathBuf,
        source: FormatError,
        /// Document text, kept so diagnostics can point into it.
        content: String,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write configuration file {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unknown setting '{key}' in {path} (line {line})")]
    UnknownSetting {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown settings: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    UnknownSettings(Vec<ConfpatchError>),

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(#[from] confique::Error),
}

#[cfg(feature = "rich-errors")]
impl miette::Diagnostic for ConfpatchError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self {
            ConfpatchError::MissingArgument => "confpatch::missing_argument",
            ConfpatchError::FileNotFound { .. } => "confpatch::file_not_found",
            ConfpatchError::InvalidFormat { .. } => "confpatch::invalid_format",
            ConfpatchError::ReadFailure { .. } => "confpatch::read_failure",
            ConfpatchError::WriteFailure { .. } => "confpatch::write_failure",
            _ => "confpatch::settings",
        };
        Some(Box::new(code))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            ConfpatchError::InvalidFormat { content, .. } => Some(content),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            ConfpatchError::InvalidFormat { source, .. } => {
                Some(Box::new(std::iter::once(miette::LabeledSpan::at_offset(
                    source.offset,
                    source.message.clone(),
                ))))
            }
            _ => None,
        }
    }
}
