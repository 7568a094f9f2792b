//! Error types for the document deduplication pipeline.
//!
//! Every variant here is fatal to the current run. Conditions that merely
//! leave nothing to report (no clusters, a degenerate projection) are not
//! errors and are modelled as outcome variants instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    /// No root folder was given.
    #[error("No folder path was given")]
    MissingRoot,

    #[error("Specified folder does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Specified folder is empty: {}", .0.display())]
    FolderEmpty(PathBuf),

    /// A file could not be read, usually because another application holds it open.
    #[error(
        "Permission error. The file `{}` cannot be opened. If this file is already open, \
         close all applications that are interacting with it. ({source})",
        path.display()
    )]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not extract text from `{}`: {reason}. Make sure the file is closed and try again.", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("Invalid value {value} for `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Could not access the specified folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type DedupResult<T> = Result<T, DedupError>;

impl DedupError {
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        DedupError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_message_names_the_file() {
        let err = DedupError::Unreadable {
            path: PathBuf::from("/data/report.docx"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/report.docx"));
        assert!(msg.contains("close all applications"));
    }

    #[test]
    fn invalid_parameter_formats_name_and_value() {
        let err = DedupError::invalid("alpha", 1.5, "must be within [0, 1]");
        assert_eq!(
            err.to_string(),
            "Invalid value 1.5 for `alpha`: must be within [0, 1]"
        );
    }
}
