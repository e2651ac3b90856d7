//! Error types for study ingestion.

use std::io;
use std::path::{Path, PathBuf};

use lsa_model::ConfigError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Failures while loading the study configuration and its input tables.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The study file is not valid TOML for the configuration schema.
    #[error("failed to parse study configuration {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// The study file parsed but is inconsistent.
    #[error("invalid study configuration: {0}")]
    Config(#[from] ConfigError),

    /// A table the run needs has no input path.
    #[error("no input file declared for {what}")]
    MissingInput { what: String },

    #[error("failed to parse CSV {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    /// A header row without data rows.
    #[error("CSV file has no data rows: {path}")]
    EmptyCsv { path: PathBuf },

    #[error("CSV file {path} has a blank column name")]
    EmptyColumnName { path: PathBuf },
}

impl IngestError {
    /// Maps an I/O failure on `path`, keeping "not found" distinct.
    pub(crate) fn io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound { path },
            _ => Self::FileRead { path, source: err },
        }
    }

    pub(crate) fn csv(path: &Path, source: PolarsError) -> Self {
        Self::CsvParse {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kept_distinct() {
        let path = Path::new("/data/k6.csv");
        let err = IngestError::io(path, io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.to_string(), "file not found: /data/k6.csv");
        let err = IngestError::io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, IngestError::FileRead { .. }));
    }

    #[test]
    fn test_config_error_wrapped() {
        let err: IngestError = ConfigError::EmptyTimepoints.into();
        assert_eq!(
            err.to_string(),
            "invalid study configuration: no canonical timepoints declared"
        );
    }
}
