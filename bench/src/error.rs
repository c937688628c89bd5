//! Error types surfaced at the library boundary.
//!
//! Catalog and backend code works with `anyhow::Result` and attaches context
//! per call; the harness folds those into [`HarnessError`] together with the
//! stage that failed.

use crate::catalog::{Configuration, Operation};
use std::path::PathBuf;
use thiserror::Error;

/// Failures while writing or reading the generated dataset files.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("record count must be at least 1")]
    EmptyDataset,

    #[error("dataset file {} is missing", path.display())]
    Missing { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            DatasetError::Missing { path }
        } else {
            DatasetError::Io { path, source }
        }
    }
}

/// Why a benchmark run produced no report.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("record count must be at least 1")]
    InvalidRecordCount,

    #[error("cannot connect to {backend} backend: {source:#}")]
    Connection {
        backend: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("dataset generation failed: {0}")]
    Generation(#[source] DatasetError),

    #[error("{configuration}: could not reset storage: {source:#}")]
    Reset {
        configuration: Configuration,
        #[source]
        source: anyhow::Error,
    },

    #[error("{configuration}: dataset unavailable: {source}")]
    Dataset {
        configuration: Configuration,
        #[source]
        source: DatasetError,
    },

    #[error("{configuration}: {operation} failed: {source:#}")]
    Operation {
        configuration: Configuration,
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },
}

impl HarnessError {
    /// Configuration the failure belongs to, if it happened inside one.
    pub fn configuration(&self) -> Option<Configuration> {
        match self {
            HarnessError::Reset { configuration, .. }
            | HarnessError::Dataset { configuration, .. }
            | HarnessError::Operation { configuration, .. } => Some(*configuration),
            _ => None,
        }
    }
}
