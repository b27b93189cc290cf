use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionReport;

/// The main error type for wildlabel operations.
#[derive(Debug, Error)]
pub enum WildlabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse dataset CSV {path}: {source}")]
    DatasetCsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write candidate CSV {path}: {source}")]
    DatasetCsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Failed to parse labelling history {path}: {source}")]
    HistoryParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to append to labelling history {path}: {source}")]
    HistoryWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset {path} has an identifier that cannot name a file: '{id}'")]
    InvalidIdentifier { path: PathBuf, id: String },

    #[error("Candidate {id} has no image_url to fetch")]
    MissingImageUrl { id: String },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedOutput(String),

    #[error("Labelling aborted by key code {token} after {} new label(s)", .report.labelled)]
    SessionAborted { token: u32, report: SessionReport },

    #[error("Labelling interrupted after {} new label(s)", .report.labelled)]
    SessionInterrupted { report: SessionReport },
}
