use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid draw record: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("could not encode draw record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("could not replace dataset file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
