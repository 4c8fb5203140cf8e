use thiserror::Error;

/// Failures of the message store. Callers treat the store as unusable for the
/// rest of the operation once one of these surfaces.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// A text-generation backend could not produce output.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend} request failed: {source}")]
    Http {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Process(#[from] crate::process::RunError),

    #[error("{backend} exited with {status}: {stderr}")]
    Exit {
        backend: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Batch-level failures of the classification pipeline.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("classifier backend is unreachable; make sure the model server is running")]
    BackendUnreachable,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
