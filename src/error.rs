use std::path::PathBuf;

use thiserror::Error;

pub type DriveResult<T> = Result<T, DriveError>;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("only Excel files are accepted (.xls, .xlsx): {0}")]
    InvalidExtension(String),

    #[error("required asset not found: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("failed to spawn automation bridge: {0}")]
    Spawn(String),

    #[error("automation host error: {0}")]
    Host(String),

    #[error("bridge protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriveError {
    /// True for errors the caller can fix by sending a different request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DriveError::InvalidExtension(_))
    }
}
