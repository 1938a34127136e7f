//! Error types
//!
//! A single error enum for the whole pipeline. The binary maps each variant to
//! a process exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Convenient Result alias
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("config file doesn't exist, run with --init first: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("config path is not a file: {}", .0.display())]
    ConfigNotAFile(PathBuf),

    #[error("no {0} recorded in the config, nothing to run")]
    ArtifactMissing(&'static str),

    #[error("download failed: {0}")]
    Download(String),

    #[error("browser automation failed: {0}")]
    Browser(String),

    #[error("could not start the WebDriver server: {0}")]
    DriverSetup(String),

    #[error("patcher failed: {0}")]
    Patcher(String),

    #[error("the patches don't list any supported YouTube version")]
    NoSupportedVersion,
}

impl AppError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NoSupportedVersion => 2,
            AppError::DriverSetup(_) => 3,
            _ => 1,
        }
    }
}

impl From<fantoccini::error::CmdError> for AppError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        AppError::Browser(err.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for AppError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        AppError::Browser(err.to_string())
    }
}
