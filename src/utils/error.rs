//! Error types and handling
//!
//! Configuration errors and the application-wide error type that the binary
//! turns into an exit status.

use crate::mux::MuxFormat;
use crate::process::ProcessError;
use crate::server::ServerError;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Problems detected before anything is spawned or bound
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {format} segment type \"{value}\" (valid: {})", valid_segment_types(.format))]
    InvalidSegmentType { format: MuxFormat, value: String },

    #[error("directory does not exist: {}", .0.display())]
    InvalidDirectory(PathBuf),
}

fn valid_segment_types(format: &MuxFormat) -> String {
    format
        .segment_types()
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stopped unexpectedly: {0}")]
    Stopped(String),
}

impl AppError {
    /// Stable code used in log output
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Process(ProcessError::Spawn { .. }) => "SPAWN_ERROR",
            AppError::Process(_) => "RUNTIME_ERROR",
            AppError::Server(ServerError::Bind { .. })
            | AppError::Server(ServerError::Tls(_))
            | AppError::Server(ServerError::TlsFile { .. })
            | AppError::Server(ServerError::NoCertificate(_))
            | AppError::Server(ServerError::NoPrivateKey(_)) => "BIND_ERROR",
            AppError::Server(ServerError::InvalidDirectory(_)) => "CONFIG_ERROR",
            AppError::Server(_) => "RUNTIME_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Stopped(_) => "STOPPED",
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> ExitCode {
        match self.code() {
            "CONFIG_ERROR" => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
