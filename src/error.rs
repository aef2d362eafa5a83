//! Top-level error type and exit codes.

use std::process::ExitCode;

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("another instance is already running")]
    AlreadyRunning,
    #[error("{0}\n\nRun with --help for usage.")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Usage(_) => ExitCode::from(2),
            AppError::AlreadyRunning => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}
