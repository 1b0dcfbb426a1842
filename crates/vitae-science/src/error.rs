use thiserror::Error;
use vitae_core::{ExitCode, VitaeError};

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("metadata lookup failed for {doi}: {reason}")]
    LookupFailed { doi: String, reason: String },

    #[error(transparent)]
    Core(#[from] VitaeError),
}

impl ScienceError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Core(e) => e.exit_code(),
            Self::InvalidDoi(_) => ExitCode::InvalidArgs,
            _ => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScienceError>;
