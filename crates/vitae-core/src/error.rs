use thiserror::Error;

/// All errors that can occur in vitae-core.
#[derive(Debug, Error)]
pub enum VitaeError {
    #[error("ORCID record unavailable: {0}")]
    RecordUnavailable(String),

    #[error("No ORCID iD mapped for key: {0}")]
    UnmappedKey(String),

    #[error("Invalid ORCID iD format: {0} (expected XXXX-XXXX-XXXX-XXXX)")]
    InvalidOrcidId(String),

    #[error("Invalid year filter: {0}")]
    InvalidYearFilter(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Exit codes used by the `vitae` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    RecordUnavailable = 2,
    InvalidArgs = 3,
    UnmappedKey = 4,
}

impl VitaeError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::RecordUnavailable(_) => ExitCode::RecordUnavailable,
            Self::UnmappedKey(_) => ExitCode::UnmappedKey,
            Self::InvalidOrcidId(_) | Self::InvalidYearFilter(_) | Self::Config(_) => {
                ExitCode::InvalidArgs
            }
            _ => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, VitaeError>;
