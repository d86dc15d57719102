//! CLI-specific error types and exit code mapping

use echidna_core::error::{EchidnaError, FetchError, StorageError};
use echidna_plugin_scanner::PluginScannerError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Working directories could not be created.
    #[error("working directory error: {0}")]
    WorkDir(String),

    /// Registry info could not be fetched (page count unknown).
    #[error("registry unreachable: {0}")]
    Registry(String),

    /// Cleanup after completion or interrupt failed.
    #[error("cleanup failed: {0}")]
    Cleanup(String),

    /// Logging or metrics setup failed.
    #[error("{0}")]
    Setup(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other domain error from the pipeline.
    #[error("{0}")]
    Core(EchidnaError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Completed, or cancelled and cleaned up    |
    /// | 1    | General error / cleanup failure           |
    /// | 2    | Configuration or working directory error  |
    /// | 3    | Registry unreachable at startup           |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::WorkDir(_) => 2,
            Self::Registry(_) => 3,
            Self::Cleanup(_)
            | Self::Setup(_)
            | Self::JsonSerialize(_)
            | Self::Io(_)
            | Self::Core(_) => 1,
        }
    }
}

impl From<EchidnaError> for CliError {
    fn from(err: EchidnaError) -> Self {
        match err {
            EchidnaError::Config(e) => Self::Config(e.to_string()),
            EchidnaError::Fetch(FetchError::RegistryUnavailable(reason)) => Self::Registry(reason),
            EchidnaError::Storage(StorageError::Directory(reason)) => Self::WorkDir(reason),
            other => Self::Core(other),
        }
    }
}

impl From<PluginScannerError> for CliError {
    fn from(err: PluginScannerError) -> Self {
        EchidnaError::from(err).into()
    }
}
