//! Error types.
//!
//! Library code returns [`PipelineError`], one variant per failure kind of the
//! pipeline. The binary converts it into an [`AppError`] that carries the
//! process exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Typed failures raised by the pipeline stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Malformed raw input: non-numeric value, out-of-range month, negative rate, duplicate key.
    #[error("data error: {0}")]
    Data(String),

    /// A (state, year) lacks one or more growing-season months.
    #[error("incomplete season for {state} {year}: missing months {missing:?}")]
    IncompleteSeason {
        state: String,
        year: i32,
        missing: Vec<u32>,
    },

    /// Expected columns are absent from a table.
    #[error("schema error: {0}")]
    Schema(String),

    /// A split partition came out empty.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Training input is empty or contains non-finite values.
    #[error("fit error: {0}")]
    Fit(String),

    /// A prediction request is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on '{}': {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Process exit code for this failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Data(_)
            | PipelineError::Schema(_)
            | PipelineError::Config(_)
            | PipelineError::Io { .. } => 2,
            PipelineError::IncompleteSeason { .. } | PipelineError::InsufficientData(_) => 3,
            PipelineError::Fit(_) => 4,
            PipelineError::Validation(_) => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
