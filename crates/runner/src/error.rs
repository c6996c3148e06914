//! Error types for the process test engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The backend cannot encode or execute a construct; reported as a skip
    #[error("{0}")]
    Unsupported(String),

    /// A process raised an error while executing
    #[error("{kind}: {message}")]
    Process { kind: String, message: String },

    #[error("Failed to load external reference {reference}: {reason}")]
    Reference { reference: String, reason: String },

    #[error("Backend returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Setup error: {0}")]
    Setup(#[from] proctest_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RunnerError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        RunnerError::Unsupported(reason.into())
    }

    pub fn process(kind: impl Into<String>, message: impl Into<String>) -> Self {
        RunnerError::Process {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, RunnerError::Unsupported(_))
    }

    /// Exception kind name, compared against a test case's `throws`
    pub fn kind(&self) -> &str {
        match self {
            RunnerError::Unsupported(_) => "Unsupported",
            RunnerError::Process { kind, .. } => kind,
            RunnerError::Reference { .. } => "ReferenceError",
            RunnerError::HttpStatus { .. } => "HttpStatusError",
            RunnerError::Config(_) => "ConfigurationError",
            RunnerError::Setup(_) => "SetupError",
            RunnerError::Io(_) => "IoError",
            RunnerError::Json(_) => "JsonError",
            RunnerError::Toml(_) => "TomlError",
            RunnerError::Http(_) => "HttpError",
        }
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;
