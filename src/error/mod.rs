use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::{common, ErrorExt};

/// The unified error type for the osworkflow crate
#[derive(Error, Debug)]
pub enum OswError {
    #[error("[E{code:04}] Parse error: {message}")]
    Parse {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Measure error: {message}")]
    Measure {
        code: u16,
        message: String,
        measure: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Workflow error: {message}")]
    Workflow {
        code: u16,
        message: String,
        step: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl OswError {
    /// Create a parse error with default code
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            code: ErrorCode::PARSE_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with specific code
    pub fn parse_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with default code
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            code: ErrorCode::STORAGE_GENERIC,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a measure error with specific code and measure directory name
    pub fn measure(code: u16, message: impl Into<String>, measure: Option<String>) -> Self {
        Self::Measure {
            code,
            message: message.into(),
            measure,
            source: None,
        }
    }

    /// Create a workflow error with specific code
    pub fn workflow_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Workflow {
            code,
            message: message.into(),
            step: None,
            source: None,
        }
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Parse { source: src, .. }
            | Self::Storage { source: src, .. }
            | Self::Measure { source: src, .. }
            | Self::Workflow { source: src, .. }
            | Self::Validation { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Parse { message, .. }
            | Self::Storage { message, .. }
            | Self::Measure { message, .. }
            | Self::Workflow { message, .. }
            | Self::Validation { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Attach the path a storage error refers to
    pub fn with_path(mut self, p: impl Into<PathBuf>) -> Self {
        if let Self::Storage {
            path: ref mut slot, ..
        } = self
        {
            *slot = Some(p.into());
        }
        self
    }

    /// Set the step a workflow error refers to
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        if let Self::Workflow {
            step: ref mut s, ..
        } = self
        {
            *s = Some(step.into());
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Parse { code, .. }
            | Self::Storage { code, .. }
            | Self::Measure { code, .. }
            | Self::Workflow { code, .. }
            | Self::Validation { code, .. } => *code,
        }
    }

    /// Get the bare message without code prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Parse { message, .. }
            | Self::Storage { message, .. }
            | Self::Measure { message, .. }
            | Self::Workflow { message, .. }
            | Self::Validation { message, .. } => message,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, Self::Measure { .. })
    }

    pub fn is_workflow(&self) -> bool {
        matches!(self, Self::Workflow { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse { message, .. } => format!("Could not parse workflow: {}", message),
            Self::Storage { message, path, .. } => {
                if let Some(p) = path {
                    format!("Storage error at {}: {}", p.display(), message)
                } else {
                    format!("Storage error: {}", message)
                }
            }
            Self::Measure {
                message, measure, ..
            } => {
                if let Some(m) = measure {
                    format!("Measure '{}': {}", m, message)
                } else {
                    format!("Measure error: {}", message)
                }
            }
            Self::Workflow { message, step, .. } => {
                if let Some(s) = step {
                    format!("Workflow error at step '{}': {}", s, message)
                } else {
                    format!("Workflow error: {}", message)
                }
            }
            Self::Validation { message, field, .. } => {
                if let Some(f) = field {
                    format!("Validation error for '{}': {}", f, message)
                } else {
                    format!("Validation error: {}", message)
                }
            }
        }
    }
}

/// Type alias for Results using OswError
pub type Result<T> = std::result::Result<T, OswError>;

// Conversion from common error types

impl From<std::io::Error> for OswError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorCode::STORAGE_NOT_FOUND, "File or directory not found"),
            ErrorKind::PermissionDenied => {
                (ErrorCode::STORAGE_PERMISSION_DENIED, "Permission denied")
            }
            ErrorKind::AlreadyExists => (ErrorCode::STORAGE_ALREADY_EXISTS, "Already exists"),
            ErrorKind::InvalidInput => (ErrorCode::VALIDATION_INVALID_INPUT, "Invalid input"),
            ErrorKind::InvalidData => (ErrorCode::VALIDATION_INVALID_DATA, "Invalid data"),
            _ => (ErrorCode::STORAGE_IO_ERROR, "IO operation failed"),
        };

        OswError::storage_with_code(code, message, None).with_source(err)
    }
}

impl From<serde_json::Error> for OswError {
    fn from(err: serde_json::Error) -> Self {
        OswError::parse_with_code(ErrorCode::PARSE_INVALID_JSON, "Invalid JSON syntax")
            .with_source(err)
    }
}

impl From<toml::de::Error> for OswError {
    fn from(err: toml::de::Error) -> Self {
        OswError::parse_with_code(ErrorCode::PARSE_INVALID_CONFIG, "Invalid TOML syntax")
            .with_source(err)
    }
}

// Note: OswError converts to anyhow::Error because it implements std::error::Error
