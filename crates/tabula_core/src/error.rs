use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level export error type.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Nothing to export from: no collection, format or filename could be resolved.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Export format is not recognized: {0}")]
    UnsupportedFormat(String),

    /// A field path segment does not name a field on the model.
    #[error("{model} has no field named '{field}'")]
    FieldNotFound { model: String, field: String },

    /// Raised by the record collection backend (bad column reference, query failure).
    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Computed field '{field}' failed: {reason}")]
    ComputedField { field: String, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of errors for logging and user display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The caller must supply something (collection, format, filename).
    ConfigError,
    /// The request names something that does not exist (format, field).
    UserError,
    /// The record collection backend failed.
    CollectionError,
    /// Writing the output failed.
    SystemError,
}

impl ExportError {
    pub fn field_not_found(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            model: model.into(),
            field: field.into(),
        }
    }

    /// Returns the broad error category for routing and display purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::ConfigError,
            Self::UnsupportedFormat(_) => ErrorCategory::UserError,
            Self::FieldNotFound { .. } => ErrorCategory::UserError,
            Self::Collection(_) => ErrorCategory::CollectionError,
            Self::ComputedField { .. } => ErrorCategory::CollectionError,
            Self::Encoding(_) => ErrorCategory::SystemError,
            Self::Io(_) => ErrorCategory::SystemError,
        }
    }

    /// Returns a user-friendly message (hides internal details).
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(msg) => format!("Export is not configured: {msg}"),
            Self::UnsupportedFormat(format) => {
                format!("Unknown export format '{format}'. Use 'csv' or 'excel'.")
            }
            Self::FieldNotFound { model, field } => {
                format!("Unknown field '{field}' on {model}.")
            }
            Self::Collection(_) => "The records could not be read.".into(),
            Self::ComputedField { field, .. } => format!("Could not compute '{field}'."),
            Self::Encoding(_) | Self::Io(_) => "The export file could not be written.".into(),
        }
    }
}
