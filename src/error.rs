use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum SnapError {
    #[error("Invalid input ({field}): {message}")]
    InvalidInput { field: String, message: String },

    #[error("Failed to start browser engine: {0}")]
    EngineStart(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Cache namespace '{0}' is unknown and could not be auto-created")]
    UnknownNamespace(String),

    #[error("Unable to process: {0}")]
    Processing(String),

    #[error("No page slot became available within {0:?}")]
    AdmissionTimeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SnapError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        SnapError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        SnapError::Processing(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SnapError::InvalidInput { .. } | SnapError::InvalidUrl(_) => ErrorCategory::Validation,
            _ => ErrorCategory::Unexpected,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            SnapError::InvalidInput { field, message } => ErrorPayload::new(
                ErrorCategory::Validation,
                format!("{}: {}", field, message),
                "Pass a non-blank --url (e.g., https://example.com).",
            )
            .with_field(field.clone()),
            SnapError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Validation,
                e.to_string(),
                "Verify URL/format (e.g., https://example.com).",
            )
            .with_field("url"),
            SnapError::EngineStart(msg) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                msg.to_string(),
                "Install Chromium/Chrome or set engine.executable in the config file.",
            ),
            SnapError::Navigation(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("timeout") || lower.contains("timed out") {
                    ErrorPayload::new(
                        ErrorCategory::Unexpected,
                        msg.to_string(),
                        "Try increasing pool.network_idle.timeout or ensure the page stops loading resources.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Unexpected,
                        msg.to_string(),
                        "Check that the URL is reachable from this machine.",
                    )
                }
            }
            SnapError::UnknownNamespace(name) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                format!("Unknown cache namespace: {}", name),
                "Create the namespace first or enable cache.auto_create_namespaces.",
            ),
            SnapError::Processing(msg) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                msg.to_string(),
                "Re-run with --verbose; the page may not have produced any output.",
            ),
            SnapError::AdmissionTimeout(wait) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                format!("No page slot available after {:?}", wait),
                "Raise pool.max_slots or pool.admission_timeout.",
            ),
            SnapError::Io(e) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            SnapError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                e.to_string(),
                "Re-run with --verbose for details.",
            ),
            SnapError::Config(msg) => ErrorPayload::new(
                ErrorCategory::Unexpected,
                msg.to_string(),
                "Check the config file and flags (e.g., --viewport WIDTHxHEIGHT).",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;

/// Status classification handed to whatever boundary presents the failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Unauthorized,
    NotFound,
    Unexpected,
}

impl ErrorCategory {
    pub fn status(self) -> u16 {
        match self {
            ErrorCategory::Validation => 422,
            ErrorCategory::Unauthorized => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Unexpected => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            status: category.status(),
            message,
            field: None,
            remediation: Some(remediation.into()),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}
