//! Error types module
//!
//! All failures of the signing queue are unified under [`PdfSignError`]. The
//! variants follow the four failure classes the queue distinguishes:
//! placement policy (blocks the whole queue), transport/server (per file),
//! PDF parsing (per file) and second-factor challenge (per file).

use std::io;

use crate::models::FailureStage;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a rejected upload
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error is presented and handled.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    fn error_code(&self) -> &'static str;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum PdfSignError {
    #[error("Manual placement required for: {}", .0.join(", "))]
    PlacementRequired(Vec<String>),

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    #[error("PDF parse error: {0}")]
    PdfParse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server responded with status {status}: {description}")]
    Server { status: u16, description: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Second-factor challenge failed: {0}")]
    Challenge(String),

    #[error("Signed document retrieval failed: {0}")]
    ArtifactFetch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for PdfSignError {
    fn from(err: serde_json::Error) -> Self {
        PdfSignError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, log_level).
fn pdf_sign_error_static_metadata(err: &PdfSignError) -> (&'static str, LogLevel) {
    match err {
        PdfSignError::PlacementRequired(_) => ("PLACEMENT_REQUIRED", LogLevel::Warn),
        PdfSignError::InvalidPlacement(_) => ("INVALID_PLACEMENT", LogLevel::Warn),
        PdfSignError::PdfParse(_) => ("PDF_PARSE_ERROR", LogLevel::Warn),
        PdfSignError::Transport(_) => ("TRANSPORT_ERROR", LogLevel::Error),
        PdfSignError::Server { .. } => ("SERVER_ERROR", LogLevel::Warn),
        PdfSignError::UnexpectedResponse(_) => ("UNEXPECTED_RESPONSE", LogLevel::Error),
        PdfSignError::Challenge(_) => ("CHALLENGE_FAILED", LogLevel::Warn),
        PdfSignError::ArtifactFetch(_) => ("ARTIFACT_FETCH_FAILED", LogLevel::Error),
        PdfSignError::InvalidInput(_) => ("INVALID_INPUT", LogLevel::Debug),
        PdfSignError::Config(_) => ("CONFIG_ERROR", LogLevel::Error),
        PdfSignError::Io(_) => ("IO_ERROR", LogLevel::Error),
    }
}

impl PdfSignError {
    /// Error for a document that failed at `stage`, from the outcome the
    /// classifier recorded. `status` is 0 when no response was received.
    pub fn from_failure(stage: FailureStage, status: u16, description: impl Into<String>) -> Self {
        let description = description.into();
        match stage {
            FailureStage::Preparation => PdfSignError::InvalidInput(description),
            FailureStage::Challenge => PdfSignError::Challenge(description),
            FailureStage::ArtifactFetch => PdfSignError::ArtifactFetch(description),
            FailureStage::Submission if status == 0 => PdfSignError::Transport(description),
            FailureStage::Submission => PdfSignError::Server {
                status,
                description,
            },
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for PdfSignError {
    fn error_code(&self) -> &'static str {
        pdf_sign_error_static_metadata(self).0
    }

    fn log_level(&self) -> LogLevel {
        pdf_sign_error_static_metadata(self).1
    }

    fn client_message(&self) -> String {
        match self {
            PdfSignError::PlacementRequired(files) => format!(
                "Manual signature placement is required for: {}",
                files.join(", ")
            ),
            PdfSignError::InvalidPlacement(ref msg) => msg.clone(),
            PdfSignError::PdfParse(_) => {
                "The document could not be read and was not uploaded".to_string()
            }
            PdfSignError::Transport(_) => "The operation failed".to_string(),
            PdfSignError::Server {
                ref description, ..
            } => description.clone(),
            PdfSignError::UnexpectedResponse(_) => "The operation failed".to_string(),
            PdfSignError::Challenge(ref msg) => msg.clone(),
            PdfSignError::ArtifactFetch(ref msg) => {
                format!("Signed document retrieval failed: {}", msg)
            }
            PdfSignError::InvalidInput(ref msg) => msg.clone(),
            PdfSignError::Config(_) => "Signing is not configured correctly".to_string(),
            PdfSignError::Io(_) => "The file could not be read".to_string(),
        }
    }
}
