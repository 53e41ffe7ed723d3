use pdfsign_core::PdfSignError;

use crate::validator::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Failed to write PDF: {0}")]
    Write(String),

    #[error("Page {page} does not exist (document has {count} pages)")]
    PageOutOfRange { page: u32, count: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<lopdf::Error> for ProcessingError {
    fn from(err: lopdf::Error) -> Self {
        ProcessingError::Parse(err.to_string())
    }
}

impl From<ProcessingError> for PdfSignError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Parse(msg) | ProcessingError::Write(msg) => PdfSignError::PdfParse(msg),
            ProcessingError::PageOutOfRange { page, count } => PdfSignError::InvalidPlacement(
                format!("Page {} does not exist (document has {} pages)", page, count),
            ),
            ProcessingError::Validation(e) => PdfSignError::InvalidInput(e.to_string()),
        }
    }
}
