use pdfsign_core::models::{SourceFile, PDF_MIME_TYPE};
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Reasons a picked file is refused before it reaches the queue
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {0} (allowed: pdf)")]
    InvalidExtension(String),

    #[error("Invalid content type: {0} (allowed: application/pdf)")]
    InvalidContentType(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File does not start with a PDF header")]
    NotAPdf,

    #[error("Empty file")]
    EmptyFile,
}

/// Intake checks for documents offered to the signing queue.
pub struct PdfValidator {
    max_file_size: usize,
}

impl PdfValidator {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if extension != "pdf" {
            return Err(ValidationError::InvalidExtension(extension));
        }

        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        // Ignore parameters such as "; charset=binary"
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        if essence != PDF_MIME_TYPE {
            return Err(ValidationError::InvalidContentType(content_type.to_string()));
        }

        Ok(())
    }

    /// Content sniffing: the bytes must start with the `%PDF-` header.
    pub fn validate_magic(&self, bytes: &[u8]) -> Result<(), ValidationError> {
        if bytes.starts_with(PDF_MAGIC) {
            Ok(())
        } else {
            Err(ValidationError::NotAPdf)
        }
    }

    pub fn validate(&self, file: &SourceFile) -> Result<(), ValidationError> {
        self.validate_file_size(file.size())?;
        self.validate_extension(&file.name)?;
        self.validate_content_type(&file.mime)?;
        self.validate_magic(&file.bytes)?;
        Ok(())
    }
}
