use bytes::Bytes;
use std::path::Path;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Binary document with the name and MIME type it was picked with.
///
/// Content is held in [`Bytes`] so snapshots for cancel/re-queue and error
/// records share the buffer instead of copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn pdf(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::new(name, PDF_MIME_TYPE, bytes)
    }

    /// Read a file from disk. The MIME type is derived from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        let mime = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MIME_TYPE,
            _ => "application/octet-stream",
        };
        Ok(Self::new(name, mime, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Same name and MIME type with new content.
    pub fn with_bytes(&self, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: self.name.clone(),
            mime: self.mime.clone(),
            bytes: bytes.into(),
        }
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}
