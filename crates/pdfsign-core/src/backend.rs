//! Signing backend trait.
//!
//! The HTTP client implements this trait; the orchestrator only talks to the
//! remote service through it, which keeps the queue logic testable without a
//! server.

use async_trait::async_trait;

use crate::error::PdfSignError;
use crate::models::{SigningRequest, SourceFile, UploadResult};

/// Remote signing service.
///
/// Both methods return `Ok` for every HTTP response, including non-2xx ones;
/// `Err` is reserved for requests that never produced a response.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Submit one document with its placement, profile and annotation metadata.
    async fn submit(&self, request: SigningRequest, token: &str)
        -> Result<UploadResult, PdfSignError>;

    /// Retrieve the signed artifact of a completed second-factor session.
    async fn fetch_artifact(
        &self,
        session_id: &str,
        file: &SourceFile,
        token: &str,
    ) -> Result<UploadResult, PdfSignError>;
}
