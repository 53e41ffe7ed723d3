use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::file::SourceFile;
use super::placement::WirePlacement;
use crate::error::PdfSignError;

/// Description used when neither the server nor the transport provided one.
pub const OPERATION_FAILED: &str = "The operation failed";

/// Annotation metadata duplicated into the `user_text` form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserText {
    pub description: String,
    pub value: String,
}

/// Everything the signing endpoint receives for one document.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub file: SourceFile,
    /// `None` lets the server choose the position.
    pub placement: Option<WirePlacement>,
    pub profile: String,
    pub user_text: Vec<UserText>,
}

/// Raw outcome of one HTTP exchange, classified right after it arrives.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub status: u16,
    pub file: SourceFile,
    pub json: serde_json::Value,
}

impl UploadResult {
    /// Result for a request that never produced an HTTP response.
    pub fn transport_failure(file: SourceFile, description: impl Into<String>) -> Self {
        Self {
            status: 0,
            file,
            json: serde_json::json!({ "hydra:description": description.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// JSON-LD `@type` of the body, if any.
    pub fn json_type(&self) -> Option<&str> {
        self.json.get("@type").and_then(|t| t.as_str())
    }

    pub fn description(&self) -> String {
        error_description(&self.json)
    }
}

/// Best available human-readable description of a failed response body.
pub fn error_description(json: &serde_json::Value) -> String {
    const KEYS: [&str; 4] = ["hydra:description", "detail", "description", "message"];

    if let Some(text) = json.as_str().map(str::trim).filter(|s| !s.is_empty()) {
        return text.to_string();
    }

    KEYS.iter()
        .filter_map(|k| json.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| OPERATION_FAILED.to_string())
}

/// Signed document payload returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDocument {
    #[serde(rename = "@type")]
    pub json_type: String,
    #[serde(default)]
    pub identifier: Option<String>,
    pub name: String,
    /// `data:` URI carrying the base64 encoded PDF.
    pub content_url: String,
    #[serde(default)]
    pub content_size: Option<u64>,
}

impl SignedDocument {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, PdfSignError> {
        Ok(serde_json::from_value(json.clone())?)
    }

    /// Decode the embedded document bytes.
    pub fn decode_content(&self) -> Result<Bytes, PdfSignError> {
        let encoded = self
            .content_url
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| {
                PdfSignError::UnexpectedResponse("contentUrl is not a base64 data URI".into())
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                PdfSignError::UnexpectedResponse(format!("contentUrl is not valid base64: {}", e))
            })?;
        Ok(Bytes::from(bytes))
    }

    /// MIME type declared in the data URI.
    pub fn content_mime(&self) -> &str {
        self.content_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|m| !m.is_empty())
            .unwrap_or(super::file::PDF_MIME_TYPE)
    }
}

/// Entry point returned by the qualified flow's first request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningChallenge {
    #[serde(rename = "@type")]
    pub json_type: String,
    #[serde(default)]
    pub identifier: Option<String>,
    /// Page to embed for the second-factor step.
    pub url: String,
}

impl SigningChallenge {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, PdfSignError> {
        Ok(serde_json::from_value(json.clone())?)
    }
}

/// Server-confirmed signed artifact.
#[derive(Debug, Clone)]
pub struct SignedFile {
    pub id: u64,
    pub file: SourceFile,
    /// Name of the document as it was queued.
    pub source_name: String,
    pub identifier: Option<String>,
    /// HTTP status of the response that carried the signed document.
    pub status: u16,
    pub signed_at: DateTime<Utc>,
}

/// Step of the signing chain a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Placement conversion or annotation injection before anything was sent.
    Preparation,
    /// The multipart submission.
    Submission,
    /// The second-factor challenge reported an error.
    Challenge,
    /// Retrieval of the signed document after the challenge.
    ArtifactFetch,
}

impl Display for FailureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            FailureStage::Preparation => "preparation",
            FailureStage::Submission => "submission",
            FailureStage::Challenge => "challenge",
            FailureStage::ArtifactFetch => "artifact_fetch",
        };
        f.write_str(name)
    }
}

/// Failed document, kept with its original content so it can be re-queued.
#[derive(Debug, Clone)]
pub struct ErrorFile {
    pub id: u64,
    pub file: SourceFile,
    pub stage: FailureStage,
    /// HTTP status, 0 when no response was received.
    pub status: u16,
    pub description: String,
    pub failed_at: DateTime<Utc>,
}
