//! Flow-specific behavior plugged into the shared orchestrator.

use std::sync::Arc;

use pdfsign_core::models::{
    FailureStage, SignedDocument, SigningChallenge, UploadResult, OPERATION_FAILED,
};
use pdfsign_core::FlowKind;

pub const OFFICIALLY_SIGNED_TYPE: &str = "OfficiallySignedDocument";
pub const QUALIFIED_REQUEST_TYPE: &str = "QualifiedSigningRequest";
pub const QUALIFIED_SIGNED_TYPE: &str = "QualifiedlySignedDocument";

/// Classified server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Signed {
        document: SignedDocument,
        status: u16,
    },
    /// Qualified flow only: a second factor must be confirmed first.
    Challenge(SigningChallenge),
    Failed {
        stage: FailureStage,
        status: u16,
        description: String,
    },
}

impl SubmissionOutcome {
    fn failed(stage: FailureStage, result: &UploadResult) -> Self {
        SubmissionOutcome::Failed {
            stage,
            status: result.status,
            description: result.description(),
        }
    }
}

pub trait SigningStrategy: Send + Sync {
    fn flow(&self) -> FlowKind;

    /// Profile identifier sent with every upload.
    fn profile(&self) -> &'static str {
        self.flow().profile()
    }

    /// Classify the response to the multipart submission.
    fn classify_submission(&self, result: &UploadResult) -> SubmissionOutcome;

    /// Classify the response of the second step. Only the qualified flow has one.
    fn classify_artifact(&self, result: &UploadResult) -> SubmissionOutcome {
        SubmissionOutcome::failed(FailureStage::ArtifactFetch, result)
    }
}

fn signed_document(
    result: &UploadResult,
    expected_type: &str,
    stage: FailureStage,
) -> SubmissionOutcome {
    if !result.is_success() || result.json_type() != Some(expected_type) {
        return SubmissionOutcome::failed(stage, result);
    }

    match SignedDocument::from_json(&result.json) {
        Ok(document) => SubmissionOutcome::Signed {
            document,
            status: result.status,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Signed document payload could not be decoded");
            SubmissionOutcome::Failed {
                stage,
                status: result.status,
                description: OPERATION_FAILED.to_string(),
            }
        }
    }
}

/// Server-side seal: the submission response carries the signed document.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfficialStrategy;

impl SigningStrategy for OfficialStrategy {
    fn flow(&self) -> FlowKind {
        FlowKind::Official
    }

    fn classify_submission(&self, result: &UploadResult) -> SubmissionOutcome {
        if result.status != 201 {
            return SubmissionOutcome::failed(FailureStage::Submission, result);
        }
        signed_document(result, OFFICIALLY_SIGNED_TYPE, FailureStage::Submission)
    }
}

/// Qualified signature: the submission opens a challenge, the second step
/// returns the signed document.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualifiedStrategy;

impl SigningStrategy for QualifiedStrategy {
    fn flow(&self) -> FlowKind {
        FlowKind::Qualified
    }

    fn classify_submission(&self, result: &UploadResult) -> SubmissionOutcome {
        if result.status != 201 || result.json_type() != Some(QUALIFIED_REQUEST_TYPE) {
            return SubmissionOutcome::failed(FailureStage::Submission, result);
        }

        match SigningChallenge::from_json(&result.json) {
            Ok(challenge) => SubmissionOutcome::Challenge(challenge),
            Err(e) => {
                tracing::warn!(error = %e, "Challenge payload could not be decoded");
                SubmissionOutcome::Failed {
                    stage: FailureStage::Submission,
                    status: result.status,
                    description: OPERATION_FAILED.to_string(),
                }
            }
        }
    }

    fn classify_artifact(&self, result: &UploadResult) -> SubmissionOutcome {
        signed_document(result, QUALIFIED_SIGNED_TYPE, FailureStage::ArtifactFetch)
    }
}

pub fn strategy_for(flow: FlowKind) -> Arc<dyn SigningStrategy> {
    match flow {
        FlowKind::Official => Arc::new(OfficialStrategy),
        FlowKind::Qualified => Arc::new(QualifiedStrategy),
    }
}
