pub mod annotation;
pub mod file;
pub mod placement;
pub mod queue;
pub mod upload;

pub use annotation::{
    annotation_type, annotation_types, AnnotationField, AnnotationRow, AnnotationType,
    LocalizedName,
};
pub use file::{SourceFile, PDF_MIME_TYPE};
pub use placement::{PlacementData, Rotation, WirePlacement};
pub use queue::{PlacementMode, QueueEntry, QueueKey};
pub use upload::{
    error_description, ErrorFile, FailureStage, SignedDocument, SignedFile, SigningChallenge,
    SigningRequest, UploadResult, UserText, OPERATION_FAILED,
};
