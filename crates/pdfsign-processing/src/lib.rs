//! Document algorithms for the signing queue.
//!
//! Everything in this crate is synchronous and free of I/O: the functions take
//! PDF bytes or placement data and return new values.

pub mod annotation;
pub mod detector;
pub mod error;
pub mod pdf;
pub mod placement;
pub mod validator;

pub use annotation::{inject, read_annotations, AnnotationActor, EmbeddedAnnotation};
pub use detector::{count_existing_signatures, needs_placement};
pub use error::ProcessingError;
pub use placement::{to_wire_placement, PageRect};
pub use validator::{PdfValidator, ValidationError};
