//! PDF Signing Core Library
//!
//! This crate provides the domain models, error types, configuration and the
//! backend seam shared by the processing, client and worker crates.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use auth::{auth_channel, AuthContext, AuthReceiver, AuthSender};
pub use backend::SigningBackend;
pub use config::{FlowKind, Lang, SigningConfig};
pub use error::{ErrorMetadata, LogLevel, PdfSignError};
