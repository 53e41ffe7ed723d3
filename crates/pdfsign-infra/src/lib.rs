//! PDF Signing Infrastructure Library
//!
//! Shared infrastructure for hosts of the signing queue:
//! - Telemetry initialization
//! - Export of signed documents to a directory or a ZIP archive

pub mod archive;
pub mod telemetry;

pub use archive::{archive_entry_names, create_zip_archive, write_to_dir};
pub use telemetry::{init_telemetry, LogFormat};
