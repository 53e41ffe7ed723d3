//! Export of signed documents.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pdfsign_core::models::SignedFile;

/// Sanitize filename for archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Make `name` unique within `taken` by appending `-2`, `-3`, ... before the extension.
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }

    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("signed")
        .to_string();
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_string);

    let mut n = 2;
    loop {
        let candidate = match &extension {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Output names for `files`, sanitized and de-duplicated, in input order.
pub fn archive_entry_names(files: &[SignedFile]) -> Vec<String> {
    let mut taken = HashSet::new();
    files
        .iter()
        .map(|f| {
            let safe = sanitize_filename(&f.file.name, &format!("signed_{}.pdf", f.id));
            unique_name(safe, &mut taken)
        })
        .collect()
}

/// Create a ZIP archive containing every signed document.
pub fn create_zip_archive(files: &[SignedFile]) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (file, name) in files.iter().zip(archive_entry_names(files)) {
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("Failed to add file to ZIP: {}", name))?;
            zip.write_all(&file.file.bytes)
                .with_context(|| format!("Failed to write file data to ZIP: {}", name))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    tracing::debug!(files = files.len(), size = buffer.len(), "Created ZIP archive");
    Ok(buffer)
}

/// Write every signed document into `dir`, creating it if needed.
pub fn write_to_dir(files: &[SignedFile], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    files
        .iter()
        .zip(archive_entry_names(files))
        .map(|(file, name)| -> Result<PathBuf> {
            let path = dir.join(&name);
            std::fs::write(&path, &file.file.bytes)
                .with_context(|| format!("Failed to write signed file: {}", path.display()))?;
            tracing::info!(path = %path.display(), source = %file.source_name, "Signed file written");
            Ok(path)
        })
        .collect()
}
