//! Text extraction for uploaded documents.
//!
//! Ingestion supplies raw bytes plus the declared file type; this module
//! returns plain UTF-8 text or a typed error. Upload validation (extension
//! allow-list, size cap) lives here too so it runs before any other work.

use crate::config::UploadConfig;
use crate::error::{RagError, Result};

/// Check a file's extension and size against the upload policy.
/// Returns the lowercased extension on success.
pub fn validate_upload(filename: &str, size_bytes: u64, config: &UploadConfig) -> Result<String> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();

    if !config.allowed_extensions.iter().any(|a| a == &ext) {
        return Err(RagError::UnsupportedType(ext));
    }

    let max_bytes = config.max_file_mb * 1024 * 1024;
    if size_bytes > max_bytes {
        return Err(RagError::Validation(format!(
            "file too large: maximum size is {}MB",
            config.max_file_mb
        )));
    }

    Ok(ext)
}

/// Extract plain text from file content.
pub fn extract_text(bytes: &[u8], file_type: &str) -> Result<String> {
    match file_type {
        "pdf" => extract_pdf(bytes),
        "txt" | "md" => Ok(extract_plain(bytes)),
        other => Err(RagError::UnsupportedType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::ExtractionFailed(e.to_string()))
}

/// Plain-text files are read lossily: invalid UTF-8 sequences are replaced
/// rather than failing the whole upload.
fn extract_plain(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
