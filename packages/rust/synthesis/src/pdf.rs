//! Plain-text extraction from captured PDFs.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use metaenrich_shared::{EnrichError, Result};

/// Extract the text of one PDF.
pub fn extract_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| EnrichError::io(path, e))?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| EnrichError::Synthesis(format!("{}: cannot extract text: {e}", path.display())))
}

/// Join the text of every document in order. Unreadable documents are
/// skipped with a warning.
pub fn documentation_text(paths: &[PathBuf]) -> String {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        match extract_text(path) {
            Ok(text) => {
                debug!(path = %path.display(), chars = text.chars().count(), "document text extracted");
                parts.push(text);
            }
            Err(e) => warn!(error = %e, "skipping unreadable document"),
        }
    }
    parts.join("\n")
}
