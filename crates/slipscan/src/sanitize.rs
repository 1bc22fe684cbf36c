//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Uploaded file names and storage layout stay out of spans; only the
//! final path component is recorded.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
