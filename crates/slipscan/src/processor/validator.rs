//! Structural PDF check.

use serde::Serialize;

/// Longest reason kept on an invalid verdict, in characters.
pub const MAX_REASON_CHARS: usize = 200;

/// Result of a structural check. Content problems are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl AsRef<str>) -> Self {
        Self {
            valid: false,
            reason: Some(truncate_reason(reason.as_ref())),
        }
    }
}

/// Parses the bytes as a PDF and reports whether the structure is sound.
pub fn validate_bytes(bytes: &[u8]) -> Verdict {
    let _span = tracing::info_span!("processor.validate", size = bytes.len()).entered();

    match lopdf::Document::load_mem(bytes) {
        Ok(doc) if doc.get_pages().is_empty() => Verdict::invalid("document has no pages"),
        Ok(_) => Verdict::valid(),
        Err(e) => {
            log::debug!("PDF structure check failed: {}", e);
            Verdict::invalid(e.to_string())
        }
    }
}

fn truncate_reason(reason: &str) -> String {
    match reason.char_indices().nth(MAX_REASON_CHARS) {
        Some((idx, _)) => reason[..idx].to_string(),
        None => reason.to_string(),
    }
}
