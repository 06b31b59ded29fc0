use serde::{Deserialize, Serialize};

pub type DownloadId = u32;

pub const PDF_MIME: &str = "application/pdf";

/// A download-start notification from the host. Consumed once, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadEvent {
    pub id: DownloadId,
    pub url: String,
    pub mime_type: String,
}

impl DownloadEvent {
    pub fn new(id: DownloadId, url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    InProgress,
    Interrupted,
    Complete,
}

/// True for `application/pdf`, ignoring parameters and case.
pub fn is_pdf_mime(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    essence.eq_ignore_ascii_case(PDF_MIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_mime_ignores_parameters_and_case() {
        assert!(is_pdf_mime("application/pdf"));
        assert!(is_pdf_mime("Application/PDF; charset=binary"));
        assert!(!is_pdf_mime("application/octet-stream"));
        assert!(!is_pdf_mime(""));
    }
}
