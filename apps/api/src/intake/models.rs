use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One uploaded document, owned by the request that received it.
/// `declared_type` and `original_name` come from the client and are untrusted.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub content: Bytes,
    pub declared_type: String,
    pub original_name: String,
}

impl UploadedFile {
    pub fn new(
        content: impl Into<Bytes>,
        declared_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            declared_type: declared_type.into(),
            original_name: original_name.into(),
        }
    }
}

/// Text extracted from one accepted resume file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedResume {
    pub id: String,
    pub filename: String,
    pub text: String,
}

/// Output of the batch coordinator: resumes in arrival order plus the JD text
/// (empty when no JD was supplied).
#[derive(Debug, Clone, Default)]
pub struct IntakeBatch {
    pub resumes: Vec<ExtractedResume>,
    pub jd_text: String,
}

/// Success body of the intake endpoint.
#[derive(Debug, Serialize)]
pub struct IntakeResult {
    pub extracted_resumes: Vec<ExtractedResume>,
    pub ai_parsed_resumes: serde_json::Value,
}
