use tracing::debug;
use uuid::Uuid;

use crate::intake::models::{ExtractedResume, IntakeBatch, UploadedFile};
use crate::intake::reader::{extract_blocking, ExtractionError};

pub const MAX_RESUMES: usize = 10;
pub const MAX_JOB_DESCRIPTIONS: usize = 1;

/// Fresh batch-unique resume identifier.
pub fn new_resume_id() -> String {
    format!("resume-{}", Uuid::new_v4())
}

/// Extracts every resume (in arrival order) and the optional JD.
///
/// Callers enforce `MAX_RESUMES` / `MAX_JOB_DESCRIPTIONS` before calling.
/// The first extraction failure aborts the whole batch.
pub async fn build_batch(
    resume_files: Vec<UploadedFile>,
    jd_file: Option<UploadedFile>,
) -> Result<IntakeBatch, ExtractionError> {
    build_batch_with(resume_files, jd_file, new_resume_id).await
}

/// `build_batch` with an injectable id source.
pub async fn build_batch_with<F>(
    resume_files: Vec<UploadedFile>,
    jd_file: Option<UploadedFile>,
    mut next_id: F,
) -> Result<IntakeBatch, ExtractionError>
where
    F: FnMut() -> String,
{
    let mut resumes = Vec::with_capacity(resume_files.len());

    for file in resume_files {
        let filename = file.original_name.clone();
        let text = extract_blocking(file).await?;
        debug!("Extracted {} chars from '{}'", text.len(), filename);
        resumes.push(ExtractedResume {
            id: next_id(),
            filename,
            text,
        });
    }

    let jd_text = match jd_file {
        Some(file) => extract_blocking(file).await?,
        None => String::new(),
    };

    Ok(IntakeBatch { resumes, jd_text })
}
