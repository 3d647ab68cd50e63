//! Axum route handler for the intake endpoint.

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::intake::batch::{build_batch, MAX_JOB_DESCRIPTIONS, MAX_RESUMES};
use crate::intake::models::{IntakeResult, UploadedFile};
use crate::intake::staging::{StagedFile, StagingArea};
use crate::state::AppState;

const RESUME_FIELDS: &[&str] = &["files", "resumes"];
const JD_FIELD: &str = "jd";

/// POST /extract (alias: POST /api/extract-text)
///
/// Multipart: up to 10 resume parts under `files` (or `resumes`) and at most
/// one JD part under `jd`. Extracts text, forwards it for scoring and returns
/// both. Scoring failures degrade to the fallback payload; extraction
/// failures answer 500 without calling the scoring service.
pub async fn handle_extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IntakeResult>, AppError> {
    // Early returns remove it on drop; the success path closes it below.
    let staging = StagingArea::create(&state.config.upload_dir).await?;

    let mut staged_resumes: Vec<StagedFile> = Vec::new();
    let mut staged_jd: Vec<StagedFile> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some();

        if is_file && RESUME_FIELDS.contains(&name.as_str()) {
            if staged_resumes.len() == MAX_RESUMES {
                return Err(AppError::Validation(format!(
                    "Too many resume files: at most {MAX_RESUMES} allowed"
                )));
            }
            staged_resumes.push(staging.stage_field(field).await?);
        } else if is_file && name == JD_FIELD {
            if staged_jd.len() == MAX_JOB_DESCRIPTIONS {
                return Err(AppError::Validation(format!(
                    "Too many job description files: at most {MAX_JOB_DESCRIPTIONS} allowed"
                )));
            }
            staged_jd.push(staging.stage_field(field).await?);
        } else {
            debug!("Ignoring multipart field '{name}'");
            field.bytes().await?;
        }
    }

    info!(
        "Intake request: {} resume(s), jd supplied: {}",
        staged_resumes.len(),
        !staged_jd.is_empty()
    );

    let mut resume_files: Vec<UploadedFile> = Vec::with_capacity(staged_resumes.len());
    for staged in staged_resumes {
        resume_files.push(staged.load().await?);
    }
    let jd_file = match staged_jd.pop() {
        Some(staged) => Some(staged.load().await?),
        None => None,
    };

    let batch = build_batch(resume_files, jd_file).await?;

    let outcome = state.scoring.score(&batch.resumes, &batch.jd_text).await;
    info!(
        "Resume extraction done: {} resume(s), jd {} chars, scoring degraded: {}",
        batch.resumes.len(),
        batch.jd_text.len(),
        outcome.is_degraded()
    );

    staging.close().await;

    Ok(Json(IntakeResult {
        extracted_resumes: batch.resumes,
        ai_parsed_resumes: outcome.into_payload(),
    }))
}
