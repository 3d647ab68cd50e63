use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::ledger::document_hash;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordHashRequest {
    pub document_id: String,
    /// Document text, hashed server-side. Mutually exclusive with `hash`.
    pub text: Option<String>,
    /// Precomputed hash value, recorded as given.
    pub hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordHashResponse {
    pub document_id: String,
    pub hash: String,
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

/// POST /api/v1/hashes
pub async fn handle_record_hash(
    State(state): State<AppState>,
    Json(request): Json<RecordHashRequest>,
) -> Result<Json<RecordHashResponse>, AppError> {
    if request.document_id.trim().is_empty() {
        return Err(AppError::Validation("document_id cannot be empty".to_string()));
    }

    let hash = match (request.text, request.hash) {
        (Some(text), None) => document_hash(&text),
        (None, Some(hash)) if !hash.trim().is_empty() => hash,
        _ => {
            return Err(AppError::Validation(
                "exactly one of text or hash must be provided".to_string(),
            ))
        }
    };

    let recorder = state
        .hash_recorder
        .clone()
        .ok_or(AppError::NotConfigured("Hash recorder"))?;

    let receipt = recorder.record(&request.document_id, &hash).await?;

    Ok(Json(RecordHashResponse {
        document_id: request.document_id,
        hash,
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        recorded_at: Utc::now(),
    }))
}
