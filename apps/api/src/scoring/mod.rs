//! Scoring Gateway — forwards an extracted batch to the external scoring service.
//!
//! A failed call never becomes a request error: it degrades to the fixed
//! fallback payload. `ScoringOutcome` keeps the two cases distinguishable for
//! callers while the response body shape stays the same.
//!
//! `AppState` holds an `Arc<dyn ScoringGateway>`, so tests can swap in fakes.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::intake::models::ExtractedResume;

pub const FALLBACK_MESSAGE: &str = "AI scoring failed";

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scoring service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Result of one scoring attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringOutcome {
    /// Response body from the scoring service, passed through untouched.
    Scored(Value),
    /// The call failed; carries the fallback payload.
    Degraded(Value),
}

impl ScoringOutcome {
    pub fn degraded() -> Self {
        ScoringOutcome::Degraded(fallback_payload())
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ScoringOutcome::Degraded(_))
    }

    pub fn into_payload(self) -> Value {
        match self {
            ScoringOutcome::Scored(v) | ScoringOutcome::Degraded(v) => v,
        }
    }
}

/// `{ "message": "AI scoring failed", "score": null }`
pub fn fallback_payload() -> Value {
    json!({ "message": FALLBACK_MESSAGE, "score": null })
}

#[async_trait]
pub trait ScoringGateway: Send + Sync {
    async fn score(&self, resumes: &[ExtractedResume], jd_text: &str) -> ScoringOutcome;
}

#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    resumes: &'a [ExtractedResume],
    job_description: &'a str,
}

/// Single best-effort POST to the configured scoring endpoint. No retries.
#[derive(Clone)]
pub struct HttpScoringGateway {
    client: Client,
    url: String,
}

impl HttpScoringGateway {
    pub fn new(url: String, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build().context("Failed to build scoring HTTP client")?,
            url,
        })
    }

    async fn post(&self, resumes: &[ExtractedResume], jd_text: &str) -> Result<Value, ScoringError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ScoreRequest {
                resumes,
                job_description: jd_text,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ScoringError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Non-JSON bodies are passed through as a JSON string.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[async_trait]
impl ScoringGateway for HttpScoringGateway {
    async fn score(&self, resumes: &[ExtractedResume], jd_text: &str) -> ScoringOutcome {
        match self.post(resumes, jd_text).await {
            Ok(payload) => {
                debug!("Scoring service answered for {} resumes", resumes.len());
                ScoringOutcome::Scored(payload)
            }
            Err(e) => {
                warn!("AI model error: {e}");
                ScoringOutcome::degraded()
            }
        }
    }
}
