//! Auth pass-through to the hosted identity provider.
//!
//! The service stores no users or sessions itself. `SupabaseAuth` speaks the
//! provider's REST API; `AppState` carries it as `Arc<dyn AuthProvider>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::SupabaseConfig;

pub mod handlers;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider refused the request (bad credentials, duplicate user, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates an account. Returns the provider's user object.
    async fn register(&self, credentials: &Credentials) -> Result<Value, AuthError>;

    /// Password sign-in. Returns the provider's session object.
    async fn login(&self, credentials: &Credentials) -> Result<Value, AuthError>;

    /// Revokes the session identified by `access_token`.
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;
}

#[derive(Clone)]
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .context("Failed to build auth HTTP client")?,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn request(&self, path: &str, bearer: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/auth/v1/{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn register(&self, credentials: &Credentials) -> Result<Value, AuthError> {
        let response = self
            .request("signup", &self.anon_key)
            .json(credentials)
            .send()
            .await?;
        let body = json_or_error(response).await?;
        debug!("Provider accepted signup");

        // With email confirmation off the provider answers with a session
        // wrapping the user; otherwise with the bare user.
        Ok(body.get("user").cloned().unwrap_or(body))
    }

    async fn login(&self, credentials: &Credentials) -> Result<Value, AuthError> {
        let response = self
            .request("token?grant_type=password", &self.anon_key)
            .json(credentials)
            .send()
            .await?;
        json_or_error(response).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self.request("logout", access_token).send().await?;
        json_or_error(response).await.map(|_| ())
    }
}

async fn json_or_error(response: Response) -> Result<Value, AuthError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(body);
    }

    let message = provider_message(&body).unwrap_or(text);
    if status.is_client_error() {
        Err(AuthError::Rejected(message))
    } else {
        Err(AuthError::Provider {
            status: status.as_u16(),
            message,
        })
    }
}

/// Picks the human-readable message out of the provider's error shapes.
fn provider_message(body: &Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(String::from)
}
