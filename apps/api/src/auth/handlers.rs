use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{AuthProvider, Credentials};
use crate::errors::AppError;
use crate::state::AppState;

fn provider(state: &AppState) -> Result<Arc<dyn AuthProvider>, AppError> {
    state
        .auth
        .clone()
        .ok_or(AppError::NotConfigured("Auth provider"))
}

fn validate(credentials: &Credentials) -> Result<(), AppError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// POST /auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    validate(&credentials)?;
    let user = provider(&state)?.register(&credentials).await?;
    info!("Registered new account");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Signup successful", "user": user })),
    ))
}

/// POST /auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Value>, AppError> {
    validate(&credentials)?;
    let session = provider(&state)?.login(&credentials).await?;
    Ok(Json(json!({ "message": "Login successful", "session": session })))
}

/// POST /auth/logout (alias: /auth/log-out)
///
/// Expects `Authorization: Bearer <access_token>` from a prior login.
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    provider(&state)?.logout(token).await?;
    Ok(Json(json!({ "message": "Logout successful" })))
}
