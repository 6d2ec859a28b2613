//! Auth routes: register, login, refresh, logout.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::extractors::{AuthUser, JsonBody};
use crate::services::{AuthService, Registration, TokenPair};
use crate::AppState;
use stockline_core::Tenant;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub business_name: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub tenant: Tenant,
}

/// POST /auth/register - Create a tenant and its admin
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (tenant, tokens) = AuthService::new(&state)
        .register(Registration {
            business_name: &req.business_name,
            full_name: &req.full_name,
            email: &req.email,
            password: &req.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { tokens, tenant })))
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = AuthService::new(&state).login(&req.email, &req.password).await?;
    Ok(Json(tokens))
}

/// POST /auth/refresh - Rotate a refresh token
async fn refresh(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = AuthService::new(&state).refresh(&req.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /auth/logout - Body is optional
async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::Validation(e.to_string()))?
    };

    let revoked = AuthService::new(&state)
        .logout(&user.id, req.refresh_token.as_deref())
        .await?;

    Ok(Json(json!({ "message": "Logged out", "revoked_tokens": revoked })))
}
