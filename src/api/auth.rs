use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use super::forms::CredentialsForm;
use crate::auth::middleware::extract_bearer;
use crate::auth::{AccessToken, AuthContext, RevocationRecord, TokenPair};
use crate::directory::DEFAULT_SCOPE;
use crate::errors::AppError;
use crate::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub scope: String,
}

fn parse_body(payload: Result<Json<CredentialsForm>, JsonRejection>) -> Result<CredentialsForm, AppError> {
    payload.map(|Json(form)| form).map_err(|e| {
        tracing::debug!("unparseable credentials body: {}", e);
        AppError::Validation("invalid request body".into())
    })
}

/// POST /login: exchange credentials for an access/refresh pair
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsForm>, JsonRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let creds = parse_body(payload)?.validate()?;

    let identity = state
        .directory
        .verify(&creds.username, &creds.password)
        .await?
        .ok_or_else(|| {
            tracing::warn!(username = %creds.username, "login failed: bad credentials");
            AppError::InvalidCredentials
        })?;

    if !identity.is_active {
        tracing::warn!(user_id = identity.id, "login refused: account inactive");
        return Err(AppError::Forbidden("account inactive"));
    }

    let pair = state.issuer.issue_token_pair(&identity)?;
    tracing::info!(user_id = identity.id, "user logged in");
    Ok(Json(pair))
}

/// POST /register: create a user with the default scope
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let creds = parse_body(payload)?.validate()?;

    let identity = state
        .directory
        .register(&creds.username, &creds.password, DEFAULT_SCOPE)
        .await?;

    tracing::info!(user_id = identity.id, "user registered");
    Ok((StatusCode::CREATED, Json(json!({ "msg": "registered" }))))
}

/// POST /refresh: `Authorization: Bearer <refresh_token>`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AccessToken>, AppError> {
    let token = extract_bearer(&headers)?;
    let fresh = state.issuer.refresh(token)?;
    Ok(Json(fresh))
}

/// POST /logout: revoke the presented access token
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
) -> Result<Json<Value>, AppError> {
    state
        .revocations
        .add(RevocationRecord::new(ctx.jti.clone(), ctx.expires_at_utc()))
        .await?;

    tracing::info!(subject = %ctx.subject, "user logged out");
    Ok(Json(json!({ "msg": "logged out" })))
}

/// GET /profile: summary of the authenticated identity
pub async fn profile(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
) -> Result<Json<ProfileResponse>, AppError> {
    let id = ctx
        .identity_id()
        .ok_or(AppError::Unauthorized("invalid or expired token"))?;
    let identity = state
        .directory
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user not found"))?;

    Ok(Json(ProfileResponse {
        id: identity.id,
        username: identity.username,
        scope: identity.scope,
    }))
}
