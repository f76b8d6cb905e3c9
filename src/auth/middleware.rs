//! Per-request bearer-token gate.
//!
//! Stages: extract → decode → revocation check → active check → authorized.
//! Each stage returns `Result<_, Rejection>`; the first rejection
//! short-circuits and is rendered by [`AppError`]. On success the decoded
//! claims are attached to the request as an [`AuthContext`].

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use super::claims::{Claims, TokenKind};
use super::codec::CodecError;
use crate::errors::AppError;
use crate::AppState;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingToken,
    InvalidToken(CodecError),
    /// A valid token of the wrong kind (refresh token on a protected route)
    WrongKind,
    Revoked,
    AccountInactive,
    InsufficientScope,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingToken
            | Rejection::InvalidToken(_)
            | Rejection::WrongKind
            | Rejection::Revoked => StatusCode::UNAUTHORIZED,
            Rejection::AccountInactive | Rejection::InsufficientScope => StatusCode::FORBIDDEN,
        }
    }

    /// Message shown to the caller. Revoked, expired and forged tokens share
    /// one message so the response does not reveal which check failed.
    pub fn public_message(&self) -> &'static str {
        match self {
            Rejection::MissingToken => "missing token",
            Rejection::InvalidToken(_) | Rejection::WrongKind | Rejection::Revoked => {
                "invalid or expired token"
            }
            Rejection::AccountInactive => "account inactive",
            Rejection::InsufficientScope => "insufficient scope",
        }
    }
}

/// Claims of an authorized request.
#[derive(Debug, Clone)]
pub struct AuthContext(pub Claims);

impl std::ops::Deref for AuthContext {
    type Target = Claims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| Rejection::MissingToken.into())
    }
}

// ── Stages ───────────────────────────────────────────────────

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(Rejection::MissingToken)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(Rejection::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(Rejection::MissingToken);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(Rejection::MissingToken);
    }
    Ok(token)
}

fn decode_access(state: &AppState, token: &str) -> Result<Claims, Rejection> {
    let claims = state
        .issuer
        .codec()
        .decode(token)
        .map_err(Rejection::InvalidToken)?;
    if claims.kind != TokenKind::Access {
        return Err(Rejection::WrongKind);
    }
    Ok(claims)
}

async fn check_revocation(state: &AppState, claims: &Claims) -> Result<Result<(), Rejection>, AppError> {
    if state.revocations.contains(&claims.jti).await? {
        return Ok(Err(Rejection::Revoked));
    }
    Ok(Ok(()))
}

async fn check_active(state: &AppState, claims: &Claims) -> Result<Result<(), Rejection>, AppError> {
    if !claims.is_active {
        return Ok(Err(Rejection::AccountInactive));
    }
    let Some(id) = claims.identity_id() else {
        return Ok(Err(Rejection::InvalidToken(CodecError::Malformed)));
    };
    match state.directory.find_by_id(id).await? {
        Some(identity) if identity.is_active => Ok(Ok(())),
        _ => Ok(Err(Rejection::AccountInactive)),
    }
}

/// Run every stage against `headers`.
///
/// The outer `Result` carries infrastructure failures (revocation backend,
/// directory); the inner one is the authorization outcome.
pub async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<Result<AuthContext, Rejection>, AppError> {
    let token = match extract_bearer(headers) {
        Ok(token) => token,
        Err(r) => return Ok(Err(r)),
    };
    let claims = match decode_access(state, token) {
        Ok(claims) => claims,
        Err(r) => return Ok(Err(r)),
    };
    if let Err(r) = check_revocation(state, &claims).await? {
        return Ok(Err(r));
    }
    if let Err(r) = check_active(state, &claims).await? {
        return Ok(Err(r));
    }
    Ok(Ok(AuthContext(claims)))
}

/// Middleware: rejects the request unless it carries a valid, unrevoked
/// access token for an active identity.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let outcome = authorize(&state, req.headers()).await?;
    match outcome {
        Ok(ctx) => {
            tracing::debug!(subject = %ctx.subject, scope = %ctx.scope, "request authorized");
            req.extensions_mut().insert(ctx);
            Ok(next.run(req).await)
        }
        Err(rejection) => {
            tracing::warn!(
                path = %req.uri().path(),
                reason = ?rejection,
                "auth: request rejected"
            );
            Err(rejection.into())
        }
    }
}
