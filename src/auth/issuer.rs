//! Mints access/refresh token pairs and trades refresh tokens for access tokens.
//!
//! Refresh tokens are not rotated: one refresh token can be exchanged any
//! number of times until its own `exp`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::claims::{Claims, Identity, TokenKind};
use super::codec::TokenCodec;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Fails if either lifetime is non-positive or the access lifetime
    /// exceeds the refresh lifetime.
    pub fn new(codec: Arc<TokenCodec>, access_ttl: Duration, refresh_ttl: Duration) -> anyhow::Result<Self> {
        if access_ttl <= Duration::zero() || refresh_ttl <= Duration::zero() {
            anyhow::bail!("token lifetimes must be positive");
        }
        if access_ttl > refresh_ttl {
            anyhow::bail!(
                "access token lifetime ({}s) exceeds refresh token lifetime ({}s)",
                access_ttl.num_seconds(),
                refresh_ttl.num_seconds()
            );
        }
        Ok(Self {
            codec,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn issue_token_pair(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let (access_token, _) = self.mint(identity, TokenKind::Access, now)?;
        let (refresh_token, _) = self.mint(identity, TokenKind::Refresh, now)?;

        tracing::debug!(subject = identity.id, scope = %identity.scope, "issued token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a fresh access token bound to the same
    /// subject, scope and active flag.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessToken, AppError> {
        let claims = self.codec.decode(refresh_token).map_err(|e| {
            tracing::debug!("refresh rejected: {}", e);
            AppError::Unauthorized("invalid or expired token")
        })?;

        if claims.kind != TokenKind::Refresh {
            tracing::debug!(subject = %claims.subject, "refresh rejected: not a refresh token");
            return Err(AppError::Unauthorized("invalid or expired token"));
        }

        let identity = Identity {
            id: claims
                .identity_id()
                .ok_or(AppError::Unauthorized("invalid or expired token"))?,
            username: String::new(),
            scope: claims.scope,
            is_active: claims.is_active,
        };
        let (access_token, _) = self.mint(&identity, TokenKind::Access, Utc::now())?;
        Ok(AccessToken { access_token })
    }

    /// Build, sign and return one token issued at `issued_at`.
    pub fn mint(
        &self,
        identity: &Identity,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, Claims), AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            subject: identity.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            kind,
            scope: identity.scope.clone(),
            is_active: identity.is_active,
            issued_at: issued_at.timestamp(),
            expires_at: (issued_at + ttl).timestamp(),
        };
        let token = self.codec.encode(&claims).map_err(AppError::Internal)?;
        Ok((token, claims))
    }
}
