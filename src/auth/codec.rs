//! HS256 token codec over a process-wide signing secret.
//!
//! `decode` verifies the signature before any claim is read, then checks
//! `exp` against the wall clock with zero leeway.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use super::claims::Claims;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn encode(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?;
        Ok(token)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, CodecError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    CodecError::InvalidSignature
                }
                ErrorKind::ExpiredSignature => CodecError::Expired,
                _ => CodecError::Malformed,
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenKind;
    use base64::Engine;
    use chrono::Utc;

    const SECRET: &[u8] = b"test-secret-that-is-long-enough-0123456789";

    fn claims_expiring_in(secs: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            subject: "7".into(),
            jti: uuid::Uuid::new_v4().to_string(),
            kind: TokenKind::Access,
            scope: "user".into(),
            is_active: true,
            issued_at: now,
            expires_at: now + secs,
        }
    }

    #[test]
    fn test_round_trip() {
        let codec = TokenCodec::new(SECRET);
        let claims = claims_expiring_in(3600);
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn test_wrong_key_is_invalid_signature() {
        let token = TokenCodec::new(SECRET).encode(&claims_expiring_in(3600)).unwrap();
        let other = TokenCodec::new(b"another-secret-entirely-0123456789abcdef");
        assert_eq!(other.decode(&token), Err(CodecError::InvalidSignature));
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.encode(&claims_expiring_in(-5)).unwrap();
        assert_eq!(codec.decode(&token), Err(CodecError::Expired));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new(SECRET);
        assert_eq!(codec.decode("not-a-jwt"), Err(CodecError::Malformed));
        assert_eq!(codec.decode(""), Err(CodecError::Malformed));
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.encode(&claims_expiring_in(3600)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let mut payload: serde_json::Value =
            serde_json::from_slice(&engine.decode(parts[1]).unwrap()).unwrap();
        payload["scope"] = "admin".into();
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            engine.encode(serde_json::to_vec(&payload).unwrap()),
            parts[2]
        );

        assert_eq!(codec.decode(&forged), Err(CodecError::InvalidSignature));
    }

    #[test]
    fn test_expired_token_with_bad_signature_is_not_reported_as_expired() {
        // signature is checked before any claim, expiry included
        let token = TokenCodec::new(SECRET).encode(&claims_expiring_in(-5)).unwrap();
        let other = TokenCodec::new(b"another-secret-entirely-0123456789abcdef");
        assert_eq!(other.decode(&token), Err(CodecError::InvalidSignature));
    }
}
