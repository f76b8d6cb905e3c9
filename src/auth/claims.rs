//! Token claim set and the identity it is minted for.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claim set carried by every bearer token.
///
/// Field names on the wire follow JWT conventions (`sub`, `iat`, `exp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity id, as a string
    #[serde(rename = "sub")]
    pub subject: String,
    /// Unique token id, used as the revocation key
    pub jti: String,
    pub kind: TokenKind,
    pub scope: String,
    pub is_active: bool,
    /// Issued at (Unix seconds)
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiration (Unix seconds)
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.expires_at, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Identity id parsed from `sub`. `None` if the subject is not numeric.
    pub fn identity_id(&self) -> Option<i64> {
        self.subject.parse().ok()
    }
}

/// Read-only view of a directory user, as the auth core sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub scope: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Claims {
        Claims {
            subject: "42".into(),
            jti: "b7c1".into(),
            kind: TokenKind::Refresh,
            scope: "admin".into(),
            is_active: true,
            issued_at: 1_700_000_000,
            expires_at: 1_700_003_600,
        }
    }

    #[test]
    fn test_wire_names_follow_jwt_conventions() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sub"], "42");
        assert_eq!(json["kind"], "refresh");
        assert_eq!(json["iat"], 1_700_000_000);
        assert_eq!(json["exp"], 1_700_003_600);
        assert!(json.get("subject").is_none());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["kind"] = "id_token".into();
        assert!(serde_json::from_value::<Claims>(json).is_err());
    }

    #[test]
    fn test_expires_at_utc() {
        assert_eq!(sample().expires_at_utc().timestamp(), 1_700_003_600);
    }

    #[test]
    fn test_identity_id_parsing() {
        assert_eq!(sample().identity_id(), Some(42));
        let mut claims = sample();
        claims.subject = "not-a-number".into();
        assert_eq!(claims.identity_id(), None);
    }
}
