use axum::{extract::Request, middleware::Next, response::Response};

use super::middleware::{AuthContext, Rejection};
use crate::errors::AppError;

/// Scope required by routes that change state on the crawl daemon.
pub const ADMIN_SCOPE: &str = "admin";

/// Exact match against the scope embedded at issuance. No wildcards, no
/// hierarchy, no directory lookup.
pub fn check_scope(ctx: &AuthContext, required: &str) -> Result<(), Rejection> {
    if ctx.scope == required {
        Ok(())
    } else {
        Err(Rejection::InsufficientScope)
    }
}

/// Route layer enforcing `required` on an already-authorized request.
///
/// Mount after [`require_auth`](super::middleware::require_auth):
///
/// ```ignore
/// router.route_layer(middleware::from_fn(|req: Request, next: Next| {
///     enforce_scope(ADMIN_SCOPE, req, next)
/// }))
/// ```
pub async fn enforce_scope(required: &'static str, req: Request, next: Next) -> Result<Response, AppError> {
    let ctx = req
        .extensions()
        .get::<AuthContext>()
        .ok_or(Rejection::MissingToken)?;

    if let Err(rejection) = check_scope(ctx, required) {
        tracing::warn!(
            subject = %ctx.subject,
            scope = %ctx.scope,
            required = required,
            "access denied: insufficient scope"
        );
        return Err(rejection.into());
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{Claims, TokenKind};

    fn ctx(scope: &str) -> AuthContext {
        AuthContext(Claims {
            subject: "1".into(),
            jti: "j".into(),
            kind: TokenKind::Access,
            scope: scope.into(),
            is_active: true,
            issued_at: 0,
            expires_at: i64::MAX,
        })
    }

    #[test]
    fn test_admin_scope_required() {
        assert_eq!(check_scope(&ctx("user"), ADMIN_SCOPE), Err(Rejection::InsufficientScope));
        assert_eq!(check_scope(&ctx("admin"), ADMIN_SCOPE), Ok(()));
    }

    #[test]
    fn test_no_wildcard_or_prefix_semantics() {
        assert!(check_scope(&ctx("*"), "admin").is_err());
        assert!(check_scope(&ctx("admin:*"), "admin").is_err());
        assert!(check_scope(&ctx("Admin"), "admin").is_err());
        assert!(check_scope(&ctx("admin "), "admin").is_err());
    }
}
