//! Bearer-token authentication for the admin surface.
//!
//! Flow:
//! 1. `/login` verifies credentials against the [`UserDirectory`](crate::directory::UserDirectory)
//!    and mints an access/refresh pair via [`TokenIssuer`]
//! 2. Protected routes run [`middleware::require_auth`], which decodes the access
//!    token, consults the [`RevocationStore`] and the directory, then attaches an
//!    [`AuthContext`] to the request
//! 3. Mutating routes additionally run [`guard::enforce_scope`]
//! 4. `/logout` revokes the current access token's `jti`; `/refresh` trades a
//!    refresh token for a new access token

pub mod claims;
pub mod codec;
pub mod guard;
pub mod issuer;
pub mod middleware;
pub mod revocation;

pub use claims::{Claims, Identity, TokenKind};
pub use codec::{CodecError, TokenCodec};
pub use guard::{check_scope, enforce_scope, ADMIN_SCOPE};
pub use issuer::{AccessToken, TokenIssuer, TokenPair};
pub use middleware::{require_auth, AuthContext, Rejection};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationRecord, RevocationStore};
