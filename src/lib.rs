//! crawldeck: authenticated admin backend for Scrapyd crawl daemons.
//!
//! The binary in `main.rs` wires these modules together; integration tests
//! in `tests/` drive the router directly.

use std::sync::Arc;

use chrono::Duration;

pub mod api;
pub mod auth;
pub mod config;
pub mod directory;
pub mod errors;
pub mod jobs;
pub mod scrapyd;

use auth::{RevocationStore, TokenCodec, TokenIssuer};
use directory::UserDirectory;
use scrapyd::client::BasicAuth;
use scrapyd::ScrapydClient;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: config::Config,
    pub issuer: TokenIssuer,
    pub revocations: Arc<dyn RevocationStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub scrapyd: ScrapydClient,
}

impl AppState {
    /// Derive the codec, issuer and daemon client from `config`.
    pub fn new(
        config: config::Config,
        directory: Arc<dyn UserDirectory>,
        revocations: Arc<dyn RevocationStore>,
    ) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(config.jwt_secret.as_bytes()));
        let issuer = TokenIssuer::new(
            codec,
            Duration::seconds(config.access_ttl_secs),
            Duration::seconds(config.refresh_ttl_secs),
        )?;

        let auth = config.scrapyd_username.clone().map(|username| BasicAuth {
            username,
            password: config.scrapyd_password.clone(),
        });
        let scrapyd = ScrapydClient::new(&config.scrapyd_url, auth)?;

        Ok(Self {
            config,
            issuer,
            revocations,
            directory,
            scrapyd,
        })
    }
}
