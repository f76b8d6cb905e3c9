use rand::RngCore;
use zeroize::Zeroizing;

/// Minimum signing secret length accepted in production.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

pub struct Config {
    pub host: String,
    pub port: u16,
    /// HS256 signing secret. Fixed for the process lifetime.
    pub jwt_secret: Zeroizing<String>,
    /// Access token lifetime in seconds. Default: 3600.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds. Default: 7 days.
    pub refresh_ttl_secs: i64,
    /// Postgres user directory. Without it an in-memory directory is used.
    pub database_url: Option<String>,
    /// Shared revocation store. Without it revocations are process-local.
    pub redis_url: Option<String>,
    /// How often expired revocation records are pruned, in seconds.
    pub revocation_sweep_secs: u64,
    pub scrapyd_url: String,
    pub scrapyd_username: Option<String>,
    pub scrapyd_password: Option<String>,
    pub dashboard_origin: String,
    pub production: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("database", &self.database_url.is_some())
            .field("redis", &self.redis_url.is_some())
            .field("scrapyd_url", &self.scrapyd_url)
            .field("production", &self.production)
            .finish_non_exhaustive()
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a [`Config`] from any key lookup (the environment in production,
/// a map in tests).
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let env_mode = get("CRAWLDECK_ENV")
        .or_else(|| get("RUST_ENV"))
        .unwrap_or_default();
    let production = env_mode == "production";

    let jwt_secret = match get("CRAWLDECK_JWT_SECRET").filter(|s| !s.is_empty()) {
        Some(secret) => {
            if production && secret.len() < MIN_JWT_SECRET_LENGTH {
                anyhow::bail!(
                    "CRAWLDECK_JWT_SECRET must be at least {} bytes in production",
                    MIN_JWT_SECRET_LENGTH
                );
            }
            secret
        }
        None if production => {
            anyhow::bail!("CRAWLDECK_JWT_SECRET is not set. Refusing to start in production.");
        }
        None => {
            eprintln!("⚠️  CRAWLDECK_JWT_SECRET is not set, using an ephemeral random secret. Tokens will not survive a restart.");
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
    };

    let access_ttl_secs = parse_or(&get, "CRAWLDECK_ACCESS_TTL_SECS", 3600i64);
    let refresh_ttl_secs = parse_or(&get, "CRAWLDECK_REFRESH_TTL_SECS", 7 * 24 * 3600i64);
    if access_ttl_secs <= 0 || refresh_ttl_secs <= 0 {
        anyhow::bail!("token lifetimes must be positive");
    }
    if access_ttl_secs > refresh_ttl_secs {
        anyhow::bail!(
            "CRAWLDECK_ACCESS_TTL_SECS ({}) must not exceed CRAWLDECK_REFRESH_TTL_SECS ({})",
            access_ttl_secs,
            refresh_ttl_secs
        );
    }

    let scrapyd_url = get("SCRAPYD_URL").unwrap_or_else(|| "http://127.0.0.1:6800".into());
    url::Url::parse(&scrapyd_url)
        .map_err(|e| anyhow::anyhow!("SCRAPYD_URL '{}' is not a valid URL: {}", scrapyd_url, e))?;

    Ok(Config {
        host: get("CRAWLDECK_HOST").unwrap_or_else(|| "0.0.0.0".into()),
        port: parse_or(&get, "CRAWLDECK_PORT", 9331u16),
        jwt_secret: Zeroizing::new(jwt_secret),
        access_ttl_secs,
        refresh_ttl_secs,
        database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
        redis_url: get("REDIS_URL").filter(|s| !s.is_empty()),
        revocation_sweep_secs: parse_or(&get, "CRAWLDECK_REVOCATION_SWEEP_SECS", 300u64).max(1),
        scrapyd_url,
        scrapyd_username: get("SCRAPYD_USERNAME").filter(|s| !s.is_empty()),
        scrapyd_password: get("SCRAPYD_PASSWORD"),
        dashboard_origin: get("DASHBOARD_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into()),
        production,
    })
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 9331);
        assert_eq!(cfg.access_ttl_secs, 3600);
        assert_eq!(cfg.refresh_ttl_secs, 604_800);
        assert_eq!(cfg.jwt_secret.len(), 64); // random 32 bytes, hex
        assert!(cfg.database_url.is_none());
        assert!(!cfg.production);
    }

    #[test]
    fn test_production_requires_strong_secret() {
        assert!(from_lookup(lookup(&[("CRAWLDECK_ENV", "production")])).is_err());
        assert!(from_lookup(lookup(&[
            ("CRAWLDECK_ENV", "production"),
            ("CRAWLDECK_JWT_SECRET", "short"),
        ]))
        .is_err());

        let cfg = from_lookup(lookup(&[
            ("CRAWLDECK_ENV", "production"),
            ("CRAWLDECK_JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ]))
        .unwrap();
        assert!(cfg.production);
    }

    #[test]
    fn test_access_ttl_must_not_exceed_refresh_ttl() {
        let err = from_lookup(lookup(&[
            ("CRAWLDECK_ACCESS_TTL_SECS", "7200"),
            ("CRAWLDECK_REFRESH_TTL_SECS", "3600"),
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_scrapyd_url() {
        assert!(from_lookup(lookup(&[("SCRAPYD_URL", "::nope")])).is_err());
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let cfg = from_lookup(lookup(&[("CRAWLDECK_PORT", "eighty")])).unwrap();
        assert_eq!(cfg.port, 9331);
    }
}
