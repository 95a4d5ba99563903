use oauth::id_token::{AudienceSet, DEFAULT_MIN_REFRESH_INTERVAL};
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_BASE_URL: &str = "https://appleid.apple.com";
pub const DEFAULT_ISSUER: &str = "https://appleid.apple.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;

/// Settings of a Sign in with Apple client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleConfig {
    /// Accepted client identifiers. The first one is sent in requests.
    pub client_ids: AudienceSet,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Base URL of the authorize, token and key endpoints.
    pub base_url: String,
    /// Expected `iss` of identity tokens.
    pub issuer: String,
    pub http_timeout: Duration,
    /// How long a fetched key set is reused. Zero refetches on every
    /// verification.
    pub jwks_cache_ttl: Duration,
    /// Minimum time between two key refetches forced by a token whose
    /// signature did not verify.
    pub jwks_min_refresh_interval: Duration,
}

impl AppleConfig {
    /// Creates a config for Apple's production endpoints.
    ///
    /// `client_id` may be a comma separated list.
    pub fn new(
        client_id: &str,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_ids: AudienceSet::from_comma_separated(client_id),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            jwks_min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Reads the config from `APPLE_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the config through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = must_get(&lookup, "APPLE_CLIENT_ID")?;
        let mut config = Self::new(
            &client_id,
            must_get(&lookup, "APPLE_CLIENT_SECRET")?,
            must_get(&lookup, "APPLE_REDIRECT_URI")?,
        );
        if config.client_ids.is_empty() {
            return Err(Error::InvalidEnv {
                key: "APPLE_CLIENT_ID",
                value: client_id,
            });
        }

        if let Some(base_url) = get(&lookup, "APPLE_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(issuer) = get(&lookup, "APPLE_ISSUER") {
            config.issuer = issuer;
        }
        if let Some(secs) = get_secs(&lookup, "APPLE_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = secs;
        }
        if let Some(secs) = get_secs(&lookup, "APPLE_JWKS_CACHE_TTL_SECS")? {
            config.jwks_cache_ttl = secs;
        }
        if let Some(secs) = get_secs(&lookup, "APPLE_JWKS_MIN_REFRESH_SECS")? {
            config.jwks_min_refresh_interval = secs;
        }

        Ok(config)
    }

    /// The client identifier sent to Apple.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_ids.primary().unwrap_or_default()
    }

    pub fn auth_endpoint(&self) -> String {
        format!("{}/auth/authorize", self.base_url)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/auth/token", self.base_url)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/auth/keys", self.base_url)
    }
}

fn get<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn must_get<F>(lookup: &F, key: &'static str) -> Result<String, Error>
where
    F: Fn(&str) -> Option<String>,
{
    get(lookup, key).ok_or(Error::MissingEnv(key))
}

fn get_secs<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, Error>
where
    F: Fn(&str) -> Option<String>,
{
    get(lookup, key)
        .map(|value| {
            value
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| Error::InvalidEnv { key, value })
        })
        .transpose()
}
