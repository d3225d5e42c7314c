use std::time::Duration as StdDuration;

use time::Duration;
use url::Url;

use crate::error::Error;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Session client configuration.
///
/// Required fields are constructor parameters. Everything else has a default
/// and a `with_*` override.
///
/// ```rust,ignore
/// use poster_session::SessionConfig;
///
/// let config = SessionConfig::new(
///     "https://api.example.com".parse()?,
///     "https://app.example.com".parse()?,
/// )
/// .with_token_ttl(time::Duration::hours(1));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    pub(crate) api_url: Url,
    pub(crate) app_url: Url,
    pub(crate) token_cookie_name: String,
    pub(crate) token_ttl: Duration,
    pub(crate) refresh_cookie_name: String,
    pub(crate) refresh_path: String,
    pub(crate) request_timeout: Option<StdDuration>,
}

impl SessionConfig {
    /// `api_url` is the API server origin; `app_url` is the origin the token
    /// cookie belongs to.
    #[must_use]
    pub fn new(api_url: Url, app_url: Url) -> Self {
        Self {
            api_url,
            app_url,
            token_cookie_name: "token".into(),
            token_ttl: Duration::hours(24),
            refresh_cookie_name: "refresh_token_cookie".into(),
            refresh_path: "/api/auth/refresh".into(),
            request_timeout: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `SESSION_API_URL`: API origin (default `http://localhost:5000`)
    /// - `SESSION_APP_URL`: application origin (default `http://localhost:3000`)
    /// - `SESSION_TOKEN_COOKIE`: token cookie name (default `token`)
    /// - `SESSION_TOKEN_TTL_SECS`: token cookie max-age in seconds (default 86400)
    /// - `SESSION_REFRESH_COOKIE`: refresh credential cookie name
    /// - `SESSION_TIMEOUT_SECS`: per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a URL or number fails to parse.
    pub fn from_env() -> Result<Self, Error> {
        let api_url = env_url("SESSION_API_URL", DEFAULT_API_URL)?;
        let app_url = env_url("SESSION_APP_URL", DEFAULT_APP_URL)?;
        let mut config = Self::new(api_url, app_url);

        if let Ok(name) = std::env::var("SESSION_TOKEN_COOKIE") {
            config = config.with_token_cookie_name(name);
        }
        if let Some(secs) = env_secs("SESSION_TOKEN_TTL_SECS")? {
            config = config.with_token_ttl(ttl_from_secs("SESSION_TOKEN_TTL_SECS", secs)?);
        }
        if let Ok(name) = std::env::var("SESSION_REFRESH_COOKIE") {
            config = config.with_refresh_cookie_name(name);
        }
        if let Some(secs) = env_secs("SESSION_TIMEOUT_SECS")? {
            config = config.with_request_timeout(StdDuration::from_secs(secs));
        }

        tracing::debug!(
            api_url = %config.api_url,
            app_url = %config.app_url,
            token_ttl_secs = config.token_ttl.whole_seconds(),
            "Session config loaded from environment"
        );
        Ok(config)
    }

    /// Override the token cookie name.
    #[must_use]
    pub fn with_token_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.token_cookie_name = name.into();
        self
    }

    /// Override the token cookie max-age.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Override the refresh credential cookie name.
    #[must_use]
    pub fn with_refresh_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.refresh_cookie_name = name.into();
        self
    }

    /// Override the refresh endpoint, relative to the API origin or absolute.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Set a per-request timeout. None by default.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// API server origin.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Origin the token cookie is scoped to.
    #[must_use]
    pub fn app_url(&self) -> &Url {
        &self.app_url
    }

    /// Token cookie name.
    #[must_use]
    pub fn token_cookie_name(&self) -> &str {
        &self.token_cookie_name
    }

    /// Token cookie max-age.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Refresh credential cookie name.
    #[must_use]
    pub fn refresh_cookie_name(&self) -> &str {
        &self.refresh_cookie_name
    }

    /// Refresh endpoint path.
    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        // Both literals are valid absolute URLs.
        Self::new(
            DEFAULT_API_URL.parse().expect("valid default URL"),
            DEFAULT_APP_URL.parse().expect("valid default URL"),
        )
    }
}

fn env_url(key: &str, default: &str) -> Result<Url, Error> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}

fn ttl_from_secs(key: &str, secs: u64) -> Result<Duration, Error> {
    i64::try_from(secs)
        .map(Duration::seconds)
        .map_err(|_| Error::Config(format!("{key}: {secs} seconds is out of range")))
}

fn env_secs(key: &str) -> Result<Option<u64>, Error> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();

        assert_eq!(config.api_url().as_str(), "http://localhost:5000/");
        assert_eq!(config.app_url().as_str(), "http://localhost:3000/");
        assert_eq!(config.token_cookie_name(), "token");
        assert_eq!(config.token_ttl(), Duration::hours(24));
        assert_eq!(config.refresh_path(), "/api/auth/refresh");
    }

    #[test]
    fn test_config_with_overrides() {
        let config = SessionConfig::default()
            .with_token_cookie_name("sid")
            .with_token_ttl(Duration::hours(1))
            .with_refresh_path("/auth/refresh");

        assert_eq!(config.token_cookie_name(), "sid");
        assert_eq!(config.token_ttl().whole_seconds(), 3600);
        assert_eq!(config.refresh_path(), "/auth/refresh");
    }

    #[test]
    fn test_ttl_out_of_range_is_config_error() {
        assert_eq!(
            ttl_from_secs("SESSION_TOKEN_TTL_SECS", 90).unwrap(),
            Duration::seconds(90)
        );

        let err = ttl_from_secs("SESSION_TOKEN_TTL_SECS", u64::MAX).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("SESSION_TOKEN_TTL_SECS"));
    }
}
