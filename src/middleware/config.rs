/// Route gate settings.
///
/// Defaults match the application's public surfaces; override with `with_*` methods.
///
/// ```rust,ignore
/// use poster_session::middleware::GateConfig;
///
/// let gate = GateConfig::default()
///     .with_public_path("/about")
///     .with_home_path("/photos");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GateConfig {
    pub(crate) public_paths: Vec<String>,
    pub(crate) bypass_prefixes: Vec<String>,
    pub(crate) token_cookie_name: String,
    pub(crate) login_path: String,
    pub(crate) register_path: String,
    pub(crate) landing_path: String,
    pub(crate) home_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            public_paths: [
                "/auth/login",
                "/auth/register",
                "/auth/forgot-password",
                "/auth/reset-password",
                "/auth/callback",
                "/api/auth",
                "/",
                "/pricing",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            bypass_prefixes: ["/static/", "/public/", "/favicon.ico"]
                .into_iter()
                .map(String::from)
                .collect(),
            token_cookie_name: "token".into(),
            login_path: "/auth/login".into(),
            register_path: "/auth/register".into(),
            landing_path: "/".into(),
            home_path: "/dashboard".into(),
        }
    }
}

impl GateConfig {
    /// Add a path reachable without a token (also covers everything below it).
    #[must_use]
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    /// Replace the whole public allow-list.
    #[must_use]
    pub fn with_public_paths(mut self, paths: Vec<String>) -> Self {
        self.public_paths = paths;
        self
    }

    /// Prefixes the gate never looks at (static assets).
    #[must_use]
    pub fn with_bypass_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.bypass_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn with_token_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.token_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    #[must_use]
    pub fn token_cookie_name(&self) -> &str {
        &self.token_cookie_name
    }

    pub(crate) fn is_public(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|p| path == p || path.starts_with(&format!("{p}/")))
    }

    pub(crate) fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}
