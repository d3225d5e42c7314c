//! Bearer token persistence in the shared cookie jar.
//!
//! The jar plays the part of the browser cookie store: every clone of the
//! client shares it, and the HTTP client sends from it. The store keeps no copy
//! of the token; each [`TokenStore::get`] re-reads the jar.

use std::sync::Arc;

use cookie::{Cookie, SameSite};
use reqwest::cookie::{CookieStore, Jar};
use time::Duration;
use tokio::sync::watch;
use url::Url;

/// Last write to the token cookie, as seen by [`TokenStore::changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenChange {
    /// Bumped on every set or clear, across all clones of the store.
    pub generation: u64,
    /// Whether the write left a token behind.
    pub present: bool,
}

#[derive(Clone)]
pub struct TokenStore {
    jar: Arc<Jar>,
    changes: Arc<watch::Sender<TokenChange>>,
    app_url: Url,
    cookie_name: String,
    refresh_url: Url,
    refresh_cookie_name: String,
}

impl TokenStore {
    /// `app_url` scopes the token cookie; `refresh_url` scopes the refresh
    /// credential so it only travels to the refresh endpoint.
    #[must_use]
    pub fn new(
        jar: Arc<Jar>,
        app_url: Url,
        cookie_name: impl Into<String>,
        refresh_url: Url,
        refresh_cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            jar,
            changes: Arc::new(watch::channel(TokenChange::default()).0),
            app_url,
            cookie_name: cookie_name.into(),
            refresh_url,
            refresh_cookie_name: refresh_cookie_name.into(),
        }
    }

    /// Current token, if the cookie exists and has not expired.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        read_cookie(&self.jar, &self.app_url, &self.cookie_name)
    }

    /// Write the token cookie with the given lifetime, replacing any previous value.
    pub fn set(&self, token: &str, ttl: Duration) {
        let cookie = Cookie::build((self.cookie_name.clone(), urlencoding::encode(token).into_owned()))
            .path("/")
            .same_site(SameSite::Lax)
            .max_age(ttl)
            .build();
        self.jar.add_cookie_str(&cookie.to_string(), &self.app_url);
        self.announce(ttl.is_positive() && !token.is_empty());
    }

    /// Expire the token cookie immediately.
    pub fn clear(&self) {
        self.jar
            .add_cookie_str(&expired(&self.cookie_name, "/").to_string(), &self.app_url);
        self.announce(false);
    }

    /// Subscribe to token writes made through any clone of this store,
    /// including the ones the refresh coordinator makes.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<TokenChange> {
        self.changes.subscribe()
    }

    fn announce(&self, present: bool) {
        self.changes.send_modify(|change| {
            change.generation += 1;
            change.present = present;
        });
    }

    /// Refresh credential currently held for the refresh endpoint.
    #[must_use]
    pub fn refresh_credential(&self) -> Option<String> {
        read_cookie(&self.jar, &self.refresh_url, &self.refresh_cookie_name)
    }

    /// Store a body-delivered refresh credential as a cookie on the refresh endpoint.
    ///
    /// No max-age: the server decides when it stops honouring it.
    pub fn set_refresh_credential(&self, value: &str) {
        let cookie = Cookie::build((
            self.refresh_cookie_name.clone(),
            urlencoding::encode(value).into_owned(),
        ))
        .path(self.refresh_url.path().to_string())
        .same_site(SameSite::Lax)
        .http_only(true)
        .build();
        self.jar.add_cookie_str(&cookie.to_string(), &self.refresh_url);
    }

    /// Expire both the token and the local refresh credential.
    pub fn clear_all(&self) {
        self.clear();
        let path = self.refresh_url.path().to_string();
        self.jar.add_cookie_str(
            &expired(&self.refresh_cookie_name, &path).to_string(),
            &self.refresh_url,
        );
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("app_url", &self.app_url.as_str())
            .field("cookie_name", &self.cookie_name)
            .field("has_token", &self.get().is_some())
            .finish_non_exhaustive()
    }
}

fn read_cookie(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let header = header.to_str().ok()?;
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| {
            urlencoding::decode(c.value())
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| c.value().to_string())
        })
        .filter(|v| !v.is_empty())
}

fn expired(name: &str, path: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path(path.to_string())
        .max_age(Duration::ZERO)
        .build()
}
