use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::token_store::TokenStore;

/// An outgoing call kept in replayable form.
///
/// Lives only as long as one coordinator run: dispatched once, replayed at most once.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    anonymous: bool,
}

impl PendingRequest {
    /// Request for `path`, resolved against the API origin at send time.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            anonymous: false,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH path`.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `body` cannot be serialized.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Add a header, replacing any previous value under `name`.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Never attach the bearer token, and never treat a 401 as an expired session.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path as given, before joining onto the API origin.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

/// Sends [`PendingRequest`]s with the current bearer token attached.
///
/// A missing token is not an error here; the server decides authorization.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    api_url: Url,
    tokens: TokenStore,
}

impl Dispatcher {
    /// `tokens` must share the jar `http` was built with.
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: Url, tokens: TokenStore) -> Self {
        Self {
            http,
            api_url,
            tokens,
        }
    }

    /// Issue the request once and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure or [`Error::Url`] if the
    /// path does not resolve against the API origin. Non-2xx statuses are not errors.
    pub async fn send(&self, request: &PendingRequest) -> Result<reqwest::Response, Error> {
        let url = self.api_url.join(&request.path)?;

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());

        let token = if request.anonymous {
            None
        } else {
            self.tokens.get()
        };
        let with_token = token.is_some();
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            with_token,
            "Dispatching request"
        );

        Ok(builder.send().await?)
    }

    /// Token store read on every send.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }
}
