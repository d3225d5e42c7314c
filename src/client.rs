use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::cookie::Jar;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, PendingRequest};
use crate::error::Error;
use crate::photos::PhotosApi;
use crate::refresh::RefreshCoordinator;
use crate::token_store::TokenStore;
use crate::types::{
    Credentials, LoginResponse, MessageResponse, Registration, SessionUser, UrlResponse,
};

const GENERIC_FAILURE: &str = "Request failed";

/// Token Store, Request Dispatcher and Refresh Coordinator behind one handle.
///
/// Owned by the application root and passed down explicitly, usually as
/// `Arc<SessionClient>`.
#[derive(Debug, Clone)]
pub struct SessionClient {
    config: SessionConfig,
    coordinator: RefreshCoordinator,
}

impl SessionClient {
    /// Build a client with its own cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built, or
    /// [`Error::Url`] if the refresh path does not resolve against the API origin.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        let jar = Arc::new(Jar::default());
        let mut builder = reqwest::Client::builder().cookie_provider(Arc::clone(&jar));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_http_client(config, builder.build()?, jar)
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// `http` must have been built with `jar` as its cookie provider, otherwise
    /// the refresh credential never reaches the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the refresh path does not resolve against the API origin.
    pub fn with_http_client(
        config: SessionConfig,
        http: reqwest::Client,
        jar: Arc<Jar>,
    ) -> Result<Self, Error> {
        let refresh_url = config.api_url.join(&config.refresh_path)?;
        let tokens = TokenStore::new(
            jar,
            config.app_url.clone(),
            config.token_cookie_name.clone(),
            refresh_url,
            config.refresh_cookie_name.clone(),
        );
        let dispatcher = Dispatcher::new(http, config.api_url.clone(), tokens);
        let coordinator =
            RefreshCoordinator::new(dispatcher, config.refresh_path.clone(), config.token_ttl);

        Ok(Self {
            config,
            coordinator,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        self.coordinator.dispatcher().tokens()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        self.coordinator.dispatcher()
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn photos(&self) -> PhotosApi<'_> {
        PhotosApi::new(self)
    }

    /// Persist a freshly issued token (and refresh credential, if delivered in a body).
    pub fn persist_token(&self, access_token: &str, refresh_token: Option<&str>) {
        self.tokens().set(access_token, self.config.token_ttl);
        if let Some(refresh) = refresh_token.filter(|r| !r.is_empty()) {
            self.tokens().set_refresh_credential(refresh);
        }
    }

    // ── Coordinated calls ──────────────────────────────────────────

    /// Run a request through the refresh coordinator and return the raw response.
    ///
    /// # Errors
    ///
    /// See [`RefreshCoordinator::execute`].
    pub async fn execute(&self, request: &PendingRequest) -> Result<reqwest::Response, Error> {
        self.coordinator.execute(request).await
    }

    /// Run a request and decode a 2xx JSON body.
    ///
    /// # Errors
    ///
    /// [`Error::SessionInvalid`] when the session could not be recovered,
    /// [`Error::Api`] for any other non-2xx, [`Error::Http`] on transport or decode failure.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &PendingRequest,
        operation: &'static str,
    ) -> Result<T, Error> {
        let response = self.execute(request).await?;
        let response = ensure_authorized(response, operation, GENERIC_FAILURE).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send_json(&PendingRequest::get(path), "get").await
    }

    /// `POST path` with a JSON body and decode the JSON reply.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = PendingRequest::post(path).with_json(body)?;
        self.send_json(&request, "post").await
    }

    /// Run a request whose reply body is irrelevant.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn send_unit(
        &self,
        request: &PendingRequest,
        operation: &'static str,
    ) -> Result<(), Error> {
        let response = self.execute(request).await?;
        ensure_authorized(response, operation, GENERIC_FAILURE).await?;
        Ok(())
    }

    // ── Auth endpoints ─────────────────────────────────────────────

    /// `POST /api/auth/login`. Persists the returned token on success.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] carries the server's message unchanged ("Invalid email or
    /// password", "Please verify your email first"), or "Login failed".
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, Error> {
        let request = PendingRequest::post("/api/auth/login")
            .with_json(credentials)?
            .anonymous();
        let response = self.dispatcher().send(&request).await?;
        let response = ensure_success(response, "login", "Login failed").await?;
        let login = response.json::<LoginResponse>().await?;

        self.persist_token(&login.access_token, login.refresh_token.as_deref());
        tracing::info!(user_id = %login.user.id, "Login successful");
        Ok(login)
    }

    /// `POST /api/auth/register`. Does not log in.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] with the server's message, or "Registration failed".
    pub async fn register(&self, registration: &Registration) -> Result<Option<String>, Error> {
        let request = PendingRequest::post("/api/auth/register")
            .with_json(registration)?
            .anonymous();
        let response = self.dispatcher().send(&request).await?;
        let response = ensure_success(response, "register", "Registration failed").await?;
        Ok(read_message(response).await)
    }

    /// `GET /api/auth/me` with the current token.
    ///
    /// # Errors
    ///
    /// [`Error::SessionInvalid`] when the token is rejected and cannot be refreshed.
    pub async fn identity(&self) -> Result<SessionUser, Error> {
        self.send_json(&PendingRequest::get("/api/auth/me"), "identity")
            .await
    }

    /// `GET /api/auth/google/url`: where to send the browser for Google sign-in.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] if the server cannot build the URL.
    pub async fn google_auth_url(&self) -> Result<Url, Error> {
        let request = PendingRequest::get("/api/auth/google/url").anonymous();
        let response = self.dispatcher().send(&request).await?;
        let response = ensure_success(response, "google auth url", GENERIC_FAILURE).await?;
        Ok(response.json::<UrlResponse>().await?.url)
    }

    /// `GET /api/auth/google/photos/url`: consent URL for photo library access.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::send_json`].
    pub async fn google_photos_auth_url(&self) -> Result<Url, Error> {
        let body: UrlResponse = self
            .send_json(
                &PendingRequest::get("/api/auth/google/photos/url"),
                "google photos auth url",
            )
            .await?;
        Ok(body.url)
    }

    /// `POST /api/auth/forgot-password {email}`.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] with the server's message, or "Failed to send reset email".
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, Error> {
        let request = PendingRequest::post("/api/auth/forgot-password")
            .with_json(&serde_json::json!({ "email": email }))?
            .anonymous();
        let response = self.dispatcher().send(&request).await?;
        let response =
            ensure_success(response, "forgot password", "Failed to send reset email").await?;
        Ok(read_message(response).await)
    }

    /// `POST /api/auth/reset-password {token, password}`.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] with the server's message, or "Failed to reset password".
    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &str,
    ) -> Result<Option<String>, Error> {
        let request = PendingRequest::post("/api/auth/reset-password")
            .with_json(&serde_json::json!({ "token": reset_token, "password": password }))?
            .anonymous();
        let response = self.dispatcher().send(&request).await?;
        let response =
            ensure_success(response, "reset password", "Failed to reset password").await?;
        Ok(read_message(response).await)
    }

    /// `GET /api/auth/verify-email/{token}`.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] with the server's message ("Invalid verification token").
    pub async fn verify_email(&self, verification_token: &str) -> Result<Option<String>, Error> {
        let path = format!(
            "/api/auth/verify-email/{}",
            urlencoding::encode(verification_token)
        );
        let request = PendingRequest::get(path).anonymous();
        let response = self.dispatcher().send(&request).await?;
        let response = ensure_success(response, "verify email", GENERIC_FAILURE).await?;
        Ok(read_message(response).await)
    }
}

/// Checks HTTP response status; returns the response on success or an error
/// carrying the server's message (or `fallback`).
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
    fallback: &str,
) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or_else(|| fallback.to_string());

    if status >= 500 {
        tracing::error!(operation, status, "Server failure");
    } else {
        tracing::debug!(operation, status, "Request rejected");
    }

    Err(Error::Api {
        operation,
        status,
        message,
    })
}

/// Like [`ensure_success`], but a 401 that survived the coordinator means the
/// session is gone.
pub(crate) async fn ensure_authorized(
    response: reqwest::Response,
    operation: &'static str,
    fallback: &str,
) -> Result<reqwest::Response, Error> {
    if response.status() == StatusCode::UNAUTHORIZED {
        return Err(Error::SessionInvalid);
    }
    ensure_success(response, operation, fallback).await
}

/// `message`, else `error`, from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

async fn read_message(response: reqwest::Response) -> Option<String> {
    response
        .json::<MessageResponse>()
        .await
        .ok()
        .and_then(|m| m.message)
}
