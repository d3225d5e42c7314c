use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use url::Url;

/// Server-assigned user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Identity resolved from a valid token by the identity endpoint.
///
/// Derived state: the server stays authoritative, this is a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_verified: Option<bool>,
}

impl SessionUser {
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
            profile_picture: None,
            is_verified: None,
        }
    }
}

/// Email/password pair for `POST /api/auth/login`.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Keeps passwords out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Payload for `POST /api/auth/register`.
#[derive(Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl Registration {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Successful login payload.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: SessionUser,
}

/// Refresh endpoint payload.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
}

/// `{message}` acknowledgement returned by register, forgot/reset password and friends.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageResponse {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

/// `{url}` payload of the OAuth URL endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UrlResponse {
    pub(crate) url: Url,
}

/// Where the host should take the user next.
///
/// The library never navigates by itself; it hands one of these back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Dashboard,
    Login,
    LoginWithError(String),
    LoginAfterReset,
    VerifyEmail,
    External(Url),
}

impl Navigation {
    /// Application-relative path (or absolute URL for [`Navigation::External`]).
    #[must_use]
    pub fn to_path(&self) -> String {
        match self {
            Self::Dashboard => "/dashboard".into(),
            Self::Login => "/auth/login".into(),
            Self::LoginWithError(msg) => {
                format!("/auth/login?error={}", urlencoding::encode(msg))
            }
            Self::LoginAfterReset => "/auth/login?reset=success".into(),
            Self::VerifyEmail => "/auth/verify-email".into(),
            Self::External(url) => url.to_string(),
        }
    }
}
