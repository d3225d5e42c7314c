use url::Url;

use crate::types::Navigation;

/// Parameters the identity provider hands back on the callback route.
///
/// The token may arrive in the query string or in the URL fragment; the query
/// wins when both carry parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct CallbackParams {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// What a callback resolves to before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Persist these and load the identity.
    Token {
        access_token: String,
        refresh_token: Option<String>,
    },
    /// Go back to the login surface with this navigation.
    Rejected(Navigation),
}

impl CallbackParams {
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let from_query = Self::from_pairs(url.query_pairs());
        if !from_query.is_empty() {
            return from_query;
        }
        url.fragment()
            .map(|fragment| Self::from_pairs(url::form_urlencoded::parse(fragment.as_bytes())))
            .unwrap_or_default()
    }

    fn from_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    ) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "token" | "access_token" => params.token = value,
                "refresh_token" => params.refresh_token = value,
                "error" => params.error = value,
                "message" => params.message = value,
                _ => {}
            }
        }
        params
    }

    fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.refresh_token.is_none()
            && self.error.is_none()
            && self.message.is_none()
    }

    /// Provider error first, then token, else "No token received".
    #[must_use]
    pub fn outcome(self) -> CallbackOutcome {
        if let Some(error) = self.error {
            tracing::warn!(error = %error, "OAuth callback reported an error");
            let message = self
                .message
                .unwrap_or_else(|| "Authentication failed".to_string());
            return CallbackOutcome::Rejected(Navigation::LoginWithError(message));
        }
        match self.token {
            Some(access_token) => CallbackOutcome::Token {
                access_token,
                refresh_token: self.refresh_token,
            },
            None => CallbackOutcome::Rejected(Navigation::LoginWithError(
                "No token received".to_string(),
            )),
        }
    }
}
