#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport failure (unreachable host, timeout, broken body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the server's text when it sent one.
    #[error("{message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The bearer token was rejected and the single refresh attempt did not help.
    #[error("Session is no longer valid")]
    SessionInvalid,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::SessionInvalid => Some(401),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid)
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_server_message_unchanged() {
        let err = Error::Api {
            operation: "login",
            status: 401,
            message: "Invalid email or password".into(),
        };
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_server_error());
    }

    #[test]
    fn server_error_classification() {
        let err = Error::Api {
            operation: "photos",
            status: 503,
            message: "Request failed".into(),
        };
        assert!(err.is_server_error());
        assert!(!err.is_session_invalid());
        assert!(Error::SessionInvalid.is_session_invalid());
    }
}
