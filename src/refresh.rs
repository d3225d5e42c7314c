//! Single refresh-and-retry on authorization failure.
//!
//! Each request runs its own instance of the machine:
//!
//! ```text
//! Dispatch ──401──▶ Refresh ──ok──▶ Retry (terminal, whatever the outcome)
//!    │                 │
//!    │                 └──failed──▶ Fail (token cleared, SessionInvalid)
//!    └──other──▶ terminal
//! ```
//!
//! `Refresh` is only reachable from the first dispatch. `Retry` returns instead
//! of looping, so a second 401 can never trigger a second refresh.

use reqwest::StatusCode;
use time::Duration;

use crate::dispatch::{Dispatcher, PendingRequest};
use crate::error::Error;
use crate::types::TokenResponse;

#[derive(Debug)]
enum Phase {
    Dispatch,
    Refresh,
    Retry,
    Fail(RefreshFailure),
}

/// Why the refresh attempt did not produce a token.
#[derive(Debug)]
enum RefreshFailure {
    Transport(Error),
    Rejected(StatusCode),
    Malformed,
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Rejected(status) => write!(f, "rejected with {status}"),
            Self::Malformed => f.write_str("malformed refresh payload"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    dispatcher: Dispatcher,
    refresh_path: String,
    token_ttl: Duration,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, refresh_path: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            dispatcher,
            refresh_path: refresh_path.into(),
            token_ttl,
        }
    }

    /// Run `request` through dispatch, at most one refresh, and at most one replay.
    ///
    /// Non-2xx responses other than the handled 401 are returned as-is. A 401
    /// from the replay is returned as-is too, after clearing the token.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] when dispatch or replay fails at the transport level.
    /// - [`Error::SessionInvalid`] when the refresh attempt fails; the token is
    ///   cleared before returning.
    pub async fn execute(&self, request: &PendingRequest) -> Result<reqwest::Response, Error> {
        let mut phase = Phase::Dispatch;

        loop {
            phase = match phase {
                Phase::Dispatch => {
                    let response = self.dispatcher.send(request).await?;
                    if response.status() != StatusCode::UNAUTHORIZED || request.is_anonymous() {
                        return Ok(response);
                    }
                    tracing::info!(path = %request.path(), "Authorization failed, refreshing token");
                    Phase::Refresh
                }
                Phase::Refresh => match self.refresh().await {
                    Ok(token) => {
                        self.dispatcher.tokens().set(&token, self.token_ttl);
                        Phase::Retry
                    }
                    Err(failure) => Phase::Fail(failure),
                },
                Phase::Retry => {
                    let response = self.dispatcher.send(request).await?;
                    if response.status() == StatusCode::UNAUTHORIZED {
                        tracing::warn!(
                            path = %request.path(),
                            "Replay rejected after refresh, clearing session"
                        );
                        self.dispatcher.tokens().clear();
                    }
                    return Ok(response);
                }
                Phase::Fail(failure) => {
                    tracing::warn!(
                        path = %request.path(),
                        reason = %failure,
                        "Token refresh failed, clearing session"
                    );
                    self.dispatcher.tokens().clear();
                    return Err(Error::SessionInvalid);
                }
            };
        }
    }

    /// Call the refresh endpoint. The credential rides on the ambient cookie,
    /// never on the bearer header.
    async fn refresh(&self) -> Result<String, RefreshFailure> {
        let request = PendingRequest::post(self.refresh_path.clone()).anonymous();
        let response = self
            .dispatcher
            .send(&request)
            .await
            .map_err(RefreshFailure::Transport)?;

        if !response.status().is_success() {
            return Err(RefreshFailure::Rejected(response.status()));
        }

        let body = response
            .json::<TokenResponse>()
            .await
            .map_err(|_| RefreshFailure::Malformed)?;
        if body.access_token.is_empty() {
            return Err(RefreshFailure::Malformed);
        }
        Ok(body.access_token)
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
