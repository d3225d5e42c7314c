//! Application-wide view of "who is signed in".
//!
//! [`SessionContext`] owns the derived [`SessionUser`] and a loading flag and
//! publishes both through a `watch` channel. Other components subscribe; they do
//! not read the token cookie themselves.
//!
//! The coordinator may clear or replace the token behind the context's back.
//! Accessors never report a user without a token, and
//! [`SessionContext::watch_tokens`] pushes those changes to subscribers.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::client::SessionClient;
use crate::error::Error;
use crate::oauth::{CallbackOutcome, CallbackParams};
use crate::types::{Credentials, Navigation, Registration, SessionUser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

#[derive(Debug)]
pub struct SessionContext {
    client: Arc<SessionClient>,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    /// Starts in the loading state; call [`SessionContext::initialize`] once.
    #[must_use]
    pub fn new(client: Arc<SessionClient>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self { client, state }
    }

    /// The client every call of this context goes through.
    #[must_use]
    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    /// Receiver for every published [`SessionState`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state, signed out if the token has gone.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.reconcile();
        self.state.borrow().clone()
    }

    /// Signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.reconcile();
        self.state.borrow().user.clone()
    }

    /// True until the first identity lookup finishes.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.reconcile();
        self.state.borrow().user.is_some()
    }

    /// Follow token writes from any clone of the token store.
    ///
    /// A cleared token signs the context out; a new token (login, callback or
    /// refresh) reloads the identity. The task ends once the context is dropped
    /// and the next change arrives, or when the handle is aborted.
    pub fn watch_tokens(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.client.tokens().changes();
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let present = changes.borrow_and_update().present;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if present {
                    tracing::debug!("Session token replaced, reloading identity");
                    session.reload_identity().await;
                } else if session.state.borrow().user.is_some() {
                    tracing::info!("Session token cleared, signing out");
                    session.publish(None);
                }
            }
        })
    }

    /// Resolve the stored token (if any) into a user.
    pub async fn initialize(&self) {
        if self.client.tokens().get().is_none() {
            tracing::debug!("No session token found");
            self.publish(None);
            return;
        }
        self.reload_identity().await;
    }

    /// Fetch the identity for the current token. On any failure the token is
    /// cleared and the session ends up signed out.
    pub async fn reload_identity(&self) {
        self.state.send_modify(|s| s.loading = true);
        match self.client.identity().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Session identity resolved");
                self.publish(Some(user));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity lookup failed, clearing token");
                self.client.tokens().clear();
                self.publish(None);
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// The server's error message, unchanged, inside [`Error::Api`].
    pub async fn login(&self, credentials: &Credentials) -> Result<Navigation, Error> {
        let login = self.client.login(credentials).await?;
        self.publish(Some(login.user));
        Ok(Navigation::Dashboard)
    }

    /// Create an account. No automatic sign-in.
    ///
    /// # Errors
    ///
    /// The server's error message, unchanged, inside [`Error::Api`].
    pub async fn register(&self, registration: &Registration) -> Result<Navigation, Error> {
        self.client.register(registration).await?;
        Ok(Navigation::VerifyEmail)
    }

    /// Local sign-out: clears the token and the user.
    pub fn logout(&self) -> Navigation {
        self.client.tokens().clear_all();
        self.publish(None);
        tracing::info!("Logged out");
        Navigation::Login
    }

    /// Start Google sign-in.
    ///
    /// # Errors
    ///
    /// Propagates failures to obtain the provider URL.
    pub async fn google_login(&self) -> Result<Navigation, Error> {
        let url = self.client.google_auth_url().await?;
        Ok(Navigation::External(url))
    }

    /// Finish a provider redirect that landed on the callback route.
    pub async fn complete_oauth_callback(&self, callback_url: &Url) -> Navigation {
        match CallbackParams::from_url(callback_url).outcome() {
            CallbackOutcome::Rejected(navigation) => navigation,
            CallbackOutcome::Token {
                access_token,
                refresh_token,
            } => {
                self.client
                    .persist_token(&access_token, refresh_token.as_deref());
                self.reload_identity().await;
                if self.is_authenticated() {
                    Navigation::Dashboard
                } else {
                    Navigation::LoginWithError("Authentication failed".to_string())
                }
            }
        }
    }

    /// # Errors
    ///
    /// The server's error message, unchanged, inside [`Error::Api`].
    pub async fn forgot_password(&self, email: &str) -> Result<(), Error> {
        self.client.forgot_password(email).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// The server's error message, unchanged, inside [`Error::Api`].
    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &str,
    ) -> Result<Navigation, Error> {
        self.client.reset_password(reset_token, password).await?;
        Ok(Navigation::LoginAfterReset)
    }

    /// Turn an error from any coordinated call into a navigation, if it needs one.
    ///
    /// A dead session has no form to show an inline message in, so it becomes
    /// a sign-out plus a trip to the login surface.
    pub fn handle_error(&self, error: &Error) -> Option<Navigation> {
        if error.is_session_invalid() {
            Some(self.logout())
        } else {
            None
        }
    }

    /// Rule for authenticated surfaces: once loading is done, no user means login.
    #[must_use]
    pub fn guard(&self) -> Option<Navigation> {
        self.reconcile();
        let state = self.state.borrow();
        (!state.loading && state.user.is_none()).then_some(Navigation::Login)
    }

    /// Drop a published user whose token is no longer in the store.
    fn reconcile(&self) {
        let stale = self.state.borrow().user.is_some() && self.client.tokens().get().is_none();
        if stale {
            tracing::info!("Session token gone, signing out");
            self.publish(None);
        }
    }

    fn publish(&self, user: Option<SessionUser>) {
        self.state.send_replace(SessionState {
            user,
            loading: false,
        });
    }
}
