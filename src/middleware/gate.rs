use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use super::config::GateConfig;
use super::cookies;

/// What the gate does with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(String),
}

impl GateConfig {
    /// Decide on `path` given only whether a token cookie is present.
    ///
    /// Rules, first match wins: static assets pass; signed-in users hitting the
    /// landing, login or register page go home; public paths pass; anonymous
    /// users go to login with `from` set to the original path.
    #[must_use]
    pub fn evaluate(&self, path: &str, has_token: bool) -> GateDecision {
        if self.is_bypassed(path) {
            return GateDecision::Allow;
        }

        if has_token
            && (path == self.landing_path || path == self.login_path || path == self.register_path)
        {
            return GateDecision::Redirect(self.home_path.clone());
        }

        if self.is_public(path) {
            return GateDecision::Allow;
        }

        if !has_token {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("from", path)
                .finish();
            return GateDecision::Redirect(format!("{}?{query}", self.login_path));
        }

        GateDecision::Allow
    }
}

/// Axum middleware applying [`GateConfig::evaluate`] to every request.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/dashboard", get(dashboard))
///     .layer(axum::middleware::from_fn_with_state(
///         Arc::new(GateConfig::default()),
///         route_gate,
///     ));
/// ```
pub async fn route_gate(
    State(config): State<Arc<GateConfig>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let has_token = cookies::has_token(&jar, &config.token_cookie_name);
    match config.evaluate(request.uri().path(), has_token) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(to) => {
            tracing::debug!(path = %request.uri().path(), to = %to, "Route gate redirect");
            Redirect::temporary(&to).into_response()
        }
    }
}

/// Wrap every route of `router` in the gate.
pub fn protect<S>(router: Router<S>, config: GateConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(Arc::new(config), route_gate))
}
