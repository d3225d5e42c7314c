use axum_extra::extract::CookieJar;

/// Whether the request carries a non-empty token cookie.
///
/// Presence only: validity is the API server's call.
pub(super) fn has_token(jar: &CookieJar, cookie_name: &str) -> bool {
    jar.get(cookie_name)
        .is_some_and(|c| !c.value().trim().is_empty())
}
