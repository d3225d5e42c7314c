//! In-process mock of the remote API for tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::client::SessionClient;
use crate::config::SessionConfig;

const VALID_TOKENS: [&str; 2] = ["tok123", "fresh-token"];
const REFRESH_COOKIE: &str = "refresh_token_cookie";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshMode {
    /// New token when the refresh cookie is present, 401 otherwise.
    Accept,
    Reject,
    /// 200 without an `access_token`.
    Malformed,
}

#[derive(Debug, Clone)]
pub(crate) struct SeenRefresh {
    pub(crate) bearer: Option<String>,
    pub(crate) cookie: Option<String>,
}

#[derive(Debug)]
pub(crate) struct MockState {
    resource_hits: AtomicUsize,
    refresh_hits: AtomicUsize,
    me_hits: AtomicUsize,
    script: Mutex<VecDeque<StatusCode>>,
    bearers: Mutex<Vec<Option<String>>>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_requests: Mutex<Vec<SeenRefresh>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            resource_hits: AtomicUsize::new(0),
            refresh_hits: AtomicUsize::new(0),
            me_hits: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            bearers: Mutex::new(Vec::new()),
            refresh_mode: Mutex::new(RefreshMode::Accept),
            refresh_requests: Mutex::new(Vec::new()),
        }
    }

    /// Statuses `/api/resource` answers with, in order, before falling back to
    /// token validation.
    pub(crate) fn script_resource(&self, statuses: impl IntoIterator<Item = StatusCode>) {
        self.script.lock().unwrap().extend(statuses);
    }

    pub(crate) fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub(crate) fn resource_hits(&self) -> usize {
        self.resource_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_hits(&self) -> usize {
        self.refresh_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn me_hits(&self) -> usize {
        self.me_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn bearers(&self) -> Vec<Option<String>> {
        self.bearers.lock().unwrap().clone()
    }

    pub(crate) fn refresh_requests(&self) -> Vec<SeenRefresh> {
        self.refresh_requests.lock().unwrap().clone()
    }
}

pub(crate) struct MockApi {
    pub(crate) addr: SocketAddr,
    pub(crate) state: Arc<MockState>,
}

impl MockApi {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let app = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub(crate) fn config(&self) -> SessionConfig {
        SessionConfig::new(
            format!("http://{}", self.addr).parse().unwrap(),
            "http://localhost:3000".parse().unwrap(),
        )
    }

    pub(crate) fn client(&self) -> SessionClient {
        SessionClient::new(self.config()).unwrap()
    }
}

/// A client whose API origin refuses connections.
pub(crate) fn unreachable_client() -> SessionClient {
    SessionClient::new(SessionConfig::new(
        "http://127.0.0.1:1".parse().unwrap(),
        "http://localhost:3000".parse().unwrap(),
    ))
    .unwrap()
}

/// Serve each reply on its own connection, in order, then stop listening.
///
/// Replies carry `Connection: close` so the client cannot reuse a socket.
pub(crate) async fn one_reply_per_connection(replies: Vec<(u16, &'static str)>) -> SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut listener = Some(listener);
        let last = replies.len().saturating_sub(1);
        for (i, (status, body)) in replies.into_iter().enumerate() {
            let Some(open) = listener.as_ref() else { break };
            let (mut socket, _) = open.accept().await.unwrap();
            if i == last {
                // Closed before replying so the next connect is refused.
                listener = None;
            }
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let reply = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });
    addr
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/resource", get(resource))
        .route("/api/boom", get(boom))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .route("/api/auth/google/url", get(google_url))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/verify-email/{token}", get(verify_email))
        .route("/api/photos", get(photos))
        .route("/api/photos/connection-status", get(connection_status))
        .route("/api/photos/top-picks", get(top_picks))
        .route("/api/photos/rank", post(rank))
        .with_state(state)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

fn authorized(headers: &HeaderMap) -> bool {
    bearer(headers).is_some_and(|t| VALID_TOKENS.contains(&t.as_str()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"msg": "Token has expired"})),
    )
        .into_response()
}

fn user_json() -> Value {
    json!({"id": 1, "email": "a@b.com", "display_name": "A"})
}

async fn resource(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.resource_hits.fetch_add(1, Ordering::SeqCst);
    state.bearers.lock().unwrap().push(bearer(&headers));

    let scripted = state.script.lock().unwrap().pop_front();
    match scripted {
        Some(StatusCode::UNAUTHORIZED) => unauthorized(),
        Some(status) => (status, Json(json!({"scripted": status.as_u16()}))).into_response(),
        None if authorized(&headers) => Json(json!({"ok": true})).into_response(),
        None => unauthorized(),
    }
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.refresh_hits.fetch_add(1, Ordering::SeqCst);
    let seen = SeenRefresh {
        bearer: bearer(&headers),
        cookie: cookie(&headers, REFRESH_COOKIE),
    };
    let has_cookie = seen.cookie.is_some();
    state.refresh_requests.lock().unwrap().push(seen);

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Accept if has_cookie => {
            Json(json!({"access_token": "fresh-token"})).into_response()
        }
        RefreshMode::Malformed => Json(json!({"token": "nope"})).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"msg": "Missing cookie \"refresh_token_cookie\""})),
        )
            .into_response(),
    }
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == "a@b.com" && body["password"] == "secret1" {
        Json(json!({
            "access_token": "tok123",
            "refresh_token": "refresh-abc",
            "user": user_json(),
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid email or password"})),
        )
            .into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == "taken@b.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Email already registered"})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Please check your email to verify your account.",
            "user": {"id": 2, "email": body["email"], "display_name": body["display_name"]},
        })),
    )
        .into_response()
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.me_hits.fetch_add(1, Ordering::SeqCst);
    if authorized(&headers) {
        Json(user_json()).into_response()
    } else {
        unauthorized()
    }
}

async fn google_url() -> Json<Value> {
    Json(json!({"url": "https://accounts.google.com/o/oauth2/auth?client_id=test"}))
}

async fn forgot_password() -> Json<Value> {
    Json(json!({
        "message": "If your email is registered, you will receive password reset instructions"
    }))
}

async fn reset_password(Json(body): Json<Value>) -> Response {
    if body["token"] == "reset-ok" {
        Json(json!({"message": "Password reset successful"})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid or expired reset token"})),
        )
            .into_response()
    }
}

async fn verify_email(Path(token): Path<String>) -> Response {
    if token == "verify-ok" {
        Json(json!({"message": "Email verified successfully"})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid verification token"})),
        )
            .into_response()
    }
}

async fn photos(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"photos": [
        {"id": "p1", "baseUrl": "https://lh3.example/p1", "filename": "a.jpg"},
        {"id": "p2", "baseUrl": "https://lh3.example/p2", "filename": "b.jpg"},
    ]}))
    .into_response()
}

async fn connection_status(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"connected": true})).into_response()
}

async fn top_picks(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"photos": [
        {
            "google_media_id": "g1",
            "base_url": "https://lh3.example/g1",
            "combined_score": 0.92,
            "tags": ["beach", "sunset"],
            "width": 4032,
            "height": 3024,
        },
        {
            "google_media_id": "g2",
            "base_url": "https://lh3.example/g2",
            "combined_score": 0.41,
            "tags": [],
            "width": null,
            "height": null,
        },
    ]}))
    .into_response()
}

async fn rank(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let empty = body["photoIds"].as_array().is_none_or(Vec::is_empty);
    if empty {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "No photos to rank"})),
        )
            .into_response();
    }
    Json(json!({"success": true, "message": "Photos ranked successfully"})).into_response()
}
