//! Request-time route gate for axum applications.
//!
//! Checks the token cookie against a public-path allow-list and sends anonymous
//! visitors to the login surface, keeping the original path in `from` so the
//! login page can return them afterwards.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use poster_session::middleware::{GateConfig, protect};
//!
//! let app = protect(
//!     axum::Router::new().route("/dashboard", get(dashboard)),
//!     GateConfig::default(),
//! );
//! ```

mod config;
mod cookies;
mod gate;

pub use config::GateConfig;
pub use gate::{GateDecision, protect, route_gate};
