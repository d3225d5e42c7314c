#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
#[cfg(feature = "gate")]
pub mod middleware;
pub mod oauth;
pub mod photos;
pub mod refresh;
pub mod session;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use client::SessionClient;
pub use config::SessionConfig;
pub use dispatch::{Dispatcher, PendingRequest};
pub use error::Error;
pub use oauth::{CallbackOutcome, CallbackParams};
pub use photos::{Photo, PhotosApi, TopPick};
pub use refresh::RefreshCoordinator;
pub use session::{SessionContext, SessionState};
pub use token_store::TokenStore;
pub use types::{Credentials, LoginResponse, Navigation, Registration, SessionUser, UserId};
