//! HTTP layer that puts the rate limiter in front of the greeting route.

mod server;
mod service;

pub use server::HttpServer;
pub use service::{client_identity, decision_response, error_response, protect, AppState, RATELIMIT_REMAINING};
