pub mod compression;
pub mod error;
pub mod logging;
pub mod webhook;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware, routing::any};

use skill_db::Store;

pub use error::WebhookError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Box<dyn Store>,
}

impl AppStateInner {
    pub fn new(store: impl Store + 'static) -> AppState {
        Arc::new(Self {
            store: Box::new(store),
        })
    }
}

/// The skill's HTTP surface: request logging around gzip negotiation
/// around the webhook.
///
/// The route accepts every method so that method filtering stays with the
/// webhook (405 with an empty body).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(webhook::webhook))
        .layer(DefaultBodyLimit::max(compression::MAX_BODY_BYTES))
        .layer(middleware::from_fn(compression::negotiate_gzip))
        .layer(middleware::from_fn(logging::log_requests))
        .with_state(state)
}
