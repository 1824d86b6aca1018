//! Radio relay HTTP server library.

pub mod config;
mod error;
mod handlers;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radio_engine::Relay;

/// State shared with request handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

/// Initialize logging.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "radio_relay=debug,radio_engine=debug,radio_transport=debug,radio_audio=debug,radio_encoder=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the HTTP router over a running relay.
///
/// Every route answers OPTIONS with an empty 200 and every response allows
/// any origin.
pub fn router(relay: Arc<Relay>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::index).options(handlers::preflight))
        .route("/offer", post(handlers::offer).options(handlers::preflight))
        .route("/genre", post(handlers::set_genre).options(handlers::preflight))
        .route(
            "/current-genre",
            get(handlers::current_genre).options(handlers::preflight),
        )
        .route("/events", get(handlers::events).options(handlers::preflight))
        .route("/notify", post(handlers::notify).options(handlers::preflight))
        .route("/stats", get(handlers::stats).options(handlers::preflight))
        .route(
            "/session/:id",
            delete(handlers::close_session).options(handlers::preflight),
        )
        .layer(cors)
        .with_state(AppState { relay })
}
