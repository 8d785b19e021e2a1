//! Application setup and server configuration.

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::kernel::ServerDeps;
use crate::server::middleware::extract_client_ip;
use crate::server::routes::{
    assign_ticket_handler, cancel_ticket_handler, capture_handler, create_ticket_handler,
    finalize_ticket_handler, health_handler, list_tickets_handler, ticket_stream_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
}

async fn welcome_handler() -> Json<Value> {
    Json(json!({ "message": "Welcome to the ticket system" }))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
        .allow_headers([CONTENT_TYPE])
}

/// Build the Axum application router
///
/// An empty `allowed_origins` allows any origin.
pub fn build_app(deps: ServerDeps, allowed_origins: &[String]) -> Router {
    let state = AppState { deps };

    Router::new()
        .route("/", get(welcome_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/tickets",
            get(list_tickets_handler).post(create_ticket_handler),
        )
        .route("/api/tickets/cancel", post(cancel_ticket_handler))
        .route("/api/tickets/assign", post(assign_ticket_handler))
        .route("/api/tickets/finalize", post(finalize_ticket_handler))
        .route("/api/tickets/stream", get(ticket_stream_handler))
        .route("/capture", get(capture_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
