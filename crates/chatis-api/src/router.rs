//! Route definitions for the Chatis HTTP API.
//!
//! REST routes are mounted under `/api`, the WebSocket endpoint at `/ws`,
//! and uploaded files are served from the configured public path.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let uploads = &state.config.uploads;
    let max_body = (uploads.max_file_size_bytes as usize).saturating_add(MULTIPART_OVERHEAD);
    let public_path = format!("/{}", uploads.public_path.trim_matches('/'));
    let serve_uploads = ServeDir::new(&uploads.directory);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .merge(user_routes())
        .merge(message_routes());

    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_upgrade))
        .nest_service(&public_path, serve_uploads)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// User listing
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::user::list_users))
        .route("/users/online", get(handlers::user::list_online))
}

/// Conversation history, read-state, and file messages
fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/messages/{user_id}", get(handlers::message::history))
        .route("/messages/read/{user_id}", put(handlers::message::mark_read))
        .route(
            "/messages/upload/{receiver_id}",
            post(handlers::upload::upload),
        )
}
