//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use chatis_auth::jwt::JwtDecoder;
use chatis_core::config::AppConfig;
use chatis_database::store::{MessageStore, UserStore};
use chatis_realtime::RealtimeEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// WebSocket realtime engine
    pub realtime: RealtimeEngine,
    /// Identity store
    pub users: Arc<dyn UserStore>,
    /// Message store
    pub messages: Arc<dyn MessageStore>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("realtime", &self.realtime)
            .finish()
    }
}

impl AppState {
    /// Wire the real-time engine over the given stores.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        let decoder = Arc::new(JwtDecoder::new(&config.auth));
        let realtime = RealtimeEngine::new(
            config.realtime.clone(),
            decoder,
            users.clone(),
            messages.clone(),
        );

        Self {
            config: Arc::new(config),
            realtime,
            users,
            messages,
            started_at: Instant::now(),
        }
    }
}
