//! Integration tests: the full HTTP + WebSocket stack over in-memory stores.

mod helpers;
mod http_test;
mod ws_test;
