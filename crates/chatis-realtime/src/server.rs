//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use chatis_auth::jwt::JwtDecoder;
use chatis_core::config::RealtimeConfig;
use chatis_core::result::AppResult;
use chatis_database::store::{MessageStore, UserStore};

use crate::connection::authenticator::{AuthenticatedIdentity, IdentityVerifier};
use crate::connection::handle::{CloseReason, ConnectionHandle};
use crate::connection::heartbeat::HeartbeatConfig;
use crate::connection::lifecycle::ConnectionState;
use crate::message::serializer::decode_client_event;
use crate::message::types::{ClientEvent, ServerEvent};
use crate::metrics::RealtimeMetrics;
use crate::presence::PresenceRegistry;
use crate::router::ConnectionRouter;

/// A registered connection, as handed to the transport layer.
#[derive(Debug)]
pub struct Session {
    /// Who is connected.
    pub identity: AuthenticatedIdentity,
    /// Router-side handle.
    pub handle: Arc<ConnectionHandle>,
    /// Events to write to the transport, in order.
    pub outbound: mpsc::Receiver<ServerEvent>,
}

/// Central real-time engine that coordinates all subsystems.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Identity verifier.
    pub verifier: Arc<IdentityVerifier>,
    /// Presence registry.
    pub presence: Arc<PresenceRegistry>,
    /// Connection router.
    pub router: Arc<ConnectionRouter>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    config: Arc<RealtimeConfig>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("router", &self.router)
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine with all subsystems.
    pub fn new(
        config: RealtimeConfig,
        decoder: Arc<JwtDecoder>,
        users: Arc<dyn UserStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let verifier = Arc::new(IdentityVerifier::new(decoder, users.clone()));
        let presence = Arc::new(PresenceRegistry::new(users.clone()));
        let router = Arc::new(ConnectionRouter::new(
            &config,
            presence.clone(),
            users,
            messages,
            metrics.clone(),
        ));

        info!(
            buffer = config.channel_buffer_size,
            supersede_policy = ?config.supersede_policy,
            "Real-time engine initialized"
        );

        Self {
            verifier,
            presence,
            router,
            metrics,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Keepalive settings for connection writer tasks.
    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig::from(self.config.as_ref())
    }

    /// Verify a bearer credential presented at connection time.
    pub async fn authenticate(&self, token: Option<&str>) -> AppResult<AuthenticatedIdentity> {
        self.verifier.verify(token).await
    }

    /// Register a verified identity and return its session.
    ///
    /// The initial presence snapshot is already queued on the session's
    /// outbound channel when this returns.
    pub async fn connect(&self, identity: AuthenticatedIdentity) -> AppResult<Session> {
        let (handle, outbound) = ConnectionHandle::new(
            &identity,
            self.config.channel_buffer_size,
            self.shutdown.child_token(),
        );
        handle.advance(ConnectionState::Authenticated)?;
        let handle = Arc::new(handle);

        let registration = self.router.register(Arc::clone(&handle));
        handle.advance(ConnectionState::Active)?;
        self.metrics.record_connect();

        info!(
            conn_id = %handle.id,
            user_id = %identity.user_id,
            "Connection registered"
        );

        let _ = self.presence.persist(&registration.presence).await;

        Ok(Session {
            identity,
            handle,
            outbound,
        })
    }

    /// Tear down a connection: close it, unregister it if it still owns its
    /// identity, and persist the offline state.
    pub async fn disconnect(&self, handle: &ConnectionHandle, reason: CloseReason) {
        handle.close(reason);

        if let Some(change) = self.router.unregister(handle.user_id, handle.id) {
            let _ = self.presence.persist(&change).await;
        }
        self.metrics.record_disconnect();

        info!(
            conn_id = %handle.id,
            user_id = %handle.user_id,
            reason = %handle.close_reason().unwrap_or(reason),
            "Connection closed"
        );
    }

    /// Process one inbound text frame from `handle`.
    ///
    /// Per-operation failures are reported back on the same connection and
    /// never escape this call.
    pub async fn handle_inbound(
        &self,
        identity: &AuthenticatedIdentity,
        handle: &ConnectionHandle,
        raw: &str,
    ) {
        handle.touch();

        let event = match decode_client_event(raw, self.config.max_message_bytes) {
            Ok(event) => event,
            Err(e) => {
                self.reject_frame(handle, e.message);
                return;
            }
        };
        debug!(conn_id = %handle.id, event = event.name(), "Inbound event");

        match event {
            ClientEvent::SendMessage(payload) => {
                if let Err(e) = self
                    .router
                    .send_message(
                        identity,
                        Some(handle),
                        payload.receiver_id,
                        payload.content,
                        payload.file,
                    )
                    .await
                {
                    self.router.deliver(handle, ServerEvent::message_error(e.message));
                }
            }
            ClientEvent::TypingStart(payload) => {
                self.router.relay_typing(identity, payload.receiver_id, true);
            }
            ClientEvent::TypingStop(payload) => {
                self.router.relay_typing(identity, payload.receiver_id, false);
            }
            ClientEvent::Logout => handle.close(CloseReason::Logout),
        }
    }

    /// Report a frame that could not be accepted as a protocol error.
    pub fn reject_frame(&self, handle: &ConnectionHandle, message: impl Into<String>) {
        let message = message.into();
        debug!(conn_id = %handle.id, reason = %message, "Protocol error");
        self.metrics.record_protocol_error();
        self.router.deliver(handle, ServerEvent::protocol_error(message));
    }

    /// Close every connection and stop accepting work.
    pub fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.router.close_all(CloseReason::Shutdown);
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use chatis_auth::jwt::JwtEncoder;
    use chatis_core::config::AuthConfig;
    use chatis_database::memory::{MemoryMessageStore, MemoryUserStore};

    use super::*;

    struct Fixture {
        engine: RealtimeEngine,
        users: Arc<MemoryUserStore>,
        encoder: JwtEncoder,
    }

    fn fixture() -> Fixture {
        let auth = AuthConfig {
            jwt_secret: "engine-test".to_string(),
            ..AuthConfig::default()
        };
        let users = Arc::new(MemoryUserStore::new());
        let engine = RealtimeEngine::new(
            RealtimeConfig::default(),
            Arc::new(JwtDecoder::new(&auth)),
            users.clone(),
            Arc::new(MemoryMessageStore::new()),
        );
        Fixture {
            engine,
            users,
            encoder: JwtEncoder::new(&auth),
        }
    }

    async fn open(fx: &Fixture, name: &str) -> Session {
        let user = fx.users.create(name);
        let token = fx.encoder.issue(user.id, name).unwrap();
        let identity = fx.engine.authenticate(Some(&token)).await.unwrap();
        fx.engine.connect(identity).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_activates_and_persists_presence() {
        let fx = fixture();
        let mut session = open(&fx, "alice").await;

        assert_eq!(session.handle.state(), ConnectionState::Active);
        assert!(matches!(session.outbound.try_recv(), Ok(ServerEvent::UsersOnline(_))));
        let stored = fx
            .users
            .find_by_id(session.identity.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_online);
    }

    #[tokio::test]
    async fn test_disconnect_persists_offline() {
        let fx = fixture();
        let session = open(&fx, "alice").await;
        fx.engine
            .disconnect(&session.handle, CloseReason::ClientClosed)
            .await;

        assert_eq!(session.handle.state(), ConnectionState::Closed);
        assert!(!fx.engine.presence.is_online(session.identity.user_id));
        let stored = fx
            .users
            .find_by_id(session.identity.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_online);
        assert_eq!(fx.engine.metrics.snapshot().connections_active, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_open() {
        let fx = fixture();
        let mut session = open(&fx, "alice").await;
        let _ = session.outbound.try_recv();

        fx.engine
            .handle_inbound(&session.identity, &session.handle, "{not json")
            .await;

        match session.outbound.try_recv() {
            Ok(ServerEvent::Error(payload)) => assert_eq!(payload.code, "PROTOCOL_ERROR"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!session.handle.is_closed());
    }

    #[tokio::test]
    async fn test_send_without_content_reports_message_error() {
        let fx = fixture();
        let mut session = open(&fx, "alice").await;
        let bob = fx.users.create("bob");
        let _ = session.outbound.try_recv();

        let raw = format!(r#"{{"event":"message:send","data":{{"receiverId":"{}"}}}}"#, bob.id);
        fx.engine
            .handle_inbound(&session.identity, &session.handle, &raw)
            .await;

        assert_eq!(
            session.outbound.try_recv().ok(),
            Some(ServerEvent::message_error("Message content or file is required"))
        );
    }

    #[tokio::test]
    async fn test_logout_closes_connection() {
        let fx = fixture();
        let session = open(&fx, "alice").await;

        fx.engine
            .handle_inbound(&session.identity, &session.handle, r#"{"event":"logout"}"#)
            .await;

        assert!(session.handle.is_closed());
        assert_eq!(session.handle.close_reason(), Some(CloseReason::Logout));
        session.handle.cancelled().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_sessions() {
        let fx = fixture();
        let session = open(&fx, "alice").await;
        fx.engine.shutdown();
        session.handle.cancelled().await;
        assert_eq!(session.handle.close_reason(), Some(CloseReason::Shutdown));
    }
}
