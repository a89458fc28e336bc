//! Shared test helpers for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use futures::{SinkExt, StreamExt};
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;
use uuid::Uuid;

use chatis_api::{AppState, build_router};
use chatis_auth::jwt::JwtEncoder;
use chatis_core::config::AppConfig;
use chatis_database::memory::{MemoryMessageStore, MemoryUserStore};
use chatis_entity::user::User;

/// How long to wait for an expected event.
const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration used by every test app unless overridden.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config.uploads.directory = std::env::temp_dir()
        .join(format!("chatis-test-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    config
}

/// Test application context
pub struct TestApp {
    /// The Axum router for making in-process requests
    pub router: Router,
    /// Address of the live server (WebSocket tests)
    pub addr: SocketAddr,
    /// Shared application state
    pub state: AppState,
    /// Identity store backing the app
    pub users: Arc<MemoryUserStore>,
    /// Message store backing the app
    pub messages: Arc<MemoryMessageStore>,
    encoder: JwtEncoder,
    upload_dir: PathBuf,
    server: JoinHandle<()>,
}

impl TestApp {
    /// Create a new test application with default test settings
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a new test application and serve it on an ephemeral port
    pub async fn with_config(config: AppConfig) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let messages = Arc::new(MemoryMessageStore::new());
        let encoder = JwtEncoder::new(&config.auth);
        let upload_dir = PathBuf::from(&config.uploads.directory);

        let state = AppState::new(config, users.clone(), messages.clone());
        let router = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");
        let app = router.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            router,
            addr,
            state,
            users,
            messages,
            encoder,
            upload_dir,
            server,
        }
    }

    /// Create a user and a valid bearer token for it
    pub fn create_user(&self, username: &str) -> (User, String) {
        let user = self.users.create(username);
        let token = self
            .encoder
            .issue(user.id, username)
            .expect("Failed to issue token");
        (user, token)
    }

    /// Make a JSON HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Upload a file as a multipart form
    pub async fn upload(
        &self,
        receiver: &str,
        token: &str,
        file_name: &str,
        media_type: &str,
        data: &[u8],
        content: Option<&str>,
    ) -> TestResponse {
        let boundary = "chatis-test-boundary";
        let mut body = Vec::new();
        if let Some(content) = content {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\n{content}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {media_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/messages/upload/{receiver}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Fetch raw bytes from the app
    pub async fn get_bytes(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body");
        (status, bytes.to_vec())
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Open a WebSocket with `?token=`, returning the handshake error on rejection
    pub async fn try_connect(
        &self,
        token: Option<&str>,
    ) -> Result<WsClient, tokio_tungstenite::tungstenite::Error> {
        let url = match token {
            Some(token) => format!("ws://{}/ws?token={token}", self.addr),
            None => format!("ws://{}/ws", self.addr),
        };
        let (stream, _) = connect_async(url).await?;
        Ok(WsClient { stream })
    }

    /// Open a WebSocket that must be accepted
    pub async fn connect(&self, token: &str) -> WsClient {
        self.try_connect(Some(token))
            .await
            .expect("WebSocket connection refused")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// JSON body, or `Null` if the body was not JSON
    pub body: Value,
}

/// Event-level WebSocket test client.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Send `{"event": name, "data": data}`
    pub async fn emit(&mut self, event: &str, data: Value) {
        self.send_raw(&json!({ "event": event, "data": data }).to_string())
            .await;
    }

    /// Send a raw text frame
    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::text(text))
            .await
            .expect("Failed to send frame");
    }

    /// Next server event as `(name, data)`, skipping control frames
    pub async fn next_event(&mut self) -> (String, Value) {
        loop {
            let frame = tokio::time::timeout(EVENT_TIMEOUT, self.stream.next())
                .await
                .expect("Timed out waiting for an event")
                .expect("Connection ended")
                .expect("WebSocket error");
            match frame {
                Message::Text(text) => {
                    let value: Value =
                        serde_json::from_str(text.as_str()).expect("Event is not JSON");
                    let name = value["event"].as_str().expect("Event has no name").to_string();
                    return (name, value["data"].clone());
                }
                Message::Close(frame) => panic!("Connection closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Next event, which must be named `name`; returns its payload
    pub async fn expect(&mut self, name: &str) -> Value {
        let (got, data) = self.next_event().await;
        assert_eq!(got, name, "unexpected event with payload {data}");
        data
    }

    /// Next `users:online` snapshot as display names
    pub async fn expect_online(&mut self) -> Vec<String> {
        self.expect("users:online")
            .await
            .as_array()
            .expect("users:online payload is not a list")
            .iter()
            .map(|u| u["displayName"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Assert that no text event arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return,
                Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected event {text}"),
                Ok(Some(Ok(_))) => continue,
                Ok(other) => panic!("connection ended: {other:?}"),
            }
        }
    }

    /// Read until the server's close frame arrives
    pub async fn expect_close(&mut self) -> Option<CloseFrame> {
        loop {
            let frame = tokio::time::timeout(EVENT_TIMEOUT * 2, self.stream.next())
                .await
                .expect("Timed out waiting for close");
            match frame {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    }

    /// Close from the client side
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
