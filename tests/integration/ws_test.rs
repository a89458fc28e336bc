//! WebSocket integration tests.

use std::time::Duration;

use serde_json::json;
use tokio_tungstenite::tungstenite;

use chatis_core::config::SupersedePolicy;
use chatis_database::store::UserStore;

use crate::helpers::{TestApp, test_config};

const QUIET: Duration = Duration::from_millis(300);

#[tokio::test]
async fn test_two_party_conversation() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");

    let mut alice_ws = app.connect(&alice_token).await;
    assert_eq!(alice_ws.expect_online().await, vec!["alice"]);

    let mut bob_ws = app.connect(&bob_token).await;
    assert_eq!(bob_ws.expect_online().await, vec!["alice", "bob"]);
    assert_eq!(alice_ws.expect_online().await, vec!["alice", "bob"]);

    alice_ws
        .emit("message:send", json!({ "receiverId": bob.id, "content": "hi" }))
        .await;

    let received = bob_ws.expect("message:receive").await;
    assert_eq!(received["content"], "hi");
    assert_eq!(received["sender"]["displayName"], "alice");
    assert_eq!(received["receiver"]["id"], json!(bob.id));

    let notification = bob_ws.expect("notification:new").await;
    assert_eq!(notification["type"], "message");
    assert_eq!(notification["from"]["displayName"], "alice");
    assert_eq!(notification["content"], "hi");

    let sent = alice_ws.expect("message:sent").await;
    assert_eq!(sent["id"], received["id"]);
    assert_eq!(sent["content"], "hi");

    bob_ws.close().await;
    assert_eq!(alice_ws.expect_online().await, vec!["alice"]);

    // Bob is offline: the message is still stored and acknowledged.
    alice_ws
        .emit("message:send", json!({ "receiverId": bob.id, "content": "are you there?" }))
        .await;
    let sent = alice_ws.expect("message:sent").await;
    assert_eq!(sent["content"], "are you there?");

    let res = app
        .request("GET", &format!("/api/messages/{}", bob.id), None, Some(&alice_token))
        .await;
    assert_eq!(res.status, 200);
    let history = res.body["data"].as_array().expect("history list");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["content"], "hi");
    assert_eq!(history[1]["content"], "are you there?");
    assert_eq!(history[1]["sender"]["id"], json!(alice.id));
}

#[tokio::test]
async fn test_presence_is_persisted() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");

    let alice_ws = app.connect(&alice_token).await;
    let mut online = false;
    for _ in 0..50 {
        let user = app.users.find_by_id(alice.id).await.unwrap().unwrap();
        if user.is_online {
            online = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(online, "connect should persist online state");

    alice_ws.close().await;
    let mut offline = false;
    for _ in 0..50 {
        let user = app.users.find_by_id(alice.id).await.unwrap().unwrap();
        if !user.is_online && user.last_seen.is_some() {
            offline = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(offline, "disconnect should persist offline state");
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = TestApp::new().await;

    match app.try_connect(None).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 401);
            let body = String::from_utf8_lossy(response.body().as_deref().unwrap_or_default());
            assert!(body.contains("No token provided"), "body: {body}");
        }
        Ok(_) => panic!("connection without a token was accepted"),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = TestApp::new().await;

    match app.try_connect(Some("not-a-jwt")).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        Ok(_) => panic!("connection with a bad token was accepted"),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn test_token_for_deleted_user_is_rejected() {
    let app = TestApp::new().await;
    let (carol, token) = app.create_user("carol");
    app.users.remove(carol.id);

    match app.try_connect(Some(&token)).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 401);
            let body = String::from_utf8_lossy(response.body().as_deref().unwrap_or_default());
            assert!(body.contains("User not found"), "body: {body}");
        }
        Ok(_) => panic!("connection for a deleted user was accepted"),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn test_malformed_event_keeps_connection_open() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");

    let mut alice_ws = app.connect(&alice_token).await;
    alice_ws.expect_online().await;
    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;
    alice_ws.expect_online().await;

    alice_ws.send_raw("{not json").await;
    let error = alice_ws.expect("error").await;
    assert_eq!(error["code"], "PROTOCOL_ERROR");

    alice_ws.emit("typing:shout", json!({})).await;
    alice_ws.expect("error").await;

    // Still usable afterwards.
    alice_ws
        .emit("message:send", json!({ "receiverId": bob.id, "content": "still here" }))
        .await;
    assert_eq!(bob_ws.expect("message:receive").await["content"], "still here");
    alice_ws.expect("message:sent").await;
}

#[tokio::test]
async fn test_invalid_send_reports_message_error() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");

    let mut alice_ws = app.connect(&alice_token).await;
    alice_ws.expect_online().await;
    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;
    alice_ws.expect_online().await;

    alice_ws
        .emit("message:send", json!({ "receiverId": bob.id, "content": "   " }))
        .await;
    let error = alice_ws.expect("message:error").await;
    assert!(error["message"].is_string());

    bob_ws.expect_silence(QUIET).await;
    assert!(app.messages.is_empty().await);
}

#[tokio::test]
async fn test_typing_is_relayed() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");

    let mut alice_ws = app.connect(&alice_token).await;
    alice_ws.expect_online().await;
    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;
    alice_ws.expect_online().await;

    alice_ws.emit("typing:start", json!({ "receiverId": bob.id })).await;
    let started = bob_ws.expect("typing:start").await;
    assert_eq!(started["userId"], json!(alice.id));
    assert_eq!(started["username"], "alice");

    alice_ws.emit("typing:stop", json!({ "receiverId": bob.id })).await;
    let stopped = bob_ws.expect("typing:stop").await;
    assert_eq!(stopped["userId"], json!(alice.id));

    alice_ws.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_logout_closes_connection() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.create_user("alice");
    let (_, bob_token) = app.create_user("bob");

    let mut alice_ws = app.connect(&alice_token).await;
    alice_ws.expect_online().await;
    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;
    alice_ws.expect_online().await;

    alice_ws.send_raw(r#"{"event":"logout"}"#).await;
    let frame = alice_ws.expect_close().await.expect("close frame");
    assert_eq!(frame.reason.as_str(), "logout");

    assert_eq!(bob_ws.expect_online().await, vec!["bob"]);
}

#[tokio::test]
async fn test_new_connection_supersedes_old_one() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");
    let (_, bob_token) = app.create_user("bob");

    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;

    let mut first = app.connect(&alice_token).await;
    first.expect_online().await;
    bob_ws.expect_online().await;

    let mut second = app.connect(&alice_token).await;
    assert_eq!(second.expect_online().await, vec!["bob", "alice"]);

    let frame = first.expect_close().await.expect("close frame");
    assert_eq!(frame.reason.as_str(), "superseded");

    // Alice never went offline, so Bob sees no departure.
    assert_eq!(bob_ws.expect_online().await, vec!["bob", "alice"]);
    bob_ws.expect_silence(QUIET).await;
    assert!(app.state.realtime.presence.is_online(alice.id));

    bob_ws.emit("typing:start", json!({ "receiverId": alice.id })).await;
    second.expect("typing:start").await;
}

#[tokio::test]
async fn test_keep_policy_leaves_old_connection_open() {
    let mut config = test_config();
    config.realtime.supersede_policy = SupersedePolicy::Keep;
    let app = TestApp::with_config(config).await;
    let (alice, alice_token) = app.create_user("alice");
    let (_, bob_token) = app.create_user("bob");

    let mut first = app.connect(&alice_token).await;
    first.expect_online().await;
    let mut second = app.connect(&alice_token).await;
    second.expect_online().await;
    first.expect_silence(QUIET).await;

    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;
    second.expect_online().await;

    bob_ws.emit("typing:start", json!({ "receiverId": alice.id })).await;
    second.expect("typing:start").await;
    first.expect_silence(QUIET).await;

    // The stale connection leaving does not take Alice offline.
    first.close().await;
    bob_ws.expect_silence(QUIET).await;
    assert!(app.state.realtime.presence.is_online(alice.id));
}

#[tokio::test]
async fn test_silent_client_is_dropped() {
    let mut config = test_config();
    config.realtime.ping_interval_seconds = 1;
    config.realtime.ping_timeout_seconds = 1;
    let app = TestApp::with_config(config).await;
    let (_, token) = app.create_user("alice");

    let mut ws = app.connect(&token).await;
    // Not reading means pings are never answered.
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let frame = ws.expect_close().await.expect("close frame");
    assert_eq!(frame.reason.as_str(), "heartbeat timeout");
}
