//! REST endpoint integration tests.

use serde_json::json;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("alice");
    let mut ws = app.connect(&token).await;
    ws.expect_online().await;

    let res = app.request("GET", "/api/health", None, None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "ok");
    assert_eq!(res.body["onlineUsers"], 1);
    assert_eq!(res.body["connections"], 1);
    assert_eq!(res.body["metrics"]["connectionsTotal"], 1);
}

#[tokio::test]
async fn test_requires_authentication() {
    let app = TestApp::new().await;

    let res = app.request("GET", "/api/users", None, None).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["error"], "UNAUTHORIZED");

    let res = app.request("GET", "/api/users", None, Some("garbage")).await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_list_users_excludes_caller_and_reports_presence() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");
    let (carol, _) = app.create_user("carol");

    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;

    let res = app.request("GET", "/api/users", None, Some(&alice_token)).await;
    assert_eq!(res.status, 200);
    let users = res.body["data"].as_array().expect("user list");
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u["id"] != json!(alice.id)));

    let bob_entry = users.iter().find(|u| u["id"] == json!(bob.id)).expect("bob listed");
    assert_eq!(bob_entry["isOnline"], true);
    let carol_entry = users.iter().find(|u| u["id"] == json!(carol.id)).expect("carol listed");
    assert_eq!(carol_entry["isOnline"], false);

    let res = app.request("GET", "/api/users/online", None, Some(&alice_token)).await;
    assert_eq!(res.status, 200);
    let online = res.body["data"].as_array().expect("online list");
    assert_eq!(online.len(), 1);
    assert_eq!(online[0]["displayName"], "bob");
}

#[tokio::test]
async fn test_history_for_unknown_user_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("alice");

    let res = app
        .request(
            "GET",
            &format!("/api/messages/{}", uuid::Uuid::new_v4()),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["message"], "User not found");
}

#[tokio::test]
async fn test_mark_read() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");

    let mut alice_ws = app.connect(&alice_token).await;
    alice_ws.expect_online().await;
    for text in ["one", "two"] {
        alice_ws
            .emit("message:send", json!({ "receiverId": bob.id, "content": text }))
            .await;
        alice_ws.expect("message:sent").await;
    }

    let res = app
        .request("PUT", &format!("/api/messages/read/{}", alice.id), None, Some(&bob_token))
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["data"]["message"], "Messages marked as read");
    assert_eq!(res.body["data"]["updated"], 2);

    // Idempotent.
    let res = app
        .request("PUT", &format!("/api/messages/read/{}", alice.id), None, Some(&bob_token))
        .await;
    assert_eq!(res.body["data"]["updated"], 0);

    let res = app
        .request("GET", &format!("/api/messages/{}", alice.id), None, Some(&bob_token))
        .await;
    let history = res.body["data"].as_array().expect("history list");
    assert!(history.iter().all(|m| m["isRead"] == true));
}

#[tokio::test]
async fn test_upload_delivers_file_message() {
    let app = TestApp::new().await;
    let (alice, alice_token) = app.create_user("alice");
    let (bob, bob_token) = app.create_user("bob");

    let mut bob_ws = app.connect(&bob_token).await;
    bob_ws.expect_online().await;

    let data = b"%PDF-1.4 fake";
    let res = app
        .upload(
            &bob.id.to_string(),
            &alice_token,
            "report.pdf",
            "application/pdf",
            data,
            Some("quarterly numbers"),
        )
        .await;
    assert_eq!(res.status, 200, "body: {}", res.body);
    let record = &res.body["data"];
    assert_eq!(record["content"], "quarterly numbers");
    assert_eq!(record["file"]["name"], "report.pdf");
    assert_eq!(record["file"]["size"], data.len());
    let url = record["file"]["url"].as_str().expect("file url").to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".pdf"));

    let received = bob_ws.expect("message:receive").await;
    assert_eq!(received["id"], record["id"]);
    assert_eq!(received["sender"]["id"], json!(alice.id));
    bob_ws.expect("notification:new").await;

    let (status, bytes) = app.get_bytes(&url).await;
    assert_eq!(status, 200);
    assert_eq!(bytes, data);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_type() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.create_user("alice");
    let (bob, _) = app.create_user("bob");

    let res = app
        .upload(
            &bob.id.to_string(),
            &alice_token,
            "run.exe",
            "application/x-msdownload",
            b"MZ",
            None,
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["error"], "VALIDATION_ERROR");
    assert!(app.messages.is_empty().await);
}
