mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;

use chat_api::models::user::Identity;

fn bearer(identity: &Identity) -> String {
    format!("Bearer {}", common::mint_token(identity))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let (app, _state, _) = common::test_app(&[]);
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["status"], "ok");
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conversations_require_auth() {
    let (app, _state, _) = common::test_app(&common::everyone());
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/api/v1/conversations").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json::<Value>()["error"]["code"], "UNAUTHORIZED");

    let resp = server
        .get("/api/v1/conversations")
        .add_header(AUTHORIZATION, "Bearer not-a-jwt")
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn conversations_are_listed_newest_first() {
    let (app, state, _) = common::test_app(&common::everyone());
    let server = TestServer::new(app).unwrap();
    let direct = &state.gateway.direct;

    direct.send(&common::bob(), "alice", "from bob").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    direct.send(&common::carol(), "alice", "from carol").await.unwrap();
    direct.send(&common::carol(), "alice", "again").await.unwrap();

    let resp = server
        .get("/api/v1/conversations")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0]["with"], "carol");
    assert_eq!(conversations[0]["with_user_id"], "usr_carol");
    assert_eq!(conversations[0]["last_message"], "again");
    assert_eq!(conversations[0]["unread_count"], 2);
    assert_eq!(conversations[1]["with"], "bob");
    assert_eq!(conversations[1]["unread_count"], 1);
}

// ---------------------------------------------------------------------------
// GET /api/v1/unread, PUT /api/v1/conversations/:username/read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mark_read_clears_unread_total() {
    let (app, state, backends) = common::test_app(&common::everyone());
    let server = TestServer::new(app).unwrap();
    let direct = &state.gateway.direct;

    direct.send(&common::bob(), "alice", "one").await.unwrap();
    direct.send(&common::bob(), "alice", "two").await.unwrap();
    direct.send(&common::carol(), "alice", "three").await.unwrap();

    let resp = server
        .get("/api/v1/unread")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["unread_count"], 3);

    let resp = server
        .put("/api/v1/conversations/bob/read")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["marked"], 2);

    let resp = server
        .get("/api/v1/unread")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    assert_eq!(resp.json::<Value>()["unread_count"], 1);

    assert!(backends
        .store
        .direct_messages()
        .iter()
        .filter(|m| m.sender_id == "usr_bob")
        .all(|m| m.read));
}

#[tokio::test]
async fn mark_read_for_unknown_user_is_not_found() {
    let (app, _state, _) = common::test_app(&common::everyone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .put("/api/v1/conversations/ghost/read")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["error"]["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_excludes_caller() {
    let users = [
        common::alice(),
        common::bob(),
        Identity::new("usr_alina", "alina"),
    ];
    let (app, _state, _) = common::test_app(&users);
    let server = TestServer::new(app).unwrap();

    let resp = server
        .get("/api/v1/users/search")
        .add_query_param("q", "AL")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    let names: Vec<_> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["alina"]);
}

#[tokio::test]
async fn search_requires_query() {
    let (app, _state, _) = common::test_app(&common::everyone());
    let server = TestServer::new(app).unwrap();

    let resp = server
        .get("/api/v1/users/search")
        .add_query_param("q", "  ")
        .add_header(AUTHORIZATION, bearer(&common::alice()))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["field"], "q");
}
