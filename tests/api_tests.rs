use axum_test::TestServer;
use serde_json::{json, Value};

use wishlist_sync::api::{create_router, AppState};

fn create_test_server() -> TestServer {
    let state = AppState::in_memory();
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

async fn sign_in(server: &TestServer, viewer_id: &str) -> Value {
    let response = server
        .put("/session")
        .json(&json!({ "viewer": { "id": viewer_id, "display_name": "Tester" } }))
        .await;
    response.assert_status_ok();
    response.json()
}

async fn sign_out(server: &TestServer) -> Value {
    let response = server.put("/session").json(&json!({ "viewer": null })).await;
    response.assert_status_ok();
    response.json()
}

async fn favorite_ids(server: &TestServer) -> Vec<i64> {
    let body: Value = server.get("/favorites").await.json();
    body["favorites"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

/// Polls until the remote feed has caught up with a toggle
async fn wait_for_ids(server: &TestServer, expected: Vec<i64>) {
    for _ in 0..100 {
        if favorite_ids(server).await == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("favorites never became {:?}", expected);
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_anonymous_toggle_flow() {
    let server = create_test_server();
    sign_out(&server).await;

    let response = server
        .post("/favorites/toggle")
        .json(&json!({
            "id": 42,
            "title": "Inception",
            "poster_path": "/inception.jpg",
            "vote_average": 8.4
        }))
        .await;
    response.assert_status_ok();
    let toggled: Value = response.json();
    assert_eq!(toggled["action"], "added");
    assert_eq!(toggled["message"], "Inception was added to your wishlist");

    let body: Value = server.get("/favorites").await.json();
    assert_eq!(body["scope"]["kind"], "local");
    assert_eq!(body["loading"], false);
    assert_eq!(body["count"], 1);
    assert_eq!(body["favorites"][0]["display_name"], "Inception");
    assert_eq!(
        body["favorites"][0]["poster_url"],
        "https://image.tmdb.org/t/p/w500/inception.jpg"
    );

    let response = server
        .post("/favorites/toggle")
        .json(&json!({ "id": 42, "title": "Inception" }))
        .await;
    let toggled: Value = response.json();
    assert_eq!(toggled["action"], "removed");
    assert!(favorite_ids(&server).await.is_empty());
}

#[tokio::test]
async fn test_sign_in_switches_to_viewer_list() {
    let server = create_test_server();
    sign_out(&server).await;

    server
        .post("/favorites/toggle")
        .json(&json!({ "id": 42, "title": "Inception" }))
        .await
        .assert_status_ok();

    let body = sign_in(&server, "U1").await;
    assert_eq!(body["scope"], json!({ "kind": "remote", "viewer_id": "U1" }));
    assert_eq!(body["count"], 0);

    let response = server
        .post("/favorites/toggle")
        .json(&json!({ "id": 7, "name": "Dune" }))
        .await;
    response.assert_status_ok();
    wait_for_ids(&server, vec![7]).await;

    // The anonymous list is still on the device, untouched
    let body = sign_out(&server).await;
    assert_eq!(body["scope"]["kind"], "local");
    assert_eq!(favorite_ids(&server).await, vec![42]);

    // And U1's list is still there after signing back in
    let body = sign_in(&server, "U1").await;
    assert_eq!(body["favorites"][0]["id"], 7);
    assert_eq!(body["favorites"][0]["status"], "want_to_watch");
}

#[tokio::test]
async fn test_viewers_do_not_share_lists() {
    let server = create_test_server();

    sign_in(&server, "U1").await;
    server
        .post("/favorites/toggle")
        .json(&json!({ "id": 7, "title": "Dune" }))
        .await
        .assert_status_ok();
    wait_for_ids(&server, vec![7]).await;

    let body = sign_in(&server, "U2").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_signed_in_toggles_pair_back_to_back() {
    let server = create_test_server();
    sign_in(&server, "U1").await;

    let first: Value = server
        .post("/favorites/toggle")
        .json(&json!({ "id": 7, "title": "Dune" }))
        .await
        .json();
    let second: Value = server
        .post("/favorites/toggle")
        .json(&json!({ "id": 7, "title": "Dune" }))
        .await
        .json();

    assert_eq!(first["action"], "added");
    assert_eq!(second["action"], "removed");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(favorite_ids(&server).await.is_empty());
}

#[tokio::test]
async fn test_listed_item_can_be_toggled_back() {
    let server = create_test_server();
    sign_out(&server).await;

    for (id, title) in [(1, "Alien"), (2, "Brazil")] {
        server
            .post("/favorites/toggle")
            .json(&json!({ "id": id, "title": title }))
            .await
            .assert_status_ok();
    }

    // Items from the listing carry status and added_at of their own
    let body: Value = server.get("/favorites").await.json();
    let listed = body["favorites"][1].clone();
    assert_eq!(listed["status"], "want_to_watch");

    let toggled: Value = server.post("/favorites/toggle").json(&listed).await.json();
    assert_eq!(toggled["action"], "removed");
    let toggled: Value = server.post("/favorites/toggle").json(&listed).await.json();
    assert_eq!(toggled["action"], "added");

    server
        .post("/favorites/toggle")
        .json(&json!({ "id": 3, "title": "Heat" }))
        .await
        .assert_status_ok();
    assert_eq!(favorite_ids(&server).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_session_roundtrip() {
    let server = create_test_server();

    let viewer: Value = server.get("/session").await.json();
    assert_eq!(viewer, Value::Null);

    sign_in(&server, "U1").await;
    let viewer: Value = server.get("/session").await.json();
    assert_eq!(viewer["id"], "U1");
    assert_eq!(viewer["display_name"], "Tester");
}

#[tokio::test]
async fn test_malformed_title_is_rejected() {
    let server = create_test_server();
    sign_out(&server).await;

    let response = server
        .post("/favorites/toggle")
        .json(&json!({ "title": "no id" }))
        .expect_failure()
        .await;
    assert!(response.status_code().is_client_error());
    assert!(favorite_ids(&server).await.is_empty());
}

#[tokio::test]
async fn test_lookup_without_metadata_provider() {
    let server = create_test_server();
    sign_out(&server).await;

    let response = server
        .post("/titles/27205/favorite")
        .expect_failure()
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("not configured"));

    let response = server
        .get("/titles/search")
        .add_query_param("q", "dune")
        .expect_failure()
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
}
