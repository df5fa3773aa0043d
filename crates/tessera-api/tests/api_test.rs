// Tessera
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! End-to-end tests through the router

use http_body_util::BodyExt;
use hyper::{Method, Request, StatusCode, body::Bytes};
use serde_json::{Value, json};
use std::time::Duration;
use tessera_api::router::Router;
use tessera_core::{CoreConfig, TesseraSystem};

fn router_with(config: CoreConfig) -> Router {
    Router::new(TesseraSystem::new(&config), Duration::from_secs(30)).unwrap()
}

fn router() -> Router {
    router_with(CoreConfig::default())
}

async fn send(router: &Router, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = body.map(|b| Bytes::from(b.to_string())).unwrap_or_default();

    let response = router.handle(builder.body(body).unwrap()).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

/// Register and log in; returns (user id, access token, refresh token)
async fn sign_up(router: &Router, email: &str) -> (u64, String, String) {
    let (status, user) = send(
        router,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": email, "password": "pa55word", "first_name": "Test", "last_name": "User"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tokens) = send(router, Method::POST, "/auth/login", None, Some(json!({"email": email, "password": "pa55word"}))).await;
    assert_eq!(status, StatusCode::OK);

    (
        user["id"].as_u64().unwrap(),
        tokens["access_token"].as_str().unwrap().to_string(),
        tokens["refresh_token"].as_str().unwrap().to_string(),
    )
}

async fn create_workspace(router: &Router, token: &str, name: &str) -> u64 {
    let (status, workspace) = send(router, Method::POST, "/workspaces", Some(token), Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    workspace["id"].as_u64().unwrap()
}

#[tokio::test]
async fn test_register_login_refresh() {
    let router = router();
    let (_, _, refresh) = sign_up(&router, "alice@example.com").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "alice@example.com", "password": "x", "first_name": "A", "last_name": "B"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (status, _) = send(&router, Method::POST, "/auth/login", None, Some(json!({"email": "alice@example.com", "password": "wrong"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, tokens) = send(&router, Method::POST, "/auth/refresh-token", None, Some(json!({"token": refresh}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["refresh_token"], refresh.as_str());
    assert!(tokens["access_token"].as_str().is_some());

    let (status, _) = send(&router, Method::POST, "/auth/refresh-token", None, Some(json!({"token": "unknown"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let router = router_with(CoreConfig {
        refresh_token_ttl: Duration::ZERO,
        ..CoreConfig::default()
    });
    let (_, _, refresh) = sign_up(&router, "alice@example.com").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, _) = send(&router, Method::POST, "/auth/refresh-token", None, Some(json!({"token": refresh}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, Method::POST, "/auth/refresh-token", None, Some(json!({"token": refresh}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_routes_require_bearer() {
    let router = router();

    let (status, body) = send(&router, Method::GET, "/workspaces", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["instance"], "/workspaces");

    let (status, _) = send(&router, Method::GET, "/workspaces", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_grant_and_revoke_flow() {
    let router = router();
    let (_, alice, _) = sign_up(&router, "alice@example.com").await;
    let (bob_id, bob, _) = sign_up(&router, "bob@example.com").await;
    let id = create_workspace(&router, &alice, "Team").await;
    let workspace = format!("/workspaces/{}", id);
    let bob_permissions = format!("/workspaces/{}/users/{}/permissions", id, bob_id);

    let (status, _) = send(&router, Method::GET, &workspace, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Bob cannot grant himself anything
    let (status, _) = send(&router, Method::POST, &bob_permissions, Some(&bob), Some(json!(["READ"]))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&router, Method::POST, &bob_permissions, Some(&alice), Some(json!(["read"]))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().is_some());

    let (status, fetched) = send(&router, Method::GET, &workspace, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Team");

    let (status, _) = send(&router, Method::POST, &bob_permissions, Some(&alice), Some(json!(["FLY"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown_user = format!("/workspaces/{}/users/999/permissions", id);
    let (status, _) = send(&router, Method::POST, &unknown_user, Some(&alice), Some(json!(["READ"]))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let unknown_workspace = format!("/workspaces/999/users/{}/permissions", bob_id);
    let (status, _) = send(&router, Method::POST, &unknown_workspace, Some(&alice), Some(json!(["READ"]))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for _ in 0..2 {
        let (status, _) = send(&router, Method::DELETE, &bob_permissions, Some(&alice), Some(json!(["READ"]))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = send(&router, Method::GET, &workspace, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_membership_flow() {
    let router = router();
    let (_, alice, _) = sign_up(&router, "alice@example.com").await;
    let (bob_id, bob, _) = sign_up(&router, "bob@example.com").await;
    let id = create_workspace(&router, &alice, "Team").await;
    create_workspace(&router, &alice, "Private").await;

    let (status, workspace) = send(&router, Method::POST, &format!("/workspaces/{}/users", id), Some(&alice), Some(json!([bob_id]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(workspace["members"], json!([bob_id]));

    let (status, visible) = send(&router, Method::GET, "/workspaces", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible.as_array().unwrap().len(), 1);
    assert_eq!(visible[0]["id"], id);

    // Members read but do not write
    let (status, _) = send(&router, Method::PATCH, &format!("/workspaces/{}", id), Some(&bob), Some(json!({"name": "Mine"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let member = format!("/workspaces/{}/users/{}", id, bob_id);
    let (status, _) = send(&router, Method::DELETE, &member, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, Method::DELETE, &member, Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, visible) = send(&router, Method::GET, "/workspaces", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible, json!([]));
}

#[tokio::test]
async fn test_update_and_delete_workspace() {
    let router = router();
    let (_, alice, _) = sign_up(&router, "alice@example.com").await;
    let id = create_workspace(&router, &alice, "Team").await;
    let path = format!("/workspaces/{}", id);

    let (status, updated) = send(&router, Method::PATCH, &path, Some(&alice), Some(json!({"description": "Shared space"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Shared space");
    assert_eq!(updated["name"], "Team");

    let (status, _) = send(&router, Method::DELETE, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, Method::GET, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body() {
    let router = router();
    let (_, alice, _) = sign_up(&router, "alice@example.com").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/workspaces")
        .header("authorization", format!("Bearer {}", alice))
        .body(Bytes::from_static(b"{not json"))
        .unwrap();
    let response = router.handle(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
