use crate::{build_router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tm_core::auth::{issue_token, JwtConfig, TokenUse};
use tower::ServiceExt;

fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "tripmates-test".into(),
        audience: "tripmates-api-test".into(),
        secret: "contract-test-secret".into(),
        access_ttl_seconds: 300,
        refresh_ttl_seconds: 3600,
    }
}

async fn test_state_with_window(feed_window: i64) -> AppState {
    let pool = tm_core::db::connect_memory().await.expect("connect database");
    tm_core::migrations::run(&pool).await.expect("run migrations");
    AppState {
        pool,
        jwt_config: jwt_config(),
        feed_window,
    }
}

async fn test_state() -> AppState {
    test_state_with_window(20).await
}

/// Inserts an account directly and mints an access token for it.
async fn seed_user(state: &AppState, username: &str) -> (i64, String) {
    let user_id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, full_name, created_at) \
         VALUES (?, ?, 'not-a-login-account', ?, 0)",
    )
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(format!("{username} traveller"))
    .execute(&state.pool)
    .await
    .expect("insert user")
    .last_insert_rowid();
    let (token, _) = issue_token(user_id, TokenUse::Access, &state.jwt_config).expect("token");
    (user_id, token)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, payload)
}

async fn count(state: &AppState, sql: &str, id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(&state.pool)
        .await
        .expect("count")
}

async fn notifications_for(state: &AppState, user_id: i64) -> i64 {
    count(
        state,
        "SELECT COUNT(*) FROM notifications WHERE receiver_id = ?",
        user_id,
    )
    .await
}

async fn create_general_post(app: &Router, token: &str, content: &str) -> i64 {
    let (status, payload) = call(
        app,
        "POST",
        "/v1/general-posts",
        Some(token),
        Some(json!({ "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    payload.get("id").and_then(Value::as_i64).expect("post id")
}

async fn create_trip_post(app: &Router, token: &str, title: &str) -> i64 {
    let (status, payload) = call(
        app,
        "POST",
        "/v1/trips",
        Some(token),
        Some(json!({ "title": title, "location_summary": "Himachal" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    payload.get("id").and_then(Value::as_i64).expect("trip id")
}

async fn create_joinable_trip(app: &Router, token: &str, title: &str, max_members: i64) -> i64 {
    let (status, payload) = call(
        app,
        "POST",
        "/v1/joinable-trips",
        Some(token),
        Some(json!({
            "title": title,
            "destination": "Spiti",
            "max_members": max_members,
            "budget": 15000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    payload.get("id").and_then(Value::as_i64).expect("joinable trip id")
}

async fn backdate(state: &AppState, table: &str, id: i64, created_at: i64) {
    sqlx::query(&format!("UPDATE {table} SET created_at = ? WHERE id = ?"))
        .bind(created_at)
        .bind(id)
        .execute(&state.pool)
        .await
        .expect("backdate");
}

fn feed_keys(payload: &Value) -> Vec<(String, i64)> {
    payload
        .as_array()
        .expect("feed array")
        .iter()
        .map(|item| {
            (
                item.get("post_type")
                    .and_then(Value::as_str)
                    .expect("post_type")
                    .to_string(),
                item.get("id").and_then(Value::as_i64).expect("id"),
            )
        })
        .collect()
}

#[tokio::test]
async fn healthz_contract_ok() {
    let app = build_router(test_state().await);
    let (status, payload) = call(&app, "GET", "/healthz", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("ok"));
}

#[tokio::test]
async fn openapi_contract_lists_routes() {
    let app = build_router(test_state().await);
    let (status, payload) = call(&app, "GET", "/v1/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("openapi").and_then(Value::as_str), Some("3.0.3"));
    assert!(payload.pointer("/paths/~1v1~1auth~1register/post").is_some());
    assert!(payload.pointer("/paths/~1v1~1feed~1for-you/get").is_some());
    assert!(payload
        .pointer("/paths/~1v1~1join-requests~1{id}~1accept/post")
        .is_some());
    assert!(payload
        .pointer("/paths/~1v1~1content~1{kind}~1{id}~1like/post")
        .is_some());
}

#[tokio::test]
async fn register_token_and_refresh_flow() {
    let app = build_router(test_state().await);

    let (status, payload) = call(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "username": "meera",
            "email": "meera@example.com",
            "password": "long-enough-secret",
            "full_name": "Meera Nair"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payload.get("username").and_then(Value::as_str), Some("meera"));

    let (status, payload) = call(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "username": "MEERA",
            "email": "other@example.com",
            "password": "long-enough-secret"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("VALIDATION_ERROR")
    );
    assert!(payload.pointer("/details/fields/username").is_some());

    let (status, payload) = call(
        &app,
        "POST",
        "/v1/auth/token",
        None,
        Some(json!({ "username": "meera", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload.get("code").and_then(Value::as_str), Some("AUTH_FAILED"));

    let (status, payload) = call(
        &app,
        "POST",
        "/v1/auth/token",
        None,
        Some(json!({ "username": "meera", "password": "long-enough-secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = payload
        .get("access")
        .and_then(Value::as_str)
        .expect("access")
        .to_string();
    let refresh = payload
        .get("refresh")
        .and_then(Value::as_str)
        .expect("refresh")
        .to_string();

    let (status, payload) = call(&app, "GET", "/v1/profile", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("email").and_then(Value::as_str),
        Some("meera@example.com")
    );
    assert_eq!(
        payload.get("full_name").and_then(Value::as_str),
        Some("Meera Nair")
    );

    let (status, payload) = call(
        &app,
        "POST",
        "/v1/auth/token/refresh",
        None,
        Some(json!({ "refresh": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(payload.get("access").and_then(Value::as_str).is_some());

    let (status, _) = call(
        &app,
        "POST",
        "/v1/auth/token/refresh",
        None,
        Some(json!({ "refresh": access })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = build_router(test_state().await);
    let request = Request::builder()
        .method("GET")
        .uri("/v1/feed/for-you")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("www-authenticate").is_some());
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("AUTH_REQUIRED")
    );
}

#[tokio::test]
async fn profile_update_and_public_profile() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);

    let (status, payload) = call(
        &app,
        "PATCH",
        "/v1/profile",
        Some(&alice),
        Some(json!({ "bio": "  chasing sunsets  ", "avatar": "avatars/alice.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("bio").and_then(Value::as_str),
        Some("chasing sunsets")
    );

    let (status, payload) = call(&app, "GET", "/v1/users/alice", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("avatar").and_then(Value::as_str),
        Some("avatars/alice.jpg")
    );
    assert!(payload.get("email").is_none());
    assert_eq!(
        payload.get("follow_status").and_then(Value::as_str),
        Some("none")
    );

    let (status, _) = call(&app, "GET", "/v1/users/nobody", Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_email_change_is_validated_and_unique() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);

    let (status, payload) = call(
        &app,
        "PATCH",
        "/v1/profile",
        Some(&alice),
        Some(json!({ "email": " alice@trails.io " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("email").and_then(Value::as_str),
        Some("alice@trails.io")
    );

    let (status, payload) = call(
        &app,
        "PATCH",
        "/v1/profile",
        Some(&bob),
        Some(json!({ "email": "ALICE@trails.io" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("VALIDATION_ERROR")
    );
    assert!(payload.pointer("/details/fields/email").is_some());

    let (status, payload) = call(
        &app,
        "PATCH",
        "/v1/profile",
        Some(&bob),
        Some(json!({ "email": "not-an-address" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload.pointer("/details/fields/email").is_some());

    let (_, payload) = call(&app, "GET", "/v1/profile", Some(&bob), None).await;
    assert_eq!(
        payload.get("email").and_then(Value::as_str),
        Some("bob@example.com")
    );

    let (status, _) = call(
        &app,
        "PATCH",
        "/v1/profile",
        Some(&alice),
        Some(json!({ "email": "alice@trails.io" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn like_toggles_and_notifies_owner_once() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());
    let post_id = create_general_post(&app, &alice, "Sunrise at Tiger Hill").await;
    let uri = format!("/v1/content/general/{post_id}/like");

    let (status, payload) = call(&app, "POST", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("liked").and_then(Value::as_bool), Some(true));
    assert_eq!(payload.get("total_likes").and_then(Value::as_i64), Some(1));
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (_, payload) = call(&app, "POST", &uri, Some(&bob), None).await;
    assert_eq!(payload.get("liked").and_then(Value::as_bool), Some(false));
    assert_eq!(payload.get("total_likes").and_then(Value::as_i64), Some(0));
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (_, payload) = call(&app, "POST", &uri, Some(&alice), None).await;
    assert_eq!(payload.get("liked").and_then(Value::as_bool), Some(true));
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (status, payload) = call(
        &app,
        "GET",
        &format!("/v1/general-posts/{post_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("is_liked").and_then(Value::as_bool), Some(true));
    assert_eq!(payload.get("total_likes").and_then(Value::as_i64), Some(1));
}

#[tokio::test]
async fn unknown_content_kind_and_missing_content() {
    let state = test_state().await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);

    let (status, payload) = call(&app, "POST", "/v1/content/video/1/like", Some(&bob), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_CONTENT_TYPE")
    );

    let (status, payload) = call(&app, "POST", "/v1/content/trip/999/save", Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload.get("code").and_then(Value::as_str), Some("NOT_FOUND"));
}

#[tokio::test]
async fn comments_validate_notify_and_restrict_deletes() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let (_, carol) = seed_user(&state, "carol").await;
    let app = build_router(state.clone());
    let trip_id = create_trip_post(&app, &alice, "Hampta Pass").await;
    let uri = format!("/v1/content/trip/{trip_id}/comments");

    let (status, _) = call(&app, "POST", &uri, Some(&bob), Some(json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(notifications_for(&state, alice_id).await, 0);

    let (status, payload) = call(
        &app,
        "POST",
        &uri,
        Some(&bob),
        Some(json!({ "text": "Which month did you go?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        payload.pointer("/author/username").and_then(Value::as_str),
        Some("bob")
    );
    let comment_id = payload.get("id").and_then(Value::as_i64).expect("comment id");
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (status, payload) = call(&app, "GET", &uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let delete_uri = format!("/v1/comments/{comment_id}");
    let (status, _) = call(&app, "DELETE", &delete_uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "DELETE", &delete_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "DELETE", &delete_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "DELETE", &delete_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, payload) = call(&app, "GET", &uri, Some(&carol), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn saved_list_skips_vanished_content() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let app = build_router(state.clone());
    let post_id = create_general_post(&app, &alice, "Chai stop near Manali").await;

    let (_, payload) = call(
        &app,
        "POST",
        &format!("/v1/content/general/{post_id}/save"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(payload.get("saved").and_then(Value::as_bool), Some(true));

    sqlx::query(
        "INSERT INTO saves (user_id, content_kind, content_id, created_at) VALUES (?, 'trip', 4242, 1)",
    )
    .bind(alice_id)
    .execute(&state.pool)
    .await
    .expect("dangling save");

    let (status, payload) = call(&app, "GET", "/v1/saved", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed_keys(&payload), vec![("general".to_string(), post_id)]);
}

#[tokio::test]
async fn deleting_content_removes_its_interactions() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());
    let post_id = create_general_post(&app, &alice, "Night train to Goa").await;

    call(&app, "POST", &format!("/v1/content/general/{post_id}/like"), Some(&bob), None).await;
    call(&app, "POST", &format!("/v1/content/general/{post_id}/save"), Some(&bob), None).await;
    call(
        &app,
        "POST",
        &format!("/v1/content/general/{post_id}/comments"),
        Some(&bob),
        Some(json!({ "text": "Which train?" })),
    )
    .await;
    assert_eq!(notifications_for(&state, alice_id).await, 2);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/v1/general-posts/{post_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/v1/general-posts/{post_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for table in ["likes", "saves", "comments", "notifications"] {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE content_kind = 'general' AND content_id = ?"
        );
        assert_eq!(count(&state, &sql, post_id).await, 0, "{table} left behind");
    }
    let (_, payload) = call(&app, "GET", "/v1/saved", Some(&bob), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn follow_requests_accept_and_mates() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (bob_id, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());

    let (status, payload) = call(&app, "POST", "/v1/users/alice/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_OPERATION")
    );

    let (status, payload) = call(&app, "POST", "/v1/users/bob/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("following").and_then(Value::as_bool), Some(true));
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("pending"));
    let edge_id = payload.get("edge_id").and_then(Value::as_i64).expect("edge id");
    assert_eq!(notifications_for(&state, bob_id).await, 1);

    let (_, payload) = call(&app, "GET", "/v1/follows/requests", Some(&bob), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/follows/{edge_id}/accept"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, payload) = call(
        &app,
        "POST",
        &format!("/v1/follows/{edge_id}/accept"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("status").and_then(Value::as_str),
        Some("following")
    );
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (_, payload) = call(&app, "GET", "/v1/follows/mates", Some(&alice), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(0));

    let (_, payload) = call(&app, "POST", "/v1/users/alice/follow", Some(&bob), None).await;
    assert_eq!(
        payload.get("status").and_then(Value::as_str),
        Some("following")
    );

    let (_, payload) = call(&app, "GET", "/v1/follows/mates", Some(&alice), None).await;
    let mates: Vec<&str> = payload
        .as_array()
        .expect("mates")
        .iter()
        .filter_map(|mate| mate.get("username").and_then(Value::as_str))
        .collect();
    assert_eq!(mates, vec!["bob"]);

    let (_, payload) = call(&app, "GET", "/v1/users/bob/followers", Some(&alice), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let (_, payload) = call(&app, "POST", "/v1/users/bob/follow", Some(&alice), None).await;
    assert_eq!(payload.get("following").and_then(Value::as_bool), Some(false));
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("none"));
    let (_, payload) = call(&app, "GET", "/v1/follows/mates", Some(&bob), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn declined_follow_request_is_removed() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());

    let (_, payload) = call(&app, "POST", "/v1/users/bob/follow", Some(&alice), None).await;
    let edge_id = payload.get("edge_id").and_then(Value::as_i64).expect("edge id");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/follows/{edge_id}/decline"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, payload) = call(&app, "GET", "/v1/users/bob/follow-status", Some(&alice), None).await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("none"));
}

#[tokio::test]
async fn join_request_lifecycle_forms_group() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (bob_id, bob) = seed_user(&state, "bob").await;
    let (_, carol) = seed_user(&state, "carol").await;
    let app = build_router(state.clone());
    let trip_id = create_joinable_trip(&app, &alice, "Spiti winter", 4).await;
    let requests_uri = format!("/v1/joinable-trips/{trip_id}/requests");

    let (status, payload) = call(&app, "POST", &requests_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_OPERATION")
    );

    let (status, payload) = call(&app, "POST", &requests_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("pending"));
    let request_id = payload.get("id").and_then(Value::as_i64).expect("request id");
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (status, payload) = call(&app, "POST", &requests_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("id").and_then(Value::as_i64), Some(request_id));
    assert_eq!(notifications_for(&state, alice_id).await, 1);

    let (status, _) = call(&app, "GET", &requests_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let accept_uri = format!("/v1/join-requests/{request_id}/accept");
    let (status, _) = call(&app, "POST", &accept_uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, payload) = call(&app, "POST", &accept_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.pointer("/request/status").and_then(Value::as_str),
        Some("accepted")
    );
    assert_eq!(
        payload.pointer("/group/name").and_then(Value::as_str),
        Some("Spiti winter crew")
    );
    assert_eq!(
        payload.pointer("/group/member_count").and_then(Value::as_i64),
        Some(2)
    );
    let group_id = payload
        .pointer("/group/id")
        .and_then(Value::as_i64)
        .expect("group id");
    assert_eq!(notifications_for(&state, bob_id).await, 1);

    let (status, payload) = call(&app, "POST", &accept_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.pointer("/group/member_count").and_then(Value::as_i64),
        Some(2)
    );
    assert_eq!(notifications_for(&state, bob_id).await, 1);
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM trip_groups WHERE trip_id = ?",
            trip_id
        )
        .await,
        1
    );

    let (status, payload) = call(
        &app,
        "POST",
        &format!("/v1/join-requests/{request_id}/reject"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_STATE")
    );

    let (status, payload) = call(
        &app,
        "GET",
        &format!("/v1/groups/{group_id}/members"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<(&str, &str)> = payload
        .as_array()
        .expect("members")
        .iter()
        .map(|member| {
            (
                member.get("username").and_then(Value::as_str).unwrap_or_default(),
                member.get("role").and_then(Value::as_str).unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(roles, vec![("alice", "admin"), ("bob", "member")]);
}

#[tokio::test]
async fn rejected_request_cannot_be_accepted() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());
    let trip_id = create_joinable_trip(&app, &alice, "Coorg coffee trail", 5).await;

    let (_, payload) = call(
        &app,
        "POST",
        &format!("/v1/joinable-trips/{trip_id}/requests"),
        Some(&bob),
        None,
    )
    .await;
    let request_id = payload.get("id").and_then(Value::as_i64).expect("request id");
    let reject_uri = format!("/v1/join-requests/{request_id}/reject");

    let (status, payload) = call(&app, "POST", &reject_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("rejected"));

    let (status, _) = call(&app, "POST", &reject_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, payload) = call(
        &app,
        "POST",
        &format!("/v1/join-requests/{request_id}/accept"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_STATE")
    );
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM trip_groups WHERE trip_id = ?",
            trip_id
        )
        .await,
        0
    );
}

#[tokio::test]
async fn trip_fills_up_at_max_members() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let (_, carol) = seed_user(&state, "carol").await;
    let (_, dev) = seed_user(&state, "dev").await;
    let app = build_router(state.clone());
    let trip_id = create_joinable_trip(&app, &alice, "Valley of Flowers", 2).await;
    let requests_uri = format!("/v1/joinable-trips/{trip_id}/requests");

    let (_, payload) = call(&app, "POST", &requests_uri, Some(&bob), None).await;
    let bob_request = payload.get("id").and_then(Value::as_i64).expect("bob request");
    let (_, payload) = call(&app, "POST", &requests_uri, Some(&carol), None).await;
    let carol_request = payload.get("id").and_then(Value::as_i64).expect("carol request");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/join-requests/{bob_request}/accept"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, payload) = call(
        &app,
        "GET",
        &format!("/v1/joinable-trips/{trip_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("full"));
    assert_eq!(payload.get("member_count").and_then(Value::as_i64), Some(2));

    let (status, payload) = call(
        &app,
        "POST",
        &format!("/v1/join-requests/{carol_request}/accept"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload.get("code").and_then(Value::as_str), Some("TRIP_FULL"));

    let (status, payload) = call(&app, "POST", &requests_uri, Some(&dev), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_STATE")
    );
}

#[tokio::test]
async fn group_chat_is_members_only() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let (_, carol) = seed_user(&state, "carol").await;
    let app = build_router(state.clone());
    let trip_id = create_joinable_trip(&app, &alice, "Rann Utsav", 6).await;

    let (_, payload) = call(
        &app,
        "POST",
        &format!("/v1/joinable-trips/{trip_id}/requests"),
        Some(&bob),
        None,
    )
    .await;
    let request_id = payload.get("id").and_then(Value::as_i64).expect("request id");
    let (_, payload) = call(
        &app,
        "POST",
        &format!("/v1/join-requests/{request_id}/accept"),
        Some(&alice),
        None,
    )
    .await;
    let group_id = payload
        .pointer("/group/id")
        .and_then(Value::as_i64)
        .expect("group id");
    let messages_uri = format!("/v1/groups/{group_id}/messages");

    let (status, _) = call(
        &app,
        "POST",
        &messages_uri,
        Some(&bob),
        Some(json!({ "text": "Packing list?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        &app,
        "POST",
        &messages_uri,
        Some(&carol),
        Some(json!({ "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, payload) = call(&app, "GET", &messages_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.pointer("/0/sender/username").and_then(Value::as_str),
        Some("bob")
    );

    let (_, payload) = call(&app, "GET", "/v1/groups", Some(&bob), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    let (status, _) = call(&app, "GET", "/v1/groups/999/members", Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn direct_messages_track_unread() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (bob_id, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/messages/{alice_id}"),
        Some(&alice),
        Some(json!({ "text": "note to self" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/messages/{bob_id}"),
        Some(&alice),
        Some(json!({ "text": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for text in ["Are you in Leh next week?", "I have a spare seat"] {
        let (status, _) = call(
            &app,
            "POST",
            &format!("/v1/messages/{bob_id}"),
            Some(&alice),
            Some(json!({ "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, payload) = call(&app, "GET", "/v1/counts", Some(&bob), None).await;
    assert_eq!(payload.get("messages").and_then(Value::as_i64), Some(2));

    let (_, payload) = call(&app, "GET", "/v1/messages/conversations", Some(&bob), None).await;
    assert_eq!(
        payload.pointer("/0/user/username").and_then(Value::as_str),
        Some("alice")
    );
    assert_eq!(payload.pointer("/0/unread").and_then(Value::as_i64), Some(2));
    assert_eq!(
        payload.pointer("/0/last_message").and_then(Value::as_str),
        Some("I have a spare seat")
    );

    let (status, payload) = call(
        &app,
        "GET",
        &format!("/v1/messages/{alice_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.pointer("/messages/0/text").and_then(Value::as_str),
        Some("Are you in Leh next week?")
    );

    let (_, payload) = call(&app, "GET", "/v1/counts", Some(&bob), None).await;
    assert_eq!(payload.get("messages").and_then(Value::as_i64), Some(0));
    let (_, payload) = call(&app, "GET", "/v1/counts", Some(&alice), None).await;
    assert_eq!(payload.get("messages").and_then(Value::as_i64), Some(0));
}

#[tokio::test]
async fn for_you_feed_merges_kinds_newest_first() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());

    let trip_id = create_trip_post(&app, &alice, "Kasol").await;
    let general_id = create_general_post(&app, &bob, "Momos in Majnu ka Tilla").await;
    let joinable_id = create_joinable_trip(&app, &bob, "Kedarkantha", 8).await;
    backdate(&state, "trip_posts", trip_id, 2_000).await;
    backdate(&state, "general_posts", general_id, 3_000).await;
    backdate(&state, "joinable_trips", joinable_id, 1_000).await;

    let (status, payload) = call(&app, "GET", "/v1/feed/for-you", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        feed_keys(&payload),
        vec![
            ("general".to_string(), general_id),
            ("trip".to_string(), trip_id),
            ("joinable".to_string(), joinable_id),
        ]
    );
}

#[tokio::test]
async fn feed_windows_are_bounded_per_kind() {
    let state = test_state_with_window(2).await;
    let (_, alice) = seed_user(&state, "alice").await;
    let app = build_router(state.clone());

    let general_id = create_general_post(&app, &alice, "Old note").await;
    backdate(&state, "general_posts", general_id, 50).await;
    let mut trips = Vec::new();
    for (title, created_at) in [("First", 100), ("Second", 200), ("Third", 300)] {
        let trip_id = create_trip_post(&app, &alice, title).await;
        backdate(&state, "trip_posts", trip_id, created_at).await;
        trips.push(trip_id);
    }

    let (_, payload) = call(&app, "GET", "/v1/feed/for-you", Some(&alice), None).await;
    assert_eq!(
        feed_keys(&payload),
        vec![
            ("trip".to_string(), trips[2]),
            ("trip".to_string(), trips[1]),
            ("general".to_string(), general_id),
        ]
    );
}

#[tokio::test]
async fn following_feed_only_shows_accepted_follows() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let (_, carol) = seed_user(&state, "carol").await;
    let app = build_router(state.clone());

    let bob_post = create_general_post(&app, &bob, "Bob in Hampi").await;
    create_general_post(&app, &carol, "Carol in Gokarna").await;

    let (_, payload) = call(&app, "POST", "/v1/users/bob/follow", Some(&alice), None).await;
    let edge_id = payload.get("edge_id").and_then(Value::as_i64).expect("edge id");

    let (_, payload) = call(&app, "GET", "/v1/feed/following", Some(&alice), None).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(0));

    call(
        &app,
        "POST",
        &format!("/v1/follows/{edge_id}/accept"),
        Some(&bob),
        None,
    )
    .await;
    let (_, payload) = call(&app, "GET", "/v1/feed/following", Some(&alice), None).await;
    assert_eq!(feed_keys(&payload), vec![("general".to_string(), bob_post)]);
}

#[tokio::test]
async fn search_is_anonymous_and_requires_query() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    seed_user(&state, "goa_gypsy").await;
    let app = build_router(state.clone());
    let trip_id = create_trip_post(&app, &alice, "Goa on a budget").await;
    create_general_post(&app, &alice, "Nothing to see here").await;

    let (status, payload) = call(&app, "GET", "/v1/search", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("VALIDATION_ERROR")
    );

    let (status, payload) = call(&app, "GET", "/v1/search?q=goa", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.pointer("/users/0/username").and_then(Value::as_str),
        Some("goa_gypsy")
    );
    assert_eq!(
        feed_keys(payload.get("posts").expect("posts")),
        vec![("trip".to_string(), trip_id)]
    );
    assert_eq!(
        payload.pointer("/posts/0/is_liked").and_then(Value::as_bool),
        Some(false)
    );
}

#[tokio::test]
async fn trip_days_and_photos() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);
    let trip_id = create_trip_post(&app, &alice, "Ladakh loop").await;
    let days_uri = format!("/v1/trips/{trip_id}/days");
    let day = json!({
        "day_number": 1,
        "date": "2026-06-01",
        "location_name": "Leh",
        "latitude": 34.15,
        "longitude": 77.58
    });

    let (status, _) = call(&app, "POST", &days_uri, Some(&bob), Some(day.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, payload) = call(&app, "POST", &days_uri, Some(&alice), Some(day.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let day_id = payload.get("id").and_then(Value::as_i64).expect("day id");

    let (status, payload) = call(&app, "POST", &days_uri, Some(&alice), Some(day)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload.get("code").and_then(Value::as_str), Some("CONFLICT"));

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/trips/{trip_id}/days/{day_id}/photos"),
        Some(&alice),
        Some(json!({ "image": "photos/leh-palace.jpg", "caption": "Leh Palace" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, payload) = call(
        &app,
        "GET",
        &format!("/v1/trips/{trip_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("day_count").and_then(Value::as_i64), Some(1));
    assert_eq!(
        payload.pointer("/days/0/photos/0/caption").and_then(Value::as_str),
        Some("Leh Palace")
    );
    assert_eq!(
        payload.pointer("/days/0/date").and_then(Value::as_str),
        Some("2026-06-01")
    );
}

#[tokio::test]
async fn notifications_list_and_mark_all_read() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);
    let post_id = create_general_post(&app, &alice, "Dal lake shikara").await;
    call(&app, "POST", &format!("/v1/content/general/{post_id}/like"), Some(&bob), None).await;

    let (_, payload) = call(&app, "GET", "/v1/counts", Some(&alice), None).await;
    assert_eq!(payload.get("notifications").and_then(Value::as_i64), Some(1));

    let (status, payload) = call(&app, "GET", "/v1/notifications", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.pointer("/0/notification_type").and_then(Value::as_str),
        Some("like")
    );
    assert_eq!(
        payload.pointer("/0/sender/username").and_then(Value::as_str),
        Some("bob")
    );
    assert_eq!(
        payload.pointer("/0/post_type").and_then(Value::as_str),
        Some("general")
    );

    let (_, payload) = call(
        &app,
        "POST",
        "/v1/notifications/mark-all-read",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(payload.get("updated").and_then(Value::as_u64), Some(1));
    let (_, payload) = call(&app, "GET", "/v1/counts", Some(&alice), None).await;
    assert_eq!(payload.get("notifications").and_then(Value::as_i64), Some(0));
}

async fn file_backed_state(dir: &tempfile::TempDir) -> AppState {
    let url = format!("sqlite:{}", dir.path().join("tripmates.db").display());
    let pool = tm_core::db::connect(&url).await.expect("connect database");
    tm_core::migrations::run(&pool).await.expect("run migrations");
    AppState {
        pool,
        jwt_config: jwt_config(),
        feed_window: 20,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_on_file_database_all_succeed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = file_backed_state(&dir).await;
    let (owner_id, owner) = seed_user(&state, "owner").await;
    let mut likers = Vec::new();
    for n in 0..24 {
        let (_, token) = seed_user(&state, &format!("liker_{n}")).await;
        likers.push(token);
    }
    let app = build_router(state.clone());
    let post_id = create_general_post(&app, &owner, "Monsoon in Cherrapunji").await;
    let uri = format!("/v1/content/general/{post_id}/like");

    let tasks: Vec<_> = likers
        .into_iter()
        .map(|token| {
            let app = app.clone();
            let uri = uri.clone();
            tokio::spawn(async move { call(&app, "POST", &uri, Some(&token), None).await })
        })
        .collect();
    for task in tasks {
        let (status, payload) = task.await.expect("like task");
        assert_eq!(status, StatusCode::OK, "like failed: {payload}");
        assert_eq!(payload.get("liked").and_then(Value::as_bool), Some(true));
    }

    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM likes WHERE content_kind = 'general' AND content_id = ?",
            post_id
        )
        .await,
        24
    );
    assert_eq!(notifications_for(&state, owner_id).await, 24);
    state.pool.close().await;
}

#[tokio::test]
async fn pending_request_on_started_trip_cannot_be_accepted() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (bob_id, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());
    let trip_id = create_joinable_trip(&app, &alice, "Zanskar frozen river", 5).await;

    let (_, payload) = call(
        &app,
        "POST",
        &format!("/v1/joinable-trips/{trip_id}/requests"),
        Some(&bob),
        None,
    )
    .await;
    let request_id = payload.get("id").and_then(Value::as_i64).expect("request id");

    let (status, payload) = call(
        &app,
        "PATCH",
        &format!("/v1/joinable-trips/{trip_id}"),
        Some(&alice),
        Some(json!({ "status": "ongoing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("ongoing"));

    let (status, payload) = call(
        &app,
        "POST",
        &format!("/v1/join-requests/{request_id}/accept"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        payload.get("code").and_then(Value::as_str),
        Some("INVALID_STATE")
    );
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM trip_groups WHERE trip_id = ?",
            trip_id
        )
        .await,
        0
    );
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM join_requests WHERE id = ? AND status = 'pending'",
            request_id
        )
        .await,
        1
    );
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM notifications WHERE receiver_id = ? AND kind = 'request_accepted'",
            bob_id
        )
        .await,
        0
    );
}

#[tokio::test]
async fn experience_lifecycle_with_itinerary_and_interactions() {
    let state = test_state().await;
    let (alice_id, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state.clone());

    let (status, payload) = call(
        &app,
        "POST",
        "/v1/experiences",
        Some(&alice),
        Some(json!({ "title": "Kayaking the backwaters", "location": "Alleppey" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        payload.get("post_type").and_then(Value::as_str),
        Some("experience")
    );
    assert_eq!(payload.get("day_count").and_then(Value::as_i64), Some(0));
    let experience_id = payload.get("id").and_then(Value::as_i64).expect("experience id");

    let (status, _) = call(
        &app,
        "POST",
        "/v1/experiences",
        Some(&alice),
        Some(json!({ "title": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let days_uri = format!("/v1/experiences/{experience_id}/days");
    let (status, payload) = call(
        &app,
        "POST",
        &days_uri,
        Some(&alice),
        Some(json!({ "day_number": 1, "location_name": "Punnamada lake" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let day_id = payload.get("id").and_then(Value::as_i64).expect("day id");

    let (status, payload) = call(
        &app,
        "POST",
        &days_uri,
        Some(&alice),
        Some(json!({ "day_number": 1, "location_name": "Kumarakom" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(payload.get("code").and_then(Value::as_str), Some("CONFLICT"));

    let (status, _) = call(
        &app,
        "POST",
        &days_uri,
        Some(&alice),
        Some(json!({ "day_number": 0, "location_name": "Kumarakom" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        &days_uri,
        Some(&bob),
        Some(json!({ "day_number": 2, "location_name": "Kumarakom" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, payload) = call(
        &app,
        "POST",
        "/v1/experiences",
        Some(&alice),
        Some(json!({ "title": "Tea estates of Munnar" })),
    )
    .await;
    let other_id = payload.get("id").and_then(Value::as_i64).expect("other id");
    let (_, payload) = call(
        &app,
        "POST",
        &format!("/v1/experiences/{other_id}/days"),
        Some(&alice),
        Some(json!({ "day_number": 1, "location_name": "Kolukkumalai" })),
    )
    .await;
    let other_day = payload.get("id").and_then(Value::as_i64).expect("other day");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/experiences/{experience_id}/days/{other_day}/photos"),
        Some(&alice),
        Some(json!({ "image": "photos/munnar.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/experiences/{experience_id}/days/{day_id}/photos"),
        Some(&alice),
        Some(json!({ "image": "photos/houseboat.jpg", "caption": "Houseboat at dusk" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let experience_uri = format!("/v1/experiences/{experience_id}");
    let (status, payload) = call(&app, "GET", &experience_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("day_count").and_then(Value::as_i64), Some(1));
    assert_eq!(
        payload.pointer("/days/0/photos/0/caption").and_then(Value::as_str),
        Some("Houseboat at dusk")
    );

    let (status, _) = call(
        &app,
        "PATCH",
        &experience_uri,
        Some(&bob),
        Some(json!({ "title": "Mine now" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &app,
        "PATCH",
        &experience_uri,
        Some(&alice),
        Some(json!({ "title": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, payload) = call(
        &app,
        "PATCH",
        &experience_uri,
        Some(&alice),
        Some(json!({ "title": "Backwaters by kayak", "cover_photo": "covers/kayak.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("title").and_then(Value::as_str),
        Some("Backwaters by kayak")
    );
    assert_eq!(
        payload.get("location").and_then(Value::as_str),
        Some("Alleppey")
    );

    let content_uri = format!("/v1/content/experience/{experience_id}");
    let (status, payload) = call(&app, "POST", &format!("{content_uri}/like"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("total_likes").and_then(Value::as_i64), Some(1));
    let (status, payload) = call(&app, "POST", &format!("{content_uri}/save"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("saved").and_then(Value::as_bool), Some(true));
    let (status, _) = call(
        &app,
        "POST",
        &format!("{content_uri}/comments"),
        Some(&bob),
        Some(json!({ "text": "Which operator did you use?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(notifications_for(&state, alice_id).await, 2);

    let (_, payload) = call(&app, "GET", "/v1/saved", Some(&bob), None).await;
    assert_eq!(
        feed_keys(&payload),
        vec![("experience".to_string(), experience_id)]
    );

    let (status, _) = call(&app, "DELETE", &experience_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "DELETE", &experience_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, "GET", &experience_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    for table in ["likes", "saves", "comments", "notifications"] {
        let remaining = count(
            &state,
            &format!(
                "SELECT COUNT(*) FROM {table} WHERE content_kind = 'experience' AND content_id = ?"
            ),
            experience_id,
        )
        .await;
        assert_eq!(remaining, 0, "{table} still attached");
    }
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM experience_days WHERE post_id = ?",
            experience_id
        )
        .await,
        0
    );
}

#[tokio::test]
async fn trip_post_updates_are_owner_only_and_validated() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let app = build_router(state);
    let trip_id = create_trip_post(&app, &alice, "Ladakh loop").await;
    let trip_uri = format!("/v1/trips/{trip_id}");

    let (status, _) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&bob),
        Some(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, payload) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&alice),
        Some(json!({ "start_date": "2026-06-10", "end_date": "2026-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload.pointer("/details/fields/start_date").is_some());

    let (status, payload) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&alice),
        Some(json!({
            "title": "Ladakh in ten days",
            "start_date": "2026-06-01",
            "end_date": "2026-06-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload.get("title").and_then(Value::as_str),
        Some("Ladakh in ten days")
    );
    assert_eq!(
        payload.get("location_summary").and_then(Value::as_str),
        Some("Himachal")
    );

    let (status, _) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&alice),
        Some(json!({ "end_date": "2026-05-20" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn joinable_trip_updates_respect_group_size() {
    let state = test_state().await;
    let (_, alice) = seed_user(&state, "alice").await;
    let (_, bob) = seed_user(&state, "bob").await;
    let (_, carol) = seed_user(&state, "carol").await;
    let app = build_router(state);
    let trip_id = create_joinable_trip(&app, &alice, "Meghalaya root bridges", 5).await;
    let trip_uri = format!("/v1/joinable-trips/{trip_id}");

    for token in [bob.as_str(), carol.as_str()] {
        let (_, payload) = call(
            &app,
            "POST",
            &format!("/v1/joinable-trips/{trip_id}/requests"),
            Some(token),
            None,
        )
        .await;
        let request_id = payload.get("id").and_then(Value::as_i64).expect("request id");
        let (status, _) = call(
            &app,
            "POST",
            &format!("/v1/join-requests/{request_id}/accept"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&bob),
        Some(json!({ "budget": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, payload) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&alice),
        Some(json!({ "max_members": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload.pointer("/details/fields/max_members").is_some());

    let (status, payload) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&alice),
        Some(json!({ "min_members": 4, "max_members": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(payload.pointer("/details/fields/min_members").is_some());

    let (status, payload) = call(
        &app,
        "PATCH",
        &trip_uri,
        Some(&alice),
        Some(json!({ "max_members": 3, "budget": 20000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("max_members").and_then(Value::as_i64), Some(3));
    assert_eq!(payload.get("budget").and_then(Value::as_i64), Some(20000));
    assert_eq!(payload.get("member_count").and_then(Value::as_i64), Some(3));
}
