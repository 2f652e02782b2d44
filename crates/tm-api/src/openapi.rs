#![allow(dead_code)]

use axum::http::HeaderMap;
use utoipa::openapi::server::ServerBuilder;
use utoipa::OpenApi;

use crate::{ErrorResponse, HealthStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz_doc,
        openapi_doc,
        auth_register_doc,
        auth_token_doc,
        auth_refresh_doc,
        profile_get_doc,
        profile_update_doc,
        counts_doc,
        user_get_doc,
        user_posts_doc,
        follow_toggle_doc,
        follow_status_doc,
        followers_doc,
        following_doc,
        mates_doc,
        follow_requests_doc,
        follow_accept_doc,
        follow_decline_doc,
        trip_list_doc,
        trip_create_doc,
        trip_get_doc,
        trip_update_doc,
        trip_delete_doc,
        trip_add_day_doc,
        trip_add_photo_doc,
        experience_list_doc,
        experience_create_doc,
        experience_get_doc,
        experience_update_doc,
        experience_delete_doc,
        experience_add_day_doc,
        experience_add_photo_doc,
        joinable_trip_list_doc,
        joinable_trip_create_doc,
        joinable_trip_get_doc,
        joinable_trip_update_doc,
        joinable_trip_delete_doc,
        join_request_list_doc,
        join_request_create_doc,
        join_request_accept_doc,
        join_request_reject_doc,
        general_post_list_doc,
        general_post_create_doc,
        general_post_get_doc,
        general_post_update_doc,
        general_post_delete_doc,
        like_toggle_doc,
        save_toggle_doc,
        comment_list_doc,
        comment_create_doc,
        comment_delete_doc,
        saved_list_doc,
        feed_for_you_doc,
        feed_following_doc,
        search_doc,
        conversations_doc,
        chat_open_doc,
        chat_send_doc,
        group_list_doc,
        group_members_doc,
        group_messages_doc,
        group_send_doc,
        notification_list_doc,
        notification_mark_all_read_doc
    ),
    components(schemas(HealthStatus, ErrorResponse)),
    tags(
        (name = "tm-api", description = "Tripmates travel social API")
    )
)]
pub struct TripmatesApiDoc;

pub fn document(server_url: Option<&str>) -> utoipa::openapi::OpenApi {
    let mut doc = TripmatesApiDoc::openapi();
    if let Some(url) = server_url {
        doc.servers = Some(vec![ServerBuilder::new().url(url).build()]);
    }
    doc
}

pub fn infer_server_url(headers: &HeaderMap) -> Option<String> {
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|value| value.to_str().ok())?;
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Some(format!("{proto}://{host}"))
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, body = HealthStatus), (status = 503, body = HealthStatus))
)]
fn healthz_doc() {}

#[utoipa::path(
    get,
    path = "/v1/openapi.json",
    responses((status = 200, body = serde_json::Value))
)]
fn openapi_doc() {}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn auth_register_doc() {}

#[utoipa::path(
    post,
    path = "/v1/auth/token",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 401, body = ErrorResponse))
)]
fn auth_token_doc() {}

#[utoipa::path(
    post,
    path = "/v1/auth/token/refresh",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 401, body = ErrorResponse))
)]
fn auth_refresh_doc() {}

#[utoipa::path(
    get,
    path = "/v1/profile",
    responses((status = 200, body = serde_json::Value), (status = 401, body = ErrorResponse))
)]
fn profile_get_doc() {}

#[utoipa::path(
    patch,
    path = "/v1/profile",
    request_body = serde_json::Value,
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn profile_update_doc() {}

#[utoipa::path(
    get,
    path = "/v1/counts",
    responses((status = 200, body = serde_json::Value), (status = 401, body = ErrorResponse))
)]
fn counts_doc() {}

#[utoipa::path(
    get,
    path = "/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn user_get_doc() {}

#[utoipa::path(
    get,
    path = "/v1/users/{username}/posts",
    params(
        ("username" = String, Path, description = "Username"),
        ("limit" = Option<i64>, Query, description = "Rows per content kind")
    ),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn user_posts_doc() {}

#[utoipa::path(
    post,
    path = "/v1/users/{username}/follow",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn follow_toggle_doc() {}

#[utoipa::path(
    get,
    path = "/v1/users/{username}/follow-status",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn follow_status_doc() {}

#[utoipa::path(
    get,
    path = "/v1/users/{username}/followers",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn followers_doc() {}

#[utoipa::path(
    get,
    path = "/v1/users/{username}/following",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn following_doc() {}

#[utoipa::path(
    get,
    path = "/v1/follows/mates",
    responses((status = 200, body = serde_json::Value))
)]
fn mates_doc() {}

#[utoipa::path(
    get,
    path = "/v1/follows/requests",
    responses((status = 200, body = serde_json::Value))
)]
fn follow_requests_doc() {}

#[utoipa::path(
    post,
    path = "/v1/follows/{edge_id}/accept",
    params(("edge_id" = i64, Path, description = "Follow edge id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn follow_accept_doc() {}

#[utoipa::path(
    post,
    path = "/v1/follows/{edge_id}/decline",
    params(("edge_id" = i64, Path, description = "Follow edge id")),
    responses(
        (status = 204, description = "No content"),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn follow_decline_doc() {}

#[utoipa::path(
    get,
    path = "/v1/trips",
    params(
        ("author" = Option<i64>, Query, description = "Author id"),
        ("limit" = Option<i64>, Query, description = "Result limit")
    ),
    responses((status = 200, body = serde_json::Value))
)]
fn trip_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/trips",
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn trip_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/trips/{id}",
    params(("id" = i64, Path, description = "Trip post id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn trip_get_doc() {}

#[utoipa::path(
    patch,
    path = "/v1/trips/{id}",
    params(("id" = i64, Path, description = "Trip post id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn trip_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/trips/{id}",
    params(("id" = i64, Path, description = "Trip post id")),
    responses(
        (status = 204, description = "No content"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn trip_delete_doc() {}

#[utoipa::path(
    post,
    path = "/v1/trips/{id}/days",
    params(("id" = i64, Path, description = "Trip post id")),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn trip_add_day_doc() {}

#[utoipa::path(
    post,
    path = "/v1/trips/{id}/days/{day_id}/photos",
    params(
        ("id" = i64, Path, description = "Trip post id"),
        ("day_id" = i64, Path, description = "Day id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn trip_add_photo_doc() {}

#[utoipa::path(
    get,
    path = "/v1/experiences",
    params(
        ("author" = Option<i64>, Query, description = "Author id"),
        ("limit" = Option<i64>, Query, description = "Result limit")
    ),
    responses((status = 200, body = serde_json::Value))
)]
fn experience_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/experiences",
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn experience_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/experiences/{id}",
    params(("id" = i64, Path, description = "Experience id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn experience_get_doc() {}

#[utoipa::path(
    patch,
    path = "/v1/experiences/{id}",
    params(("id" = i64, Path, description = "Experience id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn experience_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/experiences/{id}",
    params(("id" = i64, Path, description = "Experience id")),
    responses(
        (status = 204, description = "No content"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn experience_delete_doc() {}

#[utoipa::path(
    post,
    path = "/v1/experiences/{id}/days",
    params(("id" = i64, Path, description = "Experience id")),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn experience_add_day_doc() {}

#[utoipa::path(
    post,
    path = "/v1/experiences/{id}/days/{day_id}/photos",
    params(
        ("id" = i64, Path, description = "Experience id"),
        ("day_id" = i64, Path, description = "Day id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn experience_add_photo_doc() {}

#[utoipa::path(
    get,
    path = "/v1/joinable-trips",
    params(
        ("author" = Option<i64>, Query, description = "Author id"),
        ("limit" = Option<i64>, Query, description = "Result limit")
    ),
    responses((status = 200, body = serde_json::Value))
)]
fn joinable_trip_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/joinable-trips",
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn joinable_trip_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/joinable-trips/{id}",
    params(("id" = i64, Path, description = "Joinable trip id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn joinable_trip_get_doc() {}

#[utoipa::path(
    patch,
    path = "/v1/joinable-trips/{id}",
    params(("id" = i64, Path, description = "Joinable trip id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn joinable_trip_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/joinable-trips/{id}",
    params(("id" = i64, Path, description = "Joinable trip id")),
    responses(
        (status = 204, description = "No content"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn joinable_trip_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/joinable-trips/{id}/requests",
    params(
        ("id" = i64, Path, description = "Joinable trip id"),
        ("status" = Option<String>, Query, description = "pending, accepted or rejected")
    ),
    responses((status = 200, body = serde_json::Value), (status = 403, body = ErrorResponse))
)]
fn join_request_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/joinable-trips/{id}/requests",
    params(("id" = i64, Path, description = "Joinable trip id")),
    responses(
        (status = 201, body = serde_json::Value),
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn join_request_create_doc() {}

#[utoipa::path(
    post,
    path = "/v1/join-requests/{id}/accept",
    params(("id" = i64, Path, description = "Join request id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn join_request_accept_doc() {}

#[utoipa::path(
    post,
    path = "/v1/join-requests/{id}/reject",
    params(("id" = i64, Path, description = "Join request id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn join_request_reject_doc() {}

#[utoipa::path(
    get,
    path = "/v1/general-posts",
    params(
        ("author" = Option<i64>, Query, description = "Author id"),
        ("limit" = Option<i64>, Query, description = "Result limit")
    ),
    responses((status = 200, body = serde_json::Value))
)]
fn general_post_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/general-posts",
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn general_post_create_doc() {}

#[utoipa::path(
    get,
    path = "/v1/general-posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn general_post_get_doc() {}

#[utoipa::path(
    patch,
    path = "/v1/general-posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body = serde_json::Value,
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn general_post_update_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/general-posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 204, description = "No content"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn general_post_delete_doc() {}

#[utoipa::path(
    post,
    path = "/v1/content/{kind}/{id}/like",
    params(
        ("kind" = String, Path, description = "trip, experience, joinable or general"),
        ("id" = i64, Path, description = "Content id")
    ),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn like_toggle_doc() {}

#[utoipa::path(
    post,
    path = "/v1/content/{kind}/{id}/save",
    params(
        ("kind" = String, Path, description = "trip, experience, joinable or general"),
        ("id" = i64, Path, description = "Content id")
    ),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn save_toggle_doc() {}

#[utoipa::path(
    get,
    path = "/v1/content/{kind}/{id}/comments",
    params(
        ("kind" = String, Path, description = "trip, experience, joinable or general"),
        ("id" = i64, Path, description = "Content id"),
        ("limit" = Option<i64>, Query, description = "Result limit")
    ),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn comment_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/content/{kind}/{id}/comments",
    params(
        ("kind" = String, Path, description = "trip, experience, joinable or general"),
        ("id" = i64, Path, description = "Content id")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn comment_create_doc() {}

#[utoipa::path(
    delete,
    path = "/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 204, description = "No content"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn comment_delete_doc() {}

#[utoipa::path(
    get,
    path = "/v1/saved",
    params(("limit" = Option<i64>, Query, description = "Result limit")),
    responses((status = 200, body = serde_json::Value))
)]
fn saved_list_doc() {}

#[utoipa::path(
    get,
    path = "/v1/feed/for-you",
    responses((status = 200, body = serde_json::Value), (status = 401, body = ErrorResponse))
)]
fn feed_for_you_doc() {}

#[utoipa::path(
    get,
    path = "/v1/feed/following",
    responses((status = 200, body = serde_json::Value), (status = 401, body = ErrorResponse))
)]
fn feed_following_doc() {}

#[utoipa::path(
    get,
    path = "/v1/search",
    params(("q" = String, Query, description = "Search text")),
    responses((status = 200, body = serde_json::Value), (status = 400, body = ErrorResponse))
)]
fn search_doc() {}

#[utoipa::path(
    get,
    path = "/v1/messages/conversations",
    responses((status = 200, body = serde_json::Value))
)]
fn conversations_doc() {}

#[utoipa::path(
    get,
    path = "/v1/messages/{user_id}",
    params(
        ("user_id" = i64, Path, description = "Peer user id"),
        ("limit" = Option<i64>, Query, description = "History size")
    ),
    responses((status = 200, body = serde_json::Value), (status = 404, body = ErrorResponse))
)]
fn chat_open_doc() {}

#[utoipa::path(
    post,
    path = "/v1/messages/{user_id}",
    params(("user_id" = i64, Path, description = "Peer user id")),
    request_body = serde_json::Value,
    responses(
        (status = 201, body = serde_json::Value),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn chat_send_doc() {}

#[utoipa::path(
    get,
    path = "/v1/groups",
    responses((status = 200, body = serde_json::Value))
)]
fn group_list_doc() {}

#[utoipa::path(
    get,
    path = "/v1/groups/{id}/members",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn group_members_doc() {}

#[utoipa::path(
    get,
    path = "/v1/groups/{id}/messages",
    params(
        ("id" = i64, Path, description = "Group id"),
        ("limit" = Option<i64>, Query, description = "History size")
    ),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
fn group_messages_doc() {}

#[utoipa::path(
    post,
    path = "/v1/groups/{id}/messages",
    params(("id" = i64, Path, description = "Group id")),
    request_body = serde_json::Value,
    responses((status = 201, body = serde_json::Value), (status = 403, body = ErrorResponse))
)]
fn group_send_doc() {}

#[utoipa::path(
    get,
    path = "/v1/notifications",
    params(
        ("limit" = Option<i64>, Query, description = "Result limit"),
        ("unread_only" = Option<bool>, Query, description = "Only unread")
    ),
    responses((status = 200, body = serde_json::Value))
)]
fn notification_list_doc() {}

#[utoipa::path(
    post,
    path = "/v1/notifications/mark-all-read",
    responses((status = 200, body = serde_json::Value))
)]
fn notification_mark_all_read_doc() {}
