use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use parley_api::{AppStateInner, router};
use parley_db::Database;

fn app() -> Router {
    router(Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
    }))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    caller: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {caller}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, name: &str) -> String {
    let (status, body) = call(app, "POST", "/session", None, Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], name);
    body["identifier"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn first_message_opens_private_conversation() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let (status, sent) = call(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({ "receiverId": bob, "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = sent["messageId"].as_str().unwrap().to_string();

    let (status, view) = call(&app, "GET", &format!("/conversations/for/{alice}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["conversation"]["id"], sent["conversationId"]);
    assert_eq!(view["conversation"]["name"], "alice");
    assert_eq!(view["conversation"]["isGroup"], false);
    assert_eq!(view["messages"][0]["content"], "hi");
    assert_eq!(view["messages"][0]["senderUsername"], "alice");
    assert_eq!(view["messages"][0]["status"], "sent");

    let (status, delivered) = call(
        &app,
        "POST",
        &format!("/messages/{message_id}/delivered"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "delivered");

    let (_, read) = call(&app, "POST", &format!("/messages/{message_id}/read"), Some(&bob), None).await;
    assert_eq!(read["status"], "read");

    let (_, list) = call(&app, "GET", "/conversation/myconversations", Some(&bob), None).await;
    assert_eq!(list["conversations"][0]["name"], "alice");
    assert_eq!(list["conversations"][0]["lastMessageContent"], "hi");
}

#[tokio::test]
async fn group_flow_with_reactions() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let (status, created) = call(
        &app,
        "POST",
        "/groups/create",
        Some(&alice),
        Some(json!({ "groupName": "climbing" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let group_id = created["groupId"].as_str().unwrap().to_string();

    let (status, members) = call(
        &app,
        "POST",
        &format!("/groups/{group_id}/members"),
        Some(&alice),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members["members"].as_array().unwrap().len(), 2);

    let (_, sent) = call(
        &app,
        "POST",
        "/messages",
        Some(&bob),
        Some(json!({ "content": "saturday?", "isGroup": true, "groupId": group_id })),
    )
    .await;
    let message_id = sent["messageId"].as_str().unwrap().to_string();

    let (status, reactions) = call(
        &app,
        "POST",
        &format!("/messages/{message_id}/comments"),
        Some(&alice),
        Some(json!({ "reaction": "👍" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reactions["reactions"][0]["username"], "alice");

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/messages/{message_id}/uncomment"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, groups) = call(&app, "GET", "/groups", Some(&bob), None).await;
    assert_eq!(groups["groups"][0]["name"], "climbing");
    assert_eq!(groups["groups"][0]["lastMessageContent"], "saturday?");
    assert_eq!(groups["groups"][0]["members"].as_array().unwrap().len(), 2);

    let (status, _) = call(&app, "DELETE", &format!("/groups/{group_id}/leave"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &format!("/conversations/{group_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn chat_errors_map_to_status_codes() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let eve = login(&app, "eve").await;

    let (status, _) = call(&app, "GET", "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({ "receiverId": bob, "content": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sent) = call(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({ "receiverId": bob, "content": "hi" })),
    )
    .await;
    let message_id = sent["messageId"].as_str().unwrap().to_string();
    let conversation_id = sent["conversationId"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "GET", &format!("/conversations/{conversation_id}"), Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/messages/{message_id}/delete"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/messages/{message_id}/uncomment"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/groups/{conversation_id}/leave"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "PUT",
        "/user/username",
        Some(&eve),
        Some(json!({ "newName": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/messages/{message_id}/delete"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn message_status_and_reactions_are_for_members() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let eve = login(&app, "eve").await;

    let (_, sent) = call(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({ "receiverId": bob, "content": "hi" })),
    )
    .await;
    let message_id = sent["messageId"].as_str().unwrap().to_string();
    let delivered = format!("/messages/{message_id}/delivered");
    let comments = format!("/messages/{message_id}/comments");

    let (status, _) = call(&app, "POST", &delivered, Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "GET", &comments, Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, own) = call(&app, "POST", &delivered, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["status"], "sent");

    let (status, listed) = call(&app, "GET", &comments, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed["reactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn liveness_answers_without_caller() {
    let app = app();
    let (status, _) = call(&app, "GET", "/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
