use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_db::models::SendRequest;
use parley_types::api::{
    ForwardMessageRequest, ForwardMessageResponse, SendMessageRequest, SendMessageResponse,
    StatusResponse,
};

use crate::AppState;
use crate::error::blocking;
use crate::middleware::Caller;

/// Send to a group, a known conversation, or a receiver. A private
/// conversation with the receiver is created on the first message.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let sent = blocking(&state, "send message", move |db| {
        db.send_or_create(SendRequest {
            sender_id: &caller.user_id,
            receiver_id: req.receiver_id.as_deref(),
            content: &req.content,
            is_group: req.is_group,
            group_id: req.group_id.as_deref(),
            conversation_id: req.conversation_id.as_deref(),
            reply_to: req.reply_to.as_deref(),
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message_id: sent.message_id,
            conversation_id: sent.conversation_id,
        }),
    ))
}

pub async fn forward_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ForwardMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let forwarded = blocking(&state, "forward message", move |db| {
        db.forward_message(&message_id, &req.target_conversation_id, &caller.user_id)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ForwardMessageResponse {
            message_id: forwarded,
        }),
    ))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, "delete message", move |db| {
        db.delete_message(&message_id, &caller.user_id)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = message_id.clone();
    let status = blocking(&state, "mark delivered", move |db| {
        db.mark_delivered_to(&id, &caller.user_id)
    })
    .await?;
    Ok(Json(StatusResponse { message_id, status }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = message_id.clone();
    let status = blocking(&state, "mark read", move |db| {
        db.mark_read(&id, &caller.user_id)
    })
    .await?;
    Ok(Json(StatusResponse { message_id, status }))
}
