use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_db::ChatError;
use parley_types::api::ConversationListResponse;

use crate::AppState;
use crate::convert;
use crate::error::blocking;
use crate::middleware::Caller;

pub async fn my_conversations(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = blocking(&state, "list conversations", move |db| {
        db.list_conversations_for_user(&caller.user_id)
    })
    .await?;

    Ok(Json(ConversationListResponse {
        conversations: rows.into_iter().map(convert::summary).collect(),
    }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let detail = blocking(&state, "get conversation", move |db| {
        db.get_conversation(&conversation_id, &caller.user_id)
    })
    .await?;

    Ok(Json(convert::conversation_response(detail)))
}

/// The private conversation between the caller and `receiver_id`, if one
/// exists. Never creates one: that happens with the first message.
pub async fn conversation_with(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let detail = blocking(&state, "get private conversation", move |db| {
        let conversation_id = db
            .find_private(&caller.user_id, &receiver_id)?
            .ok_or_else(|| ChatError::NotFound(format!("no conversation with {receiver_id}")))?;
        db.get_conversation(&conversation_id, &caller.user_id)
    })
    .await?;

    Ok(Json(convert::conversation_response(detail)))
}
