use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_types::api::{ReactRequest, ReactionListResponse};

use crate::AppState;
use crate::convert;
use crate::error::blocking;
use crate::middleware::Caller;

/// Set the caller's reaction and return the message's reactions after the
/// change.
pub async fn react(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = blocking(&state, "react", move |db| {
        db.react(&message_id, &caller.user_id, &req.reaction)?;
        db.list_reactions(&message_id)
    })
    .await?;

    Ok(Json(ReactionListResponse {
        reactions: rows.into_iter().map(convert::reaction).collect(),
    }))
}

pub async fn list_reactions(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = blocking(&state, "list reactions", move |db| {
        db.list_reactions_for(&message_id, &caller.user_id)
    })
    .await?;

    Ok(Json(ReactionListResponse {
        reactions: rows.into_iter().map(convert::reaction).collect(),
    }))
}

pub async fn unreact(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, "unreact", move |db| {
        db.unreact(&message_id, &caller.user_id)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
