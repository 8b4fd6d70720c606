use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use parley_db::ChatError;
use parley_types::api::{
    PhotoResponse, SessionRequest, SessionResponse, UpdatePhotoRequest, UpdateUsernameRequest,
    UserListResponse,
};

use crate::AppState;
use crate::convert;
use crate::error::blocking;
use crate::middleware::Caller;

/// Log in by display name. Unknown names are registered on the spot; the
/// returned identifier is what clients send as their bearer value.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = blocking(&state, "create session", move |db| {
        db.create_or_get_user(&req.name)
    })
    .await?;

    info!("Session opened for {} ({})", user.name, user.id);
    Ok(Json(SessionResponse {
        identifier: user.id,
        username: user.name,
        photo_url: user.photo_url,
    }))
}

pub async fn liveness(State(state): State<AppState>) -> StatusCode {
    match blocking(&state, "liveness", |db| db.ping()).await {
        Ok(()) => StatusCode::OK,
        Err(status) => status,
    }
}

pub async fn update_username(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = blocking(&state, "update username", move |db| {
        db.update_user_name(&caller.user_id, &req.new_name)?;
        db.get_user(&caller.user_id)?
            .ok_or_else(|| ChatError::NotFound(format!("user {}", caller.user_id)))
    })
    .await?;

    Ok(Json(SessionResponse {
        identifier: user.id,
        username: user.name,
        photo_url: user.photo_url,
    }))
}

pub async fn update_photo(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdatePhotoRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let photo_url = req.photo_url.trim().to_string();
    let stored = photo_url.clone();
    blocking(&state, "update photo", move |db| {
        db.update_user_photo(&caller.user_id, &stored)
    })
    .await?;

    Ok(Json(PhotoResponse { photo_url }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = blocking(&state, "list users", |db| db.list_users()).await?;
    Ok(Json(UserListResponse {
        users: convert::users(rows),
    }))
}
