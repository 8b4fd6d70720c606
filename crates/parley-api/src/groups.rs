use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_db::ChatError;
use parley_types::api::{
    AddMemberRequest, CreateGroupRequest, CreateGroupResponse, GroupListResponse,
    MemberListResponse, SetGroupNameRequest, SetGroupPhotoRequest,
};

use crate::AppState;
use crate::convert;
use crate::error::blocking;
use crate::middleware::Caller;

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = blocking(&state, "list groups", move |db| {
        db.list_groups_for_user(&caller.user_id)
    })
    .await?;

    Ok(Json(GroupListResponse {
        groups: rows.into_iter().map(convert::group).collect(),
    }))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let group_id = blocking(&state, "create group", move |db| {
        db.create_group(&caller.user_id, &req.group_name, req.group_photo.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CreateGroupResponse { group_id })))
}

/// Add a user by id or by username. Returns the updated member list.
pub async fn add_member(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let members = blocking(&state, "add group member", move |db| {
        let user_id = match (req.user_id, req.username) {
            (Some(user_id), _) => user_id,
            (None, Some(username)) => {
                db.get_user_by_name(&username)?
                    .ok_or_else(|| ChatError::NotFound(format!("user named {username}")))?
                    .id
            }
            (None, None) => {
                return Err(ChatError::InvalidArgument(
                    "member needs a user id or a username".into(),
                ));
            }
        };
        db.add_group_member(&group_id, &caller.user_id, &user_id)?;
        db.list_group_members(&group_id, &caller.user_id)
    })
    .await?;

    Ok(Json(MemberListResponse {
        members: convert::users(members),
    }))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    let members = blocking(&state, "list group members", move |db| {
        db.list_group_members(&group_id, &caller.user_id)
    })
    .await?;

    Ok(Json(MemberListResponse {
        members: convert::users(members),
    }))
}

pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, "leave group", move |db| {
        db.remove_member(&group_id, &caller.user_id)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_name(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<SetGroupNameRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, "rename group", move |db| {
        db.set_group_name(&group_id, &caller.user_id, &req.new_name)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_photo(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<SetGroupPhotoRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    blocking(&state, "set group photo", move |db| {
        db.set_group_photo(&group_id, &caller.user_id, &req.photo_url)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
