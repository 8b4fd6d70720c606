pub mod conversations;
pub mod convert;
pub mod error;
pub mod groups;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod session;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use parley_db::Database;

use crate::middleware::require_caller;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

/// All routes. CORS and request tracing are layered on by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/session", post(session::create_session))
        .route("/liveness", get(session::liveness))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user/username", put(session::update_username))
        .route("/user/photo", put(session::update_photo))
        .route("/users", get(session::list_users))
        .route("/conversation/myconversations", get(conversations::my_conversations))
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        .route("/conversations/for/{receiver_id}", get(conversations::conversation_with))
        .route("/messages", post(messages::send_message))
        .route("/messages/{message_id}/forward", post(messages::forward_message))
        .route("/messages/{message_id}/delete", delete(messages::delete_message))
        .route("/messages/{message_id}/delivered", post(messages::mark_delivered))
        .route("/messages/{message_id}/read", post(messages::mark_read))
        .route(
            "/messages/{message_id}/comments",
            post(reactions::react).get(reactions::list_reactions),
        )
        .route("/messages/{message_id}/uncomment", delete(reactions::unreact))
        .route("/groups", get(groups::list_groups))
        .route("/groups/create", post(groups::create_group))
        .route(
            "/groups/{group_id}/members",
            post(groups::add_member).get(groups::list_members),
        )
        .route("/groups/{group_id}/leave", delete(groups::leave_group))
        .route("/groups/{group_id}/name", put(groups::set_name))
        .route("/groups/{group_id}/photo", put(groups::set_photo))
        .layer(axum_middleware::from_fn(require_caller))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
