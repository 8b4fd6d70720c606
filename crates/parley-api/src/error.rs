use axum::http::StatusCode;
use tracing::{error, warn};

use parley_db::{ChatError, Database};

use crate::AppState;

pub fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
        ChatError::Conflict(_) => StatusCode::CONFLICT,
        ChatError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a store action off the async runtime and turn its failure into a
/// status code, logging the cause.
pub(crate) async fn blocking<F, T>(state: &AppState, action: &'static str, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> parley_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("{} failed: {}", action, e);
            } else {
                warn!("{} rejected: {}", action, e);
            }
            status
        })
}
