use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

/// The user on whose behalf a request runs.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
}

/// Take the caller id from `Authorization: Bearer <user id>`. The id is
/// trusted as-is; store operations reject ids they do not know.
pub async fn require_caller(
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let TypedHeader(auth) = bearer.ok_or(StatusCode::UNAUTHORIZED)?;
    let user_id = auth.token().trim();
    if user_id.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(Caller {
        user_id: user_id.to_string(),
    });
    Ok(next.run(req).await)
}
