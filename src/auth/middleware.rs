//! Session middleware for protected routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::cookie;
use crate::error::ApiError;
use crate::AppState;

/// The authenticated user's id, bound into request extensions for the
/// duration of one request. Holds only the id; handlers re-fetch the
/// record so profile edits are never served stale.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

/// Verify the session cookie and run the downstream handler with
/// [`CurrentUser`] attached. Any failure, including a missing cookie,
/// yields the same 401 without distinguishing the reason. Never touches
/// the store and never refreshes the credential.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = cookie::session_token(request.headers()) else {
        return ApiError::Unauthenticated.into_response();
    };

    match state.tokens.verify(&token) {
        Ok(user_id) => {
            request.extensions_mut().insert(CurrentUser(user_id));
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            ApiError::Unauthenticated.into_response()
        }
    }
}
