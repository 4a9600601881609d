//! Authenticated user endpoints: profile read/update and provider unlink.
//!
//! Everything here sits behind the session middleware and re-fetches the
//! user record per request, so edits take effect immediately.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    middleware,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::auth::{require_auth, CurrentUser};
use crate::error::ApiError;
use crate::models::{Provider, User, UserProfile};
use crate::AppState;

fn load_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    state
        .store
        .find_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// GET /user/profile - sanitized view of the current user
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = load_user(&state, &user_id)?;
    Ok(Json(user.profile()))
}

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    #[serde(default)]
    name: String,
}

/// PUT /user/profile - change the display name
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let name = body.name.trim();
    if name.chars().count() < 2 {
        return Err(ApiError::Validation(
            "Name must be at least 2 characters".to_string(),
        ));
    }

    let mut user = load_user(&state, &user_id)?;
    state.store.update_name(&user.id, name)?;
    user.name = name.to_string();
    Ok(Json(user.profile()))
}

/// DELETE /user/provider/{provider} - detach a login method
///
/// Refuses to remove the last remaining provider; an account must stay
/// reachable through at least one login method.
async fn unlink_provider(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(provider): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| ApiError::Validation("Invalid provider".to_string()))?;

    let mut user = load_user(&state, &user_id)?;
    if user.providers.len() <= 1 {
        return Err(ApiError::SoleProvider);
    }

    state.store.remove_provider(&user.id, provider)?;
    user.providers.retain(|link| link.provider != provider);
    tracing::info!("User {} unlinked {}", user.id, provider);
    Ok(Json(user.profile()))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/provider/:provider", delete(unlink_provider))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
