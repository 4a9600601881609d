pub mod auth;
pub mod health;
pub mod user;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// Assemble the full application router. Layers (CORS, request logging)
/// are applied by the binary so tests can drive the bare routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(auth::router(state.clone()))
        .merge(user::router(state))
}
