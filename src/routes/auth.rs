//! Auth entry points: provider redirect, callback, logout and status.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::{cookie, reconcile};
use crate::error::ApiError;
use crate::models::Provider;
use crate::AppState;

/// GET /auth/{provider} - redirect to the provider's consent screen
async fn login(State(state): State<Arc<AppState>>, Path(provider): Path<String>) -> Response {
    let Ok(provider) = provider.parse::<Provider>() else {
        return ApiError::Validation("Invalid provider".to_string()).into_response();
    };

    match state.oauth.authorize_url(provider, &state.store) {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            tracing::error!("Failed to start {} auth flow: {}", provider, e);
            failure_redirect(&state, provider).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    #[allow(dead_code)]
    error: Option<String>,
}

/// GET /auth/{provider}/callback - finish the consent flow
///
/// On success: reconcile the assertion to a user, set the session cookie
/// and land on the dashboard. Every failure takes the login-page
/// redirect; no cookie is issued.
async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Ok(provider) = provider.parse::<Provider>() else {
        return ApiError::Validation("Invalid provider".to_string()).into_response();
    };

    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        tracing::warn!("{} callback missing code or state", provider);
        return failure_redirect(&state, provider).into_response();
    };

    let assertion = match state
        .oauth
        .exchange_code(provider, &code, &csrf_state, &state.store)
        .await
    {
        Ok(assertion) => assertion,
        Err(e) => {
            tracing::warn!("{} code exchange failed: {}", provider, e);
            return failure_redirect(&state, provider).into_response();
        }
    };

    let user = match reconcile(&state.store, &assertion) {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Reconciliation failed for {} login: {}", provider, e);
            return failure_redirect(&state, provider).into_response();
        }
    };

    let token = match state.tokens.issue(&user.id) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue session token: {}", e);
            return failure_redirect(&state, provider).into_response();
        }
    };

    let cookie = cookie::session_cookie(
        &token,
        Duration::days(state.config.auth.token_ttl_days),
        state.config.auth.cookie_secure,
    );
    let dashboard = format!("{}/dashboard", state.config.client.url);

    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&dashboard),
    )
        .into_response()
}

fn failure_redirect(state: &AppState, provider: Provider) -> Redirect {
    Redirect::to(&format!(
        "{}/login?error={}_auth_failed",
        state.config.client.url, provider
    ))
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    message: &'static str,
}

/// POST /auth/logout - drop the session cookie; no store mutation
async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cookie = cookie::clear_session_cookie(state.config.auth.cookie_secure);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LogoutResponse {
            message: "Logged out successfully",
        }),
    )
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    authenticated: bool,
}

/// GET /auth/status - report whether the presented credential verifies.
/// Deliberately says nothing about who the credential belongs to.
async fn status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<StatusResponse> {
    let authenticated = cookie::session_token(&headers)
        .map(|token| state.tokens.verify(&token).is_ok())
        .unwrap_or(false);
    Json(StatusResponse { authenticated })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/status", get(status))
        .route("/auth/logout", post(logout))
        .route("/auth/:provider", get(login))
        .route("/auth/:provider/callback", get(callback))
        .with_state(state)
}
