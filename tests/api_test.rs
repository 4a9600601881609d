use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use bytes::Bytes;
use chrono::Duration;
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use social_login_backend::test_util::{
    create_test_state, create_test_state_with_config, seed_login, session_cookie_for, test_config,
};
use social_login_backend::{routes, AppState, Provider, TokenCodec};

fn app(state: Arc<AppState>) -> Router {
    routes::router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Bytes>,
) -> http::Response<axum::body::Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: http::Response<axum::body::Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_profile_requires_auth() {
    let app = app(create_test_state());
    let response = send(&app, Method::GET, "/user/profile", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_cookie_rejected() {
    let app = app(create_test_state());
    let response = send(
        &app,
        Method::GET,
        "/user/profile",
        Some("token=not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected_without_detail() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");

    // Same secret, already-elapsed expiry.
    let expired = TokenCodec::new("test-secret", Duration::seconds(-10))
        .issue(&user.id)
        .unwrap();

    let app = app(state);
    let response = send(
        &app,
        Method::GET,
        "/user/profile",
        Some(&format!("token={}", expired)),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "unauthenticated");
    // The 401 must not reveal that expiry (rather than signature or
    // format) was the problem.
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("expire"));
}

#[tokio::test]
async fn test_wrong_secret_token_rejected() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");
    let forged = TokenCodec::new("other-secret", Duration::days(7))
        .issue(&user.id)
        .unwrap();

    let app = app(state);
    let response = send(
        &app,
        Method::GET,
        "/user/profile",
        Some(&format!("token={}", forged)),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_round_trip() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "alice@example.com", "Alice");
    let cookie = session_cookie_for(&state, &user.id);

    let app = app(state);
    let response = send(&app, Method::GET, "/user/profile", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["id"], user.id.as_str());
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["role"], "user");
    assert_eq!(body["providers"][0]["provider"], "google");
    // Sanitized: no provider subject ids anywhere in the payload.
    assert!(body["providers"][0].get("provider_id").is_none());
    assert!(!body.to_string().contains("g-1"));
}

#[tokio::test]
async fn test_valid_token_for_missing_user_is_404() {
    let state = create_test_state();
    let cookie = session_cookie_for(&state, "no-such-user");

    let app = app(state);
    let response = send(&app, Method::GET, "/user/profile", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_name_boundary() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");
    let cookie = session_cookie_for(&state, &user.id);
    let app = app(state);

    // Length 1 after trimming: rejected.
    for name in ["J", "  J  ", "", "   "] {
        let response = send(
            &app,
            Method::PUT,
            "/user/profile",
            Some(&cookie),
            Some(Bytes::from(json!({ "name": name }).to_string())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "name {:?}", name);
    }

    // Length 2 after trimming: accepted, stored trimmed.
    let response = send(
        &app,
        Method::PUT,
        "/user/profile",
        Some(&cookie),
        Some(Bytes::from(json!({ "name": "  Jo  " }).to_string())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "Jo");
}

#[tokio::test]
async fn test_update_name_persists() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");
    let cookie = session_cookie_for(&state, &user.id);
    let app = app(state.clone());

    let response = send(
        &app,
        Method::PUT,
        "/user/profile",
        Some(&cookie),
        Some(Bytes::from(json!({ "name": "Alice Cooper" }).to_string())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::GET, "/user/profile", Some(&cookie), None).await;
    let body = json_body(response).await;
    assert_eq!(body["name"], "Alice Cooper");
}

#[tokio::test]
async fn test_unlink_scenario() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");
    seed_login(&state, Provider::Facebook, "f-1", "a@x.com", "Alice F");
    let cookie = session_cookie_for(&state, &user.id);
    let app = app(state);

    // Two providers: unlinking one succeeds, the other remains.
    let response = send(
        &app,
        Method::DELETE,
        "/user/provider/google",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["providers"].as_array().unwrap().len(), 1);
    assert_eq!(body["providers"][0]["provider"], "facebook");

    // Sole remaining provider: refused.
    let response = send(
        &app,
        Method::DELETE,
        "/user/provider/facebook",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "sole_provider");

    // And the account is untouched.
    let response = send(&app, Method::GET, "/user/profile", Some(&cookie), None).await;
    let body = json_body(response).await;
    assert_eq!(body["providers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unlink_unknown_provider_kind() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");
    let cookie = session_cookie_for(&state, &user.id);
    let app = app(state);

    let response = send(
        &app,
        Method::DELETE,
        "/user/provider/twitter",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_unlink_requires_auth() {
    let app = app(create_test_state());
    let response = send(&app, Method::DELETE, "/user/provider/google", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_reflects_credential() {
    let state = create_test_state();
    let user = seed_login(&state, Provider::Google, "g-1", "a@x.com", "Alice");
    let cookie = session_cookie_for(&state, &user.id);
    let app = app(state);

    let response = send(&app, Method::GET, "/auth/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "authenticated": false }));

    let response = send(&app, Method::GET, "/auth/status", Some(&cookie), None).await;
    let body = json_body(response).await;
    assert_eq!(body, json!({ "authenticated": true }));

    let response = send(&app, Method::GET, "/auth/status", Some("token=junk"), None).await;
    assert_eq!(json_body(response).await, json!({ "authenticated": false }));
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = app(create_test_state());
    let response = send(&app, Method::POST, "/auth/logout", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_login_with_unknown_provider() {
    let app = app(create_test_state());
    let response = send(&app, Method::GET, "/auth/twitter", None, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_redirects_to_consent_screen() {
    let app = app(create_test_state());
    let response = send(&app, Method::GET, "/auth/google", None, None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains("state="));
    assert!(location.contains("code_challenge="));
}

#[tokio::test]
async fn test_callback_with_bad_state_redirects_to_login_error() {
    let state = create_test_state();
    let app = app(state);

    let response = send(
        &app,
        Method::GET,
        "/auth/google/callback?code=abc&state=never-issued",
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.ends_with("/login?error=google_auth_failed"));
    assert!(response.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_full_google_login_flow() {
    let mock_provider = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mock-access-token",
            "token_type": "bearer"
        })))
        .mount(&mock_provider)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "g-42",
            "email": "Alice@Example.com",
            "name": "Alice",
            "picture": "https://example.com/alice.png"
        })))
        .mount(&mock_provider)
        .await;

    let mut config = test_config();
    config.oauth.google.token_url = format!("{}/token", mock_provider.uri());
    config.oauth.google.userinfo_url = format!("{}/userinfo", mock_provider.uri());
    let state = create_test_state_with_config(config);
    let app = app(state.clone());

    // Start the flow; the consent redirect carries the CSRF state.
    let response = send(&app, Method::GET, "/auth/google", None, None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    let csrf_state = query_param(location, "state").unwrap();

    // Provider calls back with the code.
    let response = send(
        &app,
        Method::GET,
        &format!("/auth/google/callback?code=mock-code&state={}", csrf_state),
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.ends_with("/dashboard"));

    // The issued cookie is a real session token for the new user.
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    let token = set_cookie
        .strip_prefix("token=")
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let user_id = state.tokens.verify(&token).unwrap();

    let user = state.store.find_by_id(&user_id).unwrap().unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.providers.len(), 1);
    assert_eq!(user.providers[0].provider_id, "g-42");

    // The cookie works against protected routes.
    let response = send(
        &app,
        Method::GET,
        "/user/profile",
        Some(&format!("token={}", token)),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the callback with the consumed state fails: states are
    // single use.
    let response = send(
        &app,
        Method::GET,
        &format!("/auth/google/callback?code=mock-code&state={}", csrf_state),
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("error=google_auth_failed"));
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
