//! Shared builders for unit and integration tests.

use std::sync::Arc;

use chrono::Duration;

use crate::auth::reconcile;
use crate::config::{
    AuthConfig, ClientConfig, Config, CorsConfig, DatabaseConfig, FacebookOAuthConfig,
    GoogleOAuthConfig, LoggingConfig, OAuthConfig, ServerConfig,
};
use crate::models::{Provider, User};
use crate::{AppState, Assertion, OAuthService, TokenCodec, UserStore};

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
        },
        client: ClientConfig {
            url: "http://localhost:5173".to_string(),
        },
        auth: AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_days: 7,
            cookie_secure: false,
        },
        oauth: OAuthConfig {
            google: GoogleOAuthConfig {
                client_id: "test-google-id".to_string(),
                client_secret: "test-google-secret".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            },
            facebook: FacebookOAuthConfig {
                client_id: "test-facebook-id".to_string(),
                client_secret: "test-facebook-secret".to_string(),
                auth_url: "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
                token_url: "https://graph.facebook.com/v19.0/oauth/access_token".to_string(),
                userinfo_url: "https://graph.facebook.com/me?fields=id,name,email".to_string(),
            },
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
    }
}

pub fn create_test_state() -> Arc<AppState> {
    create_test_state_with_config(test_config())
}

pub fn create_test_state_with_config(config: Config) -> Arc<AppState> {
    let store = UserStore::new(&config.database.url).unwrap();
    let tokens = TokenCodec::new(
        &config.auth.jwt_secret,
        Duration::days(config.auth.token_ttl_days),
    );
    let oauth = OAuthService::new(&config).unwrap();

    Arc::new(AppState {
        config,
        store,
        tokens,
        oauth,
    })
}

/// Run a login assertion through the reconciler, creating or linking as
/// needed, and return the resulting user.
pub fn seed_login(
    state: &AppState,
    provider: Provider,
    provider_id: &str,
    email: &str,
    name: &str,
) -> User {
    reconcile(
        &state.store,
        &Assertion {
            provider,
            provider_id: provider_id.to_string(),
            email: email.to_string(),
            display_name: name.to_string(),
            avatar_url: String::new(),
        },
    )
    .expect("seed login failed")
}

/// `Cookie` header value carrying a valid session token for `user_id`.
pub fn session_cookie_for(state: &AppState, user_id: &str) -> String {
    let token = state.tokens.issue(user_id).expect("failed to issue token");
    format!("token={}", token)
}
