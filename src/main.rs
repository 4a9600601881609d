use std::sync::Arc;

use axum::http::HeaderValue;
use axum::middleware;
use chrono::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use social_login_backend::{logging, routes, AppState, Config, OAuthService, TokenCodec, UserStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting social login backend");

    // Initialize components
    let store = UserStore::new(&config.database.url)?;
    let tokens = TokenCodec::new(
        &config.auth.jwt_secret,
        Duration::days(config.auth.token_ttl_days),
    );
    let oauth = OAuthService::new(&config)?;

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        tokens,
        oauth,
    });

    // The session cookie only travels cross-origin when the browser is
    // allowed to send credentials, which rules out a wildcard origin.
    let cors = if config.cors.origins == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .origins
            .split(',')
            .map(|origin| origin.trim().parse())
            .collect::<Result<_, _>>()?;
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    // Build router
    let app = routes::router(state)
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
