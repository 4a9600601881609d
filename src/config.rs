//! Application configuration.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    pub auth: AuthConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible base URL, used to build OAuth redirect URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

/// Frontend the auth flow redirects back to.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_client_url")]
    pub url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session token signing secret. Required; no default on purpose.
    pub jwt_secret: String,
    /// Token and cookie lifetime.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Set the `Secure` cookie attribute. Enable in production.
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub google: GoogleOAuthConfig,
    pub facebook: FacebookOAuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_userinfo_url")]
    pub userinfo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_facebook_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_facebook_token_url")]
    pub token_url: String,
    #[serde(default = "default_facebook_userinfo_url")]
    pub userinfo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated allowed origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_client_url() -> String {
    "http://localhost:5173".to_string()
}
fn default_token_ttl_days() -> i64 {
    7
}
fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}
fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_google_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}
fn default_facebook_auth_url() -> String {
    "https://www.facebook.com/v19.0/dialog/oauth".to_string()
}
fn default_facebook_token_url() -> String {
    "https://graph.facebook.com/v19.0/oauth/access_token".to_string()
}
fn default_facebook_userinfo_url() -> String {
    "https://graph.facebook.com/me?fields=id,name,email,picture.type(large)".to_string()
}
fn default_database_url() -> String {
    "sqlite:./data/users.db".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Sources, in order of precedence:
    /// 1. Environment variables (`APP__SECTION__KEY` format)
    /// 2. `config.toml` file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
