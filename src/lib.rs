pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::{reconcile, Assertion, OAuthService, TokenCodec};
pub use config::Config;
pub use error::ApiError;
pub use models::{Provider, Role, User};
pub use store::UserStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: UserStore,
    pub tokens: TokenCodec,
    pub oauth: OAuthService,
}
