pub mod cookie;
pub mod middleware;
pub mod oauth;
pub mod reconcile;
pub mod token;

pub use middleware::{require_auth, CurrentUser};
pub use oauth::{OAuthError, OAuthService};
pub use reconcile::{reconcile, Assertion};
pub use token::{TokenCodec, TokenError};
