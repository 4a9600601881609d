//! External-provider OAuth collaborator.
//!
//! Runs the authorization-code flow with PKCE against Google and
//! Facebook and reduces a successful consent to a verified
//! [`Assertion`]. Handshake state (CSRF state + PKCE verifier) lives in
//! the store with a short expiry and is consumed atomically on callback.

use chrono::{Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;

use crate::auth::reconcile::Assertion;
use crate::config::Config;
use crate::models::Provider;
use crate::store::{StoreError, UserStore};

/// How long a pending handshake state stays valid.
const STATE_TTL_MINUTES: i64 = 10;

const GOOGLE_SCOPES: &[&str] = &["openid", "email", "profile"];
const FACEBOOK_SCOPES: &[&str] = &["email", "public_profile"];

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Invalid OAuth configuration: {0}")]
    Config(String),
    #[error("Unknown or expired OAuth state")]
    StateMismatch,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Failed to fetch user info: {0}")]
    UserInfo(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

struct ProviderClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: String,
    scopes: &'static [&'static str],
}

impl ProviderClient {
    fn client(&self) -> ConfiguredClient {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }
}

pub struct OAuthService {
    google: ProviderClient,
    facebook: ProviderClient,
    /// Token-exchange client; redirects disabled per OAuth guidance.
    token_http: reqwest::Client,
    api_http: reqwest::Client,
}

impl OAuthService {
    pub fn new(config: &Config) -> Result<Self, OAuthError> {
        let google = ProviderClient {
            client_id: ClientId::new(config.oauth.google.client_id.clone()),
            client_secret: ClientSecret::new(config.oauth.google.client_secret.clone()),
            auth_url: AuthUrl::new(config.oauth.google.auth_url.clone())
                .map_err(|e| OAuthError::Config(e.to_string()))?,
            token_url: TokenUrl::new(config.oauth.google.token_url.clone())
                .map_err(|e| OAuthError::Config(e.to_string()))?,
            redirect_url: redirect_url(config, Provider::Google)?,
            userinfo_url: config.oauth.google.userinfo_url.clone(),
            scopes: GOOGLE_SCOPES,
        };
        let facebook = ProviderClient {
            client_id: ClientId::new(config.oauth.facebook.client_id.clone()),
            client_secret: ClientSecret::new(config.oauth.facebook.client_secret.clone()),
            auth_url: AuthUrl::new(config.oauth.facebook.auth_url.clone())
                .map_err(|e| OAuthError::Config(e.to_string()))?,
            token_url: TokenUrl::new(config.oauth.facebook.token_url.clone())
                .map_err(|e| OAuthError::Config(e.to_string()))?,
            redirect_url: redirect_url(config, Provider::Facebook)?,
            userinfo_url: config.oauth.facebook.userinfo_url.clone(),
            scopes: FACEBOOK_SCOPES,
        };

        let token_http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::Config(e.to_string()))?;

        Ok(Self {
            google,
            facebook,
            token_http,
            api_http: reqwest::Client::new(),
        })
    }

    fn provider(&self, provider: Provider) -> &ProviderClient {
        match provider {
            Provider::Google => &self.google,
            Provider::Facebook => &self.facebook,
        }
    }

    /// Build the consent-screen URL and persist the handshake state.
    pub fn authorize_url(
        &self,
        provider: Provider,
        store: &UserStore,
    ) -> Result<String, OAuthError> {
        let pc = self.provider(provider);
        let client = pc.client();
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in pc.scopes {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }
        let (auth_url, csrf_state) = request.set_pkce_challenge(pkce_challenge).url();

        store.put_oauth_state(
            csrf_state.secret(),
            provider,
            pkce_verifier.secret(),
            Utc::now() + Duration::minutes(STATE_TTL_MINUTES),
        )?;

        Ok(auth_url.to_string())
    }

    /// Validate the callback state, exchange the code for an access
    /// token and fetch the provider's view of the user.
    pub async fn exchange_code(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
        store: &UserStore,
    ) -> Result<Assertion, OAuthError> {
        let verifier = store
            .take_oauth_state(state, provider)?
            .ok_or(OAuthError::StateMismatch)?;

        let pc = self.provider(provider);
        let client = pc.client();
        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(&self.token_http)
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

        let access_token = token.access_token().secret();
        match provider {
            Provider::Google => self.fetch_google_user(&pc.userinfo_url, access_token).await,
            Provider::Facebook => self.fetch_facebook_user(&pc.userinfo_url, access_token).await,
        }
    }

    async fn fetch_google_user(
        &self,
        userinfo_url: &str,
        access_token: &str,
    ) -> Result<Assertion, OAuthError> {
        let info: GoogleUserInfo = self
            .api_http
            .get(userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        let email = info
            .email
            .ok_or_else(|| OAuthError::UserInfo("Google did not supply an email".to_string()))?;

        Ok(Assertion {
            provider: Provider::Google,
            provider_id: info.id,
            display_name: info.name.unwrap_or_else(|| display_name_from_email(&email)),
            avatar_url: info.picture.unwrap_or_default(),
            email,
        })
    }

    async fn fetch_facebook_user(
        &self,
        userinfo_url: &str,
        access_token: &str,
    ) -> Result<Assertion, OAuthError> {
        let info: FacebookUserInfo = self
            .api_http
            .get(userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        let email = info
            .email
            .ok_or_else(|| OAuthError::UserInfo("Facebook did not supply an email".to_string()))?;

        Ok(Assertion {
            provider: Provider::Facebook,
            provider_id: info.id,
            display_name: info.name.unwrap_or_else(|| display_name_from_email(&email)),
            avatar_url: info.picture.map(|p| p.data.url).unwrap_or_default(),
            email,
        })
    }
}

fn redirect_url(config: &Config, provider: Provider) -> Result<RedirectUrl, OAuthError> {
    let base = config.server.public_url.trim_end_matches('/');
    RedirectUrl::new(format!("{}/auth/{}/callback", base, provider))
        .map_err(|e| OAuthError::Config(e.to_string()))
}

fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Google userinfo API response (`oauth2/v2/userinfo`).
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Facebook Graph API `/me` response.
#[derive(Debug, Deserialize)]
struct FacebookUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: String,
}
