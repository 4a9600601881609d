//! Maps a verified provider identity to exactly one user record.
//!
//! Decision procedure, in strict order:
//! 1. Known `(provider, provider_id)` link: returning user, touch
//!    `last_login` and return.
//! 2. Known email: attach a new provider link to that user and return it.
//!    Linking is keyed on email equality alone, exactly as the provider
//!    reported it after consent. Hardening this with an explicit
//!    confirmation step would be a semantic change, not a fix here.
//! 3. Otherwise create a fresh user. If the create loses a concurrent
//!    first-login race on the same email, the store's uniqueness
//!    constraint rejects it and the loser retries as case 2.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Provider, ProviderLink, Role, User};
use crate::store::{StoreError, UserStore};

/// A verified identity handed over by the OAuth collaborator after a
/// successful consent flow. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub provider: Provider,
    pub provider_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
}

pub fn reconcile(store: &UserStore, assertion: &Assertion) -> Result<User, StoreError> {
    let email = normalize_email(&assertion.email);
    let now = Utc::now();

    if let Some(mut user) =
        store.find_by_provider_identity(assertion.provider, &assertion.provider_id)?
    {
        store.touch_last_login(&user.id, now)?;
        user.last_login = now;
        tracing::debug!("Returning user {} via {}", user.id, assertion.provider);
        return Ok(user);
    }

    if let Some(user) = link_to_existing(store, assertion, &email)? {
        return Ok(user);
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        name: assertion.display_name.clone(),
        avatar_url: assertion.avatar_url.clone(),
        role: Role::User,
        providers: vec![new_link(assertion, &email)],
        last_login: now,
        created_at: now,
    };

    match store.create_user(&user) {
        Ok(()) => Ok(user),
        Err(StoreError::DuplicateEmail) => {
            // Lost the first-create race: the winner's record exists now,
            // so this login becomes a link instead.
            tracing::warn!("Concurrent first login for {}, retrying as link", email);
            link_to_existing(store, assertion, &email)?.ok_or(StoreError::DuplicateEmail)
        }
        Err(e) => Err(e),
    }
}

fn link_to_existing(
    store: &UserStore,
    assertion: &Assertion,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let Some(mut user) = store.find_by_email(email)? else {
        return Ok(None);
    };

    let link = new_link(assertion, email);
    let now = link.connected_at;
    store.add_provider_link(&user.id, &link)?;
    store.touch_last_login(&user.id, now)?;
    user.providers.push(link);
    user.last_login = now;
    tracing::info!("Linked {} to existing user {}", assertion.provider, user.id);
    Ok(Some(user))
}

fn new_link(assertion: &Assertion, email: &str) -> ProviderLink {
    ProviderLink {
        provider: assertion.provider,
        provider_id: assertion.provider_id.clone(),
        email: email.to_string(),
        connected_at: Utc::now(),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
