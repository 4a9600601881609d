use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported external login providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl std::str::FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Account role. Set at creation, carried opaquely; nothing in this
/// service promotes or demotes a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A login method attached to a user. Lives only inside its owning
/// [`User`]; insertion order is link order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderLink {
    pub provider: Provider,
    /// The provider's subject identifier. Immutable once linked.
    pub provider_id: String,
    /// Email the provider reported at link time. Not re-synced if the
    /// provider-side email changes later.
    pub email: String,
    pub connected_at: DateTime<Utc>,
}

/// A durable account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    /// Unique across all users, stored trimmed and lowercased. Acts as
    /// the cross-provider linking key.
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub role: Role,
    /// Never empty after creation; the unlink guard enforces it.
    pub providers: Vec<ProviderLink>,
    pub last_login: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_provider(&self, provider: Provider) -> bool {
        self.providers.iter().any(|p| p.provider == provider)
    }

    /// The representation safe to return to the owning client. Excludes
    /// provider subject identifiers and link-time emails.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            role: self.role,
            providers: self
                .providers
                .iter()
                .map(|p| LinkedProvider {
                    provider: p.provider,
                    connected_at: p.connected_at,
                })
                .collect(),
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

/// Provider entry in [`UserProfile`], stripped of the subject id.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedProvider {
    pub provider: Provider,
    pub connected_at: DateTime<Utc>,
}

/// Sanitized user representation returned by the profile endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub role: Role,
    pub providers: Vec<LinkedProvider>,
    pub last_login: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
