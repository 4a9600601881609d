use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Provider, ProviderLink, Role, User};

/// SQLite-backed account store.
///
/// Every operation takes the connection lock for its full duration, so a
/// read-modify-write on a single user record is atomic with respect to
/// other requests.
pub struct UserStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    /// The `users.email` uniqueness constraint fired on create. Callers
    /// treat this as "someone else created this account first".
    #[error("Email is already registered")]
    DuplicateEmail,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl UserStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id         TEXT PRIMARY KEY,
                email      TEXT NOT NULL COLLATE NOCASE UNIQUE,
                name       TEXT NOT NULL,
                avatar_url TEXT NOT NULL DEFAULT '',
                role       TEXT NOT NULL DEFAULT 'user',
                last_login TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS provider_links (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      TEXT NOT NULL REFERENCES users(id),
                provider     TEXT NOT NULL,
                provider_id  TEXT NOT NULL,
                email        TEXT NOT NULL,
                connected_at TEXT NOT NULL,
                UNIQUE (provider, provider_id),
                UNIQUE (user_id, provider)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS oauth_states (
                state         TEXT PRIMARY KEY,
                provider      TEXT NOT NULL,
                pkce_verifier TEXT NOT NULL,
                expires_at    INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_provider_links_user_id ON provider_links(user_id)",
            [],
        )?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        read_user(&conn, id)
    }

    /// Look up the user owning a `(provider, provider_id)` link.
    pub fn find_by_provider_identity(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user_id: Option<String> = conn
            .query_row(
                "SELECT user_id FROM provider_links WHERE provider = ?1 AND provider_id = ?2",
                params![provider.as_str(), provider_id],
                |row| row.get(0),
            )
            .optional()?;

        match user_id {
            Some(id) => read_user(&conn, &id),
            None => Ok(None),
        }
    }

    /// Look up a user by email. The column is `COLLATE NOCASE`, so the
    /// match is case-insensitive regardless of caller normalization.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let user_id: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;

        match user_id {
            Some(id) => read_user(&conn, &id),
            None => Ok(None),
        }
    }

    /// Insert a new user together with its provider links.
    ///
    /// A uniqueness violation on `users.email` maps to
    /// [`StoreError::DuplicateEmail`] so the reconciler can retry the
    /// lost first-create race as a link.
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO users (id, email, name, avatar_url, role, last_login, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.name,
                user.avatar_url,
                user.role.as_str(),
                user.last_login.to_rfc3339(),
                user.created_at.to_rfc3339(),
            ],
        )
        .map_err(map_email_conflict)?;

        for link in &user.providers {
            insert_link(&tx, &user.id, link)?;
        }

        tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("Created new user: {} ({})", user.id, user.email);
        Ok(())
    }

    pub fn touch_last_login(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), user_id],
        )?;
        Ok(())
    }

    /// Append a provider link to an existing user. Link order is
    /// preserved by the autoincrement rowid.
    pub fn add_provider_link(
        &self,
        user_id: &str,
        link: &ProviderLink,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_link(&conn, user_id, link)?;
        tracing::info!("Linked {} provider to user {}", link.provider, user_id);
        Ok(())
    }

    /// Remove all links of the given kind. A no-op when none match.
    pub fn remove_provider(&self, user_id: &str, provider: Provider) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM provider_links WHERE user_id = ?1 AND provider = ?2",
            params![user_id, provider.as_str()],
        )?;
        Ok(())
    }

    pub fn update_name(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET name = ?1 WHERE id = ?2",
            params![name, user_id],
        )?;
        Ok(())
    }

    /// Persist an OAuth handshake state row. Expired rows are pruned on
    /// every insert.
    pub fn put_oauth_state(
        &self,
        state: &str,
        provider: Provider,
        pkce_verifier: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM oauth_states WHERE expires_at <= ?1",
            params![Utc::now().timestamp()],
        )?;
        conn.execute(
            "INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                state,
                provider.as_str(),
                pkce_verifier,
                expires_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Atomically consume a handshake state row, returning its PKCE
    /// verifier. Returns `None` for unknown, expired or wrong-provider
    /// states.
    pub fn take_oauth_state(
        &self,
        state: &str,
        provider: Provider,
    ) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let verifier: Option<String> = conn
            .query_row(
                "DELETE FROM oauth_states
                 WHERE state = ?1 AND provider = ?2 AND expires_at > ?3
                 RETURNING pkce_verifier",
                params![state, provider.as_str(), Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(verifier)
    }
}

fn insert_link(conn: &Connection, user_id: &str, link: &ProviderLink) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO provider_links (user_id, provider, provider_id, email, connected_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            link.provider.as_str(),
            link.provider_id,
            link.email,
            link.connected_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn map_email_conflict(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation
            && msg.as_deref().is_some_and(|m| m.contains("users.email"))
        {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(e.to_string())
}

fn read_user(conn: &Connection, id: &str) -> Result<Option<User>, StoreError> {
    let row: Option<(String, String, String, String, String, String, String)> = conn
        .query_row(
            "SELECT id, email, name, avatar_url, role, last_login, created_at
             FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            },
        )
        .optional()?;

    let Some((id, email, name, avatar_url, role, last_login, created_at)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT provider, provider_id, email, connected_at
         FROM provider_links WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut providers = Vec::new();
    for link in rows {
        let (provider, provider_id, email, connected_at) = link?;
        providers.push(ProviderLink {
            provider: parse_provider(&provider)?,
            provider_id,
            email,
            connected_at: parse_timestamp(&connected_at)?,
        });
    }

    Ok(Some(User {
        id,
        email,
        name,
        avatar_url,
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::Database(format!("unknown role: {role}")))?,
        providers,
        last_login: parse_timestamp(&last_login)?,
        created_at: parse_timestamp(&created_at)?,
    }))
}

fn parse_provider(s: &str) -> Result<Provider, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Database(format!("unknown provider: {s}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("invalid timestamp {s:?}: {e}")))
}
