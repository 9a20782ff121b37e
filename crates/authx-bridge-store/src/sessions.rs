//! Auth session persistence.
//!
//! Sessions back the login gateway: an anonymous session carries the
//! pending OAuth `state` across the authorize redirect; a successful
//! callback binds the user with [`SessionStore::login`] and then calls
//! [`SessionStore::regenerate`] so the post-login session id is never one
//! that existed before authentication (session fixation). Logout deletes
//! the row; the caller issues a fresh anonymous session, which rotates
//! the anti-forgery token as a side effect of being new.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Lifetime of an anonymous (pre-login) session.
const ANONYMOUS_TTL_SECS: i64 = 10 * 60;

/// Lifetime of a logged-in session without the remember flag.
const LOGIN_TTL_SECS: i64 = 2 * 60 * 60;

/// Lifetime of a remembered session.
const REMEMBER_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Length of the anti-forgery token in bytes (before base64 encoding).
const CSRF_TOKEN_BYTES: usize = 32;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Unique identifier (UUID v7); doubles as the cookie value.
    pub id: String,
    /// The logged-in user, or `None` for an anonymous session.
    pub user_id: Option<String>,
    /// The pending OAuth state, present between redirect and callback.
    pub oauth_state: Option<String>,
    /// Anti-forgery token for state-changing form posts.
    pub csrf_token: String,
    /// Whether this is a long-lived remembered session.
    pub remember: bool,
    /// Unix timestamp when the session was created.
    pub created_at: i64,
    /// Unix timestamp when the session expires.
    pub expires_at: i64,
}

impl AuthSession {
    /// Whether a user is bound to this session.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  SessionStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD operations on auth sessions.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    /// Create a session store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Start an anonymous session, optionally carrying a pending OAuth
    /// state token.
    #[instrument(skip(self, oauth_state))]
    pub async fn begin(&self, oauth_state: Option<&str>) -> StoreResult<AuthSession> {
        let now = Utc::now().timestamp();
        let session = AuthSession {
            id: Uuid::now_v7().to_string(),
            user_id: None,
            oauth_state: oauth_state.map(str::to_string),
            csrf_token: generate_token()?,
            remember: false,
            created_at: now,
            expires_at: now + ANONYMOUS_TTL_SECS,
        };

        let row = session.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO auth_sessions (id, user_id, oauth_state, csrf_token, remember, created_at, expires_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        row.id,
                        row.user_id,
                        row.oauth_state,
                        row.csrf_token,
                        row.remember,
                        row.created_at,
                        row.expires_at
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(session_id = %session.id, "anonymous session started");
        Ok(session)
    }

    /// Fetch a live session by id. Expired sessions are deleted on read
    /// and reported as absent.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Option<AuthSession>> {
        let id = id.to_string();
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let session = query_session(conn, &id)?;
                match session {
                    Some(session) if session.expires_at <= now => {
                        conn.execute(
                            "DELETE FROM auth_sessions WHERE id = ?1",
                            rusqlite::params![id],
                        )?;
                        Ok(None)
                    }
                    other => Ok(other),
                }
            })
            .await
    }

    /// Read and clear the pending OAuth state — the state is single-use,
    /// so a replayed callback finds nothing to match against. An expired
    /// session yields no state either.
    #[instrument(skip(self))]
    pub async fn take_state(&self, id: &str) -> StoreResult<Option<String>> {
        let id = id.to_string();
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let session = query_session(conn, &id)?;
                let Some(session) = session else {
                    return Ok(None);
                };
                if session.expires_at <= now {
                    conn.execute(
                        "DELETE FROM auth_sessions WHERE id = ?1",
                        rusqlite::params![id],
                    )?;
                    return Ok(None);
                }

                conn.execute(
                    "UPDATE auth_sessions SET oauth_state = NULL WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                Ok(session.oauth_state)
            })
            .await
    }

    /// Bind a user to the session and extend its lifetime per the
    /// remember flag. The pending OAuth state is cleared.
    #[instrument(skip(self))]
    pub async fn login(
        &self,
        session_id: &str,
        user_id: &str,
        remember: bool,
    ) -> StoreResult<AuthSession> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        let now = Utc::now().timestamp();
        let ttl = if remember {
            REMEMBER_TTL_SECS
        } else {
            LOGIN_TTL_SECS
        };

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE auth_sessions \
                     SET user_id = ?2, remember = ?3, oauth_state = NULL, expires_at = ?4 \
                     WHERE id = ?1",
                    rusqlite::params![session_id, user_id, remember, now + ttl],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "session",
                        id: session_id.clone(),
                    });
                }

                query_session(conn, &session_id)?.ok_or(StoreError::NotFound {
                    entity: "session",
                    id: session_id,
                })
            })
            .await
    }

    /// Issue a new session id for an existing session, deleting the old
    /// row. Everything but the id is carried over.
    ///
    /// Called strictly after [`login`] — the id under which identity was
    /// established never survives into the authenticated session.
    ///
    /// [`login`]: SessionStore::login
    #[instrument(skip(self))]
    pub async fn regenerate(&self, session_id: &str) -> StoreResult<AuthSession> {
        let old_id = session_id.to_string();
        let new_id = Uuid::now_v7().to_string();

        let session = self
            .db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE auth_sessions SET id = ?2 WHERE id = ?1",
                    rusqlite::params![old_id, new_id],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "session",
                        id: old_id,
                    });
                }

                query_session(conn, &new_id)?.ok_or(StoreError::NotFound {
                    entity: "session",
                    id: new_id,
                })
            })
            .await?;

        debug!(session_id = %session.id, "session id regenerated");
        Ok(session)
    }

    /// Delete a session. Deleting an unknown id is not an error.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, session_id: &str) -> StoreResult<()> {
        let session_id = session_id.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "DELETE FROM auth_sessions WHERE id = ?1",
                    rusqlite::params![session_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Delete all expired sessions and return how many were removed.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> StoreResult<usize> {
        let now = Utc::now().timestamp();
        self.db
            .execute(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM auth_sessions WHERE expires_at <= ?1",
                    rusqlite::params![now],
                )?;
                Ok(removed)
            })
            .await
    }
}

// ── internals ────────────────────────────────────────────────────────

fn query_session(
    conn: &rusqlite::Connection,
    id: &str,
) -> StoreResult<Option<AuthSession>> {
    let result = conn.query_row(
        "SELECT id, user_id, oauth_state, csrf_token, remember, created_at, expires_at \
         FROM auth_sessions WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(AuthSession {
                id: row.get(0)?,
                user_id: row.get(1)?,
                oauth_state: row.get(2)?,
                csrf_token: row.get(3)?,
                remember: row.get(4)?,
                created_at: row.get(5)?,
                expires_at: row.get(6)?,
            })
        },
    );

    match result {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

/// Generate an anti-forgery token (random 32 bytes, base64url encoded).
fn generate_token() -> StoreResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| StoreError::InvalidArgument("CSPRNG failure".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

// ── tests ────────────────────────────────────────────────────────────
