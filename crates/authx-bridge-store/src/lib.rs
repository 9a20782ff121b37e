//! Storage for the AuthX login bridge.
//!
//! Two stores over one SQLite database:
//!
//! - [`UserStore`] — the email-keyed user record store the reconciler
//!   writes through. Its schema is introspected live (`PRAGMA
//!   table_info`) so deployments can add or drop optional columns and the
//!   reconciler adapts without code changes. The upsert is a single
//!   atomic `INSERT .. ON CONFLICT(email) DO UPDATE`, never a
//!   read-modify-write pair.
//! - [`SessionStore`] — auth sessions: an anonymous session carries the
//!   pending OAuth state across the redirect, login binds a user and the
//!   session id is regenerated afterwards (session-fixation mitigation).
//!
//! All SQLite work runs on the blocking thread pool via
//! [`Database::execute`].

pub mod db;
pub mod error;
pub mod migration;
pub mod sessions;
pub mod users;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use sessions::{AuthSession, SessionStore};
pub use users::UserStore;
