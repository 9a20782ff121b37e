//! Local user records and the reconciled write-set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A local user record, keyed by email.
///
/// Created on first successful reconciliation for an email and only
/// updated afterwards — this subsystem never deletes records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// Email as asserted by the identity provider. Unique, not
    /// case-normalized.
    pub email: String,
    /// Display name. Never blank — reconciliation falls back to the email
    /// local-part.
    pub name: String,
    /// Optional nickname.
    pub nickname: Option<String>,
    /// Optional avatar URL.
    pub avatar: Option<String>,
    /// The primary provider's id for this user (string or number).
    pub authx_id: Option<Value>,
    /// The provider this account was last asserted through.
    pub auth_provider: Option<String>,
    /// Side-provider id columns, keyed by column name (e.g. `google_id`).
    pub provider_ids: BTreeMap<String, Value>,
    /// When the email was verified, if known.
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Unix timestamp when the record was created.
    pub created_at: i64,
    /// Unix timestamp when the record was last updated.
    pub updated_at: i64,
}

impl UserRecord {
    /// The current value of a provider-id column on this record, covering
    /// both the primary column and side columns.
    pub fn provider_id(&self, column: &str) -> Option<&Value> {
        if column == crate::capability::COL_AUTHX_ID {
            self.authx_id.as_ref()
        } else {
            self.provider_ids.get(column)
        }
    }
}

/// The deterministic write-set computed by a reconciliation.
///
/// A `None` field means "omitted from the write entirely" — that is how
/// the engine avoids clobbering existing state with blanks. The email is
/// not part of the set; it is the upsert key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledAttributes {
    /// Display name, when the schema supports it.
    pub name: Option<String>,
    /// Nickname, only when the identity carried a non-empty one.
    pub nickname: Option<String>,
    /// Avatar URL, only when the identity carried a non-empty one.
    pub avatar: Option<String>,
    /// Primary provider id.
    pub authx_id: Option<Value>,
    /// Inferred provider name.
    pub auth_provider: Option<String>,
    /// Side-provider id columns to write, keyed by column name.
    pub provider_ids: BTreeMap<String, Value>,
    /// Verification timestamp. `None` is always an omission, never a
    /// null overwrite.
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl ReconciledAttributes {
    /// True when the reconciliation produced nothing to write beyond the
    /// email key itself.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.nickname.is_none()
            && self.avatar.is_none()
            && self.authx_id.is_none()
            && self.auth_provider.is_none()
            && self.provider_ids.is_empty()
            && self.email_verified_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
