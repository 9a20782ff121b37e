//! Field capability introspection.
//!
//! Different deployments run different `users` schemas — some carry
//! `nickname` and `avatar` columns, some carry side-provider id columns,
//! some carry none of them. The reconciler therefore never assumes a
//! column exists: it consults a [`FieldCapabilitySet`] built from the live
//! schema, queried fresh for every reconciliation.

use std::collections::BTreeSet;

/// Column name of the primary provider id.
pub const COL_AUTHX_ID: &str = "authx_id";
/// Column name of the display name.
pub const COL_NAME: &str = "name";
/// Column name of the nickname.
pub const COL_NICKNAME: &str = "nickname";
/// Column name of the avatar URL.
pub const COL_AVATAR: &str = "avatar";
/// Column name of the verification timestamp.
pub const COL_EMAIL_VERIFIED_AT: &str = "email_verified_at";
/// Column name of the inferred provider.
pub const COL_AUTH_PROVIDER: &str = "auth_provider";

/// The set of optional columns the local record schema currently exposes.
///
/// Built from the storage layer's schema listing; never cached across
/// requests. Columns not in this set are never referenced by the
/// reconciler, even when the provider payload carries values for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldCapabilitySet {
    columns: BTreeSet<String>,
}

impl FieldCapabilitySet {
    /// Build from an iterator of column names.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the schema exposes `column`.
    pub fn supports(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Number of known columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the schema listing came back empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over the known column names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}

/// The side-column name for a provider, e.g. `google` → `google_id`.
pub fn provider_id_column(provider: &str) -> String {
    format!("{provider}_id")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
