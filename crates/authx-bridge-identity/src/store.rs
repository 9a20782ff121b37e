//! The storage seam the reconciler works through.
//!
//! The concrete store lives in its own crate; the engine only needs three
//! operations. Keeping the seam here lets the engine be exercised with an
//! in-memory double and keeps the dependency arrow pointing at the core.

use async_trait::async_trait;

use crate::capability::FieldCapabilitySet;
use crate::record::{ReconciledAttributes, UserRecord};

/// Failures a record store can report through the seam.
///
/// The engine maps [`SchemaUnavailable`] to the fatal
/// record-type-unavailable condition and propagates everything else.
///
/// [`SchemaUnavailable`]: StoreFault::SchemaUnavailable
#[derive(Debug, thiserror::Error)]
pub enum StoreFault {
    /// The user record schema could not be resolved at all — the
    /// deployment is misconfigured.
    #[error("schema unavailable: {reason}")]
    SchemaUnavailable {
        /// What the backend reported.
        reason: String,
    },

    /// Any other backend failure.
    #[error("{reason}")]
    Backend {
        /// What the backend reported.
        reason: String,
    },
}

/// An email-keyed user record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The columns the live schema currently exposes. Queried fresh per
    /// reconciliation — implementations must not cache across calls.
    async fn supported_fields(&self) -> Result<FieldCapabilitySet, StoreFault>;

    /// Look up a record by its exact stored email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreFault>;

    /// Create-or-update the record for `email` with the given write-set,
    /// atomically on the email key, and return the stored record.
    ///
    /// Implementations must not duplicate records for the same email and
    /// must leave omitted fields untouched.
    async fn upsert(
        &self,
        email: &str,
        attrs: &ReconciledAttributes,
    ) -> Result<UserRecord, StoreFault>;
}
