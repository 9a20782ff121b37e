//! Error taxonomy for identity reconciliation.
//!
//! The boundary layer maps these to transport status codes; nothing in
//! this crate knows about HTTP. Parse failures for optional fields are
//! NOT errors — they fall through to the next precedence source inside
//! the reconciler.

use crate::store::StoreFault;

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The asserted identity is unusable (missing email). Client input,
    /// not retried.
    #[error("invalid identity: {reason}")]
    InvalidIdentity {
        /// What made the identity unusable.
        reason: String,
    },

    /// The admin-creation policy refused to create a record for this
    /// email. Existing users are never blocked by this — the gate applies
    /// to creation only.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Why the policy refused.
        reason: String,
    },

    /// The local record store (or its schema) could not be resolved.
    /// Deployment misconfiguration — fatal and operator-actionable.
    #[error("user record store unavailable: {reason}")]
    RecordTypeUnavailable {
        /// What the store reported.
        reason: String,
    },

    /// An unexpected storage failure. Propagated, never masked.
    #[error("store error: {reason}")]
    Store {
        /// What the backend reported.
        reason: String,
    },
}

impl From<StoreFault> for IdentityError {
    fn from(fault: StoreFault) -> Self {
        match fault {
            StoreFault::SchemaUnavailable { reason } => {
                Self::RecordTypeUnavailable { reason }
            }
            StoreFault::Backend { reason } => Self::Store { reason },
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, IdentityError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
