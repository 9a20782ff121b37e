//! Identity reconciliation engine for the AuthX login bridge.
//!
//! This crate owns the decision logic of the bridge: given an
//! [`ExternalIdentity`] asserted by the provider, the set of fields the
//! local record schema actually supports, and (optionally) an existing
//! record, it computes a deterministic, idempotent write-set and enforces
//! the admin-creation policy.
//!
//! # Components
//!
//! - [`AdminAllowlist`] — normalizes and membership-tests the configured
//!   set of privileged email addresses.
//! - [`FieldCapabilitySet`] — the columns the local schema exposes,
//!   queried fresh per reconciliation.
//! - [`ReconciliationPolicy`] — the per-deployment policy knobs (creation
//!   gate, remember flag, redirect and logout behavior).
//! - [`IdentityReconciler`] — the engine itself, reaching storage through
//!   the [`RecordStore`] trait so it can be exercised without a database.
//!
//! Reconciliation never deletes records and never writes a column the
//! schema does not support; "no new information" is expressed by omitting
//! a field from the write-set, not by writing null over existing state.

pub mod allowlist;
pub mod capability;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod record;
pub mod store;

pub use allowlist::AdminAllowlist;
pub use capability::FieldCapabilitySet;
pub use error::{IdentityError, Result};
pub use policy::ReconciliationPolicy;
pub use reconciler::IdentityReconciler;
pub use record::{ReconciledAttributes, UserRecord};
pub use store::{RecordStore, StoreFault};

// Re-exported so downstream crates name one identity type, not two crates.
pub use authx_bridge_client::ExternalIdentity;
