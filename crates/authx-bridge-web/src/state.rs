//! Shared application state.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. Per-request decision state (capability set, allowlist
//! normalization) is derived fresh inside the engine — nothing here
//! caches reconciliation inputs.

use std::sync::Arc;

use authx_bridge_client::AuthxClient;
use authx_bridge_identity::{AdminAllowlist, IdentityReconciler, ReconciliationPolicy};
use authx_bridge_store::{SessionStore, UserStore};

/// Shared state accessible from every handler.
pub struct AppState {
    /// The OAuth client for the AuthX provider.
    pub client: AuthxClient,

    /// The user record store.
    pub users: UserStore,

    /// The auth session store.
    pub sessions: SessionStore,

    /// The reconciliation engine, writing through the user store.
    pub reconciler: IdentityReconciler<UserStore>,

    /// The admin allowlist, also consulted by the admin middleware.
    pub allowlist: AdminAllowlist,

    /// Policy knobs for login and logout behavior.
    pub policy: ReconciliationPolicy,
}

impl AppState {
    /// Assemble the state shared by all handlers.
    pub fn new(
        client: AuthxClient,
        users: UserStore,
        sessions: SessionStore,
        allowlist: AdminAllowlist,
        policy: ReconciliationPolicy,
    ) -> Arc<Self> {
        let reconciler =
            IdentityReconciler::new(users.clone(), allowlist.clone(), policy.clone());
        Arc::new(Self {
            client,
            users,
            sessions,
            reconciler,
            allowlist,
            policy,
        })
    }
}
