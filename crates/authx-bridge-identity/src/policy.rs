//! Reconciliation policy.
//!
//! The per-deployment policy knobs, assembled once from configuration and
//! passed in explicitly — the engine never reads global state.

/// Policy values consulted during reconciliation and logout.
#[derive(Debug, Clone)]
pub struct ReconciliationPolicy {
    /// When set, a callback for an email that is neither on the admin
    /// allowlist nor already present in the store is refused. Existing
    /// users always log in regardless of this flag.
    pub prevent_non_admin_creation: bool,

    /// Whether sessions established after login are long-lived.
    pub remember_user: bool,

    /// Where to send the user after a successful login.
    pub post_login_redirect: String,

    /// Whether logout should also redirect to the provider's logout page.
    pub logout_from_authx: bool,

    /// Explicit logout URL override; when unset, the provider's
    /// `<base>/logout` endpoint is used.
    pub logout_url_override: Option<String>,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            prevent_non_admin_creation: false,
            remember_user: true,
            post_login_redirect: "/dashboard".to_string(),
            logout_from_authx: true,
            logout_url_override: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
