//! Environment-driven configuration.
//!
//! [`BridgeConfig`] gathers the whole configuration surface once at
//! startup. Parsing is separated from the environment read
//! ([`BridgeConfig::from_lookup`]) so tests can inject values without
//! touching process state.

use authx_bridge_client::AuthxConfig;
use authx_bridge_identity::{AdminAllowlist, ReconciliationPolicy};

use crate::error::WebError;

/// Complete configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: String,
    /// Port to listen on.
    pub port: u16,
    /// Path of the SQLite database file.
    pub database_path: String,
    /// Base URL of the AuthX server.
    pub authx_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered with AuthX.
    pub redirect_uri: String,
    /// Whether to verify the provider's TLS certificate.
    pub verify_ssl: bool,
    /// Raw admin email list, comma-separated.
    pub admin_emails: String,
    /// Refuse to create records for non-allowlisted emails.
    pub prevent_non_admin_user_creation: bool,
    /// Establish long-lived sessions on login.
    pub remember_user: bool,
    /// Where to send the user after login.
    pub post_login_redirect: String,
    /// Whether logout also redirects to the provider.
    pub logout_from_authx: bool,
    /// Explicit provider logout URL override.
    pub authx_logout_url: Option<String>,
}

impl BridgeConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, WebError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Config`] when a required value
    /// (`AUTHX_CLIENT_ID`, `AUTHX_CLIENT_SECRET`, `AUTHX_REDIRECT_URI`)
    /// is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WebError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| WebError::Config {
                reason: format!("missing required configuration value: {key}"),
            })
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| "data/authx-bridge.db".to_string()),
            authx_url: lookup("AUTHX_URL").unwrap_or_else(|| "http://localhost:8000".to_string()),
            client_id: required("AUTHX_CLIENT_ID")?,
            client_secret: required("AUTHX_CLIENT_SECRET")?,
            redirect_uri: required("AUTHX_REDIRECT_URI")?,
            verify_ssl: parse_bool(lookup("AUTHX_VERIFY_SSL").as_deref(), true),
            admin_emails: lookup("ADMIN_EMAILS").unwrap_or_default(),
            prevent_non_admin_user_creation: parse_bool(
                lookup("PREVENT_NON_ADMIN_USER_CREATION").as_deref(),
                false,
            ),
            remember_user: parse_bool(lookup("REMEMBER_USER").as_deref(), true),
            post_login_redirect: lookup("POST_LOGIN_REDIRECT")
                .unwrap_or_else(|| "/dashboard".to_string()),
            logout_from_authx: parse_bool(lookup("LOGOUT_FROM_AUTHX").as_deref(), true),
            authx_logout_url: lookup("AUTHX_LOGOUT_URL").filter(|v| !v.trim().is_empty()),
        })
    }

    /// The `host:port` string this server binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// The OAuth client configuration derived from this config.
    pub fn authx(&self) -> AuthxConfig {
        let mut authx = AuthxConfig::new(
            self.authx_url.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
        );
        authx.verify_tls = self.verify_ssl;
        authx
    }

    /// The admin allowlist derived from the configured CSV.
    pub fn allowlist(&self) -> AdminAllowlist {
        AdminAllowlist::from_csv(&self.admin_emails)
    }

    /// The reconciliation policy derived from this config.
    pub fn policy(&self) -> ReconciliationPolicy {
        ReconciliationPolicy {
            prevent_non_admin_creation: self.prevent_non_admin_user_creation,
            remember_user: self.remember_user,
            post_login_redirect: self.post_login_redirect.clone(),
            logout_from_authx: self.logout_from_authx,
            logout_url_override: self.authx_logout_url.clone(),
        }
    }
}

/// Boolean coercion matching the original deployment's forms: `1`,
/// `true`, `on` and `yes` (any case) are true; `0`, `false`, `off`,
/// `no` and empty are false; anything else falls back to the default.
fn parse_bool(value: Option<&str>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => true,
        "0" | "false" | "off" | "no" | "" => false,
        _ => default,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
