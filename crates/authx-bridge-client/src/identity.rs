//! The externally-asserted identity produced by a profile fetch.

use serde_json::{Map, Value};

/// A user identity as asserted by the AuthX provider.
///
/// Built once per callback from the `/api/user` response and then treated
/// as immutable. The well-known fields are lifted out of the payload for
/// convenience; the complete payload stays available in [`raw`] because
/// the reconciliation engine reads provider-specific keys
/// (`email_verified_at`, `auth_provider`, `<provider>_id`, ...) from it.
///
/// [`raw`]: ExternalIdentity::raw
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    /// The provider's primary identifier for this user (string or number).
    pub id: Option<Value>,
    /// Display name, when the provider supplies one.
    pub name: Option<String>,
    /// Short handle, when the provider supplies one.
    pub nickname: Option<String>,
    /// Email address. Empty when the provider omitted it — the
    /// reconciliation engine rejects empty emails, not this crate.
    pub email: String,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// The complete profile payload as returned by the provider.
    pub raw: Map<String, Value>,
}

impl ExternalIdentity {
    /// Map a raw profile payload into an identity.
    ///
    /// Mirrors the provider contract: `id`, `name`, `nickname`, `email`
    /// and `avatar` are lifted when present; all other keys are retained
    /// verbatim in `raw`.
    pub fn from_profile(raw: Map<String, Value>) -> Self {
        let id = raw.get("id").and_then(loose_id);
        let name = non_empty_string(raw.get("name"));
        let nickname = non_empty_string(raw.get("nickname"));
        let email = non_empty_string(raw.get("email")).unwrap_or_default();
        let avatar = non_empty_string(raw.get("avatar"));

        Self {
            id,
            name,
            nickname,
            email,
            avatar,
            raw,
        }
    }

    /// Whether the provider asserted a usable (non-empty) email.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// Extract a non-empty string value, or `None`.
fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Accept a primary id as either a non-empty string or a number.
fn loose_id(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(value.clone()),
        Value::Number(_) => Some(value.clone()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
