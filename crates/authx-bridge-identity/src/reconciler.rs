//! The identity reconciliation engine.
//!
//! Given an [`ExternalIdentity`], the live [`FieldCapabilitySet`], and an
//! optional existing record, the engine computes a deterministic write-set
//! and persists it through the email-keyed upsert. Running the same
//! identity against the same record twice yields the same attributes both
//! times — there is no drift.
//!
//! Three precedence rules do the interesting work:
//!
//! - **Provider-id resolution**: payload value > primary identity id (for
//!   the primary column only) > existing record value > absent.
//! - **Provider inference**: payload `auth_provider` > recognized
//!   side-provider id in the payload or on the existing record > `authx`.
//! - **Verification-timestamp resolution**: parseable payload timestamp >
//!   truthy `email_verified` at the evaluation instant > omitted. Parse
//!   failures fall through to the next source, never error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use authx_bridge_client::ExternalIdentity;

use crate::allowlist::AdminAllowlist;
use crate::capability::{
    COL_AUTH_PROVIDER, COL_AUTHX_ID, COL_AVATAR, COL_EMAIL_VERIFIED_AT, COL_NAME, COL_NICKNAME,
    FieldCapabilitySet, provider_id_column,
};
use crate::error::{IdentityError, Result};
use crate::policy::ReconciliationPolicy;
use crate::record::{ReconciledAttributes, UserRecord};
use crate::store::RecordStore;

/// Canonical name of the primary provider.
pub const PRIMARY_PROVIDER: &str = "authx";

/// Side providers whose `<provider>_id` columns are recognized during
/// provider inference. An allow-list, because inference must not trust
/// arbitrary `*_id` keys from a remote payload.
const RECOGNIZED_SIDE_PROVIDERS: &[&str] = &["google", "github", "gitlab", "microsoft", "apple"];

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Deterministic, idempotent merge of external identities into local
/// user records.
pub struct IdentityReconciler<S> {
    store: S,
    allowlist: AdminAllowlist,
    policy: ReconciliationPolicy,
}

impl<S: RecordStore> IdentityReconciler<S> {
    /// Create an engine over the given store, allowlist and policy.
    pub fn new(store: S, allowlist: AdminAllowlist, policy: ReconciliationPolicy) -> Self {
        Self {
            store,
            allowlist,
            policy,
        }
    }

    /// The policy this engine was built with.
    pub fn policy(&self) -> &ReconciliationPolicy {
        &self.policy
    }

    /// Reconcile an identity, evaluating time-dependent rules at now.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::InvalidIdentity`] when the identity carries no
    ///   email.
    /// - [`IdentityError::Forbidden`] when the creation gate refuses a
    ///   new record.
    /// - [`IdentityError::RecordTypeUnavailable`] when the store cannot
    ///   resolve its schema.
    pub async fn reconcile(&self, identity: &ExternalIdentity) -> Result<UserRecord> {
        self.reconcile_at(identity, Utc::now()).await
    }

    /// Reconcile with an explicit evaluation instant.
    ///
    /// The instant only matters when `email_verified` is asserted without
    /// a timestamp; passing it explicitly keeps the engine deterministic
    /// under test.
    pub async fn reconcile_at(
        &self,
        identity: &ExternalIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserRecord> {
        if !identity.has_email() {
            return Err(IdentityError::InvalidIdentity {
                reason: "the identity provider did not return a valid email address".to_string(),
            });
        }
        let email = identity.email.as_str();

        // The creation gate needs the existence check, so the lookup
        // happens before the gate is evaluated.
        let existing = self.store.find_by_email(email).await?;

        if self.policy.prevent_non_admin_creation
            && existing.is_none()
            && !self.allowlist.allows(Some(email))
        {
            tracing::warn!(email = %email, "refusing to create a non-admin user");
            return Err(IdentityError::Forbidden {
                reason: "only admin users can access this application".to_string(),
            });
        }

        // Queried fresh — the schema may differ per deployment and the
        // capability set is never cached across requests.
        let caps = self.store.supported_fields().await?;

        let attrs = compute_attributes(identity, existing.as_ref(), &caps, now);
        let record = self.store.upsert(email, &attrs).await?;

        tracing::info!(
            email = %record.email,
            created = existing.is_none(),
            "identity reconciled"
        );
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Attribute computation
// ---------------------------------------------------------------------------

/// Compute the write-set for one reconciliation. Pure.
fn compute_attributes(
    identity: &ExternalIdentity,
    existing: Option<&UserRecord>,
    caps: &FieldCapabilitySet,
    now: DateTime<Utc>,
) -> ReconciledAttributes {
    let mut attrs = ReconciledAttributes::default();

    if caps.supports(COL_NAME) {
        attrs.name = Some(resolve_name(identity));
    }

    if caps.supports(COL_NICKNAME) {
        attrs.nickname = non_empty(identity.nickname.as_deref());
    }

    if caps.supports(COL_AVATAR) {
        attrs.avatar = non_empty(identity.avatar.as_deref());
    }

    if caps.supports(COL_AUTHX_ID) {
        attrs.authx_id =
            resolve_provider_id(COL_AUTHX_ID, identity.id.as_ref(), &identity.raw, existing);
    }

    if caps.supports(COL_AUTH_PROVIDER) {
        let provider = resolve_auth_provider(&identity.raw, existing);

        let side_column = provider_id_column(&provider);
        if side_column != COL_AUTHX_ID && caps.supports(&side_column) {
            if let Some(value) = resolve_provider_id(&side_column, None, &identity.raw, existing) {
                attrs.provider_ids.insert(side_column, value);
            }
        }

        attrs.auth_provider = Some(provider);
    }

    if caps.supports(COL_EMAIL_VERIFIED_AT) {
        // None here means "omit" — a previously-verified record is never
        // reset to null by a payload that carries no new information.
        attrs.email_verified_at = resolve_email_verified_at(&identity.raw, now);
    }

    attrs
}

/// The display name: the asserted name, else the email local-part.
fn resolve_name(identity: &ExternalIdentity) -> String {
    if let Some(name) = non_empty(identity.name.as_deref()) {
        return name;
    }

    let email = identity.email.as_str();
    match email.split_once('@') {
        // A name must never end up blank, even for a pathological
        // address with an empty local-part.
        Some((local, _)) if !local.is_empty() => local.to_string(),
        _ => email.to_string(),
    }
}

/// Provider-id precedence: payload > primary id (primary column only) >
/// existing record > absent.
fn resolve_provider_id(
    column: &str,
    primary_id: Option<&Value>,
    raw: &Map<String, Value>,
    existing: Option<&UserRecord>,
) -> Option<Value> {
    if let Some(value) = raw.get(column).and_then(normalize_provider_id) {
        return Some(value);
    }

    if column == COL_AUTHX_ID {
        if let Some(value) = primary_id.and_then(normalize_provider_id) {
            return Some(value);
        }
    }

    existing
        .and_then(|record| record.provider_id(column))
        .cloned()
}

/// Provider inference: payload `auth_provider` > recognized side id in
/// the payload or on the existing record > the primary provider.
fn resolve_auth_provider(raw: &Map<String, Value>, existing: Option<&UserRecord>) -> String {
    if let Some(Value::String(provider)) = raw.get("auth_provider") {
        let provider = provider.trim().to_lowercase();
        if !provider.is_empty() {
            return provider;
        }
    }

    for provider in RECOGNIZED_SIDE_PROVIDERS {
        let column = provider_id_column(provider);
        let in_payload = raw.get(&column).and_then(normalize_provider_id).is_some();
        let on_record = existing.is_some_and(|record| record.provider_id(&column).is_some());
        if in_payload || on_record {
            return (*provider).to_string();
        }
    }

    PRIMARY_PROVIDER.to_string()
}

/// Verification-timestamp precedence: parseable payload timestamp >
/// truthy `email_verified` at `now` > none. Parse failures fall through.
fn resolve_email_verified_at(raw: &Map<String, Value>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(value) = raw.get("email_verified_at") {
        if let Some(parsed) = parse_timestamp(value) {
            return Some(parsed);
        }
    }

    if raw.get("email_verified").is_some_and(truthy) {
        return Some(now);
    }

    None
}

/// Parse a payload timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as
/// UTC), or unix seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Boolean coercion matching the configuration layer: `true`, `"1"`,
/// `"true"`, `"on"`, `"yes"` and the number 1 are truthy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "on" | "yes")
        }
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Coerce a payload provider id: non-empty strings (all-digit strings
/// become integers, matching how the provider serializes numeric ids)
/// and numbers pass; everything else is absent.
fn normalize_provider_id(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Some(Value::from(n));
                }
            }
            Some(Value::String(s.clone()))
        }
        Value::Number(_) => Some(value.clone()),
        _ => None,
    }
}

/// Non-empty after trimming, or `None`.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::store::StoreFault;
    // `super::*` pulls in the crate's single-arg `Result` alias; the mock store
    // implements the trait which uses the standard two-arg `Result`.
    use std::result::Result;

    /// All optional columns plus the mandatory ones.
    const FULL_SCHEMA: &[&str] = &[
        "id",
        "email",
        "name",
        "nickname",
        "avatar",
        "authx_id",
        "auth_provider",
        "google_id",
        "github_id",
        "email_verified_at",
    ];

    /// In-memory record store mirroring the concrete store's merge
    /// semantics: omitted fields are left untouched.
    struct MemoryStore {
        records: Mutex<HashMap<String, UserRecord>>,
        columns: Vec<String>,
        next_id: AtomicU64,
        fail_schema: bool,
    }

    impl MemoryStore {
        fn new(columns: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(HashMap::new()),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                next_id: AtomicU64::new(1),
                fail_schema: false,
            })
        }

        fn full() -> Arc<Self> {
            Self::new(FULL_SCHEMA)
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(HashMap::new()),
                columns: FULL_SCHEMA.iter().map(|c| c.to_string()).collect(),
                next_id: AtomicU64::new(1),
                fail_schema: true,
            })
        }

        fn seed(&self, record: UserRecord) {
            self.records
                .lock()
                .unwrap()
                .insert(record.email.clone(), record);
        }

        fn count(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RecordStore for Arc<MemoryStore> {
        async fn supported_fields(&self) -> Result<FieldCapabilitySet, StoreFault> {
            if self.fail_schema {
                return Err(StoreFault::SchemaUnavailable {
                    reason: "no such table: users".to_string(),
                });
            }
            Ok(FieldCapabilitySet::from_columns(self.columns.clone()))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreFault> {
            if self.fail_schema {
                return Err(StoreFault::SchemaUnavailable {
                    reason: "no such table: users".to_string(),
                });
            }
            Ok(self.records.lock().unwrap().get(email).cloned())
        }

        async fn upsert(
            &self,
            email: &str,
            attrs: &ReconciledAttributes,
        ) -> Result<UserRecord, StoreFault> {
            let mut records = self.records.lock().unwrap();
            let mut record = records.get(email).cloned().unwrap_or_else(|| UserRecord {
                id: format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
                email: email.to_string(),
                name: String::new(),
                nickname: None,
                avatar: None,
                authx_id: None,
                auth_provider: None,
                provider_ids: BTreeMap::new(),
                email_verified_at: None,
                created_at: 0,
                updated_at: 0,
            });

            if let Some(name) = &attrs.name {
                record.name = name.clone();
            }
            if let Some(nickname) = &attrs.nickname {
                record.nickname = Some(nickname.clone());
            }
            if let Some(avatar) = &attrs.avatar {
                record.avatar = Some(avatar.clone());
            }
            if let Some(authx_id) = &attrs.authx_id {
                record.authx_id = Some(authx_id.clone());
            }
            if let Some(provider) = &attrs.auth_provider {
                record.auth_provider = Some(provider.clone());
            }
            for (column, value) in &attrs.provider_ids {
                record.provider_ids.insert(column.clone(), value.clone());
            }
            if let Some(verified_at) = attrs.email_verified_at {
                record.email_verified_at = Some(verified_at);
            }

            records.insert(email.to_string(), record.clone());
            Ok(record)
        }
    }

    fn identity(payload: Value) -> ExternalIdentity {
        ExternalIdentity::from_profile(payload.as_object().cloned().unwrap())
    }

    fn engine(store: &Arc<MemoryStore>) -> IdentityReconciler<Arc<MemoryStore>> {
        IdentityReconciler::new(
            Arc::clone(store),
            AdminAllowlist::default(),
            ReconciliationPolicy::default(),
        )
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-11T13:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    // -- step 1: email validation ------------------------------------------

    #[tokio::test]
    async fn missing_email_is_rejected_and_nothing_is_written() {
        let store = MemoryStore::full();
        let result = engine(&store)
            .reconcile(&identity(json!({ "id": 1 })))
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidIdentity { .. })));
        assert_eq!(store.count(), 0);
    }

    // -- step 2: creation gate ---------------------------------------------

    #[tokio::test]
    async fn creation_gate_blocks_unknown_non_admin() {
        let store = MemoryStore::full();
        let reconciler = IdentityReconciler::new(
            Arc::clone(&store),
            AdminAllowlist::from_emails(["admin@example.com"]),
            ReconciliationPolicy {
                prevent_non_admin_creation: true,
                ..ReconciliationPolicy::default()
            },
        );

        let result = reconciler
            .reconcile(&identity(json!({ "email": "blocked@example.com" })))
            .await;

        assert!(matches!(result, Err(IdentityError::Forbidden { .. })));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn creation_gate_admits_allowlisted_email() {
        let store = MemoryStore::full();
        let reconciler = IdentityReconciler::new(
            Arc::clone(&store),
            AdminAllowlist::from_emails(["admin@example.com"]),
            ReconciliationPolicy {
                prevent_non_admin_creation: true,
                ..ReconciliationPolicy::default()
            },
        );

        let record = reconciler
            .reconcile(&identity(json!({ "email": "admin@example.com", "id": 7 })))
            .await
            .unwrap();

        assert_eq!(record.email, "admin@example.com");
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn creation_gate_never_blocks_existing_users() {
        let store = MemoryStore::full();
        store.seed(UserRecord {
            id: "u1".to_string(),
            email: "returning@example.com".to_string(),
            name: "Returning".to_string(),
            nickname: None,
            avatar: None,
            authx_id: None,
            auth_provider: None,
            provider_ids: BTreeMap::new(),
            email_verified_at: None,
            created_at: 0,
            updated_at: 0,
        });

        let reconciler = IdentityReconciler::new(
            Arc::clone(&store),
            AdminAllowlist::from_emails(["admin@example.com"]),
            ReconciliationPolicy {
                prevent_non_admin_creation: true,
                ..ReconciliationPolicy::default()
            },
        );

        let record = reconciler
            .reconcile(&identity(json!({ "email": "returning@example.com" })))
            .await
            .unwrap();
        assert_eq!(record.email, "returning@example.com");
    }

    // -- step 4: name fallback ---------------------------------------------

    #[tokio::test]
    async fn name_falls_back_to_email_local_part() {
        let store = MemoryStore::full();
        let record = engine(&store)
            .reconcile(&identity(json!({ "email": "grace.hopper@example.com" })))
            .await
            .unwrap();
        assert_eq!(record.name, "grace.hopper");
    }

    #[tokio::test]
    async fn asserted_name_wins_over_fallback() {
        let store = MemoryStore::full();
        let record = engine(&store)
            .reconcile(&identity(json!({
                "email": "grace@example.com",
                "name": "Grace Hopper",
            })))
            .await
            .unwrap();
        assert_eq!(record.name, "Grace Hopper");
    }

    // -- step 5: capability gating and blank handling ----------------------

    #[tokio::test]
    async fn unsupported_columns_are_never_written() {
        let store = MemoryStore::new(&["id", "email", "name"]);
        let record = engine(&store)
            .reconcile(&identity(json!({
                "email": "ada@example.com",
                "nickname": "ada",
                "avatar": "https://cdn.example.com/a.png",
                "id": 17,
                "auth_provider": "google",
                "google_id": "google-55",
                "email_verified": true,
            })))
            .await
            .unwrap();

        assert!(record.nickname.is_none());
        assert!(record.avatar.is_none());
        assert!(record.authx_id.is_none());
        assert!(record.auth_provider.is_none());
        assert!(record.provider_ids.is_empty());
        assert!(record.email_verified_at.is_none());
    }

    #[tokio::test]
    async fn blank_nickname_does_not_overwrite_existing_value() {
        let store = MemoryStore::full();
        store.seed(UserRecord {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            nickname: Some("adal".to_string()),
            avatar: Some("https://cdn.example.com/old.png".to_string()),
            authx_id: None,
            auth_provider: None,
            provider_ids: BTreeMap::new(),
            email_verified_at: None,
            created_at: 0,
            updated_at: 0,
        });

        let record = engine(&store)
            .reconcile(&identity(json!({ "email": "ada@example.com" })))
            .await
            .unwrap();

        assert_eq!(record.nickname.as_deref(), Some("adal"));
        assert_eq!(
            record.avatar.as_deref(),
            Some("https://cdn.example.com/old.png")
        );
    }

    // -- provider-id resolution --------------------------------------------

    #[test]
    fn provider_id_prefers_raw_payload_value() {
        let raw = json!({ "authx_id": "17" }).as_object().cloned().unwrap();
        let resolved = resolve_provider_id(COL_AUTHX_ID, Some(&json!(33)), &raw, None);
        assert_eq!(resolved, Some(json!(17)));
    }

    #[test]
    fn provider_id_falls_back_to_primary_identity_id() {
        let raw = Map::new();
        let resolved = resolve_provider_id(COL_AUTHX_ID, Some(&json!("33")), &raw, None);
        assert_eq!(resolved, Some(json!(33)));
    }

    #[test]
    fn primary_id_does_not_apply_to_side_columns() {
        let raw = Map::new();
        let resolved = resolve_provider_id("google_id", Some(&json!(33)), &raw, None);
        assert_eq!(resolved, None);
    }

    #[test]
    fn provider_id_falls_back_to_existing_record_value() {
        let raw = Map::new();
        let existing = UserRecord {
            id: "u1".to_string(),
            email: "e@example.com".to_string(),
            name: "E".to_string(),
            nickname: None,
            avatar: None,
            authx_id: None,
            auth_provider: None,
            provider_ids: BTreeMap::from([("google_id".to_string(), json!("google-77"))]),
            email_verified_at: None,
            created_at: 0,
            updated_at: 0,
        };

        let resolved = resolve_provider_id("google_id", None, &raw, Some(&existing));
        assert_eq!(resolved, Some(json!("google-77")));
    }

    #[test]
    fn provider_id_is_absent_when_no_source_has_one() {
        let raw = Map::new();
        assert_eq!(resolve_provider_id("google_id", None, &raw, None), None);
    }

    #[test]
    fn non_numeric_payload_ids_stay_strings() {
        let raw = json!({ "google_id": "google-55" })
            .as_object()
            .cloned()
            .unwrap();
        let resolved = resolve_provider_id("google_id", None, &raw, None);
        assert_eq!(resolved, Some(json!("google-55")));
    }

    // -- provider inference ------------------------------------------------

    #[test]
    fn inference_prefers_payload_auth_provider() {
        let raw = json!({ "auth_provider": " GOOGLE " })
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(resolve_auth_provider(&raw, None), "google");
    }

    #[test]
    fn inference_recognizes_side_id_in_payload() {
        let raw = json!({ "github_id": 910 }).as_object().cloned().unwrap();
        assert_eq!(resolve_auth_provider(&raw, None), "github");
    }

    #[test]
    fn inference_recognizes_side_id_on_existing_record() {
        let raw = Map::new();
        let existing = UserRecord {
            id: "u1".to_string(),
            email: "e@example.com".to_string(),
            name: "E".to_string(),
            nickname: None,
            avatar: None,
            authx_id: None,
            auth_provider: None,
            provider_ids: BTreeMap::from([("google_id".to_string(), json!("g-1"))]),
            email_verified_at: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(resolve_auth_provider(&raw, Some(&existing)), "google");
    }

    #[test]
    fn inference_defaults_to_the_primary_provider() {
        assert_eq!(resolve_auth_provider(&Map::new(), None), "authx");
    }

    #[tokio::test]
    async fn side_provider_column_is_written_for_inferred_provider() {
        let store = MemoryStore::full();
        let record = engine(&store)
            .reconcile(&identity(json!({
                "email": "ada@example.com",
                "auth_provider": "google",
                "google_id": "google-55",
            })))
            .await
            .unwrap();

        assert_eq!(record.auth_provider.as_deref(), Some("google"));
        assert_eq!(record.provider_ids.get("google_id"), Some(&json!("google-55")));
    }

    // -- verification-timestamp resolution ---------------------------------

    #[test]
    fn uses_payload_timestamp_when_parseable() {
        let raw = json!({
            "email_verified_at": "2026-02-11T10:15:00Z",
            "email_verified": false,
        })
        .as_object()
        .cloned()
        .unwrap();

        let resolved = resolve_email_verified_at(&raw, fixed_now()).unwrap();
        assert_eq!(resolved.to_rfc3339(), "2026-02-11T10:15:00+00:00");
    }

    #[test]
    fn accepts_space_separated_timestamps_as_utc() {
        let raw = json!({ "email_verified_at": "2026-02-11 10:15:00" })
            .as_object()
            .cloned()
            .unwrap();
        let resolved = resolve_email_verified_at(&raw, fixed_now()).unwrap();
        assert_eq!(resolved.to_rfc3339(), "2026-02-11T10:15:00+00:00");
    }

    #[test]
    fn falls_back_to_now_when_email_verified_is_true() {
        let raw = json!({ "email_verified": true }).as_object().cloned().unwrap();
        assert_eq!(resolve_email_verified_at(&raw, fixed_now()), Some(fixed_now()));
    }

    #[test]
    fn accepts_truthy_email_verified_strings() {
        for form in ["1", "true", "on", "yes", " TRUE "] {
            let raw = json!({ "email_verified": form }).as_object().cloned().unwrap();
            assert_eq!(
                resolve_email_verified_at(&raw, fixed_now()),
                Some(fixed_now()),
                "form {form:?} should be truthy"
            );
        }
    }

    #[test]
    fn unparseable_timestamp_falls_through_not_errors() {
        let raw = json!({
            "email_verified_at": "not-a-date",
            "email_verified": false,
        })
        .as_object()
        .cloned()
        .unwrap();
        assert_eq!(resolve_email_verified_at(&raw, fixed_now()), None);
    }

    #[test]
    fn unparseable_timestamp_with_truthy_flag_uses_now() {
        let raw = json!({
            "email_verified_at": "not-a-date",
            "email_verified": "1",
        })
        .as_object()
        .cloned()
        .unwrap();
        assert_eq!(resolve_email_verified_at(&raw, fixed_now()), Some(fixed_now()));
    }

    #[tokio::test]
    async fn new_unverified_user_has_no_verification_timestamp() {
        let store = MemoryStore::full();
        let record = engine(&store)
            .reconcile(&identity(json!({
                "email": "new@example.com",
                "authx_id": 17,
                "email_verified": false,
            })))
            .await
            .unwrap();

        assert_eq!(record.authx_id, Some(json!(17)));
        assert!(record.email_verified_at.is_none());
    }

    #[tokio::test]
    async fn verified_flag_without_timestamp_uses_evaluation_instant() {
        let store = MemoryStore::full();
        let record = engine(&store)
            .reconcile_at(
                &identity(json!({
                    "email": "new@example.com",
                    "email_verified": true,
                })),
                fixed_now(),
            )
            .await
            .unwrap();

        assert_eq!(record.email_verified_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn null_resolution_never_clears_prior_verification() {
        let store = MemoryStore::full();
        store.seed(UserRecord {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            nickname: None,
            avatar: None,
            authx_id: None,
            auth_provider: None,
            provider_ids: BTreeMap::new(),
            email_verified_at: Some(fixed_now()),
            created_at: 0,
            updated_at: 0,
        });

        let record = engine(&store)
            .reconcile(&identity(json!({
                "email": "ada@example.com",
                "email_verified": false,
            })))
            .await
            .unwrap();

        assert_eq!(record.email_verified_at, Some(fixed_now()));
    }

    // -- idempotence and failure mapping -----------------------------------

    #[tokio::test]
    async fn reconciling_twice_produces_identical_attributes() {
        let payload = json!({
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "nickname": "ada",
            "id": 17,
            "auth_provider": "google",
            "google_id": "google-55",
            "email_verified_at": "2026-02-11T10:15:00Z",
        });
        let identity = identity(payload);
        let caps = FieldCapabilitySet::from_columns(FULL_SCHEMA.to_vec());

        let store = MemoryStore::full();
        let first = engine(&store).reconcile_at(&identity, fixed_now()).await.unwrap();
        let second = engine(&store).reconcile_at(&identity, fixed_now()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.count(), 1);

        // The computed write-set itself is stable against the stored record.
        let attrs_a = compute_attributes(&identity, Some(&first), &caps, fixed_now());
        let attrs_b = compute_attributes(&identity, Some(&second), &caps, fixed_now());
        assert_eq!(attrs_a, attrs_b);
    }

    #[tokio::test]
    async fn schema_failure_surfaces_as_record_type_unavailable() {
        let store = MemoryStore::broken();
        let result = engine(&store)
            .reconcile(&identity(json!({ "email": "ada@example.com" })))
            .await;
        assert!(matches!(
            result,
            Err(IdentityError::RecordTypeUnavailable { .. })
        ));
    }
}
