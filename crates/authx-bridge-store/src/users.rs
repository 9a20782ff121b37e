//! Email-keyed user record persistence.
//!
//! The reconciler never sees SQL — it hands over a write-set and this
//! store turns it into a single atomic `INSERT .. ON CONFLICT(email) DO
//! UPDATE`. Omitted fields never appear in the statement, so whatever a
//! record already holds stays untouched.
//!
//! The schema is the source of truth for what can be written: the column
//! listing is read from `PRAGMA table_info(users)` on every call, and the
//! write-set is intersected with it before any SQL is assembled.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use authx_bridge_identity::capability::{COL_AUTHX_ID, COL_EMAIL_VERIFIED_AT};
use authx_bridge_identity::{FieldCapabilitySet, ReconciledAttributes, RecordStore, StoreFault, UserRecord};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  UserStore
// ═══════════════════════════════════════════════════════════════════════

/// The email-keyed user record store.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    /// Create a user store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The columns the live `users` schema exposes.
    ///
    /// Queried fresh on every call — the schema may differ per deployment
    /// and may change between requests in admin tooling, so nothing is
    /// cached. A missing or column-less table is the fatal
    /// schema-unavailable condition.
    #[instrument(skip(self))]
    pub async fn supported_fields(&self) -> StoreResult<FieldCapabilitySet> {
        self.db
            .execute(|conn| {
                let columns = live_columns(conn)?;
                if columns.is_empty() {
                    return Err(StoreError::SchemaUnavailable(
                        "users table has no columns".to_string(),
                    ));
                }
                Ok(FieldCapabilitySet::from_columns(columns))
            })
            .await
            .map_err(schema_fault)
    }

    /// Look up a record by its exact stored email.
    ///
    /// Emails are stored as asserted by the identity provider — no case
    /// normalization on either side of the comparison.
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let email = email.to_string();
        self.db
            .execute(move |conn| read_record(conn, &email))
            .await
            .map_err(schema_fault)
    }

    /// Create-or-update the record for `email`, atomically on the email
    /// key, and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for an empty email — a
    /// record is never persisted without one.
    #[instrument(skip(self, attrs))]
    pub async fn upsert(
        &self,
        email: &str,
        attrs: &ReconciledAttributes,
    ) -> StoreResult<UserRecord> {
        if email.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "email must not be empty".to_string(),
            ));
        }

        let email = email.to_string();
        let attrs = attrs.clone();

        let record = self
            .db
            .execute(move |conn| {
                let columns = live_columns(conn)?;
                let write_set = build_write_set(&attrs, &columns);

                let id = Uuid::now_v7().to_string();
                let now = Utc::now().timestamp();

                // Assemble: INSERT INTO users (id, email, <set..>, created_at,
                // updated_at) VALUES (..) ON CONFLICT(email) DO UPDATE SET
                // <set..> = excluded.<set..>, updated_at = excluded.updated_at.
                // Only columns actually being written appear in the statement.
                let mut insert_cols = vec!["id".to_string(), "email".to_string()];
                let mut params: Vec<SqlValue> =
                    vec![SqlValue::Text(id), SqlValue::Text(email.clone())];

                for (column, value) in &write_set {
                    insert_cols.push(column.clone());
                    params.push(value.clone());
                }

                insert_cols.push("created_at".to_string());
                insert_cols.push("updated_at".to_string());
                params.push(SqlValue::Integer(now));
                params.push(SqlValue::Integer(now));

                let placeholders: Vec<String> =
                    (1..=insert_cols.len()).map(|i| format!("?{i}")).collect();

                let mut updates: Vec<String> = write_set
                    .iter()
                    .map(|(column, _)| format!("{column} = excluded.{column}"))
                    .collect();
                updates.push("updated_at = excluded.updated_at".to_string());

                let sql = format!(
                    "INSERT INTO users ({}) VALUES ({}) ON CONFLICT(email) DO UPDATE SET {}",
                    insert_cols.join(", "),
                    placeholders.join(", "),
                    updates.join(", "),
                );

                conn.execute(&sql, rusqlite::params_from_iter(params))?;

                read_record(conn, &email)?.ok_or_else(|| StoreError::NotFound {
                    entity: "user",
                    id: email.clone(),
                })
            })
            .await
            .map_err(schema_fault)?;

        debug!(email = %record.email, "user record upserted");
        Ok(record)
    }

    /// Fetch a record by id, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let email: Option<String> = match conn.query_row(
                    "SELECT email FROM users WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                ) {
                    Ok(email) => Some(email),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(StoreError::Sqlite(e)),
                };

                match email {
                    Some(email) => read_record(conn, &email),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Return the total number of user records.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  RecordStore seam
// ═══════════════════════════════════════════════════════════════════════

#[async_trait]
impl RecordStore for UserStore {
    async fn supported_fields(&self) -> Result<FieldCapabilitySet, StoreFault> {
        UserStore::supported_fields(self).await.map_err(to_fault)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreFault> {
        UserStore::find_by_email(self, email).await.map_err(to_fault)
    }

    async fn upsert(
        &self,
        email: &str,
        attrs: &ReconciledAttributes,
    ) -> Result<UserRecord, StoreFault> {
        UserStore::upsert(self, email, attrs).await.map_err(to_fault)
    }
}

fn to_fault(err: StoreError) -> StoreFault {
    match err {
        StoreError::SchemaUnavailable(reason) => StoreFault::SchemaUnavailable { reason },
        other => StoreFault::Backend {
            reason: other.to_string(),
        },
    }
}

/// A missing `users` table means the record type cannot be resolved at
/// all — reclassify the raw sqlite error so the engine reports it as the
/// fatal configuration condition rather than a generic store failure.
fn schema_fault(err: StoreError) -> StoreError {
    if let StoreError::Sqlite(ref sqlite_err) = err {
        if sqlite_err.to_string().contains("no such table: users") {
            return StoreError::SchemaUnavailable(sqlite_err.to_string());
        }
    }
    err
}

// ═══════════════════════════════════════════════════════════════════════
//  Row mapping
// ═══════════════════════════════════════════════════════════════════════

/// Fixed record columns; everything else ending in `_id` is treated as a
/// side-provider column.
const FIXED_COLUMNS: &[&str] = &[
    "id",
    "email",
    "name",
    "nickname",
    "avatar",
    "authx_id",
    "auth_provider",
    "email_verified_at",
    "created_at",
    "updated_at",
];

/// The live column listing of the `users` table.
fn live_columns(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(users)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Intersect the write-set with the live schema and convert to SQL values.
fn build_write_set(
    attrs: &ReconciledAttributes,
    columns: &[String],
) -> Vec<(String, SqlValue)> {
    let has = |column: &str| columns.iter().any(|c| c == column);
    let mut write_set: Vec<(String, SqlValue)> = Vec::new();

    let push_text = |set: &mut Vec<(String, SqlValue)>, column: &str, value: &Option<String>| {
        if let Some(value) = value {
            if has(column) {
                set.push((column.to_string(), SqlValue::Text(value.clone())));
            }
        }
    };

    push_text(&mut write_set, "name", &attrs.name);
    push_text(&mut write_set, "nickname", &attrs.nickname);
    push_text(&mut write_set, "avatar", &attrs.avatar);
    push_text(&mut write_set, "auth_provider", &attrs.auth_provider);

    if let Some(authx_id) = &attrs.authx_id {
        if has(COL_AUTHX_ID) {
            write_set.push((COL_AUTHX_ID.to_string(), json_to_sql(authx_id)));
        }
    }

    for (column, value) in &attrs.provider_ids {
        if has(column) {
            write_set.push((column.clone(), json_to_sql(value)));
        }
    }

    if let Some(verified_at) = attrs.email_verified_at {
        if has(COL_EMAIL_VERIFIED_AT) {
            write_set.push((
                COL_EMAIL_VERIFIED_AT.to_string(),
                SqlValue::Integer(verified_at.timestamp()),
            ));
        }
    }

    write_set
}

/// Provider ids are loosely typed (string or number); store each with
/// its natural SQLite affinity.
fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Text(n.to_string()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Read the record for `email`, mapping dynamic columns by name.
fn read_record(conn: &Connection, email: &str) -> StoreResult<Option<UserRecord>> {
    let mut stmt = conn.prepare("SELECT * FROM users WHERE email = ?1")?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt.query(rusqlite::params![email])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut record = UserRecord {
        id: String::new(),
        email: String::new(),
        name: String::new(),
        nickname: None,
        avatar: None,
        authx_id: None,
        auth_provider: None,
        provider_ids: BTreeMap::new(),
        email_verified_at: None,
        created_at: 0,
        updated_at: 0,
    };

    for (index, column) in column_names.iter().enumerate() {
        let value = row.get_ref(index)?;
        match column.as_str() {
            "id" => record.id = text_of(value).unwrap_or_default(),
            "email" => record.email = text_of(value).unwrap_or_default(),
            "name" => record.name = text_of(value).unwrap_or_default(),
            "nickname" => record.nickname = text_of(value),
            "avatar" => record.avatar = text_of(value),
            "auth_provider" => record.auth_provider = text_of(value),
            "authx_id" => record.authx_id = json_of(value),
            "email_verified_at" => {
                record.email_verified_at = match value {
                    ValueRef::Integer(secs) => DateTime::from_timestamp(secs, 0),
                    _ => None,
                };
            }
            "created_at" => {
                if let ValueRef::Integer(secs) = value {
                    record.created_at = secs;
                }
            }
            "updated_at" => {
                if let ValueRef::Integer(secs) = value {
                    record.updated_at = secs;
                }
            }
            other if other.ends_with("_id") && !FIXED_COLUMNS.contains(&other) => {
                if let Some(json) = json_of(value) {
                    record.provider_ids.insert(other.to_string(), json);
                }
            }
            _ => {}
        }
    }

    Ok(Some(record))
}

fn text_of(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}

fn json_of(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Integer(i) => Some(Value::from(i)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec()).ok().map(Value::String),
        _ => None,
    }
}

// ── tests ────────────────────────────────────────────────────────────
