//! Admin email allowlist.
//!
//! Holds the raw configured value and re-derives the normalized list on
//! every call — configuration may change between requests in tests and
//! admin tooling, so nothing here is cached.

use serde_json::Value;

/// A configured set of privileged email addresses.
///
/// Construction never fails: malformed configuration degrades to an empty
/// allowlist rather than an error.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowlist {
    raw: Value,
}

impl AdminAllowlist {
    /// Build from the raw configured value.
    ///
    /// Anything that is not a JSON array yields an empty allowlist.
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    /// Build from a plain list of configured emails.
    pub fn from_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw = Value::Array(
            emails
                .into_iter()
                .map(|e| Value::String(e.into()))
                .collect(),
        );
        Self { raw }
    }

    /// Build from the `ADMIN_EMAILS` comma-separated environment form.
    ///
    /// Entries are split on commas; surrounding whitespace is dropped at
    /// normalization time like any other entry.
    pub fn from_csv(csv: &str) -> Self {
        Self::from_emails(csv.split(',').map(str::to_string))
    }

    /// The normalized allowlist: lower-cased, trimmed, order-preserving,
    /// duplicate- and blank-free. Non-string entries are silently dropped;
    /// a non-list configured value yields an empty list.
    ///
    /// Derived fresh on every call.
    pub fn emails(&self) -> Vec<String> {
        let Value::Array(entries) = &self.raw else {
            return Vec::new();
        };

        let mut normalized: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::String(email) = entry else {
                continue;
            };
            let email = email.trim().to_lowercase();
            if email.is_empty() || normalized.contains(&email) {
                continue;
            }
            normalized.push(email);
        }
        normalized
    }

    /// Whether `candidate` is on the allowlist.
    ///
    /// Returns false for `None` or empty input; otherwise lower-cases the
    /// candidate and tests exact membership. Case-insensitive, no side
    /// effects.
    pub fn allows(&self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        if candidate.is_empty() {
            return false;
        }

        let candidate = candidate.to_lowercase();
        self.emails().iter().any(|email| *email == candidate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_emails_from_config() {
        let allowlist = AdminAllowlist::from_value(json!([
            " ADMIN@Example.com ",
            "owner@example.com",
            1,
            "",
        ]));

        assert_eq!(
            allowlist.emails(),
            vec!["admin@example.com", "owner@example.com"]
        );
        assert!(allowlist.allows(Some("ADMIN@example.com")));
    }

    #[test]
    fn preserves_source_order_and_drops_duplicates() {
        let allowlist = AdminAllowlist::from_value(json!([
            "second@example.com",
            "first@example.com",
            "SECOND@example.com",
        ]));

        assert_eq!(
            allowlist.emails(),
            vec!["second@example.com", "first@example.com"]
        );
    }

    #[test]
    fn rejects_non_admin_email() {
        let allowlist = AdminAllowlist::from_emails(["admin@example.com"]);
        assert!(!allowlist.allows(Some("user@example.com")));
    }

    #[test]
    fn returns_empty_list_for_non_list_config() {
        let allowlist = AdminAllowlist::from_value(json!("admin@example.com"));
        assert!(allowlist.emails().is_empty());
        assert!(!allowlist.allows(Some("admin@example.com")));
    }

    #[test]
    fn rejects_null_and_empty_candidates() {
        let allowlist = AdminAllowlist::from_emails(["admin@example.com"]);
        assert!(!allowlist.allows(None));
        assert!(!allowlist.allows(Some("")));
    }

    #[test]
    fn candidate_is_not_trimmed() {
        // Normalization applies to configured entries, not candidates.
        let allowlist = AdminAllowlist::from_emails(["admin@example.com"]);
        assert!(!allowlist.allows(Some(" admin@example.com ")));
    }

    #[test]
    fn csv_form_splits_on_commas() {
        let allowlist = AdminAllowlist::from_csv("a@example.com, B@Example.com ,,");
        assert_eq!(allowlist.emails(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn default_is_empty() {
        let allowlist = AdminAllowlist::default();
        assert!(allowlist.emails().is_empty());
        assert!(!allowlist.allows(Some("anyone@example.com")));
    }
}
