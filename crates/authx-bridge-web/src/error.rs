//! Error-to-status mapping.
//!
//! The boundary layer is the only place that knows which reconciliation
//! failure becomes which HTTP status. Everything is logged here so
//! handlers can simply `?` their way through.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use authx_bridge_client::ClientError;
use authx_bridge_identity::IdentityError;
use authx_bridge_store::StoreError;

/// Errors surfaced by the web layer.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The callback request is structurally unusable (no code, no
    /// session to verify against).
    #[error("bad callback: {reason}")]
    BadCallback {
        /// What was missing or wrong.
        reason: String,
    },

    /// The callback state does not match the one stored in the session.
    #[error("state mismatch")]
    StateMismatch,

    /// A reconciliation failure.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A failure talking to the identity provider.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A session-store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadCallback { .. } => StatusCode::BAD_REQUEST,
            Self::StateMismatch => StatusCode::FORBIDDEN,
            Self::Identity(IdentityError::InvalidIdentity { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Identity(IdentityError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            Self::Identity(IdentityError::RecordTypeUnavailable { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Identity(IdentityError::Store { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Client(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "request refused");
        }

        (status, self.to_string()).into_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_identity_maps_to_422() {
        let err = WebError::Identity(IdentityError::InvalidIdentity {
            reason: "no email".to_string(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let err = WebError::Identity(IdentityError::Forbidden {
            reason: "not an admin".to_string(),
        });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn record_type_unavailable_maps_to_500() {
        let err = WebError::Identity(IdentityError::RecordTypeUnavailable {
            reason: "no such table: users".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn provider_failures_map_to_502() {
        let err = WebError::Client(ClientError::InvalidGrant {
            reason: "code expired".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn state_mismatch_maps_to_403() {
        assert_eq!(WebError::StateMismatch.status(), StatusCode::FORBIDDEN);
    }
}
