//! Admin-only route guard.
//!
//! Mirrors the creation gate at request time: an authenticated user whose
//! email is not on the allowlist is logged out locally (session
//! invalidated, anti-forgery token rotated) and refused with 403. The
//! allowlist is consulted fresh on every request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::routes::session_id_from;
use crate::state::AppState;

/// Refuse non-admin (or unauthenticated) requests.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let session_id = session_id_from(request.headers());

    let email = match resolve_email(&state, session_id.as_deref()).await {
        Ok(email) => email,
        Err(response) => return response,
    };

    if !state.allowlist.allows(email.as_deref()) {
        // Log out before refusing, like the reconciliation-side gate:
        // a session that reached an admin route without admin rights is
        // not kept alive.
        if let Some(session_id) = session_id {
            if let Err(err) = state.sessions.invalidate(&session_id).await {
                tracing::error!(error = %err, "failed to invalidate non-admin session");
            }
        }

        tracing::warn!(email = ?email, "refused non-admin access");
        return (
            StatusCode::FORBIDDEN,
            "only admin users can access this application",
        )
            .into_response();
    }

    next.run(request).await
}

/// The email of the session's user, if any.
async fn resolve_email(
    state: &AppState,
    session_id: Option<&str>,
) -> Result<Option<String>, Response> {
    let Some(session_id) = session_id else {
        return Ok(None);
    };

    let session = state
        .sessions
        .get(session_id)
        .await
        .map_err(|err| WebErrorResponse(err.to_string()).into_response())?;

    let Some(user_id) = session.and_then(|s| s.user_id) else {
        return Ok(None);
    };

    let user = state
        .users
        .get(&user_id)
        .await
        .map_err(|err| WebErrorResponse(err.to_string()).into_response())?;

    Ok(user.map(|u| u.email))
}

/// Minimal 500 wrapper for store failures inside the guard.
struct WebErrorResponse(String);

impl IntoResponse for WebErrorResponse {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "admin guard failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0).into_response()
    }
}
