//! Route handlers for the login bridge.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use authx_bridge_client::generate_state;
use authx_bridge_store::AuthSession;

use crate::error::WebError;
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "authx_bridge_session";

// ---------------------------------------------------------------------------
// GET /auth/redirect
// ---------------------------------------------------------------------------

/// Start the login flow: stash a fresh CSRF state in an anonymous
/// session and send the user to the provider's authorize URL.
pub async fn redirect(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let csrf_state = generate_state()?;
    let session = state.sessions.begin(Some(&csrf_state)).await?;
    let authorize_url = state.client.authorize_url(&csrf_state)?;

    tracing::debug!(session_id = %session.id, "redirecting to the identity provider");
    Ok(found(&authorize_url, Some(&session)))
}

/// `GET /login` — framework-style entry point, forwarded to the
/// authorize redirect.
pub async fn login_alias() -> Response {
    found("/auth/redirect", None)
}

// ---------------------------------------------------------------------------
// GET /auth/callback
// ---------------------------------------------------------------------------

/// Query parameters of the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// The authorization code.
    pub code: Option<String>,
    /// The CSRF state echoed back by the provider.
    pub state: Option<String>,
}

/// Handle the provider callback: verify the state, exchange the code,
/// reconcile the identity, establish the session.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, WebError> {
    let code = query.code.as_deref().ok_or_else(|| WebError::BadCallback {
        reason: "missing authorization code".to_string(),
    })?;

    // The state stored at redirect time must match — and it is single
    // use, so a replayed callback fails here too.
    let session_id = session_id_from(&headers).ok_or_else(|| WebError::BadCallback {
        reason: "no session to verify the callback against".to_string(),
    })?;
    let stored_state = state.sessions.take_state(&session_id).await?;
    match (stored_state.as_deref(), query.state.as_deref()) {
        (Some(stored), Some(echoed)) if stored == echoed => {}
        _ => return Err(WebError::StateMismatch),
    }

    // Exchange + fetch, then reconcile into the local record.
    let identity = state.client.user_from_code(code).await?;
    let record = state.reconciler.reconcile(&identity).await?;

    // Login first, then regenerate: the pre-auth session id must not
    // survive into the authenticated session.
    let remember = state.policy.remember_user;
    let session = state.sessions.login(&session_id, &record.id, remember).await?;
    let session = state.sessions.regenerate(&session.id).await?;

    tracing::info!(email = %record.email, "login established");
    Ok(found(&state.policy.post_login_redirect, Some(&session)))
}

// ---------------------------------------------------------------------------
// POST /logout
// ---------------------------------------------------------------------------

/// Log out: invalidate the local session and rotate the anti-forgery
/// token, then decide where to send the user.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    // Local invalidation completes before any redirect decision is
    // evaluated.
    if let Some(session_id) = session_id_from(&headers) {
        state.sessions.invalidate(&session_id).await?;
    }
    let fresh = state.sessions.begin(None).await?;

    let destination = if state.policy.logout_from_authx {
        state
            .policy
            .logout_url_override
            .clone()
            .unwrap_or_else(|| state.client.config().logout_endpoint())
    } else {
        "/".to_string()
    };

    tracing::debug!(destination = %destination, "session logged out");
    Ok(found(&destination, Some(&fresh)))
}

// ---------------------------------------------------------------------------
// GET /admin/users
// ---------------------------------------------------------------------------

/// Admin-only view of the user store; mounted behind the admin
/// middleware.
pub async fn admin_users(
    State(state): State<Arc<AppState>>,
) -> Result<axum::Json<serde_json::Value>, WebError> {
    let count = state.users.count().await?;
    Ok(axum::Json(serde_json::json!({ "user_count": count })))
}

// ---------------------------------------------------------------------------
// Cookie and response helpers
// ---------------------------------------------------------------------------

/// Extract the session id from the request's cookie header.
pub fn session_id_from(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Build the session cookie for a response.
fn session_cookie(session: &AuthSession) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        session.id
    )
}

/// A plain `302 Found` redirect, optionally carrying a session cookie.
fn found(location: &str, session: Option<&AuthSession>) -> Response {
    // A configured destination with non-header characters degrades to
    // the root rather than panicking mid-response.
    let location = axum::http::HeaderValue::from_str(location)
        .unwrap_or_else(|_| axum::http::HeaderValue::from_static("/"));

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(LOCATION, location);

    if let Some(session) = session {
        if let Ok(cookie) = axum::http::HeaderValue::from_str(&session_cookie(session)) {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
    }

    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
