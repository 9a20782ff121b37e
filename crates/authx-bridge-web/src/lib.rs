//! HTTP surface for the AuthX login bridge.
//!
//! Three routes do the work:
//!
//! - `GET /auth/redirect` — start an anonymous session, stash a fresh
//!   CSRF state in it, 302 to the provider's authorize URL.
//! - `GET /auth/callback` — verify the state, run the OAuth exchange and
//!   profile fetch, reconcile the identity, log the session in and
//!   regenerate its id, 302 to the post-login destination.
//! - `POST /logout` — invalidate the local session and rotate the
//!   anti-forgery token first, then 302 to `/` or the provider's logout
//!   page per policy.
//!
//! Reconciliation errors map to transport codes here and nowhere else:
//! missing email → 422, refused creation → 403, unresolvable record
//! store → 500, provider fetch failure → 502.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::BridgeConfig;
pub use error::WebError;
pub use server::WebServer;
pub use state::AppState;
