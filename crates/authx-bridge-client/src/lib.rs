//! OAuth2 client for the AuthX identity provider.
//!
//! This crate implements the client half of an OAuth 2.0 authorization-code
//! grant (RFC 6749) against an AuthX server:
//!
//! 1. Build an authorization URL with a fresh CSRF `state` token and
//!    redirect the user to it.
//! 2. Receive the authorization code on the callback.
//! 3. Exchange the code for an access token at `/oauth/token`.
//! 4. Fetch the user profile from `/api/user` with the bearer token and
//!    map it into an [`ExternalIdentity`].
//!
//! The `state` token produced here is opaque to this crate — the
//! surrounding session layer stores it across the redirect and verifies it
//! on the callback. Nothing in this crate talks to local storage; the
//! [`ExternalIdentity`] it produces is handed to the reconciliation engine.

pub mod error;
pub mod identity;
pub mod oauth;

pub use error::{ClientError, Result};
pub use identity::ExternalIdentity;
pub use oauth::{AuthxClient, AuthxConfig, generate_state};
