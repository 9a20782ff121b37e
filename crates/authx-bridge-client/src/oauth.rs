//! OAuth 2.0 authorization-code flow against an AuthX server.
//!
//! Two external calls and one pure function:
//!
//! 1. [`AuthxClient::authorize_url`] — pure URL construction, no network.
//! 2. [`AuthxClient::exchange_code`] — POST to `/oauth/token`.
//! 3. [`AuthxClient::fetch_user`] — GET `/api/user` with the bearer token.
//!
//! The provider endpoints are all derived from a single base URL, the way
//! the AuthX server lays them out.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{ClientError, Result};
use crate::identity::ExternalIdentity;

/// Length of the CSRF state token in bytes (before base64 encoding).
const STATE_TOKEN_BYTES: usize = 32;

/// Scope requested from AuthX when none is configured.
const DEFAULT_SCOPE: &str = "user:read";

/// Request timeout applied to all provider calls.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the AuthX OAuth client.
#[derive(Debug, Clone)]
pub struct AuthxConfig {
    /// Base URL of the AuthX server; all endpoints are derived from it.
    pub base_url: String,

    /// The OAuth client ID registered with AuthX.
    pub client_id: String,

    /// The OAuth client secret.
    pub client_secret: String,

    /// The redirect URI registered with AuthX.
    pub redirect_uri: String,

    /// The scopes to request.
    pub scopes: Vec<String>,

    /// The separator used to join scopes in the authorize URL.
    pub scope_separator: String,

    /// Whether to verify the provider's TLS certificate. Disable only for
    /// local development against a self-signed AuthX instance.
    pub verify_tls: bool,

    /// Request timeout in seconds for token exchange and profile fetch.
    pub timeout_secs: u64,
}

impl AuthxConfig {
    /// Create a configuration with the default scope (`user:read`),
    /// space-separated scopes, TLS verification on, and a 10s timeout.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            scope_separator: " ".to_string(),
            verify_tls: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// The authorization endpoint, `<base>/oauth/authorize`.
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth/authorize", self.base())
    }

    /// The token endpoint, `<base>/oauth/token`.
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.base())
    }

    /// The profile endpoint, `<base>/api/user`.
    pub fn profile_endpoint(&self) -> String {
        format!("{}/api/user", self.base())
    }

    /// The provider's logout page, `<base>/logout`.
    pub fn logout_endpoint(&self) -> String {
        format!("{}/logout", self.base())
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Raw token response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Raw error response from the authorization server.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// State token
// ---------------------------------------------------------------------------

/// Generate a fresh CSRF state token (random 32 bytes, base64url encoded).
///
/// A new token must be generated for every authorize redirect; the session
/// layer stores it and verifies it against the callback.
///
/// # Errors
///
/// Returns an error if the system CSPRNG fails.
pub fn generate_state() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| ClientError::StateGeneration {
            reason: "CSPRNG error".to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OAuth 2.0 authorization-code client for a single AuthX provider.
///
/// Stateless between calls — the CSRF state lives in the caller's session,
/// and the access token is used once for the profile fetch and discarded.
pub struct AuthxClient {
    config: AuthxConfig,
    http: reqwest::Client,
}

impl AuthxClient {
    /// Create a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: AuthxConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self { config, http })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &AuthxConfig {
        &self.config
    }

    /// Build the authorization URL the user should be redirected to.
    ///
    /// Pure URL construction, no network call. The caller must generate
    /// `state` via [`generate_state`] and persist it for verification.
    /// Query parameters already present on the base endpoint are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if the configured base URL is
    /// not a valid URL.
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.authorize_endpoint())?;

        {
            let mut params = url.query_pairs_mut();
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", &self.config.redirect_uri);
            params.append_pair("response_type", "code");

            if !self.config.scopes.is_empty() {
                params.append_pair(
                    "scope",
                    &self.config.scopes.join(&self.config.scope_separator),
                );
            }

            params.append_pair("state", state);
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidGrant`] if the server rejects the
    /// code, or [`ClientError::Network`] on transport failure or timeout.
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];

        tracing::debug!(token_url = %self.config.token_endpoint(), "exchanging authorization code");

        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response.json().await?;
            tracing::debug!("token exchange successful");
            Ok(token.access_token)
        } else {
            let body = response.text().await.unwrap_or_default();

            // Surface the OAuth error description when the server sends one.
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                let reason = err.error_description.unwrap_or(err.error);
                Err(ClientError::InvalidGrant { reason })
            } else {
                Err(ClientError::InvalidGrant {
                    reason: format!("HTTP {status}: {body}"),
                })
            }
        }
    }

    /// Fetch the user profile with a bearer token and map it into an
    /// [`ExternalIdentity`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ProfileFetch`] on a non-2xx response and
    /// [`ClientError::MalformedProfile`] when the body is not a JSON
    /// object. Neither is recovered locally.
    pub async fn fetch_user(&self, access_token: &str) -> Result<ExternalIdentity> {
        let response = self
            .http
            .get(self.config.profile_endpoint())
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::ProfileFetch {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await.map_err(|e| {
            ClientError::MalformedProfile {
                reason: format!("invalid JSON: {e}"),
            }
        })?;

        let Value::Object(raw) = payload else {
            return Err(ClientError::MalformedProfile {
                reason: "expected a JSON object".to_string(),
            });
        };

        tracing::debug!("profile fetch successful");
        Ok(ExternalIdentity::from_profile(raw))
    }

    /// Complete the callback half of the flow: exchange the code, then
    /// fetch the profile with the resulting token.
    pub async fn user_from_code(&self, code: &str) -> Result<ExternalIdentity> {
        let token = self.exchange_code(code).await?;
        self.fetch_user(&token).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
