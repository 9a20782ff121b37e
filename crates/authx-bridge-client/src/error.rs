//! Error types for the AuthX client crate.
//!
//! Everything that can go wrong while talking to the identity provider is
//! surfaced through [`ClientError`]. These failures are never recovered
//! locally — the caller decides whether to retry, back off, or report.

/// Unified error type for the AuthX OAuth client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The authorization server rejected the code exchange.
    #[error("invalid grant: {reason}")]
    InvalidGrant {
        /// Explanation from the authorization server.
        reason: String,
    },

    /// An HTTP request to the identity provider failed (including timeouts).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The profile endpoint returned a non-2xx response.
    #[error("profile fetch failed with HTTP {status}: {body}")]
    ProfileFetch {
        /// The HTTP status code returned.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The profile endpoint returned a body that is not a JSON object.
    #[error("malformed profile payload: {reason}")]
    MalformedProfile {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The configured base or redirect URL could not be parsed.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The system CSPRNG failed while generating a state token.
    #[error("state generation failed: {reason}")]
    StateGeneration {
        /// Details from the RNG layer.
        reason: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ClientError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
