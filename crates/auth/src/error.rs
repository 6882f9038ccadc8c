//! Failure taxonomy for token verification.
//!
//! Every failed [`verify`](crate::JwtValidator::verify) call reports exactly
//! one [`AuthError`] kind. Callers map all of them to a uniform
//! "unauthorized" response; the kind itself is for server-side logs.

use thiserror::Error;

/// Why a token was rejected.
///
/// All kinds except [`KeySetUnavailable`](AuthError::KeySetUnavailable)
/// describe a problem with the presented token. `KeySetUnavailable` means
/// the JWKS endpoint could not be reached and no cached key set exists,
/// which is an operational problem worth surfacing separately in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is not a decodable three-segment JWT, or its header
    /// carries no `kid`.
    #[error("malformed token")]
    MalformedToken,

    /// The token's `kid` is absent from the key set, even after one
    /// refresh of the JWKS.
    #[error("no signing key matches kid {kid:?}")]
    UnknownSigningKey {
        /// Key identifier declared by the token header.
        kid: String,
    },

    /// The token declares a signing algorithm outside the configured
    /// allow-list.
    #[error("token algorithm {found:?} is not in the accepted set")]
    AlgorithmMismatch {
        /// Algorithm declared by the token header.
        found: jsonwebtoken::Algorithm,
    },

    /// The signature does not verify against the resolved public key.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The `exp` claim is in the past (beyond the configured leeway),
    /// missing, or not a number.
    #[error("token has expired")]
    TokenExpired,

    /// The `iss` claim does not exactly equal the expected issuer.
    #[error("token issuer does not match")]
    IssuerMismatch,

    /// The `aud` claim (string or array) does not contain the expected
    /// audience.
    #[error("token audience does not match")]
    AudienceMismatch,

    /// The JWKS could not be fetched and no previously cached key set is
    /// available to fall back on.
    #[error("JWKS unavailable: {0}")]
    KeySetUnavailable(#[source] reqwest::Error),
}

impl AuthError {
    /// Whether this failure reflects an operational problem (JWKS
    /// connectivity) rather than a bad token.
    pub fn is_operational(&self) -> bool {
        matches!(self, AuthError::KeySetUnavailable(_))
    }
}

/// Error constructing a [`JwtValidator`](crate::JwtValidator).
#[derive(Debug, Error)]
pub enum BuildError {
    /// The HTTP client for JWKS fetches could not be constructed.
    #[error("failed to build JWKS HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The accepted-algorithm allow-list is empty.
    #[error("at least one accepted signing algorithm is required")]
    NoAlgorithms,
}
