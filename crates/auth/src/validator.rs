//! JWT verification against a remote JWKS.
//!
//! [`JwtValidator`] resolves the signing key for a token by `kid`,
//! verifies the signature, and checks expiration, issuer, and audience in
//! that order. Each failure maps to exactly one [`AuthError`] kind.
//!
//! ```rust,ignore
//! use whoami_auth::JwtValidator;
//!
//! let validator = JwtValidator::builder(
//!     "https://auth.example.com/oauth2/jwks",
//!     "https://auth.example.com/oauth2/token",
//!     "my-client-id",
//! )
//! .build()?;
//!
//! let claims = validator.verify(token).await?;
//! println!("authenticated subject: {:?}", claims.subject());
//! ```

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::error::{AuthError, BuildError};
use crate::jwks::KeyStore;
use crate::layer::TokenVerifier;

/// Claims of a successfully verified token.
///
/// An open mapping: standard claims plus whatever provider-specific
/// custom claims the token carried, passed through unmodified.
#[derive(Clone, Debug)]
pub struct VerifiedClaims {
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Wrap an already-verified claims mapping.
    ///
    /// [`JwtValidator`] produces these during verification; custom
    /// [`TokenVerifier`](crate::TokenVerifier) implementations (and
    /// tests) construct them directly.
    pub fn from_claims(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Look up a single claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The `sub` claim, if present.
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    /// The `iss` claim, if present.
    pub fn issuer(&self) -> Option<&str> {
        self.claims.get("iss").and_then(Value::as_str)
    }

    /// Granted scopes (space-separated in the `scope` claim).
    pub fn scopes(&self) -> Vec<String> {
        self.claims
            .get("scope")
            .and_then(Value::as_str)
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// The full claims mapping.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Consume and return the full claims mapping.
    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }
}

/// Builder for [`JwtValidator`].
pub struct JwtValidatorBuilder {
    jwks_url: String,
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    ssl_verify: bool,
    cache_ttl: Duration,
    leeway_secs: u64,
    fetch_timeout: Duration,
}

impl JwtValidatorBuilder {
    /// Accept these signing algorithms instead of the default `[RS256]`.
    pub fn algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Toggle certificate-chain validation on the JWKS fetch.
    ///
    /// Disable only against dev/test providers with self-signed
    /// certificates.
    pub fn ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    /// How long a fetched key set is served before being refreshed
    /// (default 300 s).
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Clock-skew tolerance in seconds for the expiration check
    /// (default 0).
    pub fn leeway_secs(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Timeout for each JWKS fetch (default 10 s).
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Build the validator. No network traffic happens here; the key set
    /// is fetched lazily on the first [`verify`](JwtValidator::verify).
    pub fn build(self) -> Result<JwtValidator, BuildError> {
        let Some(&first_alg) = self.algorithms.first() else {
            return Err(BuildError::NoAlgorithms);
        };

        let mut client = reqwest::Client::builder().timeout(self.fetch_timeout);
        if !self.ssl_verify {
            client = client.danger_accept_invalid_certs(true);
        }
        let client = client.build().map_err(BuildError::HttpClient)?;

        // Signature and algorithm are enforced here; exp/iss/aud are
        // checked by hand in `verify` so each maps to its own kind.
        let mut validation = Validation::new(first_alg);
        validation.algorithms = self.algorithms.clone();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = Default::default();

        Ok(JwtValidator {
            inner: Arc::new(JwtValidatorInner {
                keys: KeyStore::new(client, self.jwks_url, self.cache_ttl),
                issuer: self.issuer,
                audience: self.audience,
                algorithms: self.algorithms,
                leeway_secs: self.leeway_secs,
                validation,
            }),
        })
    }
}

struct JwtValidatorInner {
    keys: KeyStore,
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    leeway_secs: u64,
    validation: Validation,
}

/// JWT validator that verifies bearer tokens against a JWKS endpoint.
///
/// Cheap to clone; all clones share one key cache.
#[derive(Clone)]
pub struct JwtValidator {
    inner: Arc<JwtValidatorInner>,
}

impl JwtValidator {
    /// Start building a validator for tokens issued by `issuer` for
    /// `audience`, signed with a key published at `jwks_url`.
    pub fn builder(
        jwks_url: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> JwtValidatorBuilder {
        JwtValidatorBuilder {
            jwks_url: jwks_url.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            algorithms: vec![Algorithm::RS256],
            ssl_verify: true,
            cache_ttl: Duration::from_secs(300),
            leeway_secs: 0,
            fetch_timeout: Duration::from_secs(10),
        }
    }

    /// Verify a compact-serialized token and return its claims.
    ///
    /// May fetch the JWKS: once when the cache is cold or stale, and at
    /// most once more when the token names a `kid` absent from the
    /// cached set.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        // Structural decode of the header. Nothing in it is trusted yet.
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let kid = header.kid.as_deref().ok_or(AuthError::MalformedToken)?;

        // Key resolution, with one refresh-and-retry on an unknown kid.
        let key = self.inner.keys.key_for(kid).await?;

        // The declared algorithm must be on the allow-list; the token
        // does not get to pick how it is verified.
        if !self.inner.algorithms.contains(&header.alg) {
            return Err(AuthError::AlgorithmMismatch { found: header.alg });
        }

        let claims = self.check_signature(token, &key, header.alg)?;

        // Expiration: exp must be strictly in the future, modulo leeway.
        let exp = claims
            .get("exp")
            .and_then(Value::as_u64)
            .ok_or(AuthError::TokenExpired)?;
        if exp.saturating_add(self.inner.leeway_secs) <= jsonwebtoken::get_current_timestamp() {
            return Err(AuthError::TokenExpired);
        }

        if claims.get("iss").and_then(Value::as_str) != Some(self.inner.issuer.as_str()) {
            return Err(AuthError::IssuerMismatch);
        }

        if !audience_matches(claims.get("aud"), &self.inner.audience) {
            return Err(AuthError::AudienceMismatch);
        }

        Ok(VerifiedClaims { claims })
    }

    fn check_signature(
        &self,
        token: &str,
        key: &DecodingKey,
        alg: Algorithm,
    ) -> Result<Map<String, Value>, AuthError> {
        decode::<Map<String, Value>>(token, key, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_)
                | ErrorKind::InvalidToken => AuthError::MalformedToken,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    AuthError::AlgorithmMismatch { found: alg }
                }
                _ => AuthError::InvalidSignature,
            })
    }
}

impl TokenVerifier for JwtValidator {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        JwtValidator::verify(self, token).await
    }
}

/// The `aud` claim may be a single string or an array of strings.
fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    match aud {
        Some(Value::String(s)) => s == expected,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(expected)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::audience_matches;
    use serde_json::json;

    #[test]
    fn audience_single_string() {
        assert!(audience_matches(Some(&json!("client-1")), "client-1"));
        assert!(!audience_matches(Some(&json!("client-2")), "client-1"));
    }

    #[test]
    fn audience_array() {
        assert!(audience_matches(
            Some(&json!(["api", "client-1"])),
            "client-1"
        ));
        assert!(!audience_matches(Some(&json!(["api", "other"])), "client-1"));
    }

    #[test]
    fn audience_missing_or_wrong_shape() {
        assert!(!audience_matches(None, "client-1"));
        assert!(!audience_matches(Some(&json!(42)), "client-1"));
        assert!(!audience_matches(Some(&json!({"aud": "client-1"})), "client-1"));
    }
}
