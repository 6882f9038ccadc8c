//! # whoami-auth
//!
//! JWKS-backed JWT validation and bearer-auth middleware for MCP servers
//! built with [rmcp](https://docs.rs/rmcp) and [axum](https://docs.rs/axum).
//!
//! The core is [`JwtValidator`]: given a bearer token, it resolves the
//! signing key by `kid` from a TTL-cached JWKS, verifies the signature,
//! and checks expiration, issuer, and audience, returning the full claims
//! mapping or one of the [`AuthError`] kinds. [`AuthLayer`] wraps a
//! [`TokenVerifier`] into tower middleware that guards an MCP service and
//! hands [`VerifiedClaims`] to tool handlers through HTTP extensions.
//!
//! ```rust,ignore
//! use whoami_auth::{AuthLayer, JwtValidator};
//!
//! let validator = JwtValidator::builder(
//!     "https://auth.example.com/oauth2/jwks",
//!     "https://auth.example.com/oauth2/token",
//!     "my-client-id",
//! )
//! .build()?;
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", mcp_service)
//!     .layer(AuthLayer::new(validator));
//! ```

pub mod discovery;
pub mod error;
pub mod layer;
pub mod oauth;
pub mod validator;

mod jwks;

pub use error::{AuthError, BuildError};
pub use layer::{AuthLayer, AuthService, TokenVerifier};
pub use validator::{JwtValidator, JwtValidatorBuilder, VerifiedClaims};
