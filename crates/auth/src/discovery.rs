//! OIDC provider discovery.
//!
//! Resolves the provider's published configuration from its issuer URL so
//! deployments only need to configure the issuer; the JWKS endpoint comes
//! from `<issuer>/.well-known/openid-configuration`.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// The subset of the OIDC discovery document the server shell needs.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier, as published by the provider.
    pub issuer: String,
    /// Where the provider publishes its signing keys.
    pub jwks_uri: String,
    /// Authorization endpoint, if the provider publishes one.
    pub authorization_endpoint: Option<String>,
    /// Token endpoint, if the provider publishes one.
    pub token_endpoint: Option<String>,
}

/// Error resolving the provider configuration.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch OIDC discovery document: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Fetch the OIDC discovery document for `issuer`.
///
/// `ssl_verify: false` disables certificate-chain validation; only for
/// dev/test providers with self-signed certificates.
pub async fn fetch_provider_metadata(
    issuer: &str,
    ssl_verify: bool,
) -> Result<ProviderMetadata, DiscoveryError> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );

    let mut client = reqwest::Client::builder();
    if !ssl_verify {
        client = client.danger_accept_invalid_certs(true);
    }
    let metadata = client
        .build()?
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json::<ProviderMetadata>()
        .await?;

    debug!(issuer = %metadata.issuer, jwks_uri = %metadata.jwks_uri, "resolved provider metadata");
    Ok(metadata)
}
