//! OAuth 2.1 resource-server glue for MCP servers.
//!
//! Serves Protected Resource Metadata
//! ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)) at the
//! well-known endpoint so MCP clients can discover the authorization
//! server, and builds the `WWW-Authenticate` challenge for 401 responses
//! per [RFC 6750 §3](https://datatracker.ietf.org/doc/html/rfc6750#section-3).

use axum::{Json, response::IntoResponse};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for an MCP server acting as an OAuth 2.1 resource server.
#[derive(Clone, Debug)]
pub struct ResourceServerConfig {
    /// URL to the Protected Resource Metadata document (RFC 9728).
    ///
    /// Included as `resource_metadata="..."` in `WWW-Authenticate` headers.
    pub resource_metadata_url: String,
    /// Default scopes to include in 401 `WWW-Authenticate` challenges.
    pub default_scope: Option<String>,
}

/// Build a `WWW-Authenticate` header value for a 401 Unauthorized response.
///
/// Format: `Bearer resource_metadata="<url>"[, scope="<scopes>"]`
pub fn www_authenticate_401(config: &ResourceServerConfig) -> HeaderValue {
    let mut value = format!(
        "Bearer resource_metadata=\"{}\"",
        config.resource_metadata_url,
    );
    if let Some(ref scope) = config.default_scope {
        value.push_str(&format!(", scope=\"{scope}\""));
    }
    // Safe: we control the format and it's valid ASCII.
    HeaderValue::from_str(&value).expect("valid WWW-Authenticate header")
}

/// OAuth 2.0 Protected Resource Metadata ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource identifier — canonical URI of this MCP server.
    pub resource: String,

    /// Authorization server(s) that can issue tokens for this resource.
    ///
    /// MUST contain at least one entry.
    pub authorization_servers: Vec<String>,

    /// Scopes supported by this resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Bearer token methods supported (e.g., `["header"]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,
}

/// Create an axum [`Router`](axum::Router) that serves the Protected
/// Resource Metadata at `/.well-known/oauth-protected-resource`.
///
/// Merge it unprotected alongside the MCP service:
///
/// ```rust,ignore
/// let app = axum::Router::new()
///     .nest_service("/mcp", mcp_service)
///     .merge(metadata_router(metadata));
/// ```
pub fn metadata_router(metadata: ProtectedResourceMetadata) -> axum::Router {
    let metadata = Arc::new(metadata);
    axum::Router::new().route(
        "/.well-known/oauth-protected-resource",
        axum::routing::get(move || {
            let metadata = metadata.clone();
            async move { Json(metadata.as_ref().clone()).into_response() }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_without_scope() {
        let config = ResourceServerConfig {
            resource_metadata_url: "https://mcp.example.com/.well-known/oauth-protected-resource"
                .into(),
            default_scope: None,
        };
        assert_eq!(
            www_authenticate_401(&config),
            "Bearer resource_metadata=\"https://mcp.example.com/.well-known/oauth-protected-resource\""
        );
    }

    #[test]
    fn challenge_with_scope() {
        let config = ResourceServerConfig {
            resource_metadata_url: "https://mcp.example.com/.well-known/oauth-protected-resource"
                .into(),
            default_scope: Some("mcp:tools".into()),
        };
        let value = www_authenticate_401(&config);
        assert!(value.to_str().expect("ascii").ends_with(", scope=\"mcp:tools\""));
    }
}
