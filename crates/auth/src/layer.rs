//! Bearer-token authentication middleware for MCP servers.
//!
//! A tower layer that extracts the `Authorization: Bearer <token>` header,
//! runs it through a [`TokenVerifier`], and on success inserts the
//! [`VerifiedClaims`] into the request's HTTP extensions, where MCP tool
//! handlers can read them. Requests without a usable bearer token are
//! rejected with 401 before the verifier runs.
//!
//! Clients always receive the same opaque `unauthorized` body; the
//! structured failure kind is logged server-side only.
//!
//! ```rust,ignore
//! use whoami_auth::{AuthLayer, JwtValidator};
//!
//! let validator = JwtValidator::builder(jwks_url, issuer, audience).build()?;
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(AuthLayer::new(validator));
//! ```

use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use std::task::{Context, Poll};
use tracing::{error, warn};

use crate::error::AuthError;
use crate::oauth::{ResourceServerConfig, www_authenticate_401};
use crate::validator::VerifiedClaims;

/// Trait for verifying a bearer token string.
///
/// [`JwtValidator`](crate::JwtValidator) is the production
/// implementation; tests substitute fakes.
pub trait TokenVerifier: Clone + Send + Sync + 'static {
    /// Verify the token and return its claims, or a classified failure.
    fn verify(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<VerifiedClaims, AuthError>> + Send;
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<V> {
    verifier: V,
    resource_server: Option<ResourceServerConfig>,
}

impl<V> AuthLayer<V> {
    pub fn new(verifier: V) -> Self {
        Self {
            verifier,
            resource_server: None,
        }
    }

    /// Attach OAuth resource-server metadata so 401 responses carry a
    /// spec-compliant `WWW-Authenticate` header.
    pub fn with_resource_server(mut self, config: ResourceServerConfig) -> Self {
        self.resource_server = Some(config);
        self
    }
}

impl<V, S> tower::Layer<S> for AuthLayer<V>
where
    V: Clone,
{
    type Service = AuthService<V, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            verifier: self.verifier.clone(),
            resource_server: self.resource_server.clone(),
            inner,
        }
    }
}

/// Tower service that authenticates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<V, S> {
    verifier: V,
    resource_server: Option<ResourceServerConfig>,
    inner: S,
}

impl<V, S, B> tower::Service<Request<B>> for AuthService<V, S>
where
    V: TokenVerifier,
    S: tower::Service<Request<B>, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let verifier = self.verifier.clone();
        let resource_server = self.resource_server.clone();
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            let token = parts
                .headers
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));

            let verified = match token {
                Some(token) => verifier.verify(token).await.map_err(Some),
                None => Err(None),
            };

            match verified {
                Ok(claims) => {
                    parts.extensions.insert(claims);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(err) => {
                    match err {
                        Some(err) if err.is_operational() => {
                            error!(error = %err, "token verification failed: JWKS unreachable");
                        }
                        Some(err) => warn!(error = %err, "token verification failed"),
                        None => warn!("request missing Authorization: Bearer header"),
                    }
                    let mut builder = Response::builder().status(StatusCode::UNAUTHORIZED);
                    if let Some(ref config) = resource_server {
                        builder = builder
                            .header(http::header::WWW_AUTHENTICATE, www_authenticate_401(config));
                    }
                    let response = builder
                        .body(axum::body::Body::from("unauthorized"))
                        .expect("valid response");
                    Ok(response)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct FixedVerifier;

    impl TokenVerifier for FixedVerifier {
        async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
            if token == "good" {
                let claims = json!({"sub": "user-1"})
                    .as_object()
                    .cloned()
                    .expect("object literal");
                Ok(VerifiedClaims::from_claims(claims))
            } else {
                Err(AuthError::InvalidSignature)
            }
        }
    }

    /// Inner service that reports whether claims made it into extensions.
    #[derive(Clone)]
    struct Probe;

    impl tower::Service<Request<axum::body::Body>> for Probe {
        type Response = Response<axum::body::Body>;
        type Error = std::convert::Infallible;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<axum::body::Body>) -> Self::Future {
            let subject = req
                .extensions()
                .get::<VerifiedClaims>()
                .and_then(|c| c.subject().map(String::from))
                .unwrap_or_else(|| "anonymous".into());
            std::future::ready(Ok(Response::new(axum::body::Body::from(subject))))
        }
    }

    fn service() -> AuthService<FixedVerifier, Probe> {
        use tower::Layer;
        AuthLayer::new(FixedVerifier).layer(Probe)
    }

    async fn status_of(req: Request<axum::body::Body>) -> StatusCode {
        use tower::Service;
        service().call(req).await.expect("infallible").status()
    }

    #[tokio::test]
    async fn missing_header_is_rejected_before_verification() {
        let req = Request::builder()
            .body(axum::body::Body::empty())
            .expect("request");
        assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let req = Request::builder()
            .header(http::header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(axum::body::Body::empty())
            .expect("request");
        assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_token_is_rejected_with_opaque_body() {
        use tower::Service;
        let req = Request::builder()
            .header(http::header::AUTHORIZATION, "Bearer bad")
            .body(axum::body::Body::empty())
            .expect("request");
        let resp = service().call(req).await.expect("infallible");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(resp.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(&body[..], b"unauthorized");
    }

    #[tokio::test]
    async fn valid_token_claims_reach_inner_service() {
        use tower::Service;
        let req = Request::builder()
            .header(http::header::AUTHORIZATION, "Bearer good")
            .body(axum::body::Body::empty())
            .expect("request");
        let resp = service().call(req).await.expect("infallible");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(&body[..], b"user-1");
    }

    #[tokio::test]
    async fn rejection_carries_www_authenticate_when_configured() {
        use tower::{Layer, Service};
        let mut svc = AuthLayer::new(FixedVerifier)
            .with_resource_server(ResourceServerConfig {
                resource_metadata_url:
                    "https://mcp.example.com/.well-known/oauth-protected-resource".into(),
                default_scope: None,
            })
            .layer(Probe);
        let req = Request::builder()
            .body(axum::body::Body::empty())
            .expect("request");
        let resp = svc.call(req).await.expect("infallible");
        let header = resp
            .headers()
            .get(http::header::WWW_AUTHENTICATE)
            .expect("challenge header")
            .to_str()
            .expect("ascii");
        assert!(header.starts_with("Bearer resource_metadata="));
    }
}
