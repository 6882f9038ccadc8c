//! MCP server exposing a single `whoami` tool.
//!
//! The tool returns the verified claims of the authenticated caller.
//! Authentication happens before requests reach this handler: the
//! [`AuthLayer`](whoami_auth::AuthLayer) middleware verifies the bearer
//! token and stores the resulting
//! [`VerifiedClaims`](whoami_auth::VerifiedClaims) in the request's HTTP
//! extensions, which the streamable HTTP transport propagates into the
//! tool's request context.

use rmcp::{
    RoleServer, ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{Implementation, ServerCapabilities, ServerInfo},
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use whoami_auth::VerifiedClaims;

/// MCP whoami server.
#[derive(Clone)]
pub struct WhoamiServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WhoamiServer {
    /// Create a new whoami server.
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Return the claims of the authenticated user.
    #[tool(description = "Return the claims of the authenticated user")]
    async fn whoami(&self, ctx: RequestContext<RoleServer>) -> Result<String, String> {
        let parts = ctx.extensions.get::<http::request::Parts>();
        let claims = parts.and_then(|parts| parts.extensions.get::<VerifiedClaims>());
        render_claims(claims)
    }
}

/// Pretty-print the claims mapping, or report the (middleware-prevented)
/// unauthenticated case.
fn render_claims(claims: Option<&VerifiedClaims>) -> Result<String, String> {
    let claims = claims.ok_or_else(|| "not authenticated".to_string())?;
    tracing::debug!(subject = ?claims.subject(), "serving whoami");
    serde_json::to_string_pretty(claims.claims()).map_err(|e| e.to_string())
}

impl Default for WhoamiServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for WhoamiServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "whoami-server".into(),
                title: Some("WhoAmI MCP Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Exposes a whoami tool returning the verified claims of the authenticated user."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::render_claims;
    use serde_json::json;
    use whoami_auth::VerifiedClaims;

    #[test]
    fn renders_claims_as_pretty_json() {
        let claims = json!({"sub": "user-1", "email": "user-1@example.com"})
            .as_object()
            .cloned()
            .expect("object literal");
        let text = render_claims(Some(&VerifiedClaims::from_claims(claims))).expect("rendered");
        assert!(text.contains("\"sub\": \"user-1\""));
        assert!(text.contains("\"email\": \"user-1@example.com\""));
    }

    #[test]
    fn missing_claims_is_an_error() {
        let err = render_claims(None).expect_err("no claims");
        assert_eq!(err, "not authenticated");
    }
}
