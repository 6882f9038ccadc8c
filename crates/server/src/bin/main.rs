//! Binary entry point for the whoami MCP server.

use std::time::Duration;

use clap::Parser;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use whoami_auth::{
    AuthLayer, JwtValidator, discovery,
    oauth::{ProtectedResourceMetadata, ResourceServerConfig, metadata_router},
};
use whoami_server::WhoamiServer;

/// WhoAmI MCP Server — authenticates bearer tokens against an OAuth2/OIDC
/// provider and exposes the verified claims through a whoami tool.
#[derive(Parser)]
#[command(name = "whoami-server", version, about)]
struct Cli {
    /// Expected token issuer (the provider's issuer URL).
    #[arg(long, env = "AUTH_ISSUER")]
    issuer: String,

    /// Expected token audience (the OAuth2 client ID).
    #[arg(long, env = "AUTH_AUDIENCE")]
    audience: String,

    /// JWKS endpoint URL. Discovered from the issuer's
    /// openid-configuration when omitted.
    #[arg(long, env = "JWKS_URL")]
    jwks_url: Option<String>,

    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3001")]
    bind: std::net::SocketAddr,

    /// Disable certificate validation on provider requests (dev/testing
    /// only).
    #[arg(long)]
    no_ssl_verify: bool,

    /// Key-set cache TTL in seconds.
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    /// Clock-skew tolerance in seconds for the expiration check.
    #[arg(long, default_value_t = 0)]
    leeway_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    let ssl_verify = !cli.no_ssl_verify;

    let jwks_url = match cli.jwks_url {
        Some(url) => url,
        None => {
            discovery::fetch_provider_metadata(&cli.issuer, ssl_verify)
                .await
                .expect("failed to discover provider configuration")
                .jwks_uri
        }
    };
    tracing::info!(issuer = %cli.issuer, %jwks_url, "configuring JWT validator");

    let validator = JwtValidator::builder(jwks_url, &cli.issuer, &cli.audience)
        .ssl_verify(ssl_verify)
        .cache_ttl(Duration::from_secs(cli.cache_ttl_secs))
        .leeway_secs(cli.leeway_secs)
        .build()
        .expect("failed to build JWT validator");

    let service = StreamableHttpService::new(
        || Ok(WhoamiServer::new()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let resource = format!("http://{}", cli.bind);
    let metadata = ProtectedResourceMetadata {
        resource: resource.clone(),
        authorization_servers: vec![cli.issuer.clone()],
        scopes_supported: None,
        bearer_methods_supported: Some(vec!["header".into()]),
    };
    let rs_config = ResourceServerConfig {
        resource_metadata_url: format!("{resource}/.well-known/oauth-protected-resource"),
        default_scope: None,
    };

    // The metadata endpoint is merged after the auth layer so discovery
    // stays reachable without a token.
    let app = axum::Router::new()
        .nest_service("/mcp", service)
        .layer(AuthLayer::new(validator).with_resource_server(rs_config))
        .merge(metadata_router(metadata));

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .expect("failed to bind");
    tracing::info!(addr = %cli.bind, "whoami MCP server listening");
    axum::serve(listener, app).await.expect("server error");
}
