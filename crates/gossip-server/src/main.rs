mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use gossip_client::ApiClient;
use gossip_web::session::SessionPolicy;
use gossip_web::{WebStateInner, app};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gossip=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::load()?;

    let state = Arc::new(WebStateInner {
        api: ApiClient::without_cookies(&config.api_url)?,
        policy: SessionPolicy::new("/signin").protect("/home").protect("/rooms"),
        secure_cookies: !config.is_development(),
    });

    let app = app(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        api = %config.api_url,
        env = %config.environment,
        "gossip web listening on {}", addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
